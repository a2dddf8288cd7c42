//! The record-batch assembler: turns one page of blocks into an Arrow
//! `RecordBatch`, following the buffer-descriptor/buffer-writer contract
//! each block converter produces.

use crate::block::Block;
use crate::converters::{BufferDescriptor, BufferWriter, Converter};
use crate::error::EncodeError;
use crate::schema::BoundColumn;
use arrow::array::{make_array, new_null_array, ArrayData, ArrayRef};
use arrow::buffer::Buffer;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Accumulates one column's buffer descriptors and writers and checks, on
/// materialization, that every writer produced exactly the bytes its
/// descriptor declared.
struct BatchBody {
    descriptors: Vec<BufferDescriptor>,
    writers: Vec<BufferWriter>,
}

impl BatchBody {
    fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            writers: Vec::new(),
        }
    }

    fn materialize(self) -> Vec<Buffer> {
        assert_eq!(
            self.descriptors.len(),
            self.writers.len(),
            "buffer descriptor/writer count mismatch"
        );
        self.descriptors
            .into_iter()
            .zip(self.writers)
            .map(|(descriptor, writer)| {
                let bytes = writer.materialize();
                assert_eq!(
                    bytes.len(),
                    descriptor.length,
                    "buffer writer produced a length that does not match its descriptor"
                );
                Buffer::from_vec(bytes)
            })
            .collect()
    }
}

/// Builds one Arrow `RecordBatch` from `blocks`, one block per column in
/// `bound`/`schema` order. All blocks must share the same `position_count`.
pub(crate) fn assemble(
    schema: &Arc<Schema>,
    bound: &[BoundColumn],
    blocks: &[&dyn Block],
) -> Result<RecordBatch, EncodeError> {
    debug_assert_eq!(bound.len(), blocks.len());

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(bound.len());
    for (column, block) in bound.iter().zip(blocks.iter().copied()) {
        arrays.push(build_array(column, *block)?);
    }

    RecordBatch::try_new(schema.clone(), arrays).map_err(EncodeError::SinkWrite)
}

fn build_array(column: &BoundColumn, block: &dyn Block) -> Result<ArrayRef, EncodeError> {
    let n = block.position_count();

    if matches!(column.converter, Converter::Null) {
        return Ok(new_null_array(&column.converter.arrow_field_type(), n));
    }

    let null_count = column.converter.null_count(block);

    let mut body = BatchBody::new();
    column
        .converter
        .convert(&column.name, block, &mut body.descriptors, &mut body.writers)?;
    let mut buffers = body.materialize();

    let validity = buffers.remove(0);
    let data_type = column.converter.arrow_field_type();

    let mut builder = ArrayData::builder(data_type)
        .len(n)
        .null_bit_buffer(Some(validity))
        .null_count(null_count);
    for buf in buffers {
        builder = builder.add_buffer(buf);
    }
    let array_data = builder.build().map_err(EncodeError::SinkWrite)?;

    Ok(make_array(array_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Vector, VectorBlock};
    use crate::schema::{bind, ColumnSpec};
    use arrow::array::{Array, Int32Array, StringArray};

    #[test]
    fn assembles_single_integer_column() {
        let columns = vec![ColumnSpec::new("a", "integer")];
        let (schema, bound) = bind(&columns).unwrap();
        let block = VectorBlock::new(Vector::Int32((0..10).collect()));
        let blocks: Vec<&dyn Block> = vec![&block];

        let batch = assemble(&schema, &bound, &blocks).unwrap();
        assert_eq!(batch.num_rows(), 10);
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(array.values().to_vec(), (0..10).collect::<Vec<i32>>());
    }

    #[test]
    fn assembles_keyword_column() {
        let columns = vec![ColumnSpec::new("b", "keyword")];
        let (schema, bound) = bind(&columns).unwrap();
        let rows = vec![b"foo".to_vec(), b"bar".to_vec()];
        let block = VectorBlock::new(Vector::Bytes(rows));
        let blocks: Vec<&dyn Block> = vec![&block];

        let batch = assemble(&schema, &bound, &blocks).unwrap();
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(array.value(0), "foo");
        assert_eq!(array.value(1), "bar");
    }

    #[test]
    fn assembles_with_nulls() {
        let columns = vec![ColumnSpec::new("a", "integer")];
        let (schema, bound) = bind(&columns).unwrap();
        let block = VectorBlock::with_validity(Vector::Int32(vec![1, 2, 3]), vec![true, false, true]);
        let blocks: Vec<&dyn Block> = vec![&block];

        let batch = assemble(&schema, &bound, &blocks).unwrap();
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert!(array.is_null(1));
        assert_eq!(array.null_count(), 1);
    }
}
