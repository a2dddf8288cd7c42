//! Per-logical-type block converters.
//!
//! A [`Converter`] is a closed tagged union (not an open trait-object
//! hierarchy, per the dispatch strategy this crate follows): each variant
//! knows its Arrow field type and how to turn a [`Block`] into the ordered
//! buffer descriptors and writers a `RecordBatch` needs.

use crate::block::{Block, Vector};
use crate::error::EncodeError;
use crate::value;
use arrow::datatypes::{DataType, TimeUnit};

/// The declared byte length of one Arrow buffer, computed before the bytes
/// themselves exist.
pub struct BufferDescriptor {
    pub length: usize,
}

/// A deferred producer for one buffer's bytes.
///
/// Invoking `write` must produce exactly `length` bytes into the buffer it
/// is handed; [`crate::batch::BatchBody`] asserts this on every call.
pub struct BufferWriter {
    pub length: usize,
    write: Box<dyn FnOnce(&mut [u8]) -> usize>,
}

impl BufferWriter {
    pub fn new(length: usize, write: impl FnOnce(&mut [u8]) -> usize + 'static) -> Self {
        Self {
            length,
            write: Box::new(write),
        }
    }

    /// Runs the deferred write into a freshly allocated buffer of the
    /// declared length, returning the materialized bytes.
    pub fn materialize(self) -> Vec<u8> {
        let mut buf = vec![0u8; self.length];
        let written = (self.write)(&mut buf);
        debug_assert_eq!(written, self.length, "buffer writer produced the wrong length");
        buf
    }
}

/// Per-logical-type conversion strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    Null,
    Bool,
    Int32,
    Int64,
    UInt64,
    Float64,
    TimestampMillis,
    Utf8,
    Binary,
    Ip,
    VersionUtf8,
    SourceJson,
}

impl Converter {
    /// The Arrow type this converter declares in the Schema message.
    pub fn arrow_field_type(self) -> DataType {
        match self {
            Converter::Null => DataType::Null,
            Converter::Bool => DataType::Boolean,
            Converter::Int32 => DataType::Int32,
            Converter::Int64 => DataType::Int64,
            Converter::UInt64 => DataType::UInt64,
            Converter::Float64 => DataType::Float64,
            Converter::TimestampMillis => DataType::Timestamp(TimeUnit::Millisecond, None),
            Converter::Utf8 | Converter::VersionUtf8 | Converter::SourceJson => DataType::Utf8,
            Converter::Binary | Converter::Ip => DataType::Binary,
        }
    }

    /// Number of nulls in `block`, without scanning when the block reports
    /// it cannot contain any.
    pub fn null_count(self, block: &dyn Block) -> usize {
        if matches!(self, Converter::Null) {
            return block.position_count();
        }
        if !block.may_have_nulls() {
            return 0;
        }
        (0..block.position_count())
            .filter(|&i| block.is_null(i))
            .count()
    }

    /// Appends this column's buffer descriptors and writers to `descriptors`
    /// / `writers`, in Arrow's expected order (validity first, then
    /// offsets for variable-width types, then values).
    pub fn convert(
        self,
        column: &str,
        block: &dyn Block,
        descriptors: &mut Vec<BufferDescriptor>,
        writers: &mut Vec<BufferWriter>,
    ) -> Result<(), EncodeError> {
        if matches!(self, Converter::Null) {
            return Ok(());
        }

        let n = block.position_count();
        let Some(vector) = block.as_vector() else {
            return Err(EncodeError::UnsupportedBlockShape {
                column: column.to_string(),
                row: 0,
            });
        };

        let validity = build_validity_buffer(block, n);
        push_buffer(descriptors, writers, validity);

        match self {
            Converter::Bool => {
                let Vector::Bool(values) = vector else {
                    return Err(type_mismatch(column, "bool"));
                };
                let values = values.clone();
                let buf = build_bitpacked_values(&values);
                push_buffer(descriptors, writers, buf);
            }
            Converter::Int32 => {
                let Vector::Int32(values) = vector else {
                    return Err(type_mismatch(column, "i32"));
                };
                push_fixed_width(descriptors, writers, values, |v| v.to_le_bytes().to_vec());
            }
            Converter::Int64 | Converter::TimestampMillis => {
                let Vector::Int64(values) = vector else {
                    return Err(type_mismatch(column, "i64"));
                };
                push_fixed_width(descriptors, writers, values, |v| v.to_le_bytes().to_vec());
            }
            Converter::UInt64 => {
                let Vector::UInt64(values) = vector else {
                    return Err(type_mismatch(column, "u64"));
                };
                push_fixed_width(descriptors, writers, values, |v| v.to_le_bytes().to_vec());
            }
            Converter::Float64 => {
                let Vector::Float64(values) = vector else {
                    return Err(type_mismatch(column, "f64"));
                };
                push_fixed_width(descriptors, writers, values, |v| v.to_le_bytes().to_vec());
            }
            Converter::Utf8 | Converter::Binary => {
                let Vector::Bytes(rows) = vector else {
                    return Err(type_mismatch(column, "bytes"));
                };
                push_variable_width(column, descriptors, writers, rows, |row| Ok(row.clone()))?;
            }
            Converter::Ip => {
                let Vector::Bytes(rows) = vector else {
                    return Err(type_mismatch(column, "bytes"));
                };
                push_variable_width(column, descriptors, writers, rows, |row| {
                    Ok(value::shorten_ip(row))
                })?;
            }
            Converter::VersionUtf8 => {
                let Vector::Bytes(rows) = vector else {
                    return Err(type_mismatch(column, "bytes"));
                };
                push_variable_width(column, descriptors, writers, rows, |row| {
                    match value::version_to_string(row) {
                        Ok(s) => Ok(s.into_bytes()),
                        Err(reason) => {
                            tracing::warn!(column, reason, "version transform failed, emitting empty cell");
                            Ok(Vec::new())
                        }
                    }
                })?;
            }
            Converter::SourceJson => {
                let Vector::Bytes(rows) = vector else {
                    return Err(type_mismatch(column, "bytes"));
                };
                push_variable_width(column, descriptors, writers, rows, |row| {
                    match value::source_to_json(row) {
                        Ok(bytes) => Ok(bytes),
                        Err(reason) => {
                            tracing::warn!(column, reason, "_source transform failed, emitting empty cell");
                            Ok(Vec::new())
                        }
                    }
                })?;
            }
            Converter::Null => unreachable!("handled above"),
        }

        Ok(())
    }
}

fn type_mismatch(column: &str, expected: &str) -> EncodeError {
    EncodeError::UnsupportedBlockShape {
        column: format!("{column} (expected a {expected} vector)"),
        row: 0,
    }
}

fn push_buffer(
    descriptors: &mut Vec<BufferDescriptor>,
    writers: &mut Vec<BufferWriter>,
    bytes: Vec<u8>,
) {
    descriptors.push(BufferDescriptor {
        length: bytes.len(),
    });
    let len = bytes.len();
    writers.push(BufferWriter::new(len, move |out| {
        out.copy_from_slice(&bytes);
        len
    }));
}

fn push_fixed_width<T: Copy>(
    descriptors: &mut Vec<BufferDescriptor>,
    writers: &mut Vec<BufferWriter>,
    values: &[T],
    to_le_bytes: impl Fn(T) -> Vec<u8>,
) {
    let mut buf = Vec::with_capacity(values.len() * std::mem::size_of::<T>());
    for &v in values {
        buf.extend_from_slice(&to_le_bytes(v));
    }
    push_buffer(descriptors, writers, buf);
}

fn push_variable_width(
    column: &str,
    descriptors: &mut Vec<BufferDescriptor>,
    writers: &mut Vec<BufferWriter>,
    rows: &[Vec<u8>],
    transform: impl Fn(&[u8]) -> Result<Vec<u8>, EncodeError>,
) -> Result<(), EncodeError> {
    let mut transformed = Vec::with_capacity(rows.len());
    let mut cumulative: u64 = 0;
    for (row_idx, row) in rows.iter().enumerate() {
        let out = transform(row)?;
        cumulative += out.len() as u64;
        if cumulative > i32::MAX as u64 {
            return Err(EncodeError::OffsetOverflow {
                column: column.to_string(),
                row: row_idx,
                cumulative,
            });
        }
        transformed.push(out);
    }

    let mut offsets = Vec::with_capacity((rows.len() + 1) * 4);
    let mut running: i32 = 0;
    offsets.extend_from_slice(&running.to_le_bytes());
    for row in &transformed {
        running += row.len() as i32;
        offsets.extend_from_slice(&running.to_le_bytes());
    }
    push_buffer(descriptors, writers, offsets);

    let mut values = Vec::with_capacity(running as usize);
    for row in transformed {
        values.extend_from_slice(&row);
    }
    push_buffer(descriptors, writers, values);

    Ok(())
}

/// Builds the bit-packed validity buffer for `block`, taking the fast
/// "all valid" path when the block cannot contain nulls.
fn build_validity_buffer(block: &dyn Block, n: usize) -> Vec<u8> {
    let byte_len = n.div_ceil(8);
    if !block.may_have_nulls() {
        let mut buf = vec![0xFFu8; byte_len];
        let remainder = n % 8;
        if remainder != 0 {
            *buf.last_mut().unwrap() = (1u8 << remainder) - 1;
        }
        return buf;
    }

    let mut buf = vec![0u8; byte_len];
    for i in 0..n {
        if !block.is_null(i) {
            buf[i / 8] |= 1 << (i % 8);
        }
    }
    buf
}

fn build_bitpacked_values(values: &[bool]) -> Vec<u8> {
    let byte_len = values.len().div_ceil(8);
    let mut buf = vec![0u8; byte_len];
    for (i, &v) in values.iter().enumerate() {
        if v {
            buf[i / 8] |= 1 << (i % 8);
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::VectorBlock;

    #[test]
    fn validity_all_valid_fast_path() {
        let block = VectorBlock::new(Vector::Int32(vec![0; 10]));
        let buf = build_validity_buffer(&block, 10);
        assert_eq!(buf, vec![0xFF, 0x03]);
    }

    #[test]
    fn validity_exact_multiple_of_eight() {
        let block = VectorBlock::new(Vector::Int32(vec![0; 16]));
        let buf = build_validity_buffer(&block, 16);
        assert_eq!(buf, vec![0xFF, 0xFF]);
    }

    #[test]
    fn validity_with_nulls() {
        let block = VectorBlock::with_validity(Vector::Int32(vec![0; 3]), vec![true, false, true]);
        let buf = build_validity_buffer(&block, 3);
        assert_eq!(buf, vec![0b0000_0101]);
    }

    #[test]
    fn int32_converter_layout() {
        let block = VectorBlock::new(Vector::Int32((0..10).collect()));
        let mut descriptors = Vec::new();
        let mut writers = Vec::new();
        Converter::Int32
            .convert("a", &block, &mut descriptors, &mut writers)
            .unwrap();

        assert_eq!(descriptors.len(), 2);
        let mut bufs: Vec<Vec<u8>> = writers.into_iter().map(BufferWriter::materialize).collect();
        let values = bufs.pop().unwrap();
        let validity = bufs.pop().unwrap();
        assert_eq!(validity, vec![0xFF, 0x03]);
        let expected: Vec<u8> = (0i32..10).flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn keyword_converter_offsets() {
        let rows: Vec<Vec<u8>> = (0..10)
            .map(|i| if i % 2 == 0 { b"foo".to_vec() } else { b"bar".to_vec() })
            .collect();
        let block = VectorBlock::new(Vector::Bytes(rows));
        let mut descriptors = Vec::new();
        let mut writers = Vec::new();
        Converter::Utf8
            .convert("b", &block, &mut descriptors, &mut writers)
            .unwrap();

        assert_eq!(descriptors.len(), 3);
        let bufs: Vec<Vec<u8>> = writers.into_iter().map(BufferWriter::materialize).collect();
        let offsets = &bufs[1];
        let expected_offsets: Vec<u8> = (0..=10i32).map(|i| i * 3).flat_map(|o| o.to_le_bytes()).collect();
        assert_eq!(offsets, &expected_offsets);
        assert_eq!(bufs[2], b"foobarfoobarfoobarfoobarfoobar".to_vec());
    }

    #[test]
    fn ip_converter_shortens_ipv4_mapped_addresses() {
        let mut addr = [0u8; 16];
        addr[10] = 0xFF;
        addr[11] = 0xFF;
        addr[12..].copy_from_slice(&[192, 0, 2, 1]);

        let block = VectorBlock::new(Vector::Bytes(vec![addr.to_vec()]));
        let converter = crate::registry::resolve("addr", "ip").unwrap();
        assert_eq!(converter, Converter::Ip);

        let mut descriptors = Vec::new();
        let mut writers = Vec::new();
        converter
            .convert("addr", &block, &mut descriptors, &mut writers)
            .unwrap();

        assert_eq!(descriptors.len(), 3);
        let bufs: Vec<Vec<u8>> = writers.into_iter().map(BufferWriter::materialize).collect();
        let mut expected_offsets = 0i32.to_le_bytes().to_vec();
        expected_offsets.extend_from_slice(&4i32.to_le_bytes());
        assert_eq!(bufs[1], expected_offsets);
        assert_eq!(bufs[2], vec![0xC0, 0x00, 0x02, 0x01]);
    }

    #[test]
    fn multi_valued_block_is_rejected() {
        let block = crate::block::MultiValuedBlock { position_count: 3 };
        let mut descriptors = Vec::new();
        let mut writers = Vec::new();
        let err = Converter::Int32
            .convert("c", &block, &mut descriptors, &mut writers)
            .unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedBlockShape { .. }));
    }
}
