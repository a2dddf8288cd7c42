//! Low-level Arrow IPC message framing.
//!
//! Wraps `arrow-rs`'s `IpcDataGenerator` output with the Arrow IPC stream
//! framing (continuation marker, little-endian metadata length, padded
//! flatbuffer header, body) that a conforming reader expects.

use crate::error::EncodeError;
use arrow::datatypes::Schema;
use arrow::ipc::writer::{
    CompressionContext, DictionaryTracker, EncodedData, IpcDataGenerator, IpcWriteOptions,
};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Arrow IPC continuation marker: precedes every message's metadata length,
/// and precedes the zero-length trailer that ends a stream.
const CONTINUATION_MARKER: u32 = 0xFFFF_FFFF;

/// Writes one IPC message to `buffer` following the Apache Arrow IPC format:
/// continuation marker, little-endian metadata size, the metadata
/// flatbuffer padded to an 8-byte boundary, then the message body.
///
/// See the [Arrow IPC format](https://arrow.apache.org/docs/format/Columnar.html#format-ipc).
fn write_ipc_message(buffer: &mut Vec<u8>, encoded: &EncodedData) {
    buffer.extend_from_slice(&CONTINUATION_MARKER.to_le_bytes());

    let metadata_size = encoded.ipc_message.len() as i32;
    buffer.extend_from_slice(&metadata_size.to_le_bytes());
    buffer.extend_from_slice(&encoded.ipc_message);

    let padding = (8 - (encoded.ipc_message.len() % 8)) % 8;
    buffer.extend(std::iter::repeat_n(0u8, padding));

    buffer.extend_from_slice(&encoded.arrow_data);
}

/// Encodes the Arrow `Schema` message for `schema`, appending it to `buffer`.
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use arrow::datatypes::{Field, Schema};
/// # use arrow_stream_encoder::serialization::encode_schema_into;
/// let schema = Arc::new(Schema::new(vec![
///     Field::new("col1", arrow::datatypes::DataType::Int32, false),
/// ]));
/// let mut buffer = Vec::new();
/// encode_schema_into(&schema, &mut buffer).unwrap();
/// assert!(buffer.starts_with(&[0xFF, 0xFF, 0xFF, 0xFF]));
/// ```
pub fn encode_schema_into(schema: &Arc<Schema>, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
    let options = IpcWriteOptions::default();
    let data_gen = IpcDataGenerator::default();
    let mut dictionary_tracker = DictionaryTracker::new(false);

    let encoded_schema =
        data_gen.schema_to_bytes_with_dictionary_tracker(schema, &mut dictionary_tracker, &options);
    write_ipc_message(buffer, &encoded_schema);
    Ok(())
}

/// Encodes one `RecordBatch` message for `batch`, appending it (and any
/// dictionary batches it requires) to `buffer`.
pub fn encode_batch_into(batch: &RecordBatch, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
    let options = IpcWriteOptions::default();
    let data_gen = IpcDataGenerator::default();
    let mut dictionary_tracker = DictionaryTracker::new(false);
    let mut compression_context = CompressionContext::default();

    let (encoded_dictionaries, encoded_batch) = data_gen.encode(
        batch,
        &mut dictionary_tracker,
        &options,
        &mut compression_context,
    )?;

    for dict in encoded_dictionaries {
        write_ipc_message(buffer, &dict);
    }
    write_ipc_message(buffer, &encoded_batch);
    Ok(())
}

/// Appends the Arrow IPC stream end-of-stream marker: the continuation
/// marker followed by a zero-length trailer.
pub fn encode_end_of_stream_into(buffer: &mut Vec<u8>) {
    buffer.extend_from_slice(&CONTINUATION_MARKER.to_le_bytes());
    buffer.extend_from_slice(&0i32.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;
    use arrow::datatypes::{DataType, Field};
    use arrow::ipc::reader::StreamReader;

    #[test]
    fn schema_message_starts_with_continuation_marker() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("col1", DataType::Int32, false),
            Field::new("col2", DataType::Utf8, true),
        ]));

        let mut buffer = Vec::new();
        encode_schema_into(&schema, &mut buffer).unwrap();
        assert!(!buffer.is_empty());
        assert!(buffer.starts_with(&[0xFF, 0xFF, 0xFF, 0xFF]));
    }

    #[test]
    fn end_of_stream_is_exactly_eight_zero_tail_bytes() {
        let mut buffer = Vec::new();
        encode_end_of_stream_into(&mut buffer);
        assert_eq!(buffer, vec![0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);
    }

    #[test]
    fn full_stream_round_trips_through_stream_reader() {
        let schema = Arc::new(Schema::new(vec![Field::new("col1", DataType::Int32, false)]));
        let array = Int32Array::from(vec![1, 2, 3]);
        let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(array)]).unwrap();

        let mut buffer = Vec::new();
        encode_schema_into(&schema, &mut buffer).unwrap();
        encode_batch_into(&batch, &mut buffer).unwrap();
        encode_end_of_stream_into(&mut buffer);

        let reader = StreamReader::try_new(std::io::Cursor::new(buffer), None).unwrap();
        let batches: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 3);
    }
}
