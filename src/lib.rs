//! Streaming encoder that serializes a columnar query result into the
//! Apache Arrow IPC Streaming format, emitted as a sequence of
//! independently-producible byte chunks suitable for an HTTP chunked
//! transfer: one Schema message, zero or more RecordBatch messages, and an
//! end-of-stream marker.

pub mod batch;
pub mod block;
pub mod chunk;
pub mod converters;
pub mod error;
pub mod registry;
pub mod schema;
pub mod serialization;
pub mod value;

pub use block::{Block, MultiValuedBlock, Vector, VectorBlock};
pub use chunk::{BufferPool, Chunk, ChunkedResponse};
pub use error::EncodeError;
pub use schema::ColumnSpec;
