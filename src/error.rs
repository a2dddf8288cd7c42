//! Error type for the streaming Arrow IPC encoder.

use thiserror::Error;

/// Everything that can go wrong while building and emitting a chunked
/// Arrow IPC stream.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A column was constructed with a logical type name that has no
    /// registered converter.
    #[error("unsupported logical type {type_name:?} for column {column:?}")]
    UnsupportedType {
        column: String,
        type_name: String,
    },

    /// A block could not be viewed as a flat vector (it carries multi-valued
    /// cells), which this encoder does not support.
    #[error("column {column:?} has a block shape this encoder cannot flatten (row {row})")]
    UnsupportedBlockShape { column: String, row: usize },

    /// A variable-width column's cumulative offset exceeded the 32-bit
    /// offset range Arrow's `Utf8`/`Binary` layout uses.
    #[error("column {column:?} offset overflow at row {row}: cumulative length {cumulative} exceeds i32::MAX")]
    OffsetOverflow {
        column: String,
        row: usize,
        cumulative: u64,
    },

    /// A per-cell value transform (`version`, `_source`, `ip`, ...) rejected
    /// its input. Under the lenient policy this is recoverable per-cell and
    /// never reaches the caller as an error; it is kept here for callers
    /// that opt into the strict policy.
    #[error("value transform failed for column {column:?} at row {row}: {reason}")]
    ValueTransform {
        column: String,
        row: usize,
        reason: String,
    },

    /// The Arrow IPC message could not be serialized, or the downstream
    /// sink rejected the bytes.
    #[error("failed to write encoded Arrow IPC bytes: {0}")]
    SinkWrite(#[from] arrow::error::ArrowError),
}
