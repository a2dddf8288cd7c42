//! The chunked response producer: a finite sequence of Schema, Page, and
//! End-of-stream chunks.

use crate::batch;
use crate::block::Block;
use crate::error::EncodeError;
use crate::schema::{self, BoundColumn, ColumnSpec};
use crate::serialization;
use arrow::datatypes::Schema as ArrowSchema;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// MIME type this encoder's chunks are emitted under.
pub const CONTENT_TYPE: &str = "application/vnd.apache.arrow.stream";

/// A thread-confined recycler for the `Vec<u8>` buffers chunks are encoded
/// into. Cloning a `BufferPool` shares the same underlying free list — this
/// type is deliberately `!Send`/`!Sync`, matching the single-threaded,
/// cooperative scheduling model this encoder assumes.
#[derive(Clone)]
pub struct BufferPool {
    free: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            free: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn acquire(&self) -> Vec<u8> {
        self.free.borrow_mut().pop().unwrap_or_default()
    }

    fn recycle(&self, mut buf: Vec<u8>) {
        buf.clear();
        self.free.borrow_mut().push(buf);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// One releasable chunk of encoded bytes.
///
/// The buffer is returned to its pool at most once, whichever comes first
/// of an explicit [`Chunk::release`] or the chunk being dropped — "release
/// exactly once" is enforced by the type rather than by caller discipline.
pub struct Chunk {
    bytes: Option<Vec<u8>>,
    pool: BufferPool,
}

impl Chunk {
    fn new(bytes: Vec<u8>, pool: BufferPool) -> Self {
        Self {
            bytes: Some(bytes),
            pool,
        }
    }

    /// The encoded bytes. Empty once released.
    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_deref().unwrap_or(&[])
    }

    /// Returns this chunk's buffer to its pool. A no-op if already released
    /// (including by `Drop`).
    pub fn release(mut self) {
        self.take_and_recycle();
    }

    fn take_and_recycle(&mut self) {
        if let Some(buf) = self.bytes.take() {
            self.pool.recycle(buf);
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        self.take_and_recycle();
    }
}

enum Stage {
    Schema,
    Page(usize),
    End,
    Done,
    /// A prior `encode_chunk` call returned an error. Terminal, same as
    /// `Done`: no further chunk is ever produced for this response.
    Failed,
}

/// Drives the Schema → Pages → End sequence for one query result.
pub struct ChunkedResponse {
    schema: Arc<ArrowSchema>,
    bound: Vec<BoundColumn>,
    pages: Vec<Vec<Box<dyn Block>>>,
    stage: Stage,
}

impl ChunkedResponse {
    /// Binds `columns` against the type registry and prepares a producer
    /// over `pages`. Fails with `UnsupportedType` if any column's logical
    /// type is not registered; no chunk is produced in that case.
    pub fn new(
        columns: &[ColumnSpec],
        pages: Vec<Vec<Box<dyn Block>>>,
    ) -> Result<Self, EncodeError> {
        let (schema, bound) = schema::bind(columns)?;
        Ok(Self {
            schema,
            bound,
            pages,
            stage: Stage::Schema,
        })
    }

    /// The schema this response encodes against.
    pub fn schema(&self) -> &Arc<ArrowSchema> {
        &self.schema
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    /// Whether every chunk (Schema, every page, End) has already been
    /// produced, or a prior call failed and left the producer terminal.
    pub fn is_done(&self) -> bool {
        matches!(self.stage, Stage::Done | Stage::Failed)
    }

    /// Produces the next chunk. `size_hint` is accepted but ignored: this
    /// encoder is page-at-a-time, one producer per chunk.
    ///
    /// On error the producer becomes terminal — its sink is released before
    /// the error propagates, and no further chunk is ever produced for this
    /// response.
    ///
    /// # Panics
    ///
    /// Panics if called after [`ChunkedResponse::is_done`] returns `true` —
    /// calling past the end of the sequence, or past a prior failure, is a
    /// caller error, not a recoverable data condition.
    pub fn encode_chunk(&mut self, _size_hint: usize, pool: &BufferPool) -> Result<Chunk, EncodeError> {
        let mut buf = pool.acquire();
        let result = match &self.stage {
            Stage::Schema => serialization::encode_schema_into(&self.schema, &mut buf),
            Stage::Page(index) => {
                let blocks: Vec<&dyn Block> = self.pages[*index].iter().map(|b| b.as_ref()).collect();
                batch::assemble(&self.schema, &self.bound, &blocks)
                    .and_then(|rb| serialization::encode_batch_into(&rb, &mut buf))
            }
            Stage::End => {
                serialization::encode_end_of_stream_into(&mut buf);
                Ok(())
            }
            Stage::Done => panic!("encode_chunk called after the response is already done"),
            Stage::Failed => panic!("encode_chunk called after a prior chunk failed"),
        };

        if let Err(err) = result {
            pool.recycle(buf);
            self.stage = Stage::Failed;
            return Err(err);
        }

        self.stage = match &self.stage {
            Stage::Schema if self.pages.is_empty() => Stage::End,
            Stage::Schema => Stage::Page(0),
            Stage::Page(index) if *index + 1 < self.pages.len() => Stage::Page(index + 1),
            Stage::Page(_) => Stage::End,
            Stage::End => Stage::Done,
            Stage::Done => Stage::Done,
            Stage::Failed => Stage::Failed,
        };

        tracing::debug!(stage = ?std::mem::discriminant(&self.stage), bytes = buf.len(), "encoded chunk");
        Ok(Chunk::new(buf, pool.clone()))
    }
}
