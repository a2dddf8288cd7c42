//! The engine-facing column representation this crate consumes.
//!
//! The query engine that produces these blocks lives elsewhere; what matters
//! here is the narrow capability set a block must expose so a
//! [`crate::converters::Converter`] can turn it into Arrow buffers.

/// One column's values for a page, viewed as a flat (single-valued) vector.
///
/// A block whose cells are multi-valued has no `Vector` representation and
/// reports that via [`Block::as_vector`] returning `None`; such blocks are
/// rejected by the converters with `UnsupportedBlockShape`.
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    Bool(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float64(Vec<f64>),
    /// Raw per-row bytes, used for `keyword`, `text`, `ip`, `version`,
    /// `_source`, and WKB geo/cartesian columns alike; the converter applies
    /// whatever value transform the logical type calls for.
    Bytes(Vec<Vec<u8>>),
}

/// Capability set a query-engine column block must expose.
///
/// `position_count` is the number of rows; `may_have_nulls` lets a converter
/// skip a null scan entirely when it is known false; `is_null` is the
/// authoritative per-row presence check; `as_vector` exposes the flat typed
/// view a converter actually reads values from.
pub trait Block {
    fn position_count(&self) -> usize;
    fn may_have_nulls(&self) -> bool;
    fn is_null(&self, row: usize) -> bool;
    fn as_vector(&self) -> Option<&Vector>;
}

/// A straightforward in-memory [`Block`] implementation.
///
/// This is the concrete block type used throughout this crate's own tests
/// and is a reasonable adapter for an engine that already materializes
/// columns as plain Rust vectors; engines with a different native layout
/// are expected to provide their own `Block` implementation rather than
/// going through this one.
pub struct VectorBlock {
    vector: Vector,
    validity: Option<Vec<bool>>,
}

impl VectorBlock {
    /// Builds a block with no nulls.
    pub fn new(vector: Vector) -> Self {
        Self {
            vector,
            validity: None,
        }
    }

    /// Builds a block with an explicit per-row validity mask (`true` = valid).
    ///
    /// Panics if `validity.len()` does not match the vector's length; this
    /// is a programmer error in the caller, not a data-dependent failure.
    pub fn with_validity(vector: Vector, validity: Vec<bool>) -> Self {
        assert_eq!(
            vector_len(&vector),
            validity.len(),
            "validity mask length must match vector length"
        );
        Self {
            vector,
            validity: Some(validity),
        }
    }
}

fn vector_len(vector: &Vector) -> usize {
    match vector {
        Vector::Bool(v) => v.len(),
        Vector::Int32(v) => v.len(),
        Vector::Int64(v) => v.len(),
        Vector::UInt64(v) => v.len(),
        Vector::Float64(v) => v.len(),
        Vector::Bytes(v) => v.len(),
    }
}

impl Block for VectorBlock {
    fn position_count(&self) -> usize {
        vector_len(&self.vector)
    }

    fn may_have_nulls(&self) -> bool {
        self.validity.is_some()
    }

    fn is_null(&self, row: usize) -> bool {
        match &self.validity {
            Some(mask) => !mask[row],
            None => false,
        }
    }

    fn as_vector(&self) -> Option<&Vector> {
        Some(&self.vector)
    }
}

/// A block reported as holding multi-valued cells; always rejected by the
/// block converters with `UnsupportedBlockShape`.
pub struct MultiValuedBlock {
    pub position_count: usize,
}

impl Block for MultiValuedBlock {
    fn position_count(&self) -> usize {
        self.position_count
    }

    fn may_have_nulls(&self) -> bool {
        true
    }

    fn is_null(&self, _row: usize) -> bool {
        false
    }

    fn as_vector(&self) -> Option<&Vector> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_block_no_nulls() {
        let block = VectorBlock::new(Vector::Int32(vec![1, 2, 3]));
        assert_eq!(block.position_count(), 3);
        assert!(!block.may_have_nulls());
        assert!(!block.is_null(1));
    }

    #[test]
    fn vector_block_with_validity() {
        let block = VectorBlock::with_validity(Vector::Int32(vec![1, 2, 3]), vec![true, false, true]);
        assert!(block.may_have_nulls());
        assert!(block.is_null(1));
        assert!(!block.is_null(0));
    }

    #[test]
    fn multi_valued_block_has_no_vector() {
        let block = MultiValuedBlock { position_count: 4 };
        assert!(block.as_vector().is_none());
    }
}
