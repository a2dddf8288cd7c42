//! Column/schema binding: resolving logical column specs into an Arrow
//! [`Schema`] and the converters that will later do the actual encoding.

use crate::converters::Converter;
use crate::error::EncodeError;
use crate::registry;
use arrow::datatypes::{Field, Schema};
use std::sync::Arc;

/// One column of the result set: a name and a logical type name from the
/// registry.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub logical_type: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, logical_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logical_type: logical_type.into(),
        }
    }
}

/// A validated, resolved column: its name, Arrow field, and converter.
pub(crate) struct BoundColumn {
    pub name: String,
    pub converter: Converter,
}

/// Resolves `columns` against the type registry and builds the Arrow schema
/// that will head the chunked response.
///
/// Fails with `UnsupportedType` on the first column whose logical type has
/// no registered converter; no partial schema is ever produced.
pub(crate) fn bind(columns: &[ColumnSpec]) -> Result<(Arc<Schema>, Vec<BoundColumn>), EncodeError> {
    let mut fields = Vec::with_capacity(columns.len());
    let mut bound = Vec::with_capacity(columns.len());

    for column in columns {
        let converter = registry::resolve(&column.name, &column.logical_type)?;
        fields.push(Field::new(&column.name, converter.arrow_field_type(), true));
        bound.push(BoundColumn {
            name: column.name.clone(),
            converter,
        });
    }

    Ok((Arc::new(Schema::new(fields)), bound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_known_columns() {
        let columns = vec![
            ColumnSpec::new("a", "integer"),
            ColumnSpec::new("b", "keyword"),
        ];
        let (schema, bound) = bind(&columns).unwrap();
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(bound.len(), 2);
        assert_eq!(schema.field(0).name(), "a");
        assert_eq!(schema.field(1).name(), "b");
    }

    #[test]
    fn rejects_unknown_logical_type() {
        let columns = vec![ColumnSpec::new("a", "nonsense")];
        let err = bind(&columns).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedType { .. }));
    }
}
