//! Static lookup table mapping logical column type names to [`Converter`]s.

use crate::converters::Converter;
use crate::error::EncodeError;

/// `(logical_type_name, converter)` pairs. Kept as a flat slice rather than
/// a `HashMap` — the set is small and fixed at compile time, so a linear
/// scan is simpler and just as fast.
const REGISTRY: &[(&str, Converter)] = &[
    ("null", Converter::Null),
    ("unsupported", Converter::Null),
    ("boolean", Converter::Bool),
    ("integer", Converter::Int32),
    ("counter_integer", Converter::Int32),
    ("long", Converter::Int64),
    ("counter_long", Converter::Int64),
    ("unsigned_long", Converter::UInt64),
    ("double", Converter::Float64),
    ("counter_double", Converter::Float64),
    ("date", Converter::TimestampMillis),
    ("keyword", Converter::Utf8),
    ("text", Converter::Utf8),
    ("ip", Converter::Ip),
    ("version", Converter::VersionUtf8),
    ("geo_point", Converter::Binary),
    ("geo_shape", Converter::Binary),
    ("cartesian_point", Converter::Binary),
    ("cartesian_shape", Converter::Binary),
    ("_source", Converter::SourceJson),
];

/// Resolves a logical type name to its converter.
///
/// Fails fast with `UnsupportedType` for any name not in the table above;
/// this is the only place that check happens, so every caller downstream
/// of column construction can assume the converter is valid.
pub fn resolve(column: &str, logical_type: &str) -> Result<Converter, EncodeError> {
    REGISTRY
        .iter()
        .find(|(name, _)| *name == logical_type)
        .map(|(_, converter)| *converter)
        .ok_or_else(|| EncodeError::UnsupportedType {
            column: column.to_string(),
            type_name: logical_type.to_string(),
        })
}
