//! Per-cell value transforms used by the variable-width block converters.
//!
//! These are pure functions: given the engine's native bytes for one cell,
//! produce the bytes that belong in the Arrow `Utf8`/`Binary` values buffer.
//! None of them allocate more than the size of their output.

use serde_json::Value as JsonValue;

/// `::ffff:0:0/96`, the IPv4-mapped IPv6 prefix.
const IPV4_MAPPED_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF];

/// Shortens an IPv4-mapped IPv6 address to its trailing 4 bytes.
///
/// `addr` must be exactly 16 bytes (a full IPv6 address). If it matches the
/// `::ffff:0:0/96` prefix the returned vector holds the last 4 bytes;
/// otherwise the input is returned unchanged.
pub fn shorten_ip(addr: &[u8]) -> Vec<u8> {
    if addr.len() == 16 && addr[..12] == IPV4_MAPPED_PREFIX {
        addr[12..].to_vec()
    } else {
        addr.to_vec()
    }
}

/// Renders a packed version value to its canonical textual form.
///
/// Wire format: `[major, minor, patch, suffix_len, suffix_bytes...]` — the
/// first three bytes are the major/minor/patch components, the fourth byte
/// `k` is the length of a trailing pre-release/build suffix, followed by
/// exactly `k` more bytes holding that suffix as UTF-8. Total input length
/// must equal `4 + k`.
///
/// Renders as `"{major}.{minor}.{patch}"`, with `"-{suffix}"` appended when
/// `k > 0`.
pub fn version_to_string(packed: &[u8]) -> Result<String, String> {
    if packed.len() < 4 {
        return Err(format!(
            "version value too short: need at least 4 bytes, got {}",
            packed.len()
        ));
    }
    let (major, minor, patch, suffix_len) = (packed[0], packed[1], packed[2], packed[3] as usize);
    if packed.len() != 4 + suffix_len {
        return Err(format!(
            "version value length mismatch: header declares suffix_len={}, total length is {}",
            suffix_len,
            packed.len()
        ));
    }
    let mut rendered = format!("{major}.{minor}.{patch}");
    if suffix_len > 0 {
        let suffix = std::str::from_utf8(&packed[4..])
            .map_err(|e| format!("version suffix is not valid UTF-8: {e}"))?;
        rendered.push('-');
        rendered.push_str(suffix);
    }
    Ok(rendered)
}

/// Re-encodes an engine-native `_source` document to canonical JSON bytes.
///
/// Wire format: byte 0 is a tag.
/// - `b'J'`: the remainder is UTF-8 JSON text, parsed and re-serialized
///   (key order preserved, whitespace canonicalized).
/// - `b'B'`: the remainder is a flat (non-nested) binary map: a little-endian
///   `u32` field count, then per field a little-endian `u16` key length, the
///   key's UTF-8 bytes, a `u8` value-type tag (`0`=null, `1`=bool, `2`=i64 LE,
///   `3`=f64 LE, `4`=string as `u32` LE length + UTF-8 bytes), and the value
///   payload.
///
/// Any other leading tag, a truncated field, or invalid UTF-8 is rejected.
pub fn source_to_json(raw: &[u8]) -> Result<Vec<u8>, String> {
    let Some((&tag, body)) = raw.split_first() else {
        return Err("_source value is empty".to_string());
    };
    let value = match tag {
        b'J' => {
            let text = std::str::from_utf8(body)
                .map_err(|e| format!("_source JSON payload is not valid UTF-8: {e}"))?;
            serde_json::from_str::<JsonValue>(text)
                .map_err(|e| format!("_source JSON payload failed to parse: {e}"))?
        }
        b'B' => parse_flat_binary_map(body)?,
        other => return Err(format!("_source value has unknown tag byte {other:#04x}")),
    };
    serde_json::to_vec(&value).map_err(|e| format!("failed to re-serialize _source JSON: {e}"))
}

fn parse_flat_binary_map(body: &[u8]) -> Result<JsonValue, String> {
    let mut cursor = 0usize;
    let count = read_u32(body, &mut cursor)? as usize;
    let mut map = serde_json::Map::with_capacity(count);
    for _ in 0..count {
        let key_len = read_u16(body, &mut cursor)? as usize;
        let key = read_utf8(body, &mut cursor, key_len)?;
        let type_tag = read_u8(body, &mut cursor)?;
        let value = match type_tag {
            0 => JsonValue::Null,
            1 => JsonValue::Bool(read_u8(body, &mut cursor)? != 0),
            2 => JsonValue::Number(read_i64(body, &mut cursor)?.into()),
            3 => {
                let f = read_f64(body, &mut cursor)?;
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .ok_or_else(|| format!("_source binary map field {key:?} is a non-finite float"))?
            }
            4 => {
                let str_len = read_u32(body, &mut cursor)? as usize;
                JsonValue::String(read_utf8(body, &mut cursor, str_len)?)
            }
            other => return Err(format!("_source binary map field {key:?} has unknown type tag {other}")),
        };
        map.insert(key, value);
    }
    Ok(JsonValue::Object(map))
}

fn read_u8(body: &[u8], cursor: &mut usize) -> Result<u8, String> {
    let b = body
        .get(*cursor)
        .ok_or("_source binary map truncated reading a u8")?;
    *cursor += 1;
    Ok(*b)
}

fn read_u16(body: &[u8], cursor: &mut usize) -> Result<u16, String> {
    let bytes = body
        .get(*cursor..*cursor + 2)
        .ok_or("_source binary map truncated reading a u16")?;
    *cursor += 2;
    Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_u32(body: &[u8], cursor: &mut usize) -> Result<u32, String> {
    let bytes = body
        .get(*cursor..*cursor + 4)
        .ok_or("_source binary map truncated reading a u32")?;
    *cursor += 4;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_i64(body: &[u8], cursor: &mut usize) -> Result<i64, String> {
    let bytes = body
        .get(*cursor..*cursor + 8)
        .ok_or("_source binary map truncated reading an i64")?;
    *cursor += 8;
    Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_f64(body: &[u8], cursor: &mut usize) -> Result<f64, String> {
    let bytes = body
        .get(*cursor..*cursor + 8)
        .ok_or("_source binary map truncated reading an f64")?;
    *cursor += 8;
    Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_utf8(body: &[u8], cursor: &mut usize, len: usize) -> Result<String, String> {
    let bytes = body
        .get(*cursor..*cursor + len)
        .ok_or("_source binary map truncated reading a string")?;
    *cursor += len;
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| format!("_source binary map string is not valid UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorten_ip_mapped_v4() {
        let mut addr = [0u8; 16];
        addr[10] = 0xFF;
        addr[11] = 0xFF;
        addr[12..].copy_from_slice(&[192, 0, 2, 1]);
        assert_eq!(shorten_ip(&addr), vec![192, 0, 2, 1]);
    }

    #[test]
    fn shorten_ip_native_v6_unchanged() {
        let addr = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(shorten_ip(&addr), addr.to_vec());
    }

    #[test]
    fn version_no_suffix() {
        let packed = [1u8, 2, 3, 0];
        assert_eq!(version_to_string(&packed).unwrap(), "1.2.3");
    }

    #[test]
    fn version_with_suffix() {
        let mut packed = vec![1u8, 2, 3, 4];
        packed.extend_from_slice(b"beta");
        assert_eq!(version_to_string(&packed).unwrap(), "1.2.3-beta");
    }

    #[test]
    fn version_rejects_truncated_suffix() {
        let packed = [1u8, 2, 3, 5, b'o', b'k'];
        assert!(version_to_string(&packed).is_err());
    }

    #[test]
    fn source_json_passthrough() {
        let mut raw = vec![b'J'];
        raw.extend_from_slice(br#"{"a": 1,  "b":  2}"#);
        let out = source_to_json(&raw).unwrap();
        let parsed: JsonValue = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["a"], 1);
        assert_eq!(parsed["b"], 2);
    }

    #[test]
    fn source_binary_map_round_trip() {
        let mut raw = vec![b'B'];
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&3u16.to_le_bytes());
        raw.extend_from_slice(b"foo");
        raw.push(2); // i64 tag
        raw.extend_from_slice(&42i64.to_le_bytes());

        let out = source_to_json(&raw).unwrap();
        let parsed: JsonValue = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["foo"], 42);
    }

    #[test]
    fn source_rejects_unknown_tag() {
        let raw = [b'X', 1, 2, 3];
        assert!(source_to_json(&raw).is_err());
    }
}
