//! Binary key/value block carried in `ArrowSchema::metadata`.
//!
//! Layout: `int32 N`, then `N` times `int32 key_len, key, int32 value_len,
//! value`. Integers are native-endian, strings are UTF-8 without a
//! terminator.

use std::ffi::c_char;
use std::slice;

use crate::api::ApiError;

const LEN: usize = size_of::<i32>();

/// Encode key/value pairs into a metadata block.
///
/// # Errors
///
/// Returns `ApiError` if the pair count or a string length exceeds `i32::MAX`.
pub fn encode<K, V>(pairs: &[(K, V)]) -> Result<Vec<u8>, ApiError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let size = LEN
        + pairs
            .iter()
            .map(|(k, v)| 2 * LEN + k.as_ref().len() + v.as_ref().len())
            .sum::<usize>();
    let mut out = Vec::with_capacity(size);

    out.extend_from_slice(&to_i32(pairs.len())?.to_ne_bytes());
    for (key, value) in pairs {
        for s in [key.as_ref(), value.as_ref()] {
            out.extend_from_slice(&to_i32(s.len())?.to_ne_bytes());
            out.extend_from_slice(s.as_bytes());
        }
    }
    Ok(out)
}

/// Decode a metadata block.
///
/// # Errors
///
/// Returns `ApiError` on truncated input, negative lengths, non-UTF-8
/// strings or trailing bytes.
pub fn decode(bytes: &[u8]) -> Result<Vec<(String, String)>, ApiError> {
    let mut reader = Reader { bytes, pos: 0 };
    let count = reader.len()?;
    let mut pairs = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let key = reader.string()?;
        let value = reader.string()?;
        pairs.push((key, value));
    }
    if reader.pos != bytes.len() {
        return Err(ApiError::invalid_metadata(format!(
            "{} trailing bytes after {count} metadata entries",
            bytes.len() - reader.pos
        )));
    }
    Ok(pairs)
}

/// Decode a metadata block straight from a schema's `metadata` pointer.
///
/// A null pointer decodes to no entries.
///
/// # Safety
///
/// A non-null `ptr` must point to a complete, well-framed metadata block.
pub unsafe fn decode_raw(ptr: *const c_char) -> Result<Vec<(String, String)>, ApiError> {
    if ptr.is_null() {
        return Ok(Vec::new());
    }
    let bytes = ptr.cast::<u8>();
    // The block is self-delimiting: walk the length prefixes to find its size.
    let read_len = |at: usize| -> Result<usize, ApiError> {
        // SAFETY: the caller guarantees the block extends past every prefix.
        let raw = unsafe { bytes.add(at).cast::<i32>().read_unaligned() };
        usize::try_from(raw)
            .map_err(|_| ApiError::invalid_metadata(format!("negative length {raw} at {at}")))
    };
    let count = read_len(0)?;
    let mut size = LEN;
    for _ in 0..count.saturating_mul(2) {
        size += LEN + read_len(size)?;
    }
    // SAFETY: size covers exactly the framed block walked above.
    decode(unsafe { slice::from_raw_parts(bytes, size) })
}

fn to_i32(n: usize) -> Result<i32, ApiError> {
    i32::try_from(n).map_err(|_| ApiError::invalid_metadata(format!("length {n} exceeds i32")))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], ApiError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                ApiError::invalid_metadata(format!(
                    "metadata truncated: need {n} bytes at offset {}",
                    self.pos
                ))
            })?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn len(&mut self) -> Result<usize, ApiError> {
        let at = self.pos;
        let mut raw = [0u8; LEN];
        raw.copy_from_slice(self.take(LEN)?);
        let n = i32::from_ne_bytes(raw);
        usize::try_from(n)
            .map_err(|_| ApiError::invalid_metadata(format!("negative length {n} at {at}")))
    }

    fn string(&mut self) -> Result<String, ApiError> {
        let n = self.len()?;
        let raw = self.take(n)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| ApiError::invalid_metadata(format!("metadata is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_endian = "little")]
    fn test_encode_exact_bytes() {
        let bytes = encode(&[("key1", "value1")]).unwrap();
        let mut expected = vec![1, 0, 0, 0, 4, 0, 0, 0];
        expected.extend_from_slice(b"key1");
        expected.extend_from_slice(&[6, 0, 0, 0]);
        expected.extend_from_slice(b"value1");
        assert_eq!(bytes, expected);

        assert_eq!(
            decode(&expected).unwrap(),
            vec![("key1".to_string(), "value1".to_string())]
        );
    }

    #[test]
    fn test_empty_block() {
        let bytes = encode::<&str, &str>(&[]).unwrap();
        assert_eq!(bytes.len(), 4);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_multiple_pairs_and_empty_strings() {
        let pairs = vec![
            ("ARROW:extension:name".to_string(), "uuid".to_string()),
            (String::new(), "no key".to_string()),
            ("ü".to_string(), String::new()),
        ];
        let bytes = encode(&pairs).unwrap();
        assert_eq!(decode(&bytes).unwrap(), pairs);
    }

    #[test]
    fn test_decode_raw_matches_decode() {
        let bytes = encode(&[("a", "1"), ("bb", "22")]).unwrap();
        // SAFETY: bytes is a complete block
        let decoded = unsafe { decode_raw(bytes.as_ptr().cast()) }.unwrap();
        assert_eq!(decoded, decode(&bytes).unwrap());

        // SAFETY: null is allowed
        assert!(unsafe { decode_raw(std::ptr::null()) }.unwrap().is_empty());
    }

    #[test]
    fn test_truncated_block() {
        let bytes = encode(&[("key1", "value1")]).unwrap();
        let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.code(), crate::api::codes::INVALID_METADATA);
    }

    #[test]
    fn test_negative_length() {
        let mut bytes = 1i32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&(-3i32).to_ne_bytes());
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = encode(&[("k", "v")]).unwrap();
        bytes.push(0);
        assert!(decode(&bytes).is_err());
    }
}
