//! Encoding of the `sync_details` status blob.
//!
//! The blob is the task's structured sync state, JSON encoded and zstd
//! compressed. Nothing outside this module interprets it.

use serde_json::Value;

use crate::domain::errors::{DomainError, DomainResult};

const COMPRESSION_LEVEL: i32 = 3;

/// Compress structured sync state. Equal inputs produce equal bytes, which
/// lets callers skip status writes when nothing changed.
pub fn compress_sync_details(state: &Value) -> DomainResult<Vec<u8>> {
    let json = serde_json::to_vec(state)?;
    zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
        .map_err(|e| DomainError::CompressionError(e.to_string()))
}

/// Inverse of [`compress_sync_details`]. An empty blob decodes to `null`.
pub fn decompress_sync_details(bytes: &[u8]) -> DomainResult<Value> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let json = zstd::decode_all(bytes).map_err(|e| DomainError::CompressionError(e.to_string()))?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compression_is_deterministic() {
        let state = json!({"pages": {"https://example.com": {"etag": "abc"}}});
        assert_eq!(
            compress_sync_details(&state).unwrap(),
            compress_sync_details(&state).unwrap()
        );
    }

    #[test]
    fn test_decompress_restores_state() {
        let state = json!({"cursor": 42, "done": false});
        let bytes = compress_sync_details(&state).unwrap();
        assert_eq!(decompress_sync_details(&bytes).unwrap(), state);
    }

    #[test]
    fn test_empty_blob_is_null() {
        assert_eq!(decompress_sync_details(&[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = decompress_sync_details(b"not zstd").unwrap_err();
        assert!(matches!(err, DomainError::CompressionError(_)));
    }
}
