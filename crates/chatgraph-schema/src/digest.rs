//! Schema digests (versioned).
//!
//! A digest identifies the exact schema text submitted to the server, so a
//! load report or a log line can say which schema a dataset was loaded under.
//!
//! - algorithm: **FNV-1a 64-bit**
//! - input: the UTF-8 bytes of the rendered schema text
//! - output: `"fnv1a64:<16 lowercase hex digits>"`
//!
//! Not a security primitive.

/// Prefix used in serialized digests.
pub const SCHEMA_DIGEST_V1_PREFIX: &str = "fnv1a64:";

/// Compute a v1 digest (FNV-1a 64-bit) over arbitrary bytes.
pub fn fnv1a64_digest_bytes(bytes: &[u8]) -> String {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x00000100000001b3;

    let mut hash = FNV_OFFSET_BASIS;
    for b in bytes {
        hash ^= (*b) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    format!("{SCHEMA_DIGEST_V1_PREFIX}{hash:016x}")
}

/// Compute the v1 digest for rendered schema text.
pub fn schema_digest_v1(text: &str) -> String {
    fnv1a64_digest_bytes(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_has_expected_prefix_and_width() {
        let d = schema_digest_v1("name: string .\n");
        assert!(d.starts_with(SCHEMA_DIGEST_V1_PREFIX));
        assert_eq!(d.len(), SCHEMA_DIGEST_V1_PREFIX.len() + 16);
    }

    #[test]
    fn digest_changes_with_text() {
        assert_ne!(
            schema_digest_v1("name: string .\n"),
            schema_digest_v1("name: string @index(exact) .\n")
        );
    }
}
