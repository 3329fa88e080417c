//! Shared helpers: run ids, storage-safe keys, content digests, topic text cleanup.

use std::sync::OnceLock;

use chrono::Local;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Separator placed between fields before digesting, so that
/// ("ab", "c") and ("a", "bc") produce different fingerprints.
const FIELD_SEPARATOR: u8 = 0x1f;

/// Create a run id that encodes the current time.
pub fn generate_run_id() -> String {
    Local::now().format("%Y%m%d%H%M%S%3f").to_string()
}

/// Create a run id that encodes the current time and marks a test run.
pub fn generate_test_run_id() -> String {
    format!("Test{}", generate_run_id())
}

/// Characters that keyed table stores commonly reject in partition/row keys.
fn disallowed_key_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\\#%+/?\x00-\x1f\x7f-\x9f]").expect("key regex is valid"))
}

/// Encode a string so it is safe to use as a table partition or row key.
///
/// Safe characters pass through unchanged to keep keys human-readable;
/// disallowed characters are replaced with the hex encoding of their
/// UTF-8 bytes.
pub fn table_key(raw: &str) -> String {
    let re = disallowed_key_chars();
    let mut safe = String::with_capacity(raw.len());
    for c in raw.chars() {
        let mut buf = [0u8; 4];
        let encoded = c.encode_utf8(&mut buf);
        if re.is_match(encoded) {
            safe.push_str(&hex::encode(encoded.as_bytes()));
        } else {
            safe.push(c);
        }
    }
    safe
}

/// Derive a 64-bit content fingerprint from an ordered set of fields.
///
/// Stable across runs for identical input; changes whenever any field
/// changes. Not a cryptographic commitment: collisions are tolerated as a
/// low-probability missed update that self-corrects on the next run.
pub fn fingerprint(fields: &[&str]) -> u64 {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([FIELD_SEPARATOR]);
    }
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().expect("digest is at least 8 bytes"))
}

/// Neutralize "hashtags" in topic titles and text by adding a space
/// after `#`.
///
/// Route and stop names routinely contain strings such as `#1234` that the
/// discussion platform would otherwise index as hashtags.
pub fn defuse_hashtags(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if c != '#' {
            continue;
        }
        // a hashtag starts at the beginning of the string or after whitespace
        let starts_tag = i == 0 || chars[i - 1].is_whitespace();
        // and must have at least one non-whitespace character after the #
        let has_body = chars.get(i + 1).is_some_and(|n| !n.is_whitespace());
        if starts_tag && has_body {
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_is_timestamp_shaped() {
        let id = generate_run_id();
        assert_eq!(id.len(), 17);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_test_run_id_is_marked() {
        assert!(generate_test_run_id().starts_with("Test"));
    }

    #[test]
    fn test_table_key_passes_safe_strings_through() {
        assert_eq!(table_key("Route_1_44"), "Route_1_44");
        assert_eq!(table_key("puget-sound"), "puget-sound");
    }

    #[test]
    fn test_table_key_encodes_disallowed_chars() {
        assert_eq!(table_key("a/b"), "a2fb");
        assert_eq!(table_key("a#b"), "a23b");
        assert_eq!(table_key("a?b"), "a3fb");
        assert_eq!(table_key("a\u{0001}b"), "a01b");
    }

    #[test]
    fn test_fingerprint_is_idempotent() {
        let a = fingerprint(&["Route_1_44", "44", "Ballard - Downtown"]);
        let b = fingerprint(&["Route_1_44", "44", "Ballard - Downtown"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_changes_with_any_field() {
        let base = fingerprint(&["Route_1_44", "44", "Ballard"]);
        assert_ne!(base, fingerprint(&["Route_1_44", "45", "Ballard"]));
        assert_ne!(base, fingerprint(&["Route_1_44", "44", "Fremont"]));
    }

    #[test]
    fn test_fingerprint_respects_field_boundaries() {
        assert_ne!(fingerprint(&["ab", "c"]), fingerprint(&["a", "bc"]));
    }

    #[test]
    fn test_defuse_hashtags() {
        assert_eq!(defuse_hashtags("#1234"), "# 1234");
        assert_eq!(defuse_hashtags("stop #1234 north"), "stop # 1234 north");
        assert_eq!(defuse_hashtags("x#y"), "x#y");
        assert_eq!(defuse_hashtags("trailing #"), "trailing #");
        assert_eq!(defuse_hashtags(""), "");
    }
}
