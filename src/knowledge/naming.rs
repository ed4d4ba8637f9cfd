//! Per-user collection naming.
//!
//! The mapping is injective: every character outside `[a-z0-9]` is escaped
//! with a marker that cannot appear unescaped, so ids differing only in
//! punctuation or case never share a collection.

use std::fmt::Write as _;

/// Prefix shared by every collection name.
pub const COLLECTION_PREFIX: &str = "music_profile_";

/// Deterministic collection name for a user id.
#[must_use]
pub fn collection_name(user_id: &str) -> String {
    let mut name = String::with_capacity(COLLECTION_PREFIX.len() + user_id.len() * 2);
    name.push_str(COLLECTION_PREFIX);
    for ch in user_id.chars() {
        match ch {
            'a'..='z' | '0'..='9' => name.push(ch),
            '-' => name.push_str("_h"),
            '_' => name.push_str("_u"),
            'A'..='Z' => {
                name.push_str("_c");
                name.push(ch.to_ascii_lowercase());
            }
            other => {
                let _ = write!(name, "_x{:06x}", u32::from(other));
            }
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name_is_stable() {
        assert_eq!(collection_name("user-1"), collection_name("user-1"));
        assert_eq!(collection_name("user-1"), "music_profile_user_h1");
    }

    #[test]
    fn test_punctuation_variants_do_not_collide() {
        assert_ne!(collection_name("a-b"), collection_name("a_b"));
        assert_ne!(collection_name("a.b"), collection_name("a-b"));
        assert_ne!(collection_name("AB"), collection_name("ab"));
        assert_ne!(collection_name("a_hb"), collection_name("a-hb"));
    }

    #[test]
    fn test_names_are_valid_sql_identifiers() {
        for id in ["31abc", "Jöhn Doe", "x'; DROP TABLE y;--", ""] {
            let name = collection_name(id);
            assert!(name.starts_with(COLLECTION_PREFIX));
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            );
        }
    }
}
