//! Identifier utilities
//!
//! Meal, dish and stage ids are opaque strings. Freshly minted ids are UUIDv4
//! in hyphenated form; ids read back from stored or imported documents are
//! kept as-is.

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new opaque document id
pub fn new_id() -> String {
    generate().to_string()
}

/// Return `id` unchanged unless it is blank, in which case mint a fresh one
pub fn ensure_id(id: &str) -> String {
    if id.trim().is_empty() {
        new_id()
    } else {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_is_uuid() {
        let id = new_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn test_ensure_id_keeps_existing() {
        assert_eq!(ensure_id("roast-1"), "roast-1");
    }

    #[test]
    fn test_ensure_id_replaces_blank() {
        let id = ensure_id("  ");
        assert!(!id.trim().is_empty());
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
