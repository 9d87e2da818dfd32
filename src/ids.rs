//! Stable document identifiers.
//!
//! An id is `<slug>-<hash>` where the slug comes from the file name and the
//! hash covers the relative path plus the slug. Given the walker's sorted
//! output, collisions get `-2`, `-3`, … in first-seen order, so re-runs over
//! the same tree always hand out the same ids.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Hex characters kept from the digest.
pub const HASH_LEN: usize = 10;
pub const MAX_SLUG_LEN: usize = 40;

/// Lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
            if slug.len() >= MAX_SLUG_LEN {
                break;
            }
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Id before collision handling.
pub fn base_id(rel_path: &str, stem: &str) -> String {
    let slug = slugify(stem);
    let mut hasher = Sha256::new();
    hasher.update(rel_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(slug.as_bytes());
    let digest = hex::encode(hasher.finalize());
    let hash = &digest[..HASH_LEN];
    if slug.is_empty() {
        hash.to_string()
    } else {
        format!("{}-{}", slug, hash)
    }
}

/// Hands out unique ids for one run. Feed documents in walker order.
#[derive(Debug, Default)]
pub struct IdAssigner {
    issued: HashSet<String>,
}

impl IdAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, rel_path: &str, stem: &str) -> String {
        let base = base_id(rel_path, stem);
        let mut candidate = base.clone();
        let mut n = 1;
        while self.issued.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{}", base, n);
        }
        self.issued.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("Dear Mom -- 2024_03_05"), "dear-mom-2024-03-05");
        assert_eq!(slugify("  给妈妈的信 "), "");
        assert_eq!(slugify("0929 给妈妈 note"), "0929-note");
        assert_eq!(slugify(&"a".repeat(80)).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn base_id_is_deterministic() {
        let a = base_id("03 letters/Dear Mom.txt", "Dear Mom");
        let b = base_id("03 letters/Dear Mom.txt", "Dear Mom");
        assert_eq!(a, b);
        assert!(a.starts_with("dear-mom-"));
        assert_eq!(a.len(), "dear-mom-".len() + HASH_LEN);

        let other = base_id("04 letters/Dear Mom.txt", "Dear Mom");
        assert_ne!(a, other);
    }

    #[test]
    fn slugless_ids_are_bare_hashes() {
        let id = base_id("信/给妈妈.txt", "给妈妈");
        assert_eq!(id.len(), HASH_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn collisions_get_ordered_suffixes() {
        let mut assigner = IdAssigner::new();
        let first = assigner.assign("a.txt", "a");
        let second = assigner.assign("a.txt", "a");
        let third = assigner.assign("a.txt", "a");
        assert_eq!(second, format!("{}-2", first));
        assert_eq!(third, format!("{}-3", first));

        let mut again = IdAssigner::new();
        assert_eq!(again.assign("a.txt", "a"), first);
        assert_eq!(again.assign("a.txt", "a"), second);
    }
}
