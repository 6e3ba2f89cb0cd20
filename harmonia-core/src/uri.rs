//! Pure predicates enforcing shape constraints on templated URIs.
//!
//! Every function here fails with [`crate::error::GraphError::InvalidUri`]
//! when its predicate is violated; none of them perform I/O except
//! [`makedirs`].

use crate::error::{GraphError, Result};

pub fn has_scheme(uri: &str) -> Result<()> {
    if uri.contains("://") {
        Ok(())
    } else {
        Err(GraphError::InvalidUri {
            uri: uri.to_string(),
            reason: "URI must contain a protocol (\"://\")",
        })
    }
}

pub fn is_file_scheme(uri: &str) -> Result<()> {
    if uri.starts_with("file://") {
        Ok(())
    } else {
        Err(GraphError::InvalidUri {
            uri: uri.to_string(),
            reason: "local URI must start with 'file://'",
        })
    }
}

pub fn has_name(uri: &str) -> Result<()> {
    if uri.contains("{name}") {
        Ok(())
    } else {
        Err(GraphError::InvalidUri {
            uri: uri.to_string(),
            reason: "URI must contain a name indicator ({name})",
        })
    }
}

pub fn has_version(uri: &str) -> Result<()> {
    if uri.contains("{version}") {
        Ok(())
    } else {
        Err(GraphError::InvalidUri {
            uri: uri.to_string(),
            reason: "URI must contain a version indicator ({version})",
        })
    }
}

/// Require `elements` to contain no duplicates (by `Ord`/`Eq`) and return
/// them in their natural sorted order — the canonical form used throughout
/// the data model so serialization is deterministic.
pub fn ensure_unique_elements<T>(context: &'static str, elements: Vec<T>) -> Result<Vec<T>>
where
    T: Ord + Clone + std::fmt::Display,
{
    let mut sorted = elements;
    sorted.sort();
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            return Err(GraphError::DuplicateElement {
                context,
                element: pair[0].to_string(),
            });
        }
    }
    Ok(sorted)
}

/// No-op for non-`file://` URIs. For `file://` URIs, creates the parent
/// directory of the path portion (after stripping the scheme), idempotently.
/// A single-segment path (no parent directory) is a no-op.
pub fn makedirs(uri: &str) -> std::io::Result<()> {
    let Some(path) = uri.strip_prefix("file://") else {
        return Ok(());
    };
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn has_scheme_rejects_uris_without_protocol() {
        assert!(has_scheme("file://./a").is_ok());
        assert!(has_scheme("./a").is_err());
    }

    #[test]
    fn is_file_scheme_rejects_non_file_uris() {
        assert!(is_file_scheme("file://./a").is_ok());
        assert!(is_file_scheme("s3://bucket/a").is_err());
    }

    #[test]
    fn has_name_and_has_version_check_literal_tokens() {
        assert!(has_name("file://./{name}").is_ok());
        assert!(has_name("file://./x").is_err());
        assert!(has_version("file://./{version}").is_ok());
        assert!(has_version("file://./x").is_err());
    }

    #[test]
    fn ensure_unique_elements_sorts_and_rejects_duplicates() {
        let sorted = ensure_unique_elements("edges", vec!["c", "a", "b"]).unwrap();
        assert_eq!(sorted, vec!["a", "b", "c"]);
        assert!(ensure_unique_elements("edges", vec!["a", "a"]).is_err());
    }

    #[test]
    fn makedirs_is_idempotent_and_noop_for_other_schemes_and_single_segment() {
        let dir = tempfile::tempdir().unwrap();
        let nested = format!("file://{}/a/b/c.txt", dir.path().display());
        makedirs(&nested).unwrap();
        makedirs(&nested).unwrap();
        assert!(dir.path().join("a/b").is_dir());

        assert!(makedirs("s3://bucket/a/b").is_ok());
        assert!(makedirs("file://single.txt").is_ok());
    }

    proptest! {
        /// For any set of distinct integers, in any iteration order, the
        /// canonical form `ensure_unique_elements` returns is their sorted
        /// order with nothing dropped or added.
        #[test]
        fn ensure_unique_elements_canonicalizes_any_distinct_set(
            xs in prop::collection::hash_set(-1000i32..1000, 0..30)
        ) {
            let input: Vec<i32> = xs.iter().copied().collect();
            let mut expected: Vec<i32> = input.clone();
            expected.sort();

            let result = ensure_unique_elements("xs", input).unwrap();
            prop_assert_eq!(result, expected);
        }
    }
}
