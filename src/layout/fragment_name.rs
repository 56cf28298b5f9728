//! Fragment directory naming and chronological ordering.
//!
//! A fragment directory is named `__<uuid>_<timestamp_ms>`. The field
//! after the last underscore is the creation timestamp in milliseconds;
//! fragments are ordered by it so readers apply write batches oldest
//! first. A malformed name is a load-time error, never a silent zero.

use std::path::PathBuf;

use crate::config::FRAGMENT_PREFIX;
use crate::error::{Result, StorageError};

/// Parses the embedded millisecond timestamp out of a fragment directory
/// path.
pub fn fragment_timestamp(fragment: &std::path::Path) -> Result<i64> {
    let name = fragment
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            StorageError::InvalidPath(format!(
                "fragment '{}' has no parsable basename",
                fragment.display()
            ))
        })?;

    if !name.starts_with(FRAGMENT_PREFIX) {
        return Err(StorageError::InvalidPath(format!(
            "fragment name '{name}' lacks the '{FRAGMENT_PREFIX}' prefix"
        )));
    }

    let stripped = &name[FRAGMENT_PREFIX.len()..];
    let timestamp = stripped.rsplit('_').next().unwrap_or("");
    if timestamp.is_empty() || timestamp == stripped {
        return Err(StorageError::InvalidPath(format!(
            "fragment name '{name}' carries no timestamp field"
        )));
    }

    timestamp.parse::<i64>().map_err(|_| {
        StorageError::InvalidPath(format!(
            "fragment name '{name}' has a malformed timestamp '{timestamp}'"
        ))
    })
}

/// Sorts fragment paths chronologically, stably: equal timestamps keep
/// their enumeration order.
pub fn sort_fragment_names(fragments: &mut Vec<PathBuf>) -> Result<()> {
    let mut keyed: Vec<(i64, usize)> = Vec::with_capacity(fragments.len());
    for (index, fragment) in fragments.iter().enumerate() {
        keyed.push((fragment_timestamp(fragment)?, index));
    }
    keyed.sort();

    let mut sorted = Vec::with_capacity(fragments.len());
    for (_, index) in &keyed {
        sorted.push(fragments[*index].clone());
    }
    *fragments = sorted;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn timestamp_is_the_last_underscore_field() {
        assert_eq!(
            fragment_timestamp(Path::new("/a/__3f9a_1700000000123")).unwrap(),
            1700000000123
        );
        assert_eq!(fragment_timestamp(Path::new("__x_y_42")).unwrap(), 42);
    }

    #[test]
    fn missing_prefix_is_fatal() {
        assert!(matches!(
            fragment_timestamp(Path::new("/a/frag_17")),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn malformed_timestamp_is_fatal() {
        assert!(matches!(
            fragment_timestamp(Path::new("/a/__uuid_notanumber")),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            fragment_timestamp(Path::new("/a/__justuuid")),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn fragments_sort_chronologically() {
        let mut fragments: Vec<PathBuf> = [5, 1, 3, 2, 4]
            .iter()
            .map(|t| PathBuf::from(format!("/arr/__u_{t}")))
            .collect();
        sort_fragment_names(&mut fragments).unwrap();
        let order: Vec<i64> = fragments
            .iter()
            .map(|f| fragment_timestamp(f).unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn equal_timestamps_keep_enumeration_order() {
        let mut fragments = vec![
            PathBuf::from("/arr/__b_7"),
            PathBuf::from("/arr/__a_7"),
            PathBuf::from("/arr/__c_3"),
        ];
        sort_fragment_names(&mut fragments).unwrap();
        assert_eq!(
            fragments,
            vec![
                PathBuf::from("/arr/__c_3"),
                PathBuf::from("/arr/__b_7"),
                PathBuf::from("/arr/__a_7"),
            ]
        );
    }
}
