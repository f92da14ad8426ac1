//! Priority-ordered resolution of report files under a platform root.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Walk `candidates` in priority order and return the first file that both
/// exists and parses as `T`, together with the relative path that won.
///
/// A file that exists but fails to read or parse is treated as absent
/// (logged as a warning, never fatal) and resolution continues with the
/// next candidate. No merging happens across candidates.
pub fn resolve<T: DeserializeOwned>(root: &Path, candidates: &[&str]) -> Option<(T, String)> {
    for rel in candidates {
        let path = root.join(rel);
        if !path.exists() {
            continue;
        }
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), %err, "could not read report file");
                continue;
            }
        };
        match serde_json::from_str::<T>(&text) {
            Ok(parsed) => return Some((parsed, (*rel).to_string())),
            Err(err) => {
                warn!(path = %path.display(), %err, "could not parse report file");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;

    #[test]
    fn first_parsed_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/a.json"), r#"{"which": "a"}"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"which": "b"}"#).unwrap();

        let (value, rel) =
            resolve::<Value>(dir.path(), &["nested/a.json", "b.json"]).unwrap();
        assert_eq!(value["which"], "a");
        assert_eq!(rel, "nested/a.json");
    }

    #[test]
    fn unparsable_candidate_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{not json").unwrap();
        fs::write(dir.path().join("b.json"), r#"{"which": "b"}"#).unwrap();

        let (value, rel) = resolve::<Value>(dir.path(), &["a.json", "b.json"]).unwrap();
        assert_eq!(value["which"], "b");
        assert_eq!(rel, "b.json");
    }

    #[test]
    fn no_candidates_found_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve::<Value>(dir.path(), &["a.json", "b.json"]).is_none());
    }
}
