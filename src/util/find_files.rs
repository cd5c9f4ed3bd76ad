use std::path::{Path, PathBuf};

/// Regular files directly inside `dir` whose name matches a glob such as
/// `*.src.rpm`, sorted by name. A missing directory has no matches.
pub fn find_files(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut matches: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| fast_glob::glob_match(pattern, name))
        })
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.src.rpm", "a.src.rpm", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("c.src.rpm")).unwrap();

        let found = find_files(dir.path(), "*.src.rpm");
        assert_eq!(
            found,
            vec![dir.path().join("a.src.rpm"), dir.path().join("b.src.rpm")]
        );
        assert!(find_files(&dir.path().join("missing"), "*").is_empty());
    }
}
