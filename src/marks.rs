use crate::error::{Result, StencilError};
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Picks the image drawn inside `box_x` cells from a directory of marks.
#[derive(Debug, Clone, Default)]
pub struct MarkResolver {
    dir: Option<PathBuf>,
}

impl MarkResolver {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Non-hidden regular files of the mark directory, sorted by name.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Err(StencilError::AssetEnumeration {
                dir: PathBuf::new(),
                reason: "no mark directory configured".to_string(),
            });
        };
        let enumeration_error = |reason: String| StencilError::AssetEnumeration {
            dir: dir.clone(),
            reason,
        };
        let entries = std::fs::read_dir(dir).map_err(|err| enumeration_error(err.to_string()))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| enumeration_error(err.to_string()))?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let path = entry.path();
            if !hidden && path.is_file() {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(enumeration_error("directory has no mark images".to_string()));
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// A valid 0-based `position` selects that file; anything else picks
    /// one at random.
    pub fn pick(&self, position: Option<usize>) -> Result<PathBuf> {
        let mut files = self.list()?;
        let index = match position {
            Some(index) if index < files.len() => index,
            Some(index) => {
                log::debug!(
                    "mark position {index} out of range ({} marks), picking at random",
                    files.len()
                );
                random_index(files.len())
            }
            None => random_index(files.len()),
        };
        Ok(files.swap_remove(index))
    }
}

/// SipHash of the clock under a fresh per-call key; the modulo bias over a
/// 64-bit hash is negligible for directory-sized `len`.
fn random_index(len: usize) -> usize {
    let seed = RandomState::new().hash_one(SystemTime::now());
    (seed % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn mark_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.png", ".hidden.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        dir
    }

    #[test]
    fn lists_visible_files_by_name() {
        let dir = mark_dir();
        let resolver = MarkResolver::new(Some(dir.path().to_path_buf()));
        let names: Vec<_> = resolver
            .list()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn position_selects_by_index() {
        let dir = mark_dir();
        let resolver = MarkResolver::new(Some(dir.path().to_path_buf()));
        assert_eq!(resolver.pick(Some(1)).unwrap(), dir.path().join("b.png"));
    }

    #[test]
    fn out_of_range_or_missing_position_picks_some_mark() {
        let dir = mark_dir();
        let resolver = MarkResolver::new(Some(dir.path().to_path_buf()));
        let all = resolver.list().unwrap();
        for position in [None, Some(7)] {
            let picked = resolver.pick(position).unwrap();
            assert!(all.contains(&picked));
        }
    }

    #[test]
    fn random_picks_reach_every_mark() {
        let dir = mark_dir();
        let resolver = MarkResolver::new(Some(dir.path().to_path_buf()));
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..300 {
            seen.insert(resolver.pick(None).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn empty_missing_or_unset_directory_fails() {
        let empty = tempfile::tempdir().unwrap();
        for resolver in [
            MarkResolver::new(Some(empty.path().to_path_buf())),
            MarkResolver::new(Some(empty.path().join("absent"))),
            MarkResolver::new(None),
        ] {
            let err = resolver.pick(None).unwrap_err();
            assert!(matches!(err, StencilError::AssetEnumeration { .. }));
            assert!(err.is_fatal());
        }
    }
}
