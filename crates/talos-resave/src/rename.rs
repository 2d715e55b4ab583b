//! Rename requests and the path substitution map.

use rustc_hash::FxHashMap;

/// One file to rename: old and new game-root-relative paths, plus whether
/// to delete the original after a successful batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResaveFile {
    pub old_path: String,
    pub new_path: String,
    pub delete_old: bool,
}

impl ResaveFile {
    /// Build a rename request; paths are normalized to forward slashes.
    pub fn new(old_path: impl Into<String>, new_path: impl Into<String>, delete_old: bool) -> Self {
        Self {
            old_path: normalize(old_path.into()),
            new_path: normalize(new_path.into()),
            delete_old,
        }
    }
}

fn normalize(path: String) -> String {
    if path.contains('\\') {
        path.replace('\\', "/")
    } else {
        path
    }
}

/// The authoritative old-path to new-path substitution map for one batch.
#[derive(Clone, Debug, Default)]
pub struct RenameMap {
    map: FxHashMap<String, String>,
}

impl RenameMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the map from a batch's rename requests.
    pub fn from_files(files: &[ResaveFile]) -> Self {
        let mut map = Self::new();
        for file in files {
            map.insert(file.old_path.clone(), file.new_path.clone());
        }
        map
    }

    /// Add one substitution.
    pub fn insert(&mut self, old_path: impl Into<String>, new_path: impl Into<String>) {
        self.map
            .insert(normalize(old_path.into()), normalize(new_path.into()));
    }

    /// New path for `old_path`, if it is being renamed.
    pub fn get(&self, old_path: &str) -> Option<&str> {
        self.map.get(old_path).map(String::as_str)
    }

    /// Whether `path` is one of the old paths.
    pub fn contains(&self, path: &str) -> bool {
        self.map.contains_key(path)
    }

    /// Whether the map holds no substitutions.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of substitutions.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Iterate over (old, new) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
