use std::path::{Path, PathBuf};

/// A file discovered in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileInfo {
    pub path: PathBuf,
}

impl FileInfo {
    pub fn from_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
    }

    /// Document URI used as the store's ownership key.
    pub fn uri(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}
