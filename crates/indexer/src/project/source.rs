use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ignore::WalkBuilder;
use tracing::warn;

use crate::execution::config::IndexingConfig;
use crate::project::file_info::FileInfo;

// File sources decouple how files are discovered from how they are indexed:
//
// - PathFileSource walks a directory on disk, used by the CLI.
// - ListFileSource serves a known list of files, used when an editor hands
//   over the set of changed paths.

pub trait FileSource {
    type Error: std::fmt::Display + Send + Sync + 'static;

    fn get_files(&self, config: &IndexingConfig) -> Result<Vec<FileInfo>, Self::Error>;
}

pub struct PathFileSource {
    pub root: PathBuf,
}

impl PathFileSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl FileSource for PathFileSource {
    type Error = std::io::Error;

    fn get_files(&self, config: &IndexingConfig) -> Result<Vec<FileInfo>, Self::Error> {
        if !self.root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root.display()),
            ));
        }

        let files = Arc::new(Mutex::new(Vec::new()));

        WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(config.respect_gitignore)
            .git_global(false)
            .git_exclude(config.respect_gitignore)
            .ignore(config.respect_gitignore)
            .parents(false)
            .require_git(false)
            .threads(config.worker_threads)
            .build_parallel()
            .run(|| {
                let files: Arc<Mutex<Vec<FileInfo>>> = Arc::clone(&files);

                Box::new(move |result| {
                    match result {
                        Ok(entry) => {
                            if entry.file_type().is_some_and(|ft| ft.is_file()) {
                                let file_info = FileInfo::from_path(entry.path().to_path_buf());
                                if should_process_file_info(&file_info, config) {
                                    if let Ok(mut files) = files.lock() {
                                        files.push(file_info);
                                    }
                                }
                            }
                        }
                        Err(e) => warn!("Skipping unreadable entry: {e}"),
                    }
                    ignore::WalkState::Continue
                })
            });

        let mut files = match Arc::try_unwrap(files) {
            Ok(files) => files.into_inner().unwrap_or_else(|e| e.into_inner()),
            Err(files) => files.lock().map(|f| f.clone()).unwrap_or_default(),
        };
        // The parallel walk yields entries in arbitrary order.
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

pub struct ListFileSource {
    pub files: Vec<FileInfo>,
}

impl ListFileSource {
    pub fn new(files: Vec<FileInfo>) -> Self {
        Self { files }
    }
}

impl FileSource for ListFileSource {
    type Error = std::convert::Infallible;

    fn get_files(&self, config: &IndexingConfig) -> Result<Vec<FileInfo>, Self::Error> {
        Ok(self
            .files
            .iter()
            .filter(|file_info| should_process_file_info(file_info, config))
            .cloned()
            .collect())
    }
}

fn should_process_file_info(file_info: &FileInfo, config: &IndexingConfig) -> bool {
    config.accepts_extension(file_info.extension())
}
