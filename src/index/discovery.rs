//! File discovery from search patterns.

use std::path::Path;

use glob::Pattern;
use tracing::info;

use super::{dir_string, DatasetIndex};
use crate::accessor::Accessor;
use crate::error::{CurateError, Result};

/// Split a search pattern into a base directory (ending in `/`) and a
/// filename glob.
pub(crate) fn split_search_pattern(pattern: &str) -> (String, String) {
    match pattern.rfind('/') {
        Some(pos) => (pattern[..=pos].to_string(), pattern[pos + 1..].to_string()),
        None => ("./".to_string(), pattern.to_string()),
    }
}

fn compile(glob: &str) -> Result<Pattern> {
    Pattern::new(glob).map_err(|e| CurateError::InvalidTemplate {
        template: glob.to_string(),
        reason: e.to_string(),
    })
}

impl<A: Accessor> DatasetIndex<A> {
    /// Discover files matching `pattern` and index them.
    ///
    /// The pattern is a directory path followed by a filename glob, e.g.
    /// `data/tas_*.nc`. Files are indexed in directory enumeration order.
    ///
    /// Besides `*` and `?` the glob accepts `[...]` and `[!...]` character
    /// classes. A `**` component matches like `*`, since only plain
    /// filenames are matched. A malformed glob is an `InvalidTemplate` error.
    pub fn populate(&mut self, pattern: &str) -> Result<()> {
        if self.is_populated() {
            return Err(CurateError::State(
                "file_list has already been initialized".to_string(),
            ));
        }

        let (base_dir, glob) = split_search_pattern(pattern);
        let glob = compile(&glob)?;
        let names = self.accessor.list_directory(Path::new(&base_dir))?;

        self.base_dir = base_dir;
        self.filenames = names.into_iter().filter(|n| glob.matches(n)).collect();
        info!(
            "Found {} files matching \"{}\" in {}",
            self.filenames.len(),
            glob,
            self.base_dir
        );

        self.index_files(0)
    }

    /// Discover further files in the base directory and index only those.
    ///
    /// Filenames already listed are skipped. Rejected once the index is
    /// locked.
    pub fn append(&mut self, glob: &str) -> Result<()> {
        self.require_unlocked("append to")?;
        if self.filenames.is_empty() {
            return self.populate(glob);
        }

        let pattern = compile(glob)?;
        let names = self.accessor.list_directory(Path::new(&self.base_dir))?;

        let first_new = self.filenames.len();
        for name in names {
            if pattern.matches(&name) && !self.filenames.contains(&name) {
                self.filenames.push(name);
            }
        }
        info!("Appending {} files", self.filenames.len() - first_new);

        self.index_files(first_new)
    }

    /// Use an explicit list of files instead of a search pattern.
    pub fn populate_from_files(&mut self, base_dir: &Path, filenames: Vec<String>) -> Result<()> {
        if self.is_populated() {
            return Err(CurateError::State(
                "file_list has already been initialized".to_string(),
            ));
        }
        self.base_dir = dir_string(base_dir);
        self.filenames = filenames;
        self.index_files(0)
    }
}
