//! Module source transport
//!
//! The engine asks a [`Fetch`] collaborator for the text behind a module
//! URL. A fetcher must return the same text for the same URL for the
//! lifetime of an engine.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while fetching module text
#[derive(Debug, Error)]
pub enum FetchError {
    /// No module behind the URL
    #[error("Module not found: {url}")]
    NotFound {
        /// Requested URL
        url: String,
    },

    /// URL cannot be mapped by this fetcher
    #[error("Invalid module URL: {url}")]
    InvalidUrl {
        /// Requested URL
        url: String,
    },

    /// IO error while reading
    #[error("IO error reading {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Transport collaborator
pub trait Fetch {
    /// Return the text of the module at `url`
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// In-memory fetcher, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MapFetcher {
    sources: FxHashMap<String, String>,
}

impl MapFetcher {
    /// Create an empty fetcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for `url`
    pub fn insert(&mut self, url: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(url.into(), text.into());
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(url, text);
        self
    }
}

impl Fetch for MapFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.sources
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound { url: url.to_string() })
    }
}

/// Reads `{root}/{segments of url}.json`, where the URL is split on `:`
/// and `/` (so `weft:core` maps to `weft/core.json`)
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
    extension: String,
}

impl FileFetcher {
    /// Fetch from files under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "json".to_string(),
        }
    }

    /// Use a different file extension
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a URL maps to
    pub fn path_for(&self, url: &str) -> Result<PathBuf, FetchError> {
        let invalid = || FetchError::InvalidUrl { url: url.to_string() };
        let segments: Vec<&str> = url.split([':', '/']).collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'))
        {
            return Err(invalid());
        }
        let mut path = self.root.clone();
        for segment in &segments {
            path.push(segment);
        }
        path.set_extension(&self.extension);
        Ok(path)
    }
}

impl Fetch for FileFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let path = self.path_for(url)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::NotFound { url: url.to_string() }),
            Err(source) => Err(FetchError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_map_fetcher() {
        let fetcher = MapFetcher::new().with("app", "{}");
        assert_eq!(fetcher.fetch("app").unwrap(), "{}");
        assert!(matches!(fetcher.fetch("other"), Err(FetchError::NotFound { .. })));
    }

    #[test]
    fn test_file_fetcher_maps_url_segments() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("weft")).unwrap();
        std::fs::write(dir.path().join("weft/core.json"), "core").unwrap();

        let fetcher = FileFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("weft:core").unwrap(), "core");
        assert!(matches!(fetcher.fetch("weft:missing"), Err(FetchError::NotFound { .. })));
    }

    #[test]
    fn test_file_fetcher_rejects_escapes() {
        let fetcher = FileFetcher::new("/tmp/modules");
        assert!(matches!(fetcher.path_for("../etc/passwd"), Err(FetchError::InvalidUrl { .. })));
        assert!(matches!(fetcher.path_for("a//b"), Err(FetchError::InvalidUrl { .. })));
        assert_eq!(
            fetcher.path_for("games/chess").unwrap(),
            PathBuf::from("/tmp/modules/games/chess.json")
        );
    }
}
