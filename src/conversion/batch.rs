use crate::constants::{AUDIO_EXTENSIONS, MAX_BATCH_FILES, VIDEO_EXTENSIONS};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("You can only add up to {max} files")]
    Full { max: usize },
    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: String },
    #[error("File is already queued: {path}")]
    Duplicate { path: String },
    #[error("Index {index} is out of range")]
    OutOfRange { index: usize },
}

pub fn is_supported_media(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn is_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Result of adding several files at once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddReport {
    pub added: usize,
    pub unsupported: Vec<PathBuf>,
    pub duplicates: usize,
    pub limit_reached: bool,
}

/// Ordered queue of media files, at most `MAX_BATCH_FILES` long.
///
/// Extensions are checked on insertion only; a file that disappears later is
/// reported by the job as a per-file failure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileBatch {
    files: Vec<PathBuf>,
}

impl FileBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>) -> Result<(), BatchError> {
        let path = path.into();
        if !is_supported_media(&path) {
            return Err(BatchError::UnsupportedFormat {
                path: path.display().to_string(),
            });
        }
        if self.files.contains(&path) {
            return Err(BatchError::Duplicate {
                path: path.display().to_string(),
            });
        }
        if self.files.len() >= MAX_BATCH_FILES {
            return Err(BatchError::Full { max: MAX_BATCH_FILES });
        }
        self.files.push(path);
        Ok(())
    }

    pub fn add_many<I, P>(&mut self, paths: I) -> AddReport
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut report = AddReport::default();
        for path in paths {
            let path = path.into();
            match self.add(path.clone()) {
                Ok(()) => report.added += 1,
                Err(BatchError::UnsupportedFormat { .. }) => report.unsupported.push(path),
                Err(BatchError::Duplicate { .. }) => report.duplicates += 1,
                Err(BatchError::Full { .. }) => report.limit_reached = true,
                Err(BatchError::OutOfRange { .. }) => {}
            }
        }
        report
    }

    pub fn remove(&mut self, index: usize) -> Result<PathBuf, BatchError> {
        if index >= self.files.len() {
            return Err(BatchError::OutOfRange { index });
        }
        Ok(self.files.remove(index))
    }

    /// Moves the entry at `from` so that it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), BatchError> {
        let len = self.files.len();
        if from >= len {
            return Err(BatchError::OutOfRange { index: from });
        }
        if to >= len {
            return Err(BatchError::OutOfRange { index: to });
        }
        let item = self.files.remove(from);
        self.files.insert(to, item);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.files.len() >= MAX_BATCH_FILES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_first_file_is_rejected() {
        let mut batch = FileBatch::new();
        for i in 0..MAX_BATCH_FILES {
            batch.add(format!("/media/track{}.mp3", i)).unwrap();
        }
        assert_eq!(
            batch.add("/media/one-more.mp3"),
            Err(BatchError::Full { max: MAX_BATCH_FILES })
        );
        assert_eq!(batch.len(), 20);
        assert!(batch.is_full());
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let mut batch = FileBatch::new();
        assert!(batch.add("/media/CLIP.MKV").is_ok());
        assert!(batch.add("/media/song.Flac").is_ok());
        assert!(matches!(
            batch.add("/media/notes.txt"),
            Err(BatchError::UnsupportedFormat { .. })
        ));
        assert!(matches!(batch.add("/media/noext"), Err(BatchError::UnsupportedFormat { .. })));
    }

    #[test]
    fn add_many_reports_each_rejection_kind() {
        let mut batch = FileBatch::new();
        let mut paths: Vec<String> = (0..21).map(|i| format!("/v/{}.mp4", i)).collect();
        paths.insert(0, "/v/readme.md".to_string());
        paths.insert(1, "/v/0.mp4".to_string());

        let report = batch.add_many(paths);
        assert_eq!(report.added, 20);
        assert_eq!(report.unsupported, vec![PathBuf::from("/v/readme.md")]);
        assert_eq!(report.duplicates, 1);
        assert!(report.limit_reached);
    }

    #[test]
    fn reorder_and_remove() {
        let mut batch = FileBatch::new();
        batch.add_many(["/a.mp3", "/b.mp3", "/c.mp3"]);
        batch.move_item(2, 0).unwrap();
        assert_eq!(batch.paths()[0], PathBuf::from("/c.mp3"));
        assert_eq!(batch.remove(1).unwrap(), PathBuf::from("/a.mp3"));
        assert_eq!(batch.remove(5), Err(BatchError::OutOfRange { index: 5 }));
        assert!(batch.move_item(0, 9).is_err());
        batch.clear();
        assert!(batch.is_empty());
    }
}
