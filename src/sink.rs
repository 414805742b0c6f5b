//! Durable, atomically renamed artifact files in an output directory.

use crate::error::{PipelineError, Result};
use crate::io::artifact::{artifact_file_name, write_batch};
use crate::io::compression::CompressionCodec;
use crate::normalize::NormalizedBatch;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Writes one artifact per batch into `dir`.
///
/// Each artifact is written to a temporary file in the same directory,
/// synced, and renamed into place, so a failed write never leaves a partial
/// file under an artifact name.
pub struct BatchSink {
    dir: PathBuf,
    codec: Option<Arc<dyn CompressionCodec>>,
}

impl BatchSink {
    /// Prepare `dir` (created if missing) for artifacts compressed with `codec`.
    ///
    /// # Errors
    /// [`PipelineError::SinkWriteFailure`] without a batch index when the
    /// directory cannot be created.
    pub fn create(dir: impl AsRef<Path>, codec: Option<Arc<dyn CompressionCodec>>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir).map_err(|e| PipelineError::sink(None, &dir, e))?;
        Ok(Self { dir, codec })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path of artifact `index`.
    #[must_use]
    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(artifact_file_name(index, self.codec.as_deref()))
    }

    /// Persist `batch` and return the artifact path.
    ///
    /// # Errors
    /// [`PipelineError::SinkWriteFailure`] on any I/O failure.
    pub fn write(&self, batch: &NormalizedBatch) -> Result<PathBuf> {
        let path = self.path_for(batch.index);
        let fail = |e: std::io::Error| PipelineError::sink(Some(batch.index), &path, e);

        let mut tmp = tempfile::Builder::new()
            .prefix(".kvbatch-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(fail)?;
        write_batch(tmp.as_file_mut(), self.codec.as_deref(), batch).map_err(fail)?;
        tmp.as_file().sync_all().map_err(fail)?;
        tmp.persist(&path).map_err(|e| fail(e.error))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Value;

    fn batch(index: usize) -> NormalizedBatch {
        NormalizedBatch {
            index,
            columns: vec!["beer_name".into()],
            rows: vec![vec![Value::Text("X".into())]],
        }
    }

    #[test]
    fn creates_missing_directory() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("nested").join("out");
        let sink = BatchSink::create(&dir, None)?;
        assert!(dir.is_dir());
        assert_eq!(sink.dir(), dir.as_path());
        Ok(())
    }

    #[test]
    fn writes_named_artifact_without_leftovers() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let sink = BatchSink::create(tmp.path(), None)?;
        let path = sink.write(&batch(2))?;
        assert_eq!(path, tmp.path().join("2.csv"));
        assert_eq!(std::fs::read_to_string(&path)?, "beer_name\nX\n");
        let names: Vec<_> = std::fs::read_dir(tmp.path())?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<Result<_, _>>()?;
        assert_eq!(names.len(), 1);
        Ok(())
    }

    #[test]
    fn directory_in_the_way_is_a_sink_failure() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let sink = BatchSink::create(tmp.path(), None)?;
        // a directory squatting on the artifact name makes the rename fail
        std::fs::create_dir(tmp.path().join("0.csv"))?;
        std::fs::write(tmp.path().join("0.csv").join("keep"), b"x")?;
        let err = sink.write(&batch(0)).unwrap_err();
        assert!(matches!(err, PipelineError::SinkWriteFailure { batch: Some(0), .. }));
        let stray = std::fs::read_dir(tmp.path())?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(stray, 0);
        Ok(())
    }

    #[test]
    fn uncreatable_directory_has_no_batch() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let file = tmp.path().join("plain-file");
        std::fs::write(&file, b"x")?;
        let err = BatchSink::create(file.join("out"), None).err().unwrap();
        assert!(matches!(err, PipelineError::SinkWriteFailure { batch: None, .. }));
        assert!(err.to_string().starts_with("failed to create output directory"));
        Ok(())
    }
}
