//! Output persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use zoomreel_common::error::{ZoomreelError, ZoomreelResult};

/// Host file persistence.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Write encoded media bytes to `path`.
    async fn save(&self, path: &Path, bytes: &[u8]) -> ZoomreelResult<()>;

    /// Write a metadata document to `path`.
    async fn save_metadata(&self, path: &Path, json: &serde_json::Value) -> ZoomreelResult<()>;
}

/// Local filesystem persistence.
///
/// Writes go to a sibling `.part` file that is renamed into place, so a
/// failed write never leaves a truncated file at `path`.
#[derive(Debug, Clone, Default)]
pub struct FsPersistence;

impl FsPersistence {
    pub fn new() -> Self {
        Self
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> ZoomreelResult<()> {
        let fail = |e: std::io::Error| ZoomreelError::persistence(path, e.to_string());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }

        let partial = partial_path(path);
        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(fail(e));
        }
        if let Err(e) = tokio::fs::rename(&partial, path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(fail(e));
        }

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "File persisted");
        Ok(())
    }
}

#[async_trait]
impl Persistence for FsPersistence {
    async fn save(&self, path: &Path, bytes: &[u8]) -> ZoomreelResult<()> {
        self.write_atomic(path, bytes).await
    }

    async fn save_metadata(&self, path: &Path, json: &serde_json::Value) -> ZoomreelResult<()> {
        let content = serde_json::to_vec_pretty(json)?;
        self.write_atomic(path, &content).await
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_persistence_writes_bytes_and_metadata() {
        let dir = std::env::temp_dir().join("zoomreel_test_fs_persistence");
        let _ = std::fs::remove_dir_all(&dir);

        let persistence = FsPersistence::new();
        let video = dir.join("nested").join("clip.webm");
        persistence.save(&video, b"webm-bytes").await.unwrap();
        assert_eq!(std::fs::read(&video).unwrap(), b"webm-bytes");
        assert!(!partial_path(&video).exists());

        let meta = dir.join("clip.json");
        persistence
            .save_metadata(&meta, &serde_json::json!({"duration": 10}))
            .await
            .unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&meta).unwrap()).unwrap();
        assert_eq!(parsed["duration"], 10);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_fs_persistence_reports_failure() {
        let dir = std::env::temp_dir().join("zoomreel_test_fs_persistence_fail");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        // A directory where the file should go makes the rename fail.
        let target = dir.join("occupied");
        std::fs::create_dir_all(target.join("child")).unwrap();

        let err = FsPersistence::new().save(&target, b"x").await.unwrap_err();
        assert!(matches!(err, ZoomreelError::PersistenceFailure { .. }));
        assert!(!partial_path(&target).exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_path_is_sibling() {
        assert_eq!(
            partial_path(Path::new("/tmp/out/a.webm")),
            PathBuf::from("/tmp/out/a.webm.part")
        );
    }
}
