use crate::Config;
use crate::derivative::ffmpeg_available;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create thumbnail directory for album '{0}': {1}")]
    ThumbDirectoryCreationFailed(String, std::io::Error),

    #[error("Album directory does not exist or is not readable: {0}")]
    AlbumDirectoryMissing(String),

    #[error("No albums configured")]
    NoAlbums,

    #[error("ffmpeg not found on PATH, video thumbnails and transcodes will fail")]
    FfmpegMissing,
}

impl StartupCheckError {
    /// Whether the server must refuse to start.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::AlbumDirectoryMissing(_)
                | StartupCheckError::ThumbDirectoryCreationFailed(_, _)
        )
    }
}

/// Checks every configured album before the server starts. A missing album
/// directory or an uncreatable thumbnail directory is critical; having no
/// albums at all or no ffmpeg is not.
pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let albums = config.resolved_albums();
    if albums.is_empty() {
        warn!("No albums are configured, only the top page will be served");
        errors.push(StartupCheckError::NoAlbums);
    }

    if let Some(e) = check_ffmpeg(ffmpeg_available()) {
        errors.push(e);
    }

    for (name, album) in &albums {
        match tokio::fs::read_dir(&album.album_dir).await {
            Ok(_) => info!("Album '{}' directory is accessible: {:?}", name, album.album_dir),
            Err(e) => {
                error!(
                    "Album '{}' directory {:?} is not accessible: {}",
                    name, album.album_dir, e
                );
                errors.push(StartupCheckError::AlbumDirectoryMissing(name.clone()));
            }
        }

        if album.thumb_dir.exists() {
            info!("Album '{}' thumbnail directory exists: {:?}", name, album.thumb_dir);
        } else {
            info!(
                "Thumbnail directory for album '{}' does not exist, creating: {:?}",
                name, album.thumb_dir
            );
            if let Err(e) = tokio::fs::create_dir_all(&album.thumb_dir).await {
                error!(
                    "Failed to create thumbnail directory for album '{}': {}",
                    name, e
                );
                errors.push(StartupCheckError::ThumbDirectoryCreationFailed(
                    name.clone(),
                    e,
                ));
            }
        }
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}

fn check_ffmpeg(available: bool) -> Option<StartupCheckError> {
    if available {
        info!("ffmpeg found, video thumbnails and transcodes are enabled");
        None
    } else {
        warn!("ffmpeg not found on PATH, video thumbnails and transcodes will fail");
        Some(StartupCheckError::FfmpegMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlbumSettings;
    use tempfile::TempDir;

    fn config_with_album(settings: AlbumSettings) -> Config {
        let mut config = Config::default();
        config.albums.insert("family".to_string(), settings);
        config
    }

    fn critical(result: Result<(), Vec<StartupCheckError>>) -> Vec<StartupCheckError> {
        result
            .err()
            .unwrap_or_default()
            .into_iter()
            .filter(StartupCheckError::is_critical)
            .collect()
    }

    #[tokio::test]
    async fn test_creates_missing_thumb_dir() {
        let temp_dir = TempDir::new().unwrap();
        let thumb_dir = temp_dir.path().join("cache/family");
        let config = config_with_album(AlbumSettings {
            album_dir: Some(temp_dir.path().to_path_buf()),
            thumb_dir: Some(thumb_dir.clone()),
            ..Default::default()
        });

        assert!(critical(perform_startup_checks(&config).await).is_empty());
        assert!(thumb_dir.is_dir());
    }

    #[tokio::test]
    async fn test_missing_album_dir_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_with_album(AlbumSettings {
            album_dir: Some(temp_dir.path().join("nope")),
            thumb_dir: Some(temp_dir.path().join("thumbs")),
            ..Default::default()
        });

        let errors = critical(perform_startup_checks(&config).await);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            StartupCheckError::AlbumDirectoryMissing(name) if name == "family"
        ));
    }

    #[tokio::test]
    async fn test_no_albums_is_not_critical() {
        let errors = perform_startup_checks(&Config::default())
            .await
            .unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, StartupCheckError::NoAlbums))
        );
        assert!(errors.iter().all(|e| !e.is_critical()));
    }

    #[test]
    fn test_missing_ffmpeg_is_reported_but_not_critical() {
        let missing = check_ffmpeg(false).unwrap();
        assert!(matches!(missing, StartupCheckError::FfmpegMissing));
        assert!(!missing.is_critical());
        assert!(check_ffmpeg(true).is_none());
    }
}
