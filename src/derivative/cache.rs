use super::error::{DerivativeError, PoolError, ProducerError};
use super::naming::{self, SourceName, VariantKind};
use super::pool::WorkerPool;
use super::producers::{ProduceJob, VariantProducer};
use super::registry::{DerivativeKey, InFlightRegistry, Registration};
use crate::AlbumConfig;
use crate::album::listing::{MediaKind, clean_relative_path, join_relative, split_relative};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The derivative exists at this path.
    Ready(PathBuf),
    /// A background worker is producing it; ask again later.
    NotReadyYet,
}

/// Lazily produced derived media, one file per derivative key.
///
/// A file's presence under the album's thumbnail root is the whole cache
/// index. Missing files are produced on demand: image thumbnails and video
/// frames inline on the caller, transcodes on the worker pool. The in-flight
/// registry makes sure only one producer runs per key at a time.
pub struct DerivativeCache {
    producer: Arc<dyn VariantProducer>,
    registry: InFlightRegistry,
    pool: WorkerPool,
}

impl DerivativeCache {
    /// Must be called from within a tokio runtime; the pool's workers are
    /// spawned right away.
    pub fn new(producer: Arc<dyn VariantProducer>, workers: usize, backlog: usize) -> Self {
        Self {
            producer,
            registry: InFlightRegistry::new(),
            pool: WorkerPool::new(workers, backlog),
        }
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    /// Resolves a request for `derivative_path`, relative to the album's
    /// thumbnail root, e.g. `2004/tn__beach.jpg`.
    ///
    /// Names that follow no derivative convention are served when they
    /// already exist and are never produced.
    pub async fn resolve(
        &self,
        album: &AlbumConfig,
        derivative_path: &str,
    ) -> Result<Resolved, DerivativeError> {
        let derivative =
            clean_relative_path(derivative_path).ok_or(DerivativeError::InvalidPath)?;
        let (dir, file_name) = split_relative(&derivative);
        let final_path = album.thumb_dir.join(&derivative);

        let Some((source, kind)) = naming::decode(file_name) else {
            if is_file(&final_path).await {
                return Ok(Resolved::Ready(final_path));
            }
            return Err(DerivativeError::VariantUnrecognized);
        };

        if is_file(&final_path).await {
            debug!("Derivative cache hit: {}", derivative);
            return Ok(Resolved::Ready(final_path));
        }

        let original = locate_source(album, dir, &source, kind).await?;
        self.produce_missing(album, &original, &derivative, kind).await
    }

    /// Resolves the `kind` variant of the original at `original_path`,
    /// relative to the album root.
    pub async fn resolve_variant(
        &self,
        album: &AlbumConfig,
        original_path: &str,
        kind: VariantKind,
    ) -> Result<Resolved, DerivativeError> {
        let original = clean_relative_path(original_path).ok_or(DerivativeError::InvalidPath)?;
        let derivative = naming::encode(&original, kind);
        let final_path = album.thumb_dir.join(&derivative);

        if is_file(&final_path).await {
            debug!("Derivative cache hit: {}", derivative);
            return Ok(Resolved::Ready(final_path));
        }

        let (_, file_name) = split_relative(&original);
        if !source_accepts(kind, file_name) || !is_file(&album.album_dir.join(&original)).await {
            return Err(DerivativeError::SourceNotFound);
        }
        self.produce_missing(album, &original, &derivative, kind).await
    }

    async fn produce_missing(
        &self,
        album: &AlbumConfig,
        original: &str,
        derivative: &str,
        kind: VariantKind,
    ) -> Result<Resolved, DerivativeError> {
        let final_path = album.thumb_dir.join(derivative);
        if let Some(parent) = final_path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            // The producer will report it if the directory really is missing.
            warn!("Failed to create derivative directory {:?}: {}", parent, e);
        }

        let key = DerivativeKey {
            album: album.name.clone(),
            derivative: derivative.to_string(),
            kind,
        };

        let guard = match self.registry.register(&key) {
            Registration::Owner(guard) => guard,
            Registration::Running(_) if kind.is_async() => {
                debug!("{} is already being produced", derivative);
                return Ok(Resolved::NotReadyYet);
            }
            Registration::Running(done) => {
                debug!("Waiting for concurrent producer of {}", derivative);
                let _ = done.await;
                return if is_file(&final_path).await {
                    Ok(Resolved::Ready(final_path))
                } else {
                    Err(ProducerError::ConcurrentFailure.into())
                };
            }
        };

        // It may have been finished between the existence check and now.
        if is_file(&final_path).await {
            guard.succeed();
            return Ok(Resolved::Ready(final_path));
        }

        let job = ProduceJob {
            source: album.album_dir.join(original),
            destination: staging_path(&final_path),
            kind,
            thumbnail_width: album.thumbnail_width,
            video_frame_size: album.video_thumbnail_size.clone(),
        };

        if kind.is_async() {
            let producer = self.producer.clone();
            let submitted = self.pool.submit(async move {
                if produce_atomically(producer.as_ref(), &job, &final_path)
                    .await
                    .is_ok()
                {
                    guard.succeed();
                }
            });
            return match submitted {
                Ok(()) => {
                    info!("Queued {} for {}", kind, derivative);
                    Ok(Resolved::NotReadyYet)
                }
                Err(PoolError::Full) | Err(PoolError::Closed) => {
                    warn!("Worker pool rejected {}", derivative);
                    Err(DerivativeError::PoolSaturated)
                }
            };
        }

        // The task owns the guard and the staging file, so a caller that goes
        // away mid-production neither fails the waiters nor leaks the file.
        let producer = self.producer.clone();
        let destination = final_path.clone();
        let production = tokio::spawn(async move {
            let result = produce_atomically(producer.as_ref(), &job, &destination).await;
            if result.is_ok() {
                guard.succeed();
            }
            result
        });
        production
            .await
            .map_err(|e| ProducerError::TaskFailed(e.to_string()))??;
        Ok(Resolved::Ready(final_path))
    }
}

/// Runs the producer against a staging file and renames it onto
/// `final_path`, so readers only ever see a complete file there.
async fn produce_atomically(
    producer: &dyn VariantProducer,
    job: &ProduceJob,
    final_path: &Path,
) -> Result<(), ProducerError> {
    let result = match producer.produce(job).await {
        Ok(()) => match tokio::fs::metadata(&job.destination).await {
            Ok(metadata) if metadata.len() > 0 => {
                tokio::fs::rename(&job.destination, final_path)
                    .await
                    .map_err(ProducerError::from)
            }
            Ok(_) => Err(ProducerError::EmptyOutput),
            Err(e) => Err(e.into()),
        },
        Err(e) => Err(e),
    };

    match &result {
        Ok(()) => info!("Generated {} {:?}", job.kind, final_path),
        Err(e) => {
            error!(
                "Failed to produce {} from {:?}: {}",
                job.kind, job.source, e
            );
            let _ = tokio::fs::remove_file(&job.destination).await;
        }
    }
    result
}

/// Finds the original a derivative was made from. Video variants only know
/// their source's stem, so the directory is searched for a single video with
/// that stem.
async fn locate_source(
    album: &AlbumConfig,
    dir: &str,
    source: &SourceName,
    kind: VariantKind,
) -> Result<String, DerivativeError> {
    match source {
        SourceName::Exact(name) => {
            let original = join_relative(dir, name);
            if source_accepts(kind, name) && is_file(&album.album_dir.join(&original)).await {
                Ok(original)
            } else {
                Err(DerivativeError::SourceNotFound)
            }
        }
        SourceName::Stem(_) => {
            let mut entries = match tokio::fs::read_dir(album.album_dir.join(dir)).await {
                Ok(entries) => entries,
                Err(_) => return Err(DerivativeError::SourceNotFound),
            };

            let mut candidates = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                if !name.starts_with('.')
                    && source.matches(&name)
                    && source_accepts(kind, &name)
                    && entry.file_type().await?.is_file()
                {
                    candidates.push(name);
                }
            }
            candidates.sort();

            match candidates.len() {
                0 => Err(DerivativeError::SourceNotFound),
                1 => Ok(join_relative(dir, &candidates[0])),
                _ => {
                    warn!(
                        "Ambiguous source for {} in {:?}: {:?}; base names must be unique per directory",
                        kind, dir, candidates
                    );
                    Err(DerivativeError::AmbiguousSource(candidates))
                }
            }
        }
    }
}

/// Whether a file of this name can be the source of a `kind` derivative.
fn source_accepts(kind: VariantKind, file_name: &str) -> bool {
    match (kind, MediaKind::of(file_name)) {
        (VariantKind::ThumbnailUseWidth | VariantKind::FixedWidth(_), Some(MediaKind::Image)) => {
            true
        }
        (VariantKind::VideoFrame, Some(media)) => media.is_video(),
        (VariantKind::VideoTranscode, Some(MediaKind::ConvertibleVideo)) => true,
        _ => false,
    }
}

/// Hidden sibling of `final_path` with the same extension, so producers that
/// pick an encoder from the extension still work.
fn staging_path(final_path: &Path) -> PathBuf {
    let file_name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{}.{}", Uuid::new_v4().simple(), file_name))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
