use super::error::ProducerError;
use super::naming::VariantKind;
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

/// Everything a producer needs to build one derivative.
#[derive(Debug, Clone)]
pub struct ProduceJob {
    pub source: PathBuf,
    /// Where to write. The cache moves it into place once the producer
    /// returns `Ok`.
    pub destination: PathBuf,
    pub kind: VariantKind,
    pub thumbnail_width: u32,
    /// `WxH`, as handed to ffmpeg's `-s`.
    pub video_frame_size: String,
}

#[async_trait]
pub trait VariantProducer: Send + Sync {
    async fn produce(&self, job: &ProduceJob) -> Result<(), ProducerError>;
}

/// Resizes images with the `image` crate and shells out to ffmpeg for video.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaProducer;

#[async_trait]
impl VariantProducer for MediaProducer {
    async fn produce(&self, job: &ProduceJob) -> Result<(), ProducerError> {
        match job.kind {
            VariantKind::ThumbnailUseWidth => {
                resize_in_background(job.source.clone(), job.destination.clone(), job.thumbnail_width)
                    .await
            }
            VariantKind::FixedWidth(size) => {
                resize_in_background(job.source.clone(), job.destination.clone(), size.width())
                    .await
            }
            VariantKind::VideoFrame => {
                capture_video_frame(&job.source, &job.video_frame_size, &job.destination).await
            }
            VariantKind::VideoTranscode => transcode_video(&job.source, &job.destination).await,
        }
    }
}

async fn resize_in_background(
    source: PathBuf,
    destination: PathBuf,
    width: u32,
) -> Result<(), ProducerError> {
    tokio::task::spawn_blocking(move || resize_image_file(&source, &destination, width))
        .await
        .map_err(|e| ProducerError::TaskFailed(e.to_string()))?
}

/// Decodes `source`, applies its EXIF orientation, scales it to `width`
/// keeping the aspect ratio and writes it to `destination` in the format
/// implied by the destination's extension.
pub fn resize_image_file(source: &Path, destination: &Path, width: u32) -> Result<(), ProducerError> {
    let img = image::open(source)?;
    let img = apply_orientation(img, read_orientation(source));
    let resized = resize_to_width(&img, width);

    let format = ImageFormat::from_path(destination)?;
    let resized = match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };
    resized.save_with_format(destination, format)?;

    debug!(
        "Resized {:?} to {}x{}",
        source,
        resized.width(),
        resized.height()
    );
    Ok(())
}

/// Scales to exactly `width`, keeping the aspect ratio. Shrinking averages by
/// area; enlarging interpolates.
pub fn resize_to_width(img: &DynamicImage, width: u32) -> DynamicImage {
    let (orig_width, orig_height) = (img.width().max(1), img.height());
    let target_width = width.max(1);
    if target_width == orig_width {
        return img.clone();
    }

    let target_height = ((orig_height as u64 * target_width as u64 + orig_width as u64 / 2)
        / orig_width as u64)
        .max(1) as u32;
    if target_width < orig_width {
        img.thumbnail_exact(target_width, target_height)
    } else {
        img.resize_exact(target_width, target_height, FilterType::Triangle)
    }
}

/// EXIF orientation (1-8), if the file carries one.
fn read_orientation(path: &Path) -> Option<u16> {
    let exif = match rexif::parse_file(path) {
        Ok(exif) => exif,
        Err(e) => {
            trace!("No EXIF data for {}: {}", path.display(), e);
            return None;
        }
    };

    exif.entries
        .iter()
        .find(|entry| entry.tag == rexif::ExifTag::Orientation)
        .and_then(|entry| match &entry.value {
            rexif::TagValue::U16(values) => values.first().copied(),
            _ => None,
        })
}

fn apply_orientation(img: DynamicImage, orientation: Option<u16>) -> DynamicImage {
    match orientation {
        Some(2) => img.fliph(),
        Some(3) => img.rotate180(),
        Some(4) => img.flipv(),
        Some(5) => img.rotate90().fliph(),
        Some(6) => img.rotate90(),
        Some(7) => img.rotate270().fliph(),
        Some(8) => img.rotate270(),
        _ => img,
    }
}

/// Grabs the first frame of `source` scaled to `size` (`WxH`).
pub async fn capture_video_frame(
    source: &Path,
    size: &str,
    destination: &Path,
) -> Result<(), ProducerError> {
    let size = validate_frame_size(size)?;
    run_ffmpeg(&[
        OsStr::new("-i"),
        source.as_os_str(),
        OsStr::new("-frames:v"),
        OsStr::new("1"),
        OsStr::new("-s"),
        OsStr::new(size),
        destination.as_os_str(),
    ])
    .await
}

/// Re-encodes `source` into the container named by `destination`'s extension.
pub async fn transcode_video(source: &Path, destination: &Path) -> Result<(), ProducerError> {
    run_ffmpeg(&[OsStr::new("-i"), source.as_os_str(), destination.as_os_str()]).await
}

fn validate_frame_size(size: &str) -> Result<&str, ProducerError> {
    let valid = size
        .split_once('x')
        .is_some_and(|(w, h)| w.parse::<u32>().is_ok_and(|w| w > 0) && h.parse::<u32>().is_ok_and(|h| h > 0));
    if valid {
        Ok(size)
    } else {
        Err(ProducerError::InvalidFrameSize(size.to_string()))
    }
}

async fn run_ffmpeg(args: &[&OsStr]) -> Result<(), ProducerError> {
    debug!("Running ffmpeg {:?}", args);
    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error"])
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ProducerError::Ffmpeg {
            status: output.status.to_string(),
            stderr: stderr.trim().lines().last().unwrap_or("").to_string(),
        })
    }
}

/// Whether an `ffmpeg` executable is on `PATH`.
pub fn ffmpeg_available() -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    let names: &[&str] = if cfg!(windows) {
        &["ffmpeg.exe", "ffmpeg"]
    } else {
        &["ffmpeg"]
    };
    std::env::split_paths(&paths).any(|dir| names.iter().any(|name| dir.join(name).is_file()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_test_image(path: &Path, width: u32, height: u32) {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_resize_keeps_aspect_ratio() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::new(1600, 1200));
        let resized = resize_to_width(&img, 800);
        assert_eq!((resized.width(), resized.height()), (800, 600));

        let tall = DynamicImage::ImageRgb8(ImageBuffer::new(300, 1000));
        let resized = resize_to_width(&tall, 100);
        assert_eq!((resized.width(), resized.height()), (100, 333));
    }

    #[test]
    fn test_resize_upscales_small_images() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::new(320, 240));
        let resized = resize_to_width(&img, 1024);
        assert_eq!((resized.width(), resized.height()), (1024, 768));
    }

    #[test]
    fn test_orientation_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::new(40, 20));
        let rotated = apply_orientation(img.clone(), Some(6));
        assert_eq!((rotated.width(), rotated.height()), (20, 40));
        let untouched = apply_orientation(img, None);
        assert_eq!((untouched.width(), untouched.height()), (40, 20));
    }

    #[test]
    fn test_resize_image_file_writes_destination() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("beach.jpg");
        let destination = temp_dir.path().join("tn__beach.jpg");
        write_test_image(&source, 400, 200);

        resize_image_file(&source, &destination, 100).unwrap();

        let thumb = image::open(&destination).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (100, 50));
    }

    #[test]
    fn test_resize_image_file_fails_on_corrupt_input() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("broken.jpg");
        let destination = temp_dir.path().join("tn__broken.jpg");
        std::fs::write(&source, b"not really a jpeg").unwrap();

        assert!(resize_image_file(&source, &destination, 100).is_err());
        assert!(!destination.exists());
    }

    #[test]
    fn test_frame_size_validation() {
        assert!(validate_frame_size("200x150").is_ok());
        assert!(validate_frame_size("200").is_err());
        assert!(validate_frame_size("0x150").is_err());
        assert!(validate_frame_size("wide x tall").is_err());
    }
}
