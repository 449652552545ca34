//! Filenames of derived media.
//!
//! A derivative lives at the same relative location as its original, under
//! the album's thumbnail root, with a name that records which variant it is:
//!
//! | variant              | original        | derivative           |
//! |----------------------|-----------------|----------------------|
//! | thumbnail            | `a/beach.jpg`   | `a/tn__beach.jpg`    |
//! | fixed 640/800/1024   | `a/beach.jpg`   | `a/800x600_beach.jpg`|
//! | video frame          | `a/party.avi`   | `a/tn__party.png`    |
//! | video transcode      | `a/party.avi`   | `a/party.mp4`        |
//!
//! Decoding only sees the derivative filename, so video variants can only
//! recover the stem of their source; the extension is found on disk.

use std::fmt;
use std::path::Path;

pub const THUMBNAIL_PREFIX: &str = "tn__";
pub const VIDEO_FRAME_EXTENSION: &str = "png";
pub const TRANSCODE_EXTENSION: &str = "mp4";

/// The three standard preview sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedSize {
    Small,
    Medium,
    Large,
}

impl FixedSize {
    /// Longest prefix first so `1024x768_` is never shadowed.
    pub const ALL: [FixedSize; 3] = [FixedSize::Large, FixedSize::Medium, FixedSize::Small];

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            FixedSize::Small => (640, 480),
            FixedSize::Medium => (800, 600),
            FixedSize::Large => (1024, 768),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            FixedSize::Small => "640x480_",
            FixedSize::Medium => "800x600_",
            FixedSize::Large => "1024x768_",
        }
    }

    /// Maps the `sm`/`med`/`lg` keys used by slide show and "all images" links.
    pub fn from_view_key(key: &str) -> Option<Self> {
        match key {
            "sm" => Some(FixedSize::Small),
            "med" => Some(FixedSize::Medium),
            "lg" => Some(FixedSize::Large),
            _ => None,
        }
    }

    /// Finds the size whose prefix starts `file_name`.
    pub fn from_prefixed_name(file_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|size| file_name.starts_with(size.prefix()))
    }

    pub fn strip_prefix<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        file_name.strip_prefix(self.prefix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    /// Thumbnail at the album's configured width.
    ThumbnailUseWidth,
    FixedWidth(FixedSize),
    /// Single frame grabbed from a video at the album's frame size.
    VideoFrame,
    /// Whole video re-encoded into a browser playable container.
    VideoTranscode,
}

impl VariantKind {
    /// Computed on a background worker rather than inline on the request.
    pub fn is_async(&self) -> bool {
        matches!(self, VariantKind::VideoTranscode)
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantKind::ThumbnailUseWidth => write!(f, "thumbnail"),
            VariantKind::FixedWidth(size) => {
                let (w, h) = size.dimensions();
                write!(f, "{}x{}", w, h)
            }
            VariantKind::VideoFrame => write!(f, "video-frame"),
            VariantKind::VideoTranscode => write!(f, "transcode"),
        }
    }
}

/// What a derivative filename says about its original.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceName {
    /// The original's full filename.
    Exact(String),
    /// The original's filename without extension.
    Stem(String),
}

impl SourceName {
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            SourceName::Exact(name) => name == file_name,
            SourceName::Stem(stem) => file_stem(file_name) == stem,
        }
    }
}

/// Derivative path for `relative_path` (an original, relative to the album
/// root). The directory part is kept as is.
pub fn encode(relative_path: &str, kind: VariantKind) -> String {
    let (dir, file_name) = match relative_path.rsplit_once('/') {
        Some((dir, file_name)) => (Some(dir), file_name),
        None => (None, relative_path),
    };

    let derivative = match kind {
        VariantKind::ThumbnailUseWidth => format!("{}{}", THUMBNAIL_PREFIX, file_name),
        VariantKind::FixedWidth(size) => format!("{}{}", size.prefix(), file_name),
        VariantKind::VideoFrame => format!(
            "{}{}",
            THUMBNAIL_PREFIX,
            change_extension(file_name, VIDEO_FRAME_EXTENSION)
        ),
        VariantKind::VideoTranscode => change_extension(file_name, TRANSCODE_EXTENSION),
    };

    match dir {
        Some(dir) => format!("{}/{}", dir, derivative),
        None => derivative,
    }
}

/// Recovers the original name and variant from a derivative filename.
/// Returns `None` for names that follow no derivative convention.
pub fn decode(derivative_file_name: &str) -> Option<(SourceName, VariantKind)> {
    for size in FixedSize::ALL {
        if let Some(rest) = size.strip_prefix(derivative_file_name) {
            return non_empty(rest).map(|name| {
                (
                    SourceName::Exact(name.to_string()),
                    VariantKind::FixedWidth(size),
                )
            });
        }
    }

    if let Some(rest) = derivative_file_name.strip_prefix(THUMBNAIL_PREFIX) {
        let rest = non_empty(rest)?;
        if has_extension(rest, VIDEO_FRAME_EXTENSION) {
            return Some((
                SourceName::Stem(file_stem(rest).to_string()),
                VariantKind::VideoFrame,
            ));
        }
        return Some((
            SourceName::Exact(rest.to_string()),
            VariantKind::ThumbnailUseWidth,
        ));
    }

    if has_extension(derivative_file_name, TRANSCODE_EXTENSION) {
        let stem = file_stem(derivative_file_name);
        if !stem.is_empty() {
            return Some((
                SourceName::Stem(stem.to_string()),
                VariantKind::VideoTranscode,
            ));
        }
    }

    None
}

pub fn change_extension(file_name: &str, extension: &str) -> String {
    format!("{}.{}", file_stem(file_name), extension)
}

fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

fn has_extension(file_name: &str, extension: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_prefixes() {
        assert_eq!(
            encode("beach.jpg", VariantKind::FixedWidth(FixedSize::Small)),
            "640x480_beach.jpg"
        );
        assert_eq!(
            encode("beach.jpg", VariantKind::FixedWidth(FixedSize::Medium)),
            "800x600_beach.jpg"
        );
        assert_eq!(
            encode("beach.jpg", VariantKind::FixedWidth(FixedSize::Large)),
            "1024x768_beach.jpg"
        );
    }

    #[test]
    fn test_encode_keeps_directories() {
        assert_eq!(
            encode("2001/12(December)/DSCN0138.JPG", VariantKind::ThumbnailUseWidth),
            "2001/12(December)/tn__DSCN0138.JPG"
        );
        assert_eq!(
            encode("trips/party.avi", VariantKind::VideoFrame),
            "trips/tn__party.png"
        );
        assert_eq!(
            encode("trips/party.avi", VariantKind::VideoTranscode),
            "trips/party.mp4"
        );
    }

    #[test]
    fn test_round_trip_every_kind() {
        let cases = [
            ("beach.jpg", VariantKind::ThumbnailUseWidth),
            ("beach.jpg", VariantKind::FixedWidth(FixedSize::Small)),
            ("beach.jpg", VariantKind::FixedWidth(FixedSize::Medium)),
            ("beach.jpg", VariantKind::FixedWidth(FixedSize::Large)),
            ("my.holiday.jpeg", VariantKind::ThumbnailUseWidth),
            ("party.avi", VariantKind::VideoFrame),
            ("party.mov", VariantKind::VideoTranscode),
        ];

        for (name, kind) in cases {
            let encoded = encode(name, kind);
            let (source, decoded_kind) = decode(&encoded)
                .unwrap_or_else(|| panic!("{} should decode", encoded));
            assert_eq!(decoded_kind, kind, "kind for {}", encoded);
            assert!(source.matches(name), "{:?} should match {}", source, name);
        }
    }

    #[test]
    fn test_decode_checks_longest_prefix_first() {
        assert_eq!(
            decode("1024x768_640x480_odd.jpg"),
            Some((
                SourceName::Exact("640x480_odd.jpg".to_string()),
                VariantKind::FixedWidth(FixedSize::Large)
            ))
        );
        assert_eq!(
            decode("tn__800x600_odd.jpg"),
            Some((
                SourceName::Exact("800x600_odd.jpg".to_string()),
                VariantKind::ThumbnailUseWidth
            ))
        );
    }

    #[test]
    fn test_decode_unknown_names() {
        assert_eq!(decode("beach.jpg"), None);
        assert_eq!(decode("tn__"), None);
        assert_eq!(decode("800x600_"), None);
        assert_eq!(decode("320x200_beach.jpg"), None);
        assert_eq!(decode(".mp4"), None);
    }

    #[test]
    fn test_view_keys_and_prefixed_names() {
        assert_eq!(FixedSize::from_view_key("sm"), Some(FixedSize::Small));
        assert_eq!(FixedSize::from_view_key("lg"), Some(FixedSize::Large));
        assert_eq!(FixedSize::from_view_key("full"), None);
        assert_eq!(
            FixedSize::from_prefixed_name("800x600_beach.jpg"),
            Some(FixedSize::Medium)
        );
        assert_eq!(FixedSize::from_prefixed_name("beach.jpg"), None);
    }
}
