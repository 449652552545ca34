use super::AlbumError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const CAPTION_FILE: &str = "caption.txt";
const CAPTION_SEPARATOR: &str = "__END__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    /// Video a browser can play as is.
    PlayableVideo,
    /// Video that has to be transcoded before a browser can play it.
    ConvertibleVideo,
}

impl MediaKind {
    pub fn of(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" | "gif" => Some(MediaKind::Image),
            "ogg" | "webm" | "mp4" => Some(MediaKind::PlayableVideo),
            "avi" | "mpeg" | "mov" => Some(MediaKind::ConvertibleVideo),
            _ => None,
        }
    }

    pub fn is_video(&self) -> bool {
        !matches!(self, MediaKind::Image)
    }
}

/// Normalises a request path relative to an album root. Rejects anything
/// that could climb out of it.
pub fn clean_relative_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(':') => return None,
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

/// Joins a directory (possibly empty) and a file name into a relative path.
pub fn join_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Splits a relative path into its directory (possibly empty) and file name.
pub fn split_relative(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

/// Header HTML plus per-file captions, read from a directory's `caption.txt`.
///
/// Everything up to a line reading `__END__` is HTML shown above the
/// thumbnails; every following `name:caption` line captions one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionFile {
    pub html: String,
    pub captions: HashMap<String, String>,
}

impl CaptionFile {
    pub fn parse(content: &str) -> Self {
        let mut lines = content.lines();
        let mut html = String::new();
        for line in lines.by_ref() {
            if line == CAPTION_SEPARATOR {
                break;
            }
            html.push_str(line);
            html.push('\n');
        }

        let captions = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, caption)| (name.to_string(), caption.to_string()))
            .collect();

        Self { html, captions }
    }
}

/// One directory's contents, split and sorted the way pages show them.
#[derive(Debug, Clone, Default)]
pub struct DirectoryListing {
    pub directories: Vec<String>,
    /// Images and videos together, in sibling order.
    pub media: Vec<String>,
    pub caption: CaptionFile,
}

impl DirectoryListing {
    pub fn images(&self) -> Vec<String> {
        self.media_matching(|kind| kind == MediaKind::Image)
    }

    pub fn videos(&self) -> Vec<String> {
        self.media_matching(|kind| kind.is_video())
    }

    /// Siblings of `file_name` for single item navigation: images when it is
    /// an image, videos when it is a video.
    pub fn siblings_of(&self, file_name: &str) -> Vec<String> {
        match MediaKind::of(file_name) {
            Some(kind) if kind.is_video() => self.videos(),
            _ => self.images(),
        }
    }

    fn media_matching(&self, accept: impl Fn(MediaKind) -> bool) -> Vec<String> {
        self.media
            .iter()
            .filter(|name| MediaKind::of(name).is_some_and(&accept))
            .cloned()
            .collect()
    }
}

/// Reads `dir`, keeping sub-directories and viewable media. Hidden entries
/// are skipped. Both lists are sorted by name, descending when the matching
/// `reverse_*` flag is set, so re-reading an unchanged directory always
/// gives the same order.
pub async fn list_directory(
    dir: &Path,
    reverse_dirs: bool,
    reverse_pics: bool,
) -> Result<DirectoryListing, AlbumError> {
    let mut listing = DirectoryListing::default();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            listing.directories.push(file_name);
        } else if file_name == CAPTION_FILE {
            match tokio::fs::read_to_string(entry.path()).await {
                Ok(content) => listing.caption = CaptionFile::parse(&content),
                Err(e) => warn!("Failed to read {:?}: {}", entry.path(), e),
            }
        } else if MediaKind::of(&file_name).is_some() {
            listing.media.push(file_name);
        }
    }

    sort_names(&mut listing.directories, reverse_dirs);
    sort_names(&mut listing.media, reverse_pics);

    debug!(
        "Listed {:?}: {} directories, {} media files",
        dir,
        listing.directories.len(),
        listing.media.len()
    );
    Ok(listing)
}

fn sort_names(names: &mut [String], descending: bool) {
    if descending {
        names.sort_by(|a, b| b.cmp(a));
    } else {
        names.sort();
    }
}

/// A sub-directory and everything below it.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryNode {
    pub name: String,
    pub title: String,
    /// Relative to the directory the tree was built from.
    pub path: String,
    pub children: Vec<DirectoryNode>,
}

/// Builds the nested directory tree under `root`.
pub fn directory_tree(root: &Path, reverse_dirs: bool) -> Vec<DirectoryNode> {
    let mut relative_dirs: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .flatten()
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            Some(parts.join("/"))
        })
        .collect();
    relative_dirs.sort();

    build_nodes(&relative_dirs, "", reverse_dirs)
}

fn build_nodes(all: &[String], parent: &str, reverse_dirs: bool) -> Vec<DirectoryNode> {
    let mut names: Vec<String> = all
        .iter()
        .filter_map(|path| {
            let (dir, name) = split_relative(path);
            (dir == parent).then(|| name.to_string())
        })
        .collect();
    sort_names(&mut names, reverse_dirs);

    names
        .into_iter()
        .map(|name| {
            let path = join_relative(parent, &name);
            DirectoryNode {
                title: beautify(&name),
                children: build_nodes(all, &path, reverse_dirs),
                name,
                path,
            }
        })
        .collect()
}

/// Display title for a directory: `12(December)` becomes `December`, and
/// underscores and dashes become spaces.
pub fn beautify(name: &str) -> String {
    let name = strip_ordering_number(name).unwrap_or(name);
    name.replace(['_', '-'], " ")
}

/// `"12(December)"` -> `"December"`
fn strip_ordering_number(name: &str) -> Option<&str> {
    let digits = name.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 {
        return None;
    }
    let rest = name[digits..].strip_prefix('(')?;
    let end = rest.find(')')?;
    Some(&rest[..end])
}

/// Caption for a file, falling back to its name up to the first dot with
/// underscores and dashes turned into spaces.
pub fn picture_title(file_name: &str, captions: &HashMap<String, String>) -> String {
    if let Some(caption) = captions.get(file_name) {
        return caption.clone();
    }
    let base = file_name.split('.').next().unwrap_or(file_name);
    base.replace(['_', '-'], " ")
}
