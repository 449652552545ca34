//! HTML for the album pages.
//!
//! Templates are liquid, compiled into the binary. URLs are built on the
//! Rust side; text from file names is escaped by the templates.

use super::AlbumError;
use super::listing::{DirectoryNode, beautify, join_relative};
use serde::Serialize;

const PAGE_HEADER: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{ page_title | escape }}</title></head>
<body {{ body_args }}>
"#;

const PAGE_FOOTER: &str = r#"<hr>
<address>{{ app_name | escape }}</address>
</body>
</html>
"#;

/// Links shown under every page that has media on it.
const MEDIA_LINKS: &str = r#"<hr>
<center>
Slide Show: <a href="{{ links.directory_url }}?slide_show=sm">small</a> | <a href="{{ links.directory_url }}?slide_show=med">medium</a> | <a href="{{ links.directory_url }}?slide_show=lg">large</a> | <a href="{{ links.directory_url }}?slide_show=full">full sized</a><br>
All Images: <a href="{{ links.directory_url }}?all_full_images=sm">small</a> | <a href="{{ links.directory_url }}?all_full_images=med">medium</a> | <a href="{{ links.directory_url }}?all_full_images=lg">large</a> | <a href="{{ links.directory_url }}?all_full_images=full">full sized</a><br>
<a href="{{ links.directory_url }}">Back to thumbnails</a><br>
<a href="{{ links.album_url }}">Back to {{ links.album_title | escape }}</a>
</center>
"#;

const TOP_PAGE: &str = r#"<h3>Available Albums</h3>
{% for album in albums %}<a href="{{ album.url }}">{{ album.title | escape }}</a><br>
{% endfor %}"#;

const DIRECTORY_PAGE: &str = r#"<h3>{{ album_title | escape }}</h3>
<center>
{{ caption_html }}
{% if tree.size > 0 %}<dl>
{% for entry in tree %}<dt><a href="{{ entry.url }}">{{ entry.title | escape }}</a></dt>{% if entry.opens %}
<dd><dl>{% endif %}{% if entry.closes > 0 %}{% for level in (1..entry.closes) %}</dl></dd>
{% endfor %}{% endif %}{% endfor %}
</dl>{% endif %}
{% if rows.size > 0 %}<table border="{{ outside_border }}">
{% for row in rows %}<tr>
{% for item in row %}  <td align="center">
    <table border="{{ inside_border }}">
      <tr><td align="center"><a href="{{ item.view_url }}"><img src="{{ item.thumb_url }}" alt="{{ item.name | escape }}"></a></td></tr>
      <tr><td align="center">{% if item.is_video %}<a href="{{ item.view_url }}">Play</a>{% else %}<a href="{{ item.small_url }}">Sm</a> <a href="{{ item.medium_url }}">Med</a> <a href="{{ item.large_url }}">Lg</a>{% endif %}<br>
      {% if item.title.caption %}{{ item.title.caption }}{% else %}{{ item.title.text | escape }}{% endif %}</td></tr>
    </table>
  </td>
{% endfor %}</tr>
{% endfor %}</table>
{% endif %}</center>
"#;

const SINGLE_VIEW_PAGE: &str = r#"<center>
{{ caption_html }}
<table border="0" cellpadding="4" cellspacing="0"><tr>
{% if prev_jump %}<td align="left"><a href="{{ prev_jump.url }}">&lt;Prev {{ prev_jump.step }}&lt;</a></td>
{% endif %}{% for entry in strip %}<td{% if entry.is_current %} bgcolor="blue"{% endif %}><a href="{{ entry.url }}"><img src="{{ entry.thumb_url }}" height="60" alt="{{ entry.name | escape }}"></a></td>
{% endfor %}{% if next_jump %}<td align="right"><a href="{{ next_jump.url }}">&gt;Next {{ next_jump.step }}&gt;</a></td>
{% endif %}</tr></table>
<hr>
{% if item.is_video %}<video controls src="{{ item.media_url }}" poster="{{ item.thumb_url }}">{{ item.name | escape }}</video>
{% else %}<a href="{{ item.original_url }}"><img src="{{ item.media_url }}" alt="{{ item.name | escape }}"></a>
{% endif %}<hr>
<h3>{% if item.title.caption %}{{ item.title.caption }}{% else %}{{ item.title.text | escape }}{% endif %}</h3>
</center>
"#;

const ALL_IMAGES_PAGE: &str = r#"<center>
{{ caption_html }}
{% for image in images %}<img src="{{ image.url }}" alt="{{ image.name | escape }}"><hr>
{% if image.title.caption %}{{ image.title.caption }}{% else %}{{ image.title.text | escape }}{% endif %}<hr>
{% endfor %}</center>
"#;

/// Which page body to wrap in the shared header and footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Top,
    Directory,
    SingleView,
    AllImages,
}

impl Page {
    fn source(&self) -> String {
        let body = match self {
            Page::Top => TOP_PAGE.to_string(),
            Page::Directory => format!(
                "{}{{% if rows.size > 0 %}}{}{{% endif %}}",
                DIRECTORY_PAGE, MEDIA_LINKS
            ),
            Page::SingleView => format!("{}{}", SINGLE_VIEW_PAGE, MEDIA_LINKS),
            Page::AllImages => format!("{}{}", ALL_IMAGES_PAGE, MEDIA_LINKS),
        };
        format!("{}{}{}", PAGE_HEADER, body, PAGE_FOOTER)
    }
}

pub fn render(page: Page, globals: &liquid::Object) -> Result<String, AlbumError> {
    let parser = liquid::ParserBuilder::with_stdlib().build()?;
    let template = parser.parse(&page.source())?;
    Ok(template.render(globals)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumLink {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageLinks {
    pub directory_url: String,
    pub album_url: String,
    pub album_title: String,
}

/// Text under a picture. A caption is trusted HTML and is emitted as is;
/// `text` comes from the file name and is escaped by the templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PictureTitle {
    pub caption: Option<String>,
    pub text: String,
}

/// One cell of the directory grid.
#[derive(Debug, Clone, Serialize)]
pub struct GridItem {
    pub name: String,
    pub title: PictureTitle,
    pub is_video: bool,
    pub view_url: String,
    pub thumb_url: String,
    pub small_url: String,
    pub medium_url: String,
    pub large_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JumpLink {
    pub url: String,
    pub step: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StripLink {
    pub name: String,
    pub url: String,
    pub thumb_url: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewedItem {
    pub name: String,
    pub title: PictureTitle,
    pub is_video: bool,
    /// What the page shows: the original, a sized variant or a transcode.
    pub media_url: String,
    pub original_url: String,
    pub thumb_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullImage {
    pub name: String,
    pub title: PictureTitle,
    pub url: String,
}

/// Percent-encodes each segment of a relative path.
pub fn encode_path(relative: &str) -> String {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `/{album}/albums/{relative}`
pub fn album_url(album: &str, relative: &str) -> String {
    prefixed_url(album, "albums", relative)
}

/// `/{album}/thumbs/{relative}`
pub fn thumbs_url(album: &str, relative: &str) -> String {
    prefixed_url(album, "thumbs", relative)
}

/// URL of a directory page, always with a trailing slash.
pub fn directory_url(album: &str, relative_dir: &str) -> String {
    let url = album_url(album, relative_dir);
    if url.ends_with('/') {
        url
    } else {
        format!("{}/", url)
    }
}

fn prefixed_url(album: &str, root: &str, relative: &str) -> String {
    format!(
        "/{}/{}/{}",
        urlencoding::encode(album),
        root,
        encode_path(relative)
    )
}

/// One `<dt>` of the directory tree. `opens` starts a nested list for the
/// entry's children; `closes` is how many nested lists end after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub url: String,
    pub title: String,
    pub opens: bool,
    pub closes: usize,
}

/// Flattens a directory tree into the entries the directory page renders as
/// nested `<dl>` lists. `base_dir` is the relative directory the node paths
/// hang off.
pub fn tree_entries(album: &str, base_dir: &str, nodes: &[DirectoryNode]) -> Vec<TreeEntry> {
    let mut entries = Vec::new();
    push_nodes(&mut entries, album, base_dir, nodes);
    entries
}

fn push_nodes(entries: &mut Vec<TreeEntry>, album: &str, base_dir: &str, nodes: &[DirectoryNode]) {
    for node in nodes {
        entries.push(TreeEntry {
            url: directory_url(album, &join_relative(base_dir, &node.path)),
            title: node.title.clone(),
            opens: !node.children.is_empty(),
            closes: 0,
        });
        if !node.children.is_empty() {
            push_nodes(entries, album, base_dir, &node.children);
            if let Some(last) = entries.last_mut() {
                last.closes += 1;
            }
        }
    }
}

/// Page title for a directory: its beautified last segment, or the album
/// title at the root.
pub fn directory_title(relative_dir: &str, album_title: &str) -> String {
    match relative_dir.rsplit('/').next() {
        Some(last) if !last.is_empty() => beautify(last),
        _ => album_title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, path: &str, children: Vec<DirectoryNode>) -> DirectoryNode {
        DirectoryNode {
            name: name.to_string(),
            title: beautify(name),
            path: path.to_string(),
            children,
        }
    }

    #[test]
    fn test_urls_encode_each_segment() {
        assert_eq!(
            album_url("family", "2001/12(December)/my pic.jpg"),
            "/family/albums/2001/12%28December%29/my%20pic.jpg"
        );
        assert_eq!(thumbs_url("family", "a/tn__b.jpg"), "/family/thumbs/a/tn__b.jpg");
        assert_eq!(directory_url("family", ""), "/family/albums/");
        assert_eq!(directory_url("family", "2001"), "/family/albums/2001/");
    }

    #[test]
    fn test_tree_entries_track_nesting() {
        let tree = vec![
            node(
                "2001",
                "2001",
                vec![node(
                    "12(December)",
                    "2001/12(December)",
                    vec![node("xmas", "2001/12(December)/xmas", vec![])],
                )],
            ),
            node("2002", "2002", vec![]),
        ];
        let entries = tree_entries("family", "", &tree);
        let shape: Vec<(&str, bool, usize)> = entries
            .iter()
            .map(|e| (e.title.as_str(), e.opens, e.closes))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("2001", true, 0),
                ("December", true, 0),
                ("xmas", false, 2),
                ("2002", false, 0),
            ]
        );
        assert_eq!(entries[1].url, "/family/albums/2001/12%28December%29/");
    }

    #[test]
    fn test_directory_title() {
        assert_eq!(directory_title("2001/12(December)", "Family"), "December");
        assert_eq!(directory_title("", "Family"), "Family");
    }

    #[test]
    fn test_top_page_renders_albums() {
        let albums = vec![AlbumLink {
            url: "/family/albums/".to_string(),
            title: "Family & Friends".to_string(),
        }];
        let globals = liquid::object!({
            "page_title": "Available Albums",
            "body_args": "",
            "app_name": "Album",
            "albums": albums,
        });
        let html = render(Page::Top, &globals).unwrap();
        assert!(html.contains("<a href=\"/family/albums/\">Family &amp; Friends</a>"));
        assert!(html.contains("<title>Available Albums</title>"));
    }

    fn directory_globals(tree: Vec<TreeEntry>, rows: Vec<Vec<GridItem>>) -> liquid::Object {
        let links = PageLinks {
            directory_url: "/family/albums/".to_string(),
            album_url: "/family/albums/".to_string(),
            album_title: "Family".to_string(),
        };
        liquid::object!({
            "page_title": "Family",
            "body_args": "",
            "app_name": "Album",
            "album_title": "Family",
            "caption_html": "",
            "tree": tree,
            "rows": rows,
            "outside_border": 0,
            "inside_border": 0,
            "links": links,
        })
    }

    fn grid_item(name: &str, caption: Option<&str>, text: &str) -> GridItem {
        GridItem {
            name: name.to_string(),
            title: PictureTitle {
                caption: caption.map(str::to_string),
                text: text.to_string(),
            },
            is_video: false,
            view_url: format!("/family/albums/{}", name),
            thumb_url: format!("/family/thumbs/tn__{}", name),
            small_url: String::new(),
            medium_url: String::new(),
            large_url: String::new(),
        }
    }

    #[test]
    fn test_directory_tree_renders_nested_lists() {
        let tree = vec![node(
            "2001",
            "2001",
            vec![node("12(December)", "2001/12(December)", vec![])],
        )];
        let globals = directory_globals(tree_entries("family", "", &tree), Vec::new());
        let html = render(Page::Directory, &globals).unwrap();
        assert!(html.contains("<dl>\n<dt><a href=\"/family/albums/2001/\">2001</a></dt>\n<dd><dl>"));
        assert!(html.contains(
            "<dd><dl><dt><a href=\"/family/albums/2001/12%28December%29/\">December</a></dt></dl></dd>"
        ));
        assert!(!html.contains("slide_show"));
    }

    #[test]
    fn test_titles_escape_file_names_but_not_captions() {
        let rows = vec![vec![
            grid_item("a.jpg", Some("<b>Bold</b>"), "<b>Bold</b>"),
            grid_item("b&c.jpg", None, "b&c"),
        ]];
        let globals = directory_globals(Vec::new(), rows);
        let html = render(Page::Directory, &globals).unwrap();
        assert!(html.contains("<b>Bold</b></td>"));
        assert!(html.contains("b&amp;c</td>"));
        assert!(!html.contains("<dl>"));
        assert!(html.contains("?slide_show=sm"));
    }
}
