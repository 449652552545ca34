use super::AlbumError;
use super::listing::{
    CaptionFile, MediaKind, clean_relative_path, directory_tree, join_relative, list_directory,
    picture_title, split_relative,
};
use super::navigation::NavigationWindow;
use super::pages::{
    self, AlbumLink, FullImage, GridItem, JumpLink, Page, PageLinks, PictureTitle, StripLink,
    ViewedItem, album_url, directory_url, thumbs_url,
};
use super::serve::{DERIVATIVE_CACHE_CONTROL, ORIGINAL_CACHE_CONTROL, serve_file};
use crate::derivative::{DerivativeError, FixedSize, Resolved, VariantKind, naming};
use crate::{AlbumConfig, AppState};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{debug, error, warn};

/// Seconds a client is asked to wait before polling a derivative again.
const RETRY_AFTER_SECONDS: &str = "5";

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    /// `sm`, `med`, `lg` or `full`.
    pub slide_show: Option<String>,
    /// `sm`, `med`, `lg` or `full`.
    pub all_full_images: Option<String>,
    /// Any value asks for the single item page instead of the raw file.
    pub view: Option<String>,
}

#[axum::debug_handler]
pub async fn top_page_handler(State(app_state): State<AppState>) -> Response {
    let albums: Vec<AlbumLink> = app_state
        .albums
        .values()
        .map(|album| AlbumLink {
            url: directory_url(&album.name, ""),
            title: album.title.clone(),
        })
        .collect();

    let globals = liquid::object!({
        "page_title": "Available Albums",
        "body_args": app_state.config.app.body_args,
        "app_name": app_state.config.app.name,
        "albums": albums,
    });

    html_response(pages::render(Page::Top, &globals))
}

#[axum::debug_handler]
pub async fn album_root_handler(
    State(app_state): State<AppState>,
    Path(album_name): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Response {
    album_handler(
        State(app_state),
        Path((album_name, String::new())),
        Query(query),
    )
    .await
}

#[axum::debug_handler]
pub async fn album_handler(
    State(app_state): State<AppState>,
    Path((album_name, path)): Path<(String, String)>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let Some(album) = app_state.albums.get(&album_name) else {
        debug!("Album '{}' not found", album_name);
        return (StatusCode::NOT_FOUND, "Album not found").into_response();
    };

    match album_page(&app_state, album, &path, &query).await {
        Ok(response) => response,
        Err(AlbumError::NotFound) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(AlbumError::InvalidPath) => {
            warn!("Rejected album path {:?}", path);
            (StatusCode::BAD_REQUEST, "Invalid path").into_response()
        }
        Err(e) => {
            error!("Failed to render {}/{}: {}", album_name, path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn derivative_handler(
    State(app_state): State<AppState>,
    Path((album_name, path)): Path<(String, String)>,
) -> Response {
    let Some(album) = app_state.albums.get(&album_name) else {
        debug!("Album '{}' not found", album_name);
        return (StatusCode::NOT_FOUND, "Album not found").into_response();
    };

    match app_state.derivatives.resolve(album, &path).await {
        Ok(Resolved::Ready(file)) => serve_file(&file, DERIVATIVE_CACHE_CONTROL).await,
        Ok(Resolved::NotReadyYet) => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, RETRY_AFTER_SECONDS)],
            "Still being generated",
        )
            .into_response(),
        Err(DerivativeError::PoolSaturated) => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, RETRY_AFTER_SECONDS)],
            "Too busy",
        )
            .into_response(),
        Err(DerivativeError::InvalidPath) => {
            warn!("Rejected derivative path {:?}", path);
            (StatusCode::BAD_REQUEST, "Invalid path").into_response()
        }
        Err(DerivativeError::IoError(e)) => {
            error!("IO error resolving {}/{}: {}", album_name, path, e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
        Err(e) => {
            debug!("No derivative for {}/{}: {}", album_name, path, e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

async fn album_page(
    app_state: &AppState,
    album: &AlbumConfig,
    path: &str,
    query: &ViewQuery,
) -> Result<Response, AlbumError> {
    let relative = clean_relative_path(path).ok_or(AlbumError::InvalidPath)?;
    let full_path = album.album_dir.join(&relative);

    match tokio::fs::metadata(&full_path).await {
        Ok(metadata) if metadata.is_dir() => {
            directory_page(app_state, album, &relative, query).await
        }
        Ok(_) => {
            if query.slide_show.is_none() && query.view.is_none() {
                return Ok(serve_file(&full_path, ORIGINAL_CACHE_CONTROL).await);
            }
            let (dir, name) = split_relative(&relative);
            let size = query
                .slide_show
                .as_deref()
                .and_then(FixedSize::from_view_key);
            single_view_page(app_state, album, dir, name, size, query).await
        }
        Err(_) => {
            // `800x600_beach.jpg` is the single view of `beach.jpg` at that size.
            let (dir, file_name) = split_relative(&relative);
            let size = FixedSize::from_prefixed_name(file_name).ok_or(AlbumError::NotFound)?;
            let name = size.strip_prefix(file_name).ok_or(AlbumError::NotFound)?;
            if MediaKind::of(name) != Some(MediaKind::Image)
                || !is_file(album, &join_relative(dir, name)).await
            {
                return Err(AlbumError::NotFound);
            }
            let size = match query.slide_show.as_deref() {
                Some(key) => FixedSize::from_view_key(key),
                None => Some(size),
            };
            single_view_page(app_state, album, dir, name, size, query).await
        }
    }
}

async fn directory_page(
    app_state: &AppState,
    album: &AlbumConfig,
    relative_dir: &str,
    query: &ViewQuery,
) -> Result<Response, AlbumError> {
    let dir_path = album.album_dir.join(relative_dir);
    let listing = list_directory(&dir_path, album.reverse_dirs, album.reverse_pics).await?;
    let images = listing.images();

    if let Some(key) = query.slide_show.as_deref() {
        let first = images.first().or_else(|| listing.media.first());
        if let Some(first) = first {
            let target = format!(
                "{}?slide_show={}",
                album_url(&album.name, &join_relative(relative_dir, first)),
                urlencoding::encode(key)
            );
            return Ok(Redirect::temporary(&target).into_response());
        }
    }

    let mut globals = page_globals(app_state, album, relative_dir, &listing.caption);

    if let Some(key) = query.all_full_images.as_deref()
        && !images.is_empty()
    {
        let size = FixedSize::from_view_key(key);
        let images: Vec<FullImage> = images
            .iter()
            .map(|name| FullImage {
                url: image_url(album, relative_dir, name, size),
                title: caption_title(name, &listing.caption),
                name: name.clone(),
            })
            .collect();
        globals.insert("images".into(), liquid::model::to_value(&images)?);
        return Ok(html_response(pages::render(Page::AllImages, &globals)));
    }

    let tree = {
        let dir_path = dir_path.clone();
        let reverse_dirs = album.reverse_dirs;
        tokio::task::spawn_blocking(move || directory_tree(&dir_path, reverse_dirs))
            .await
            .map_err(std::io::Error::other)?
    };

    let items: Vec<GridItem> = listing
        .media
        .iter()
        .map(|name| grid_item(album, relative_dir, name, &listing.caption))
        .collect();
    let rows: Vec<Vec<GridItem>> = items
        .chunks(album.columns() as usize)
        .map(|row| row.to_vec())
        .collect();

    globals.insert(
        "tree".into(),
        liquid::model::to_value(&pages::tree_entries(&album.name, relative_dir, &tree))?,
    );
    globals.insert("rows".into(), liquid::model::to_value(&rows)?);
    globals.insert(
        "outside_border".into(),
        liquid::model::Value::scalar(album.outside_table_border as i64),
    );
    globals.insert(
        "inside_border".into(),
        liquid::model::Value::scalar(album.inside_table_border as i64),
    );

    Ok(html_response(pages::render(Page::Directory, &globals)))
}

async fn single_view_page(
    app_state: &AppState,
    album: &AlbumConfig,
    dir: &str,
    name: &str,
    size: Option<FixedSize>,
    query: &ViewQuery,
) -> Result<Response, AlbumError> {
    let listing = list_directory(
        &album.album_dir.join(dir),
        album.reverse_dirs,
        album.reverse_pics,
    )
    .await?;
    let siblings = listing.siblings_of(name);
    let current = siblings
        .iter()
        .position(|sibling| sibling == name)
        .ok_or(AlbumError::NotFound)?;
    let window = NavigationWindow::compute(siblings.len(), current);

    let link = |index: usize| item_url(album, dir, &siblings[index], size);
    let prev_jump = window.prev_jump.map(|jump| JumpLink {
        url: link(jump.target),
        step: jump.step,
    });
    let next_jump = window.next_jump.map(|jump| JumpLink {
        url: link(jump.target),
        step: jump.step,
    });
    let strip: Vec<StripLink> = window
        .entries(&siblings)
        .into_iter()
        .map(|entry| StripLink {
            name: entry.item.clone(),
            url: link(entry.index),
            thumb_url: thumbnail_url(album, dir, entry.item),
            is_current: entry.is_current,
        })
        .collect();

    let item = viewed_item(app_state, album, dir, name, size, &listing.caption).await;

    let mut globals = page_globals(app_state, album, dir, &listing.caption);
    globals.insert(
        "page_title".into(),
        liquid::model::Value::scalar(picture_title(name, &listing.caption.captions)),
    );
    globals.insert("prev_jump".into(), liquid::model::to_value(&prev_jump)?);
    globals.insert("next_jump".into(), liquid::model::to_value(&next_jump)?);
    globals.insert("strip".into(), liquid::model::to_value(&strip)?);
    globals.insert("item".into(), liquid::model::to_value(&item)?);

    let mut response = html_response(pages::render(Page::SingleView, &globals));

    if let Some(key) = query.slide_show.as_deref()
        && let Some(next) = siblings.get(current + 1)
    {
        let refresh = format!(
            "{}; URL={}?slide_show={}",
            album.slide_show_delay,
            album_url(&album.name, &join_relative(dir, next)),
            urlencoding::encode(key)
        );
        if let Ok(value) = HeaderValue::from_str(&refresh) {
            response.headers_mut().insert(header::REFRESH, value);
        }
    }

    Ok(response)
}

async fn viewed_item(
    app_state: &AppState,
    album: &AlbumConfig,
    dir: &str,
    name: &str,
    size: Option<FixedSize>,
    caption: &CaptionFile,
) -> ViewedItem {
    let original = join_relative(dir, name);
    let kind = MediaKind::of(name);

    let media_url = match kind {
        Some(MediaKind::PlayableVideo) => album_url(&album.name, &original),
        Some(MediaKind::ConvertibleVideo) => {
            // Start the transcode now rather than when the player asks for it.
            match app_state
                .derivatives
                .resolve_variant(album, &original, VariantKind::VideoTranscode)
                .await
            {
                Ok(resolved) => debug!("Transcode of {} is {:?}", original, resolved),
                Err(e) => warn!("Could not queue transcode of {}: {}", original, e),
            }
            thumbs_url(
                &album.name,
                &naming::encode(&original, VariantKind::VideoTranscode),
            )
        }
        _ => image_url(album, dir, name, size),
    };

    ViewedItem {
        name: name.to_string(),
        title: caption_title(name, caption),
        is_video: kind.is_some_and(|kind| kind.is_video()),
        media_url,
        original_url: album_url(&album.name, &original),
        thumb_url: thumbnail_url(album, dir, name),
    }
}

fn grid_item(album: &AlbumConfig, dir: &str, name: &str, caption: &CaptionFile) -> GridItem {
    let original = join_relative(dir, name);
    let sized = |size: FixedSize| {
        album_url(
            &album.name,
            &join_relative(dir, &format!("{}{}", size.prefix(), name)),
        )
    };
    let is_video = MediaKind::of(name).is_some_and(|kind| kind.is_video());

    GridItem {
        name: name.to_string(),
        title: caption_title(name, caption),
        is_video,
        view_url: if is_video {
            item_url(album, dir, name, None)
        } else {
            album_url(&album.name, &original)
        },
        thumb_url: thumbnail_url(album, dir, name),
        small_url: sized(FixedSize::Small),
        medium_url: sized(FixedSize::Medium),
        large_url: sized(FixedSize::Large),
    }
}

/// Single item page for a sibling, keeping the size being viewed.
fn item_url(album: &AlbumConfig, dir: &str, name: &str, size: Option<FixedSize>) -> String {
    let is_video = MediaKind::of(name).is_some_and(|kind| kind.is_video());
    match size {
        _ if is_video => format!("{}?view=play", album_url(&album.name, &join_relative(dir, name))),
        Some(size) => album_url(
            &album.name,
            &join_relative(dir, &format!("{}{}", size.prefix(), name)),
        ),
        None => format!("{}?view=full", album_url(&album.name, &join_relative(dir, name))),
    }
}

/// The image itself at `size`, or the original when no size is asked for.
fn image_url(album: &AlbumConfig, dir: &str, name: &str, size: Option<FixedSize>) -> String {
    let original = join_relative(dir, name);
    match size {
        Some(size) => thumbs_url(
            &album.name,
            &naming::encode(&original, VariantKind::FixedWidth(size)),
        ),
        None => album_url(&album.name, &original),
    }
}

fn thumbnail_url(album: &AlbumConfig, dir: &str, name: &str) -> String {
    let kind = match MediaKind::of(name) {
        Some(kind) if kind.is_video() => VariantKind::VideoFrame,
        _ => VariantKind::ThumbnailUseWidth,
    };
    thumbs_url(&album.name, &naming::encode(&join_relative(dir, name), kind))
}

fn caption_title(name: &str, caption: &CaptionFile) -> PictureTitle {
    PictureTitle {
        caption: caption.captions.get(name).cloned(),
        text: picture_title(name, &caption.captions),
    }
}

fn page_globals(
    app_state: &AppState,
    album: &AlbumConfig,
    relative_dir: &str,
    caption: &CaptionFile,
) -> liquid::Object {
    let body_args = if album.body_args.is_empty() {
        app_state.config.app.body_args.clone()
    } else {
        album.body_args.clone()
    };
    let links = PageLinks {
        directory_url: directory_url(&album.name, relative_dir),
        album_url: directory_url(&album.name, ""),
        album_title: album.title.clone(),
    };

    liquid::object!({
        "page_title": pages::directory_title(relative_dir, &album.title),
        "body_args": body_args,
        "app_name": app_state.config.app.name,
        "album_title": album.title,
        "caption_html": caption.html,
        "tree": Vec::<pages::TreeEntry>::new(),
        "links": links,
    })
}

async fn is_file(album: &AlbumConfig, relative: &str) -> bool {
    tokio::fs::metadata(album.album_dir.join(relative))
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn html_response(rendered: Result<String, AlbumError>) -> Response {
    match rendered {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template rendering error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlbumSettings;
    use std::path::PathBuf;

    fn test_album() -> AlbumConfig {
        AlbumConfig::from_settings(
            "family",
            &AlbumSettings {
                album_dir: Some(PathBuf::from("/srv/family")),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_item_urls_keep_size_and_kind() {
        let album = test_album();
        assert_eq!(
            item_url(&album, "2004", "beach.jpg", Some(FixedSize::Medium)),
            "/family/albums/2004/800x600_beach.jpg"
        );
        assert_eq!(
            item_url(&album, "2004", "beach.jpg", None),
            "/family/albums/2004/beach.jpg?view=full"
        );
        assert_eq!(
            item_url(&album, "2004", "party.avi", Some(FixedSize::Small)),
            "/family/albums/2004/party.avi?view=play"
        );
    }

    #[test]
    fn test_thumbnail_urls_by_media_kind() {
        let album = test_album();
        assert_eq!(
            thumbnail_url(&album, "2004", "beach.jpg"),
            "/family/thumbs/2004/tn__beach.jpg"
        );
        assert_eq!(
            thumbnail_url(&album, "2004", "party.avi"),
            "/family/thumbs/2004/tn__party.png"
        );
        assert_eq!(
            image_url(&album, "", "beach.jpg", Some(FixedSize::Large)),
            "/family/thumbs/1024x768_beach.jpg"
        );
    }

    #[test]
    fn test_caption_title_prefers_captions() {
        let caption = CaptionFile::parse("__END__\na.jpg:<b>Bold</b>");
        assert_eq!(
            caption_title("a.jpg", &caption).caption.as_deref(),
            Some("<b>Bold</b>")
        );
        assert_eq!(
            caption_title("b&c_d.jpg", &caption),
            PictureTitle {
                caption: None,
                text: "b&c d".to_string(),
            }
        );
    }
}
