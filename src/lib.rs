use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};
use tracing::warn;

pub mod album;
pub mod derivative;
pub mod startup_checks;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    #[serde(default)]
    pub derivatives: DerivativeConfig,
    #[serde(default)]
    pub default: AlbumSettings,
    #[serde(default)]
    pub albums: BTreeMap<String, AlbumSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub body_args: String,
}

/// Sizing of the background pool used for video transcodes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DerivativeConfig {
    pub workers: usize,
    pub backlog: usize,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            backlog: 750,
        }
    }
}

/// Per-album settings as written in the config file. Every field is optional
/// so an album entry only needs to carry what differs from `[default]`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AlbumSettings {
    pub title: Option<String>,
    pub album_dir: Option<PathBuf>,
    pub thumb_dir: Option<PathBuf>,
    pub body_args: Option<String>,
    pub thumbnail_width: Option<u32>,
    pub video_thumbnail_size: Option<String>,
    pub default_browser_width: Option<u32>,
    pub slide_show_delay: Option<u32>,
    pub number_of_columns: Option<u32>,
    pub outside_table_border: Option<u32>,
    pub inside_table_border: Option<u32>,
    #[serde(default)]
    pub reverse_dirs: bool,
    #[serde(default)]
    pub reverse_pics: bool,
}

impl AlbumSettings {
    /// Overlays every value set in `other` on top of `self`. Empty strings and
    /// zero numbers count as unset.
    pub fn merge(&self, other: &AlbumSettings) -> AlbumSettings {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>, is_set: impl Fn(&T) -> bool) -> Option<T> {
            match over {
                Some(value) if is_set(value) => Some(value.clone()),
                _ => base.clone(),
            }
        }
        let text = |s: &String| !s.is_empty();
        let path = |p: &PathBuf| !p.as_os_str().is_empty();
        let number = |n: &u32| *n > 0;

        AlbumSettings {
            title: pick(&self.title, &other.title, text),
            album_dir: pick(&self.album_dir, &other.album_dir, path),
            thumb_dir: pick(&self.thumb_dir, &other.thumb_dir, path),
            body_args: pick(&self.body_args, &other.body_args, text),
            thumbnail_width: pick(&self.thumbnail_width, &other.thumbnail_width, number),
            video_thumbnail_size: pick(
                &self.video_thumbnail_size,
                &other.video_thumbnail_size,
                text,
            ),
            default_browser_width: pick(
                &self.default_browser_width,
                &other.default_browser_width,
                number,
            ),
            slide_show_delay: pick(&self.slide_show_delay, &other.slide_show_delay, number),
            number_of_columns: pick(&self.number_of_columns, &other.number_of_columns, number),
            outside_table_border: pick(
                &self.outside_table_border,
                &other.outside_table_border,
                number,
            ),
            inside_table_border: pick(
                &self.inside_table_border,
                &other.inside_table_border,
                number,
            ),
            reverse_dirs: self.reverse_dirs || other.reverse_dirs,
            reverse_pics: self.reverse_pics || other.reverse_pics,
        }
    }
}

/// Fully resolved settings for one album.
#[derive(Debug, Clone, Serialize)]
pub struct AlbumConfig {
    pub name: String,
    pub title: String,
    pub album_dir: PathBuf,
    pub thumb_dir: PathBuf,
    pub body_args: String,
    pub thumbnail_width: u32,
    pub video_thumbnail_size: String,
    pub default_browser_width: u32,
    pub slide_show_delay: u32,
    pub number_of_columns: u32,
    pub outside_table_border: u32,
    pub inside_table_border: u32,
    pub reverse_dirs: bool,
    pub reverse_pics: bool,
}

impl AlbumConfig {
    /// Returns `None` when no album directory is configured.
    pub fn from_settings(name: &str, settings: &AlbumSettings) -> Option<Self> {
        let album_dir = settings.album_dir.clone()?;
        Some(Self {
            name: name.to_string(),
            title: settings.title.clone().unwrap_or_else(|| name.to_string()),
            thumb_dir: settings
                .thumb_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("thumbs").join(name)),
            album_dir,
            body_args: settings.body_args.clone().unwrap_or_default(),
            thumbnail_width: settings.thumbnail_width.unwrap_or(100),
            video_thumbnail_size: settings
                .video_thumbnail_size
                .clone()
                .unwrap_or_else(|| "200x150".to_string()),
            default_browser_width: settings.default_browser_width.unwrap_or(640),
            slide_show_delay: settings.slide_show_delay.unwrap_or(5),
            number_of_columns: settings.number_of_columns.unwrap_or(0),
            outside_table_border: settings.outside_table_border.unwrap_or(0),
            inside_table_border: settings.inside_table_border.unwrap_or(0),
            reverse_dirs: settings.reverse_dirs,
            reverse_pics: settings.reverse_pics,
        })
    }

    /// Number of thumbnail columns on a directory page.
    pub fn columns(&self) -> u32 {
        if self.number_of_columns > 0 {
            self.number_of_columns
        } else {
            (self.default_browser_width / self.thumbnail_width.max(1)).max(1)
        }
    }
}

impl Config {
    /// Merges `[default]` into every `[albums.*]` entry. Albums without an
    /// `album_dir` are skipped with a warning.
    pub fn resolved_albums(&self) -> BTreeMap<String, AlbumConfig> {
        let mut resolved = BTreeMap::new();
        for (name, settings) in &self.albums {
            let merged = self.default.merge(settings);
            match AlbumConfig::from_settings(name, &merged) {
                Some(album) => {
                    resolved.insert(name.clone(), album);
                }
                None => warn!("Album '{}' has no album_dir configured, skipping", name),
            }
        }
        resolved
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            app: AppConfig {
                name: "Album".to_string(),
                body_args: String::new(),
            },
            derivatives: DerivativeConfig::default(),
            default: AlbumSettings::default(),
            albums: BTreeMap::new(),
        }
    }
}

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub albums: Arc<BTreeMap<String, AlbumConfig>>,
    pub derivatives: derivative::SharedDerivativeCache,
    pub config: Config,
}

pub async fn create_app(config: Config) -> Router {
    let derivatives = Arc::new(derivative::DerivativeCache::new(
        Arc::new(derivative::MediaProducer),
        config.derivatives.workers,
        config.derivatives.backlog,
    ));
    create_app_with_cache(config, derivatives)
}

/// Builds the router around an existing derivative cache.
pub fn create_app_with_cache(
    config: Config,
    derivatives: derivative::SharedDerivativeCache,
) -> Router {
    let app_state = AppState {
        albums: Arc::new(config.resolved_albums()),
        derivatives,
        config,
    };

    Router::new()
        .route("/", axum::routing::get(album::top_page_handler))
        .route(
            "/{album}/albums",
            axum::routing::get(album::album_root_handler),
        )
        .route(
            "/{album}/albums/",
            axum::routing::get(album::album_root_handler),
        )
        .route(
            "/{album}/albums/{*path}",
            axum::routing::get(album::album_handler),
        )
        .route(
            "/{album}/thumbs/{*path}",
            axum::routing::get(album::derivative_handler),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %request.method(),
                        path = %request.uri().path(),
                        query = ?request.uri().query(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}
