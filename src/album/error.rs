use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlbumError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Invalid path")]
    InvalidPath,

    #[error("Not found")]
    NotFound,
}

impl From<liquid::Error> for AlbumError {
    fn from(e: liquid::Error) -> Self {
        AlbumError::TemplateError(e.to_string())
    }
}
