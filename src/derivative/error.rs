use thiserror::Error;

#[derive(Debug, Error)]
pub enum DerivativeError {
    #[error("Source file not found")]
    SourceNotFound,

    #[error("Not a derivative file name")]
    VariantUnrecognized,

    #[error("Several source files share the requested name: {0:?}")]
    AmbiguousSource(Vec<String>),

    #[error("Producer failed: {0}")]
    ProducerFailure(#[from] ProducerError),

    #[error("Background queue is full")]
    PoolSaturated,

    #[error("Invalid path")]
    InvalidPath,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("ffmpeg exited with {status}: {stderr}")]
    Ffmpeg { status: String, stderr: String },

    #[error("Invalid frame size: {0}")]
    InvalidFrameSize(String),

    #[error("Producer task failed: {0}")]
    TaskFailed(String),

    #[error("Producer wrote an empty file")]
    EmptyOutput,

    #[error("Concurrent request failed to produce the file")]
    ConcurrentFailure,
}

#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
    #[error("Worker pool backlog is full")]
    Full,

    #[error("Worker pool has shut down")]
    Closed,
}
