// Derivative module - thumbnails, fixed size views and video variants made on demand
mod cache;
mod error;
pub mod naming;
mod pool;
mod producers;
mod registry;

pub use cache::{DerivativeCache, Resolved};
pub use error::{DerivativeError, PoolError, ProducerError};
pub use naming::{FixedSize, SourceName, VariantKind};
pub use pool::WorkerPool;
pub use producers::{MediaProducer, ProduceJob, VariantProducer, ffmpeg_available};
pub use registry::{DerivativeKey, InFlightRegistry};

use std::sync::Arc;

pub type SharedDerivativeCache = Arc<DerivativeCache>;
