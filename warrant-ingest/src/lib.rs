//! Write side of Warrant.
//!
//! Commands arrive from the ingestion transport already ordered per
//! resource id. [`CommandApplicator`] decodes them and drives the
//! [`UpdatePipeline`], which performs read, mutate and conditional
//! write against the backend. A version mismatch surfaces as a
//! conflict; nothing here retries.

mod applicator;
mod error;
mod locks;
mod pipeline;
mod registry;

pub use applicator::{Applied, CommandApplicator, CommandHandler};
pub use error::{PipelineError, PipelineResult};
pub use locks::KeyedLocks;
pub use pipeline::{IngestConfig, RightChange, RightMutation, UpdatePipeline};
pub use registry::KindRegistry;
