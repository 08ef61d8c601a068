//! Pattern-based routing of generated SQL to downstream services.
//!
//! A request path selects a [`Destination`] through the [`DestinationRouter`];
//! the destination URL then selects a transformer through the
//! [`TransformerRegistry`]. Both are ordered [`PatternRegistry`] instances
//! where the first matching rule wins.

mod orchestrator;
mod pattern;
mod registry;
mod retry;
mod transformer;

pub use orchestrator::{
    ForwardPlan, ForwardRequest, ForwardResult, ForwardingOrchestrator, PlanError,
};
pub use pattern::{GlobPattern, PatternError};
pub use registry::{
    Destination, DestinationRouter, ForwardingTables, PatternEntry, PatternRegistry,
    RegistryError, TransformerRegistry, TransformerRule,
};
pub use retry::RetryPolicy;
pub use transformer::{TransformContext, TransformError, TransformSpec};
