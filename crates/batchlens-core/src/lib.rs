// batchlens-core - Pure discovery domain logic
//
// This crate contains the PURE logic for turning loose batch-discovery
// responses into strictly-typed results and reconciling user selection
// state against them. No I/O, no async, no runtime dependencies.

pub mod normalize;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use normalize::{normalize_discovery, NormalizeError};
pub use types::{
    Batch, BatchMetric, ChartDefaults, DateRange, DiscoveryMeta, DiscoveryResult, DiscoverySchema,
    FieldDescriptor, ResampleConfig, ResampleConfigPatch, ResampleState, ResampleUpdate,
    SchemaDefaults, TemplateRef,
};
pub use wire::{DiscoveryResponse, RawBatch};
