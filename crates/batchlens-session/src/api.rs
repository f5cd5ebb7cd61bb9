// Remote discovery API seam.
//
// The reporting backend is an external collaborator; implementations wrap
// whatever HTTP client the host application uses.

use std::collections::BTreeMap;

use async_trait::async_trait;
use batchlens_core::{DateRange, DiscoveryResponse, NormalizeError, TemplateRef};
use thiserror::Error;

/// One batch-discovery call for a single template.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRequest {
    pub template: TemplateRef,
    pub date_range: DateRange,
    pub connection_id: Option<String>,
    /// Key-token values narrowing the query, keyed by token name.
    pub key_filters: BTreeMap<String, String>,
}

/// Discovery call failure classification
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("discovery rejected with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Decode(#[from] NormalizeError),
}

/// Batch discovery backend
#[async_trait]
pub trait DiscoveryApi: Send + Sync {
    /// Discover which batches exist for the request's template, date range
    /// and key filters.
    async fn discover(&self, request: &DiscoveryRequest) -> Result<DiscoveryResponse, ApiError>;
}
