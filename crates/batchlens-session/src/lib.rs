// batchlens-session - Discovery session orchestration
//
// Drives batch discovery for a selected template set over the remote
// reporting API: one awaited request per template, normalized results into
// the cache store, readiness gates for generating and scheduling reports.

mod api;
mod session;

pub use api::{ApiError, DiscoveryApi, DiscoveryRequest};
pub use session::{
    DiscoverySession, DiscoverySummary, QueryContext, Readiness, SessionError, TemplateOutcome,
};
