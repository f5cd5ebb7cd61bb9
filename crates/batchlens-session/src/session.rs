// Discovery session: context tracking, the sequential fetch loop, and
// readiness gates over the cached results.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use batchlens_cache::DiscoveryStore;
use batchlens_core::{normalize_discovery, DateRange, DiscoveryMeta, TemplateRef};
use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{DiscoveryApi, DiscoveryRequest};

/// The query context a discovery run is valid for. Cached results are
/// meaningless outside the template set and date range that produced them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryContext {
    pub templates: Vec<TemplateRef>,
    pub date_range: DateRange,
    pub connection_id: Option<String>,
    pub connection_name: Option<String>,
    pub key_filters: BTreeMap<String, String>,
}

impl QueryContext {
    /// Same template set and date range - cached results stay valid.
    fn same_query(&self, other: &QueryContext) -> bool {
        if self.date_range != other.date_range {
            return false;
        }
        let ids: BTreeSet<&str> = self.templates.iter().map(|t| t.id.as_str()).collect();
        let other_ids: BTreeSet<&str> = other.templates.iter().map(|t| t.id.as_str()).collect();
        ids == other_ids
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no query context set")]
    NoContext,
}

/// Outcome of one template's discovery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOutcome {
    Discovered {
        template_id: String,
        batches: usize,
        rows: u64,
    },
    Failed {
        template_id: String,
        message: String,
    },
}

/// Per-run summary across all requested templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub outcomes: Vec<TemplateOutcome>,
}

impl DiscoverySummary {
    pub fn discovered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TemplateOutcome::Discovered { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.discovered_count()
    }
}

/// Selection-dependent aggregates gating report generation and scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Readiness {
    pub templates_requested: usize,
    pub templates_discovered: usize,
    pub selected_batches: usize,
    pub selected_rows: i64,
    pub ready_to_generate: bool,
    pub ready_to_schedule: bool,
}

/// Drives discovery for the currently selected templates and date range.
///
/// Fetches are issued sequentially, one awaited request per template, which
/// bounds backend load per user action; a slow call stalls the ones behind
/// it.
pub struct DiscoverySession {
    store: Arc<DiscoveryStore>,
    api: Arc<dyn DiscoveryApi>,
    context: Mutex<Option<QueryContext>>,
}

impl DiscoverySession {
    pub fn new(store: Arc<DiscoveryStore>, api: Arc<dyn DiscoveryApi>) -> Self {
        Self {
            store,
            api,
            context: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<DiscoveryStore> {
        &self.store
    }

    pub fn context(&self) -> Option<QueryContext> {
        self.context.lock().clone()
    }

    /// Install a new query context. Changing the template set or the date
    /// range invalidates every cached result, so the store is cleared.
    pub fn set_context(&self, context: QueryContext) {
        let mut current = self.context.lock();
        let stale = current
            .as_ref()
            .map(|existing| !existing.same_query(&context))
            .unwrap_or(false);
        if stale {
            debug!("query context changed, clearing discovery cache");
            self.store.clear();
        }
        *current = Some(context);
    }

    /// Run discovery for every template in the context, sequentially.
    ///
    /// A failed call never populates the cache entry for its template; the
    /// failure lands in the summary for the UI to surface.
    pub async fn run_discovery(&self) -> Result<DiscoverySummary, SessionError> {
        let context = self.context().ok_or(SessionError::NoContext)?;

        let mut outcomes = Vec::with_capacity(context.templates.len());
        for template in &context.templates {
            let request = DiscoveryRequest {
                template: template.clone(),
                date_range: context.date_range,
                connection_id: context.connection_id.clone(),
                key_filters: context.key_filters.clone(),
            };

            match self.api.discover(&request).await {
                Ok(response) => {
                    let result = normalize_discovery(&response, template);
                    debug!(
                        template = %template.id,
                        batches = result.all_batches.len(),
                        rows = result.rows_total,
                        "discovery succeeded"
                    );
                    let outcome = TemplateOutcome::Discovered {
                        template_id: template.id.clone(),
                        batches: result.all_batches.len(),
                        rows: result.rows_total,
                    };
                    self.store.insert_result(&template.id, result);
                    outcomes.push(outcome);
                }
                Err(err) => {
                    warn!(template = %template.id, error = %err, "discovery failed");
                    outcomes.push(TemplateOutcome::Failed {
                        template_id: template.id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        self.store.set_meta(DiscoveryMeta {
            date_range: context.date_range,
            templates: context.templates.clone(),
            connection_id: context.connection_id.clone(),
            connection_name: context.connection_name.clone(),
            fetched_at: Utc::now().timestamp_millis(),
        });

        Ok(DiscoverySummary { outcomes })
    }

    /// Compute the generate/schedule gates from the cached results.
    ///
    /// Generation needs every requested template discovered with at least
    /// one batch selected somewhere; scheduling additionally needs a fully
    /// bounded date range.
    pub fn readiness(&self) -> Readiness {
        let Some(context) = self.context() else {
            return Readiness::default();
        };

        let mut readiness = Readiness {
            templates_requested: context.templates.len(),
            ..Readiness::default()
        };

        for template in &context.templates {
            if let Some(result) = self.store.get(&template.id) {
                readiness.templates_discovered += 1;
                readiness.selected_batches += result.selected_batch_count();
                readiness.selected_rows += result.selected_rows();
            }
        }

        readiness.ready_to_generate = readiness.templates_requested > 0
            && readiness.templates_discovered == readiness.templates_requested
            && readiness.selected_batches > 0;
        readiness.ready_to_schedule =
            readiness.ready_to_generate && context.date_range.is_bounded();

        readiness
    }
}
