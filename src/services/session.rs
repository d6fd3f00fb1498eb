use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{InsightError, InsightResult};
use crate::models::ProfileDocument;
use crate::services::insights::{Granularity, InsightAssembler, Insights};

/// Source of dataset profiles, e.g. the statistics backend.
pub trait ProfileProvider: Send + Sync {
    fn fetch_profile<'a>(
        &'a self,
        dataset_id: &'a str,
    ) -> BoxFuture<'a, InsightResult<ProfileDocument>>;
}

#[derive(Debug)]
pub enum AnalysisOutcome {
    /// The response belonged to the latest request and replaced the snapshot.
    Applied(Insights),
    /// The latest request failed; the snapshot is now empty.
    Failed(InsightError),
    /// A newer request was issued while this one was in flight.
    Stale { token: u64 },
}

#[derive(Debug, Default)]
struct SessionState {
    latest_token: u64,
    loading: bool,
    dataset_id: Option<String>,
    document: Option<ProfileDocument>,
    granularity: Granularity,
}

/// Clears `loading` if the request it belongs to is dropped while still the
/// latest one, e.g. when the caller times out.
struct InFlight<'a> {
    state: &'a Mutex<SessionState>,
    token: u64,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock();
        if state.latest_token == self.token {
            debug!("Request {} dropped before resolving", self.token);
            state.loading = false;
        }
    }
}

/// Holds the current insights for one viewer. Only the most recently issued
/// request may overwrite the snapshot.
pub struct AnalysisSession<P> {
    provider: P,
    assembler: InsightAssembler,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<Option<Insights>>,
}

impl<P: ProfileProvider> AnalysisSession<P> {
    pub fn new(provider: P, assembler: InsightAssembler) -> Self {
        let state = SessionState {
            granularity: assembler.config().default_granularity,
            ..Default::default()
        };
        let (snapshots, _) = watch::channel(None);
        Self {
            provider,
            assembler,
            state: Mutex::new(state),
            snapshots,
        }
    }

    pub async fn analyze(&self, dataset_id: &str) -> AnalysisOutcome {
        let token = {
            let mut state = self.state.lock();
            state.latest_token += 1;
            state.loading = true;
            state.latest_token
        };
        let mut in_flight = InFlight {
            state: &self.state,
            token,
            armed: true,
        };
        debug!("Fetching profile for dataset {} (request {})", dataset_id, token);

        let result = self.provider.fetch_profile(dataset_id).await;

        let mut state = self.state.lock();
        in_flight.armed = false;
        if token != state.latest_token {
            warn!(
                "Discarding stale profile for dataset {} (request {}, latest {})",
                dataset_id, token, state.latest_token
            );
            return AnalysisOutcome::Stale { token };
        }
        state.loading = false;
        state.dataset_id = Some(dataset_id.to_string());

        match result {
            Ok(document) => {
                let insights = self.assembler.assemble_document(&document, state.granularity);
                state.document = Some(document);
                self.snapshots.send_replace(Some(insights.clone()));
                info!("Applied insights for dataset {} (request {})", dataset_id, token);
                AnalysisOutcome::Applied(insights)
            }
            Err(e) => {
                warn!("Failed to fetch profile for dataset {}: {}", dataset_id, e);
                state.document = None;
                self.snapshots.send_replace(None);
                AnalysisOutcome::Failed(e)
            }
        }
    }

    /// Rebuilds the snapshot from the cached profile at a new granularity.
    pub fn set_granularity(&self, granularity: Granularity) -> Option<Insights> {
        let mut state = self.state.lock();
        state.granularity = granularity;
        let insights = state
            .document
            .as_ref()
            .map(|doc| self.assembler.assemble_document(doc, granularity));
        if insights.is_some() {
            self.snapshots.send_replace(insights.clone());
        }
        insights
    }

    pub fn insights(&self) -> Option<Insights> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Insights>> {
        self.snapshots.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn granularity(&self) -> Granularity {
        self.state.lock().granularity
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn dataset_id(&self) -> Option<String> {
        self.state.lock().dataset_id.clone()
    }
}
