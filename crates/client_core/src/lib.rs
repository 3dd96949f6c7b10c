use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join3;
use shared::{
    domain::{
        day_index_for, day_index_to_date, CurrentPoem, FailureKind, PoemSnapshot, SnapshotStatus,
    },
    error::ServiceError,
};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod config;
pub mod transport;

pub use config::{load_settings, ClientSettings, ConfigError};
pub use transport::HttpPoemService;

/// Narrow proxy over the remote poem service. One outbound request per call, no retries.
#[async_trait]
pub trait PoemService: Send + Sync {
    async fn fetch_current_poem(&self) -> Result<CurrentPoem, ServiceError>;
    async fn fetch_poem_count(&self) -> Result<u64, ServiceError>;
    async fn fetch_last_update_day_index(&self) -> Result<i64, ServiceError>;
    /// Asks the service to write a new poem and returns its text.
    async fn regenerate(&self) -> Result<String, ServiceError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failed load.
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle's snapshot (ready or error) is now current.
    Published(Arc<PoemSnapshot>),
    /// A newer cycle started before this one finished; its result was dropped.
    Superseded,
    /// The request was refused by the busy guard and nothing was sent.
    Ignored,
}

/// Read-only surface handed to presentation, plus the two commands it may issue.
#[async_trait]
pub trait PoemStateHandle: Send + Sync {
    fn snapshot(&self) -> Arc<PoemSnapshot>;
    fn subscribe(&self) -> watch::Receiver<Arc<PoemSnapshot>>;
    async fn load(&self) -> CycleOutcome;
    async fn regenerate(&self) -> CycleOutcome;
}

struct ControllerState {
    generation: u64,
}

/// Owns the current [`PoemSnapshot`] and serializes every transition of it.
///
/// Each `load`/`regenerate` cycle takes a new generation number when it publishes its
/// Loading snapshot. A cycle only publishes its final snapshot if its generation is still the
/// latest, so a slow response from an older cycle can never overwrite a newer one.
pub struct PoemSyncController {
    service: Arc<dyn PoemService>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    inner: Mutex<ControllerState>,
    snapshots: watch::Sender<Arc<PoemSnapshot>>,
}

impl PoemSyncController {
    pub fn new(service: Arc<dyn PoemService>) -> Arc<Self> {
        Self::new_with_dependencies(service, Arc::new(SystemClock), RetryPolicy::none())
    }

    pub fn new_with_dependencies(
        service: Arc<dyn PoemService>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Arc<Self> {
        let (snapshots, _) = watch::channel(Arc::new(PoemSnapshot::idle()));
        Arc::new(Self {
            service,
            clock,
            retry,
            inner: Mutex::new(ControllerState { generation: 0 }),
            snapshots,
        })
    }

    /// Runs the initial load in the background.
    pub fn start(self: &Arc<Self>) -> JoinHandle<CycleOutcome> {
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.load().await })
    }

    pub fn snapshot(&self) -> Arc<PoemSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PoemSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Fetches poem, count and day index concurrently and publishes them as one snapshot.
    ///
    /// Calling this while another cycle is outstanding supersedes that cycle.
    pub async fn load(&self) -> CycleOutcome {
        let generation = self.begin_cycle().await;
        info!(generation, "poem load started");

        let mut attempt = 0;
        let snapshot = loop {
            match self.fetch_all(generation).await {
                Ok(snapshot) => break snapshot,
                Err(kind) => {
                    if attempt >= self.retry.attempts || !self.is_current(generation).await {
                        break PoemSnapshot::failed(kind);
                    }
                    attempt += 1;
                    warn!(
                        generation,
                        attempt,
                        max_attempts = self.retry.attempts,
                        ?kind,
                        "poem load failed; retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    if !self.is_current(generation).await {
                        debug!(generation, "poem load superseded before retry");
                        return CycleOutcome::Superseded;
                    }
                }
            }
        };

        self.finish_cycle(generation, snapshot).await
    }

    /// Writes a new poem, then refreshes the count. Ignored unless the current status is
    /// Ready or Error.
    pub async fn regenerate(&self) -> CycleOutcome {
        let Some(generation) = self.begin_regenerate().await else {
            debug!("regenerate ignored while a cycle is outstanding or before the first load");
            return CycleOutcome::Ignored;
        };
        info!(generation, "poem regeneration started");

        let snapshot = match self.write_and_refresh(generation).await {
            Ok(snapshot) => snapshot,
            Err(kind) => PoemSnapshot::failed(kind),
        };

        self.finish_cycle(generation, snapshot).await
    }

    async fn begin_cycle(&self) -> u64 {
        let mut state = self.inner.lock().await;
        state.generation += 1;
        self.snapshots.send_replace(Arc::new(PoemSnapshot::loading()));
        state.generation
    }

    async fn begin_regenerate(&self) -> Option<u64> {
        let mut state = self.inner.lock().await;
        let status = self.snapshots.borrow().status();
        if !matches!(status, SnapshotStatus::Ready | SnapshotStatus::Error) {
            return None;
        }
        state.generation += 1;
        self.snapshots.send_replace(Arc::new(PoemSnapshot::loading()));
        Some(state.generation)
    }

    async fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().await.generation == generation
    }

    async fn finish_cycle(&self, generation: u64, snapshot: PoemSnapshot) -> CycleOutcome {
        let state = self.inner.lock().await;
        if state.generation != generation {
            debug!(
                generation,
                latest = state.generation,
                "dropping result of superseded cycle"
            );
            return CycleOutcome::Superseded;
        }

        let snapshot = Arc::new(snapshot);
        self.snapshots.send_replace(Arc::clone(&snapshot));
        info!(
            generation,
            status = ?snapshot.status(),
            count = snapshot.count(),
            "poem snapshot published"
        );
        CycleOutcome::Published(snapshot)
    }

    async fn fetch_all(&self, generation: u64) -> Result<PoemSnapshot, FailureKind> {
        let (poem, count, day_index) = join3(
            self.service.fetch_current_poem(),
            self.service.fetch_poem_count(),
            self.service.fetch_last_update_day_index(),
        )
        .await;

        match (poem, count, day_index) {
            (Ok(poem), Ok(count), Ok(day_index)) => {
                if day_index_to_date(day_index).is_none() {
                    warn!(generation, day_index, "poem service sent an unrepresentable day index");
                    return Err(FailureKind::Unavailable);
                }
                Ok(PoemSnapshot::ready(poem, count, day_index))
            }
            (poem, count, day_index) => {
                let failures = [poem.err(), count.err(), day_index.err()]
                    .into_iter()
                    .flatten()
                    .inspect(|err| {
                        warn!(generation, op = err.op(), error = %err, "poem fetch failed");
                    })
                    .count();
                if failures < 3 {
                    Err(FailureKind::PartialLoad)
                } else {
                    Err(FailureKind::Unavailable)
                }
            }
        }
    }

    async fn write_and_refresh(&self, generation: u64) -> Result<PoemSnapshot, FailureKind> {
        let text = self.service.regenerate().await.map_err(|err| {
            warn!(generation, op = err.op(), error = %err, "poem regeneration failed");
            err.kind()
        })?;
        let count = self.service.fetch_poem_count().await.map_err(|err| {
            warn!(
                generation,
                op = err.op(),
                error = %err,
                "count refresh after regeneration failed"
            );
            err.kind()
        })?;

        let day_index = day_index_for(self.clock.now());
        Ok(PoemSnapshot::ready(
            CurrentPoem { title: None, text },
            count,
            day_index,
        ))
    }
}

#[async_trait]
impl PoemStateHandle for PoemSyncController {
    fn snapshot(&self) -> Arc<PoemSnapshot> {
        PoemSyncController::snapshot(self)
    }

    fn subscribe(&self) -> watch::Receiver<Arc<PoemSnapshot>> {
        PoemSyncController::subscribe(self)
    }

    async fn load(&self) -> CycleOutcome {
        PoemSyncController::load(self).await
    }

    async fn regenerate(&self) -> CycleOutcome {
        PoemSyncController::regenerate(self).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
