//! Check registry.
//!
//! Owns one execution loop per active check. Checks are grouped by check
//! source (the resource they belong to) and keyed by their identity hash.
//! At most one loop exists per (source, identity) pair.
//!
//! Each loop has its own control handle: a bounded channel for resource
//! snapshots, a separate stop signal and the task handle. A reappearing
//! identity always gets a fresh handle with a new generation number.
//!
//! Mutations run on the caller's task and never wait on a loop, except for
//! the snapshot push in [`CheckRegistry::update`], which waits until the
//! loop accepts it.

use crate::metrics::Metrics;
use checks::{Check, Resource};
use sensu_client::MonitoringClient;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

type SourceChecks = HashMap<u64, CheckHandle>;

/// Control handle of one running check loop
#[derive(Debug)]
struct CheckHandle {
    name: String,
    generation: u64,
    updates: mpsc::Sender<Arc<Resource>>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl CheckHandle {
    /// Signals the loop to exit; the task finishes on its own
    fn stop(self) -> JoinHandle<()> {
        let _ = self.stop.send(());
        self.task
    }
}

/// Everything an execution loop needs besides its check
struct LoopContext {
    source: String,
    client: Arc<dyn MonitoringClient>,
    metrics: Arc<Metrics>,
    execute_timeout: Duration,
}

/// Registry of running checks, shared by all resource controllers
pub struct CheckRegistry {
    sources: Mutex<HashMap<String, SourceChecks>>,
    client: Arc<dyn MonitoringClient>,
    shutdown: broadcast::Sender<()>,
    metrics: Arc<Metrics>,
    execute_timeout: Duration,
    next_generation: AtomicU64,
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("active", &self.active_count())
            .field("execute_timeout", &self.execute_timeout)
            .finish()
    }
}

impl CheckRegistry {
    /// Creates an empty registry.
    ///
    /// `shutdown` is the process-wide shutdown signal; every loop exits when
    /// it fires. `execute_timeout` bounds each check execution (together
    /// with the check's own interval).
    pub fn new(
        client: Arc<dyn MonitoringClient>,
        shutdown: broadcast::Sender<()>,
        metrics: Arc<Metrics>,
        execute_timeout: Duration,
    ) -> Self {
        Self {
            sources: Mutex::new(HashMap::new()),
            client,
            shutdown,
            metrics,
            execute_timeout,
            next_generation: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SourceChecks>> {
        // a panic while holding the lock leaves the map consistent
        self.sources.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a loop for every check, replacing any loop registered under
    /// the same identity.
    pub fn add(&self, checks: Vec<Box<dyn Check>>, resource: Arc<Resource>, source: &str) {
        let mut sources = self.lock();
        let entries = sources.entry(source.to_string()).or_default();

        for check in checks {
            // pre-existing identity, e.g. from a hash collision
            if let Some(existing) = entries.remove(&check.hash()) {
                info!("{} {}: stopping check", source, existing.name);
                existing.stop();
            }
            let (hash, handle) = self.spawn(check, Arc::clone(&resource), source);
            entries.insert(hash, handle);
        }

        self.refresh_gauge(&sources);
    }

    /// Reconciles the checks of a source after its resource changed.
    ///
    /// Identities present in both lists keep their loop and receive the new
    /// snapshot. Identities only in `old_checks` are stopped. Identities
    /// only in `new_checks` are started.
    pub async fn update(
        &self,
        old_checks: &[Box<dyn Check>],
        new_checks: Vec<Box<dyn Check>>,
        resource: Arc<Resource>,
        source: &str,
    ) {
        let mut pushes = Vec::new();
        {
            let mut sources = self.lock();
            let entries = sources.entry(source.to_string()).or_default();

            for old in old_checks {
                let hash = old.hash();
                if new_checks.iter().any(|n| n.hash() == hash) {
                    if let Some(existing) = entries.get(&hash) {
                        debug!("{} {}: updating resource", source, existing.name);
                        pushes.push((existing.name.clone(), existing.updates.clone()));
                    }
                } else if let Some(existing) = entries.remove(&hash) {
                    info!("{} {}: stopping check", source, existing.name);
                    existing.stop();
                }
            }

            for check in new_checks {
                if entries.contains_key(&check.hash()) {
                    continue;
                }
                let (hash, handle) = self.spawn(check, Arc::clone(&resource), source);
                entries.insert(hash, handle);
            }

            if entries.is_empty() {
                sources.remove(source);
            }
            self.refresh_gauge(&sources);
        }

        for (name, updates) in pushes {
            if updates.send(Arc::clone(&resource)).await.is_err() {
                debug!("{} {}: check stopped before update", source, name);
            }
        }
    }

    /// Stops every given check of a source
    pub fn delete(&self, checks: &[Box<dyn Check>], source: &str) {
        let mut sources = self.lock();
        let Some(entries) = sources.get_mut(source) else {
            return;
        };

        for check in checks {
            if let Some(existing) = entries.remove(&check.hash()) {
                info!("{} {}: stopping check", source, existing.name);
                existing.stop();
            }
        }
        if entries.is_empty() {
            sources.remove(source);
        }
        self.refresh_gauge(&sources);
    }

    /// Stops every loop and waits up to `grace` for them to finish
    pub async fn stop_all(&self, grace: Duration) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut sources = self.lock();
            let tasks = sources
                .drain()
                .flat_map(|(_, entries)| entries.into_values())
                .map(CheckHandle::stop)
                .collect();
            self.refresh_gauge(&sources);
            tasks
        };

        info!("Stopping {} checks", tasks.len());
        if tokio::time::timeout(grace, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            warn!("Checks did not stop within {:?}", grace);
        }
    }

    /// Number of running loops across all sources
    pub fn active_count(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    /// Identities running under a source, sorted
    pub fn identities(&self, source: &str) -> Vec<u64> {
        let mut hashes: Vec<u64> = self
            .lock()
            .get(source)
            .map(|entries| entries.keys().copied().collect())
            .unwrap_or_default();
        hashes.sort_unstable();
        hashes
    }

    /// Generation of the handle running an identity, if any
    pub fn generation(&self, source: &str, hash: u64) -> Option<u64> {
        self.lock().get(source)?.get(&hash).map(|h| h.generation)
    }

    fn refresh_gauge(&self, sources: &HashMap<String, SourceChecks>) {
        let active: usize = sources.values().map(HashMap::len).sum();
        self.metrics.active_checks.set(i64::try_from(active).unwrap_or(i64::MAX));
    }

    fn spawn(&self, check: Box<dyn Check>, resource: Arc<Resource>, source: &str) -> (u64, CheckHandle) {
        let hash = check.hash();
        let name = check.config().name.clone();
        let (updates_tx, updates_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();

        let ctx = LoopContext {
            source: source.to_string(),
            client: Arc::clone(&self.client),
            metrics: Arc::clone(&self.metrics),
            execute_timeout: self.execute_timeout,
        };
        let shutdown = self.shutdown.subscribe();
        let task = tokio::spawn(run_check(check, resource, updates_rx, stop_rx, shutdown, ctx));

        info!("{} {}: check added", source, name);
        let handle = CheckHandle {
            name,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            updates: updates_tx,
            stop: stop_tx,
            task,
        };
        (hash, handle)
    }
}

/// Execution loop of one check.
///
/// Runs the check immediately, then on every interval tick. Snapshots
/// received in between are applied without triggering an execution.
async fn run_check(
    mut check: Box<dyn Check>,
    initial: Arc<Resource>,
    mut updates: mpsc::Receiver<Arc<Resource>>,
    mut stop: oneshot::Receiver<()>,
    mut shutdown: broadcast::Receiver<()>,
    ctx: LoopContext,
) {
    let interval = check.config().interval_duration();
    let timeout = interval.min(ctx.execute_timeout);
    let name = check.config().name.clone();

    check.update(initial);

    // first tick completes immediately
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = shutdown.recv() => break,
            update = updates.recv() => match update {
                Some(resource) => check.update(resource),
                None => break,
            },
            _ = ticker.tick() => execute(check.as_mut(), timeout, &ctx).await,
        }
    }

    info!("{} {}: check stopped", ctx.source, name);
}

/// Runs a check once and posts the result. Failures are logged only.
async fn execute(check: &mut dyn Check, timeout: Duration, ctx: &LoopContext) {
    let name = check.config().name.clone();
    debug!("{} {}: running check", ctx.source, name);

    let result = match tokio::time::timeout(timeout, check.execute()).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            ctx.metrics.check_executions.with_label_values(&["error"]).inc();
            error!("{} {}: error running check: {}", ctx.source, name, e);
            return;
        }
        Err(_) => {
            ctx.metrics.check_executions.with_label_values(&["timeout"]).inc();
            error!("{} {}: check timed out after {:?}", ctx.source, name, timeout);
            return;
        }
    };
    ctx.metrics.check_executions.with_label_values(&["ok"]).inc();

    match ctx.client.post_check_result(&result).await {
        Ok(()) => ctx.metrics.result_posts.with_label_values(&["ok"]).inc(),
        Err(e) => {
            ctx.metrics.result_posts.with_label_values(&["error"]).inc();
            error!("{} {}: error sending check result: {}", ctx.source, name, e);
        }
    }
}
