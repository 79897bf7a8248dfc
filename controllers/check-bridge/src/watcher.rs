//! Kubernetes resource watchers.
//!
//! The watch stream only carries the latest version of an object, so the
//! watcher keeps the last seen version of every object to turn an `Apply`
//! into an add or an update with the previous state. A relist removes
//! objects that disappeared while the watch was down.

use crate::adapter::ResourceAdapter;
use crate::controller::ResourceCheckController;
use crate::error::ControllerError;
use crate::probe::Readiness;
use futures::TryStreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{watcher, WatchStreamExt};
use std::collections::{HashMap, HashSet};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Controller-level view of a watch event
#[derive(Debug, Clone, PartialEq)]
pub enum Change<K> {
    Added(K),
    Updated { old: K, new: K },
    Deleted(K),
    /// Initial listing complete
    Ready,
}

/// Last seen state of every watched object
#[derive(Debug)]
pub struct WatchState<K> {
    known: HashMap<String, K>,
    relisted: Option<HashSet<String>>,
}

impl<K> Default for WatchState<K> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            relisted: None,
        }
    }
}

impl<K: kube::Resource + Clone> WatchState<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(obj: &K) -> String {
        format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
    }

    /// Number of objects currently known
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Folds one watch event into the cache
    pub fn apply(&mut self, event: watcher::Event<K>) -> Vec<Change<K>> {
        match event {
            watcher::Event::Apply(obj) => vec![self.upsert(obj)],
            watcher::Event::InitApply(obj) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(Self::key(&obj));
                }
                vec![self.upsert(obj)]
            }
            watcher::Event::Delete(obj) => {
                self.known.remove(&Self::key(&obj));
                vec![Change::Deleted(obj)]
            }
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitDone => {
                let relisted = self.relisted.take().unwrap_or_default();
                let vanished: Vec<String> = self
                    .known
                    .keys()
                    .filter(|key| !relisted.contains(*key))
                    .cloned()
                    .collect();

                let mut changes: Vec<Change<K>> = vanished
                    .iter()
                    .filter_map(|key| self.known.remove(key))
                    .map(Change::Deleted)
                    .collect();
                changes.push(Change::Ready);
                changes
            }
        }
    }

    fn upsert(&mut self, obj: K) -> Change<K> {
        match self.known.insert(Self::key(&obj), obj.clone()) {
            Some(old) => Change::Updated { old, new: obj },
            None => Change::Added(obj),
        }
    }
}

/// Watches one kind and feeds its events to the controller until shutdown.
///
/// Stream errors are retried with backoff; they never end the watch.
pub async fn watch_resources<A: ResourceAdapter>(
    controller: &ResourceCheckController<A>,
    api: Api<A::Object>,
    readiness: Readiness,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ControllerError> {
    let kind = controller.adapter().kind();
    info!("Starting {} watcher", kind);
    readiness.register(kind);

    let mut stream = Box::pin(watcher(api, watcher::Config::default()).default_backoff());
    let mut state = WatchState::new();

    loop {
        let next = tokio::select! {
            _ = shutdown.recv() => break,
            next = stream.try_next() => next,
        };

        let event = match next {
            Ok(Some(event)) => event,
            Ok(None) => {
                return Err(ControllerError::Watch(format!("{} watch stream ended", kind)));
            }
            Err(e) => {
                warn!("{} watcher stream error: {}", kind, e);
                continue;
            }
        };

        for change in state.apply(event) {
            if matches!(change, Change::Ready) {
                debug!("{} watcher tracks {} objects", kind, state.len());
            }
            handle_change(controller, change, &readiness).await;
        }
    }

    info!("{} watcher stopped", kind);
    Ok(())
}

async fn handle_change<A: ResourceAdapter>(
    controller: &ResourceCheckController<A>,
    change: Change<A::Object>,
    readiness: &Readiness,
) {
    let kind = controller.adapter().kind();
    let events = &controller.metrics().resource_events;

    match change {
        Change::Added(obj) => {
            debug!("{} added: {}", kind, obj.name_any());
            events.with_label_values(&[kind.as_str(), "add"]).inc();
            controller.add_resource(&obj);
        }
        Change::Updated { old, new } => {
            debug!("{} updated: {}", kind, new.name_any());
            events.with_label_values(&[kind.as_str(), "update"]).inc();
            controller.update_resource(&old, &new).await;
        }
        Change::Deleted(obj) => {
            debug!("{} deleted: {}", kind, obj.name_any());
            events.with_label_values(&[kind.as_str(), "delete"]).inc();
            controller.delete_resource(&obj).await;
        }
        Change::Ready => {
            if !readiness.is_kind_ready(kind) {
                info!("{} watcher initialization complete", kind);
            }
            readiness.mark_ready(kind);
        }
    }
}
