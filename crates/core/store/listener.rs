//! Change notifications emitted by a feature store.

use crate::feature::FeatureRef;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receiver of store change events.
///
/// Callbacks run on the mutating thread after the store lock has been
/// released, so a listener may call back into the store.
pub trait FeatureListener: Send + Sync {
    fn on_features_added(&self, _features: &[FeatureRef]) {}

    fn on_feature_changed(&self, _feature: &FeatureRef) {}

    fn on_features_removed(&self, _features: &[FeatureRef]) {}

    /// Everything may have changed, e.g. after the simplifier was replaced.
    fn on_all_changed(&self) {}
}

/// Handle returned by listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listeners = Arc<Vec<(ListenerId, Arc<dyn FeatureListener>)>>;

/// Copy-on-write listener list. Dispatch iterates a snapshot, so
/// registration during dispatch affects the next event only.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Listeners>,
}

impl ListenerRegistry {
    pub(crate) fn register(&self, listener: Arc<dyn FeatureListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock();
        let mut updated = Vec::with_capacity(listeners.len() + 1);
        updated.extend(listeners.iter().cloned());
        updated.push((id, listener));
        *listeners = Arc::new(updated);
        id
    }

    pub(crate) fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        if !listeners.iter().any(|(candidate, _)| *candidate == id) {
            return false;
        }
        let updated = listeners
            .iter()
            .filter(|(candidate, _)| *candidate != id)
            .cloned()
            .collect();
        *listeners = Arc::new(updated);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    fn snapshot(&self) -> Listeners {
        self.listeners.lock().clone()
    }

    pub(crate) fn notify_added(&self, features: &[FeatureRef]) {
        for (_, listener) in self.snapshot().iter() {
            listener.on_features_added(features);
        }
    }

    pub(crate) fn notify_changed(&self, feature: &FeatureRef) {
        for (_, listener) in self.snapshot().iter() {
            listener.on_feature_changed(feature);
        }
    }

    pub(crate) fn notify_removed(&self, features: &[FeatureRef]) {
        for (_, listener) in self.snapshot().iter() {
            listener.on_features_removed(features);
        }
    }

    pub(crate) fn notify_all_changed(&self) {
        for (_, listener) in self.snapshot().iter() {
            listener.on_all_changed();
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
