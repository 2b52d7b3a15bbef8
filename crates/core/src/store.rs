//! Task record store contract and its live snapshot subscriptions.
//!
//! A store is the source of truth for tasks. Readers never diff: every change
//! to a user's records is pushed as the complete, order-stable set of that
//! user's tasks, and subscribers replace whatever they held before.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use ulid::Ulid;

use crate::error::StoreError;
use crate::model::{NewTask, Task, TaskPatch};

pub type SnapshotListener = Arc<dyn Fn(Vec<Task>) + Send + Sync>;

#[async_trait]
pub trait TaskRecordStore: Send + Sync {
    /// Persist a new record and return the id the store assigned to it.
    async fn create(&self, task: NewTask) -> Result<String, StoreError>;

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Register `listener` for `user_id`'s records. The current snapshot is
    /// delivered once immediately, then again after every change.
    fn subscribe(
        &self,
        user_id: &str,
        listener: SnapshotListener,
    ) -> Result<Subscription, StoreError>;
}

#[derive(Clone)]
struct Registration {
    user_id: String,
    listener: SnapshotListener,
    active: Arc<AtomicBool>,
    delivered: Arc<Mutex<u64>>,
}

impl Registration {
    /// Hand `snapshot` to the listener unless a newer version already went out.
    fn deliver(&self, version: u64, snapshot: Vec<Task>) -> bool {
        let mut delivered = self.delivered.lock();
        if !self.active.load(Ordering::SeqCst) || version <= *delivered {
            return false;
        }
        *delivered = version;
        (self.listener)(snapshot);
        true
    }
}

type Registry = Mutex<HashMap<u64, Registration>>;

/// Handle for a live subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Fan-out of full snapshots to the listeners registered per user.
///
/// Writers call [`SnapshotHub::stamp`] after their change is committed and
/// before reading the snapshot they publish. A snapshot read under a later
/// stamp contains every change committed under an earlier one, so each
/// listener only ever moves forward.
#[derive(Default)]
pub struct SnapshotHub {
    next_id: AtomicU64,
    version: AtomicU64,
    registry: Arc<Registry>,
}

impl SnapshotHub {
    /// Register `listener`, then load and deliver the initial snapshot.
    ///
    /// The listener is registered before `load` runs, so a write that lands in
    /// between is either part of the initial snapshot or published afterwards.
    pub fn register<F>(
        &self,
        user_id: &str,
        listener: SnapshotListener,
        load: F,
    ) -> Result<Subscription, StoreError>
    where
        F: FnOnce() -> Result<Vec<Task>, StoreError>,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let active = Arc::new(AtomicBool::new(true));
        let registration = Registration {
            user_id: user_id.to_string(),
            listener,
            active: active.clone(),
            delivered: Arc::default(),
        };
        self.registry.lock().insert(id, registration.clone());
        let subscription = Subscription {
            id,
            active,
            registry: Arc::downgrade(&self.registry),
        };

        let version = self.stamp();
        let initial = load()?;
        registration.deliver(version, initial);
        Ok(subscription)
    }

    /// Next snapshot version. Take it after committing a change and before
    /// reading the snapshot that reflects it.
    pub fn stamp(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_watched(&self, user_id: &str) -> bool {
        self.registry
            .lock()
            .values()
            .any(|registration| registration.user_id == user_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Deliver `snapshot` to `user_id`'s listeners. Listeners that already
    /// received a newer version skip it.
    pub fn publish(&self, user_id: &str, version: u64, snapshot: Vec<Task>) {
        let targets: Vec<Registration> = self
            .registry
            .lock()
            .values()
            .filter(|registration| registration.user_id == user_id)
            .cloned()
            .collect();
        tracing::debug!(
            user_id,
            version,
            subscribers = targets.len(),
            tasks = snapshot.len(),
            "publishing task snapshot"
        );
        for registration in targets {
            if !registration.deliver(version, snapshot.clone()) {
                tracing::debug!(user_id, version, "skipped superseded snapshot");
            }
        }
    }
}

/// In-process document collection.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    hub: SnapshotHub,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.lock().iter().find(|task| task.id == id).cloned()
    }

    pub fn snapshot(&self, user_id: &str) -> Vec<Task> {
        self.tasks
            .lock()
            .iter()
            .filter(|task| task.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    fn publish_for(&self, user_id: &str) {
        if self.hub.is_watched(user_id) {
            let version = self.hub.stamp();
            self.hub.publish(user_id, version, self.snapshot(user_id));
        }
    }
}

#[async_trait]
impl TaskRecordStore for MemoryTaskStore {
    async fn create(&self, task: NewTask) -> Result<String, StoreError> {
        let id = Ulid::new().to_string();
        let user_id = task.user_id.clone();
        self.tasks.lock().push(task.into_task(id.clone()));
        self.publish_for(&user_id);
        Ok(id)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<(), StoreError> {
        let user_id = {
            let mut tasks = self.tasks.lock();
            let task = tasks
                .iter_mut()
                .find(|task| task.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            patch.apply_to(task);
            task.user_id.clone()
        };
        self.publish_for(&user_id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let user_id = {
            let mut tasks = self.tasks.lock();
            let index = tasks
                .iter()
                .position(|task| task.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            tasks.remove(index).user_id
        };
        self.publish_for(&user_id);
        Ok(())
    }

    fn subscribe(
        &self,
        user_id: &str,
        listener: SnapshotListener,
    ) -> Result<Subscription, StoreError> {
        self.hub
            .register(user_id, listener, || Ok(self.snapshot(user_id)))
    }
}
