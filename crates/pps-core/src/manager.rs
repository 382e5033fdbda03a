//! Entry point for every read and write of user particle data.
//!
//! Reads are served from the [`UserRecordCache`] on the foreground.
//! Writes are queued on the owner's lane: the durable write runs on the
//! blocking pool, then the matching cache edit runs on the foreground, then
//! the caller's [`Ticket`] resolves, and only then does the next operation
//! for that owner start. Different owners drain in parallel.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use pps_events::{Bus, Topic};
use pps_kernel::{Kernel, LoadedRecord};
use pps_model::{FixedEffect, GroupName, Owner, ParticleGroup, UserRecord, ValidationError};
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::authority::{FixedEffectAuthority, NoUnlimited};
use crate::cache::UserRecordCache;
use crate::config::{LazySettings, WriteFailurePolicy};
use crate::dispatch::Dispatcher;
use crate::error::{DataError, DataResult};
use crate::lanes::{Lane, OwnerLanes};

/// Awaitable completion of a queued operation. Resolves on the foreground
/// after the cache edit. Dropping it leaves the operation running. An
/// operation that is abandoned (stopped foreground, panic) resolves to
/// [`DataError::ForegroundStopped`].
#[derive(Debug)]
pub struct Ticket<T> {
    rx: oneshot::Receiver<DataResult<T>>,
}

impl<T> Ticket<T> {
    fn channel() -> (Completion<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    fn ready(result: DataResult<T>) -> Self {
        let (tx, ticket) = Self::channel();
        let _ = tx.send(result);
        ticket
    }
}

impl<T> Future for Ticket<T> {
    type Output = DataResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(DataError::ForegroundStopped)))
    }
}

type Completion<T> = oneshot::Sender<DataResult<T>>;
type LoadContinuation = Box<dyn FnOnce(DataResult<&UserRecord>) + Send + 'static>;

enum Op {
    Load(LoadContinuation),
    SaveGroup {
        group: ParticleGroup,
        done: Completion<()>,
    },
    RemoveGroup {
        name: GroupName,
        done: Completion<bool>,
    },
    AddFixedEffect {
        effect: FixedEffect,
        done: Completion<()>,
    },
    RemoveFixedEffect {
        id: u32,
        done: Completion<bool>,
    },
    Evict {
        done: Completion<bool>,
    },
    Flush {
        done: Completion<()>,
    },
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Load(_) => "load",
            Op::SaveGroup { .. } => "save_group",
            Op::RemoveGroup { .. } => "remove_group",
            Op::AddFixedEffect { .. } => "add_fixed_effect",
            Op::RemoveFixedEffect { .. } => "remove_fixed_effect",
            Op::Evict { .. } => "evict",
            Op::Flush { .. } => "flush",
        }
    }

    /// Mutations edit the cached record, so the owner must be loaded first.
    fn needs_record(&self) -> bool {
        matches!(
            self,
            Op::SaveGroup { .. }
                | Op::RemoveGroup { .. }
                | Op::AddFixedEffect { .. }
                | Op::RemoveFixedEffect { .. }
        )
    }

    /// Resolves the ticket with `err` without running the operation.
    /// Continuations only run on the foreground, so a load is dropped.
    fn fail(self, err: DataError) {
        match self {
            Op::Load(_) => {}
            Op::SaveGroup { done, .. } | Op::AddFixedEffect { done, .. } | Op::Flush { done } => {
                let _ = done.send(Err(err));
            }
            Op::RemoveGroup { done, .. } | Op::RemoveFixedEffect { done, .. } | Op::Evict { done } => {
                let _ = done.send(Err(err));
            }
        }
    }
}

struct Inner {
    kernel: Kernel,
    dispatcher: Dispatcher,
    lanes: Arc<OwnerLanes<Op>>,
    settings: LazySettings,
    authority: Arc<dyn FixedEffectAuthority>,
    bus: Bus,
    store_loads: AtomicUsize,
}

pub struct DataManagerBuilder {
    kernel: Kernel,
    dispatcher: Dispatcher,
    settings: LazySettings,
    authority: Arc<dyn FixedEffectAuthority>,
    bus: Bus,
}

impl DataManagerBuilder {
    pub fn settings(mut self, settings: LazySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn authority(mut self, authority: impl FixedEffectAuthority + 'static) -> Self {
        self.authority = Arc::new(authority);
        self
    }

    pub fn shared_authority(mut self, authority: Arc<dyn FixedEffectAuthority>) -> Self {
        self.authority = authority;
        self
    }

    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }

    pub fn build(self) -> DataManager {
        DataManager {
            inner: Arc::new(Inner {
                kernel: self.kernel,
                dispatcher: self.dispatcher,
                lanes: OwnerLanes::new(),
                settings: self.settings,
                authority: self.authority,
                bus: self.bus,
                store_loads: AtomicUsize::new(0),
            }),
        }
    }
}

#[derive(Clone)]
pub struct DataManager {
    inner: Arc<Inner>,
}

impl DataManager {
    pub fn builder(kernel: Kernel, dispatcher: Dispatcher) -> DataManagerBuilder {
        DataManagerBuilder {
            kernel,
            dispatcher,
            settings: LazySettings::default(),
            authority: Arc::new(NoUnlimited),
            bus: Bus::default(),
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    pub fn settings(&self) -> &LazySettings {
        &self.inner.settings
    }

    /// Cached record for `owner`, if loaded. Never touches the store.
    pub fn get_or_load<'c>(&self, cache: &'c UserRecordCache, owner: Owner) -> Option<&'c UserRecord> {
        cache.get(owner)
    }

    /// Runs `continuation` on the foreground with the owner's record,
    /// loading it first when it is not cached. Concurrent requests for the
    /// same owner share a single store load. On a load failure the
    /// continuation is dropped and the failure is reported.
    pub fn get_or_load_async<F>(&self, owner: Owner, continuation: F)
    where
        F: FnOnce(&UserRecord) + Send + 'static,
    {
        self.enqueue(
            owner,
            Op::Load(Box::new(move |loaded| match loaded {
                Ok(record) => continuation(record),
                Err(err) => {
                    debug!(target: "pps::manager", owner = %owner, error = %err, "continuation skipped")
                }
            })),
        );
    }

    /// Snapshot of the owner's record, loading it if needed.
    pub async fn load(&self, owner: Owner) -> DataResult<UserRecord> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(
            owner,
            Op::Load(Box::new(move |loaded| {
                let _ = tx.send(loaded.map(UserRecord::clone));
            })),
        );
        rx.await.map_err(|_| DataError::ForegroundStopped)?
    }

    /// Inserts or replaces the group with the same case-insensitive name.
    pub fn save_group(&self, owner: Owner, group: ParticleGroup) -> Ticket<()> {
        if group.owner() != owner {
            return Ticket::ready(Err(ValidationError::OwnerMismatch {
                expected: owner.to_string(),
                found: group.owner().to_string(),
            }
            .into()));
        }
        let (done, ticket) = Ticket::channel();
        self.enqueue(owner, Op::SaveGroup { group, done });
        ticket
    }

    /// Resolves to whether the group existed in the store. The active group
    /// can never be removed.
    pub fn remove_group(&self, owner: Owner, name: GroupName) -> Result<Ticket<bool>, ValidationError> {
        if name.is_active() {
            return Err(ValidationError::ActiveGroupRemoval);
        }
        let (done, ticket) = Ticket::channel();
        self.enqueue(owner, Op::RemoveGroup { name, done });
        Ok(ticket)
    }

    pub fn add_fixed_effect(&self, effect: FixedEffect) -> Ticket<()> {
        let (done, ticket) = Ticket::channel();
        self.enqueue(effect.owner(), Op::AddFixedEffect { effect, done });
        ticket
    }

    /// Resolves to false when no such fixed effect existed.
    pub fn remove_fixed_effect(&self, owner: Owner, id: u32) -> Ticket<bool> {
        let (done, ticket) = Ticket::channel();
        self.enqueue(owner, Op::RemoveFixedEffect { id, done });
        ticket
    }

    /// Drops the owner's record from the cache once its earlier operations
    /// have finished. Resolves to whether a record was cached.
    pub fn evict(&self, owner: Owner) -> Ticket<bool> {
        let (done, ticket) = Ticket::channel();
        self.enqueue(owner, Op::Evict { done });
        ticket
    }

    /// Resolves once every operation issued for `owner` before this call
    /// has completed.
    pub fn flush(&self, owner: Owner) -> Ticket<()> {
        let (done, ticket) = Ticket::channel();
        self.enqueue(owner, Op::Flush { done });
        ticket
    }

    pub fn next_fixed_effect_id(&self, record: &UserRecord) -> u32 {
        record.next_fixed_effect_id()
    }

    pub fn has_reached_fixed_effect_limit(&self, record: &UserRecord) -> bool {
        if self
            .inner
            .authority
            .has_unlimited_fixed_effects(record.owner())
        {
            return false;
        }
        record.fixed_effect_count() >= self.inner.settings.get().limits.max_fixed_effects
    }

    pub fn max_fixed_effect_creation_distance(&self) -> u32 {
        self.inner
            .settings
            .get()
            .limits
            .max_fixed_effect_creation_distance
    }

    pub fn is_world_disabled(&self, world: &str) -> bool {
        self.inner
            .settings
            .get()
            .limits
            .disabled_worlds
            .iter()
            .any(|w| w == world)
    }

    pub fn disabled_worlds(&self) -> Vec<String> {
        self.inner.settings.get().limits.disabled_worlds.clone()
    }

    /// Read-only access to the whole cache from the foreground.
    pub async fn with_cache<T, F>(&self, f: F) -> DataResult<T>
    where
        F: FnOnce(&UserRecordCache) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.inner.dispatcher.call_foreground(move |cache| f(cache)).await
    }

    pub async fn cached_owners(&self) -> DataResult<Vec<Owner>> {
        self.with_cache(|cache| cache.owners().collect()).await
    }

    /// Queues `f` on the foreground without waiting for it.
    pub fn run_on_foreground<F>(&self, f: F) -> DataResult<()>
    where
        F: FnOnce(&UserRecordCache) + Send + 'static,
    {
        self.inner.dispatcher.run_foreground(move |cache| f(cache))
    }

    /// Number of records read from the store so far.
    pub fn store_load_count(&self) -> usize {
        self.inner.store_loads.load(Ordering::Relaxed)
    }

    /// Operations queued behind the one currently running for `owner`.
    pub fn pending_operations(&self, owner: Owner) -> usize {
        self.inner.lanes.pending(owner)
    }

    /// Owners with an operation running or queued.
    pub fn active_lanes(&self) -> usize {
        self.inner.lanes.active()
    }

    fn enqueue(&self, owner: Owner, op: Op) {
        if let Some(lane) = self.inner.lanes.push(owner, op) {
            let inner = self.inner.clone();
            self.inner.dispatcher.runtime().spawn(inner.drain(lane));
        }
    }
}

impl Inner {
    /// Runs the owner's operations one at a time. Each runs as its own task
    /// so a panic abandons that operation only and the lane keeps draining.
    async fn drain(self: Arc<Self>, lane: Lane<Op>) {
        let owner = lane.owner();
        while let Some(op) = lane.next() {
            let name = op.name();
            debug!(target: "pps::manager", owner = %owner, op = name, "running");
            let inner = self.clone();
            let run = self
                .dispatcher
                .runtime()
                .spawn(async move { inner.execute(owner, op).await });
            if let Err(err) = run.await {
                error!(target: "pps::manager", owner = %owner, op = name, error = %err, "operation abandoned");
            }
        }
    }

    async fn execute(&self, owner: Owner, op: Op) {
        if op.needs_record() {
            if let Err(err) = self.ensure_loaded(owner).await {
                op.fail(err);
                return;
            }
        }
        match op {
            Op::Load(continuation) => self.load(owner, continuation).await,
            Op::SaveGroup { group, done } => {
                let kernel = self.kernel.clone();
                let stored = group.clone();
                let write = self
                    .dispatcher
                    .background("save_group", move || {
                        kernel.with_store(|store| store.replace_group(owner, &stored))
                    })
                    .await;
                self.commit(owner, "save_group", write, done, move |cache| {
                    cache.upsert_group(group);
                })
                .await;
            }
            Op::RemoveGroup { name, done } => {
                let kernel = self.kernel.clone();
                let stored = name.clone();
                let write = self
                    .dispatcher
                    .background("remove_group", move || {
                        kernel.with_store(|store| store.delete_group(owner, &stored))
                    })
                    .await;
                self.commit(owner, "remove_group", write, done, move |cache| {
                    cache.remove_group(owner, &name);
                })
                .await;
            }
            Op::AddFixedEffect { effect, done } => {
                let kernel = self.kernel.clone();
                let stored = effect.clone();
                let write = self
                    .dispatcher
                    .background("add_fixed_effect", move || {
                        kernel.with_store(|store| store.insert_fixed_effect(&stored))
                    })
                    .await;
                self.commit(owner, "add_fixed_effect", write, done, move |cache| {
                    cache.add_fixed_effect(effect);
                })
                .await;
            }
            Op::RemoveFixedEffect { id, done } => {
                let kernel = self.kernel.clone();
                let write = self
                    .dispatcher
                    .background("remove_fixed_effect", move || {
                        kernel.with_store(|store| store.delete_fixed_effect(owner, id))
                    })
                    .await;
                self.commit(owner, "remove_fixed_effect", write, done, move |cache| {
                    cache.remove_fixed_effect(owner, id);
                })
                .await;
            }
            Op::Evict { done } => {
                let evicted = self
                    .dispatcher
                    .call_foreground(move |cache| {
                        let removed = cache.remove(owner).is_some();
                        let _ = done.send(Ok(removed));
                        removed
                    })
                    .await;
                if let Ok(true) = evicted {
                    self.bus
                        .publish(Topic::RecordEvicted, json!({ "owner": owner }));
                }
            }
            Op::Flush { done } => {
                let _ = done.send(Ok(()));
            }
        }
    }

    /// Loads the owner into the cache (creating its active group) unless an
    /// earlier operation on this lane already did.
    async fn ensure_loaded(&self, owner: Owner) -> DataResult<()> {
        let (tx, rx) = oneshot::channel();
        self.load(
            owner,
            Box::new(move |loaded| {
                let _ = tx.send(loaded.map(|_| ()));
            }),
        )
        .await;
        rx.await.map_err(|_| DataError::ForegroundStopped)?
    }

    async fn load(&self, owner: Owner, continuation: LoadContinuation) {
        // A record cached by an earlier load on this lane is served directly.
        let cached = self
            .dispatcher
            .call_foreground(move |cache| match cache.get(owner) {
                Some(record) => {
                    continuation(Ok(record));
                    None
                }
                None => Some(continuation),
            })
            .await;
        let continuation = match cached {
            Ok(Some(continuation)) => continuation,
            Ok(None) => return,
            Err(err) => {
                warn!(target: "pps::manager", owner = %owner, error = %err, "load abandoned");
                return;
            }
        };

        self.store_loads.fetch_add(1, Ordering::Relaxed);
        let kernel = self.kernel.clone();
        let loaded = self
            .dispatcher
            .background("load", move || kernel.with_store(|store| store.load_record(owner)))
            .await;
        match loaded {
            Ok(LoadedRecord {
                record,
                created_active_group,
            }) => {
                let summary = json!({
                    "owner": owner,
                    "groups": record.groups().count(),
                    "fixed_effects": record.fixed_effect_count(),
                    "created_active_group": created_active_group,
                });
                let installed = self
                    .dispatcher
                    .call_foreground(move |cache| {
                        let record = cache.install(record);
                        continuation(Ok(record));
                    })
                    .await;
                match installed {
                    Ok(()) => self.bus.publish(Topic::RecordLoaded, summary),
                    Err(err) => {
                        warn!(target: "pps::manager", owner = %owner, error = %err, "loaded record dropped")
                    }
                }
            }
            Err(err) => {
                self.report(owner, "load", &err);
                let _ = self
                    .dispatcher
                    .call_foreground(move |_| continuation(Err(err)))
                    .await;
            }
        }
    }

    /// Foreground phase of a mutation: apply `edit` according to the write
    /// outcome and the failure policy, then resolve the ticket.
    async fn commit<T, E>(
        &self,
        owner: Owner,
        op: &'static str,
        write: DataResult<T>,
        done: Completion<T>,
        edit: E,
    ) where
        T: Send + 'static,
        E: FnOnce(&mut UserRecordCache) + Send + 'static,
    {
        let apply_on_failure = match &write {
            Ok(_) => false,
            Err(err) => {
                self.report(owner, op, err);
                self.settings.get().store.write_failure_policy == WriteFailurePolicy::ApplyAnyway
            }
        };
        let applied = self
            .dispatcher
            .call_foreground(move |cache| {
                if write.is_ok() || apply_on_failure {
                    edit(cache);
                }
                let _ = done.send(write);
            })
            .await;
        if let Err(err) = applied {
            warn!(target: "pps::manager", owner = %owner, op, error = %err, "cache edit not applied");
        }
    }

    fn report(&self, owner: Owner, op: &'static str, err: &DataError) {
        warn!(target: "pps::manager", owner = %owner, op, error = %err, "store operation failed");
        self.bus.publish(
            Topic::StoreFailed,
            json!({ "owner": owner, "op": op, "error": err.to_string() }),
        );
    }
}
