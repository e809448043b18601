//! Dependency-tracking scheduler
//!
//! Actions are plain closures that receive a [`LogHandle`]. After every run
//! the scheduler subscribes the action to the cells it read; a later write
//! that affects one of those reads marks the action dirty. A pass delivers
//! queued stream events and then runs every dirty action once, in
//! registration order.
//!
//! ## Draining
//!
//! Only one drain loop runs at a time. [`Scheduler::idle`] either drives
//! passes itself, yielding to the runtime between them, or waits for the
//! current driver to finish. A drain requested while one is already in
//! progress (from inside an action, say) returns immediately.
//!
//! Failures are isolated: an action error is logged and stored for that
//! action, other actions keep running.

use crate::cell::{Cell, CellId, CellReference, Subscription};
use crate::config::RuntimeConfig;
use crate::error::{ActionError, SchedulerError};
use crate::log::{path_affected, LogHandle};
use crate::path::Path;
use crate::value::Value;
use crate::view::write_through;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, trace, warn};

/// Scheduled computation
pub type ActionFn = Arc<dyn Fn(&LogHandle) -> Result<(), ActionError> + Send + Sync>;

/// Receiver of events addressed to one location
pub type EventHandler = Arc<dyn Fn(&Value) -> Result<(), ActionError> + Send + Sync>;

/// Handle of a registered action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(u64);

/// Handle of a registered event handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// Counters accumulated over the scheduler's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub passes: u64,
    pub action_runs: u64,
    pub action_failures: u64,
    pub events_delivered: u64,
    pub events_dropped: u64,
}

struct ActionEntry {
    name: String,
    run: ActionFn,
    subscriptions: Vec<Subscription>,
    last_error: Option<ActionError>,
}

#[derive(Default)]
struct SchedulerState {
    actions: IndexMap<ActionId, ActionEntry>,
    dirty: HashSet<ActionId>,
    events: VecDeque<(CellReference, Value)>,
    handlers: IndexMap<HandlerId, (CellReference, EventHandler)>,
    next_id: u64,
    draining: bool,
    stats: SchedulerStats,
}

impl SchedulerState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn is_idle(&self) -> bool {
        self.dirty.is_empty() && self.events.is_empty()
    }
}

struct SchedulerInner {
    config: RuntimeConfig,
    state: Mutex<SchedulerState>,
    released: Notify,
}

/// Shared handle to a scheduler
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

/// Non-owning scheduler handle, held by cells and subscriptions
#[derive(Clone)]
pub struct WeakScheduler {
    inner: Weak<SchedulerInner>,
}

impl WeakScheduler {
    #[must_use]
    pub fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

impl fmt::Debug for WeakScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakScheduler")
    }
}

/// Releases the drain flag when the driver finishes or is dropped
struct DrainGuard<'a> {
    inner: &'a SchedulerInner,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.inner.state.lock().draining = false;
        self.inner.released.notify_waiters();
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                state: Mutex::new(SchedulerState::default()),
                released: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Create a cell attached to this scheduler
    ///
    /// Attached cells can carry stream events and inherit the scheduler's
    /// indirection limit.
    pub fn cell(&self, value: impl Into<Value>) -> Cell {
        Cell::attached(value.into(), self)
    }

    /// Register an action; it runs on the next pass
    pub fn add_action(
        &self,
        name: impl Into<String>,
        action: impl Fn(&LogHandle) -> Result<(), ActionError> + Send + Sync + 'static,
    ) -> ActionId {
        let name = name.into();
        let mut state = self.inner.state.lock();
        let id = ActionId(state.next_id());
        debug!(%id, %name, "action added");
        state.actions.insert(
            id,
            ActionEntry {
                name,
                run: Arc::new(action),
                subscriptions: Vec::new(),
                last_error: None,
            },
        );
        state.dirty.insert(id);
        id
    }

    /// Unregister an action and drop its dependency subscriptions
    ///
    /// Returns `false` if the action was not registered.
    pub fn remove_action(&self, id: ActionId) -> bool {
        let removed = {
            let mut state = self.inner.state.lock();
            state.dirty.remove(&id);
            state.actions.shift_remove(&id)
        };
        if let Some(entry) = &removed {
            debug!(%id, name = %entry.name, "action removed");
        }
        removed.is_some()
    }

    #[must_use]
    pub fn action_count(&self) -> usize {
        self.inner.state.lock().actions.len()
    }

    /// Error from the action's most recent run, if it failed
    #[must_use]
    pub fn action_error(&self, id: ActionId) -> Option<ActionError> {
        self.inner
            .state
            .lock()
            .actions
            .get(&id)
            .and_then(|entry| entry.last_error.clone())
    }

    /// Every action whose most recent run failed, with its name
    #[must_use]
    pub fn errors(&self) -> Vec<(ActionId, String, ActionError)> {
        self.inner
            .state
            .lock()
            .actions
            .iter()
            .filter_map(|(id, entry)| {
                entry
                    .last_error
                    .clone()
                    .map(|error| (*id, entry.name.clone(), error))
            })
            .collect()
    }

    /// Queue an event for delivery at the start of the next pass
    pub fn queue_event(&self, target: CellReference, event: Value) {
        trace!(target = %target, "event queued");
        self.inner.state.lock().events.push_back((target, event));
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.inner.state.lock().events.len()
    }

    /// Route events addressed to `target` to `handler`
    pub fn add_event_handler(
        &self,
        target: CellReference,
        handler: impl Fn(&Value) -> Result<(), ActionError> + Send + Sync + 'static,
    ) -> HandlerId {
        let mut state = self.inner.state.lock();
        let id = HandlerId(state.next_id());
        state.handlers.insert(id, (target, Arc::new(handler)));
        id
    }

    pub fn remove_event_handler(&self, id: HandlerId) -> bool {
        self.inner.state.lock().handlers.shift_remove(&id).is_some()
    }

    /// No dirty actions and no queued events
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.state.lock().is_idle()
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.state.lock().stats
    }

    /// Run passes until nothing is dirty
    ///
    /// Returns the number of passes run, or zero when another drain is in
    /// progress.
    ///
    /// # Errors
    /// Returns [`SchedulerError::Diverged`] when the configured pass limit
    /// is reached first.
    pub fn run_until_settled(&self) -> Result<usize, SchedulerError> {
        let Some(_guard) = self.try_drain() else {
            return Ok(0);
        };
        let mut passes = 0;
        while !self.is_idle() {
            if passes >= self.inner.config.max_passes {
                error!(passes, "propagation did not settle");
                return Err(SchedulerError::Diverged { passes });
            }
            self.pass();
            passes += 1;
        }
        Ok(passes)
    }

    /// Wait until the graph is quiescent
    ///
    /// # Errors
    /// Returns [`SchedulerError::Diverged`] when the pass limit is reached.
    pub async fn idle(&self) -> Result<(), SchedulerError> {
        self.idle_with(&CancellationToken::new()).await
    }

    /// Wait until the graph is quiescent or `cancel` fires
    ///
    /// # Errors
    /// - [`SchedulerError::Cancelled`] if `cancel` fires first
    /// - [`SchedulerError::Diverged`] if the pass limit is reached
    pub async fn idle_with(&self, cancel: &CancellationToken) -> Result<(), SchedulerError> {
        loop {
            if let Some(_guard) = self.try_drain() {
                return self.drive(cancel).await;
            }

            let released = self.inner.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            if !self.inner.state.lock().draining {
                continue;
            }
            tokio::select! {
                () = &mut released => {}
                () = cancel.cancelled() => return Err(SchedulerError::Cancelled),
            }
        }
    }

    async fn drive(&self, cancel: &CancellationToken) -> Result<(), SchedulerError> {
        let mut passes = 0;
        loop {
            if self.is_idle() {
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(SchedulerError::Cancelled);
            }
            if passes >= self.inner.config.max_passes {
                error!(passes, "propagation did not settle");
                return Err(SchedulerError::Diverged { passes });
            }
            self.pass();
            passes += 1;
            tokio::task::yield_now().await;
        }
    }

    fn try_drain(&self) -> Option<DrainGuard<'_>> {
        let mut state = self.inner.state.lock();
        if state.draining {
            return None;
        }
        state.draining = true;
        Some(DrainGuard { inner: &self.inner })
    }

    /// One pass: deliver queued events, then run dirty actions
    fn pass(&self) {
        let (pass, events): (u64, Vec<_>) = {
            let mut state = self.inner.state.lock();
            state.stats.passes += 1;
            (state.stats.passes, state.events.drain(..).collect())
        };
        let _span = debug_span!("pass", pass).entered();
        let events_len = events.len();
        for (target, event) in events {
            self.deliver(&target, event);
        }

        let batch: Vec<(ActionId, ActionFn)> = {
            let mut state = self.inner.state.lock();
            let dirty = std::mem::take(&mut state.dirty);
            state
                .actions
                .iter()
                .filter(|(id, _)| dirty.contains(*id))
                .map(|(id, entry)| (*id, Arc::clone(&entry.run)))
                .collect()
        };
        debug!(events = events_len, actions = batch.len(), "running pass");
        for (id, run) in batch {
            if self.inner.state.lock().actions.contains_key(&id) {
                self.run_action(id, &run);
            }
        }
    }

    fn deliver(&self, target: &CellReference, event: Value) {
        let handlers: Vec<EventHandler> = self
            .inner
            .state
            .lock()
            .handlers
            .values()
            .filter(|(at, _)| at == target)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        let dropped = handlers.is_empty() && target.get().is_stream();
        {
            let mut state = self.inner.state.lock();
            if dropped {
                state.stats.events_dropped += 1;
            } else {
                state.stats.events_delivered += 1;
            }
        }
        if dropped {
            warn!(target = %target, "event for stream without handler dropped");
            return;
        }

        if handlers.is_empty() {
            if let Err(error) = write_through(&target.cell, &target.path, event, None) {
                warn!(target = %target, %error, "event could not be written");
            }
            return;
        }
        for handler in handlers {
            if let Err(error) = handler(&event) {
                warn!(target = %target, %error, "event handler failed");
            }
        }
    }

    fn run_action(&self, id: ActionId, run: &ActionFn) {
        trace!(%id, "running action");
        let log = LogHandle::new();
        let result = run(&log);
        let record = log.take();

        let subscriptions = self.subscribe(id, &record.reads);
        let self_triggered = record.writes.iter().any(|w| record.is_affected_by(w));

        let replaced = {
            let mut state = self.inner.state.lock();
            state.stats.action_runs += 1;
            if result.is_err() {
                state.stats.action_failures += 1;
            }
            let Some(entry) = state.actions.get_mut(&id) else {
                return;
            };
            match result {
                Ok(()) => entry.last_error = None,
                Err(error) => {
                    warn!(%id, name = %entry.name, %error, "action failed");
                    entry.last_error = Some(error);
                }
            }
            let replaced = std::mem::replace(&mut entry.subscriptions, subscriptions);
            if self_triggered {
                state.dirty.insert(id);
            }
            replaced
        };
        drop(replaced);
    }

    /// One subscription per read cell, filtering on the paths read there
    fn subscribe(&self, id: ActionId, reads: &[CellReference]) -> Vec<Subscription> {
        let mut by_cell: IndexMap<CellId, (Cell, Vec<Path>)> = IndexMap::new();
        for read in reads {
            let (_, paths) = by_cell
                .entry(read.cell.id())
                .or_insert_with(|| (read.cell.clone(), Vec::new()));
            if !paths.contains(&read.path) {
                paths.push(read.path.clone());
            }
        }

        by_cell
            .into_values()
            .map(|(cell, paths)| {
                let scheduler = self.downgrade();
                cell.updates(move |_, changed| {
                    if paths.iter().any(|read| path_affected(changed, read)) {
                        if let Some(scheduler) = scheduler.upgrade() {
                            scheduler.mark_dirty(id);
                        }
                    }
                })
            })
            .collect()
    }

    fn mark_dirty(&self, id: ActionId) {
        let mut state = self.inner.state.lock();
        if state.actions.contains_key(&id) {
            state.dirty.insert(id);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("actions", &state.actions.len())
            .field("dirty", &state.dirty.len())
            .field("events", &state.events.len())
            .finish()
    }
}
