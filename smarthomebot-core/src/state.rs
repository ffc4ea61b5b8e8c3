// ABOUTME: Shared in-memory registry with write-through persistence behind one async mutex.
// ABOUTME: All role and timer mutations go through mutate(), which saves before publishing the change.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::registry::{Outcome, RoleOp, Roles};
use crate::store::{RegistryState, StateStore};
use crate::timers::{TimerKind, TimerRecord};
use crate::traits::{ChatId, UserId};

/// Authoritative application state. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<RegistryState>>,
    store: Arc<StateStore>,
}

impl SharedState {
    pub fn new(store: StateStore, state: RegistryState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
            store: Arc::new(store),
        }
    }

    /// Load the state file, repair broken invariants and persist any repair
    pub fn open(store: StateStore) -> Result<Self> {
        let mut state = store
            .load()
            .with_context(|| format!("Failed to load state from {}", store.path().display()))?;

        let repairs = state.users.normalize();
        if !repairs.is_empty() {
            for repair in &repairs {
                tracing::warn!(repair = %repair, "Repaired registry invariant");
            }
            store.save(&state).context("Failed to persist repaired state")?;
        }

        tracing::info!(
            path = %store.path().display(),
            owner = state.users.owner,
            allowed = state.users.allowed.len(),
            admins = state.users.admins.len(),
            pending_timers = state.timers.len(),
            "State loaded"
        );
        Ok(Self::new(store, state))
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Clone of the full current state
    pub async fn snapshot(&self) -> RegistryState {
        self.inner.lock().await.clone()
    }

    /// Read from the current state without cloning it
    pub async fn read<R>(&self, f: impl FnOnce(&RegistryState) -> R) -> R {
        let guard = self.inner.lock().await;
        f(&guard)
    }

    pub async fn roles(&self) -> Roles {
        self.read(|s| s.users.clone()).await
    }

    /// Apply `f` to a working copy; on `Ok` persist it and make it current.
    ///
    /// The outer `Result` carries store failures, the inner one the closure's
    /// own verdict. On either failure the current state is left untouched.
    pub async fn mutate<T, E>(
        &self,
        f: impl FnOnce(&mut RegistryState) -> Result<T, E>,
    ) -> Result<Result<T, E>> {
        let mut guard = self.inner.lock().await;
        let mut next = guard.clone();
        match f(&mut next) {
            Ok(value) => {
                if next != *guard {
                    self.store
                        .save(&next)
                        .context("Failed to persist registry state")?;
                    *guard = next;
                }
                Ok(Ok(value))
            }
            Err(e) => Ok(Err(e)),
        }
    }

    /// Infallible variant of [`mutate`](Self::mutate)
    pub async fn update<T>(&self, f: impl FnOnce(&mut RegistryState) -> T) -> Result<T> {
        let result = self
            .mutate(|state| Ok::<T, std::convert::Infallible>(f(state)))
            .await?;
        Ok(result.unwrap_or_else(|never| match never {}))
    }

    /// Apply a staged role operation
    pub async fn apply_role(&self, op: &RoleOp) -> Result<Outcome> {
        let outcome = self.mutate(|state| state.users.apply(op)).await?;
        match &outcome {
            Ok(()) => tracing::info!(op = ?op, "Role operation applied"),
            Err(reason) => {
                crate::metrics::record_rejection(reason.code());
                tracing::info!(op = ?op, reason = %reason, "Role operation rejected");
            }
        }
        Ok(outcome)
    }

    pub async fn request_join(&self, user: UserId) -> Result<Outcome> {
        let outcome = self.mutate(|state| state.users.request_join(user)).await?;
        if let Err(reason) = &outcome {
            crate::metrics::record_rejection(reason.code());
        }
        Ok(outcome)
    }

    /// Record a non-allowed user; only writes when the set actually changes
    pub async fn record_chat_member(&self, user: UserId) -> Result<bool> {
        self.update(|state| state.users.record_chat_member(user)).await
    }

    pub async fn is_chat_allowed(&self, chat_id: ChatId) -> bool {
        self.read(|s| s.chats.is_chat_allowed(chat_id)).await
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    pub async fn timers(&self, kind: TimerKind) -> Vec<TimerRecord> {
        self.read(|s| s.timers.list(kind).to_vec()).await
    }

    pub async fn all_timers(&self) -> Vec<TimerRecord> {
        self.read(|s| s.timers.all().cloned().collect()).await
    }

    pub async fn add_timer(&self, record: TimerRecord) -> Result<()> {
        self.update(|state| state.timers.push(record)).await
    }

    /// Remove a fired timer. Returns false if it was already gone.
    pub async fn remove_timer(&self, record: &TimerRecord) -> Result<bool> {
        self.update(|state| state.timers.remove(record)).await
    }

    /// Record the running bot identity in BOT_DATA
    pub async fn record_bot_identity(&self, bot_id: UserId, version: &str) -> Result<()> {
        self.update(|state| {
            state.bot_data.bot_id = bot_id;
            state.bot_data.bot_version = version.to_string();
        })
        .await
    }
}
