//! Session synchronization worker.
//!
//! A single task owns the [`SessionContainer`] and drains the identity
//! provider's auth-state events in order, finishing each profile lookup
//! before taking the next event. A sign-in followed quickly by a sign-out
//! therefore always ends signed out. Readers get snapshots through a
//! `watch` channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{SessionContainer, SessionState};
use crate::backend::{AuthStateEvent, AuthStateSubscription, DocumentStore, IdentityService};

/// Starts the session worker.
pub struct SessionSync;

impl SessionSync {
    /// Subscribe to `identity` and spawn the worker on the current runtime.
    ///
    /// The subscription is taken before this returns, so no event emitted
    /// afterwards is missed.
    #[must_use]
    pub fn spawn(
        identity: Arc<dyn IdentityService>,
        documents: Arc<dyn DocumentStore>,
    ) -> SessionHandle {
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let events_processed = Arc::new(AtomicU64::new(0));
        let subscription = identity.subscribe();

        let worker = Worker {
            container: SessionContainer::new(documents),
            identity,
            state_tx,
            shutdown_rx,
            events_processed: events_processed.clone(),
        };
        let task = tokio::spawn(worker.run(subscription));

        SessionHandle {
            inner: Arc::new(HandleInner {
                state_rx,
                shutdown_tx,
                task: Mutex::new(Some(task)),
                events_processed,
            }),
        }
    }
}

struct Worker {
    container: SessionContainer,
    identity: Arc<dyn IdentityService>,
    state_tx: watch::Sender<SessionState>,
    shutdown_rx: watch::Receiver<bool>,
    events_processed: Arc<AtomicU64>,
}

impl Worker {
    #[instrument(name = "session_sync", skip_all)]
    async fn run(mut self, subscription: AuthStateSubscription) {
        let AuthStateSubscription {
            current,
            mut events,
        } = subscription;
        self.apply(current).await;
        info!("session sync started");

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => self.apply(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session sync lagged, resyncing from current user");
                        let current = self.identity.current_user();
                        self.apply(current).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("identity event stream closed");
                        break;
                    }
                },
            }
        }

        info!("session sync stopped");
    }

    async fn apply(&mut self, event: AuthStateEvent) {
        let state = self.container.on_identity_event(event).await.clone();
        self.state_tx.send_replace(state);
        self.events_processed.fetch_add(1, Ordering::Release);
    }
}

/// Handle to the running session worker.
///
/// Cheap to clone; every clone observes the same state.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    state_rx: watch::Receiver<SessionState>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    events_processed: Arc<AtomicU64>,
}

impl SessionHandle {
    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state_rx.borrow().clone()
    }

    /// A receiver that sees every later state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_rx.clone()
    }

    /// Wait for the first identity event to be processed.
    pub async fn wait_until_initialized(&self) -> SessionState {
        self.wait_for(|state| !state.is_initializing).await
    }

    /// Wait until the state satisfies `predicate`, returning that state.
    ///
    /// Returns the last published state if the worker stops first.
    pub async fn wait_for(&self, predicate: impl Fn(&SessionState) -> bool) -> SessionState {
        let mut rx = self.subscribe();
        if let Ok(state) = rx.wait_for(|state| predicate(state)).await {
            return state.clone();
        }
        rx.borrow().clone()
    }

    /// Number of identity events applied so far, including the initial one.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.inner.events_processed.load(Ordering::Acquire)
    }

    /// Stop the worker and wait for it to finish. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "session sync task ended abnormally");
            }
        }
    }
}
