//! Single-flight credential renewal.
//!
//! Responsibilities:
//! - Run at most one renewal round trip at a time per client.
//! - Queue every caller that needs a credential while a renewal is in flight.
//! - Settle once: store the new credential (or clear it and notify observers),
//!   then release waiters in arrival order with the same outcome.
//!
//! The round trip runs on its own task. Dropping a caller's future abandons
//! only that caller's interest; the cycle still settles for everyone else.
//!
//! Every login and logout starts a new session epoch. A cycle that settles
//! after the epoch moved on still releases its waiters, but leaves the store
//! and the observers alone.
use crate::{observer::SessionObserver, renewal::Renewer};
use parking_lot::{Mutex, RwLock};
use problum_store::CredentialStore;
use problum_types::{ClientError, Credential, traits::Result};
use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::oneshot;

/// Outcome of one renewal cycle, fanned out to all of its waiters.
#[derive(Debug, Clone)]
pub enum Settlement {
    Renewed(Credential),
    Failed(String),
}

struct Waiter {
    tx: oneshot::Sender<Settlement>,
}

enum RenewalState {
    Idle,
    /// Waiters in arrival order; the trigger is first.
    InFlight {
        cycle: u64,
        waiters: VecDeque<Waiter>,
    },
    Settled {
        cycle: u64,
        outcome: Settlement,
    },
}

/// Observable summary of the coordinator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalPhase {
    Idle,
    InFlight { cycle: u64, waiters: usize },
    Settled { cycle: u64, renewed: bool },
}

enum Ticket {
    Ready(Credential),
    Wait(oneshot::Receiver<Settlement>),
}

struct Inner {
    store: Arc<CredentialStore>,
    renewer: Arc<dyn Renewer>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    state: Mutex<RenewalState>,
    next_cycle: AtomicU64,
    /// Bumped under `state` whenever the session is replaced or closed.
    epoch: AtomicU64,
}

/// Hands out fresh credentials, renewing at most once at a time.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<CredentialStore>, renewer: Arc<dyn Renewer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                renewer,
                observers: RwLock::new(Vec::new()),
                state: Mutex::new(RenewalState::Idle),
                next_cycle: AtomicU64::new(1),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Register an observer for session lifecycle events.
    pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
        self.inner.observers.write().push(observer);
    }

    #[must_use]
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Obtain a credential to replace `rejected`, the one a request was sent
    /// with when the server answered 401.
    ///
    /// Joins the in-flight renewal if there is one. Otherwise, if the store
    /// already holds a different credential (the request raced a renewal that
    /// has since settled), returns it without a network call. Otherwise starts
    /// a new renewal cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RenewalFailed`] if the cycle this caller joined
    /// failed. The store is already cleared and observers notified by then.
    pub async fn acquire(&self, rejected: Option<&Credential>) -> Result<Credential> {
        match self.enqueue(Some(rejected)) {
            Ticket::Ready(credential) => Ok(credential),
            Ticket::Wait(rx) => Self::wait(rx).await,
        }
    }

    /// Renew unconditionally, joining the in-flight cycle if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RenewalFailed`] if renewal failed.
    pub async fn renew(&self) -> Result<Credential> {
        match self.enqueue(None) {
            Ticket::Ready(credential) => Ok(credential),
            Ticket::Wait(rx) => Self::wait(rx).await,
        }
    }

    /// Install `credential` as the start of a new session.
    ///
    /// A renewal still in flight from the previous session will not
    /// overwrite it.
    pub fn begin_session(&self, credential: Credential) {
        let _state = self.inner.state.lock();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.store.set(credential);
    }

    /// Drop the credential without notifying observers, as on logout.
    ///
    /// A renewal still in flight will not put a credential back.
    pub fn close_session(&self) {
        let _state = self.inner.state.lock();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.store.clear();
    }

    /// End the session after a renewed credential was rejected again.
    ///
    /// Clears the store; observers are notified only by the caller that
    /// actually removed a credential, so a burst of such failures reports the
    /// session end once.
    pub fn end_session(&self, reason: &str) {
        if self.inner.store.take().is_some() {
            tracing::warn!(reason, "session ended, credential cleared");
            self.inner.notify_failure();
        }
    }

    /// Current state of the renewal state machine.
    #[must_use]
    pub fn phase(&self) -> RenewalPhase {
        match &*self.inner.state.lock() {
            RenewalState::Idle => RenewalPhase::Idle,
            RenewalState::InFlight { cycle, waiters } => RenewalPhase::InFlight {
                cycle: *cycle,
                waiters: waiters.len(),
            },
            RenewalState::Settled { cycle, outcome } => RenewalPhase::Settled {
                cycle: *cycle,
                renewed: matches!(outcome, Settlement::Renewed(_)),
            },
        }
    }

    /// Number of renewal cycles started so far.
    #[must_use]
    pub fn cycles_started(&self) -> u64 {
        self.inner.next_cycle.load(Ordering::SeqCst) - 1
    }

    /// Check-then-enqueue under one lock, so two callers never both start a
    /// cycle. `replacing` is `None` for an unconditional renewal.
    fn enqueue(&self, replacing: Option<Option<&Credential>>) -> Ticket {
        let mut state = self.inner.state.lock();

        if let RenewalState::InFlight { cycle, waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push_back(Waiter { tx });
            tracing::debug!(
                cycle = *cycle,
                position = waiters.len(),
                "joined in-flight renewal"
            );
            return Ticket::Wait(rx);
        }

        if let Some(rejected) = replacing
            && let Some(current) = self.inner.store.get()
            && Some(&current) != rejected
        {
            tracing::debug!("rejected credential is stale, reusing current one");
            return Ticket::Ready(current);
        }

        let cycle = self.inner.next_cycle.fetch_add(1, Ordering::SeqCst);
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        *state = RenewalState::InFlight {
            cycle,
            waiters: VecDeque::from([Waiter { tx }]),
        };
        drop(state);

        tracing::info!(cycle, "credential renewal started");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut guard = CycleGuard {
                inner: Arc::clone(&inner),
                cycle,
                epoch,
                armed: true,
            };
            let outcome = match inner.renewer.renew().await {
                Ok(credential) => Settlement::Renewed(credential),
                Err(ClientError::RenewalFailed(reason)) => Settlement::Failed(reason),
                Err(e) => Settlement::Failed(e.to_string()),
            };
            guard.armed = false;
            inner.settle(cycle, epoch, outcome);
        });

        Ticket::Wait(rx)
    }

    async fn wait(rx: oneshot::Receiver<Settlement>) -> Result<Credential> {
        match rx.await {
            Ok(Settlement::Renewed(credential)) => Ok(credential),
            Ok(Settlement::Failed(reason)) => Err(ClientError::RenewalFailed(reason)),
            Err(_) => Err(ClientError::RenewalFailed(
                "renewal ended without a result".into(),
            )),
        }
    }
}

impl Inner {
    /// Apply the outcome to the store, notify observers, then release waiters
    /// front to back.
    ///
    /// The store write and the state change happen under one lock before any
    /// observer runs, so a misbehaving observer cannot leave the cycle open.
    fn settle(&self, cycle: u64, epoch: u64, outcome: Settlement) {
        let (waiters, current) = {
            let mut state = self.state.lock();
            let current = self.epoch.load(Ordering::SeqCst) == epoch;
            if current {
                match &outcome {
                    Settlement::Renewed(credential) => self.store.set(credential.clone()),
                    Settlement::Failed(_) => self.store.clear(),
                }
            }
            let previous = std::mem::replace(
                &mut *state,
                RenewalState::Settled {
                    cycle,
                    outcome: outcome.clone(),
                },
            );
            let waiters = match previous {
                RenewalState::InFlight { waiters, .. } => waiters,
                RenewalState::Idle | RenewalState::Settled { .. } => VecDeque::new(),
            };
            (waiters, current)
        };

        if current {
            match &outcome {
                Settlement::Renewed(credential) => {
                    tracing::info!(cycle, "credential renewed");
                    self.notify(|observer| observer.on_renewed(credential));
                }
                Settlement::Failed(reason) => {
                    tracing::warn!(cycle, reason = %reason, "credential renewal failed");
                    self.notify_failure();
                }
            }
        } else {
            tracing::debug!(cycle, "session changed during renewal, store left as is");
        }

        tracing::debug!(cycle, waiters = waiters.len(), "releasing renewal waiters");
        for waiter in waiters {
            // A closed receiver means that caller gave up; the rest still get it.
            let _ = waiter.tx.send(outcome.clone());
        }
    }

    fn notify_failure(&self) {
        self.notify(|observer| observer.on_renewal_failure());
    }

    /// Run `event` for every observer. A panicking observer is logged and
    /// skipped; the others still run.
    fn notify(&self, event: impl Fn(&dyn SessionObserver)) {
        let observers = self.observers.read().clone();
        for observer in &observers {
            if panic::catch_unwind(AssertUnwindSafe(|| event(observer.as_ref()))).is_err() {
                tracing::error!("session observer panicked");
            }
        }
    }
}

/// Settles the cycle as failed if the renewal task unwinds or is cancelled
/// before producing an outcome.
struct CycleGuard {
    inner: Arc<Inner>,
    cycle: u64,
    epoch: u64,
    armed: bool,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if self.armed {
            self.inner.settle(
                self.cycle,
                self.epoch,
                Settlement::Failed("renewal task aborted".into()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::{sync::atomic::AtomicUsize, time::Duration};
    use tokio::sync::Notify;

    /// Renewer that blocks until released, then returns scripted results.
    struct GatedRenewer {
        gate: Notify,
        calls: AtomicUsize,
        results: Mutex<VecDeque<Result<Credential>>>,
    }

    impl GatedRenewer {
        fn new(results: Vec<Result<Credential>>) -> Arc<Self> {
            Arc::new(Self {
                gate: Notify::new(),
                calls: AtomicUsize::new(0),
                results: Mutex::new(results.into()),
            })
        }

        fn open(&self) {
            self.gate.notify_one();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Renewer for GatedRenewer {
        async fn renew(&self) -> Result<Credential> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            self.results
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::RenewalFailed("no result scripted".into())))
        }
    }

    struct PanickingObserver;

    impl SessionObserver for PanickingObserver {
        fn on_renewal_failure(&self) {
            panic!("observer exploded");
        }
    }

    struct PanickingRenewer;

    #[async_trait]
    impl Renewer for PanickingRenewer {
        #[allow(unreachable_code)]
        async fn renew(&self) -> Result<Credential> {
            panic!("renewer exploded");
        }
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn SessionObserver>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let observer: Arc<dyn SessionObserver> = Arc::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, observer)
    }

    async fn settle_tasks() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_acquire_single_renewal() {
        let renewer = GatedRenewer::new(vec![Ok(Credential::new("tok2"))]);
        let store = Arc::new(CredentialStore::new());
        store.set(Credential::new("tok1"));
        let coord = RefreshCoordinator::new(Arc::clone(&store), renewer.clone());

        let stale = Credential::new("tok1");
        let mut handles = Vec::new();
        for _ in 0..16 {
            let c = coord.clone();
            let s = stale.clone();
            handles.push(tokio::spawn(async move { c.acquire(Some(&s)).await }));
        }
        settle_tasks().await;
        assert_eq!(
            coord.phase(),
            RenewalPhase::InFlight {
                cycle: 1,
                waiters: 16
            }
        );

        renewer.open();
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), Credential::new("tok2"));
        }
        assert_eq!(renewer.calls(), 1);
        assert_eq!(coord.cycles_started(), 1);
        assert_eq!(store.get(), Some(Credential::new("tok2")));
        assert_eq!(
            coord.phase(),
            RenewalPhase::Settled {
                cycle: 1,
                renewed: true
            }
        );
    }

    #[tokio::test]
    async fn test_waiters_released_in_arrival_order() {
        let renewer = GatedRenewer::new(vec![Ok(Credential::new("tok2"))]);
        let coord = RefreshCoordinator::new(Arc::new(CredentialStore::new()), renewer.clone());
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let c = coord.clone();
            let o = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let cred = c.acquire(None).await.unwrap();
                o.lock().push(i);
                cred
            }));
            // Stagger arrivals so each joins strictly after the previous one.
            settle_tasks().await;
        }

        renewer.open();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(renewer.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_renewal_clears_store_and_notifies_once() {
        let renewer = GatedRenewer::new(vec![Err(ClientError::RenewalFailed(
            "refresh endpoint returned 401 Unauthorized".into(),
        ))]);
        let store = Arc::new(CredentialStore::new());
        store.set(Credential::new("tok1"));
        let coord = RefreshCoordinator::new(Arc::clone(&store), renewer.clone());
        let (hits, observer) = counter();
        coord.subscribe(observer);

        let stale = Credential::new("tok1");
        let mut handles = Vec::new();
        for _ in 0..6 {
            let c = coord.clone();
            let s = stale.clone();
            handles.push(tokio::spawn(async move { c.acquire(Some(&s)).await }));
        }
        settle_tasks().await;
        renewer.open();

        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert!(matches!(err, ClientError::RenewalFailed(ref m) if m.contains("401")));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(store.get().is_none());
        assert_eq!(renewer.calls(), 1);
    }

    #[tokio::test]
    async fn test_new_cycle_after_settlement() {
        let renewer = GatedRenewer::new(vec![
            Ok(Credential::new("tok2")),
            Ok(Credential::new("tok3")),
        ]);
        let coord = RefreshCoordinator::new(Arc::new(CredentialStore::new()), renewer.clone());

        let c = coord.clone();
        let first = tokio::spawn(async move { c.renew().await });
        settle_tasks().await;
        renewer.open();
        assert_eq!(first.await.unwrap().unwrap().as_str(), "tok2");

        // tok2 itself rejected: a new cycle is needed.
        let c = coord.clone();
        let second = tokio::spawn(async move { c.acquire(Some(&Credential::new("tok2"))).await });
        settle_tasks().await;
        renewer.open();
        assert_eq!(second.await.unwrap().unwrap().as_str(), "tok3");
        assert_eq!(renewer.calls(), 2);
        assert_eq!(coord.cycles_started(), 2);
    }

    #[tokio::test]
    async fn test_stale_rejection_reuses_current_credential() {
        let renewer = GatedRenewer::new(vec![]);
        let store = Arc::new(CredentialStore::new());
        store.set(Credential::new("tok2"));
        let coord = RefreshCoordinator::new(Arc::clone(&store), renewer.clone());

        let got = coord.acquire(Some(&Credential::new("tok1"))).await.unwrap();
        assert_eq!(got.as_str(), "tok2");
        assert_eq!(renewer.calls(), 0);
        assert_eq!(coord.phase(), RenewalPhase::Idle);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_affect_others() {
        let renewer = GatedRenewer::new(vec![Ok(Credential::new("tok2"))]);
        let coord = RefreshCoordinator::new(Arc::new(CredentialStore::new()), renewer.clone());

        let c = coord.clone();
        let trigger = tokio::spawn(async move { c.renew().await });
        let c = coord.clone();
        let follower = tokio::spawn(async move { c.renew().await });
        settle_tasks().await;

        // The caller that started the cycle walks away.
        trigger.abort();
        settle_tasks().await;
        renewer.open();

        assert_eq!(follower.await.unwrap().unwrap().as_str(), "tok2");
        assert_eq!(coord.store().get().unwrap().as_str(), "tok2");
    }

    #[tokio::test]
    async fn test_panicking_renewer_settles_as_failure() {
        let store = Arc::new(CredentialStore::new());
        store.set(Credential::new("tok1"));
        let coord = RefreshCoordinator::new(Arc::clone(&store), Arc::new(PanickingRenewer));
        let (hits, observer) = counter();
        coord.subscribe(observer);

        let err = coord.renew().await.unwrap_err();
        assert!(matches!(err, ClientError::RenewalFailed(_)));
        assert!(store.get().is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(matches!(
            coord.phase(),
            RenewalPhase::Settled { renewed: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_panicking_observer_does_not_wedge_renewal() {
        let renewer = GatedRenewer::new(vec![
            Err(ClientError::RenewalFailed("refresh rejected".into())),
            Err(ClientError::RenewalFailed("refresh rejected".into())),
        ]);
        let store = Arc::new(CredentialStore::new());
        store.set(Credential::new("tok1"));
        let coord = RefreshCoordinator::new(Arc::clone(&store), renewer.clone());
        coord.subscribe(Arc::new(PanickingObserver));
        let (hits, observer) = counter();
        coord.subscribe(observer);

        for cycle in 1..=2 {
            renewer.open();
            let result = tokio::time::timeout(Duration::from_millis(500), coord.renew())
                .await
                .expect("renewal settled");
            assert!(matches!(result, Err(ClientError::RenewalFailed(_))));
            assert_eq!(
                coord.phase(),
                RenewalPhase::Settled {
                    cycle,
                    renewed: false
                }
            );
        }
        assert_eq!(coord.cycles_started(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn test_transport_error_during_renewal_is_renewal_failure() {
        let renewer = GatedRenewer::new(vec![Err(ClientError::Transport(
            "connection reset".into(),
        ))]);
        let store = Arc::new(CredentialStore::new());
        store.set(Credential::new("tok1"));
        let coord = RefreshCoordinator::new(Arc::clone(&store), renewer.clone());
        let (hits, observer) = counter();
        coord.subscribe(observer);

        let stale = Credential::new("tok1");
        let mut handles = Vec::new();
        for _ in 0..4 {
            let c = coord.clone();
            let s = stale.clone();
            handles.push(tokio::spawn(async move { c.acquire(Some(&s)).await }));
        }
        settle_tasks().await;
        renewer.open();

        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert!(
                matches!(err, ClientError::RenewalFailed(ref m) if m.contains("connection reset"))
            );
        }
        assert!(store.get().is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(renewer.calls(), 1);
    }

    #[tokio::test]
    async fn test_closed_session_is_not_revived_by_renewal() {
        let renewer = GatedRenewer::new(vec![Ok(Credential::new("tok2"))]);
        let store = Arc::new(CredentialStore::new());
        store.set(Credential::new("tok1"));
        let coord = RefreshCoordinator::new(Arc::clone(&store), renewer.clone());
        let (hits, observer) = counter();
        coord.subscribe(observer);

        let c = coord.clone();
        let waiter = tokio::spawn(async move { c.acquire(Some(&Credential::new("tok1"))).await });
        settle_tasks().await;
        coord.close_session();
        renewer.open();

        // The waiter still gets the cycle's outcome; the store stays empty.
        assert_eq!(waiter.await.unwrap().unwrap().as_str(), "tok2");
        assert!(store.get().is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_renewal_keeps_newer_session() {
        let renewer = GatedRenewer::new(vec![Err(ClientError::RenewalFailed(
            "refresh rejected".into(),
        ))]);
        let store = Arc::new(CredentialStore::new());
        store.set(Credential::new("tok1"));
        let coord = RefreshCoordinator::new(Arc::clone(&store), renewer.clone());
        let (hits, observer) = counter();
        coord.subscribe(observer);

        let c = coord.clone();
        let waiter = tokio::spawn(async move { c.renew().await });
        settle_tasks().await;
        coord.begin_session(Credential::new("fresh"));
        renewer.open();

        assert!(waiter.await.unwrap().is_err());
        assert_eq!(store.get().unwrap().as_str(), "fresh");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_end_session_notifies_once() {
        let store = Arc::new(CredentialStore::new());
        store.set(Credential::new("tok2"));
        let coord = RefreshCoordinator::new(Arc::clone(&store), GatedRenewer::new(vec![]));
        let (hits, observer) = counter();
        coord.subscribe(observer);

        coord.end_session("renewed credential rejected");
        coord.end_session("renewed credential rejected");
        assert!(store.get().is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_independent_coordinators() {
        let r1 = GatedRenewer::new(vec![Ok(Credential::new("a"))]);
        let r2 = GatedRenewer::new(vec![Ok(Credential::new("b"))]);
        let c1 = RefreshCoordinator::new(Arc::new(CredentialStore::new()), r1.clone());
        let c2 = RefreshCoordinator::new(Arc::new(CredentialStore::new()), r2.clone());

        let h1 = tokio::spawn({
            let c = c1.clone();
            async move { c.renew().await }
        });
        let h2 = tokio::spawn({
            let c = c2.clone();
            async move { c.renew().await }
        });
        settle_tasks().await;
        r1.open();
        r2.open();
        assert_eq!(h1.await.unwrap().unwrap().as_str(), "a");
        assert_eq!(h2.await.unwrap().unwrap().as_str(), "b");
        assert_eq!((r1.calls(), r2.calls()), (1, 1));
    }
}
