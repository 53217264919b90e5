//! # Intent Flow Runtime
//!
//! Runtime implementation for the Intent Flow architecture.
//!
//! This crate provides the Store runtime that coordinates intent
//! processing: an unbounded intent channel, a single consumer task
//! that runs the reducer, a last-value state holder, and one-shot
//! side-effect delivery to the view layer.
//!
//! ## Core Components
//!
//! - **Store**: Cheap handle over the running intent loop
//! - **Intent Loop**: Drains the intent channel in FIFO order, one
//!   intent at a time, and publishes every state transition
//! - **State Holder**: `tokio::sync::watch` based last-value cache;
//!   late subscribers catch up with the latest value immediately
//! - **Side-Effect Fan-out**: per-subscriber unbounded queues that
//!   never replay past emissions
//!
//! ## Example
//!
//! ```ignore
//! use intent_flow_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an intent (never blocks)
//! store.send(Intent::DoSomething)?;
//!
//! // Observe state
//! let mut states = store.subscribe_state();
//! states.changed().await?;
//! let snapshot = states.borrow_and_update().clone();
//! ```

use intent_flow_core::{effect::Effect, reducer::Reducer};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new intents
        ///
        /// This error is returned when `send()` is called after shutdown
        /// initiated. Intents already queued are still drained.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for queued intents to drain
        #[error("Shutdown timed out with {0} intents still pending")]
        ShutdownTimeout(usize),

        /// The intent loop has terminated and the channel is closed
        ///
        /// This typically means the consumer task was torn down while
        /// handles to the store were still alive.
        #[error("Intent channel closed")]
        ChannelClosed,

        /// Timeout waiting for the store to become idle
        ///
        /// Returned by `settled` when intents are still being processed
        /// after the timeout elapsed.
        #[error("Timeout waiting for pending intents")]
        Timeout,
    }
}

/// Store module - the runtime for reducers
///
/// The store owns the four pieces the architecture is made of and
/// wires them into a single unidirectional loop:
/// view → intent channel → reducer → state holder / side-effect
/// channel → view.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicUsize, Duration, Effect, Mutex, Ordering, Reducer, StoreError,
        VecDeque, mpsc, watch,
    };

    /// Registry of live side-effect subscribers
    ///
    /// Senders whose receiver was dropped are pruned on the next
    /// emission or subscription, which is what makes receiver-drop
    /// the unsubscribe operation.
    type SubscriberRegistry<F> = Arc<Mutex<Vec<mpsc::UnboundedSender<F>>>>;

    /// The Store - runtime coordinator for a reducer
    ///
    /// `Store::new` spawns a single consumer task that owns the reducer
    /// and environment and drains the intent channel in FIFO order. The
    /// `Store` value itself is a cheap, cloneable handle: it carries the
    /// intent sender, the state holder, and the side-effect registry.
    ///
    /// # Concurrency model
    ///
    /// - Any number of producers may call [`send`](Store::send)
    ///   concurrently; enqueueing never blocks.
    /// - Exactly one consumer runs reducer bodies, strictly one intent
    ///   at a time. An asynchronous effect (an entity-store query) is
    ///   awaited before the next queued intent starts, and its feedback
    ///   intent is processed ahead of the queue.
    /// - State is written only by the consumer task, so no external
    ///   locking is needed anywhere else.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `I`: Intent type
    /// - `F`: Side-effect type
    pub struct Store<S, I, F> {
        intent_tx: mpsc::UnboundedSender<I>,
        state_tx: Arc<watch::Sender<S>>,
        side_effect_subscribers: SubscriberRegistry<F>,
        shutdown: Arc<AtomicBool>,
        pending_intents: Arc<AtomicUsize>,
    }

    impl<S, I, F> Store<S, I, F>
    where
        S: Clone + PartialEq + Send + Sync + 'static,
        I: Send + 'static,
        F: Clone + Send + 'static,
    {
        /// Create a new store and spawn its intent-processing loop
        ///
        /// The reducer and environment move into the consumer task;
        /// the returned handle only carries channels.
        ///
        /// # Arguments
        ///
        /// - `initial_state`: The starting state for the store
        /// - `reducer`: The reducer implementation (business logic)
        /// - `environment`: Injected dependencies
        ///
        /// # Panics
        ///
        /// Panics if called outside a tokio runtime, since the consumer
        /// loop is spawned onto it.
        #[must_use]
        pub fn new<E, R>(initial_state: S, reducer: R, environment: E) -> Self
        where
            R: Reducer<State = S, Intent = I, SideEffect = F, Environment = E>
                + Send
                + Sync
                + 'static,
            E: Send + Sync + 'static,
        {
            let (intent_tx, intent_rx) = mpsc::unbounded_channel();
            let (state_tx, _state_rx) = watch::channel(initial_state);
            let state_tx = Arc::new(state_tx);
            let side_effect_subscribers: SubscriberRegistry<F> = Arc::new(Mutex::new(Vec::new()));
            let pending_intents = Arc::new(AtomicUsize::new(0));

            tokio::spawn(drain_intents(
                intent_rx,
                Arc::clone(&state_tx),
                Arc::clone(&side_effect_subscribers),
                Arc::clone(&pending_intents),
                reducer,
                environment,
            ));

            Self {
                intent_tx,
                state_tx,
                side_effect_subscribers,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_intents,
            }
        }

        /// Submit an intent to the store
        ///
        /// Enqueues onto the unbounded intent channel and returns
        /// immediately; the producer is never blocked. Intents are
        /// observed by the consumer in a single global FIFO order per
        /// sender.
        ///
        /// # Errors
        ///
        /// - [`StoreError::ShutdownInProgress`] after shutdown initiated
        /// - [`StoreError::ChannelClosed`] if the consumer task is gone
        #[tracing::instrument(skip(self, intent), name = "store_send")]
        pub fn send(&self, intent: I) -> Result<(), StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected intent: store is shutting down");
                metrics::counter!("store.shutdown.rejected_intents").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            self.pending_intents.fetch_add(1, Ordering::SeqCst);
            if self.intent_tx.send(intent).is_err() {
                self.pending_intents.fetch_sub(1, Ordering::SeqCst);
                tracing::error!("Intent channel closed, consumer task is gone");
                return Err(StoreError::ChannelClosed);
            }

            metrics::counter!("store.intents.total").increment(1);
            Ok(())
        }

        /// Subscribe to state transitions
        ///
        /// The state holder has last-value semantics, not queue
        /// semantics: within one subscriber, notifications arrive in
        /// publish order, but a slow subscriber observes only the
        /// latest value. The returned receiver is marked changed, so
        /// the first `changed().await` resolves immediately with the
        /// current value (cold-start catch-up).
        ///
        /// Dropping the receiver unsubscribes and releases its
        /// resources immediately.
        #[must_use]
        pub fn subscribe_state(&self) -> watch::Receiver<S> {
            let mut rx = self.state_tx.subscribe();
            rx.mark_changed();
            rx
        }

        /// Subscribe to one-shot side effects
        ///
        /// Each subscriber gets its own unbounded queue. Only emissions
        /// that happen after subscription are delivered; past emissions
        /// are never replayed. Dropping the receiver unsubscribes: its
        /// queue is released with it, and the dead registry entry is
        /// pruned on the next emission or subscription.
        #[must_use]
        pub fn subscribe_side_effects(&self) -> mpsc::UnboundedReceiver<F> {
            let (tx, rx) = mpsc::unbounded_channel();
            let mut guard = self
                .side_effect_subscribers
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.retain(|sender| !sender.is_closed());
            guard.push(tx);
            rx
        }

        /// Read a snapshot of the current state via a closure
        ///
        /// ```ignore
        /// let movie_count = store.state(|s| s.movies.len());
        /// ```
        pub fn state<T>(&self, f: impl FnOnce(&S) -> T) -> T {
            f(&self.state_tx.borrow())
        }

        /// Wait until every submitted intent has been fully processed
        ///
        /// "Fully processed" includes awaiting the intent's effects and
        /// reducing any feedback intents they produced. Useful in tests
        /// and demos to reach a quiescent point.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Timeout`] if intents are still pending
        /// when the timeout expires.
        pub async fn settled(&self, timeout: Duration) -> Result<(), StoreError> {
            let start = tokio::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                if self.pending_intents.load(Ordering::Acquire) == 0 {
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    return Err(StoreError::Timeout);
                }
                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Sets the shutdown flag (rejecting new intents) and waits for
        /// the already-queued backlog to drain, so channel closure never
        /// loses pending intents.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout
        /// expires with intents still pending.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);

            let start = tokio::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_intents.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("Intent backlog drained, shutdown complete");
                    metrics::counter!("store.shutdown.completed").increment(1);
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_intents = pending,
                        "Shutdown timed out with intents still pending"
                    );
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }
    }

    impl<S, I, F> Clone for Store<S, I, F> {
        fn clone(&self) -> Self {
            Self {
                intent_tx: self.intent_tx.clone(),
                state_tx: Arc::clone(&self.state_tx),
                side_effect_subscribers: Arc::clone(&self.side_effect_subscribers),
                shutdown: Arc::clone(&self.shutdown),
                pending_intents: Arc::clone(&self.pending_intents),
            }
        }
    }

    impl<S, I, F> std::fmt::Debug for Store<S, I, F> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Store")
                .field(
                    "pending_intents",
                    &self.pending_intents.load(Ordering::SeqCst),
                )
                .field("shutting_down", &self.shutdown.load(Ordering::SeqCst))
                .finish_non_exhaustive()
        }
    }

    /// The consumer loop: drains the intent channel in FIFO order
    ///
    /// Exits when every `Store` handle has been dropped and the queue
    /// is empty. If the task is torn down mid-flight instead, the
    /// `watch::Sender` write path dies with it, so an in-progress
    /// effect completion can never write to a torn-down state holder.
    async fn drain_intents<S, I, F, E, R>(
        mut intents: mpsc::UnboundedReceiver<I>,
        state_tx: Arc<watch::Sender<S>>,
        subscribers: SubscriberRegistry<F>,
        pending_intents: Arc<AtomicUsize>,
        reducer: R,
        environment: E,
    ) where
        S: Clone + PartialEq + Send + Sync + 'static,
        I: Send + 'static,
        F: Clone + Send + 'static,
        R: Reducer<State = S, Intent = I, SideEffect = F, Environment = E>,
    {
        while let Some(intent) = intents.recv().await {
            process_intent(intent, &state_tx, &subscribers, &reducer, &environment).await;
            pending_intents.fetch_sub(1, Ordering::SeqCst);
        }

        tracing::debug!("Intent channel closed, consumer loop exiting");
    }

    /// Process one queued intent to completion
    ///
    /// Runs the reducer, publishes the state transition, then executes
    /// the returned effects in order. A feedback intent produced by an
    /// awaited effect goes onto a local backlog and is reduced before
    /// the next queued intent is dequeued; this is what gives the
    /// strict per-consumer ordering of state transitions and side
    /// effects.
    async fn process_intent<S, I, F, E, R>(
        intent: I,
        state_tx: &watch::Sender<S>,
        subscribers: &SubscriberRegistry<F>,
        reducer: &R,
        environment: &E,
    ) where
        S: Clone + PartialEq,
        F: Clone,
        R: Reducer<State = S, Intent = I, SideEffect = F, Environment = E>,
    {
        let mut backlog = VecDeque::new();
        backlog.push_back(intent);

        while let Some(intent) = backlog.pop_front() {
            let start = std::time::Instant::now();
            let mut next = state_tx.borrow().clone();
            let effects = reducer.reduce(&mut next, intent, environment);
            metrics::histogram!("store.reducer.duration_seconds")
                .record(start.elapsed().as_secs_f64());

            // Publish only genuine transitions so a no-op reduction
            // (navigation, for example) notifies nobody.
            let changed = state_tx.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
            if changed {
                tracing::trace!("State transition published");
                metrics::counter!("store.state.transitions").increment(1);
            }

            for effect in effects {
                match effect {
                    Effect::None => {
                        metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                    },
                    Effect::Emit(side_effect) => {
                        metrics::counter!("store.effects.executed", "type" => "emit").increment(1);
                        deliver_side_effect(subscribers, side_effect);
                    },
                    Effect::Future(future) => {
                        metrics::counter!("store.effects.executed", "type" => "future")
                            .increment(1);
                        if let Some(feedback) = future.await {
                            tracing::trace!("Effect completed with a feedback intent");
                            backlog.push_back(feedback);
                        } else {
                            tracing::trace!("Effect completed with no feedback intent");
                        }
                    },
                }
            }
        }
    }

    /// Fan a one-shot side effect out to every live subscriber
    ///
    /// Senders whose receiver has been dropped fail to send and are
    /// pruned from the registry.
    fn deliver_side_effect<F: Clone>(subscribers: &SubscriberRegistry<F>, side_effect: F) {
        let mut guard = subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let before = guard.len();
        guard.retain(|tx| tx.send(side_effect.clone()).is_ok());
        let delivered = guard.len();

        if delivered < before {
            tracing::debug!(
                pruned = before - delivered,
                "Pruned dropped side-effect subscribers"
            );
        }
        metrics::counter!("store.side_effects.delivered").increment(delivered as u64);
    }
}

pub use error::StoreError;
pub use store::Store;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

    use super::*;
    use intent_flow_core::{SmallVec, smallvec};
    use std::time::Duration;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct TestState {
        log: Vec<u32>,
        busy: bool,
    }

    #[derive(Debug, Clone)]
    enum TestIntent {
        Record(u32),
        Work(u32),
        WorkDone(u32),
        Ping,
        Chime(u32),
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestSideEffect {
        Chimed(u32),
    }

    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Intent = TestIntent;
        type SideEffect = TestSideEffect;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            intent: Self::Intent,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Intent, Self::SideEffect>; 4]> {
            match intent {
                TestIntent::Record(n) => {
                    state.log.push(n);
                    smallvec![Effect::None]
                },
                TestIntent::Work(n) => {
                    state.busy = true;
                    smallvec![Effect::future(async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Some(TestIntent::WorkDone(n))
                    })]
                },
                TestIntent::WorkDone(n) => {
                    state.busy = false;
                    state.log.push(n);
                    smallvec![Effect::None]
                },
                TestIntent::Ping => smallvec![Effect::None],
                TestIntent::Chime(n) => {
                    smallvec![Effect::Emit(TestSideEffect::Chimed(n))]
                },
            }
        }
    }

    fn test_store() -> Store<TestState, TestIntent, TestSideEffect> {
        Store::new(TestState::default(), TestReducer, ())
    }

    #[tokio::test]
    async fn intents_are_processed_in_fifo_order() {
        let store = test_store();

        for n in 1..=5 {
            store.send(TestIntent::Record(n)).unwrap();
        }
        store.settled(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.state(|s| s.log.clone()), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn feedback_intents_run_before_queued_intents() {
        let store = test_store();

        // Work(1) suspends on its effect; Record(9) is already queued
        // behind it, but WorkDone(1) must still be reduced first.
        store.send(TestIntent::Work(1)).unwrap();
        store.send(TestIntent::Record(9)).unwrap();
        store.settled(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.state(|s| s.log.clone()), vec![1, 9]);
        assert!(!store.state(|s| s.busy));
    }

    #[tokio::test]
    async fn late_subscriber_catches_up_with_latest_state() {
        let store = test_store();

        store.send(TestIntent::Record(42)).unwrap();
        store.settled(Duration::from_secs(1)).await.unwrap();

        let mut rx = store.subscribe_state();
        tokio::time::timeout(Duration::from_millis(100), rx.changed())
            .await
            .expect("catch-up notification should be immediate")
            .unwrap();
        assert_eq!(rx.borrow_and_update().log, vec![42]);
    }

    #[tokio::test]
    async fn unchanged_state_does_not_notify_observers() {
        let store = test_store();

        let mut rx = store.subscribe_state();
        // Consume the cold-start catch-up notification first.
        rx.changed().await.unwrap();
        rx.borrow_and_update();

        store.send(TestIntent::Ping).unwrap();
        store.settled(Duration::from_secs(1)).await.unwrap();

        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn side_effects_fan_out_to_all_current_subscribers() {
        let store = test_store();

        let mut first = store.subscribe_side_effects();
        let mut second = store.subscribe_side_effects();

        store.send(TestIntent::Chime(7)).unwrap();
        store.settled(Duration::from_secs(1)).await.unwrap();

        assert_eq!(first.try_recv().unwrap(), TestSideEffect::Chimed(7));
        assert_eq!(second.try_recv().unwrap(), TestSideEffect::Chimed(7));
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_without_disturbing_others() {
        let store = test_store();

        let first = store.subscribe_side_effects();
        let mut second = store.subscribe_side_effects();
        drop(first);

        store.send(TestIntent::Chime(1)).unwrap();
        store.send(TestIntent::Chime(2)).unwrap();
        store.settled(Duration::from_secs(1)).await.unwrap();

        assert_eq!(second.try_recv().unwrap(), TestSideEffect::Chimed(1));
        assert_eq!(second.try_recv().unwrap(), TestSideEffect::Chimed(2));
        assert!(second.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribing_prunes_previously_dropped_receivers() {
        let store = test_store();

        let stale = store.subscribe_side_effects();
        drop(stale);

        // The new subscription sweeps the dead entry out of the
        // registry before an emission ever happens.
        let mut live = store.subscribe_side_effects();

        store.send(TestIntent::Chime(3)).unwrap();
        store.settled(Duration::from_secs(1)).await.unwrap();

        assert_eq!(live.try_recv().unwrap(), TestSideEffect::Chimed(3));
        assert!(live.try_recv().is_err());
    }

    #[tokio::test]
    async fn past_side_effects_are_not_replayed_to_new_subscribers() {
        let store = test_store();

        store.send(TestIntent::Chime(1)).unwrap();
        store.settled(Duration::from_secs(1)).await.unwrap();

        let mut late = store.subscribe_side_effects();
        assert!(late.try_recv().is_err());

        store.send(TestIntent::Chime(2)).unwrap();
        store.settled(Duration::from_secs(1)).await.unwrap();
        assert_eq!(late.try_recv().unwrap(), TestSideEffect::Chimed(2));
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_is_rejected_after_shutdown() {
        let store = test_store();

        store.send(TestIntent::Record(1)).unwrap();
        store.shutdown(Duration::from_secs(1)).await.unwrap();

        assert!(matches!(
            store.send(TestIntent::Record(2)),
            Err(StoreError::ShutdownInProgress)
        ));
        assert_eq!(store.state(|s| s.log.clone()), vec![1]);
    }

    #[tokio::test]
    async fn shutdown_times_out_with_the_pending_count() {
        let store = test_store();

        store.send(TestIntent::Work(1)).unwrap();
        let result = store.shutdown(Duration::from_millis(1)).await;

        assert!(matches!(result, Err(StoreError::ShutdownTimeout(1))));

        // The in-flight work still drains; a later shutdown succeeds.
        store.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.state(|s| s.log.clone()), vec![1]);
    }

    #[tokio::test]
    async fn settled_times_out_while_an_effect_is_in_flight() {
        let store = test_store();

        store.send(TestIntent::Work(1)).unwrap();
        let result = store.settled(Duration::from_millis(1)).await;

        assert!(matches!(result, Err(StoreError::Timeout)));

        // The work still completes afterwards.
        store.settled(Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.state(|s| s.log.clone()), vec![1]);
    }
}
