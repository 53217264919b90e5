//! # Intent Flow Testing
//!
//! Testing utilities and helpers for the Intent Flow architecture.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - A fluent Given-When-Then harness for reducers
//! - Async observation helpers for store integration tests
//!
//! ## Example
//!
//! ```ignore
//! use intent_flow_testing::{ReducerTest, test_clock};
//!
//! ReducerTest::new(MovieReducer::new())
//!     .with_env(MovieEnvironment::new(repository, test_clock()))
//!     .given_state(MovieState::default())
//!     .when_intent(MovieIntent::SearchMovie)
//!     .then_state(|state| assert!(state.is_loading))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use intent_flow_core::environment::Clock;


pub use reducer_test::ReducerTest;

/// Mock implementations of Environment traits
///
/// Deterministic stand-ins for the capability traits in
/// `intent_flow_core::environment`, injected into test environments
/// via constructors rather than global state.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use intent_flow_testing::mocks::FixedClock;
    /// use intent_flow_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers for effects and store observation
pub mod helpers {
    use intent_flow_core::effect::Effect;
    use std::time::Duration;
    use tokio::sync::{mpsc, watch};

    /// Collect the side-effect payloads from a reducer's effect list
    ///
    /// Convenient with [`ReducerTest::then_effects`](crate::ReducerTest::then_effects):
    ///
    /// ```ignore
    /// .then_effects(|effects| {
    ///     assert_eq!(emitted(effects), vec![MovieSideEffect::NavigateTo("movie_detail".into())]);
    /// })
    /// ```
    pub fn emitted<I, F: Clone>(effects: &[Effect<I, F>]) -> Vec<F> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Emit(side_effect) => Some(side_effect.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether the effect list contains a suspension point
    #[must_use]
    pub fn has_future<I, F>(effects: &[Effect<I, F>]) -> bool {
        effects
            .iter()
            .any(|effect| matches!(effect, Effect::Future(_)))
    }

    /// Await the next state notification, with a timeout
    ///
    /// Returns `None` if the timeout elapses or the store is gone.
    pub async fn next_state<S: Clone>(
        rx: &mut watch::Receiver<S>,
        timeout: Duration,
    ) -> Option<S> {
        match tokio::time::timeout(timeout, rx.changed()).await {
            Ok(Ok(())) => Some(rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// Await the next side-effect delivery, with a timeout
    ///
    /// Returns `None` if the timeout elapses or the store is gone.
    pub async fn next_side_effect<F>(
        rx: &mut mpsc::UnboundedReceiver<F>,
        timeout: Duration,
    ) -> Option<F> {
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(side_effect) => side_effect,
            Err(_) => None,
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn emitted_extracts_only_emit_payloads() {
        use intent_flow_core::effect::Effect;

        let effects: Vec<Effect<(), u32>> = vec![
            Effect::None,
            Effect::Emit(1),
            Effect::future(async { None }),
            Effect::Emit(2),
        ];

        assert_eq!(helpers::emitted(&effects), vec![1, 2]);
        assert!(helpers::has_future(&effects));
    }
}
