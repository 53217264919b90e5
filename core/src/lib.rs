//! # Intent Flow Core
//!
//! Core traits and types for the Intent Flow architecture.
//!
//! This crate provides the fundamental abstractions for building
//! unidirectional intent-driven features using the Reducer pattern:
//! a view submits intents, a single consumer reduces them into an
//! immutable state, and one-shot side effects flow back to the view
//! on a separate channel.
//!
//! ## Core Concepts
//!
//! - **State**: Immutable snapshot the presentation layer renders
//! - **Intent**: All possible inputs to a reducer (user actions and
//!   effect-feedback results)
//! - **Reducer**: Pure function `(State, Intent, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Explicit Effects (no hidden I/O)
//! - Dependency Injection via Environment
//!
//! ## Example
//!
//! ```ignore
//! use intent_flow_core::*;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct SearchState {
//!     results: Vec<String>,
//!     is_loading: bool,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum SearchIntent {
//!     Search,
//!     Loaded(Vec<String>),
//! }
//!
//! impl Reducer for SearchReducer {
//!     type State = SearchState;
//!     type Intent = SearchIntent;
//!     type SideEffect = SearchSideEffect;
//!     type Environment = SearchEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut SearchState,
//!         intent: SearchIntent,
//!         env: &SearchEnvironment,
//!     ) -> SmallVec<[Effect<SearchIntent, SearchSideEffect>; 4]> {
//!         // Business logic goes here
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions:
/// `(State, Intent, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
/// Asynchronous work (an entity-store query, for example) is never
/// performed inside `reduce`; it is described by the returned effects
/// and executed by the runtime, which feeds any result back into the
/// reducer as another intent.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Intent`: The intent type this reducer processes. Intents
    ///   unify user actions and effect-feedback results, so the full
    ///   state history of a feature is a fold of `reduce` over the
    ///   intent sequence.
    /// - `SideEffect`: One-shot instructions delivered to the view
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for MovieReducer {
    ///     type State = MovieState;
    ///     type Intent = MovieIntent;
    ///     type SideEffect = MovieSideEffect;
    ///     type Environment = MovieEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut MovieState,
    ///         intent: MovieIntent,
    ///         env: &MovieEnvironment,
    ///     ) -> SmallVec<[Effect<MovieIntent, MovieSideEffect>; 4]> {
    ///         match intent {
    ///             MovieIntent::SearchMovie => {
    ///                 state.is_loading = true;
    ///                 smallvec![Effect::future(/* query the store */)]
    ///             }
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The intent type this reducer processes
        type Intent;

        /// The side-effect type this reducer can emit to the view
        type SideEffect;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an intent into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the intent
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `intent`: The intent to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// A list of effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            intent: Self::Intent,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Intent, Self::SideEffect>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are returned from reducers.
///
/// Two kinds of effect exist in this architecture and they are
/// deliberately distinct:
///
/// - [`Effect::Emit`] delivers a one-shot instruction to the view.
///   Emissions are consumed at most once per subscriber and are never
///   re-delivered on re-subscription, so they cannot be derived by
///   replaying state transitions.
/// - [`Effect::Future`] suspends on asynchronous work and optionally
///   feeds an intent back into the reducer when it completes.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of
    /// what should happen, returned from reducers and executed by the
    /// Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Intent`: The intent type that effects can produce (feedback loop)
    /// - `SideEffect`: The one-shot instruction type delivered to the view
    pub enum Effect<Intent, SideEffect> {
        /// No-op effect
        None,

        /// Deliver a one-shot side effect to every current subscriber
        Emit(SideEffect),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Intent>` - if `Some`, the intent is fed back
        /// into the reducer ahead of any queued user intent.
        Future(Pin<Box<dyn Future<Output = Option<Intent>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Intent, SideEffect> std::fmt::Debug for Effect<Intent, SideEffect>
    where
        SideEffect: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Emit(side_effect) => {
                    f.debug_tuple("Effect::Emit").field(side_effect).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Intent, SideEffect> Effect<Intent, SideEffect> {
        /// Box an async computation into an [`Effect::Future`]
        ///
        /// # Example
        ///
        /// ```ignore
        /// Effect::future(async move {
        ///     match repository.list().await {
        ///         Ok(movies) => Some(MovieIntent::SearchSucceeded(movies)),
        ///         Err(error) => Some(MovieIntent::SearchFailed(error.to_string())),
        ///     }
        /// })
        /// ```
        pub fn future<Fut>(future: Fut) -> Self
        where
            Fut: Future<Output = Option<Intent>> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter, never reached through global state.
/// Feature crates define their own environment structs; this module
/// holds the capability traits shared across features.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Production code uses [`SystemClock`]; tests use a fixed clock
    /// so time-dependent behavior is deterministic.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// System clock - uses the real wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};
    use super::reducer::Reducer;
    use smallvec::{SmallVec, smallvec};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct TallyState {
        total: u32,
    }

    #[derive(Debug, Clone)]
    enum TallyIntent {
        Add(u32),
        Announce,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TallySideEffect {
        Announced(u32),
    }

    struct TallyReducer;

    impl Reducer for TallyReducer {
        type State = TallyState;
        type Intent = TallyIntent;
        type SideEffect = TallySideEffect;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            intent: Self::Intent,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Intent, Self::SideEffect>; 4]> {
            match intent {
                TallyIntent::Add(n) => {
                    state.total += n;
                    smallvec![Effect::None]
                },
                TallyIntent::Announce => {
                    smallvec![Effect::Emit(TallySideEffect::Announced(state.total))]
                },
            }
        }
    }

    #[test]
    fn reduce_mutates_state_in_place() {
        let mut state = TallyState::default();
        let effects = TallyReducer.reduce(&mut state, TallyIntent::Add(3), &());

        assert_eq!(state.total, 3);
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::None));
    }

    #[test]
    fn emit_carries_side_effect_payload() {
        let mut state = TallyState { total: 7 };
        let effects = TallyReducer.reduce(&mut state, TallyIntent::Announce, &());

        assert_eq!(state.total, 7);
        assert!(matches!(
            effects[0],
            Effect::Emit(TallySideEffect::Announced(7))
        ));
    }

    #[tokio::test]
    async fn future_effect_feeds_an_intent_back() {
        let effect: Effect<TallyIntent, TallySideEffect> =
            Effect::future(async { Some(TallyIntent::Add(1)) });

        let Effect::Future(fut) = effect else {
            unreachable!("constructor returns the Future variant");
        };
        assert!(matches!(fut.await, Some(TallyIntent::Add(1))));
    }

    #[test]
    fn debug_formats_without_inspecting_futures() {
        let effect: Effect<TallyIntent, TallySideEffect> = Effect::future(async { None });
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }

    #[test]
    fn system_clock_is_monotonic_enough_for_logging() {
        let clock = SystemClock;
        let earlier = clock.now();
        assert!(clock.now() >= earlier);
    }
}
