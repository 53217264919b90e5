//! # Movie Search Example
//!
//! A single-screen movie search feature demonstrating the Intent Flow
//! architecture end to end.
//!
//! This example showcases:
//! - A closed intent set (user actions plus effect feedback)
//! - A reducer that drives a loading/result/error state machine
//! - A one-shot navigation side effect, kept apart from state
//! - A repository contract behind the environment, with a fast
//!   in-memory implementation and a failing one
//!
//! ## Architecture
//!
//! The view submits [`MovieIntent`] values; the store reduces them into
//! [`MovieState`] snapshots the view renders. Searching suspends on the
//! injected [`MovieRepository`]; its answer re-enters the reducer as a
//! feedback intent, so state is only ever written by the reducer. A
//! repository failure surfaces as `error_message` rather than being
//! dropped, so the screen can never hang in a loading state.
//!
//! ## Example
//!
//! ```no_run
//! use movie_search::{
//!     InMemoryMovieRepository, MovieEnvironment, MovieIntent, MovieReducer, MovieState,
//! };
//! use intent_flow_runtime::Store;
//! use intent_flow_testing::test_clock;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let env = MovieEnvironment::new(Arc::new(InMemoryMovieRepository::default()), test_clock());
//! let store = Store::new(MovieState::default(), MovieReducer::new(), env);
//!
//! store.send(MovieIntent::SearchMovie).unwrap();
//! store.settled(std::time::Duration::from_secs(1)).await.unwrap();
//! let names = store.state(|s| s.movies.len());
//! assert_eq!(names, 5);
//! # }
//! ```

use intent_flow_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec};
use intent_flow_runtime::Store;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Error message shown when a search returns no entities
pub const NO_MOVIE_FOUND: &str = "couldn't find the movie";

/// Navigation destination emitted by [`MovieIntent::NavigateToActivity`]
pub const DETAIL_SCREEN: &str = "movie_detail";

/// A movie record
///
/// Identity is positional; ordering is insertion order from the
/// repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieEntity {
    /// Display name
    pub name: String,
}

impl MovieEntity {
    /// Create a new movie entity with the given display name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// The immutable snapshot the screen renders
///
/// Exactly one of "loading" or a terminal result (movies, an error
/// message, or both empty at rest) holds at any observed instant; the
/// reducer never leaves `is_loading` set permanently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieState {
    /// Movies from the last successful search
    pub movies: Vec<MovieEntity>,
    /// Whether a search is in flight
    pub is_loading: bool,
    /// Message for the last empty result or repository failure
    pub error_message: Option<String>,
}

/// Movie intents
///
/// The first two are user actions submitted by the view; the last two
/// are effect feedback produced when the repository query completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovieIntent {
    /// User pressed the search button
    SearchMovie,
    /// User asked to open the detail screen
    NavigateToActivity,
    /// The repository answered a search
    SearchSucceeded(Vec<MovieEntity>),
    /// The repository was unavailable
    SearchFailed(String),
}

/// One-shot instructions to the view
///
/// Delivered at most once per subscriber and never re-delivered on
/// re-subscription, so a re-rendering screen cannot navigate twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovieSideEffect {
    /// Navigate to the named destination
    NavigateTo(String),
}

/// Boxed future returned by [`MovieRepository::list`]
pub type MovieListFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<MovieEntity>, RepositoryError>> + Send + 'a>>;

/// Errors from the movie source
#[derive(Error, Debug, Clone)]
pub enum RepositoryError {
    /// The underlying source could not be reached
    #[error("movie source unavailable: {0}")]
    Unavailable(String),
}

/// Movie repository abstraction (the entity store)
///
/// The reducer only ever sees this contract, so the screen works the
/// same against a fast in-memory catalog or a real failable source.
///
/// # Dyn Compatibility
///
/// Uses an explicit boxed-future return instead of `async fn` so the
/// repository can live behind `Arc<dyn MovieRepository>` inside the
/// environment and be captured by effects.
pub trait MovieRepository: Send + Sync {
    /// Fetch the full movie list
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Unavailable`] when the underlying
    /// source cannot be reached. An empty list is not an error at this
    /// level; the reducer turns it into an error message.
    fn list(&self) -> MovieListFuture<'_>;
}

/// In-memory movie repository
///
/// The default catalog holds five entities named `가0` through `가4`.
/// Any fixture list can be supplied through [`InMemoryMovieRepository::new`].
#[derive(Debug, Clone)]
pub struct InMemoryMovieRepository {
    movies: Vec<MovieEntity>,
}

impl InMemoryMovieRepository {
    /// Create a repository serving the given movie list
    #[must_use]
    pub const fn new(movies: Vec<MovieEntity>) -> Self {
        Self { movies }
    }
}

impl Default for InMemoryMovieRepository {
    fn default() -> Self {
        Self::new((0..5).map(|i| MovieEntity::new(format!("가{i}"))).collect())
    }
}

impl MovieRepository for InMemoryMovieRepository {
    fn list(&self) -> MovieListFuture<'_> {
        let movies = self.movies.clone();
        Box::pin(async move { Ok(movies) })
    }
}

/// Repository whose source is always unreachable
///
/// Exercises the failure path: the reducer must surface the error into
/// state instead of leaving the screen loading forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableMovieRepository;

impl MovieRepository for UnavailableMovieRepository {
    fn list(&self) -> MovieListFuture<'_> {
        Box::pin(async {
            Err(RepositoryError::Unavailable(
                "movie source is offline".to_string(),
            ))
        })
    }
}

/// Movie environment
///
/// Dependencies are injected here via constructor rather than global
/// state: the repository behind its trait object, and a clock used for
/// request logging.
#[derive(Clone)]
pub struct MovieEnvironment<C: Clock> {
    /// Movie source queried by search effects
    pub repository: Arc<dyn MovieRepository>,
    /// Clock for time-based logging
    pub clock: C,
}

impl<C: Clock> MovieEnvironment<C> {
    /// Create a new movie environment
    #[must_use]
    pub fn new(repository: Arc<dyn MovieRepository>, clock: C) -> Self {
        Self { repository, clock }
    }
}

/// Movie reducer
///
/// Implements the screen's state machine. Searching is a two-step
/// transition: the synchronous portion flips `is_loading` on and
/// clears the error before the repository is queried; the feedback
/// intent carries the terminal result.
///
/// Generic over the Clock type `C` to work with any clock implementation.
#[derive(Debug, Clone, Copy)]
pub struct MovieReducer<C> {
    _phantom: std::marker::PhantomData<C>,
}

impl<C> MovieReducer<C> {
    /// Create a new movie reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<C> Default for MovieReducer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Reducer for MovieReducer<C> {
    type State = MovieState;
    type Intent = MovieIntent;
    type SideEffect = MovieSideEffect;
    type Environment = MovieEnvironment<C>;

    fn reduce(
        &self,
        state: &mut Self::State,
        intent: Self::Intent,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Intent, Self::SideEffect>; 4]> {
        match intent {
            MovieIntent::SearchMovie => {
                state.is_loading = true;
                state.error_message = None;
                tracing::debug!(requested_at = %env.clock.now(), "Movie search requested");

                let repository = Arc::clone(&env.repository);
                smallvec![Effect::future(async move {
                    match repository.list().await {
                        Ok(movies) => Some(MovieIntent::SearchSucceeded(movies)),
                        Err(error) => {
                            tracing::warn!(error = %error, "Movie search failed");
                            Some(MovieIntent::SearchFailed(error.to_string()))
                        },
                    }
                })]
            },
            MovieIntent::SearchSucceeded(movies) => {
                state.is_loading = false;
                if movies.is_empty() {
                    // An empty result only flips the flags; movies keep
                    // their last known value.
                    state.error_message = Some(NO_MOVIE_FOUND.to_string());
                } else {
                    state.movies = movies;
                    state.error_message = None;
                }
                smallvec![Effect::None]
            },
            MovieIntent::SearchFailed(message) => {
                state.is_loading = false;
                state.error_message = Some(message);
                smallvec![Effect::None]
            },
            MovieIntent::NavigateToActivity => {
                smallvec![Effect::Emit(MovieSideEffect::NavigateTo(
                    DETAIL_SCREEN.to_string()
                ))]
            },
        }
    }
}

/// The fully wired store type for this feature
pub type MovieStore = Store<MovieState, MovieIntent, MovieSideEffect>;
