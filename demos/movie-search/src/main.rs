//! Movie search demo binary
//!
//! Wires the movie reducer into a store and walks through the feature:
//! a successful search, an empty catalog, an unreachable repository,
//! and a navigation side effect.

use intent_flow_runtime::Store;
use movie_search::{
    InMemoryMovieRepository, MovieEnvironment, MovieIntent, MovieReducer, MovieState,
    UnavailableMovieRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SETTLE: Duration = Duration::from_secs(1);

fn print_state(label: &str, state: &MovieState) {
    println!("--- {label} ---");
    println!("  loading: {}", state.is_loading);
    match &state.error_message {
        Some(message) => println!("  error:   {message}"),
        None => println!("  error:   (none)"),
    }
    for movie in &state.movies {
        println!("  movie:   {}", movie.name);
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movie_search=debug,intent_flow_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // A store over the default five-movie catalog.
    let env = MovieEnvironment::new(
        Arc::new(InMemoryMovieRepository::default()),
        intent_flow_core::environment::SystemClock,
    );
    let store = Store::new(MovieState::default(), MovieReducer::new(), env);

    let mut side_effects = store.subscribe_side_effects();

    store.send(MovieIntent::SearchMovie)?;
    store.settled(SETTLE).await?;
    store.state(|state| print_state("after search", state));

    // Navigation arrives on the side-effect channel, not in state.
    store.send(MovieIntent::NavigateToActivity)?;
    store.settled(SETTLE).await?;
    if let Some(effect) = side_effects.recv().await {
        println!("side effect: {effect:?}\n");
    }

    // An empty catalog produces a not-found message and keeps nothing.
    let empty_env = MovieEnvironment::new(
        Arc::new(InMemoryMovieRepository::new(vec![])),
        intent_flow_core::environment::SystemClock,
    );
    let empty_store = Store::new(MovieState::default(), MovieReducer::new(), empty_env);
    empty_store.send(MovieIntent::SearchMovie)?;
    empty_store.settled(SETTLE).await?;
    empty_store.state(|state| print_state("empty catalog", state));

    // An unreachable repository surfaces its error instead of hanging.
    let failing_env = MovieEnvironment::new(
        Arc::new(UnavailableMovieRepository),
        intent_flow_core::environment::SystemClock,
    );
    let failing_store = Store::new(MovieState::default(), MovieReducer::new(), failing_env);
    failing_store.send(MovieIntent::SearchMovie)?;
    failing_store.settled(SETTLE).await?;
    failing_store.state(|state| print_state("unavailable source", state));

    store.shutdown(SETTLE).await?;
    empty_store.shutdown(SETTLE).await?;
    failing_store.shutdown(SETTLE).await?;

    Ok(())
}
