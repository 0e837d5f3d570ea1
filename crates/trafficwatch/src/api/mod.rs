//! HTTP API.
//!
//! An axum router over a single shared [`Storage`]. Handlers hand their
//! storage work to the blocking pool via [`AppState::run`]; the storage lock
//! is only held inside that closure and never across an `.await`.

mod cars;
pub mod error;
mod extract;
mod observations;
mod readings;
mod segments;
mod sensors;
mod thresholds;
mod upload;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use chrono::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::ApiKey;
use crate::error::{Error, Result};
use crate::query::DEFAULT_WINDOW;
use crate::storage::Storage;

/// Largest accepted CSV upload.
const UPLOAD_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Default page size for list endpoints over append-only logs.
const DEFAULT_LIST_LIMIT: usize = 100;

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    storage: Arc<Mutex<Storage>>,
    api_key: Option<Arc<ApiKey>>,
    window: Duration,
}

impl AppState {
    /// Create state over an open storage.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            api_key: None,
            window: DEFAULT_WINDOW,
        }
    }

    /// Accept observation ingestion from sensors presenting `key`.
    #[must_use]
    pub fn with_api_key(mut self, key: Option<ApiKey>) -> Self {
        self.api_key = key.map(Arc::new);
        self
    }

    /// Set the default recent-observations window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub(crate) fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_deref()
    }

    pub(crate) fn window(&self) -> Duration {
        self.window
    }

    /// Run storage work on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`, or an internal error if the task
    /// panics. A panic does not disable later calls.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || {
            // A panic in earlier work rolled back its transaction on unwind
            let guard = storage.lock().unwrap_or_else(PoisonError::into_inner);
            f(&guard)
        })
        .await
        .map_err(|e| Error::internal(format!("storage task failed: {e}")))?
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/road-segments",
            get(segments::list).post(segments::create),
        )
        .route(
            "/api/road-segments/{id}",
            get(segments::detail)
                .put(segments::update)
                .delete(segments::remove),
        )
        .route(
            "/api/speed-readings",
            get(readings::list).post(readings::create),
        )
        .route(
            "/api/speed-readings/{id}",
            get(readings::detail).delete(readings::remove),
        )
        .route(
            "/api/thresholds",
            get(thresholds::list).post(thresholds::create),
        )
        .route("/api/thresholds/current", get(thresholds::current))
        .route(
            "/api/thresholds/{id}",
            get(thresholds::detail)
                .put(thresholds::update)
                .delete(thresholds::remove),
        )
        .route("/api/sensors", get(sensors::list).post(sensors::create))
        .route(
            "/api/sensors/{id}",
            get(sensors::detail)
                .put(sensors::update)
                .delete(sensors::remove),
        )
        .route("/api/cars", get(cars::list))
        .route("/api/cars/recent-observations", get(cars::recent_observations))
        .route("/api/cars/{id}", get(cars::detail).delete(cars::remove))
        .route(
            "/api/traffic-observations",
            get(observations::list).post(observations::create),
        )
        .route("/api/traffic-observations/{id}", get(observations::detail))
        .route(
            "/api/upload-csv",
            post(upload::upload_csv).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> Error {
    Error::not_found("resource", "at this path")
}

/// Serve the API until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_survives_panicking_work() {
        let state = AppState::new(Storage::open_in_memory().unwrap());

        let failed = state
            .run(|_| -> Result<()> { panic!("storage work blew up") })
            .await;
        assert!(matches!(failed, Err(Error::Internal(_))));

        let stats = state.run(Storage::stats).await.unwrap();
        assert_eq!(stats.road_segments, 0);
    }

    #[test]
    fn test_default_window() {
        let state = AppState::new(Storage::open_in_memory().unwrap());
        assert_eq!(state.window(), DEFAULT_WINDOW);
        assert_eq!(
            state.with_window(Duration::hours(6)).window(),
            Duration::hours(6)
        );
    }
}
