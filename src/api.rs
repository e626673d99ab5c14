//! HTTP routes for the climate query service.
//!
//! | Route                      | Handler         |
//! |----------------------------|-----------------|
//! | `/`                        | `index`         |
//! | `/api/v1.0/precipitation`  | `precipitation` |
//! | `/api/v1.0/stations`       | `stations`      |
//! | `/api/v1.0/tobs`           | `tobs`          |
//! | `/api/v1.0/{start}`        | `range_from`    |
//! | `/api/v1.0/{start}/{end}`  | `range_between` |
//!
//! Store reads are blocking, so every handler runs its query on the
//! blocking thread pool.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::climate;
use crate::logging::log_store_failure;
use crate::model::{DATE_FORMAT_ERROR, DateSeries, StoreError, TemperatureStats, parse_date};
use crate::store::ClimateStore;

const INDEX_HTML: &str = "Welcome to the Hawaii Climate API!<br/>\
Available Routes:<br/>\
/api/v1.0/precipitation<br/>\
/api/v1.0/stations<br/>\
/api/v1.0/tobs<br/>\
/api/v1.0/&lt;start&gt; (start=YYYY-MM-DD)<br/>\
/api/v1.0/&lt;start&gt;/&lt;end&gt; (start, end=YYYY-MM-DD)<br/>";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared application state. Cloned per request; the store itself is shared.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ClimateStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ClimateStore>) -> Self {
        Self { store }
    }

    /// Runs `query` against the store on the blocking pool.
    async fn read<T, F>(&self, operation: &'static str, query: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ClimateStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || query(store.as_ref()))
            .await
            .map_err(|e| {
                tracing::error!(operation, error = %e, "store task did not complete");
                ApiError::Internal(e.to_string())
            })?
            .map_err(|e| {
                log_store_failure(operation, &e);
                ApiError::Store(e)
            })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Date format must be YYYY-MM-DD")]
    InvalidDate,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidDate => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::Query(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::InvalidDate => DATE_FORMAT_ERROR.to_string(),
            ApiError::Store(StoreError::Unavailable(_)) => "Data store unavailable".to_string(),
            ApiError::Store(StoreError::Query(_)) | ApiError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn precipitation(State(state): State<AppState>) -> Result<Json<DateSeries>, ApiError> {
    tracing::debug!("GET /api/v1.0/precipitation");
    let series = state
        .read("precipitation", climate::last_year_precipitation)
        .await?;
    Ok(Json(series))
}

pub async fn stations(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    tracing::debug!("GET /api/v1.0/stations");
    let ids = state.read("stations", climate::station_ids).await?;
    Ok(Json(ids))
}

pub async fn tobs(State(state): State<AppState>) -> Result<Json<DateSeries>, ApiError> {
    tracing::debug!("GET /api/v1.0/tobs");
    let series = state
        .read("tobs", climate::most_active_station_tobs)
        .await?;
    Ok(Json(series))
}

pub async fn range_from(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<TemperatureStats>, ApiError> {
    let Path(start) = path.map_err(undecodable_date)?;
    temperature_range(state, &start, None).await
}

pub async fn range_between(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<TemperatureStats>, ApiError> {
    let Path((start, end)) = path.map_err(undecodable_date)?;
    temperature_range(state, &start, Some(&end)).await
}

/// A date segment that does not percent-decode to UTF-8 is still a bad date.
fn undecodable_date(rejection: PathRejection) -> ApiError {
    tracing::debug!(error = %rejection, "undecodable date segment");
    ApiError::InvalidDate
}

/// Shared by the one- and two-segment range routes. Both dates are parsed
/// before any query is issued.
async fn temperature_range(
    state: AppState,
    start: &str,
    end: Option<&str>,
) -> Result<Json<TemperatureStats>, ApiError> {
    tracing::debug!(start, end, "GET temperature range");

    let start = parse_date(start).ok_or(ApiError::InvalidDate)?;
    let end = end
        .map(|raw| parse_date(raw).ok_or(ApiError::InvalidDate))
        .transpose()?;

    let stats = state
        .read("temperature_range", move |store| {
            climate::temperature_range(store, start, end)
        })
        .await?;
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// Router and server
// ---------------------------------------------------------------------------

/// Build the HTTP router. Static segments take precedence over the
/// `{start}` capture, so `/api/v1.0/tobs` never reaches the range handler.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/v1.0/precipitation", get(precipitation))
        .route("/api/v1.0/stations", get(stations))
        .route("/api/v1.0/tobs", get(tobs))
        .route("/api/v1.0/{start}", get(range_from))
        .route("/api/v1.0/{start}/{end}", get(range_between))
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve<S>(listener: TcpListener, state: AppState, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "climate service listening");
    }
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::{Days, NaiveDate};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::model::{Measurement, Station};
    use crate::store::MemoryStore;

    /// A store whose every read fails with `err`.
    struct FailingStore(StoreError);

    impl ClimateStore for FailingStore {
        fn latest_date(&self, _: Option<&str>) -> Result<Option<NaiveDate>, StoreError> {
            Err(self.0.clone())
        }
        fn precipitation_since(
            &self,
            _: NaiveDate,
        ) -> Result<Vec<(NaiveDate, Option<f64>)>, StoreError> {
            Err(self.0.clone())
        }
        fn station_ids(&self) -> Result<Vec<String>, StoreError> {
            Err(self.0.clone())
        }
        fn most_active_station(&self) -> Result<Option<String>, StoreError> {
            Err(self.0.clone())
        }
        fn tobs_since(&self, _: &str, _: NaiveDate) -> Result<Vec<(NaiveDate, f64)>, StoreError> {
            Err(self.0.clone())
        }
        fn temperature_stats(
            &self,
            _: NaiveDate,
            _: Option<NaiveDate>,
        ) -> Result<TemperatureStats, StoreError> {
            Err(self.0.clone())
        }
    }

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    /// USC1: 2017-08-01..=2017-08-23, tobs 70..=92, prcp 0.0 / null alternating.
    /// USC2: two readings a year earlier.
    fn sample_store() -> MemoryStore {
        let start = date("2017-08-01");
        let mut measurements: Vec<Measurement> = (0..23u64)
            .map(|i| Measurement {
                station: "USC1".to_string(),
                date: start + Days::new(i),
                prcp: (i % 2 == 0).then_some(0.0),
                tobs: 70.0 + i as f64,
            })
            .collect();
        for day in ["2016-08-01", "2016-08-23"] {
            measurements.push(Measurement {
                station: "USC2".to_string(),
                date: date(day),
                prcp: Some(1.5),
                tobs: 60.0,
            });
        }
        let stations = ["USC2", "USC1", "USC3"]
            .iter()
            .map(|id| Station {
                station: id.to_string(),
                name: None,
            })
            .collect();
        MemoryStore::new(stations, measurements)
    }

    fn router_with(store: impl ClimateStore + 'static) -> Router {
        build_router(AppState::new(Arc::new(store)))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_index_lists_routes() {
        let response = router_with(MemoryStore::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        for route in ["/api/v1.0/precipitation", "/api/v1.0/stations", "/api/v1.0/tobs"] {
            assert!(text.contains(route), "index missing {route}");
        }
    }

    #[tokio::test]
    async fn test_range_between_scenario() {
        let (status, body) =
            get_json(router_with(sample_store()), "/api/v1.0/2017-08-01/2017-08-23").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"TMIN": 70.0, "TAVG": 81.0, "TMAX": 92.0}));
    }

    #[tokio::test]
    async fn test_range_from_is_ordered() {
        let (status, body) = get_json(router_with(sample_store()), "/api/v1.0/2016-01-01").await;
        assert_eq!(status, StatusCode::OK);
        let min = body["TMIN"].as_f64().unwrap();
        let avg = body["TAVG"].as_f64().unwrap();
        let max = body["TMAX"].as_f64().unwrap();
        assert!(min <= avg && avg <= max);
        assert_eq!(min, 60.0);
        assert_eq!(max, 92.0);
    }

    #[tokio::test]
    async fn test_reversed_range_is_all_null() {
        let (status, body) =
            get_json(router_with(sample_store()), "/api/v1.0/2017-08-23/2017-08-01").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"TMIN": null, "TAVG": null, "TMAX": null}));
    }

    #[tokio::test]
    async fn test_bad_dates_are_rejected() {
        for uri in [
            "/api/v1.0/2020-13-01",
            "/api/v1.0/notadate",
            "/api/v1.0/notadate/2017-08-23",
            "/api/v1.0/2017-08-01/2020-13-01",
            "/api/v1.0/+2017-08-01",
            "/api/v1.0/%202017-08-01",
            "/api/v1.0/2017-8-1",
            "/api/v1.0/2017-08-01/2017-8-23",
            "/api/v1.0/%FF",
            "/api/v1.0/%FF/2017-08-23",
            "/api/v1.0/2017-08-01/%FF",
        ] {
            let (status, body) = get_json(router_with(sample_store()), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, json!({"error": "Date format must be YYYY-MM-DD"}), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_bad_date_issues_no_query() {
        // A failing store would turn any query into a 503.
        let store = FailingStore(StoreError::Unavailable("down".into()));
        let (status, _) = get_json(router_with(store), "/api/v1.0/notadate").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stations_sorted() {
        let (status, body) = get_json(router_with(sample_store()), "/api/v1.0/stations").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["USC1", "USC2", "USC3"]));
    }

    #[tokio::test]
    async fn test_precipitation_last_year_only() {
        let (status, body) =
            get_json(router_with(sample_store()), "/api/v1.0/precipitation").await;
        assert_eq!(status, StatusCode::OK);

        let map = body.as_object().unwrap();
        // 23 USC1 days plus USC2's 2016-08-23; 2016-08-01 is outside the window.
        assert_eq!(map.len(), 24);
        assert_eq!(map["2016-08-23"], json!(1.5));
        assert_eq!(map["2017-08-01"], json!(0.0));
        assert_eq!(map["2017-08-02"], Value::Null);
        assert!(!map.contains_key("2016-08-01"));
    }

    #[tokio::test]
    async fn test_tobs_most_active_station() {
        let (status, body) = get_json(router_with(sample_store()), "/api/v1.0/tobs").await;
        assert_eq!(status, StatusCode::OK);

        let map = body.as_object().unwrap();
        assert_eq!(map.len(), 23);
        assert_eq!(map["2017-08-23"], json!(92.0));
        assert!(!map.contains_key("2016-08-23"));
    }

    #[tokio::test]
    async fn test_empty_store() {
        for uri in ["/api/v1.0/precipitation", "/api/v1.0/tobs"] {
            let (status, body) = get_json(router_with(MemoryStore::default()), uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({}));
        }
        let (_, body) = get_json(router_with(MemoryStore::default()), "/api/v1.0/stations").await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_store_unavailable_is_503() {
        let store = FailingStore(StoreError::Unavailable("pool timed out".into()));
        let (status, body) = get_json(router_with(store), "/api/v1.0/stations").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({"error": "Data store unavailable"}));
    }

    #[tokio::test]
    async fn test_query_failure_is_500() {
        let store = FailingStore(StoreError::Query("relation \"measurement\" does not exist".into()));
        let (status, body) = get_json(router_with(store), "/api/v1.0/2017-08-01").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = router_with(MemoryStore::default())
            .oneshot(
                Request::builder()
                    .uri("/api/v1.0/2017-01-01/2017-02-01/extra")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
