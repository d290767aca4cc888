//! Prometheus metrics for HTTP requests and store calls.
//!
//! Recording only observes: request outcomes are never changed by it.

use std::{future::Future, sync::Arc, time::Instant};

use async_trait::async_trait;
use axum::{
    extract::{MatchedPath, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use todo_api::v1::ToDoItem;
use tracing::error;

use crate::persistence::{PagingOptions, StoreError, ToDoStore};

/// Metric families, registered with a registry owned by this value.
///
/// - `todo_http_requests_total{method, route, status}`
/// - `todo_http_request_duration_seconds{method, route}`
/// - `todo_store_operations_total{operation, outcome}`
/// - `todo_store_operation_duration_seconds{operation}`
pub struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    store_operations_total: IntCounterVec,
    store_operation_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("todo_http_requests_total", "HTTP requests by route and status"),
            &["method", "route", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "todo_http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["method", "route"],
        )?;
        let store_operations_total = IntCounterVec::new(
            Opts::new("todo_store_operations_total", "Store calls by outcome"),
            &["operation", "outcome"],
        )?;
        let store_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "todo_store_operation_duration_seconds",
                "Store call latency in seconds",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(store_operations_total.clone()))?;
        registry.register(Box::new(store_operation_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            store_operations_total,
            store_operation_duration_seconds,
        })
    }

    fn observe_request(&self, method: &str, route: &str, status: StatusCode, seconds: f64) {
        self.http_requests_total
            .with_label_values(&[method, route, status.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(seconds);
    }

    fn observe_store(&self, operation: &str, ok: bool, seconds: f64) {
        let outcome = if ok { "ok" } else { "error" };
        self.store_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.store_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(seconds);
    }
}

/// Serves the registry on `GET /metrics` and counts every request of
/// `router`.
pub fn instrument<S>(router: Router<S>, metrics: Arc<Metrics>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .route("/metrics", get(render).with_state(metrics.clone()))
        .layer(middleware::from_fn_with_state(metrics, track_requests))
}

async fn track_requests(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let start = Instant::now();
    let response = next.run(request).await;

    metrics.observe_request(
        method.as_str(),
        &route,
        response.status(),
        start.elapsed().as_secs_f64(),
    );

    response
}

async fn render(State(metrics): State<Arc<Metrics>>) -> Response {
    match TextEncoder::new().encode_to_string(&metrics.registry.gather()) {
        Ok(body) => ([(CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Times and counts every call into the wrapped store.
pub struct MeteredStore {
    inner: Arc<dyn ToDoStore>,
    metrics: Arc<Metrics>,
}

impl MeteredStore {
    pub fn new(inner: Arc<dyn ToDoStore>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }

    async fn observe<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let start = Instant::now();
        let result = call.await;

        self.metrics
            .observe_store(operation, result.is_ok(), start.elapsed().as_secs_f64());

        result
    }
}

#[async_trait]
impl ToDoStore for MeteredStore {
    async fn insert(&self, item: &ToDoItem) -> Result<u64, StoreError> {
        self.observe("insert", self.inner.insert(item)).await
    }

    async fn delete(&self, id: u64) -> Result<u64, StoreError> {
        self.observe("delete", self.inner.delete(id)).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.observe("count", self.inner.count()).await
    }

    async fn fetch_page(&self, options: PagingOptions) -> Result<Vec<ToDoItem>, StoreError> {
        self.observe("fetch_page", self.inner.fetch_page(options)).await
    }

    async fn fetch_one(&self, id: u64) -> Result<Option<ToDoItem>, StoreError> {
        self.observe("fetch_one", self.inner.fetch_one(id)).await
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        self.observe("migrate", self.inner.migrate()).await
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}
