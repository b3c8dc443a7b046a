//! Scrape HTTP Server
//!
//! Serves `GET /metrics` with the exposition of every configured metric.

use crate::application::ExporterService;
use crate::domain::value_objects::ListenAddr;
use crate::infrastructure::ShutdownController;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Content type of the text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// HTTP server for the scrape endpoint.
pub struct HttpServer {
    service: Arc<ExporterService>,
    listen_addr: ListenAddr,
}

impl HttpServer {
    pub fn new(service: Arc<ExporterService>, listen_addr: ListenAddr) -> Self {
        Self {
            service,
            listen_addr,
        }
    }

    /// Build the router. Other paths answer 404, other methods 405.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.service.clone())
    }

    /// Serve until `shutdown` fires, then drain in-flight scrapes.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self, shutdown: ShutdownController) -> anyhow::Result<()> {
        let bind_addr = self.listen_addr.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("serving /metrics on {}", bind_addr);

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: ShutdownController,
    ) -> anyhow::Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
        tracing::info!("http server stopped");
        Ok(())
    }
}

async fn metrics_handler(State(service): State<Arc<ExporterService>>) -> impl IntoResponse {
    let body = service.scrape().await;
    ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::{ConnectionRegistry, DashMapMeasurementStore};
    use crate::application::QueryExecutor;
    use crate::domain::entities::{MetricDefinition, QueryKind, RowSet};
    use crate::domain::ports::{QueryError, QuerySource, SystemClock};
    use crate::domain::value_objects::Ttl;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    // ===== Mock Implementations =====

    struct StaticSource {
        rows: Result<RowSet, QueryError>,
    }

    #[async_trait]
    impl QuerySource for StaticSource {
        async fn fetch(&self, _sql: &str) -> Result<RowSet, QueryError> {
            self.rows.clone()
        }

        async fn ping(&self) -> Result<(), QueryError> {
            Ok(())
        }

        fn driver(&self) -> &'static str {
            "static"
        }
    }

    fn metric(name: &str, db: &str, kind: QueryKind) -> MetricDefinition {
        MetricDefinition {
            name: name.to_string(),
            database: db.to_string(),
            sql: "SELECT 1".to_string(),
            ttl: Ttl::from_secs(60),
            kind,
        }
    }

    fn server() -> HttpServer {
        let mut registry = ConnectionRegistry::new();
        registry.insert(
            "shop",
            Arc::new(StaticSource {
                rows: Ok(RowSet::new(
                    vec!["region".to_string(), "n".to_string()],
                    vec![vec![Some("eu".to_string()), Some("3".to_string())]],
                )),
            }),
        );
        registry.insert(
            "broken",
            Arc::new(StaticSource {
                rows: Err(QueryError::Database("connection reset".to_string())),
            }),
        );

        let service = ExporterService::new(
            vec![
                metric("orders", "shop", QueryKind::Grouped),
                metric("failing", "broken", QueryKind::Scalar),
            ],
            &registry,
            Arc::new(DashMapMeasurementStore::new()),
            Arc::new(SystemClock),
            QueryExecutor::default(),
        )
        .unwrap();

        HttpServer::new(Arc::new(service), ListenAddr::new("127.0.0.1:0"))
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_ok_with_content_type() {
        let response = server()
            .router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            EXPOSITION_CONTENT_TYPE
        );
    }

    #[tokio::test]
    async fn test_metrics_body_degrades_per_metric() {
        let response = server()
            .router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_string(response).await;

        assert_eq!(
            body,
            "# TYPE failing gauge\n\
             failing{database=\"broken\"} 0\n\
             # TYPE orders gauge\n\
             orders{region=\"eu\",database=\"shop\"} 3\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = server()
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_is_405() {
        let response = server()
            .router()
            .oneshot(
                Request::post("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let server = server();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = ShutdownController::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.shutdown();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            server.serve(listener, shutdown),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
