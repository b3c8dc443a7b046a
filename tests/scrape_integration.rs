//! End-to-end scrape tests against SQLite databases on disk
//!
//! Config file -> connection registry -> exporter service -> HTTP router.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use sql_metric_exporter::adapters::inbound::{HttpServer, EXPOSITION_CONTENT_TYPE};
use sql_metric_exporter::adapters::outbound::{ConnectionRegistry, DashMapMeasurementStore};
use sql_metric_exporter::application::{ExporterService, QueryExecutor};
use sql_metric_exporter::config::{load_config_file, Config};
use sql_metric_exporter::domain::ports::SystemClock;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn create_shop_db(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE orders (region TEXT, status TEXT);
         INSERT INTO orders VALUES ('eu', 'paid');
         INSERT INTO orders VALUES ('eu', 'paid');
         INSERT INTO orders VALUES ('us', 'open');
         INSERT INTO orders VALUES (NULL, 'open');",
    )
    .unwrap();
}

fn write_config(dir: &TempDir, db_path: &Path, ttl: &str) -> std::path::PathBuf {
    let config = format!(
        r#"
listen = "127.0.0.1:0"
query_timeout_secs = 5

[databases.shop]
driver = "sqlite"
path = {db:?}

[metrics.orders_by_region]
db = "shop"
sql = "SELECT region, COUNT(*) FROM orders GROUP BY region ORDER BY region"
ttl = "{ttl}"
kind = "grouped"

[metrics.orders_total]
db = "shop"
sql = "SELECT COUNT(*) FROM orders"
ttl = "{ttl}"
"#,
        db = db_path.to_str().unwrap(),
        ttl = ttl,
    );
    let path = dir.path().join("config.toml");
    std::fs::write(&path, config).unwrap();
    path
}

async fn build_server(cfg: &Config) -> HttpServer {
    let registry = ConnectionRegistry::connect(&cfg.databases).await.unwrap();
    let service = ExporterService::new(
        cfg.metric_definitions().unwrap(),
        &registry,
        Arc::new(DashMapMeasurementStore::new()),
        Arc::new(SystemClock),
        QueryExecutor::new(cfg.query_timeout()),
    )
    .unwrap();
    HttpServer::new(Arc::new(service), cfg.listen_addr())
}

async fn scrape(server: &HttpServer) -> (StatusCode, String) {
    let response = server
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        EXPOSITION_CONTENT_TYPE
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_scrape_grouped_and_scalar() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("shop.db");
    create_shop_db(&db);
    let cfg = load_config_file(&write_config(&dir, &db, "60")).unwrap();
    let server = build_server(&cfg).await;

    let (status, body) = scrape(&server).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "# TYPE orders_by_region gauge\n\
         orders_by_region{region=\"\\N\",database=\"shop\"} 1\n\
         orders_by_region{region=\"eu\",database=\"shop\"} 2\n\
         orders_by_region{region=\"us\",database=\"shop\"} 1\n\
         # TYPE orders_total gauge\n\
         orders_total{database=\"shop\"} 4\n"
    );
}

#[tokio::test]
async fn test_cached_value_served_within_ttl() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("shop.db");
    create_shop_db(&db);
    let cfg = load_config_file(&write_config(&dir, &db, "3600")).unwrap();
    let server = build_server(&cfg).await;

    let (_, first) = scrape(&server).await;

    let writer = rusqlite::Connection::open(&db).unwrap();
    writer
        .execute("INSERT INTO orders VALUES ('eu', 'paid')", [])
        .unwrap();

    let (_, second) = scrape(&server).await;
    assert_eq!(first, second);
    assert!(second.contains("orders_total{database=\"shop\"} 4\n"));
}

#[tokio::test]
async fn test_zero_ttl_recomputes_and_drops_vanished_rows() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("shop.db");
    create_shop_db(&db);
    let cfg = load_config_file(&write_config(&dir, &db, "0")).unwrap();
    let server = build_server(&cfg).await;

    let (_, first) = scrape(&server).await;
    assert!(first.contains("region=\"us\""));

    let writer = rusqlite::Connection::open(&db).unwrap();
    writer
        .execute("DELETE FROM orders WHERE region = 'us'", [])
        .unwrap();

    let (_, second) = scrape(&server).await;
    assert!(!second.contains("region=\"us\""));
    assert!(second.contains("orders_by_region{region=\"eu\",database=\"shop\"} 2\n"));
    assert!(second.contains("orders_total{database=\"shop\"} 3\n"));
}

#[tokio::test]
async fn test_failing_metric_keeps_placeholder_and_others_render() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("shop.db");
    create_shop_db(&db);
    let config = format!(
        r#"
[databases.shop]
driver = "sqlite"
path = {db:?}

[metrics.broken]
db = "shop"
sql = "SELECT COUNT(*) FROM missing_table"
ttl = "60"

[metrics.orders_total]
db = "shop"
sql = "SELECT COUNT(*) FROM orders"
ttl = "60"
"#,
        db = db.to_str().unwrap(),
    );
    let cfg = Config::from_toml_str(&config).unwrap();
    let server = build_server(&cfg).await;

    let (status, body) = scrape(&server).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "# TYPE broken gauge\n\
         broken{database=\"shop\"} 0\n\
         # TYPE orders_total gauge\n\
         orders_total{database=\"shop\"} 4\n"
    );
}

#[tokio::test]
async fn test_concurrent_scrapes_agree() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("shop.db");
    create_shop_db(&db);
    let cfg = load_config_file(&write_config(&dir, &db, "60")).unwrap();
    let server = Arc::new(build_server(&cfg).await);

    let scrapes = (0..8).map(|_| {
        let server = server.clone();
        async move { scrape(&server).await.1 }
    });
    let bodies = futures::future::join_all(scrapes).await;

    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    assert!(bodies[0].contains("orders_total{database=\"shop\"} 4\n"));
}

#[tokio::test]
async fn test_registry_rejects_unopenable_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("missing-dir").join("shop.db");
    let config = format!(
        r#"
[databases.shop]
driver = "sqlite"
path = {db:?}
"#,
        db = db.to_str().unwrap(),
    );
    let cfg = Config::from_toml_str(&config).unwrap();
    let err = ConnectionRegistry::connect(&cfg.databases).await.err().unwrap();
    assert!(format!("{:#}", err).contains("shop"));
}

#[tokio::test]
async fn test_empty_config_scrapes_empty_body() {
    let cfg = Config::from_toml_str("").unwrap();
    let server = build_server(&cfg).await;
    let (status, body) = scrape(&server).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_label_values_cannot_break_lines() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("shop.db");
    create_shop_db(&db);
    let config = format!(
        r#"
[databases.shop]
driver = "sqlite"
path = {db:?}

[metrics.paths]
db = "shop"
sql = '''SELECT 'C:\' AS path, NULL AS zone, 'primary' AS "database", 7'''
ttl = "60"
kind = "grouped"
"#,
        db = db.to_str().unwrap(),
    );
    let cfg = Config::from_toml_str(&config).unwrap();
    let server = build_server(&cfg).await;

    let (_, body) = scrape(&server).await;
    assert_eq!(
        body,
        "# TYPE paths gauge\n\
         paths{path=\"C:\\\\\",zone=\"\\N\",exported_database=\"primary\",database=\"shop\"} 7\n"
    );
}
