use axum::{
    middleware as axum_mw,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::handlers;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes, middleware, and static serving.
pub fn create_router(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        // ── System metrics ──────────────────────────────────────
        .route(
            "/api/system/metrics/history",
            get(handlers::system::get_history).delete(handlers::system::clear_history),
        )
        .route(
            "/api/system/metrics/realtime",
            get(handlers::system::get_realtime),
        )
        // ── Network ─────────────────────────────────────────────
        .route(
            "/api/network/interfaces",
            get(handlers::network::get_interfaces),
        )
        .route(
            "/api/network/connections",
            get(handlers::network::get_connections),
        )
        .route("/api/health", get(handlers::system::health))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Serve the dashboard ─────────────────────────────────
        .fallback_service(ServeDir::new(static_dir))
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::StorageBackend;
    use crate::error::PulseError;
    use crate::metrics::{ConnectionChurnTracker, Sample};
    use crate::source::{
        Connection, ConnectionState, DiskSpace, HostCounters, HostInfo, MetricsSource,
        NetworkInterface, Protocol, SourceError,
    };
    use crate::store::{MemoryStore, SampleStore};

    const GIB: u64 = 1024 * 1024 * 1024;

    struct FakeSource {
        connections: Result<Vec<Connection>, SourceError>,
        interfaces: Result<Vec<NetworkInterface>, SourceError>,
    }

    impl MetricsSource for FakeSource {
        fn host_counters(&self) -> HostCounters {
            HostCounters {
                cpu_percent: Some(37.5),
                memory_used_bytes: Some(1024 * 1024 * 1024),
                memory_total_bytes: Some(4 * 1024 * 1024 * 1024),
                bytes_sent: Some(10),
                bytes_recv: Some(20),
            }
        }

        fn connections(&self) -> Result<Vec<Connection>, SourceError> {
            self.connections.clone()
        }

        fn host_info(&self) -> HostInfo {
            HostInfo {
                cpu_count_logical: Some(8),
                cpu_count_physical: Some(4),
                disk: Some(DiskSpace { total_bytes: 100 * GIB, available_bytes: 75 * GIB }),
                boot_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 6, 30, 0).unwrap()),
            }
        }

        fn interfaces(&self) -> Result<Vec<NetworkInterface>, SourceError> {
            self.interfaces.clone()
        }
    }

    /// Backend that is reachable at startup but fails every call.
    struct FailingStore;

    #[async_trait::async_trait]
    impl SampleStore for FailingStore {
        fn backend(&self) -> StorageBackend {
            StorageBackend::Redis
        }

        async fn append(&self, _sample: Sample) -> crate::error::Result<()> {
            Err(PulseError::Storage { reason: "connection refused".into() })
        }

        async fn range(
            &self,
            _start: chrono::DateTime<Utc>,
            _end: Option<chrono::DateTime<Utc>>,
        ) -> crate::error::Result<Vec<Sample>> {
            Err(PulseError::Storage { reason: "connection refused".into() })
        }

        async fn clear_all(&self) -> crate::error::Result<()> {
            Err(PulseError::Storage { reason: "connection refused".into() })
        }
    }

    fn lo() -> NetworkInterface {
        NetworkInterface {
            name: "lo".into(),
            mac: None,
            ipv4: vec!["127.0.0.1".into()],
            ipv6: vec!["::1".into()],
            is_up: true,
            speed: 0,
        }
    }

    fn conn(port: u16, state: ConnectionState) -> Connection {
        Connection {
            protocol: Protocol::Tcp,
            local: ([127, 0, 0, 1], port).into(),
            remote: ([127, 0, 0, 1], 9000).into(),
            state,
        }
    }

    fn build(source: FakeSource, store: Arc<dyn SampleStore>) -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState {
            store,
            source: Arc::new(source),
            churn: ConnectionChurnTracker::new(),
            default_history_minutes: 60,
        });
        (create_router(state.clone(), "static"), state)
    }

    fn app_with(connections: Result<Vec<Connection>, SourceError>) -> (Router, Arc<AppState>) {
        build(FakeSource { connections, interfaces: Ok(vec![lo()]) }, Arc::new(MemoryStore::new()))
    }

    fn app() -> (Router, Arc<AppState>) {
        app_with(Ok(Vec::new()))
    }

    fn app_with_failing_store() -> (Router, Arc<AppState>) {
        build(FakeSource { connections: Ok(Vec::new()), interfaces: Ok(Vec::new()) }, Arc::new(FailingStore))
    }

    async fn seed(state: &AppState, base: chrono::DateTime<Utc>, count: i64) {
        for i in 0..count {
            let sample = Sample {
                timestamp: base + Duration::seconds(i * 3),
                cpu_percent: 10.0 + i as f64,
                memory_used_mb: 100.0,
                memory_total_mb: 1000.0 + i as f64,
                net_bytes_sent: (i as u64) * 3_000,
                net_bytes_recv: (i as u64) * 300,
            };
            state.store.append(sample).await.unwrap();
        }
    }

    async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn history_derives_rates_over_trailing_window() {
        let (app, state) = app();
        seed(&state, Utc::now() - Duration::seconds(30), 4).await;

        let (status, body) = send(&app, Method::GET, "/api/system/metrics/history?minutes=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["timestamps"].as_array().unwrap().len(), 4);
        assert_eq!(body["net_sent_speed_bps"], serde_json::json!([0.0, 1000.0, 1000.0, 1000.0]));
        assert_eq!(body["net_recv_speed_bps"], serde_json::json!([0.0, 100.0, 100.0, 100.0]));
        assert_eq!(body["memory_total_mb"], 1003.0);
    }

    #[tokio::test]
    async fn trailing_window_excludes_old_samples() {
        let (app, state) = app();
        seed(&state, Utc::now() - Duration::hours(3), 2).await;
        seed(&state, Utc::now() - Duration::seconds(10), 1).await;

        let (_, body) = send(&app, Method::GET, "/api/system/metrics/history").await;
        assert_eq!(body["cpu"], serde_json::json!([10.0]));
    }

    #[tokio::test]
    async fn explicit_window_is_inclusive() {
        let (app, state) = app();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        seed(&state, base, 10).await;

        let uri = "/api/system/metrics/history?start_time=2024-01-01T00:00:03Z&end_time=2024-01-01T00:00:09Z";
        let (_, body) = send(&app, Method::GET, uri).await;
        assert_eq!(body["cpu"], serde_json::json!([11.0, 12.0, 13.0]));
        // First element of any window has no predecessor
        assert_eq!(body["net_sent_speed_bps"][0], 0.0);
    }

    #[tokio::test]
    async fn malformed_window_falls_back_to_minutes() {
        let (app, state) = app();
        seed(&state, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 3).await;
        seed(&state, Utc::now() - Duration::seconds(5), 1).await;

        let uri = "/api/system/metrics/history?minutes=10&start_time=not-a-date&end_time=2024-01-01T00:00:09Z";
        let (status, body) = send(&app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cpu"], serde_json::json!([10.0]));
    }

    #[tokio::test]
    async fn repeated_queries_are_identical() {
        let (app, state) = app();
        seed(&state, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 5).await;

        let uri = "/api/system/metrics/history?start_time=2024-01-01T00:00:00Z&end_time=2024-01-02T00:00:00Z";
        let (_, first) = send(&app, Method::GET, uri).await;
        let (_, second) = send(&app, Method::GET, uri).await;
        assert_eq!(first, second);
        assert_eq!(first["timestamps"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn clear_then_query_is_empty() {
        let (app, state) = app();
        seed(&state, Utc::now() - Duration::seconds(20), 3).await;

        let (status, body) = send(&app, Method::DELETE, "/api/system/metrics/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let (_, body) = send(&app, Method::GET, "/api/system/metrics/history").await;
        assert_eq!(body["timestamps"], serde_json::json!([]));
        assert_eq!(body["cpu"], serde_json::json!([]));
        assert_eq!(body["memory_used_mb"], serde_json::json!([]));
        assert_eq!(body["net_sent_speed_bps"], serde_json::json!([]));
        assert_eq!(body["net_recv_speed_bps"], serde_json::json!([]));
        assert_eq!(body["memory_total_mb"], 0.0);
    }

    #[tokio::test]
    async fn connections_report_counts_and_rate() {
        let (app, _) = app_with(Ok(vec![
            conn(1, ConnectionState::Established),
            conn(2, ConnectionState::Established),
            conn(80, ConnectionState::Listen),
        ]));

        let (status, body) = send(&app, Method::GET, "/api/network/connections").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_connections"], 3);
        assert_eq!(body["status_counts"]["ESTABLISHED"], 2);
        assert_eq!(body["status_counts"]["LISTEN"], 1);
        assert_eq!(body["rate"]["new_per_3s"], 0);
        assert_eq!(body["rate"]["closed_per_3s"], 0);
    }

    #[tokio::test]
    async fn denied_connection_table_reads_as_empty() {
        let (app, _) = app_with(Err(SourceError::PermissionDenied { what: "/proc/net/tcp".into() }));

        let (status, body) = send(&app, Method::GET, "/api/network/connections").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_connections"], 0);
        assert_eq!(body["status_counts"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn realtime_reads_source_directly() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/api/system/metrics/realtime").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cpu_percent"], 37.5);
        assert_eq!(body["memory"]["total_mb"], 4096.0);
        assert_eq!(body["memory"]["used_mb"], 1024.0);
        assert_eq!(body["memory"]["percent"], 25.0);
        assert_eq!(body["cpu_count_logical"], 8);
        assert_eq!(body["cpu_count_physical"], 4);
        assert_eq!(body["disk"]["total_gb"], 100.0);
        assert_eq!(body["disk"]["used_gb"], 25.0);
        assert_eq!(body["disk"]["percent"], 25.0);
        assert_eq!(body["boot_time"], "2024-01-01T06:30:00Z");
    }

    #[tokio::test]
    async fn failed_clear_reports_error_in_body() {
        let (app, _) = app_with_failing_store();
        let (status, body) = send(&app, Method::DELETE, "/api/system/metrics/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn failed_history_query_is_a_500() {
        let (app, _) = app_with_failing_store();
        let (status, body) = send(&app, Method::GET, "/api/system/metrics/history").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn health_names_the_backend() {
        let (app, _) = app_with_failing_store();
        let (_, body) = send(&app, Method::GET, "/api/health").await;
        assert_eq!(body["storage"], "redis");
    }

    #[tokio::test]
    async fn interfaces_list_addresses_and_link_state() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/api/network/interfaces").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!([{
                "name": "lo",
                "mac": null,
                "ipv4": ["127.0.0.1"],
                "ipv6": ["::1"],
                "is_up": true,
                "speed": 0
            }])
        );
    }

    #[tokio::test]
    async fn unreadable_interfaces_are_a_500() {
        let (app, _) = build(
            FakeSource {
                connections: Ok(Vec::new()),
                interfaces: Err(SourceError::Unavailable { what: "interfaces".into(), reason: "gone".into() }),
            },
            Arc::new(MemoryStore::new()),
        );
        let (status, body) = send(&app, Method::GET, "/api/network/interfaces").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn responses_carry_timing_headers() {
        let (app, _) = app();
        let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.headers().contains_key("X-Response-Time-Us"));
        assert!(resp.headers().contains_key("Server-Timing"));
    }
}
