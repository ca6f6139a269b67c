use axum::{routing::get, Router};

use crate::state::AppState;

pub mod cam;
pub mod cam_entries;
pub mod health;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(cam::router())
        .merge(cam_entries::router())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::v1_router;
    use crate::state::test_state;

    fn app() -> Router {
        v1_router().with_state(test_state())
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.expect("router responds");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    #[tokio::test]
    async fn health_reports_missing_database() {
        let (status, body) = send(get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["db"], "not_configured");
        assert_eq!(body["towers"], 33);
    }

    #[tokio::test]
    async fn reconcile_endpoint_runs_without_database() {
        let (status, body) = send(json_request(
            Method::POST,
            "/cam/reconcile",
            json!({
                "year": 2025,
                "quarter": 1,
                "records": [
                    { "tower": "11", "year": 2025, "month": 5, "paid_flats": 150,
                      "pending_flats": 51, "total_flats": 201, "status": "approved" },
                    { "tower": "1A", "year": 2025, "month": 6, "paid_flats": 67,
                      "pending_flats": 0, "total_flats": 67, "status": "submitted" }
                ]
            }),
        ))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quarter"], 1);
        assert_eq!(body["towers"].as_array().map(Vec::len), Some(33));
        assert_eq!(body["towers"][0]["tower"], "1A");
        assert_eq!(body["towers"][0]["paid_flats"], 0);
        assert_eq!(body["towers"][16]["collection_rate"], 74.6);
        assert_eq!(body["totals"]["total_flats"], 2613);
    }

    #[tokio::test]
    async fn reconcile_rejects_unknown_quarter() {
        let (status, _) = send(json_request(
            Method::POST,
            "/cam/reconcile",
            json!({ "year": 2025, "quarter": 5, "records": [] }),
        ))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn database_routes_report_unavailable_dependency() {
        for uri in [
            "/cam/summary?year=2025&quarter=1",
            "/cam/summary/export?year=2025&quarter=1",
            "/cam/quarter-totals?year=2025",
            "/cam/monthly?year=2025",
        ] {
            let (status, body) = send(get(uri)).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
            assert!(body["error"].as_str().is_some_and(|m| m.contains("SUPABASE_DB_URL")));
        }
    }

    #[tokio::test]
    async fn request_validation_runs_before_database_access() {
        let (status, _) = send(get("/cam/summary?year=2025&quarter=7")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(get("/cam/towers?year=2025&filter=weekly")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(get("/cam/missing-documents?tower=99")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(json_request(
            Method::PUT,
            "/cam/entries",
            json!({
                "tower": "1A",
                "year": 2025,
                "quarter": 1,
                "months": [{ "month": 5, "paid_flats": 60, "pending_flats": 10 }]
            }),
        ))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Total (paid + pending) cannot exceed 67 flats in May");

        let (status, _) = send(json_request(
            Method::PUT,
            "/cam/entries",
            json!({
                "tower": "1A",
                "year": 2025,
                "quarter": 1,
                "months": [{ "month": 7, "paid_flats": 1 }]
            }),
        ))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(json_request(
            Method::POST,
            "/cam/entries/request-correction",
            json!({ "tower": "1A", "year": 2025, "quarter": 1 }),
        ))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "A reason is required to request a correction.");
    }

    #[tokio::test]
    async fn out_of_range_years_are_rejected() {
        let (status, _) = send(json_request(
            Method::POST,
            "/cam/reconcile",
            json!({ "year": 2147483647, "quarter": 1, "records": [] }),
        ))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        for uri in [
            "/cam/summary?year=2147483647&quarter=1",
            "/cam/summary/export?year=2147483647",
            "/cam/quarter-totals?year=-2147483648",
            "/cam/towers?year=2147483647",
            "/cam/missing-documents?year=1999",
            "/cam/entries?tower=1A&year=2147483647",
        ] {
            let (status, _) = send(get(uri)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        }
    }
}
