// src/api/crawl.rs
// =============================================================================
// Crawl job endpoints.
//
// Ids arrive as raw path segments; one that is not a UUID cannot name a job,
// so it is answered with 404 like any other unknown id.
// =============================================================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use crate::job::{CrawlRequest, JobId, JobResultsView, JobStatus, JobStatusView, JobStore};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStarted {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub id: JobId,
    pub status: JobStatus,
}

fn parse_id(raw: &str) -> ApiResult<JobId> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("job {} not found", raw)))
}

/// POST /api/crawl
pub async fn start_crawl(
    State(store): State<JobStore>,
    Json(request): Json<CrawlRequest>,
) -> ApiResult<(StatusCode, Json<CrawlStarted>)> {
    let job_id = store.create(request).map_err(|e| {
        tracing::debug!(error = %e, "rejected crawl request");
        ApiError::from(e)
    })?;

    Ok((StatusCode::ACCEPTED, Json(CrawlStarted { job_id })))
}

/// GET /api/crawl/{id}/status
pub async fn crawl_status(
    State(store): State<JobStore>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let id = parse_id(&id)?;
    Ok(Json(store.status(id)?))
}

/// GET /api/crawl/{id}/results
pub async fn crawl_results(
    State(store): State<JobStore>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResultsView>> {
    let id = parse_id(&id)?;
    Ok(Json(store.results(id)?))
}

/// POST /api/crawl/{id}/stop
pub async fn stop_crawl(
    State(store): State<JobStore>,
    Path(id): Path<String>,
) -> ApiResult<Json<StopResponse>> {
    let id = parse_id(&id)?;
    let status = store.stop(id)?;
    Ok(Json(StopResponse { id, status }))
}

/// GET /api/crawls
pub async fn list_crawls(State(store): State<JobStore>) -> Json<Vec<JobStatusView>> {
    Json(store.list())
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::config::Settings;
    use crate::job::JobStore;
    use crate::render::fake::{FakeEngine, FakePage, FakeSite};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt; // oneshot()

    fn app() -> Router {
        let site = FakeSite::new()
            .page(
                "https://example.test/",
                FakePage::html(
                    r#"<title>Home</title><a href="/about">About</a><img src="/x.png">"#,
                ),
            )
            .page("https://example.test/about", FakePage::html("<title>About</title>"));
        let settings = Settings {
            check_links: false,
            ..Settings::default()
        };
        create_router(JobStore::new(Arc::new(FakeEngine::new(site)), settings))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn start(app: &Router, body: Value) -> String {
        let (status, value) = send(app, "POST", "/api/crawl", Some(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        value["jobId"].as_str().unwrap().to_string()
    }

    async fn wait_until_done(app: &Router, id: &str) -> Value {
        for _ in 0..1000 {
            let (_, status) = send(app, "GET", &format!("/api/crawl/{}/status", id), None).await;
            if status["status"] != "running" {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", id);
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_crawl_lifecycle_over_http() {
        let app = app();
        let id = start(&app, json!({ "url": "https://example.test/", "maxDepth": 1 })).await;

        let status = wait_until_done(&app, &id).await;
        assert_eq!(status["status"], "complete");
        assert_eq!(status["startUrl"], "https://example.test/");
        assert_eq!(status["pagesScanned"], 2);
        assert_eq!(status["maxPages"], 50);
        assert!(status.get("error").is_none());

        let (code, results) = send(&app, "GET", &format!("/api/crawl/{}/results", id), None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(results["results"]["pages"].as_array().unwrap().len(), 2);
        assert_eq!(results["results"]["pages"][0]["statusCode"], 200);
        assert_eq!(
            results["results"]["missingAlt"][0]["foundOn"],
            "https://example.test/"
        );
        assert_eq!(results["summary"]["missingAlt"], 1);

        let (code, stopped) = send(&app, "POST", &format!("/api/crawl/{}/stop", id), None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(stopped["status"], "complete");

        let (code, list) = send(&app, "GET", "/api/crawls", None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_bad_requests_are_rejected() {
        let app = app();

        let (code, body) = send(&app, "POST", "/api/crawl", Some(json!({ "url": "nope" }))).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid url"));

        let (code, body) = send(&app, "POST", "/api/crawl", Some(json!({}))).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "url is required");

        let (_, list) = send(&app, "GET", "/api/crawls", None).await;
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_jobs_are_not_found() {
        let app = app();
        let unknown = uuid::Uuid::new_v4();

        for uri in [
            format!("/api/crawl/{}/status", unknown),
            format!("/api/crawl/{}/results", unknown),
            "/api/crawl/not-a-uuid/status".to_string(),
        ] {
            let (code, body) = send(&app, "GET", &uri, None).await;
            assert_eq!(code, StatusCode::NOT_FOUND, "{}", uri);
            assert!(body["error"].as_str().unwrap().contains("not found"));
        }

        let (code, _) = send(&app, "POST", &format!("/api/crawl/{}/stop", unknown), None).await;
        assert_eq!(code, StatusCode::NOT_FOUND);
    }
}
