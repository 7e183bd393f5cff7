use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{
        header::{CONTENT_TYPE, LOCATION},
        Method, StatusCode,
    },
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{MonthlyReport, NewSuggestion, StatusUpdate, Suggestion};
use crate::service::SuggestionService;

pub type AppState = Arc<SuggestionService>;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    #[serde(default)]
    content: String,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/api/suggestions",
            get(list_handler).post(create_handler),
        )
        .route("/api/suggestions/search", get(search_handler))
        .route("/api/suggestions/similar", get(similar_handler))
        .route("/api/suggestions/report/{months}", get(report_handler))
        .route("/api/suggestions/status/{status}", get(by_status_handler))
        .route(
            "/api/suggestions/category/{category}",
            get(by_category_handler),
        )
        .route(
            "/api/suggestions/{id}",
            get(get_handler).delete(delete_handler),
        )
        .route("/api/suggestions/{id}/status", put(update_status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let address = format!("0.0.0.0:{port}");
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn list_handler(State(service): State<AppState>) -> Result<Json<Vec<Suggestion>>, AppError> {
    Ok(Json(service.list().await?))
}

async fn get_handler(
    State(service): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Suggestion>, AppError> {
    Ok(Json(service.get(id).await?))
}

async fn by_status_handler(
    State(service): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    Ok(Json(service.by_status(&status).await?))
}

async fn by_category_handler(
    State(service): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    Ok(Json(service.by_category(&category).await?))
}

async fn search_handler(
    State(service): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    Ok(Json(service.search(&params.query).await?))
}

async fn create_handler(
    State(service): State<AppState>,
    Json(payload): Json<NewSuggestion>,
) -> Result<impl IntoResponse, AppError> {
    let suggestion = service.create(payload).await?;
    let location = format!("/api/suggestions/{}", suggestion.id);
    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(suggestion)))
}

async fn update_status_handler(
    State(service): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdate>,
) -> Result<StatusCode, AppError> {
    service.update_status(id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_handler(
    State(service): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn report_handler(
    State(service): State<AppState>,
    Path(months): Path<i64>,
) -> Result<Json<MonthlyReport>, AppError> {
    Ok(Json(service.monthly_report(months).await?))
}

async fn similar_handler(
    State(service): State<AppState>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    Ok(Json(service.find_similar(&params.content).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SuggestionStatus;
    use crate::service::tests::RecordingNotifier;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn suggestion(content: &str, days_ago: i64, category: &str) -> Suggestion {
        Suggestion {
            id: Uuid::new_v4(),
            content: content.to_string(),
            customer_name: "Avery Lee".to_string(),
            customer_email: "avery@example.com".to_string(),
            created_at: Utc::now() - ChronoDuration::days(days_ago),
            status: SuggestionStatus::New,
            category: Some(category.to_string()),
            priority: None,
            is_anonymous: false,
            response: None,
            response_date: None,
        }
    }

    fn app(suggestions: Vec<Suggestion>) -> Router {
        let service = SuggestionService::new(
            Arc::new(MemoryStore::with_suggestions(suggestions)),
            Arc::new(RecordingNotifier::default()),
            "admin@surveyapp.com",
        );
        router(Arc::new(service))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn report_rejects_months_out_of_range() {
        for uri in ["/api/suggestions/report/0", "/api/suggestions/report/13"] {
            let (status, body) = send(app(Vec::new()), get_request(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, b"Months must be between 1 and 12");
        }

        let (status, _) = send(app(Vec::new()), get_request("/api/suggestions/report/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn report_serializes_camel_case_fields() {
        let suggestions = vec![
            suggestion("Faster charts", 2, "Performance"),
            suggestion("Dark mode", 3, "UI/UX"),
            suggestion("Bigger fonts", 4, "UI/UX"),
            suggestion("Ancient idea", 400, "UI/UX"),
        ];
        let (status, body) = send(app(suggestions), get_request("/api/suggestions/report/3")).await;
        assert_eq!(status, StatusCode::OK);

        let report: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["totalSuggestions"], 3);
        assert_eq!(report["implementedSuggestions"], 0);
        assert_eq!(report["topCategories"][0]["category"], "UI/UX");
        assert_eq!(report["topCategories"][0]["count"], 2);
        assert_eq!(report["suggestions"].as_array().unwrap().len(), 3);
        assert!(report["monthlyData"][0]["totalSuggestions"].is_number());
    }

    #[tokio::test]
    async fn create_returns_location_and_body() {
        let app = app(Vec::new());
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/suggestions",
                json!({
                    "content": "Let respondents skip optional questions",
                    "customerName": "Jules Moreno",
                    "customerEmail": "jules@example.com",
                    "category": "Features",
                    "isAnonymous": false
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response
            .headers()
            .get(LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let (status, body) = send(app, get_request(&location)).await;
        assert_eq!(status, StatusCode::OK);
        let created: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(created["status"], "new");
        assert_eq!(created["category"], "Features");
    }

    #[tokio::test]
    async fn status_endpoints_validate_input() {
        let existing = suggestion("Dark mode", 1, "UI/UX");
        let id = existing.id;
        let app = app(vec![existing]);

        let (status, body) = send(app.clone(), get_request("/api/suggestions/status/pending")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"Invalid status value");

        let (status, body) = send(app.clone(), get_request("/api/suggestions/status/NEW")).await;
        assert_eq!(status, StatusCode::OK);
        let listed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = send(
            app.clone(),
            json_request(
                Method::PUT,
                &format!("/api/suggestions/{id}/status"),
                json!({ "status": "implemented", "response": "Done" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            app.clone(),
            json_request(
                Method::PUT,
                &format!("/api/suggestions/{}/status", Uuid::new_v4()),
                json!({ "status": "implemented" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(app, get_request(&format!("/api/suggestions/{id}"))).await;
        let updated: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(updated["status"], "implemented");
        assert_eq!(updated["response"], "Done");
    }

    #[tokio::test]
    async fn similar_search_and_delete() {
        let existing = suggestion("Export results to spreadsheets", 1, "Features");
        let id = existing.id;
        let app = app(vec![existing, suggestion("Dark mode", 2, "UI/UX")]);

        let (_, body) = send(
            app.clone(),
            get_request("/api/suggestions/similar?content=spreadsheets%20please"),
        )
        .await;
        let similar: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(similar.as_array().unwrap().len(), 1);

        let (_, body) = send(app.clone(), get_request("/api/suggestions/similar?content=hi")).await;
        let similar: Value = serde_json::from_slice(&body).unwrap();
        assert!(similar.as_array().unwrap().is_empty());

        let (_, body) = send(app.clone(), get_request("/api/suggestions/search?query=dark")).await;
        let found: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (_, body) = send(app.clone(), get_request("/api/suggestions/category/UI%2FUX")).await;
        let found: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(found.as_array().unwrap().len(), 1);

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/suggestions/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app.clone(), delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(app, get_request(&format!("/api/suggestions/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn healthz_responds() {
        let (status, body) = send(app(Vec::new()), get_request("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }
}
