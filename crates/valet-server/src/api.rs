use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::Method,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use valet_shared::{ShiftCode, ShiftId, ShiftRecord};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::repository::ShiftRepository;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<ShiftRepository>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/shifts/:id", get(get_shift).put(put_shift))
        .route("/shifts/by-code/:code", get(get_shift_by_code))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    shifts: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        shifts: state.repository.len().await,
    })
}

fn parse_shift_id(raw: &str) -> Result<ShiftId, ServerError> {
    ShiftId::parse(raw).map_err(|e| ServerError::BadRequest(format!("Invalid shift id: {e}")))
}

/// Upsert a full snapshot. The response is the merged record, which may
/// carry additions pushed by other devices. Malformed codes and blank
/// required fields are rejected before anything is stored.
async fn put_shift(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ShiftRecord>, JsonRejection>,
) -> Result<Json<ShiftRecord>, ServerError> {
    let id = parse_shift_id(&id)?;
    let Json(record) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    if record.id != id {
        return Err(ServerError::BadRequest(format!(
            "Path id {id} does not match body id {}",
            record.id
        )));
    }
    record
        .to_shift(&[])
        .map_err(|e| ServerError::BadRequest(format!("Invalid shift {id}: {e}")))?;

    let merged = state.repository.upsert(record).await?;
    info!(
        shift_id = %merged.id,
        code = %merged.shift_code,
        cars = merged.cars.len(),
        "Shift snapshot merged"
    );
    Ok(Json(merged))
}

async fn get_shift(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShiftRecord>, ServerError> {
    let id = parse_shift_id(&id)?;
    Ok(Json(state.repository.get(id).await?))
}

async fn get_shift_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ShiftRecord>, ServerError> {
    let code = ShiftCode::parse(&code)
        .map_err(|e| ServerError::BadRequest(format!("Invalid shift code: {e}")))?;
    Ok(Json(state.repository.find_by_code(code.as_str()).await?))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use valet_shared::protocol::now;
    use valet_shared::{Employee, NewCar, Shift};

    use super::*;

    async fn test_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let repository = ShiftRepository::open(path).await.unwrap();
        let state = AppState {
            repository: Arc::new(repository),
            config: Arc::new(ServerConfig::default()),
        };
        (build_router(state), dir)
    }

    fn shift() -> Shift {
        let code = ShiftCode::parse("AB23XZ").unwrap();
        Shift::start("Smith", "123 Main St", code, now()).unwrap()
    }

    fn put(record: &ShiftRecord) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(format!("/shifts/{}", record.id))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(record).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = test_app().await;
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_put_then_lookup_by_code() {
        let (app, _dir) = test_app().await;
        let record = ShiftRecord::from(&shift());

        let response = app.clone().oneshot(put(&record)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(get("/shifts/by-code/ab23xz"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["id"], record.id.to_string());

        let response = app
            .oneshot(get(&format!("/shifts/{}", record.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_put_returns_merged_snapshot() {
        let (app, _dir) = test_app().await;
        let origin = shift();

        let mut device_a = origin.clone();
        let car = NewCar::new("AAA111", "Toyota", "Corolla", "Silver", "Row 3");
        device_a.check_in(car, now()).unwrap();
        let mut device_b = origin.clone();
        let sam = Employee::new("Sam").unwrap();
        device_b.add_employee(sam).unwrap();

        app.clone()
            .oneshot(put(&ShiftRecord::from(&device_a)))
            .await
            .unwrap();
        let response = app
            .oneshot(put(&ShiftRecord::from(&device_b)))
            .await
            .unwrap();

        let merged: ShiftRecord = serde_json::from_value(json(response).await).unwrap();
        assert_eq!(merged.cars.len(), 1);
        assert_eq!(merged.employees.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_code_is_404() {
        let (app, _dir) = test_app().await;
        let response = app.oneshot(get("/shifts/by-code/QQQQQQ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_code_is_400() {
        let (app, _dir) = test_app().await;
        let response = app.oneshot(get("/shifts/by-code/AB0")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mismatched_id_is_rejected() {
        let (app, _dir) = test_app().await;
        let record = ShiftRecord::from(&shift());
        let request = Request::builder()
            .method("PUT")
            .uri(format!("/shifts/{}", ShiftId::new()))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&record).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn put_json(id: ShiftId, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(format!("/shifts/{id}"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_code_in_body_is_400() {
        let (app, _dir) = test_app().await;
        let record = ShiftRecord::from(&shift());
        let mut body = serde_json::to_value(&record).unwrap();
        body["shiftCode"] = "0O1I".into();

        let response = app
            .clone()
            .oneshot(put_json(record.id, &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json(response).await["error"].is_string());

        let response = app.oneshot(get("/info")).await.unwrap();
        assert_eq!(json(response).await["shifts"], 0);
    }

    #[tokio::test]
    async fn test_blank_plate_is_400() {
        let (app, _dir) = test_app().await;
        let mut shift = shift();
        let car = NewCar::new("AAA111", "Toyota", "Corolla", "Silver", "Row 3");
        shift.check_in(car, now()).unwrap();
        let mut record = ShiftRecord::from(&shift);
        record.cars[0].license_plate = String::new();

        let response = app.clone().oneshot(put(&record)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(get(&format!("/shifts/{}", record.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_info_counts_shifts() {
        let (app, _dir) = test_app().await;
        app.clone()
            .oneshot(put(&ShiftRecord::from(&shift())))
            .await
            .unwrap();

        let response = app.oneshot(get("/info")).await.unwrap();
        let body = json(response).await;
        assert_eq!(body["name"], "Valet");
        assert_eq!(body["shifts"], 1);
    }
}
