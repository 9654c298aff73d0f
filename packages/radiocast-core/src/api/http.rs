//! HTTP route handlers.
//!
//! All handlers are thin: they delegate to the coordinator handle or the
//! registries and map [`CastError`] into JSON error responses.

use axum::{
    extract::{Path, State},
    http::{header, Method},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::response::{api_ok, api_success};
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::error::{CastError, CastResult};
use crate::library::RadioLibrary;
use crate::protocol_constants::{APP_NAME, SERVICE_ID};
use crate::renderer::{DeviceDiscovery, RendererDevice};
use crate::services::VolumeDirection;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest {
    media_id: String,
    #[serde(default)]
    device_id: Option<String>,
}

#[derive(Deserialize)]
struct VolumeRequest {
    direction: VolumeDirection,
}

/// Manually registered renderer; services are assumed at their usual paths.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceRequest {
    id: String,
    name: String,
    base_url: String,
}

impl DeviceRequest {
    fn into_device(self) -> CastResult<RendererDevice> {
        if self.id.trim().is_empty() {
            return Err(CastError::InvalidRequest("Device id must not be empty".into()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(CastError::InvalidRequest(format!(
                "Invalid base URL: {}",
                self.base_url
            )));
        }
        let name = if self.name.trim().is_empty() {
            self.id.clone()
        } else {
            self.name
        };
        Ok(RendererDevice::with_base_url(self.id, name, &self.base_url))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/radios", get(list_radios))
        .route("/api/devices", get(list_devices).post(add_device))
        .route("/api/devices/{id}", delete(remove_device))
        .route("/api/session", post(start_session))
        .route("/api/playback/{action}", post(playback_command))
        .route("/api/volume", post(adjust_volume))
        .route("/api/state", get(get_state))
        .route("/api/playlist", get(get_playlist))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "name": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_radios(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({ "radios": state.library.radios() }))
}

async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({ "devices": state.devices.devices() }))
}

/// POST /api/devices
///
/// Adds or replaces a renderer in the registry.
async fn add_device(
    State(state): State<AppState>,
    Json(payload): Json<DeviceRequest>,
) -> CastResult<impl IntoResponse> {
    let device = payload.into_device()?;
    let added = state.devices.register(device);
    Ok(api_success(json!({ "success": true, "added": added })))
}

/// DELETE /api/devices/{id}
///
/// Removing the target of the live session fails that session.
async fn remove_device(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> CastResult<impl IntoResponse> {
    state
        .devices
        .remove(&id)
        .ok_or(CastError::DeviceNotFound(id))?;
    Ok(api_ok())
}

/// POST /api/session
///
/// Supersedes whatever is playing with a new session.
async fn start_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> CastResult<impl IntoResponse> {
    let token = state
        .coordinator
        .start_session(payload.media_id, payload.device_id)
        .await?;
    Ok(api_success(json!({ "sessionToken": token.as_str() })))
}

/// POST /api/playback/{play|pause|stop|retry}
async fn playback_command(
    Path(action): Path<String>,
    State(state): State<AppState>,
) -> CastResult<impl IntoResponse> {
    let coordinator = &state.coordinator;
    match action.as_str() {
        "play" => coordinator.play().await?,
        "pause" => coordinator.pause().await?,
        "stop" => coordinator.stop().await?,
        "retry" => {
            let token = coordinator.retry().await?;
            return Ok(api_success(json!({ "success": true, "sessionToken": token.as_str() })));
        }
        other => {
            return Err(CastError::InvalidRequest(format!(
                "Unknown playback action: {}",
                other
            )))
        }
    }
    Ok(api_success(json!({ "success": true })))
}

async fn adjust_volume(
    State(state): State<AppState>,
    Json(payload): Json<VolumeRequest>,
) -> CastResult<impl IntoResponse> {
    state.coordinator.adjust_volume(payload.direction)?;
    Ok(api_ok())
}

/// Returns the coordinator snapshot.
async fn get_state(State(state): State<AppState>) -> CastResult<impl IntoResponse> {
    Ok(api_success(state.coordinator.snapshot().await?))
}

async fn get_playlist(State(state): State<AppState>) -> CastResult<impl IntoResponse> {
    let entries = state.coordinator.playlist().await?;
    Ok(api_success(json!({ "entries": entries })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::Response;

    use crate::bootstrap::{bootstrap_services, BootstrappedServices};
    use crate::library::Radio;
    use crate::state::Config;

    async fn app() -> (AppState, BootstrappedServices) {
        let config = Config {
            radios: vec![Radio {
                id: "7".into(),
                name: "Jazz".into(),
                url: "http://127.0.0.1:9/jazz".into(),
                icon_url: None,
                mime_type: None,
            }],
            ..Default::default()
        };
        let services = bootstrap_services(&config).unwrap();
        (AppState::new(&services, 0), services)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn device(id: &str, base_url: &str) -> DeviceRequest {
        DeviceRequest {
            id: id.into(),
            name: String::new(),
            base_url: base_url.into(),
        }
    }

    #[test]
    fn device_request_validation() {
        assert!(device("", "http://10.0.0.2:1400").into_device().is_err());
        assert!(device("uuid:a", "10.0.0.2:1400").into_device().is_err());

        let d = device("uuid:a", "http://10.0.0.2:1400").into_device().unwrap();
        assert_eq!(d.name, "uuid:a");
    }

    #[tokio::test]
    async fn unknown_media_maps_to_not_found() {
        let (state, services) = app().await;
        let result = start_session(
            State(state),
            Json(SessionRequest {
                media_id: "404".into(),
                device_id: None,
            }),
        )
        .await;
        let response = result.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "media_not_found");
        services.shutdown().await;
    }

    #[tokio::test]
    async fn session_start_returns_token_and_updates_state() {
        let (state, services) = app().await;
        let response = start_session(
            State(state.clone()),
            Json(SessionRequest {
                media_id: "7".into(),
                device_id: None,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["sessionToken"].as_str().is_some_and(|t| !t.is_empty()));

        let snapshot = body_json(get_state(State(state)).await.into_response()).await;
        assert_eq!(snapshot["mediaId"], "7");
        assert_eq!(snapshot["isRemote"], false);
        services.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_playback_action_is_rejected() {
        let (state, services) = app().await;
        let response = playback_command(Path("rewind".into()), State(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        services.shutdown().await;
    }

    #[tokio::test]
    async fn play_without_session_is_conflict() {
        let (state, services) = app().await;
        let response = playback_command(Path("play".into()), State(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"], "not_ready");
        services.shutdown().await;
    }

    #[tokio::test]
    async fn devices_can_be_added_and_removed() {
        let (state, services) = app().await;
        add_device(
            State(state.clone()),
            Json(device("uuid:den", "http://10.0.0.9:49152")),
        )
        .await
        .unwrap();
        assert_eq!(state.devices.devices().len(), 1);

        assert!(remove_device(Path("uuid:den".into()), State(state.clone()))
            .await
            .is_ok());
        assert!(matches!(
            remove_device(Path("uuid:den".into()), State(state)).await,
            Err(CastError::DeviceNotFound(_))
        ));
        services.shutdown().await;
    }
}
