//! REST façade over a [`TimerStore`].
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | `GET` | `/` | 200 `{message}` |
//! | `POST` | `/api/timers` | 201 created timer |
//! | `GET` | `/api/timers/{storeDomain}` | 200 timers in insertion order |
//! | `DELETE` | `/api/timers/{id}` | 200 `{message, deletedTimer}` |
//!
//! Failures answer with `{"error": "..."}`: 400 for invalid or malformed
//! bodies, 404 for unknown ids, 500 for storage failures.

use alloc::sync::Arc;
use core::future::Future;

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{CorsPolicy, ServerConfig, StoreLocation};
use crate::error::{Result, TimerError};
use crate::models::{ApiErrorBody, DeleteResponse, NewTimer, StatusMessage, StoreDomain, Timer, TimerId};
use crate::storage::{InMemoryStore, TimerStore};

/// Body of `GET /`.
const LIVENESS_MESSAGE: &str = "countdown timer API is running";
/// Confirmation sent with a deleted timer.
const DELETED_MESSAGE: &str = "Timer deleted successfully";

/// Shared handler state.
#[derive(Debug)]
struct AppState<S> {
    /// Backing timer store.
    store: Arc<S>,
}

impl<S> Clone for AppState<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl IntoResponse for TimerError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Api { .. }
            | Self::Serialization(_)
            | Self::Storage(_)
            | Self::Io(_)
            | Self::MissingBaseUrl
            | Self::InvalidUrl(_)
            | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            #[cfg(any(feature = "async", feature = "blocking"))]
            Self::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        let body = ApiErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the API router over `store`.
#[inline]
pub fn router<S>(store: Arc<S>, cors: &CorsPolicy) -> Router
where
    S: TimerStore + 'static,
{
    Router::new()
        .route("/", get(liveness))
        .route("/api/timers", post(create_timer::<S>))
        .route(
            "/api/timers/{key}",
            get(list_timers::<S>).delete(delete_timer::<S>),
        )
        .with_state(AppState { store })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors)),
        )
}

/// CORS layer admitting the origins `policy` allows, for the methods and
/// header the widgets and admin use.
fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    let origins = if policy.allows_any() {
        AllowOrigin::any()
    } else {
        let allowed = policy.clone();
        AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
            origin.to_str().is_ok_and(|value| allowed.allows(value))
        })
    };
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// `GET /`.
async fn liveness() -> Json<StatusMessage> {
    Json(StatusMessage {
        message: LIVENESS_MESSAGE.to_owned(),
    })
}

/// `POST /api/timers`.
async fn create_timer<S: TimerStore>(
    State(state): State<AppState<S>>,
    payload: core::result::Result<Json<NewTimer>, JsonRejection>,
) -> Result<(StatusCode, Json<Timer>)> {
    let Json(new_timer) = payload.map_err(|rejection| TimerError::Validation(rejection.body_text()))?;
    let timer = state.store.create(new_timer).await?;
    tracing::info!(id = %timer.id, store = %timer.store_domain, "timer created");
    Ok((StatusCode::CREATED, Json(timer)))
}

/// `GET /api/timers/{storeDomain}`.
async fn list_timers<S: TimerStore>(
    State(state): State<AppState<S>>,
    Path(raw_store): Path<String>,
) -> Result<Json<Vec<Timer>>> {
    let store = StoreDomain::new(raw_store);
    let timers = state.store.timers_for_store(&store).await?;
    tracing::debug!(store = %store, count = timers.len(), "timers listed");
    Ok(Json(timers))
}

/// `DELETE /api/timers/{id}`.
async fn delete_timer<S: TimerStore>(
    State(state): State<AppState<S>>,
    Path(raw_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let id = TimerId::new(raw_id);
    let Some(deleted_timer) = state.store.delete(&id).await? else {
        return Err(TimerError::NotFound(id));
    };
    tracing::info!(id = %id, "timer deleted");
    Ok(Json(DeleteResponse {
        message: DELETED_MESSAGE.to_owned(),
        deleted_timer,
    }))
}

/// Serves `app` on an already bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the listener fails.
#[inline]
pub async fn serve_listener<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    tracing::info!(%address, "timer API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("timer API stopped");
    Ok(())
}

/// Binds `config.bind_address`, opens the configured store and serves until
/// `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound, the store cannot be
/// opened, or the listener fails.
#[inline]
#[allow(clippy::pattern_type_mismatch, reason = "store location is only borrowed")]
pub async fn serve<F>(config: &ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind_address).await?;
    let app = match &config.store {
        StoreLocation::Memory => {
            tracing::warn!("timers are kept in memory and will be lost on exit");
            router(Arc::new(InMemoryStore::new()), &config.cors)
        }
        #[cfg(feature = "storage-file")]
        StoreLocation::File(dir) => {
            tracing::info!(dir = %dir.display(), "using file timer store");
            router(Arc::new(crate::storage::FileStore::new(dir.clone())?), &config.cors)
        }
        #[cfg(not(feature = "storage-file"))]
        StoreLocation::File(dir) => {
            return Err(TimerError::Config(format!(
                "file storage is not compiled in; cannot open {}",
                dir.display()
            )));
        }
    };
    serve_listener(listener, app, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let policy = CorsPolicy::parse("https://*.myshopify.com").unwrap();
        (router(Arc::clone(&store), &policy), store)
    }

    fn create_body(store: &str, text: &str) -> Value {
        json!({
            "storeDomain": store,
            "timerName": "Summer Sale",
            "startTime": "2025-08-15T09:00",
            "endTime": "2025-08-20T23:59",
            "promotionText": text,
            "displayOptions": { "color": "hsl(0,100%,50%)", "size": "large", "position": "bottom" },
            "urgency": { "enabled": true, "type": "notificationBanner", "triggerMinutes": 15 }
        })
    }

    fn post_json(body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/timers")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn liveness_answers() {
        let (app, _store) = app();
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["message"], LIVENESS_MESSAGE);
    }

    #[tokio::test]
    async fn create_then_list_preserves_display_fields() {
        let (app, _store) = app();
        let submitted = create_body("shop.myshopify.com", "Up to 50% off");
        let response = app.clone().oneshot(post_json(&submitted)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = read_json(response).await;
        assert!(created["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(created["createdAt"].is_string());

        let response = app
            .oneshot(get("/api/timers/shop.myshopify.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = read_json(response).await;
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        let timer = &listed[0];
        for field in [
            "storeDomain",
            "timerName",
            "startTime",
            "endTime",
            "promotionText",
            "displayOptions",
            "urgency",
        ] {
            assert_eq!(timer[field], submitted[field], "field {field} changed");
        }
        assert_eq!(timer["id"], created["id"]);
    }

    #[tokio::test]
    async fn list_keeps_insertion_order_per_store() {
        let (app, _store) = app();
        for (store, text) in [
            ("a.myshopify.com", "first"),
            ("b.myshopify.com", "other"),
            ("a.myshopify.com", "second"),
        ] {
            let response = app
                .clone()
                .oneshot(post_json(&create_body(store, text)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        let listed = read_json(app.oneshot(get("/api/timers/a.myshopify.com")).await.unwrap()).await;
        let texts: Vec<_> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|timer| timer["promotionText"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn list_unknown_store_is_empty_array() {
        let (app, _store) = app();
        let response = app.oneshot(get("/api/timers/nobody.myshopify.com")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn create_rejects_inverted_window() {
        let (app, store) = app();
        let mut body = create_body("shop.myshopify.com", "Sale");
        body["endTime"] = json!("2025-08-01T00:00");
        let response = app.oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = read_json(response).await;
        assert!(error["error"].as_str().unwrap().contains("must be after"));
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn create_rejects_malformed_json() {
        let (app, _store) = app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/timers")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"storeDomain\": "))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn create_rejects_missing_fields() {
        let (app, _store) = app();
        let response = app
            .oneshot(post_json(&json!({ "storeDomain": "shop.myshopify.com" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_derives_urgency_enabled_from_type() {
        let (app, _store) = app();
        for (urgency, enabled) in [
            (json!({ "enabled": true, "type": "none" }), false),
            (json!({ "enabled": false, "type": "colorPulse" }), true),
            (json!({ "type": "notificationBanner", "triggerMinutes": 5 }), true),
        ] {
            let mut body = create_body("shop.myshopify.com", "Sale");
            body["urgency"] = urgency.clone();
            let response = app.clone().oneshot(post_json(&body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED, "urgency {urgency}");
            let created = read_json(response).await;
            assert_eq!(created["urgency"]["enabled"], enabled, "urgency {urgency}");
            assert_eq!(created["urgency"]["type"], urgency["type"]);
        }

        let listed = read_json(app.oneshot(get("/api/timers/shop.myshopify.com")).await.unwrap()).await;
        let flags: Vec<_> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|timer| timer["urgency"]["enabled"].as_bool().unwrap())
            .collect();
        assert_eq!(flags, [false, true, true]);
        assert_eq!(listed[2]["urgency"]["triggerMinutes"], 5);
    }

    #[tokio::test]
    async fn delete_returns_removed_timer_then_404() {
        let (app, store) = app();
        let created = read_json(
            app.clone()
                .oneshot(post_json(&create_body("shop.myshopify.com", "Sale")))
                .await
                .unwrap(),
        )
        .await;
        let uri = format!("/api/timers/{}", created["id"].as_str().unwrap());

        let response = app.clone().oneshot(delete(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["message"], DELETED_MESSAGE);
        assert_eq!(body["deletedTimer"]["id"], created["id"]);
        assert!(store.is_empty().unwrap());

        let response = app.oneshot(delete(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(read_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let (app, _store) = app();
        let response = app.oneshot(delete("/api/timers/does-not-exist")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_storefront_origin_only() {
        let (app, _store) = app();
        let preflight = |origin: &str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/timers/shop.myshopify.com")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap()
        };

        let response = app
            .clone()
            .oneshot(preflight("https://shop.myshopify.com"))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://shop.myshopify.com"
        );

        let response = app.oneshot(preflight("https://evil.example.com")).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn storage_failure_maps_to_500() {
        let response = TimerError::Storage("disk full".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_json(response).await["error"], "storage error: disk full");
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn serves_real_listener_for_client() {
        use crate::client::TimerClient;
        use crate::form::TimerDraft;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let app = router(Arc::new(InMemoryStore::new()), &CorsPolicy::permissive());
        let server = tokio::spawn(serve_listener(listener, app, async move {
            let _stopped = stop_rx.await;
        }));

        let client = TimerClient::builder()
            .base_url(format!("http://{address}"))
            .build()
            .unwrap();
        let store = StoreDomain::from("shop.myshopify.com");
        let draft = TimerDraft {
            start_date: "2025-08-15".to_owned(),
            start_time: "09:00".to_owned(),
            end_date: "2025-08-20".to_owned(),
            end_time: "23:59".to_owned(),
            promotion_text: "Summer".to_owned(),
            ..TimerDraft::default()
        };
        let created = client.create_timer(&draft.build(&store).unwrap()).await.unwrap();
        let listed = client.list_timers(&store).await.unwrap();
        assert_eq!(listed, vec![created.clone()]);

        let deleted = client.delete_timer(&created.id).await.unwrap();
        assert_eq!(deleted.deleted_timer, created);
        let err = client.delete_timer(&created.id).await.unwrap_err();
        assert!(matches!(err, TimerError::NotFound(_)));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
