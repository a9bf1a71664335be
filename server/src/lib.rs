//! Web front end: a single-page UI plus the JSON endpoints it calls.
//!
//! The server keeps no conversation state. The browser tab holds the current
//! response id and sends it with every message, so each request builds its own
//! session.
//!
//! Requests may fall back to the server's own API key, so browser requests are
//! only served for the server's own page and for origins listed in
//! `allowed_origins`.

pub mod error;

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use saver_core::{
    ConversationClient, ConversationId, ImageRef, OpenAiClient, ReasoningEffort, ResponseId,
    ResponsesApiRef, SaverConfig, SaverResult, SessionState, TurnOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use crate::error::ApiError;

const INDEX_HTML: &str = include_str!("../static/index.html");
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Builds a provider connection for one API key
pub trait ProviderFactory: Send + Sync {
    fn connect(&self, api_key: &str) -> SaverResult<ResponsesApiRef>;
}

/// Connects to the OpenAI API using the server's configuration
pub struct OpenAiFactory {
    config: SaverConfig,
}

impl OpenAiFactory {
    pub fn new(config: SaverConfig) -> Self {
        Self { config }
    }
}

impl ProviderFactory for OpenAiFactory {
    fn connect(&self, api_key: &str) -> SaverResult<ResponsesApiRef> {
        Ok(Arc::new(OpenAiClient::with_api_key(&self.config, api_key)?))
    }
}

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    config: Arc<SaverConfig>,
    providers: Arc<dyn ProviderFactory>,
}

impl AppState {
    pub fn new(config: SaverConfig, providers: Arc<dyn ProviderFactory>) -> Self {
        Self {
            config: Arc::new(config),
            providers,
        }
    }

    /// Client for the key supplied with the request, else the configured key
    fn client(&self, api_key: Option<&str>) -> Result<ConversationClient, ApiError> {
        let key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .or_else(|| self.config.api_key.as_deref())
            .ok_or_else(|| ApiError::bad_request("API key is required"))?;
        Ok(ConversationClient::new(self.providers.connect(key)?))
    }

    /// Turn options from the form's model and effort fields; blank means default
    fn turn_options(&self, model: &str, reasoning_effort: &str) -> Result<TurnOptions, ApiError> {
        let reasoning_effort = if reasoning_effort.is_empty() {
            None
        } else {
            Some(
                reasoning_effort
                    .parse::<ReasoningEffort>()
                    .map_err(ApiError::BadRequest)?,
            )
        };
        Ok(TurnOptions {
            model: if model.is_empty() {
                self.config.model().to_string()
            } else {
                model.to_string()
            },
            reasoning_effort,
            instructions: self.config.instructions.clone(),
        })
    }
}

#[derive(Deserialize, Default)]
pub struct KeyQuery {
    #[serde(default)]
    api_key: Option<String>,
}

/// Reply to a successful `/api/send`
#[derive(Serialize, Debug)]
pub struct SendResponse {
    success: bool,
    response: String,
    new_response_id: String,
    model: String,
}

/// Fields of the `/api/send` form
#[derive(Default, Debug)]
struct SendForm {
    api_key: Option<String>,
    response_id: String,
    message: String,
    model: String,
    reasoning_effort: String,
    images: Vec<ImageRef>,
}

impl SendForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "images" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                if !file_name.is_empty() {
                    form.images.push(ImageRef::Bytes {
                        file_name,
                        data: data.to_vec(),
                    });
                }
                continue;
            }

            let value = field.text().await?.trim().to_string();
            match name.as_str() {
                "api_key" => form.api_key = Some(value),
                "response_id" => form.response_id = value,
                "message" => form.message = value,
                "model" => form.model = value,
                "reasoning_effort" => form.reasoning_effort = value,
                other => debug!("Ignoring unknown form field {}", other),
            }
        }
        Ok(form)
    }
}

/// Trimmed text fields of a form without uploads
#[derive(Default, Debug)]
struct TextForm(HashMap<String, String>);

impl TextForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let value = field.text().await?.trim().to_string();
            fields.insert(name, value);
        }
        Ok(Self(fields))
    }

    /// Field value, empty when absent
    fn field(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or_default()
    }
}

/// Whether a request's `Origin` may use this server.
///
/// No `Origin` header means a navigation or a non-browser client. Otherwise
/// the origin must be this server's own (its authority equals `Host`) or be
/// listed in `allowed`. The opaque `null` origin never matches.
fn origin_allowed(headers: &HeaderMap, allowed: &[String]) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    let origin = origin.trim_end_matches('/');
    if allowed
        .iter()
        .any(|entry| entry.trim_end_matches('/').eq_ignore_ascii_case(origin))
    {
        return true;
    }

    let authority = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"));
    let host = headers.get(header::HOST).and_then(|host| host.to_str().ok());
    match (authority, host) {
        (Some(authority), Some(host)) => authority.eq_ignore_ascii_case(host),
        _ => false,
    }
}

async fn guard_origin<B>(
    State(state): State<AppState>,
    request: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    if !origin_allowed(request.headers(), state.config.allowed_origins()) {
        return Err(ApiError::forbidden("Cross-origin requests are not allowed"));
    }
    Ok(next.run(request).await)
}

/// CORS headers only for the configured origins
fn cors_layer(allowed: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim_end_matches('/')) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid allowed origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.config.allowed_origins());

    Router::new()
        .route("/", get(index))
        .route("/api/models", get(list_models))
        .route("/api/send", post(send_message))
        .route("/api/history/:response_id", get(response_history))
        .route("/api/conversations", post(create_conversation))
        .route(
            "/api/conversations/:conversation_id/continue",
            post(continue_conversation),
        )
        .route(
            "/api/conversations/:conversation_id/items",
            get(conversation_items),
        )
        .layer(middleware::from_fn_with_state(state.clone(), guard_origin))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on http://{}", addr);
    for origin in state.config.allowed_origins() {
        info!("Allowing cross-origin requests from {}", origin);
    }

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>, ApiError> {
    let client = state.client(query.api_key.as_deref())?;
    let models = client.list_models().await?;
    Ok(Json(json!({ "models": models })))
}

async fn send_message(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SendResponse>, ApiError> {
    let form = SendForm::read(multipart).await?;

    let client = state.client(form.api_key.as_deref())?;
    if form.message.is_empty() && form.images.is_empty() {
        return Err(ApiError::bad_request("Message or images required"));
    }
    let options = state.turn_options(&form.model, &form.reasoning_effort)?;

    let mut session = match ResponseId::parse(form.response_id) {
        Some(id) => SessionState::resume(id),
        None => SessionState::new(),
    };
    for image in form.images {
        session.queue_attachment(image);
    }

    let record = client.advance(&mut session, &form.message, &options).await?;
    info!("Conversation advanced to {}", record.response_id);

    Ok(Json(SendResponse {
        success: true,
        response: record.assistant_text,
        new_response_id: record.response_id.to_string(),
        model: record.model,
    }))
}

async fn response_history(
    State(state): State<AppState>,
    Path(response_id): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>, ApiError> {
    let client = state.client(query.api_key.as_deref())?;
    let id = ResponseId::parse(response_id)
        .ok_or_else(|| ApiError::bad_request("Response ID is required"))?;
    let thread = client.fetch_thread(&id).await?;
    Ok(Json(serde_json::to_value(thread).map_err(saver_core::SaverError::from)?))
}

async fn create_conversation(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = TextForm::read(multipart).await?;
    let client = state.client(Some(form.field("api_key")))?;

    let from = ResponseId::parse(form.field("from_response_id"));
    let converted = client
        .convert_to_conversation(from.as_ref(), Some(form.field("name")))
        .await?;

    Ok(Json(json!({
        "success": true,
        "conversation_id": converted.conversation_id,
        "items_added": converted.items_added,
        "from_response_id": converted.from_response_id,
        "name": converted.name,
    })))
}

async fn continue_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = TextForm::read(multipart).await?;
    let client = state.client(Some(form.field("api_key")))?;

    let id = ConversationId::parse(conversation_id)
        .ok_or_else(|| ApiError::bad_request("Conversation ID is required"))?;
    let message = form.field("message");
    if message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    let options = state.turn_options(form.field("model"), form.field("reasoning_effort"))?;

    let record = client.continue_conversation(&id, message, &options).await?;
    info!("Conversation {} answered by {}", id, record.response_id);

    Ok(Json(json!({
        "success": true,
        "response": record.assistant_text,
        "response_id": record.response_id,
        "conversation_id": id,
        "model": record.model,
    })))
}

async fn conversation_items(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>, ApiError> {
    let client = state.client(query.api_key.as_deref())?;
    let id = ConversationId::parse(conversation_id)
        .ok_or_else(|| ApiError::bad_request("Conversation ID is required"))?;
    let messages = client.conversation_messages(&id).await?;
    Ok(Json(json!({ "conversation_id": id, "messages": messages })))
}
