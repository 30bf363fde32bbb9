use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::SystemTime;

use axum::body::{Body, Bytes, to_bytes};
use axum::extract::{Path, Query, Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub mod api_envelope;
pub mod auth;
pub mod channel;
pub mod config;
pub mod observability;
pub mod rate_limit;
pub mod signature;
pub mod store;

use crate::api_envelope::{
    ApiErrorCode, ApiErrorTuple, error_response, forbidden_error, internal_error, not_found_error,
    unauthorized_error, validation_error,
};
use crate::auth::{AuthError, GatewayAuth};
use crate::config::Config;
use crate::observability::{AuditEvent, Observability};
use crate::rate_limit::{
    RateLimitAdvisory, RateLimitCeilings, RateLimitExceeded, RateLimitOutcome, RateLimiter,
};
use crate::signature::{SignatureError, SignatureHeaders};
use crate::store::{MemoryStore, MessageRecord, NonceInsert, NonceRecord, RelayStore, StoreError};

const SERVICE_NAME: &str = "toaklink-relay-service";
/// Routes live below this mount; the canonical signing path is the part of
/// the request path underneath it, query string included verbatim.
const MOUNT_PREFIX: &str = "/v1/toaklink";

const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

const RECENT_DEFAULT_LIMIT: usize = 20;
const RECENT_MAX_LIMIT: usize = 50;
const INBOX_SCAN_LIMIT: usize = 200;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn RelayStore>,
    auth: GatewayAuth,
    rate_limiter: RateLimiter,
    observability: Observability,
    started_at: SystemTime,
}

/// Identity established by the signed-request gate; the only thing the
/// message router trusts.
#[derive(Debug, Clone)]
pub struct VerifiedAgent {
    pub tenant_id: String,
    pub agent_id: String,
    pub api_key_id: String,
}

pub fn build_router(config: Config) -> Router {
    let store = Arc::new(MemoryStore::from_config(&config));
    build_router_with_store(config, store, Observability::default())
}

pub fn build_router_with_observability(config: Config, observability: Observability) -> Router {
    let store = Arc::new(MemoryStore::from_config(&config));
    build_router_with_store(config, store, observability)
}

pub fn build_router_with_store(
    config: Config,
    store: Arc<dyn RelayStore>,
    observability: Observability,
) -> Router {
    let auth = GatewayAuth::new(Arc::clone(&store), config.api_key_pepper.clone());
    let rate_limiter = RateLimiter::new(Arc::clone(&store), RateLimitCeilings::from_config(&config));
    let state = AppState {
        config: Arc::new(config),
        store,
        auth,
        rate_limiter,
        observability,
        started_at: SystemTime::now(),
    };
    let gate_state = state.clone();

    let signed_router = Router::new()
        .route("/v1/toaklink/send", post(send_message))
        .route("/v1/toaklink/link", post(link_channel))
        .route("/v1/toaklink/inbox/:agent_id", get(inbox))
        .route("/v1/toaklink/channel/:channel_id", get(channel_view))
        .route("/v1/toaklink/channel/:channel_id/read", post(mark_channel_read))
        .route("/v1/toaklink/recent/:agent_id", get(recent_messages))
        .route_layer(middleware::from_fn_with_state(
            gate_state,
            signed_request_gate,
        ));

    Router::new()
        .route("/healthz", get(health))
        .route("/readyz", get(readiness))
        .merge(signed_router)
        .fallback(unknown_route)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        )
}

// ---------------------------------------------------------------------------
// Signed-request gate
// ---------------------------------------------------------------------------

/// Runs the full admission pipeline over the buffered request: credential,
/// agent key, timestamp freshness, body hash, nonce ledger, signature,
/// rate limits. Handlers behind this gate only ever see requests that
/// passed every stage.
async fn signed_request_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match to_bytes(body, state.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return error_response(
                ApiErrorCode::InvalidRequest,
                "Request body is too large or unreadable.",
            )
            .into_response();
        }
    };

    let (identity, advisory) = match verify_signed_request(&state, &parts, &body_bytes).await {
        Ok(admitted) => admitted,
        Err(rejection) => return rejection,
    };

    // Advisory usage stamp; detached so it can never delay the response.
    state.auth.spawn_touch_last_used(&identity.api_key_id);

    let mut request = Request::from_parts(parts, Body::from(body_bytes));
    request.extensions_mut().insert(identity);
    let mut response = next.run(request).await;
    apply_rate_limit_headers(
        response.headers_mut(),
        advisory.limit,
        advisory.remaining,
        advisory.reset_epoch,
    );
    response
}

async fn verify_signed_request(
    state: &AppState,
    parts: &Parts,
    body: &[u8],
) -> Result<(VerifiedAgent, RateLimitAdvisory), Response> {
    let credential = match state.auth.resolve_credential(&parts.headers).await {
        Ok(credential) => credential,
        Err(error) => return Err(reject_auth(state, "credential", None, &error)),
    };

    let Some(agent_id) = auth::agent_id_from_headers(&parts.headers) else {
        return Err(reject(
            state,
            "agent_key",
            None,
            unauthorized_error("Invalid or missing credentials."),
        ));
    };

    let verifying_key = match state
        .auth
        .verifying_key(&credential.tenant_id, &agent_id)
        .await
    {
        Ok(key) => key,
        Err(error) => return Err(reject_auth(state, "agent_key", Some(agent_id.as_str()), &error)),
    };

    let headers = match SignatureHeaders::from_header_map(&parts.headers) {
        Ok(headers) => headers,
        Err(error) => {
            return Err(reject_signature(state, "signature_headers", &agent_id, &error));
        }
    };

    let timestamp = match headers.parsed_timestamp() {
        Ok(timestamp) => timestamp,
        Err(error) => {
            return Err(reject_signature(state, "signature_headers", &agent_id, &error));
        }
    };

    let now = Utc::now();
    if let Err(error) =
        signature::check_freshness(timestamp, now, state.config.signature_freshness_seconds)
    {
        return Err(reject_signature(state, "timestamp", &agent_id, &error));
    }

    if let Err(error) = signature::check_body_hash(body, &headers.body_hash) {
        return Err(reject_signature(state, "body_hash", &agent_id, &error));
    }

    // Housekeeping only; a failed purge never blocks admission.
    if let Err(error) = state.store.purge_expired_nonces(now).await {
        tracing::debug!(%error, "expired nonce purge failed");
    }

    // The nonce is recorded before the signature is checked so a replayed
    // capture is refused without paying for the asymmetric verify.
    let nonce_record = NonceRecord {
        tenant_id: credential.tenant_id.clone(),
        agent_id: agent_id.clone(),
        nonce: headers.nonce.clone(),
        expires_at: now + Duration::seconds(state.config.signature_freshness_seconds),
    };
    match state.store.insert_nonce(nonce_record, now).await {
        Ok(NonceInsert::Recorded) => {}
        Ok(NonceInsert::Replayed) => {
            return Err(reject(
                state,
                "nonce",
                Some(agent_id.as_str()),
                error_response(ApiErrorCode::NonceReplay, "Nonce has already been used."),
            ));
        }
        Err(error) => return Err(reject_storage(state, "nonce", Some(agent_id.as_str()), &error)),
    }

    let canonical = signature::canonical_string(
        &parts.method,
        &canonical_path_and_query(&parts.uri),
        &headers.timestamp,
        &headers.nonce,
        &headers.body_hash,
        &agent_id,
    );
    if let Err(error) = signature::verify_detached(&verifying_key, &canonical, &headers.signature) {
        return Err(reject_signature(state, "signature", &agent_id, &error));
    }

    match state
        .rate_limiter
        .check(&credential.tenant_id, &credential.api_key_id, now)
        .await
    {
        Ok(RateLimitOutcome::Admitted(advisory)) => Ok((
            VerifiedAgent {
                tenant_id: credential.tenant_id,
                agent_id,
                api_key_id: credential.api_key_id,
            },
            advisory,
        )),
        Ok(RateLimitOutcome::Limited(exceeded)) => {
            Err(rate_limited_response(state, &agent_id, &exceeded))
        }
        // Fail closed: an unavailable counter store must never admit.
        Err(error) => {
            tracing::error!(%error, "rate limit check failed");
            Err(reject(
                state,
                "rate_limit",
                Some(agent_id.as_str()),
                internal_error("Rate limit backend unavailable."),
            ))
        }
    }
}

/// The request path below the service mount, query string included, as both
/// sides feed it into the canonical string.
fn canonical_path_and_query(uri: &Uri) -> String {
    let full = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    match full.strip_prefix(MOUNT_PREFIX) {
        Some("") => "/".to_string(),
        Some(rest) => rest.to_string(),
        None => full.to_string(),
    }
}

fn reject(
    state: &AppState,
    stage: &'static str,
    agent_id: Option<&str>,
    tuple: ApiErrorTuple,
) -> Response {
    state.observability.record(AuditEvent::RequestRejected {
        stage,
        code: tuple.1.0.error.code,
        agent_id: agent_id.map(ToString::to_string),
    });
    tuple.into_response()
}

fn reject_auth(
    state: &AppState,
    stage: &'static str,
    agent_id: Option<&str>,
    error: &AuthError,
) -> Response {
    let tuple = match error {
        // A bad key and an unregistered agent are indistinguishable on
        // the wire.
        AuthError::MissingCredentials
        | AuthError::UnknownCredential
        | AuthError::AgentNotRegistered => unauthorized_error("Invalid or missing credentials."),
        AuthError::Misconfigured => {
            tracing::error!("api key pepper is not configured");
            internal_error("Relay gateway is misconfigured.")
        }
        AuthError::Store(error) => {
            tracing::error!(%error, "credential lookup failed");
            internal_error("Storage backend unavailable.")
        }
    };
    reject(state, stage, agent_id, tuple)
}

fn reject_signature(
    state: &AppState,
    stage: &'static str,
    agent_id: &str,
    error: &SignatureError,
) -> Response {
    let tuple = match error {
        SignatureError::MalformedHeaders => error_response(
            ApiErrorCode::SignatureHeadersInvalid,
            "Signature headers are missing or malformed.",
        ),
        SignatureError::TimestampExpired => error_response(
            ApiErrorCode::TimestampExpired,
            "Signature timestamp is outside the freshness window.",
        ),
        SignatureError::BodyHashMismatch => error_response(
            ApiErrorCode::BodyHashMismatch,
            "Request body hash does not match.",
        ),
        SignatureError::InvalidSignature => error_response(
            ApiErrorCode::InvalidSignature,
            "Signature verification failed.",
        ),
    };
    reject(state, stage, Some(agent_id), tuple)
}

fn reject_storage(
    state: &AppState,
    stage: &'static str,
    agent_id: Option<&str>,
    error: &StoreError,
) -> Response {
    tracing::error!(%error, stage, "storage failure in signature path");
    reject(
        state,
        stage,
        agent_id,
        internal_error("Storage backend unavailable."),
    )
}

fn rate_limited_response(
    state: &AppState,
    agent_id: &str,
    exceeded: &RateLimitExceeded,
) -> Response {
    let tuple = error_response(
        ApiErrorCode::RateLimited,
        format!(
            "Rate limit exceeded. Retry in {}s.",
            exceeded.retry_after_seconds
        ),
    );
    let mut response = reject(state, "rate_limit", Some(agent_id), tuple);
    apply_rate_limit_headers(
        response.headers_mut(),
        exceeded.limit,
        0,
        exceeded.reset_epoch,
    );
    if let Ok(value) = HeaderValue::from_str(&exceeded.retry_after_seconds.to_string()) {
        response.headers_mut().insert(RETRY_AFTER, value);
    }
    response
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, limit: u64, remaining: u64, reset: i64) {
    let entries = [
        (RATE_LIMIT_LIMIT_HEADER, limit.to_string()),
        (RATE_LIMIT_REMAINING_HEADER, remaining.to_string()),
        (RATE_LIMIT_RESET_HEADER, reset.to_string()),
    ];
    for (name, value) in entries {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

// ---------------------------------------------------------------------------
// Message router
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    subject: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageResponse {
    success: bool,
    channel_id: String,
    message_id: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct LinkChannelRequest {
    #[serde(default)]
    to: String,
}

#[derive(Debug, Serialize)]
struct ChannelDescriptor {
    id: String,
    participants: Vec<String>,
    created_at: String,
    last_activity: String,
}

#[derive(Debug, Serialize)]
struct MessageView {
    id: String,
    channel_id: String,
    sender: String,
    recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    body: String,
    read: bool,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct ChannelSummary {
    id: String,
    participants: Vec<String>,
    unread_count: u64,
    last_message: MessageView,
    last_activity: String,
}

#[derive(Debug, Serialize)]
struct InboxResponse {
    channels: Vec<ChannelSummary>,
    total_unread: u64,
}

#[derive(Debug, Serialize)]
struct ChannelMessagesResponse {
    channel_id: String,
    messages: Vec<MessageView>,
    participants: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MarkReadResponse {
    success: bool,
    updated: u64,
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RecentResponse {
    messages: Vec<MessageView>,
}

async fn send_message(
    State(state): State<AppState>,
    Extension(agent): Extension<VerifiedAgent>,
    body: Bytes,
) -> Result<Json<SendMessageResponse>, ApiErrorTuple> {
    let payload: SendMessageRequest = parse_json_body(&body)?;

    let recipient = payload.to.trim().to_lowercase();
    if recipient.is_empty() {
        return Err(validation_error("to", "Recipient must not be empty."));
    }
    if payload.message.trim().is_empty() {
        return Err(validation_error("message", "Message must not be empty."));
    }

    ensure_recipient_registered(&state, &agent.tenant_id, &recipient).await?;

    let now = Utc::now();
    let record = MessageRecord {
        id: format!("msg_{}", Uuid::new_v4().simple()),
        tenant_id: agent.tenant_id.clone(),
        sender: agent.agent_id.clone(),
        recipient: recipient.clone(),
        subject: payload
            .subject
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        body: payload.message,
        thread_id: channel::thread_id(&agent.agent_id, &recipient),
        read: false,
        created_at: now,
    };
    state
        .store
        .insert_message(record.clone())
        .await
        .map_err(storage_error)?;

    state.observability.record(AuditEvent::MessageSent {
        tenant_id: agent.tenant_id,
        sender: agent.agent_id,
        recipient,
        channel_id: record.thread_id.clone(),
    });

    Ok(Json(SendMessageResponse {
        success: true,
        channel_id: record.thread_id,
        message_id: record.id,
        timestamp: rfc3339(now),
    }))
}

async fn link_channel(
    State(state): State<AppState>,
    Extension(agent): Extension<VerifiedAgent>,
    body: Bytes,
) -> Result<Json<ChannelDescriptor>, ApiErrorTuple> {
    let payload: LinkChannelRequest = parse_json_body(&body)?;

    let peer = payload.to.trim().to_lowercase();
    if peer.is_empty() {
        return Err(validation_error("to", "Recipient must not be empty."));
    }

    ensure_recipient_registered(&state, &agent.tenant_id, &peer).await?;

    let thread_id = channel::thread_id(&agent.agent_id, &peer);
    let messages = state
        .store
        .messages_in_thread(&agent.tenant_id, &thread_id)
        .await
        .map_err(storage_error)?;

    let now = Utc::now();
    let created_at = messages.first().map_or(now, |message| message.created_at);
    let last_activity = messages.last().map_or(now, |message| message.created_at);

    Ok(Json(ChannelDescriptor {
        id: thread_id,
        participants: vec![agent.agent_id, peer],
        created_at: rfc3339(created_at),
        last_activity: rfc3339(last_activity),
    }))
}

async fn inbox(
    State(state): State<AppState>,
    Extension(agent): Extension<VerifiedAgent>,
    Path(agent_id): Path<String>,
) -> Result<Json<InboxResponse>, ApiErrorTuple> {
    ensure_path_agent(&agent, &agent_id)?;

    let messages = state
        .store
        .messages_involving(&agent.tenant_id, &agent.agent_id, INBOX_SCAN_LIMIT)
        .await
        .map_err(storage_error)?;

    // Newest first, so the first message seen per thread is its latest.
    let mut order: Vec<String> = Vec::new();
    let mut summaries: std::collections::HashMap<String, ChannelSummary> =
        std::collections::HashMap::new();
    let mut total_unread = 0u64;

    for message in messages {
        let unread = !message.read && message.recipient == agent.agent_id;
        if unread {
            total_unread += 1;
        }

        let summary = summaries
            .entry(message.thread_id.clone())
            .or_insert_with(|| {
                order.push(message.thread_id.clone());
                ChannelSummary {
                    id: message.thread_id.clone(),
                    participants: Vec::new(),
                    unread_count: 0,
                    last_message: message_view(&message),
                    last_activity: rfc3339(message.created_at),
                }
            });
        if unread {
            summary.unread_count += 1;
        }
        for participant in [&message.sender, &message.recipient] {
            if !summary.participants.contains(participant) {
                summary.participants.push(participant.clone());
            }
        }
    }

    let channels = order
        .into_iter()
        .filter_map(|thread_id| summaries.remove(&thread_id))
        .collect();

    Ok(Json(InboxResponse {
        channels,
        total_unread,
    }))
}

async fn channel_view(
    State(state): State<AppState>,
    Extension(agent): Extension<VerifiedAgent>,
    Path(channel_id): Path<String>,
) -> Result<Json<ChannelMessagesResponse>, ApiErrorTuple> {
    let messages = state
        .store
        .messages_in_thread(&agent.tenant_id, &channel_id)
        .await
        .map_err(storage_error)?;

    // A thread nobody has written to does not exist yet; see DESIGN.md for
    // the 404-vs-403 decision on empty channels.
    if messages.is_empty() {
        return Err(not_found_error("Unknown channel."));
    }

    let participants: BTreeSet<String> = messages
        .iter()
        .flat_map(|message| [message.sender.clone(), message.recipient.clone()])
        .collect();
    if !participants.contains(&agent.agent_id) {
        return Err(forbidden_error("Not a participant in this channel."));
    }

    Ok(Json(ChannelMessagesResponse {
        channel_id,
        messages: messages.iter().map(message_view).collect(),
        participants: participants.into_iter().collect(),
    }))
}

async fn mark_channel_read(
    State(state): State<AppState>,
    Extension(agent): Extension<VerifiedAgent>,
    Path(channel_id): Path<String>,
) -> Result<Json<MarkReadResponse>, ApiErrorTuple> {
    let updated = state
        .store
        .mark_thread_read(&agent.tenant_id, &channel_id, &agent.agent_id)
        .await
        .map_err(storage_error)?;

    state.observability.record(AuditEvent::ChannelRead {
        tenant_id: agent.tenant_id,
        agent_id: agent.agent_id,
        channel_id,
        updated,
    });

    Ok(Json(MarkReadResponse {
        success: true,
        updated,
    }))
}

async fn recent_messages(
    State(state): State<AppState>,
    Extension(agent): Extension<VerifiedAgent>,
    Path(agent_id): Path<String>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentResponse>, ApiErrorTuple> {
    ensure_path_agent(&agent, &agent_id)?;

    let limit = query
        .limit
        .unwrap_or(RECENT_DEFAULT_LIMIT)
        .clamp(1, RECENT_MAX_LIMIT);
    let messages = state
        .store
        .messages_involving(&agent.tenant_id, &agent.agent_id, limit)
        .await
        .map_err(storage_error)?;

    Ok(Json(RecentResponse {
        messages: messages.iter().map(message_view).collect(),
    }))
}

async fn ensure_recipient_registered(
    state: &AppState,
    tenant_id: &str,
    recipient: &str,
) -> Result<(), ApiErrorTuple> {
    let registered = state
        .auth
        .agent_registered(tenant_id, recipient)
        .await
        .map_err(|error| match error {
            AuthError::Store(error) => storage_error(error),
            _ => internal_error("Storage backend unavailable."),
        })?;
    if !registered {
        return Err(forbidden_error(
            "Recipient is not registered for this tenant.",
        ));
    }
    Ok(())
}

fn ensure_path_agent(agent: &VerifiedAgent, path_agent_id: &str) -> Result<(), ApiErrorTuple> {
    if path_agent_id.trim().to_lowercase() != agent.agent_id {
        return Err(forbidden_error(
            "Access is limited to the owning agent.",
        ));
    }
    Ok(())
}

fn parse_json_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiErrorTuple> {
    serde_json::from_slice(body).map_err(|_| {
        error_response(
            ApiErrorCode::InvalidRequest,
            "Request body must be valid JSON.",
        )
    })
}

fn message_view(message: &MessageRecord) -> MessageView {
    MessageView {
        id: message.id.clone(),
        channel_id: message.thread_id.clone(),
        sender: message.sender.clone(),
        recipient: message.recipient.clone(),
        subject: message.subject.clone(),
        body: message.body.clone(),
        read: message.read,
        created_at: rfc3339(message.created_at),
    }
}

fn storage_error(error: StoreError) -> ApiErrorTuple {
    tracing::error!(%error, "storage operation failed");
    internal_error("Storage backend unavailable.")
}

fn rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Health & fallback
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    status: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = state
        .started_at
        .elapsed()
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
    })
}

async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(ReadinessResponse { status: "ready" })),
        Err(error) => {
            tracing::warn!(%error, "store readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse { status: "degraded" }),
            )
        }
    }
}

async fn unknown_route() -> ApiErrorTuple {
    not_found_error("Route not found.")
}
