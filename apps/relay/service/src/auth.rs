use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::store::{RelayStore, StoreError};

type HmacSha256 = Hmac<Sha256>;

pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// DER prefix of an Ed25519 SubjectPublicKeyInfo blob; the raw key is the
/// trailing 32 bytes.
const SPKI_ED25519_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed credentials")]
    MissingCredentials,
    #[error("unknown or revoked api key")]
    UnknownCredential,
    #[error("agent has no active verification key")]
    AgentNotRegistered,
    #[error("api key pepper is not configured")]
    Misconfigured,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub api_key_id: String,
    pub tenant_id: String,
}

/// Credential resolver and agent key registry over the storage seam.
#[derive(Clone)]
pub struct GatewayAuth {
    store: Arc<dyn RelayStore>,
    pepper: Option<String>,
}

impl GatewayAuth {
    pub fn new(store: Arc<dyn RelayStore>, pepper: Option<String>) -> Self {
        Self { store, pepper }
    }

    /// Maps the bearer key to a tenant via the peppered HMAC lookup token.
    /// A missing pepper is a server misconfiguration, not a caller error.
    pub async fn resolve_credential(
        &self,
        headers: &HeaderMap,
    ) -> Result<ResolvedCredential, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingCredentials)?;
        let pepper = self.pepper.as_deref().ok_or(AuthError::Misconfigured)?;
        let key_id = derive_key_id(pepper, &token)?;

        let record = self
            .store
            .find_api_key(&key_id)
            .await?
            .ok_or(AuthError::UnknownCredential)?;
        if record.revoked_at.is_some() {
            return Err(AuthError::UnknownCredential);
        }

        Ok(ResolvedCredential {
            api_key_id: record.id,
            tenant_id: record.tenant_id,
        })
    }

    /// Returns the agent's Ed25519 verification key, extracted from the
    /// trailing bytes of the stored SPKI blob. Absent, revoked, and
    /// undecodable records all collapse to `AgentNotRegistered`.
    pub async fn verifying_key(
        &self,
        tenant_id: &str,
        agent_id: &str,
    ) -> Result<VerifyingKey, AuthError> {
        let record = self
            .store
            .find_agent_key(tenant_id, agent_id)
            .await?
            .ok_or(AuthError::AgentNotRegistered)?;
        if record.revoked_at.is_some() {
            return Err(AuthError::AgentNotRegistered);
        }

        verifying_key_from_spki(&record.public_key_der).ok_or(AuthError::AgentNotRegistered)
    }

    /// Whether the tenant has an active key for the agent, for recipient
    /// validation.
    pub async fn agent_registered(
        &self,
        tenant_id: &str,
        agent_id: &str,
    ) -> Result<bool, AuthError> {
        let record = self.store.find_agent_key(tenant_id, agent_id).await?;
        Ok(record.is_some_and(|record| record.revoked_at.is_none()))
    }

    /// Detached best-effort usage stamp. Never delays or fails a response.
    pub fn spawn_touch_last_used(&self, api_key_id: &str) {
        let store = Arc::clone(&self.store);
        let api_key_id = api_key_id.to_string();
        tokio::spawn(async move {
            if let Err(error) = store.touch_api_key_last_used(&api_key_id, Utc::now()).await {
                tracing::debug!(%error, "failed to stamp api key last_used_at");
            }
        });
    }
}

pub fn derive_key_id(pepper: &str, raw_key: &str) -> Result<String, AuthError> {
    let mut mac =
        HmacSha256::new_from_slice(pepper.as_bytes()).map_err(|_| AuthError::Misconfigured)?;
    mac.update(raw_key.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn agent_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AGENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Encodes a raw Ed25519 public key as a base64url SPKI blob, the format
/// the registry stores. Provisioning tooling and tests build records with
/// this.
pub fn encode_spki_public_key(raw: &[u8; PUBLIC_KEY_LENGTH]) -> String {
    let mut der = Vec::with_capacity(SPKI_ED25519_PREFIX.len() + raw.len());
    der.extend_from_slice(&SPKI_ED25519_PREFIX);
    der.extend_from_slice(raw);
    URL_SAFE_NO_PAD.encode(der)
}

fn verifying_key_from_spki(public_key_der: &str) -> Option<VerifyingKey> {
    let der = URL_SAFE_NO_PAD.decode(public_key_der.trim()).ok()?;
    if der.len() < PUBLIC_KEY_LENGTH {
        return None;
    }
    let raw: [u8; PUBLIC_KEY_LENGTH] = der[der.len() - PUBLIC_KEY_LENGTH..].try_into().ok()?;
    VerifyingKey::from_bytes(&raw).ok()
}
