// src/identity.rs
//! Bearer-token → user identity. Only used to decide whether a result may be
//! stored and whose history to list; scoring never sees identities.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::store::StoreClient;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let h = header.trim_start();
    let token = h
        .strip_prefix("Bearer ")
        .or_else(|| h.strip_prefix("bearer "))
        .unwrap_or(h)
        .trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `Ok(None)` means the token is not valid; `Err` means verification itself failed.
    async fn verify(&self, token: &str) -> anyhow::Result<Option<UserId>>;
    fn name(&self) -> &'static str;
}

pub type DynIdentityVerifier = Arc<dyn IdentityVerifier>;

/// Fixed token table, configured under `[auth.tokens]`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, UserId>,
}

impl StaticTokens {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(t, u)| (t, UserId::new(u)))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for StaticTokens {
    async fn verify(&self, token: &str) -> anyhow::Result<Option<UserId>> {
        Ok(self.tokens.get(token).cloned())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Verifier backed by the store's `/auth/v1/user` endpoint.
pub struct RestIdentity {
    store: StoreClient,
}

impl RestIdentity {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for RestIdentity {
    async fn verify(&self, token: &str) -> anyhow::Result<Option<UserId>> {
        #[derive(Deserialize)]
        struct AuthUser {
            id: String,
        }

        let resp = self
            .store
            .get_as_user(&self.store.auth_user_url(), token)
            .send()
            .await
            .context("auth user lookup")?;

        if matches!(
            resp.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }
        let user: AuthUser = resp
            .error_for_status()
            .context("auth user non-2xx")?
            .json()
            .await
            .context("auth user body")?;
        Ok(Some(UserId::new(user.id)))
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
