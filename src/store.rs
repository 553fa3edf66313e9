// src/store.rs
//! Thin HTTP client for the external account/storage service
//! (PostgREST-style tables under `/rest/v1`, auth under `/auth/v1`).

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, RequestBuilder};

#[derive(Debug, Clone)]
pub struct StoreClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl StoreClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent("trust-lens/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building store http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub fn auth_user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }

    /// GET with the service key as both `apikey` and bearer.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.authorized(self.http.get(url), &self.api_key)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.authorized(self.http.post(url), &self.api_key)
    }

    /// GET on behalf of a user: service `apikey`, user bearer token.
    pub fn get_as_user(&self, url: &str, user_token: &str) -> RequestBuilder {
        self.authorized(self.http.get(url), user_token)
    }

    fn authorized(&self, rb: RequestBuilder, bearer: &str) -> RequestBuilder {
        rb.header("apikey", &self.api_key).bearer_auth(bearer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_normalized() {
        let c = StoreClient::new("https://store.example.org/", "k").unwrap();
        assert_eq!(
            c.table_url("keywords"),
            "https://store.example.org/rest/v1/keywords"
        );
        assert_eq!(c.auth_user_url(), "https://store.example.org/auth/v1/user");
    }
}
