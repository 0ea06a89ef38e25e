//! HTTP-backed profile store
//!
//! Talks to the Studio JSON API:
//! - `GET {base}/profiles/{id}`
//! - `PATCH {base}/profiles/{id}` with a [`FlushRequest`] body
//!
//! Error responses are decoded from the JSON envelope back into the shared
//! taxonomy, so a rejected write surfaces with the same kind the server used.

use async_trait::async_trait;
use studio_core::{
    ApiError, ErrorEnvelope, FlushRequest, Profile, ProfileId, ProfileStore, StoreError,
};

/// [`ProfileStore`] over the Studio HTTP API
#[derive(Debug, Clone)]
pub struct HttpProfileStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpProfileStore {
    /// Create store for a base URL and bearer token
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// With a preconfigured client (timeouts, proxies)
    #[inline]
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn profile_url(&self, id: ProfileId) -> String {
        format!("{}/profiles/{id}", self.base_url)
    }

    async fn decode(response: reqwest::Response) -> Result<Profile, StoreError> {
        let status = response.status();
        if status.is_success() {
            return response.json::<Profile>().await.map_err(transport);
        }

        match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => Err(ApiError::from_envelope(status.as_u16(), envelope).into()),
            Err(e) => Err(ApiError::Internal(format!("{status}: undecodable error body: {e}")).into()),
        }
    }
}

fn transport(error: reqwest::Error) -> StoreError {
    StoreError::Transport(error.to_string())
}

#[async_trait]
impl ProfileStore for HttpProfileStore {
    async fn load(&self, id: ProfileId) -> Result<Profile, StoreError> {
        let response = self
            .client
            .get(self.profile_url(id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;

        Self::decode(response).await
    }

    async fn save(&self, request: FlushRequest) -> Result<Profile, StoreError> {
        let response = self
            .client
            .patch(self.profile_url(request.profile_id))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let store = HttpProfileStore::new("http://localhost:8080/", "tok");
        let id = ProfileId::new();
        assert_eq!(store.profile_url(id), format!("http://localhost:8080/profiles/{id}"));
    }
}
