//! HTTP implementation of the `Backend` contract.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::error::ApiError;

use super::model::{ProfileRecord, SessionPayload, UsageSnapshot};
use super::Backend;

/// Backend client over the service's REST endpoints.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpBackend {
    /// Create a client for a service at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Attach a bearer token sent with every request.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        builder
    }

    async fn get(&self, endpoint: &str) -> Result<reqwest::Response, ApiError> {
        self.request(reqwest::Method::GET, endpoint)
            .send()
            .await
            .map_err(|e| ApiError::Http {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_session(&self) -> Result<Option<SessionPayload>, ApiError> {
        const ENDPOINT: &str = "/api/auth/session";
        let response = self.get(ENDPOINT).await?;
        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::UNAUTHORIZED => Ok(None),
            StatusCode::OK => {
                // The service returns JSON `null` for anonymous visitors on
                // some deployments; both shapes mean no session.
                let payload: Option<SessionPayload> = Self::decode(ENDPOINT, response).await?;
                Ok(payload)
            }
            status => Err(ApiError::Status {
                endpoint: ENDPOINT.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn fetch_usage(&self, user_id: Uuid) -> Result<UsageSnapshot, ApiError> {
        let endpoint = format!("/api/users/{user_id}/usage");
        let response = self.get(&endpoint).await?;
        match response.status() {
            StatusCode::OK => Self::decode(&endpoint, response).await,
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthenticated { endpoint }),
            status => Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
            }),
        }
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<ProfileRecord>, ApiError> {
        let endpoint = format!("/api/users/{user_id}/profile");
        let response = self.get(&endpoint).await?;
        match response.status() {
            StatusCode::OK => Ok(Some(Self::decode(&endpoint, response).await?)),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthenticated { endpoint }),
            status => Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
            }),
        }
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        const ENDPOINT: &str = "/api/auth/sign-out";
        let response = self
            .request(reqwest::Method::POST, ENDPOINT)
            .send()
            .await
            .map_err(|e| ApiError::Http {
                endpoint: ENDPOINT.to_string(),
                reason: e.to_string(),
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                endpoint: ENDPOINT.to_string(),
                status: response.status().as_u16(),
            })
        }
    }
}
