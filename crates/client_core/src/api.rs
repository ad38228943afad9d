//! HTTP client for the shop REST API.

use std::time::Duration;

use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{LaptopId, UserId},
    error::ApiErrorBody,
    protocol::{
        laptop_ids_from_values, AccountSummary, AuthResponse, ChatbotReply, ChatbotRequest,
        ChatbotResponse, Favorite, FavoriteStatus, FavoriteToggleRequest, FavoriteToggleResponse,
        FavoritesResponse, FinderRequest, FinderResponse, ListingPage, ListingResponse,
        LoginRequest, ProfileResponse, ProfileUpdate, Product, RawProduct, SignupRequest,
    },
};
use storage::KeyValueStore;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::{config::ClientSettings, query::ListingQuery, store_keys};

const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("invalid api base url '{0}'")]
    InvalidBaseUrl(String),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("unexpected response from {endpoint}: {source}")]
    Malformed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("sign-in required for {endpoint}")]
    AuthenticationRequired { endpoint: String },
}

impl ApiClientError {
    pub fn requires_login(&self) -> bool {
        match self {
            ApiClientError::AuthenticationRequired { .. } => true,
            ApiClientError::Status { status, .. } => {
                *status == StatusCode::UNAUTHORIZED.as_u16()
                    || *status == StatusCode::FORBIDDEN.as_u16()
            }
            _ => false,
        }
    }
}

pub struct ShopApi {
    http: Client,
    base_url: Url,
    auth_token: RwLock<Option<String>>,
}

impl ShopApi {
    pub fn new(base_url: &str) -> Result<Self, ApiClientError> {
        Self::with_client(base_url, Client::new())
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ApiClientError> {
        let mut builder = Client::builder();
        if let Some(seconds) = settings.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let http = builder.build().map_err(ApiClientError::Client)?;
        Self::with_client(&settings.api_base_url, http)
    }

    fn with_client(base_url: &str, http: Client) -> Result<Self, ApiClientError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed)
            .map_err(|_| ApiClientError::InvalidBaseUrl(base_url.to_string()))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiClientError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url: parsed,
            auth_token: RwLock::new(None),
        })
    }

    /// Picks up the token persisted by a previous login.
    pub async fn load_auth_token(&self, store: &dyn KeyValueStore) -> anyhow::Result<bool> {
        let token = store
            .get(store_keys::AUTH_TOKEN)
            .await?
            .filter(|token| !token.is_empty());
        let found = token.is_some();
        *self.auth_token.write().await = token;
        Ok(found)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth_token.read().await.is_some()
    }

    /// `segments` are appended to the base path; the result keeps the
    /// trailing slash the API routes expect.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
            path.push("");
        }
        url
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_token.read().await.as_deref() {
            Some(token) => request.header(AUTHORIZATION, format!("Token {token}")),
            None => request,
        }
    }

    async fn require_auth(&self, endpoint: &Url) -> Result<(), ApiClientError> {
        if self.is_authenticated().await {
            Ok(())
        } else {
            Err(ApiClientError::AuthenticationRequired {
                endpoint: endpoint.path().to_string(),
            })
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &Url,
        request: RequestBuilder,
    ) -> Result<T, ApiClientError> {
        let endpoint_path = endpoint.path().to_string();
        debug!(endpoint = %endpoint_path, "sending api request");

        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .map_err(|source| ApiClientError::Transport {
                endpoint: endpoint_path.clone(),
                source,
            })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiClientError::Transport {
                endpoint: endpoint_path.clone(),
                source,
            })?;

        if !status.is_success() {
            let message = error_message(status, &body);
            warn!(endpoint = %endpoint_path, status = status.as_u16(), "api request failed: {message}");
            return Err(ApiClientError::Status {
                endpoint: endpoint_path,
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|source| {
            warn!(endpoint = %endpoint_path, "unexpected response body: {source}");
            ApiClientError::Malformed {
                endpoint: endpoint_path,
                source,
            }
        })
    }

    pub async fn list_laptops(&self, query: &ListingQuery) -> Result<ListingPage, ApiClientError> {
        let url = self.endpoint(&["laptops"]);
        let request = self.http.get(url.clone()).query(&query.to_pairs());
        let response: ListingResponse = self.send_json(&url, request).await?;
        Ok(response.into_page(self.base_url()))
    }

    pub async fn laptop(&self, id: &LaptopId) -> Result<Product, ApiClientError> {
        let url = self.endpoint(&["laptops", id.as_str()]);
        let request = self.http.get(url.clone());
        let raw: RawProduct = self.send_json(&url, request).await?;
        raw.normalize(self.base_url())
            .ok_or_else(|| ApiClientError::Status {
                endpoint: url.path().to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("laptop {id} has no usable id in response"),
            })
    }

    /// Both products of a compare view, fetched concurrently.
    pub async fn compare(
        &self,
        first: &LaptopId,
        second: &LaptopId,
    ) -> Result<(Product, Product), ApiClientError> {
        futures::try_join!(self.laptop(first), self.laptop(second))
    }

    pub async fn chatbot(&self, message: &str) -> Result<ChatbotReply, ApiClientError> {
        let url = self.endpoint(&["chatbot"]);
        let request = self.http.post(url.clone()).json(&ChatbotRequest {
            message: message.to_string(),
        });
        let response: ChatbotResponse = self.send_json(&url, request).await?;
        Ok(response.into_reply(self.base_url()))
    }

    pub async fn laptop_finder(
        &self,
        request: &FinderRequest,
    ) -> Result<Vec<Product>, ApiClientError> {
        let url = self.endpoint(&["laptop-finder"]);
        let http_request = self.http.post(url.clone()).json(request);
        let response: FinderResponse = self.send_json(&url, http_request).await?;
        Ok(shared::protocol::normalize_products(
            response.results,
            self.base_url(),
        ))
    }

    pub async fn favorite_ids(&self) -> Result<Vec<LaptopId>, ApiClientError> {
        let url = self.endpoint(&["favorites", "laptop_ids"]);
        self.require_auth(&url).await?;
        let request = self.http.get(url.clone());
        let values: Vec<serde_json::Value> = self.send_json(&url, request).await?;
        Ok(laptop_ids_from_values(values))
    }

    pub async fn toggle_favorite(&self, id: &LaptopId) -> Result<FavoriteStatus, ApiClientError> {
        let url = self.endpoint(&["favorites", "toggle"]);
        self.require_auth(&url).await?;
        let request = self.http.post(url.clone()).json(&FavoriteToggleRequest {
            laptop_id: id.clone(),
        });
        let response: FavoriteToggleResponse = self.send_json(&url, request).await?;
        Ok(response.status)
    }

    pub async fn favorites(&self) -> Result<Vec<Favorite>, ApiClientError> {
        let url = self.endpoint(&["favorites"]);
        self.require_auth(&url).await?;
        let request = self.http.get(url.clone());
        let response: FavoritesResponse = self.send_json(&url, request).await?;
        Ok(response.into_favorites(self.base_url()))
    }

    /// Signs in and keeps the issued token for subsequent requests.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiClientError> {
        let url = self.endpoint(&["auth", "login"]);
        let request = self.http.post(url.clone()).json(credentials);
        let response: AuthResponse = self.send_json(&url, request).await?;
        *self.auth_token.write().await = Some(response.token.clone());
        Ok(response)
    }

    /// Creates the account and signs in with it.
    pub async fn signup(&self, account: &SignupRequest) -> Result<AuthResponse, ApiClientError> {
        let url = self.endpoint(&["auth", "signup"]);
        let request = self.http.post(url.clone()).json(account);
        let response: AuthResponse = self.send_json(&url, request).await?;
        *self.auth_token.write().await = Some(response.token.clone());
        Ok(response)
    }

    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<AccountSummary, ApiClientError> {
        let user_id = id.0.to_string();
        let url = self.endpoint(&["auth", "profile", user_id.as_str()]);
        self.require_auth(&url).await?;
        let request = self.http.put(url.clone()).json(update);
        let response: ProfileResponse = self.send_json(&url, request).await?;
        Ok(response.user)
    }

    /// Where the browser goes to start the Google sign-in; the server
    /// redirects back to the front-end callback with the token in the query.
    pub fn google_login_url(&self) -> String {
        self.endpoint(&["auth", "google"]).to_string()
    }

    pub async fn logout(&self) {
        *self.auth_token.write().await = None;
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
