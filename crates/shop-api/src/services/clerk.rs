//! # Clerk User Directory
//!
//! [`UserDirectory`] backed by the Clerk Backend API (`GET /v1/users/{id}`).

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use shop_core::{ShopError, ShopResult, UserDirectory, UserProfile};
use tracing::instrument;

/// Clerk Backend API client
pub struct ClerkUserDirectory {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl ClerkUserDirectory {
    pub fn new(client: reqwest::Client, api_url: &str, secret_key: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// `<api_url>/v1/users/<user_id>` with the id encoded as one path segment
    fn user_url(&self, user_id: &str) -> ShopResult<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| ShopError::Configuration(format!("Invalid Clerk API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                ShopError::Configuration(format!("Clerk API URL cannot be a base: {}", self.api_url))
            })?
            .pop_if_empty()
            .extend(["v1", "users", user_id]);
        Ok(url)
    }
}

#[async_trait]
impl UserDirectory for ClerkUserDirectory {
    #[instrument(skip(self))]
    async fn get_user(&self, user_id: &str) -> ShopResult<Option<UserProfile>> {
        let response = self
            .client
            .get(self.user_url(user_id)?)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ShopError::Network(format!("Clerk request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let user = response.json::<UserProfile>().await.map_err(|e| {
                    ShopError::UserLookup(format!("Invalid Clerk user payload: {}", e))
                })?;
                Ok(Some(user))
            }
            status => Err(ShopError::UserLookup(format!(
                "Clerk returned {} for user {}",
                status, user_id
            ))),
        }
    }
}
