use std::collections::BTreeSet;

use async_trait::async_trait;
use shared::{domain::LaptopId, protocol::FavoriteStatus};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    api::{ApiClientError, ShopApi},
    navigation::Route,
};

const DEFAULT_RETURN_PATH: &str = "/products";

#[async_trait]
pub trait FavoritesBackend: Send + Sync {
    async fn favorite_ids(&self) -> Result<Vec<LaptopId>, ApiClientError>;
    async fn toggle_favorite(&self, id: &LaptopId) -> Result<FavoriteStatus, ApiClientError>;
}

#[async_trait]
impl FavoritesBackend for ShopApi {
    async fn favorite_ids(&self) -> Result<Vec<LaptopId>, ApiClientError> {
        ShopApi::favorite_ids(self).await
    }

    async fn toggle_favorite(&self, id: &LaptopId) -> Result<FavoriteStatus, ApiClientError> {
        ShopApi::toggle_favorite(self, id).await
    }
}

#[derive(Debug, Error)]
pub enum FavoriteError {
    #[error("sign in to manage favorites")]
    LoginRequired(Route),
    #[error(transparent)]
    Backend(ApiClientError),
}

/// Local mirror of the signed-in user's favorite ids, used to render the
/// heart toggles.
#[derive(Debug, Clone)]
pub struct FavoritesTracker {
    favorite_ids: BTreeSet<LaptopId>,
    return_to: String,
}

impl Default for FavoritesTracker {
    fn default() -> Self {
        Self::for_page(DEFAULT_RETURN_PATH)
    }
}

impl FavoritesTracker {
    /// `return_to` is where a login prompt sends the user back to.
    pub fn for_page(return_to: impl Into<String>) -> Self {
        Self {
            favorite_ids: BTreeSet::new(),
            return_to: return_to.into(),
        }
    }

    pub fn contains(&self, id: &LaptopId) -> bool {
        self.favorite_ids.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &LaptopId> {
        self.favorite_ids.iter()
    }

    pub async fn load(&mut self, backend: &dyn FavoritesBackend) -> Result<(), FavoriteError> {
        let ids = backend
            .favorite_ids()
            .await
            .map_err(|err| self.classify(err))?;
        self.favorite_ids = ids.into_iter().collect();
        Ok(())
    }

    /// Flips membership on the server, then mirrors the server's answer.
    /// Returns whether `id` is a favorite afterwards. The local set is left
    /// untouched on failure.
    pub async fn toggle(
        &mut self,
        backend: &dyn FavoritesBackend,
        id: &LaptopId,
    ) -> Result<bool, FavoriteError> {
        let status = backend
            .toggle_favorite(id)
            .await
            .map_err(|err| self.classify(err))?;
        let now_favorite = match status {
            FavoriteStatus::Added => {
                self.favorite_ids.insert(id.clone());
                true
            }
            FavoriteStatus::Removed => {
                self.favorite_ids.remove(id);
                false
            }
        };
        info!(laptop_id = %id, favorite = now_favorite, "favorite toggled");
        Ok(now_favorite)
    }

    fn classify(&self, err: ApiClientError) -> FavoriteError {
        if err.requires_login() {
            FavoriteError::LoginRequired(Route::Login {
                return_to: self.return_to.clone(),
            })
        } else {
            warn!("favorites request failed: {err}");
            FavoriteError::Backend(err)
        }
    }
}
