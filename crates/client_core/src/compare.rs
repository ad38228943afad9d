use std::sync::Arc;

use anyhow::Result;
use shared::domain::LaptopId;
use storage::KeyValueStore;
use tracing::debug;

use crate::{navigation::Route, store_keys};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareAction {
    /// Remembered; waiting for a second product.
    Pending(LaptopId),
    Navigate(Route),
}

/// The single pending compare id, kept in the store so it survives moving
/// between the listing and detail screens.
#[derive(Clone)]
pub struct CompareSelection {
    store: Arc<dyn KeyValueStore>,
}

impl CompareSelection {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn pending(&self) -> Result<Option<LaptopId>> {
        Ok(self
            .store
            .get(store_keys::COMPARE_PRODUCT_ID)
            .await?
            .filter(|id| !id.is_empty())
            .map(LaptopId::from))
    }

    pub async fn select(&self, id: &LaptopId) -> Result<CompareAction> {
        match self.pending().await? {
            Some(first) if &first != id => {
                self.clear().await?;
                debug!(first = %first, second = %id, "compare pair selected");
                Ok(CompareAction::Navigate(Route::Compare {
                    first,
                    second: id.clone(),
                }))
            }
            Some(first) => Ok(CompareAction::Pending(first)),
            None => {
                self.store
                    .set(store_keys::COMPARE_PRODUCT_ID, id.as_str())
                    .await?;
                Ok(CompareAction::Pending(id.clone()))
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.remove(store_keys::COMPARE_PRODUCT_ID).await
    }
}
