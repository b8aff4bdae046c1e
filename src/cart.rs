use std::num::NonZeroU32;
use uuid::Uuid;

use crate::{
    error::{CartError, StoreError},
    models::{CartItem, CartKey, CartLine, Identity, RemoveOutcome},
    repository::{CartStoreState, CatalogState},
};

/// CartEngine
///
/// Applies add / remove / clear to a user's cart. The invariant it upholds is that a
/// stored line always has `quantity >= 1`; a line that would reach zero is deleted.
///
/// The engine holds no lock and no state of its own. Each mutation is exactly one
/// call into the `CartStore`, whose atomic primitives are what serialize concurrent
/// requests on the same `(user, product)` key. Every operation takes the caller's
/// `Identity`, so the user id always comes from a verified token.
#[derive(Clone)]
pub struct CartEngine {
    store: CartStoreState,
    catalog: CatalogState,
}

impl CartEngine {
    pub fn new(store: CartStoreState, catalog: CatalogState) -> Self {
        Self { store, catalog }
    }

    /// add
    ///
    /// Validates the product before any write, then increments (or creates at 1).
    pub async fn add(&self, identity: &Identity, product_id: Uuid) -> Result<CartLine, CartError> {
        if self.catalog.get_product(product_id).await?.is_none() {
            tracing::info!(user_id = %identity.id, %product_id, "add rejected: unknown product");
            return Err(CartError::ProductNotFound);
        }

        let key = CartKey::new(identity.id, product_id);
        let line = match self.store.upsert_increment(key, NonZeroU32::MIN).await {
            Ok(line) => line,
            // Deleted between the check above and the write.
            Err(StoreError::MissingReference) => {
                tracing::info!(user_id = %identity.id, %product_id, "add rejected: product vanished");
                return Err(CartError::ProductNotFound);
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(user_id = %identity.id, %product_id, quantity = line.quantity, "cart line incremented");
        Ok(line)
    }

    /// remove
    ///
    /// Takes one unit out. `Removed` means the last unit went and the line is gone.
    pub async fn remove(
        &self,
        identity: &Identity,
        product_id: Uuid,
    ) -> Result<RemoveOutcome, CartError> {
        let key = CartKey::new(identity.id, product_id);

        match self.store.remove_one(key).await? {
            Some(outcome) => {
                tracing::debug!(user_id = %identity.id, %product_id, ?outcome, "cart line decremented");
                Ok(outcome)
            }
            None => Err(CartError::NotInCart),
        }
    }

    /// clear
    ///
    /// Idempotent: an empty cart clears successfully.
    pub async fn clear(&self, identity: &Identity) -> Result<u64, CartError> {
        let removed = self.store.delete_all(identity.id).await?;
        tracing::debug!(user_id = %identity.id, removed, "cart cleared");
        Ok(removed)
    }

    pub async fn list(&self, identity: &Identity) -> Result<Vec<CartItem>, CartError> {
        Ok(self.store.list(identity.id).await?)
    }
}
