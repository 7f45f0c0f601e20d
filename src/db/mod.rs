mod memory_store;
mod models;
mod records;
mod seed;
mod sqlite_store;

use crate::config::{StorageConfig, StorageKind};
use crate::constants::{MAX_LINE_QUANTITY, MAX_PRICE_CENTS};
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use seed::sample_products;
use tracing::info;

pub use memory_store::MemoryStore;
pub use models::*;
pub use sqlite_store::SqliteStore;

/// Persistence operations used by the tools and the assistant
///
/// Every method is synchronous; the backends either hold an in-process lock
/// or a pooled SQLite connection for the duration of the call.
pub trait Store: Debug + Send + Sync {
    /// Cheap round trip used by health checks
    fn ping(&self) -> Result<(), StoreError>;

    /// Products matching the filter, newest first
    fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;
    fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError>;
    fn create_product(&self, product: NewProduct) -> Result<Product, StoreError>;
    /// Applies the patch and bumps `updated_at`; fails with `NotFound` for unknown ids
    fn update_product(&self, id: &str, patch: ProductPatch) -> Result<Product, StoreError>;
    /// Deletes the product along with every cart item referring to it
    fn delete_product(&self, id: &str) -> Result<(), StoreError>;
    /// Number of products created inside the range
    fn count_products(&self, range: &DateRange) -> Result<usize, StoreError>;
    /// Products created inside the range, each with its cart items, newest first
    fn product_activity(&self, range: &DateRange) -> Result<Vec<ProductActivity>, StoreError>;

    fn get_cart(&self, id: &str) -> Result<Option<Cart>, StoreError>;
    /// Most recently updated cart owned by the user
    fn find_user_cart(&self, user_id: &str) -> Result<Option<Cart>, StoreError>;
    fn create_cart(&self, user_id: Option<&str>) -> Result<Cart, StoreError>;
    fn cart_detail(&self, id: &str) -> Result<Option<CartDetail>, StoreError>;
    /// Carts created inside the range, newest first
    fn cart_details(&self, range: &DateRange) -> Result<Vec<CartDetail>, StoreError>;
    /// Every cart owned by the user
    fn user_cart_details(&self, user_id: &str) -> Result<Vec<CartDetail>, StoreError>;
    /// Non-empty carts whose last update is strictly before `cutoff`
    fn stale_cart_details(&self, cutoff: DateTime<Utc>) -> Result<Vec<CartDetail>, StoreError>;
    /// Adds `quantity` of a product, incrementing an existing line
    fn add_item(&self, cart_id: &str, product_id: &str, quantity: i64)
        -> Result<CartLine, StoreError>;
    /// Sets a line's quantity; returns the number of updated lines
    fn set_item_quantity(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> Result<usize, StoreError>;
    /// Removes a line; returns the number of deleted lines
    fn remove_item(&self, cart_id: &str, product_id: &str) -> Result<usize, StoreError>;
    fn count_carts(&self, range: &DateRange) -> Result<usize, StoreError>;
    fn count_cart_items(&self) -> Result<usize, StoreError>;

    fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<User>, StoreError>;
    /// Looks a user up by id, or by email when no id is given
    fn find_user(&self, id: Option<&str>, email: Option<&str>) -> Result<Option<User>, StoreError>;
    /// Accounts come from the storefront's sign-in flow; tests register them directly
    #[cfg(test)]
    fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    fn count_users(&self) -> Result<usize, StoreError>;
}

fn validate_price(price: i64) -> Result<(), StoreError> {
    if !(0..=MAX_PRICE_CENTS).contains(&price) {
        return Err(StoreError::Invalid(format!(
            "price must be between 0 and {}, got {}",
            MAX_PRICE_CENTS, price
        )));
    }
    Ok(())
}

fn validate_quantity(quantity: i64) -> Result<(), StoreError> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(StoreError::Invalid(format!(
            "quantity must be between 1 and {}, got {}",
            MAX_LINE_QUANTITY, quantity
        )));
    }
    Ok(())
}

/// Quantity of a line after adding `extra` to it
fn increment_quantity(current: i64, extra: i64) -> Result<i64, StoreError> {
    current
        .checked_add(extra)
        .filter(|total| *total <= MAX_LINE_QUANTITY)
        .ok_or_else(|| {
            StoreError::Invalid(format!(
                "line quantity would exceed {} ({} + {})",
                MAX_LINE_QUANTITY, current, extra
            ))
        })
}

/// Opens the configured backend, seeding the sample catalog when asked to
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config.kind {
        StorageKind::Memory => {
            info!("Using in-memory store");
            let store = if config.seed_sample_catalog {
                MemoryStore::with_sample_catalog()
            } else {
                MemoryStore::new()
            };
            Ok(Arc::new(store))
        }
        StorageKind::Sqlite => {
            info!("Using SQLite store at {}", config.database_path);
            let store = SqliteStore::open(&config.database_path)?;
            if config.seed_sample_catalog {
                store.seed_if_empty()?;
            }
            Ok(Arc::new(store))
        }
    }
}
