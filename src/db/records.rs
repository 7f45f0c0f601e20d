use super::{Cart, CartItem, Product, User};
use crate::errors::StoreError;
use crate::schema::{cart_items, carts, products, users};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use diesel::{AsChangeset, Identifiable, Insertable, Queryable};

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at the precision `format_timestamp` keeps
pub fn stored_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Invalid(format!("bad timestamp '{}': {}", raw, e)))
}

/// Row of the `products` table
#[derive(Debug, Clone, Queryable, Identifiable, Insertable)]
#[diesel(table_name = products)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Product> for ProductRecord {
    fn from(product: &Product) -> Self {
        ProductRecord {
            id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
            created_at: format_timestamp(product.created_at),
            updated_at: format_timestamp(product.updated_at),
        }
    }
}

impl TryFrom<ProductRecord> for Product {
    type Error = StoreError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        Ok(Product {
            created_at: parse_timestamp(&record.created_at)?,
            updated_at: parse_timestamp(&record.updated_at)?,
            id: record.id,
            name: record.name,
            description: record.description,
            price: record.price,
            image_url: record.image_url,
        })
    }
}

/// Partial update of a product row; `None` columns are left out of the statement
#[derive(Debug, AsChangeset)]
#[diesel(table_name = products)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub image_url: Option<String>,
    pub updated_at: String,
}

/// Row of the `carts` table
#[derive(Debug, Clone, Queryable, Identifiable, Insertable)]
#[diesel(table_name = carts)]
pub struct CartRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Cart> for CartRecord {
    fn from(cart: &Cart) -> Self {
        CartRecord {
            id: cart.id.clone(),
            user_id: cart.user_id.clone(),
            created_at: format_timestamp(cart.created_at),
            updated_at: format_timestamp(cart.updated_at),
        }
    }
}

impl TryFrom<CartRecord> for Cart {
    type Error = StoreError;

    fn try_from(record: CartRecord) -> Result<Self, Self::Error> {
        Ok(Cart {
            created_at: parse_timestamp(&record.created_at)?,
            updated_at: parse_timestamp(&record.updated_at)?,
            id: record.id,
            user_id: record.user_id,
        })
    }
}

/// Row of the `cart_items` table
#[derive(Debug, Clone, Queryable, Identifiable, Insertable)]
#[diesel(table_name = cart_items)]
pub struct CartItemRecord {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: i64,
}

impl From<CartItemRecord> for CartItem {
    fn from(record: CartItemRecord) -> Self {
        CartItem {
            id: record.id,
            cart_id: record.cart_id,
            product_id: record.product_id,
            quantity: record.quantity,
        }
    }
}

/// Row of the `users` table
#[derive(Debug, Clone, Queryable, Identifiable, Insertable)]
#[diesel(table_name = users)]
pub struct UserRecord {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            name: record.name,
            email: record.email,
            image: record.image,
        }
    }
}
