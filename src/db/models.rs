use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog product; prices are integer cents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image_url: String,
}

/// Partial product update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.image_url.is_none()
    }
}

/// Product listing filter; search matches name or description, case-insensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    pub limit: usize,
    pub offset: usize,
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

impl Default for ProductFilter {
    fn default() -> Self {
        ProductFilter {
            limit: 50,
            offset: 0,
            search: None,
            min_price: None,
            max_price: None,
        }
    }
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let search_ok = self.search.as_deref().map_or(true, |term| {
            let term = term.to_lowercase();
            product.name.to_lowercase().contains(&term)
                || product.description.to_lowercase().contains(&term)
        });
        search_ok
            && self.min_price.map_or(true, |min| product.price >= min)
            && self.max_price.map_or(true, |max| product.price <= max)
    }
}

/// Inclusive creation-time window; open ends are unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all() -> Self {
        DateRange::default()
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        DateRange {
            from: Some(from),
            to: None,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

#[cfg(test)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// A cart item together with the product it refers to
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    pub fn value(&self) -> i64 {
        self.product.price.saturating_mul(self.item.quantity)
    }
}

/// A cart with its lines and owner
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CartDetail {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartLine>,
    #[serde(rename = "User")]
    pub user: Option<User>,
}

impl CartDetail {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        saturating_total(self.items.iter().map(|line| line.item.quantity))
    }

    pub fn total_value(&self) -> i64 {
        saturating_total(self.items.iter().map(CartLine::value))
    }
}

/// A product with every cart item that references it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductActivity {
    pub product: Product,
    pub items: Vec<CartItem>,
}

impl ProductActivity {
    /// Number of cart lines holding the product
    pub fn times_added(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        saturating_total(self.items.iter().map(|item| item.quantity))
    }

    pub fn revenue(&self) -> i64 {
        saturating_total(
            self.items
                .iter()
                .map(|item| self.product.price.saturating_mul(item.quantity)),
        )
    }
}

/// Sum of cent or quantity values, clamped at the `i64` bounds
pub fn saturating_total(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0, i64::saturating_add)
}

/// Sorts by cart additions, most first; ties keep newest products first, then id.
pub fn rank_by_cart_additions(activity: &mut [ProductActivity]) {
    activity.sort_by(|a, b| {
        b.times_added()
            .cmp(&a.times_added())
            .then_with(|| b.product.created_at.cmp(&a.product.created_at))
            .then_with(|| a.product.id.cmp(&b.product.id))
    });
}
