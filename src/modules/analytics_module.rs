//! Storefront analytics: overview counters plus per-product, per-user and per-cart breakdowns.

use crate::constants::{ABANDONMENT_THRESHOLD_HOURS, NEW_PRODUCT_WINDOW_DAYS, TOP_PRODUCTS_ANALYZED};
use crate::db::{rank_by_cart_additions, saturating_total, CartDetail, DateRange, Store};
use crate::errors::ToolError;
use crate::metrics::MetricsService;
use crate::modules::{parse_args, Module, ModuleAction, ToolResponse, UserStats};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsType {
    #[default]
    Overview,
    Products,
    Users,
    Carts,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsArgs {
    #[serde(default, rename = "type")]
    kind: AnalyticsType,
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
fn parse_date(value: &str) -> Result<DateTime<Utc>, ToolError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .ok_or_else(|| ToolError::invalid("get_analytics", format!("invalid date: {}", value)))
}

fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[derive(Debug)]
pub struct AnalyticsModule {
    store: Arc<dyn Store>,
    metrics: Arc<MetricsService>,
}

impl AnalyticsModule {
    pub fn new(store: Arc<dyn Store>, metrics: Arc<MetricsService>) -> Self {
        AnalyticsModule { store, metrics }
    }

    pub fn overview_at(&self, range: &DateRange, now: DateTime<Utc>) -> Result<Value, ToolError> {
        let recent = DateRange::since(now - Duration::days(NEW_PRODUCT_WINDOW_DAYS));
        let m = &self.metrics;
        let store = &self.store;

        let total_products = m.time_operation("count", "products", || store.count_products(range))?;
        let total_users = m.time_operation("count", "users", || store.count_users())?;
        let total_carts = m.time_operation("count", "carts", || store.count_carts(range))?;
        let total_cart_items = m.time_operation("count", "cart_items", || store.count_cart_items())?;
        let products_last_week =
            m.time_operation("count", "products", || store.count_products(&recent))?;
        let carts_last_week = m.time_operation("count", "carts", || store.count_carts(&recent))?;
        // Value covers every cart line, not only the carts inside the range
        let total_cart_value = saturating_total(
            m.time_operation("select", "cart_items", || store.cart_details(&DateRange::all()))?
                .iter()
                .map(CartDetail::total_value),
        );

        Ok(json!({
            "overview": {
                "totalProducts": total_products,
                "totalUsers": total_users,
                "totalCarts": total_carts,
                "totalCartItems": total_cart_items,
                "totalCartValue": total_cart_value,
                "averageCartValue": average(total_cart_value as f64, total_carts),
            },
            "recent": {
                "productsLast7Days": products_last_week,
                "cartsLast7Days": carts_last_week,
            },
            "timestamp": now.to_rfc3339(),
        }))
    }

    fn products(&self, range: &DateRange) -> Result<Value, ToolError> {
        let activity = self
            .metrics
            .time_operation("select", "products", || self.store.product_activity(range))?;
        let mut popular = self.metrics.time_operation("select", "products", || {
            self.store.product_activity(&DateRange::all())
        })?;
        rank_by_cart_additions(&mut popular);

        let total_price = saturating_total(activity.iter().map(|a| a.product.price));
        let products: Vec<Value> = activity
            .iter()
            .map(|a| {
                let mut product = json!(a.product);
                product["analytics"] = json!({
                    "timesAddedToCart": a.times_added(),
                    "totalQuantityInCarts": a.total_quantity(),
                    "revenue": a.revenue(),
                });
                product
            })
            .collect();
        let popular: Vec<Value> = popular
            .iter()
            .take(TOP_PRODUCTS_ANALYZED)
            .map(|a| {
                json!({
                    "id": a.product.id,
                    "name": a.product.name,
                    "price": a.product.price,
                    "timesAddedToCart": a.times_added(),
                })
            })
            .collect();

        Ok(json!({
            "summary": {
                "totalProducts": products.len(),
                "averagePrice": average(total_price as f64, products.len()),
            },
            "products": products,
            "popularProducts": popular,
        }))
    }

    fn users(&self) -> Result<Value, ToolError> {
        let count = self
            .metrics
            .time_operation("count", "users", || self.store.count_users())?;
        let users = self
            .metrics
            .time_operation("select", "users", || self.store.list_users(count, 0))?;

        let mut total_carts = 0;
        let mut total_revenue = 0;
        let mut entries = Vec::with_capacity(users.len());
        for user in &users {
            let carts = self.metrics.time_operation("select", "carts", || {
                self.store.user_cart_details(&user.id)
            })?;
            let stats = UserStats::from_carts(&carts);
            total_carts += stats.total_carts;
            total_revenue += stats.total_cart_value;
            entries.push(json!({
                "id": user.id,
                "name": user.name,
                "email": user.email,
                "analytics": {
                    "totalCarts": stats.total_carts,
                    "totalCartItems": stats.total_cart_items,
                    "totalSpent": stats.total_cart_value,
                },
            }));
        }

        Ok(json!({
            "users": entries,
            "summary": {
                "totalUsers": users.len(),
                "averageCartsPerUser": average(total_carts as f64, users.len()),
                "totalRevenue": total_revenue,
            },
        }))
    }

    pub fn carts_at(&self, range: &DateRange, now: DateTime<Utc>) -> Result<Value, ToolError> {
        let carts = self
            .metrics
            .time_operation("select", "carts", || self.store.cart_details(range))?;
        let cutoff = now - Duration::hours(ABANDONMENT_THRESHOLD_HOURS);

        let active = carts.iter().filter(|c| c.item_count() > 0).count();
        let abandoned = carts
            .iter()
            .filter(|c| c.item_count() > 0 && c.cart.updated_at < cutoff)
            .count();
        let total_revenue = saturating_total(carts.iter().map(CartDetail::total_value));
        let entries: Vec<Value> = carts
            .iter()
            .map(|detail| {
                let price_sum = saturating_total(detail.items.iter().map(|line| line.product.price));
                json!({
                    "id": detail.cart.id,
                    "userId": detail.cart.user_id,
                    "userName": detail.user.as_ref().and_then(|u| u.name.clone()),
                    "createdAt": detail.cart.created_at,
                    "updatedAt": detail.cart.updated_at,
                    "analytics": {
                        "itemCount": detail.item_count(),
                        "totalQuantity": detail.total_quantity(),
                        "totalValue": detail.total_value(),
                        "averageItemPrice": average(price_sum as f64, detail.item_count()),
                    },
                })
            })
            .collect();

        Ok(json!({
            "carts": entries,
            "summary": {
                "totalCarts": carts.len(),
                "activeCarts": active,
                "abandonedCarts": abandoned,
                "averageCartValue": average(total_revenue as f64, carts.len()),
                "totalRevenue": total_revenue,
            },
        }))
    }

    fn get_analytics(&self, args: AnalyticsArgs) -> Result<ToolResponse, ToolError> {
        let range = DateRange {
            from: args.start_date.as_deref().map(parse_date).transpose()?,
            to: args.end_date.as_deref().map(parse_date).transpose()?,
        };
        let now = Utc::now();
        let report = match args.kind {
            AnalyticsType::Overview => self.overview_at(&range, now)?,
            AnalyticsType::Products => self.products(&range)?,
            AnalyticsType::Users => self.users()?,
            AnalyticsType::Carts => self.carts_at(&range, now)?,
        };
        ToolResponse::json(&report)
    }
}

#[async_trait]
impl Module for AnalyticsModule {
    fn name(&self) -> &str {
        "analytics"
    }

    fn get_actions(&self) -> Vec<ModuleAction> {
        vec![ModuleAction::new(
            "get_analytics",
            "Get analytics data about products, users and carts",
            json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": ["overview", "products", "users", "carts"],
                        "description": "Type of analytics to retrieve",
                    },
                    "startDate": {"type": "string", "description": "Start date (ISO 8601)"},
                    "endDate": {"type": "string", "description": "End date (ISO 8601)"},
                },
            }),
        )]
    }

    async fn handle_action(&self, action: &str, args: &Value) -> Result<ToolResponse, ToolError> {
        match action {
            "get_analytics" => self.get_analytics(parse_args(action, args)?),
            _ => Err(ToolError::UnknownTool(action.to_string())),
        }
    }
}
