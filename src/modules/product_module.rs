//! Catalog tools: listing, lookup and maintenance of products.

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PRICE_CENTS};
use crate::db::{NewProduct, ProductFilter, ProductPatch, Store};
use crate::errors::{StoreError, ToolError};
use crate::metrics::MetricsService;
use crate::modules::{parse_args, Module, ModuleAction, ToolResponse};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    search: Option<String>,
    min_price: Option<i64>,
    max_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    id: String,
    #[serde(flatten)]
    patch: ProductPatch,
}

#[derive(Debug)]
pub struct ProductModule {
    store: Arc<dyn Store>,
    metrics: Arc<MetricsService>,
}

impl ProductModule {
    pub fn new(store: Arc<dyn Store>, metrics: Arc<MetricsService>) -> Self {
        ProductModule { store, metrics }
    }

    fn get_products(&self, args: ListArgs) -> Result<ToolResponse, ToolError> {
        let filter = ProductFilter {
            limit: args.limit,
            offset: args.offset,
            search: args.search.filter(|s| !s.is_empty()),
            min_price: args.min_price,
            max_price: args.max_price,
        };
        let products = self
            .metrics
            .time_operation("select", "products", || self.store.list_products(&filter))?;

        ToolResponse::json(&json!({
            "count": products.len(),
            "products": products,
            "pagination": {"limit": filter.limit, "offset": filter.offset},
        }))
    }

    fn get_product(&self, id: &str) -> Result<ToolResponse, ToolError> {
        let product = self
            .metrics
            .time_operation("select", "products", || self.store.get_product(id))?
            .ok_or_else(|| StoreError::not_found("Product", id))?;
        ToolResponse::json(&product)
    }

    fn create_product(&self, product: NewProduct) -> Result<ToolResponse, ToolError> {
        let created = self
            .metrics
            .time_operation("insert", "products", || self.store.create_product(product))?;
        info!("Created product {} ({})", created.id, created.name);
        ToolResponse::json(&json!({
            "message": "Product created successfully",
            "product": created,
        }))
    }

    fn update_product(&self, args: UpdateArgs) -> Result<ToolResponse, ToolError> {
        if args.patch.is_empty() {
            return Err(ToolError::invalid(
                "update_product",
                "At least one field to update must be provided",
            ));
        }
        let updated = self.metrics.time_operation("update", "products", || {
            self.store.update_product(&args.id, args.patch)
        })?;
        ToolResponse::json(&json!({
            "message": "Product updated successfully",
            "product": updated,
        }))
    }

    fn delete_product(&self, id: &str) -> Result<ToolResponse, ToolError> {
        self.metrics
            .time_operation("delete", "products", || self.store.delete_product(id))?;
        info!("Deleted product {}", id);
        ToolResponse::json(&json!({
            "message": "Product deleted successfully",
            "id": id,
        }))
    }
}

#[async_trait]
impl Module for ProductModule {
    fn name(&self) -> &str {
        "products"
    }

    fn get_actions(&self) -> Vec<ModuleAction> {
        let id_schema = json!({
            "type": "object",
            "properties": {"id": {"type": "string", "description": "Product ID"}},
            "required": ["id"],
        });
        vec![
            ModuleAction::new(
                "get_products",
                "Get all products or filter by criteria",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": {"type": "integer", "minimum": 0, "description": "Maximum number of products to return"},
                        "offset": {"type": "integer", "minimum": 0, "description": "Number of products to skip"},
                        "search": {"type": "string", "description": "Search term for product name or description"},
                        "minPrice": {"type": "integer", "description": "Minimum price filter, in cents"},
                        "maxPrice": {"type": "integer", "description": "Maximum price filter, in cents"},
                    },
                }),
            ),
            ModuleAction::new("get_product", "Get a specific product by ID", id_schema.clone()),
            ModuleAction::new(
                "create_product",
                "Create a new product",
                json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "minLength": 1, "description": "Product name"},
                        "description": {"type": "string", "description": "Product description"},
                        "price": {
                            "type": "integer",
                            "minimum": 0,
                            "maximum": MAX_PRICE_CENTS,
                            "description": "Product price in cents",
                        },
                        "imageUrl": {"type": "string", "description": "Product image URL"},
                    },
                    "required": ["name", "description", "price", "imageUrl"],
                }),
            ),
            ModuleAction::new(
                "update_product",
                "Update an existing product",
                json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "description": "Product ID"},
                        "name": {"type": "string", "minLength": 1, "description": "Product name"},
                        "description": {"type": "string", "description": "Product description"},
                        "price": {
                            "type": "integer",
                            "minimum": 0,
                            "maximum": MAX_PRICE_CENTS,
                            "description": "Product price in cents",
                        },
                        "imageUrl": {"type": "string", "description": "Product image URL"},
                    },
                    "required": ["id"],
                }),
            ),
            ModuleAction::new("delete_product", "Delete a product", id_schema),
        ]
    }

    async fn handle_action(&self, action: &str, args: &Value) -> Result<ToolResponse, ToolError> {
        match action {
            "get_products" => self.get_products(parse_args(action, args)?),
            "get_product" => {
                let IdArgs { id } = parse_args(action, args)?;
                self.get_product(&id)
            }
            "create_product" => self.create_product(parse_args(action, args)?),
            "update_product" => self.update_product(parse_args(action, args)?),
            "delete_product" => {
                let IdArgs { id } = parse_args(action, args)?;
                self.delete_product(&id)
            }
            _ => Err(ToolError::UnknownTool(action.to_string())),
        }
    }
}
