//! Shopping cart tools.

use crate::constants::MAX_LINE_QUANTITY;
use crate::db::{CartDetail, Store};
use crate::errors::{StoreError, ToolError};
use crate::metrics::MetricsService;
use crate::modules::{parse_args, Module, ModuleAction, ToolResponse};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetCartArgs {
    cart_id: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddArgs {
    cart_id: Option<String>,
    user_id: Option<String>,
    product_id: String,
    #[serde(default = "default_quantity")]
    quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateArgs {
    cart_id: String,
    product_id: String,
    quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineArgs {
    cart_id: String,
    product_id: String,
}

#[derive(Debug)]
pub struct CartModule {
    store: Arc<dyn Store>,
    metrics: Arc<MetricsService>,
}

impl CartModule {
    pub fn new(store: Arc<dyn Store>, metrics: Arc<MetricsService>) -> Self {
        CartModule { store, metrics }
    }

    fn find_cart(&self, args: &GetCartArgs) -> Result<Option<CartDetail>, StoreError> {
        let cart_id = match (&args.cart_id, &args.user_id) {
            (Some(cart_id), _) => Some(cart_id.clone()),
            (None, Some(user_id)) => self
                .metrics
                .time_operation("select", "carts", || self.store.find_user_cart(user_id))?
                .map(|cart| cart.id),
            (None, None) => None,
        };
        let Some(cart_id) = cart_id else {
            return Ok(None);
        };

        let detail = self
            .metrics
            .time_operation("select", "carts", || self.store.cart_detail(&cart_id))?;
        // When both ids are given the cart must belong to that user
        Ok(detail.filter(|d| match &args.user_id {
            Some(user_id) => d.cart.user_id.as_deref() == Some(user_id.as_str()),
            None => true,
        }))
    }

    fn get_cart(&self, args: GetCartArgs) -> Result<ToolResponse, ToolError> {
        if args.cart_id.is_none() && args.user_id.is_none() {
            return Err(ToolError::invalid(
                "get_cart",
                "Either cartId or userId must be provided",
            ));
        }

        match self.find_cart(&args)? {
            None => ToolResponse::json(&json!({"message": "Cart not found", "cart": null})),
            Some(detail) => ToolResponse::json(&json!({
                "summary": {
                    "totalItems": detail.total_quantity(),
                    "totalPrice": detail.total_value(),
                    "itemCount": detail.item_count(),
                },
                "cart": detail,
            })),
        }
    }

    fn add_to_cart(&self, args: AddArgs) -> Result<ToolResponse, ToolError> {
        let cart = match (&args.cart_id, &args.user_id) {
            (Some(cart_id), _) => self
                .metrics
                .time_operation("select", "carts", || self.store.get_cart(cart_id))?
                .ok_or_else(|| StoreError::not_found("Cart", cart_id.as_str()))?,
            (None, Some(user_id)) => {
                let existing = self
                    .metrics
                    .time_operation("select", "carts", || self.store.find_user_cart(user_id))?;
                match existing {
                    Some(cart) => cart,
                    None => self.metrics.time_operation("insert", "carts", || {
                        self.store.create_cart(Some(user_id.as_str()))
                    })?,
                }
            }
            (None, None) => self
                .metrics
                .time_operation("insert", "carts", || self.store.create_cart(None))?,
        };

        let line = self.metrics.time_operation("upsert", "cart_items", || {
            self.store.add_item(&cart.id, &args.product_id, args.quantity)
        })?;
        debug!(
            "Cart {} now holds {} x {}",
            cart.id, line.item.quantity, line.product.name
        );

        ToolResponse::json(&json!({
            "message": "Item added to cart successfully",
            "cartItem": line,
            "cartId": cart.id,
        }))
    }

    fn remove_line(&self, cart_id: &str, product_id: &str) -> Result<usize, ToolError> {
        let removed = self.metrics.time_operation("delete", "cart_items", || {
            self.store.remove_item(cart_id, product_id)
        })?;
        if removed == 0 {
            return Err(ToolError::NotFound("Cart item not found".to_string()));
        }
        info!("Removed product {} from cart {}", product_id, cart_id);
        Ok(removed)
    }

    fn update_cart_item(&self, args: UpdateArgs) -> Result<ToolResponse, ToolError> {
        if args.quantity <= 0 {
            let removed = self.remove_line(&args.cart_id, &args.product_id)?;
            return ToolResponse::json(&json!({
                "message": "Item removed from cart successfully",
                "removedCount": removed,
            }));
        }

        let updated = self.metrics.time_operation("update", "cart_items", || {
            self.store
                .set_item_quantity(&args.cart_id, &args.product_id, args.quantity)
        })?;
        if updated == 0 {
            return Err(ToolError::NotFound("Cart item not found".to_string()));
        }
        ToolResponse::json(&json!({
            "message": "Cart item updated successfully",
            "updatedCount": updated,
        }))
    }

    fn remove_from_cart(&self, args: LineArgs) -> Result<ToolResponse, ToolError> {
        let removed = self.remove_line(&args.cart_id, &args.product_id)?;
        ToolResponse::json(&json!({
            "message": "Item removed from cart successfully",
            "removedCount": removed,
        }))
    }
}

#[async_trait]
impl Module for CartModule {
    fn name(&self) -> &str {
        "carts"
    }

    fn get_actions(&self) -> Vec<ModuleAction> {
        vec![
            ModuleAction::new(
                "get_cart",
                "Get cart contents by cart ID or user ID",
                json!({
                    "type": "object",
                    "properties": {
                        "cartId": {"type": "string", "description": "Cart ID"},
                        "userId": {"type": "string", "description": "User ID to find their cart"},
                    },
                }),
            ),
            ModuleAction::new(
                "add_to_cart",
                "Add a product to a cart, creating the cart when needed",
                json!({
                    "type": "object",
                    "properties": {
                        "cartId": {"type": "string", "description": "Cart ID (optional, a cart is created when missing)"},
                        "userId": {"type": "string", "description": "User ID used to find or create the cart"},
                        "productId": {"type": "string", "description": "Product ID to add"},
                        "quantity": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": MAX_LINE_QUANTITY,
                            "description": "Quantity to add",
                        },
                    },
                    "required": ["productId"],
                }),
            ),
            ModuleAction::new(
                "update_cart_item",
                "Update the quantity of an item in a cart; zero removes it",
                json!({
                    "type": "object",
                    "properties": {
                        "cartId": {"type": "string", "description": "Cart ID"},
                        "productId": {"type": "string", "description": "Product ID"},
                        "quantity": {
                            "type": "integer",
                            "maximum": MAX_LINE_QUANTITY,
                            "description": "New quantity",
                        },
                    },
                    "required": ["cartId", "productId", "quantity"],
                }),
            ),
            ModuleAction::new(
                "remove_from_cart",
                "Remove an item from a cart",
                json!({
                    "type": "object",
                    "properties": {
                        "cartId": {"type": "string", "description": "Cart ID"},
                        "productId": {"type": "string", "description": "Product ID to remove"},
                    },
                    "required": ["cartId", "productId"],
                }),
            ),
        ]
    }

    async fn handle_action(&self, action: &str, args: &Value) -> Result<ToolResponse, ToolError> {
        match action {
            "get_cart" => self.get_cart(parse_args(action, args)?),
            "add_to_cart" => self.add_to_cart(parse_args(action, args)?),
            "update_cart_item" => self.update_cart_item(parse_args(action, args)?),
            "remove_from_cart" => self.remove_from_cart(parse_args(action, args)?),
            _ => Err(ToolError::UnknownTool(action.to_string())),
        }
    }
}
