//! User lookup tools.

use crate::constants::DEFAULT_PAGE_SIZE;
use crate::db::{saturating_total, CartDetail, Store, User};
use crate::errors::ToolError;
use crate::metrics::MetricsService;
use crate::modules::{parse_args, Module, ModuleAction, ToolResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Cart totals of one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_carts: usize,
    pub total_cart_items: usize,
    pub total_cart_value: i64,
}

impl UserStats {
    pub fn from_carts(carts: &[CartDetail]) -> Self {
        UserStats {
            total_carts: carts.len(),
            total_cart_items: carts.iter().map(CartDetail::item_count).sum(),
            total_cart_value: saturating_total(carts.iter().map(CartDetail::total_value)),
        }
    }
}

#[derive(Debug, Serialize)]
struct UserWithStats {
    #[serde(flatten)]
    user: User,
    #[serde(rename = "Cart")]
    carts: Vec<CartDetail>,
    stats: UserStats,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

#[derive(Debug, Deserialize)]
struct LookupArgs {
    id: Option<String>,
    email: Option<String>,
}

#[derive(Debug)]
pub struct UserModule {
    store: Arc<dyn Store>,
    metrics: Arc<MetricsService>,
}

impl UserModule {
    pub fn new(store: Arc<dyn Store>, metrics: Arc<MetricsService>) -> Self {
        UserModule { store, metrics }
    }

    fn with_stats(&self, user: User) -> Result<UserWithStats, ToolError> {
        let carts = self
            .metrics
            .time_operation("select", "carts", || self.store.user_cart_details(&user.id))?;
        Ok(UserWithStats {
            stats: UserStats::from_carts(&carts),
            user,
            carts,
        })
    }

    fn get_users(&self, args: ListArgs) -> Result<ToolResponse, ToolError> {
        let users = self.metrics.time_operation("select", "users", || {
            self.store.list_users(args.limit, args.offset)
        })?;
        let users = users
            .into_iter()
            .map(|user| self.with_stats(user))
            .collect::<Result<Vec<_>, _>>()?;

        ToolResponse::json(&json!({
            "count": users.len(),
            "users": users,
            "pagination": {"limit": args.limit, "offset": args.offset},
        }))
    }

    fn get_user(&self, args: LookupArgs) -> Result<ToolResponse, ToolError> {
        if args.id.is_none() && args.email.is_none() {
            return Err(ToolError::invalid(
                "get_user",
                "Either id or email must be provided",
            ));
        }
        let user = self
            .metrics
            .time_operation("select", "users", || {
                self.store
                    .find_user(args.id.as_deref(), args.email.as_deref())
            })?
            // Both criteria apply when both are given
            .filter(|user| match (&args.id, &args.email) {
                (Some(_), Some(email)) => user.email.as_deref() == Some(email.as_str()),
                _ => true,
            })
            .ok_or_else(|| ToolError::NotFound("User not found".to_string()))?;

        ToolResponse::json(&self.with_stats(user)?)
    }
}

#[async_trait]
impl Module for UserModule {
    fn name(&self) -> &str {
        "users"
    }

    fn get_actions(&self) -> Vec<ModuleAction> {
        vec![
            ModuleAction::new(
                "get_users",
                "Get all users with their cart statistics",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": {"type": "integer", "minimum": 0, "description": "Maximum number of users to return"},
                        "offset": {"type": "integer", "minimum": 0, "description": "Number of users to skip"},
                    },
                }),
            ),
            ModuleAction::new(
                "get_user",
                "Get a specific user by ID or email",
                json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "description": "User ID"},
                        "email": {"type": "string", "description": "User email"},
                    },
                }),
            ),
        ]
    }

    async fn handle_action(&self, action: &str, args: &Value) -> Result<ToolResponse, ToolError> {
        match action {
            "get_users" => self.get_users(parse_args(action, args)?),
            "get_user" => self.get_user(parse_args(action, args)?),
            _ => Err(ToolError::UnknownTool(action.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, NewUser};

    fn setup() -> (Arc<MemoryStore>, UserModule) {
        let store = Arc::new(MemoryStore::with_sample_catalog());
        let module = UserModule::new(store.clone(), Arc::new(MetricsService::new().unwrap()));
        (store, module)
    }

    async fn call(module: &UserModule, action: &str, args: Value) -> Value {
        let response = module.handle_action(action, &args).await.unwrap();
        serde_json::from_str(response.first_text()).unwrap()
    }

    #[tokio::test]
    async fn test_user_stats_cover_all_carts() {
        let (store, module) = setup();
        let user = store
            .create_user(NewUser {
                name: Some("Ada".to_string()),
                email: Some("ada@example.com".to_string()),
                image: None,
            })
            .unwrap();
        let first = store.create_cart(Some(user.id.as_str())).unwrap();
        store.add_item(&first.id, "1", 1).unwrap();
        store.add_item(&first.id, "4", 2).unwrap();
        let second = store.create_cart(Some(user.id.as_str())).unwrap();
        store.add_item(&second.id, "8", 1).unwrap();

        let body = call(&module, "get_user", json!({"email": "ada@example.com"})).await;
        assert_eq!(body["name"], "Ada");
        assert_eq!(
            body["stats"],
            json!({
                "totalCarts": 2,
                "totalCartItems": 3,
                "totalCartValue": 129900 + 2 * 19900 + 12900,
            })
        );
    }

    #[tokio::test]
    async fn test_get_users_paginates() {
        let (store, module) = setup();
        for _ in 0..3 {
            store.create_user(NewUser::default()).unwrap();
        }
        let body = call(&module, "get_users", json!({"limit": 2})).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["pagination"], json!({"limit": 2, "offset": 0}));
        assert_eq!(body["users"][0]["stats"]["totalCarts"], 0);
    }

    #[tokio::test]
    async fn test_get_user_errors() {
        let (_, module) = setup();
        let err = module.handle_action("get_user", &json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");

        let err = module
            .handle_action("get_user", &json!({"id": "missing"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User not found");
    }
}
