mod error;
mod target;

pub use error::*;
pub use target::*;

use crate::config::AssistantConfig;
use crate::constants::*;
use crate::db::{rank_by_cart_additions, CartLine, DateRange, ProductActivity, Store};
use crate::errors::StoreError;
use crate::llm::{ChatDispatcher, ChatMessage, LlmError, ProviderSummary};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-product figures sent for performance analysis
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPerformance {
    pub name: String,
    pub price: i64,
    pub times_added_to_cart: usize,
    pub total_quantity_in_carts: i64,
    pub revenue: i64,
}

impl From<&ProductActivity> for ProductPerformance {
    fn from(activity: &ProductActivity) -> Self {
        ProductPerformance {
            name: activity.product.name.clone(),
            price: activity.product.price,
            times_added_to_cart: activity.times_added(),
            total_quantity_in_carts: activity.total_quantity(),
            revenue: activity.revenue(),
        }
    }
}

/// A cart line as the prompts describe it
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineSummary {
    pub product_name: String,
    pub quantity: i64,
    pub price: i64,
}

impl From<&CartLine> for LineSummary {
    fn from(line: &CartLine) -> Self {
        LineSummary {
            product_name: line.product.name.clone(),
            quantity: line.item.quantity,
            price: line.product.price,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub description: String,
    pub popularity: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedCart {
    pub cart_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub item_count: usize,
    pub total_value: i64,
    pub days_since_last_update: i64,
    pub items: Vec<LineSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BusinessOverview {
    pub total_products: usize,
    pub total_users: usize,
    pub total_carts: usize,
    pub new_products_this_week: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub name: String,
    pub price: i64,
    pub times_added_to_cart: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BusinessSnapshot {
    pub overview: BusinessOverview,
    pub top_products: Vec<TopProduct>,
}

/// Kind of caller-supplied data handed to `analyze_with_provider`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Product,
    Cart,
    Business,
    Recommendations,
}

impl AnalysisKind {
    fn prompts(&self) -> (&'static str, &'static str) {
        match self {
            AnalysisKind::Product => (ADHOC_PRODUCT_PROMPT, "Analyze this product data: "),
            AnalysisKind::Cart => (ADHOC_CART_PROMPT, "Analyze this cart data: "),
            AnalysisKind::Business => (ADHOC_BUSINESS_PROMPT, "Analyze this business data: "),
            AnalysisKind::Recommendations => (
                ADHOC_RECOMMENDATIONS_PROMPT,
                "Generate recommendations based on: ",
            ),
        }
    }
}

/// Gathers store data, frames it for a language model and returns the model's answer
#[derive(Debug)]
pub struct AiAssistant {
    store: Arc<dyn Store>,
    dispatcher: Arc<ChatDispatcher>,
    defaults: AssistantConfig,
}

impl AiAssistant {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Arc<ChatDispatcher>,
        defaults: AssistantConfig,
    ) -> Self {
        AiAssistant {
            store,
            dispatcher,
            defaults,
        }
    }

    /// Resolves caller-supplied provider and model against the configured defaults
    pub fn target(&self, provider: Option<&str>, model: Option<&str>) -> ChatTarget {
        ChatTarget::resolve(provider, model, &self.defaults, self.dispatcher.registry())
    }

    pub fn available_providers(&self) -> Vec<ProviderSummary> {
        self.dispatcher.provider_summaries()
    }

    async fn ask(&self, target: &ChatTarget, system: &str, user: String) -> Result<String, LlmError> {
        debug!("Prompt for {}/{}: {}", target.provider, target.model, user);
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let result = self
            .dispatcher
            .chat(&target.provider, &target.model, &messages)
            .await?;
        if let Some(usage) = &result.usage {
            debug!("Token usage: {:?}", usage);
        }
        Ok(result.content)
    }

    /// Performance figures for one product, or for the most carted products
    ///
    /// An unknown id yields an empty list.
    pub fn product_performance(
        &self,
        product_id: Option<&str>,
    ) -> Result<Vec<ProductPerformance>, StoreError> {
        let mut activity = self.store.product_activity(&DateRange::all())?;
        match product_id {
            Some(id) => activity.retain(|a| a.product.id == id),
            None => {
                rank_by_cart_additions(&mut activity);
                activity.truncate(TOP_PRODUCTS_ANALYZED);
            }
        }
        Ok(activity.iter().map(ProductPerformance::from).collect())
    }

    pub async fn analyze_product_performance(
        &self,
        product_id: Option<&str>,
        target: &ChatTarget,
    ) -> Result<String, AssistantError> {
        let run = async {
            let data = self.product_performance(product_id)?;
            let prompt = format!(
                "Analyze this product performance data and provide insights:\n\n{}",
                serde_json::to_string_pretty(&data)?
            );
            Ok::<_, AssistantCause>(self.ask(target, PRODUCT_ANALYST_PROMPT, prompt).await?)
        };
        run.await
            .map_err(|cause| AssistantError::new("AI analysis failed", cause))
    }

    /// Cart history of a known user, flattened across all their carts
    pub fn user_cart_history(&self, user_id: &str) -> Result<Option<Vec<LineSummary>>, StoreError> {
        if self.store.find_user(Some(user_id), None)?.is_none() {
            return Ok(None);
        }
        let lines = self
            .store
            .user_cart_details(user_id)?
            .iter()
            .flat_map(|cart| cart.items.iter().map(LineSummary::from))
            .collect();
        Ok(Some(lines))
    }

    /// Up to the recommender's catalog size, with popularity as cart line count
    pub fn recommendation_catalog(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self
            .store
            .product_activity(&DateRange::all())?
            .into_iter()
            .take(RECOMMENDATION_CATALOG_SIZE)
            .map(|activity| CatalogEntry {
                popularity: activity.times_added(),
                id: activity.product.id,
                name: activity.product.name,
                price: activity.product.price,
                description: activity.product.description,
            })
            .collect())
    }

    pub async fn generate_product_recommendations(
        &self,
        user_id: Option<&str>,
        target: &ChatTarget,
    ) -> Result<String, AssistantError> {
        let run = async {
            let user_context = match user_id {
                Some(id) => match self.user_cart_history(id)? {
                    Some(history) => format!(
                        "User's cart history: {}",
                        serde_json::to_string_pretty(&history)?
                    ),
                    None => String::new(),
                },
                None => String::new(),
            };
            let catalog = self.recommendation_catalog()?;
            let prompt = format!(
                "Generate product recommendations based on:\n\n{}\n\nAvailable products:\n{}",
                user_context,
                serde_json::to_string_pretty(&catalog)?
            );
            Ok::<_, AssistantCause>(self.ask(target, RECOMMENDER_PROMPT, prompt).await?)
        };
        run.await
            .map_err(|cause| AssistantError::new("Recommendation generation failed", cause))
    }

    /// Non-empty carts untouched for longer than the abandonment threshold, as of `now`
    pub fn abandoned_carts_at(&self, now: DateTime<Utc>) -> Result<Vec<AbandonedCart>, StoreError> {
        let cutoff = now - Duration::hours(ABANDONMENT_THRESHOLD_HOURS);
        Ok(self
            .store
            .stale_cart_details(cutoff)?
            .iter()
            .map(|detail| AbandonedCart {
                cart_id: detail.cart.id.clone(),
                user_id: detail.cart.user_id.clone(),
                user_name: detail.user.as_ref().and_then(|u| u.name.clone()),
                item_count: detail.item_count(),
                total_value: detail.total_value(),
                days_since_last_update: (now - detail.cart.updated_at).num_days(),
                items: detail.items.iter().map(LineSummary::from).collect(),
            })
            .collect())
    }

    pub async fn analyze_cart_abandonment(
        &self,
        target: &ChatTarget,
    ) -> Result<String, AssistantError> {
        let run = async {
            let data = self.abandoned_carts_at(Utc::now())?;
            info!("Analyzing {} abandoned carts", data.len());
            let prompt = format!(
                "Analyze this cart abandonment data and provide insights:\n\n{}",
                serde_json::to_string_pretty(&data)?
            );
            Ok::<_, AssistantCause>(self.ask(target, CART_ANALYST_PROMPT, prompt).await?)
        };
        run.await
            .map_err(|cause| AssistantError::new("Cart abandonment analysis failed", cause))
    }

    /// Store totals and the most carted products, as of `now`
    pub fn business_snapshot_at(&self, now: DateTime<Utc>) -> Result<BusinessSnapshot, StoreError> {
        let overview = BusinessOverview {
            total_products: self.store.count_products(&DateRange::all())?,
            total_users: self.store.count_users()?,
            total_carts: self.store.count_carts(&DateRange::all())?,
            new_products_this_week: self
                .store
                .count_products(&DateRange::since(now - Duration::days(NEW_PRODUCT_WINDOW_DAYS)))?,
        };

        let mut activity = self.store.product_activity(&DateRange::all())?;
        rank_by_cart_additions(&mut activity);
        let top_products = activity
            .iter()
            .take(TOP_PRODUCTS_IN_INSIGHTS)
            .map(|a| TopProduct {
                name: a.product.name.clone(),
                price: a.product.price,
                times_added_to_cart: a.times_added(),
            })
            .collect();

        Ok(BusinessSnapshot {
            overview,
            top_products,
        })
    }

    pub async fn generate_business_insights(
        &self,
        target: &ChatTarget,
    ) -> Result<String, AssistantError> {
        let run = async {
            let data = self.business_snapshot_at(Utc::now())?;
            let prompt = format!(
                "Analyze this business data and provide strategic insights:\n\n{}",
                serde_json::to_string_pretty(&data)?
            );
            Ok::<_, AssistantCause>(self.ask(target, BUSINESS_ANALYST_PROMPT, prompt).await?)
        };
        run.await
            .map_err(|cause| AssistantError::new("Business insights generation failed", cause))
    }

    /// Answers a free-form question, optionally grounded on caller context
    pub async fn chat_with_data(
        &self,
        query: &str,
        context: Option<&Value>,
        target: &ChatTarget,
    ) -> Result<String, AssistantError> {
        let run = async {
            let prompt = match context {
                Some(context) => format!(
                    "Context: {}\n\nQuestion: {}",
                    serde_json::to_string_pretty(context)?,
                    query
                ),
                None => query.to_string(),
            };
            Ok::<_, AssistantCause>(self.ask(target, DATA_CHAT_PROMPT, prompt).await?)
        };
        run.await
            .map_err(|cause| AssistantError::new("Chat failed", cause))
    }

    /// Analyzes caller-supplied data with a prompt chosen by `kind`
    pub async fn analyze_with_provider(
        &self,
        kind: AnalysisKind,
        data: &Value,
        target: &ChatTarget,
    ) -> Result<String, AssistantError> {
        let run = async {
            let (system, lead) = kind.prompts();
            let prompt = format!("{}{}", lead, serde_json::to_string_pretty(data)?);
            Ok::<_, AssistantCause>(self.ask(target, system, prompt).await?)
        };
        run.await.map_err(|cause| {
            AssistantError::new(format!("Analysis with {} failed", target.provider), cause)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvidersConfig;
    use crate::db::{MemoryStore, NewUser};
    use crate::llm::transport::testing::FakeTransport;
    use crate::llm::{AdapterOptions, ProviderRegistry};
    use serde_json::json;

    fn assistant_with(
        store: Arc<MemoryStore>,
        transport: Arc<FakeTransport>,
    ) -> AiAssistant {
        let registry = Arc::new(ProviderRegistry::from_config(&ProvidersConfig::default()));
        let dispatcher = Arc::new(ChatDispatcher::new(
            registry,
            transport,
            AdapterOptions::default(),
        ));
        AiAssistant::new(store, dispatcher, AssistantConfig::default())
    }

    fn ollama_reply(text: &str) -> Arc<FakeTransport> {
        Arc::new(FakeTransport::ok(json!({"message": {"content": text}})))
    }

    fn sent_messages(transport: &FakeTransport) -> Vec<Value> {
        transport.last_request().body["messages"]
            .as_array()
            .unwrap()
            .clone()
    }

    fn fill_cart(store: &MemoryStore, product_ids: &[&str]) -> String {
        let cart = store.create_cart(None).unwrap();
        for id in product_ids {
            store.add_item(&cart.id, id, 1).unwrap();
        }
        cart.id
    }

    #[test]
    fn test_top_products_ranked_by_cart_lines() {
        let store = Arc::new(MemoryStore::with_sample_catalog());
        fill_cart(&store, &["3", "5"]);
        fill_cart(&store, &["5"]);
        fill_cart(&store, &["5", "3", "1"]);
        let assistant = assistant_with(store, ollama_reply("x"));

        let ranked = assistant.product_performance(None).unwrap();
        assert_eq!(ranked.len(), 8);
        assert_eq!(ranked[0].name, "Designer Watch");
        assert_eq!(ranked[0].times_added_to_cart, 3);
        assert_eq!(ranked[0].revenue, 3 * 299900);
        assert_eq!(ranked[1].name, "Silk Scarf");
        assert_eq!(ranked[2].name, "Leather Handbag");
        // untouched products keep newest-first order
        assert_eq!(ranked[3].name, "Silk Tie");

        assert!(assistant.product_performance(Some("nope")).unwrap().is_empty());
        assert_eq!(assistant.product_performance(Some("2")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_product_analysis_prompt() {
        let store = Arc::new(MemoryStore::with_sample_catalog());
        let transport = ollama_reply("Watches sell well");
        let assistant = assistant_with(store, transport.clone());
        let target = assistant.target(None, None);

        let answer = assistant
            .analyze_product_performance(Some("5"), &target)
            .await
            .unwrap();
        assert_eq!(answer, "Watches sell well");

        let request = transport.last_request();
        assert_eq!(request.url.as_str(), "http://localhost:11434/api/chat");
        assert_eq!(request.body["model"], "llama2");
        let messages = sent_messages(&transport);
        assert_eq!(messages[0]["content"], PRODUCT_ANALYST_PROMPT);
        let user = messages[1]["content"].as_str().unwrap();
        assert!(user.starts_with("Analyze this product performance data and provide insights:\n\n"));
        assert!(user.contains("\"timesAddedToCart\": 0"));
        assert!(user.contains("Designer Watch"));
    }

    #[test]
    fn test_abandonment_threshold_boundary() {
        let store = Arc::new(MemoryStore::with_sample_catalog());
        let now = Utc::now();

        let old = fill_cart(&store, &["1", "2"]);
        store
            .set_cart_updated_at(&old, now - Duration::hours(24) - Duration::seconds(1))
            .unwrap();
        let recent = fill_cart(&store, &["1"]);
        store
            .set_cart_updated_at(&recent, now - Duration::hours(24) + Duration::seconds(1))
            .unwrap();
        let ancient = fill_cart(&store, &["4"]);
        store
            .set_cart_updated_at(&ancient, now - Duration::days(3) - Duration::hours(1))
            .unwrap();

        let assistant = assistant_with(store, ollama_reply("x"));
        let mut carts = assistant.abandoned_carts_at(now).unwrap();
        carts.sort_by_key(|c| c.days_since_last_update);

        assert_eq!(carts.len(), 2);
        assert_eq!(carts[0].cart_id, old);
        assert_eq!(carts[0].days_since_last_update, 1);
        assert_eq!(carts[0].item_count, 2);
        assert_eq!(carts[0].total_value, 129900 + 39900);
        assert_eq!(carts[1].cart_id, ancient);
        assert_eq!(carts[1].days_since_last_update, 3);
        assert_eq!(carts[1].items[0].product_name, "Leather Wallet");
    }

    #[test]
    fn test_business_snapshot_top_five() {
        let store = Arc::new(MemoryStore::with_sample_catalog());
        for ids in [
            &["1", "2", "3", "4", "5", "6"][..],
            &["1", "2", "3", "4"][..],
            &["1", "2"][..],
            &["1"][..],
        ] {
            fill_cart(&store, ids);
        }
        store
            .set_product_created_at("8", Utc::now() - Duration::days(30))
            .unwrap();
        store
            .create_user(NewUser {
                name: Some("Ada".to_string()),
                ..NewUser::default()
            })
            .unwrap();
        let assistant = assistant_with(store, ollama_reply("x"));

        let snapshot = assistant.business_snapshot_at(Utc::now()).unwrap();
        assert_eq!(snapshot.overview.total_products, 8);
        assert_eq!(snapshot.overview.total_users, 1);
        assert_eq!(snapshot.overview.total_carts, 4);
        assert_eq!(snapshot.overview.new_products_this_week, 7);

        let counts: Vec<usize> = snapshot
            .top_products
            .iter()
            .map(|p| p.times_added_to_cart)
            .collect();
        assert_eq!(counts.len(), 5);
        assert!(counts.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(snapshot.top_products[0].name, "Leather Handbag");
    }

    #[tokio::test]
    async fn test_recommendations_include_user_history() {
        let store = Arc::new(MemoryStore::with_sample_catalog());
        let user = store
            .create_user(NewUser {
                name: Some("Lin".to_string()),
                ..NewUser::default()
            })
            .unwrap();
        let cart = store.create_cart(Some(user.id.as_str())).unwrap();
        store.add_item(&cart.id, "7", 2).unwrap();
        let transport = ollama_reply("Try the belt");
        let assistant = assistant_with(store, transport.clone());

        let answer = assistant
            .generate_product_recommendations(Some(user.id.as_str()), &assistant.target(None, None))
            .await
            .unwrap();
        assert_eq!(answer, "Try the belt");

        let messages = sent_messages(&transport);
        let user_prompt = messages[1]["content"].as_str().unwrap();
        assert!(user_prompt.contains("User's cart history: "));
        assert!(user_prompt.contains("\"productName\": \"Designer Shoes\""));
        assert!(user_prompt.contains("\n\nAvailable products:\n"));
        assert!(user_prompt.contains("\"popularity\": 1"));
    }

    #[tokio::test]
    async fn test_chat_with_context_format() {
        let store = Arc::new(MemoryStore::new());
        let transport = ollama_reply("42");
        let assistant = assistant_with(store, transport.clone());
        let target = assistant.target(None, None);

        assistant
            .chat_with_data("how many?", Some(&json!({"a": 1})), &target)
            .await
            .unwrap();
        let messages = sent_messages(&transport);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(
            messages[1]["content"],
            "Context: {\n  \"a\": 1\n}\n\nQuestion: how many?"
        );

        assistant
            .chat_with_data("plain", None, &target)
            .await
            .unwrap();
        assert_eq!(sent_messages(&transport)[1]["content"], "plain");
    }

    #[tokio::test]
    async fn test_failures_carry_operation_context() {
        let store = Arc::new(MemoryStore::new());
        let transport = ollama_reply("unused");
        let assistant = assistant_with(store, transport.clone());

        let err = assistant
            .chat_with_data("q", None, &ChatTarget::new("mystery", "m"))
            .await
            .unwrap_err();
        assert_eq!(err.context, "Chat failed");
        assert!(matches!(
            err.cause,
            AssistantCause::Llm(LlmError::UnknownProvider(_))
        ));
        assert_eq!(err.to_string(), "Chat failed: Unknown provider: mystery");

        let err = assistant
            .analyze_with_provider(
                AnalysisKind::Cart,
                &json!([]),
                &ChatTarget::new("openai", "gpt-4"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.context, "Analysis with openai failed");
        assert_eq!(err.cause.kind(), "configuration");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_with_provider_prompts() {
        let store = Arc::new(MemoryStore::new());
        let transport = ollama_reply("done");
        let assistant = assistant_with(store, transport.clone());

        assistant
            .analyze_with_provider(
                AnalysisKind::Recommendations,
                &json!({"sku": "x"}),
                &ChatTarget::new("ollama", "mistral"),
            )
            .await
            .unwrap();
        let messages = sent_messages(&transport);
        assert_eq!(messages[0]["content"], ADHOC_RECOMMENDATIONS_PROMPT);
        assert_eq!(
            messages[1]["content"],
            "Generate recommendations based on: {\n  \"sku\": \"x\"\n}"
        );
        assert_eq!(transport.last_request().body["model"], "mistral");
    }
}
