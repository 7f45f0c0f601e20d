/// System prompt for product performance analysis
pub const PRODUCT_ANALYST_PROMPT: &str = "You are an e-commerce analytics expert. Analyze the provided product performance data and provide insights and recommendations.";

/// System prompt for personalized recommendations
pub const RECOMMENDER_PROMPT: &str = "You are an e-commerce recommendation engine. Generate personalized product recommendations based on user behavior and product popularity.";

/// System prompt for cart abandonment analysis
pub const CART_ANALYST_PROMPT: &str = "You are an e-commerce analyst specializing in cart abandonment analysis. Provide insights and actionable recommendations to reduce cart abandonment.";

/// System prompt for business-level insights
pub const BUSINESS_ANALYST_PROMPT: &str = "You are a business intelligence analyst for an e-commerce platform. Provide strategic insights and recommendations based on the business data.";

/// System prompt for free-form questions about store data
pub const DATA_CHAT_PROMPT: &str = "You are an AI assistant for an e-commerce platform. You have access to product, user, and cart data. Answer questions and provide insights based on the available data.";

/// Shorter prompts used when analyzing caller-supplied data
pub const ADHOC_PRODUCT_PROMPT: &str =
    "You are an e-commerce analytics expert. Analyze product performance data and provide insights.";
pub const ADHOC_CART_PROMPT: &str =
    "You are an e-commerce analyst specializing in cart behavior analysis.";
pub const ADHOC_BUSINESS_PROMPT: &str =
    "You are a business intelligence analyst for an e-commerce platform.";
pub const ADHOC_RECOMMENDATIONS_PROMPT: &str = "You are an e-commerce recommendation engine.";

/// Number of products ranked by product performance analysis
pub const TOP_PRODUCTS_ANALYZED: usize = 10;

/// Number of catalog products offered to the recommender
pub const RECOMMENDATION_CATALOG_SIZE: usize = 20;

/// Number of products listed in business insights
pub const TOP_PRODUCTS_IN_INSIGHTS: usize = 5;

/// Carts untouched for longer than this many hours count as abandoned
pub const ABANDONMENT_THRESHOLD_HOURS: i64 = 24;

/// Window, in days, for "new products" in business insights
pub const NEW_PRODUCT_WINDOW_DAYS: i64 = 7;

/// Default page size for listing tools
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest quantity a single cart line may hold
pub const MAX_LINE_QUANTITY: i64 = 10_000;

/// Largest accepted product price, in cents
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;
