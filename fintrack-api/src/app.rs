/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use fintrack_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::from_config(pool, config)?;
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:5001").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        auth::{jwt_auth_layer, require_premium, require_premium_plus},
        rate_limit::{rate_limit_layer, RateLimiter},
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use fintrack_shared::{
    providers::{
        http_client, market::HttpMarketProvider, openrouter::OpenRouterClient,
        stripe::StripeClient, CompletionClient, MarketDataProvider, PaymentProcessor,
        ProviderError,
    },
    usage::UsageLimiter,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// `None` when `STRIPE_SECRET_KEY` is unset
    pub payments: Option<Arc<dyn PaymentProcessor>>,

    pub market: Arc<dyn MarketDataProvider>,

    /// `None` when `OPENROUTER` is unset
    pub llm: Option<Arc<dyn CompletionClient>>,

    /// `None` disables the global rate limiter
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, market: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            payments: None,
            market,
            llm: None,
            rate_limiter: None,
        }
    }

    /// Builds the provider clients the configuration enables
    pub fn from_config(db: PgPool, config: Config) -> Result<Self, ProviderError> {
        let http = http_client(config.providers.http_timeout)?;

        let payments = config
            .providers
            .stripe_secret_key
            .clone()
            .map(|key| Arc::new(StripeClient::new(http.clone(), key)) as Arc<dyn PaymentProcessor>);

        let llm = config.providers.openrouter_api_key.clone().map(|key| {
            Arc::new(OpenRouterClient::new(
                http.clone(),
                key,
                config.providers.openrouter_model.clone(),
            )) as Arc<dyn CompletionClient>
        });

        let mut state = Self::new(db, config, Arc::new(HttpMarketProvider::new(http)));
        state.payments = payments;
        state.llm = llm;
        Ok(state)
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentProcessor>) -> Self {
        self.payments = Some(payments);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn CompletionClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn usage(&self) -> UsageLimiter {
        UsageLimiter::new(self.db.clone())
    }

    /// The payment processor, or 503 when it is not configured
    pub fn payments(&self) -> Result<&dyn PaymentProcessor, ApiError> {
        self.payments
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("Payment processor").into())
    }

    /// The completion client, or 503 when it is not configured
    pub fn llm(&self) -> Result<&dyn CompletionClient, ApiError> {
        self.llm
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("AI service").into())
    }
}

/// Builds the complete router
///
/// ```text
/// /api
/// ├── /health                       public
/// ├── /auth/{register,login,refresh,logout}
/// │                                 public
/// ├── /users                        profile, subscription, usage
/// ├── /transactions                 ledger and summaries
/// ├── /goals                        savings goals
/// ├── /reminders                    bill reminders
/// ├── /analytics                    dashboards and reports
/// ├── /market                       quotes and usage-limited analysis
/// ├── /investments                  per-symbol analysis and advice
/// ├── /payments                     intents, confirmation, cancellation
/// │   └── POST /webhook/stripe      public, signature-verified
/// └── /ai                           chat and financial analysis
/// ```
///
/// Everything except health, auth and the webhook sits behind [`jwt_auth_layer`]. The
/// rate limiter, tracing, compression, CORS and security headers wrap the whole tree.
pub fn build_router(state: AppState) -> Router {
    let auth = || from_fn_with_state(state.clone(), jwt_auth_layer);

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/logout", post(routes::auth::logout));

    let user_routes = Router::new()
        .route("/profile", get(routes::users::profile))
        .route("/subscription", put(routes::users::update_subscription))
        .route("/usage", get(routes::users::usage))
        .route_layer(auth());

    let transaction_routes = Router::new()
        .route("/summary", get(routes::transactions::summary))
        .route("/summary/:user_id", get(routes::transactions::summary_for_user))
        .route(
            "/",
            get(routes::transactions::list).post(routes::transactions::create),
        )
        .route(
            "/:id",
            get(routes::transactions::list_for_user).delete(routes::transactions::delete),
        )
        .route_layer(auth());

    let goal_routes = Router::new()
        .route("/", get(routes::goals::list).post(routes::goals::create))
        .route("/summary", get(routes::goals::summary))
        .route("/:id", delete(routes::goals::delete))
        .route("/:id/progress", put(routes::goals::add_progress))
        .route("/:id/plan", get(routes::goals::savings_plan))
        .route("/:id/status", put(routes::goals::update_status))
        .route_layer(auth());

    let reminder_routes = Router::new()
        .route("/", get(routes::reminders::list).post(routes::reminders::create))
        .route("/upcoming", get(routes::reminders::upcoming))
        .route("/notifications", get(routes::reminders::notifications))
        .route("/summary", get(routes::reminders::summary))
        .route(
            "/:id",
            put(routes::reminders::update).delete(routes::reminders::delete),
        )
        .route("/:id/complete", put(routes::reminders::complete))
        .route_layer(auth());

    let analytics_routes = Router::new()
        .route("/dashboard", get(routes::analytics::dashboard))
        .route("/trends", get(routes::analytics::trends))
        .route("/categories", get(routes::analytics::categories))
        .route("/predictions", get(routes::analytics::predictions))
        .route("/monthly-report", get(routes::analytics::monthly_report))
        .route_layer(auth());

    let market_routes = Router::new()
        .route("/crypto", get(routes::market::crypto))
        .route("/stocks", get(routes::market::stocks))
        .route("/analysis", get(routes::market::analysis))
        .route(
            "/personalized-analysis",
            post(routes::market::personalized_analysis).route_layer(from_fn(require_premium_plus)),
        )
        .route("/history", get(routes::market::history))
        .route_layer(auth());

    let investment_routes = Router::new()
        .route("/analysis", get(routes::investments::analysis))
        .route(
            "/recommend",
            post(routes::investments::recommend).route_layer(from_fn(require_premium)),
        )
        .route("/portfolio", get(routes::investments::portfolio))
        .route("/alert", post(routes::investments::create_alert))
        .route("/trends", get(routes::investments::trends))
        .route_layer(auth());

    let payment_routes = Router::new()
        .route("/create-intent", post(routes::payments::create_intent))
        .route("/confirm", post(routes::payments::confirm))
        .route("/history", get(routes::payments::history))
        .route("/subscription", get(routes::payments::subscription))
        .route("/cancel", post(routes::payments::cancel))
        .route_layer(auth())
        .route("/webhook/stripe", post(routes::payments::stripe_webhook));

    let ai_routes = Router::new()
        .route("/chat", post(routes::ai::chat))
        .route("/conversations", get(routes::ai::conversations))
        .route(
            "/conversations/:conversation_id",
            get(routes::ai::conversation),
        )
        .route("/analysis", get(routes::ai::financial_analysis))
        .route_layer(auth());

    let api_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/transactions", transaction_routes)
        .nest("/goals", goal_routes)
        .nest("/reminders", reminder_routes)
        .nest("/analytics", analytics_routes)
        .nest("/market", market_routes)
        .nest("/investments", investment_routes)
        .nest("/payments", payment_routes)
        .nest("/ai", ai_routes);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(from_fn_with_state(state.clone(), rate_limit_layer))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
