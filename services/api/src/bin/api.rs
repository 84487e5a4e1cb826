//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{InMemoryRateLimiter, OpenAiChatAdapter},
    config::Config,
    error::ApiError,
    web::{chat_handler, chat_preflight_handler, state::AppState, ApiDoc},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{extract::DefaultBodyLimit, routing::post, Router};
use coffee_analysis_core::ports::ChatStreamService;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    // The model credential is optional: without it the service still
    // starts, and the chat endpoint answers 503 until it is provided.
    let chat_adapter: Option<Arc<dyn ChatStreamService>> = match &config.openai_api_key {
        Some(api_key) => {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(api_base) = &config.openai_api_base {
                openai_config = openai_config.with_api_base(api_base);
            }
            let openai_client = Client::with_config(openai_config);
            Some(Arc::new(OpenAiChatAdapter::new(
                openai_client,
                config.chat_model.clone(),
            )))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; chat requests will answer 503");
            None
        }
    };

    let rate_limiter = Arc::new(InMemoryRateLimiter::new());

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        chat_adapter,
        rate_limiter,
    });

    // --- 4. Create the Web Router ---
    // CORS headers are attached by the handlers themselves so the
    // preflight gate stays explicit.
    let api_router = Router::new()
        .route(
            "/api/chat",
            post(chat_handler).options(chat_preflight_handler),
        )
        // Inline attachments arrive base64-encoded inside the JSON body,
        // so the body limit sits well above the per-attachment cap.
        .layer(DefaultBodyLimit::max(80 * 1024 * 1024))
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
