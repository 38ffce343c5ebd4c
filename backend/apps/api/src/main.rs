//! API Server Entry Point
//!
//! Reads configuration from the environment, connects to PostgreSQL,
//! runs migrations, purges expired agent state, and serves the agent
//! router under `/api/agent`. Startup failures use `anyhow`; request
//! errors go through the domain error types.

use agent::{AgentConfig, CleanupExpiredUseCase, PgAgentRepository, agent_router};
use anyhow::Context;
use axum::{
    Router,
    http::{self, HeaderName, Method, header},
};
use kernel::ActionKind;
use platform::client::{ADMIN_TOKEN_HEADER, AGENT_KEY_HEADER, AGENT_TOKEN_HEADER};
use platform::rate_limit::RateLimitConfig;
use pow::{Difficulty, PgPowRepository, PowConfig};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:31113";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,agent=info,pow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let pow_config = load_pow_config()?;
    let agent_config = load_agent_config()?;

    let challenges = PgPowRepository::new(pool.clone());
    let agents = PgAgentRepository::new(pool.clone());

    // Failures here must not block startup
    let cleanup = CleanupExpiredUseCase::new(
        Arc::new(challenges.clone()),
        Arc::new(agents.clone()),
        Arc::new(agents.clone()),
        Arc::new(pow_config.clone()),
        Arc::new(agent_config.clone()),
    );
    match cleanup.execute().await {
        Ok(report) => {
            tracing::info!(
                challenges_deleted = report.challenges,
                receipts_deleted = report.receipts,
                rate_windows_deleted = report.rate_windows,
                "Agent state cleanup completed"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Agent state cleanup failed, continuing anyway");
        }
    }

    let admin_token = env::var("AGENT_ADMIN_TOKEN").ok();

    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(AGENT_KEY_HEADER),
            HeaderName::from_static(AGENT_TOKEN_HEADER),
            HeaderName::from_static(ADMIN_TOKEN_HEADER),
        ]))
        .expose_headers([header::RETRY_AFTER]);

    let app = Router::new()
        .nest(
            "/api/agent",
            agent_router(challenges, agents, pow_config, agent_config, admin_token),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()
        .context("BIND_ADDR must be a socket address")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn load_pow_config() -> anyhow::Result<PowConfig> {
    let base = if cfg!(debug_assertions) {
        PowConfig::development()
    } else {
        PowConfig::default()
    };

    let registration = env_parse::<u8>("POW_REGISTRATION_DIFFICULTY")?.map(Difficulty::clamped);
    let action = env_parse::<u8>("POW_ACTION_DIFFICULTY")?.map(Difficulty::clamped);

    let config = base.with_difficulties(registration, action);
    tracing::info!(
        registration_difficulty = config.registration.difficulty.digits(),
        action_difficulty = config.action.difficulty.digits(),
        "PoW configuration loaded"
    );
    Ok(config)
}

fn load_agent_config() -> anyhow::Result<AgentConfig> {
    let mut config = if cfg!(debug_assertions) {
        AgentConfig::development()
    } else {
        AgentConfig::default()
    };

    if let Some(limit) = env_parse::<u32>("AGENT_POST_LIMIT_PER_HOUR")? {
        config = config.with_rate_limit(ActionKind::Post, RateLimitConfig::per_hour(limit));
    }
    if let Some(limit) = env_parse::<u32>("AGENT_COMMENT_LIMIT_PER_HOUR")? {
        config = config.with_rate_limit(ActionKind::Comment, RateLimitConfig::per_hour(limit));
    }

    tracing::info!(
        post_limit = config.rate_limit(ActionKind::Post).max_requests,
        comment_limit = config.rate_limit(ActionKind::Comment).max_requests,
        "Agent configuration loaded"
    );
    Ok(config)
}

/// Optional numeric override; unset or blank means "keep the default"
fn env_parse<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} must be a number")),
        _ => Ok(None),
    }
}
