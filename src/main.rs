use anyhow::Context;
use std::sync::Arc;

use caffeine_wellness_api::auth::{jwt::JwtVerifier, supabase::SupabaseAuth, IdentityProvider};
use caffeine_wellness_api::config::Config;
use caffeine_wellness_api::store::{PgStore, PostgrestStore, RecordStore};
use caffeine_wellness_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caffeine_wellness_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env().context("Invalid configuration")?);
    let http = reqwest::Client::new();

    let store: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Using direct Postgres record store");
            Arc::new(store)
        }
        None => {
            tracing::info!(url = %config.supabase_url, "Using PostgREST record store");
            Arc::new(PostgrestStore::new(
                http.clone(),
                &config.supabase_url,
                &config.service_role_key,
            ))
        }
    };

    let identity: Arc<dyn IdentityProvider> = match &config.jwt_secret {
        Some(secret) => {
            tracing::info!("Verifying access tokens locally");
            Arc::new(JwtVerifier::new(secret))
        }
        None => {
            tracing::info!("Verifying access tokens with the identity service");
            Arc::new(SupabaseAuth::new(
                http,
                &config.supabase_url,
                &config.service_role_key,
            ))
        }
    };

    let app = build_router(AppState {
        store,
        identity,
        config: config.clone(),
    });

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
