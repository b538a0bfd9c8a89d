use sims_api_rust::config;
use sims_api_rust::database::DatabaseManager;
use sims_api_rust::handlers;
use sims_api_rust::store::PgEntryStore;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting SIMS bulk API in {:?} mode", config.environment);

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!("Failed to connect to database: {}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = DatabaseManager::run_migrations().await {
        tracing::error!("Failed to apply migrations: {}", err);
        std::process::exit(1);
    }

    let app = handlers::router(PgEntryStore::new(pool));

    // Allow deployments to override port via env
    let port = std::env::var("SIMS_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("SIMS API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");

    DatabaseManager::close().await;
}
