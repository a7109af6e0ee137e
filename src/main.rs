// src/main.rs

use std::sync::Arc;

use dotenvy::dotenv;
use exam_platform::config::Config;
use exam_platform::error::AppError;
use exam_platform::models::user::{NewUser, Role};
use exam_platform::routes;
use exam_platform::state::AppState;
use exam_platform::store::{ExamStore, MemoryStore, PgStore};
use exam_platform::utils::hash::hash_password;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: Arc<dyn ExamStore> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url, 5)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connected...");

            tracing::info!("Running migrations...");
            pg.migrate().await.expect("Failed to run database migrations");
            tracing::info!("Migrations applied successfully.");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    // Seed Admin User
    if let Err(e) = seed_admin_user(store.as_ref(), &config).await {
        tracing::error!("Failed to seed admin user: {}", e);
    }

    let state = AppState::new(store, config.clone());

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listening address");
    tracing::info!("Listening on {}", config.bind_addr);

    // Start the server
    axum::serve(listener, app).await.expect("Server error");
}

async fn seed_admin_user(store: &dyn ExamStore, config: &Config) -> Result<(), AppError> {
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        if store.find_user_by_username(username).await?.is_none() {
            tracing::info!("Seeding admin user: {}", username);

            store
                .insert_user(NewUser {
                    username: username.clone(),
                    email: format!("{}@localhost", username),
                    name: "Administrator".to_string(),
                    password: hash_password(password)?,
                    role: Role::Admin,
                })
                .await?;
            tracing::info!("Admin user created successfully.");
        }
    }
    Ok(())
}
