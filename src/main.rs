use dotenvy::dotenv;
use hisabkitab::{
    config::{database, settings},
    context::AppContext,
    core::category,
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = settings::load_app_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed the shared default categories
    let seeded = category::ensure_default_categories(&db, &app_config.default_categories)
        .await
        .inspect_err(|e| error!("Failed to seed default categories: {}", e))?;

    let ctx = AppContext::new(app_config, db);
    info!(
        seeded,
        currency = %ctx.config.currency_symbol,
        "HisabKitab storage ready"
    );

    Ok(())
}
