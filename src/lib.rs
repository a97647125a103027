pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;

use tokio::signal;

pub use config::Config;
use services::cleanup::CleanupService;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "daemon" | "-d" | "--daemon" => run_daemon(config).await,

        "cleanup" => run_cleanup_once(config).await,

        "init" | "--init" => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        _ => {
            println!("Unknown command: {}", args[1]);
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Roadcall - Vehicle Breakdown Assistance Platform");
    println!("OTP auth, session tokens, and mechanic proximity matching");
    println!();
    println!("USAGE:");
    println!("  roadcall <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("  daemon            Run the API server with background sweeps");
    println!("  cleanup           Run a single expiry sweep and exit");
    println!("  init              Create default config file");
    println!("  help              Show this help message");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure the server, auth, and geo defaults.");
    println!("  Set ROADCALL_ACCESS_SECRET / ROADCALL_REFRESH_SECRET in production.");
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    info!(
        "Roadcall v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let state = api::create_app_state_from_config(config.clone()).await?;

    let cleanup = std::sync::Arc::new(CleanupService::new(
        state.store.clone(),
        config.cleanup.clone(),
    ));
    let cleanup_handle = {
        let cleanup = std::sync::Arc::clone(&cleanup);
        tokio::spawn(async move {
            if let Err(e) = cleanup.start().await {
                error!("Cleanup service error: {}", e);
            }
        })
    };

    let port = config.server.port;
    let app = api::router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("🌐 API server running at http://0.0.0.0:{}", port);
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    cleanup.stop().await;
    cleanup_handle.abort();
    server_handle.abort();
    info!("Daemon stopped");

    Ok(())
}

async fn run_cleanup_once(config: Config) -> anyhow::Result<()> {
    let store = db::Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let cleanup = CleanupService::new(store, config.cleanup);
    cleanup.run_once().await?;

    info!("Expiry sweep complete");
    Ok(())
}
