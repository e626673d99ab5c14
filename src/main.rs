use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use climate_service::api::{self, AppState};
use climate_service::config::Config;
use climate_service::db;
use climate_service::logging;
use climate_service::store::{ClimateStore, MemoryStore, PgStore};

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("climate_service: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::resolve(explicit, |key| std::env::var(key).ok())?;
    let _log_guard = logging::init_logging(&config.logging)?;
    let addr = config.bind_addr()?;

    // The postgres driver blocks on its own runtime, so the pool is built
    // (and later dropped) outside the server runtime.
    let store: Arc<dyn ClimateStore> = match &config.database.fixture {
        Some(path) => {
            let store = MemoryStore::from_json_file(path)?;
            tracing::info!(
                fixture = %path.display(),
                measurements = store.measurement_count(),
                "serving in-memory fixture"
            );
            Arc::new(store)
        }
        None => {
            let pool = db::connect_and_verify(&config.database, db::REQUIRED_TABLES)?;
            Arc::new(PgStore::new(pool))
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        api::serve(listener, AppState::new(Arc::clone(&store)), shutdown_signal()).await
    })?;

    drop(runtime);
    tracing::info!("climate service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
