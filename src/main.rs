//! idlink server entrypoint: config from the environment, one repository
//! instance for the process lifetime, axum serving until ctrl-c.

use std::env;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use idlink::db::ContactDb;
use idlink::http::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let bind = env::var("IDLINK_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let db = ContactDb::open()?;
    let state = Arc::new(AppState { db: Mutex::new(db) });

    let app = router(state);

    log::info!("idlink listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("idlink shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {e}");
    }
}
