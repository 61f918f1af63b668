use std::env;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use shipassist_backend::core;
use shipassist_backend::server::router::router;
use shipassist_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    core::logging::init(&state.paths);

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(0);
    let bind_addr = format!("127.0.0.1:{}", port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("SHIPASSIST_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);

    let app: Router = router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
