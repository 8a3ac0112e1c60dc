use crate::cli::commands::{GlobalArgs, ServeArgs};
use crate::errors::AttestError;
use crate::api;
use tracing::info;

pub async fn handle_serve(args: ServeArgs, global: &GlobalArgs) -> Result<(), AttestError> {
    let mut config = global.load_config().await?;
    if let Some(workers) = args.workers {
        config.jobs.max_concurrent = workers.max(1);
    }
    info!(
        host = %args.host,
        port = args.port,
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Starting API server"
    );

    let state = api::AppState::from_config(&config)?;
    let app = api::build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .map_err(|e| AttestError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
