#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("engine=info,tower_http=debug")),
        )
        .init();

    if let Err(e) = engine::run_server().await {
        tracing::error!("engine exited with error: {}", e);
        std::process::exit(1);
    }
}
