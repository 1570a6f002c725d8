use santa_backend::{app, DocumentStore, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let store = match &config.persist_path {
        Some(path) => DocumentStore::with_persistence(path).await,
        None => DocumentStore::default(),
    }
    .with_limit(config.max_document_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "serving game documents");
    axum::serve(listener, app(store)).await
}
