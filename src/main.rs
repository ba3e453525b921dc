use docuchat::engine::{AnsweringEngine, EngineConfig};
use docuchat::{api, config, embedding, index, logging, model};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let engine = build_engine().await.expect("Failed to build engine");
    let app = api::create_router(Arc::new(engine));

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.unwrap();
}

async fn build_engine() -> anyhow::Result<AnsweringEngine> {
    let config = config::get_config();
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let model = model::OpenAiChatClient::new(
        &config.model_base_url,
        &config.model_api_key,
        &config.chat_model,
        timeout,
    )?;
    let embedder = embedding::OpenAiEmbeddingClient::new(
        &config.model_base_url,
        &config.model_api_key,
        &config.embedding_model,
        config.embedding_dimension,
        timeout,
    )?;
    let index = index::QdrantIndex::new(
        &config.qdrant_url,
        config.qdrant_api_key.clone(),
        &config.qdrant_collection_name,
        config.embedding_dimension,
        timeout,
    )?;
    index.ensure_collection().await?;

    Ok(AnsweringEngine::new(
        Box::new(model),
        Box::new(embedder),
        Box::new(index),
        EngineConfig {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.search_top_k,
            context_budget_chars: config.context_budget_chars,
            ..EngineConfig::default()
        },
    ))
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8100..=8199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8100-8199",
    ))
}
