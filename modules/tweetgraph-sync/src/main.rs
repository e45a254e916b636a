use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use browser_relay_client::BrowserRelayClient;
use tweetgraph_common::{Config, SyncMode};
use tweetgraph_graph::{migrate, GraphClient, GraphWriter};
use tweetgraph_sync::collector::CollectorConfig;
use tweetgraph_sync::driver::RelayCaptureDriver;
use tweetgraph_sync::embedder::{HttpEmbedder, NoopEmbedder, TextEmbedder};
use tweetgraph_sync::runner::SyncRunner;
use tweetgraph_sync::state::SyncStateStore;
use tweetgraph_sync::traits::EnrichmentSource;
use xapi_client::XApiClient;

#[derive(Parser, Debug)]
#[command(name = "tweetgraph-sync", about = "Sync X bookmarks into the tweet graph")]
struct Args {
    /// full: walk the whole feed; incremental: stop at the first known item
    #[arg(long, default_value = "incremental")]
    mode: String,

    /// Re-enrich stored tweets still flagged truncated, then exit
    #[arg(long)]
    repair: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("tweetgraph_sync=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mode: SyncMode = args.mode.parse().map_err(anyhow::Error::msg)?;

    info!("Tweet graph sync starting...");

    let config = Config::from_env();
    config.log_redacted();

    let client =
        GraphClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await?;
    migrate::migrate(&client, config.embedding_dimensions).await?;
    let writer = GraphWriter::new(client);

    let relay = BrowserRelayClient::new(
        &config.browser_relay_url,
        config.browser_relay_token.as_deref(),
    );
    let driver = RelayCaptureDriver::new(relay);

    let xapi = config
        .x_bearer_token
        .as_deref()
        .map(|token| XApiClient::new(token, config.xapi_window_budget));
    let enrichment = xapi.as_ref().map(|client| client as &dyn EnrichmentSource);

    let embedder: Box<dyn TextEmbedder> = match &config.embedding_api_key {
        Some(key) => Box::new(HttpEmbedder::new(
            &config.embedding_api_base,
            key,
            &config.embedding_model,
            config.embedding_dimensions,
        )),
        None => Box::new(NoopEmbedder),
    };

    let state = SyncStateStore::new(&config.state_file);
    let collector_config = CollectorConfig {
        bookmarks_url: config.bookmarks_url.clone(),
        settle_delay: Duration::from_millis(config.scroll_settle_ms),
        stagnation_threshold: config.stagnation_threshold,
    };

    let runner = SyncRunner::new(
        &driver,
        &writer,
        enrichment,
        embedder.as_ref(),
        &state,
        collector_config,
    );

    if args.repair {
        runner.repair_stored().await?;
    } else {
        runner.run(mode).await?;
    }

    Ok(())
}
