use std::{process::ExitCode, sync::Arc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use vwap_data::{
    aggregator::VwapAggregator,
    config::FeedConfig,
    error::DataError,
    exchange::coinbase::connection::CoinbaseConnection,
    ingest::{IngestExit, IngestLoop},
    signal::{CompletionListener, completion},
    sink::{IndicatorOutput, IndicatorSink},
};

/// Renders each computed indicator as one line on stdout.
#[derive(Debug, Default)]
struct StdoutSink;

impl IndicatorSink for StdoutSink {
    fn send(&mut self, output: IndicatorOutput) {
        println!(
            "{} Price:{:>9.2} Qty:{:>5.2} {}:{:>9.2}",
            output.tick.instrument, output.tick.price, output.tick.quantity, output.name, output.value
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // WSS requires a process-level rustls CryptoProvider
    let _ = rustls::crypto::ring::default_provider().install_default();

    init_logging();

    match run().await {
        Ok(IngestExit::StreamEnded) => {
            info!("feed ended");
            ExitCode::SUCCESS
        }
        Ok(IngestExit::Interrupted { clean }) => {
            if !clean {
                warn!("read loop abandoned during shutdown");
            }
            info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, terminal = error.is_terminal(), "vwap-feed failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<IngestExit, DataError> {
    let config = FeedConfig::from_env()?;
    info!(
        url = %config.url,
        product_ids = ?config.product_ids,
        channels = ?config.channels,
        window = config.window.get(),
        retries = config.retries,
        "starting vwap-feed"
    );

    let mut interrupt = spawn_interrupt_listener();

    let mut connection = CoinbaseConnection::new(&config);
    connection.connect(&mut interrupt).await?;
    connection.subscribe().await?;

    // Rendezvous-style handoff between the read loop and the ingest loop
    let (tx, rx) = mpsc::channel(1);
    let done = connection.receive(tx)?;

    let aggregator = Arc::new(VwapAggregator::from_config(&config));
    let mut ingest = IngestLoop::new(aggregator, StdoutSink);

    let exit = ingest.run(&mut connection, rx, done, interrupt).await;
    if ingest.dropped() > 0 {
        warn!(dropped = ingest.dropped(), "malformed trades were dropped");
    }

    Ok(exit)
}

/// Complete the returned listener on the first SIGINT.
fn spawn_interrupt_listener() -> CompletionListener {
    let (interrupt, listener) = completion();

    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to listen for interrupt signal");
            // Dropping the Completion would resolve it
            std::future::pending::<()>().await;
        }
        info!("received interrupt signal");
        interrupt.complete();
    });

    listener
}

/// Initialize logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
