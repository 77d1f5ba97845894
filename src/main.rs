//! Binary entry point: wires the ESL connection, event router, and
//! orchestrator together, then logs lifecycle transitions until asked to
//! shut down. The request surface that actually drives `StartCall` (HTTP
//! controllers, a queue consumer, whatever) lives outside this crate.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dialbridge::{Config, EslClient, EslEventType, EventFormat, EventRouter, Orchestrator, RecordingManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(
        host = %config.esl_host,
        port = config.esl_port,
        "connecting to FreeSWITCH"
    );

    let (client, events) = tokio::time::timeout(
        std::time::Duration::from_millis(config.connect_timeout_ms),
        EslClient::connect(&config.esl_host, config.esl_port, &config.esl_password),
    )
    .await
    .map_err(|_| "connection to FreeSWITCH timed out")??;

    client
        .subscribe_events(
            EventFormat::Plain,
            &[
                EslEventType::ChannelCreate,
                EslEventType::ChannelAnswer,
                EslEventType::ChannelBridge,
                EslEventType::ChannelHangupComplete,
                EslEventType::BackgroundJob,
            ],
        )
        .await?;

    let shutdown_client = client.clone();

    let (router, _reader_task) = EventRouter::spawn(events);
    let recordings = RecordingManager::new(
        config.recording_directory.clone(),
        config.recording_base_url.clone(),
    );
    let (_orchestrator, mut lifecycle) = Orchestrator::new(client, router, recordings, &config);

    info!("orchestrator ready");

    let log_lifecycle = tokio::spawn(async move {
        while let Some(event) = lifecycle.recv().await {
            info!(
                call_id = %event.call_id,
                state = ?event.state,
                cause = ?event.cause,
                recording_url = ?event.recording_url,
                "call lifecycle transition"
            );
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
    shutdown_client.close().await;
    log_lifecycle.abort();

    Ok(())
}
