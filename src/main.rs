//! Probe binary: connects to a broker, completes the OpenWire handshake and
//! prints the agreed wire format.

mod cli;

use std::sync::Arc;

use clap::Parser;
use openwire::{
    Command,
    Transport,
    TransportError,
    TransportFactory,
    TransportListener,
    commands::{ConnectionId, ConnectionInfo, RemoveInfo},
    transport::WireFormatNegotiator,
};

/// Prints whatever the broker pushes while the probe runs.
struct PrintListener;

impl TransportListener for PrintListener {
    fn on_command(&self, command: Command) {
        tracing::info!(command = command.name(), "received {command:?}");
    }

    fn on_exception(&self, error: &TransportError) {
        tracing::error!(%error, "transport failed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
    }
    #[cfg(not(feature = "metrics"))]
    if cli.metrics_addr.is_some() {
        tracing::warn!("built without the metrics feature; ignoring --metrics-addr");
    }

    let chain = TransportFactory::new()?.connect(&cli.uri).await?;
    chain.set_transport_listener(Arc::new(PrintListener));
    chain.start().await?;

    let link: &dyn Transport = chain.as_ref();
    let negotiator = link
        .narrow::<WireFormatNegotiator>()
        .ok_or("transport chain has no negotiator")?;
    negotiator.wait_for_negotiation().await?;
    let agreed = negotiator.wire_format();
    println!("version:                  {}", agreed.version);
    println!("tight encoding:           {}", agreed.tight_encoding_enabled);
    println!("cache:                    {} ({} entries)", agreed.cache_enabled, agreed.cache_size);
    println!("stack traces:             {}", agreed.stack_trace_enabled);
    println!("max inactivity:           {:?}", agreed.max_inactivity_duration);
    println!("max inactivity delay:     {:?}", agreed.max_inactivity_duration_initial_delay);
    println!("max frame size:           {}", agreed.max_frame_size);

    if cli.register {
        let connection_id = ConnectionId::generate();
        let started = std::time::Instant::now();
        let response = chain
            .request(ConnectionInfo::new(connection_id.clone()).into())
            .await?;
        if let Some(error) = response.error() {
            return Err(TransportError::Remote(error.clone()).into());
        }
        println!("registered {}:  {:?}", connection_id.value, started.elapsed());
        chain.oneway(RemoveInfo::new(connection_id).into()).await?;
    }

    chain.close().await?;
    Ok(())
}
