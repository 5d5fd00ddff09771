//! FHIR integration relay.
//!
//! Accepts FHIR resources over HTTP, audits every exchange to an operations
//! topic, publishes the raw resource to its per-resource topic and optionally
//! forwards it to the active FHIR server.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                     FHIR RELAY                       │
//!   POST /iDAAS/patient  │  ┌────────┐   ┌──────────┐   ┌──────────────────┐    │
//!   ─────────────────────┼─▶│  http  │──▶│ routing  │──▶│     pipeline     │    │
//!                        │  │ server │   │  table   │   │  (state machine) │    │
//!                        │  └────────┘   └──────────┘   └──┬──────┬─────┬──┘    │
//!                        │                                 │      │     │       │
//!                        │           ┌─────────────────────┘      │     └──┐    │
//!                        │           ▼                            ▼        ▼    │
//!                        │   ┌──────────────┐           ┌────────────┐ ┌───────┐│
//!                        │   │ audit relay  │──────────▶│   broker   │ │backend││──▶ FHIR server
//!                        │   │ (wire-tap)   │           │ (topics)   │ │ (http)││    (hapi/ibm/
//!                        │   └──────────────┘           └────────────┘ └───────┘│     microsoft)
//!                        │                                                      │
//!                        │   config · observability · resilience · lifecycle   │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use fhir_relay::config::{read_config, validate_config, BrokerKind, RelayConfig};
use fhir_relay::http::HttpServer;
use fhir_relay::lifecycle::{bind_listener, build_services, Shutdown, StartupError};
use fhir_relay::observability::{init_logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "fhir-relay", version, about = "FHIR ingress, audit and forwarding relay")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long, env = "FHIR_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `broker.url`.
    #[arg(long, env = "FHIR_RELAY_BROKER_URL")]
    broker_url: Option<String>,

    /// Override `fhir.vendor` (hapi, ibm, microsoft, or any configured key).
    #[arg(long, env = "FHIR_RELAY_VENDOR")]
    vendor: Option<String>,

    /// Use the in-process broker instead of NATS.
    #[arg(long)]
    memory_broker: bool,
}

impl Args {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(url) = &self.broker_url {
            config.broker.url = url.clone();
        }
        if let Some(vendor) = &self.vendor {
            config.fhir.vendor = vendor.clone();
        }
        if self.memory_broker {
            config.broker.kind = BrokerKind::Memory;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => RelayConfig::default(),
    };
    args.apply(&mut config);

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fhir-relay starting");

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(error = %error, "Invalid configuration");
        }
        return Err(fhir_relay::config::ConfigError::Validation(errors).into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        vendor = %config.fhir.vendor,
        broker = ?config.broker.kind,
        path_prefix = %config.ingress.path_prefix,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| StartupError::Metrics(format!("invalid metrics address: {e}")))?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
    }

    let services = build_services(&config).await?;
    let listener = bind_listener(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(&config, services.state);
    server.run(listener, server_shutdown).await?;

    // The server owned the last audit senders; the worker now drains and exits.
    let drain = Duration::from_secs(config.audit.drain_timeout_secs);
    match tokio::time::timeout(drain, services.audit_worker).await {
        Ok(Ok(())) => tracing::info!("Audit queue drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Audit worker panicked"),
        Err(_) => tracing::warn!(timeout_secs = drain.as_secs(), "Audit drain timed out"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
