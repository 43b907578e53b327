use std::sync::Arc;

use anyhow::Result;
use brokerrp::{config, BrokerClient, Config, RelyingParty};
use brokerrp_broker::{HttpTokenExchanger, PortierBroker};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// brokerrp - relying party for identity broker end-to-end tests
///
/// Every option falls back to its `RP_*` environment variable, then to the
/// built-in default.
#[derive(Parser, Debug)]
#[command(name = "brokerrp")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to [default: 127.0.0.1]
    #[arg(long, short = 'H', env = "RP_HOST")]
    host: Option<String>,

    /// Port to listen on [default: 44180]
    #[arg(long, short, env = "RP_PORT")]
    port: Option<u16>,

    /// Broker origin [default: http://localhost:44133]
    #[arg(long, env = "RP_BROKER_URL")]
    broker_url: Option<String>,

    /// Callback URL registered with the broker [default: http://localhost:44180/verify]
    #[arg(long, env = "RP_REDIRECT_URI")]
    redirect_uri: Option<String>,

    /// Token endpoint for the code flow [default: <broker-url>/token]
    #[arg(long, env = "RP_TOKEN_ENDPOINT")]
    token_endpoint: Option<String>,

    /// Timeout for outbound broker requests, in seconds [default: 10]
    #[arg(long, env = "RP_HTTP_TIMEOUT_SECS")]
    http_timeout_secs: Option<u64>,

    /// Run a mock broker in-process on the broker URL's port and use it
    #[cfg(feature = "mock")]
    #[arg(long)]
    mock_broker: bool,
}

impl Cli {
    fn setting(&self, key: &str) -> Option<String> {
        match key {
            config::ENV_HOST => self.host.clone(),
            config::ENV_PORT => self.port.map(|p| p.to_string()),
            config::ENV_BROKER_URL => self.broker_url.clone(),
            config::ENV_REDIRECT_URI => self.redirect_uri.clone(),
            config::ENV_TOKEN_ENDPOINT => self.token_endpoint.clone(),
            config::ENV_HTTP_TIMEOUT_SECS => self.http_timeout_secs.map(|s| s.to_string()),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brokerrp=debug,brokerrp_broker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    #[allow(unused_mut)]
    let mut config = Config::from_lookup(|key| cli.setting(key))?;

    #[cfg(feature = "mock")]
    let mock_handle = if cli.mock_broker {
        Some(mock::start(&mut config).await?)
    } else {
        None
    };

    let broker = build_broker(&cli, &config).await?;
    let exchanger = Arc::new(HttpTokenExchanger::new(
        config.token_endpoint.clone(),
        config.http_timeout,
    )?);

    tracing::info!(
        broker = %config.broker_url,
        redirect_uri = %config.redirect_uri,
        token_endpoint = %exchanger.token_endpoint(),
        request_timeout = ?config.request_timeout(),
        "Starting relying party"
    );

    let rp = RelyingParty::start(&config, broker, exchanger).await?;

    shutdown_signal().await;

    rp.destroy().await;

    #[cfg(feature = "mock")]
    if let Some(handle) = mock_handle {
        handle.shutdown().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Build the broker client: the mock one with `--mock-broker`, otherwise a
/// Portier client discovered from the broker URL.
#[cfg_attr(not(feature = "mock"), allow(unused_variables))]
async fn build_broker(cli: &Cli, config: &Config) -> Result<Arc<dyn BrokerClient>> {
    #[cfg(feature = "mock")]
    if cli.mock_broker {
        let broker: Arc<dyn BrokerClient> =
            Arc::new(brokerrp_broker::MockBroker::new(config.broker_config()));
        return Ok(broker);
    }

    let broker: Arc<dyn BrokerClient> = Arc::new(PortierBroker::new(config.broker_config()).await?);
    Ok(broker)
}

#[cfg(feature = "mock")]
mod mock {
    use anyhow::Result;
    use brokerrp::Config;
    use brokerrp_broker::mock_broker::{MockBrokerHandle, MockBrokerServer};
    use url::Url;

    /// Spawn the mock broker and point `config` at it.
    ///
    /// The broker URL and token endpoint are replaced by the spawned
    /// server's address so that token issuers match.
    pub async fn start(config: &mut Config) -> Result<MockBrokerHandle> {
        let port = config.broker_url.port_or_known_default().unwrap_or(0);
        let handle = MockBrokerServer::new(port).spawn().await?;

        config.broker_url = Url::parse(&handle.base_url())?;
        config.token_endpoint = config.broker_url.join("/token")?;

        Ok(handle)
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
