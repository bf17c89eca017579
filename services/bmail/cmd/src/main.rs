//! bmail node binary.
//!
//! Runs the reference mail server: envelope submission on the transfer port
//! and download / delete / state on the retrieval port, backed by an
//! in-memory mail store.

use anyhow::Context;
use bmail_session::{listen_tcp, MailServer, Service};
use bmail_storage::MemoryMailStore;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::ServerConfig;
use logging::BmailLogFormatter;

/// bmail mail server
#[derive(Parser, Debug)]
#[command(name = "bmail-node", version, about = "bmail reference mail server")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// IP to bind both listeners to, overriding the config file
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Idle timeout per connection, e.g. 30s
    #[arg(long)]
    timeout: Option<humantime::Duration>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("warn")
        .add_directive(format!("bmail_node={}", args.log_level).parse()?)
        .add_directive(format!("bmail_session={}", args.log_level).parse()?)
        .add_directive(format!("bmail_storage={}", args.log_level).parse()?)
        .add_directive(format!("bmail_wire={}", args.log_level).parse()?)
        .add_directive(format!("bmail_crypto={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .event_format(BmailLogFormatter::new("bmail"))
        .init();

    info!("Starting bmail node v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ServerConfig::load_from_file(&args.config)?;
    if let Some(bind) = args.bind {
        config.bind_ip = bind;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout.as_secs().max(1);
    }

    let identity = Arc::new(config.identity()?);
    info!(
        component = "node",
        "Serving domain {} as {}", config.local_domain, identity.address()
    );

    let store = Arc::new(MemoryMailStore::new());
    let server = Arc::new(MailServer::new(identity, store, config.mail_server_config()));

    let bmtp = listen_tcp(config.bmtp_addr())
        .await
        .with_context(|| format!("failed to bind transfer port {}", config.bmtp_addr()))?;
    let bpop = listen_tcp(config.bpop_addr())
        .await
        .with_context(|| format!("failed to bind retrieval port {}", config.bpop_addr()))?;

    let transfer = tokio::spawn(Arc::clone(&server).serve(bmtp, Service::Transfer));
    let retrieval = tokio::spawn(Arc::clone(&server).serve(bpop, Service::Retrieval));

    tokio::select! {
        result = transfer => {
            error!(component = "bmtp", "Transfer listener stopped: {:?}", result);
        }
        result = retrieval => {
            error!(component = "bpop", "Retrieval listener stopped: {:?}", result);
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping");
        }
    }

    Ok(())
}
