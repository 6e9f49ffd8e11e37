use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use znode_registrar::config::FailurePolicy;
use znode_registrar::registry::ZkAdapter;
use znode_registrar::replay::{apply_events, load_events, render_tree};
use znode_registrar::store::MemoryStore;

#[derive(Parser, Debug)]
#[command(name = "registrar-replay")]
#[command(about = "Replay container lifecycle events against an in-memory coordination store")]
struct Cli {
    /// Connection URI; only the root path and query options are used
    #[arg(long, default_value = "zookeeper://127.0.0.1:2181/registrator")]
    uri: String,

    /// JSON-lines file of register/deregister/refresh events
    #[arg(long)]
    events: PathBuf,

    /// Override the failure policy from the URI (lenient or strict)
    #[arg(long)]
    policy: Option<FailurePolicy>,

    /// Exit non-zero if any lifecycle call failed
    #[arg(long)]
    fail_fast: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let uri = match cli.policy {
        Some(policy) => with_policy(&cli.uri, policy),
        None => cli.uri.clone(),
    };

    let events = load_events(&cli.events)?;
    info!("replaying {} event(s) from {}", events.len(), cli.events.display());

    let store = MemoryStore::new();
    let adapter = ZkAdapter::connect(&store, &uri).context("failed to start adapter")?;
    let failed = apply_events(&adapter, &events);

    print!("{}", render_tree(&store.dump()));

    if failed > 0 {
        info!("{failed} lifecycle call(s) failed");
        if cli.fail_fast {
            anyhow::bail!("{failed} lifecycle call(s) failed");
        }
    }
    Ok(())
}

fn with_policy(uri: &str, policy: FailurePolicy) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}policy={policy}")
}
