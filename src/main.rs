//! layered-config: compose a configuration stack from a layer manifest and
//! print the merged view.
//!
//! ```text
//! layered-config layers.toml                  # print every key as JSON
//! layered-config layers.toml --get db.host    # print selected keys
//! layered-config layers.toml --watch          # reprint on every change
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use layered_config::manifest::load_manifest;
use layered_config::observability::logging::init_logging;
use layered_config::{ConfigEvent, Configuration, FlatValue};

#[derive(Parser)]
#[command(name = "layered-config")]
#[command(about = "Compose layered configuration and print the merged view", long_about = None)]
struct Cli {
    /// Layer manifest (TOML)
    manifest: PathBuf,

    /// Print only these keys
    #[arg(short, long = "get")]
    keys: Vec<String>,

    /// Keep running and print the view after every change
    #[arg(short, long)]
    watch: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let manifest = load_manifest(&cli.manifest)?;
    let base_dir = cli.manifest.parent().unwrap_or_else(|| Path::new("."));

    tracing::info!(
        manifest = ?cli.manifest,
        layers = manifest.layers.len(),
        "Manifest loaded"
    );

    let config = manifest.to_builder(base_dir)?.build(manifest.options.clone())?;
    print_view(&config, &cli.keys)?;

    if cli.watch {
        watch(&config, &cli.keys).await?;
    }

    let closing = config.clone();
    tokio::task::spawn_blocking(move || closing.close()).await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn watch(config: &Configuration, keys: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = config.events();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!("Watching for changes, press Ctrl-C to exit");
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ConfigEvent::Reloaded { module }) => {
                    tracing::info!(module = %module, "Configuration changed");
                    print_view(config, keys)?;
                }
                Ok(ConfigEvent::ModuleFailed { module, error }) => {
                    tracing::error!(module = %module, error = %error, "Layer failed, serving last known good view");
                }
                Ok(ConfigEvent::Closed) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event receiver lagged");
                    print_view(config, keys)?;
                }
            },
            _ = &mut ctrl_c => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}

fn print_view(config: &Configuration, keys: &[String]) -> Result<(), serde_json::Error> {
    let view: BTreeMap<String, FlatValue> = if keys.is_empty() {
        config.snapshot().to_sorted()
    } else {
        keys.iter()
            .map(|k| (k.clone(), config.get(k).unwrap_or(FlatValue::Null)))
            .collect()
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
