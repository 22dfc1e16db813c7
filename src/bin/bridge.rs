use anyhow::Result;
use bridge_cni::commands::run_cni;
use bridge_cni::config::PluginConfig;
use bridge_cni::logger;
use bridge_cni::netns::NsWorker;
use bridge_cni::types::{BuildInfo, Error as CniError};
use clap::Parser;
use tracing::error;

/// CNI plugin attaching containers to a shared host bridge
#[derive(Parser)]
#[clap(name = "bridge", about)]
struct Cli {
    /// Print version information and exit
    #[clap(long)]
    version: bool,
}

fn main() -> Result<()> {
    let config = PluginConfig::from_env();
    logger::init(&config.log_file);

    let cli = Cli::parse();
    if cli.version {
        println!("{}", serde_json::to_string_pretty(&BuildInfo::current())?);
        return Ok(());
    }

    // Run the CNI plugin
    let outcome = NsWorker::spawn()
        .map_err(anyhow::Error::from)
        .and_then(|worker| run_cni(config, worker));

    if let Err(err) = outcome {
        error!("CNI plugin error: {:#}", err);

        // Output error in CNI format
        let payload = serde_json::to_string(&CniError::from_anyhow(&err))?;
        eprintln!("{}", payload);
        std::process::exit(1);
    }

    Ok(())
}
