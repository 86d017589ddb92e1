use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use topogen_daemon::{cli::DaemonCli, logging, render::ContextDumpRenderer};
use topogen_engine::{Generator, GeneratorConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonCli::parse();
    logging::init_tracing(&args.log_level, &args.log_format)?;

    let configs = args
        .config_file()
        .await
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    let tls = args
        .tls()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if args.validate {
        println!("configuration ok ({} configs)", configs.config.len());
        return Ok(());
    }
    if configs.is_empty() {
        return Err(anyhow::anyhow!(
            "no configs given: pass --config or the single-config flags"
        ));
    }

    let generator = Generator::new(
        GeneratorConfig {
            endpoint: args.endpoint.clone(),
            tls,
            all: args.all,
            retry: true,
            configs,
        },
        Arc::new(ContextDumpRenderer),
    )
    .await
    .map_err(|e| anyhow::anyhow!("unable to create generator: {}", e))?;

    tracing::info!("topogen running");
    generator.generate().await?;
    tracing::info!("topogen shut down");
    Ok(())
}
