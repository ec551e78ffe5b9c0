use anyhow::Result;
use clap::Parser;
use sitedeploy::app::App;
use sitedeploy::config::Config;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "sitedeploy")]
#[command(about = "Publish a generated site to static hosting")]
struct CliArgs {
    /// File or directory to publish.
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Also write the collected files below this directory.
    #[arg(long, value_name = "DIR")]
    dst: Option<PathBuf>,

    /// Deploy to an in-memory hosting service instead of the real API.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitedeploy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    config.dry_run |= args.dry_run;

    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let cancel = app.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling deployment");
            cancel.cancel();
        }
    });

    match app.run(&args.source, args.dst.as_deref()).await {
        Ok(Some(report)) => {
            info!(
                "Released {} on {} ({} files, {} uploaded)",
                report.version, report.site, report.files, report.uploaded
            );
            Ok(())
        }
        Ok(None) => {
            info!("Local output complete");
            Ok(())
        }
        Err(e) => {
            error!("Deployment failed: {:#}", anyhow::Error::from(e));
            std::process::exit(1);
        }
    }
}
