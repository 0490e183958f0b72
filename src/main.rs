use anyhow::Result;
use clap::Parser;
use covid_tracker::{track, Request, Settings, SystemViewer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// COVID-19 Tracker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Country name to track COVID-19 data for
    #[arg(long)]
    country: String,

    /// Save filtered data
    #[arg(long)]
    save: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();
    let request = Request {
        country: cli.country,
        save: cli.save,
    };

    let outcome = track(&Settings::default(), &request, &SystemViewer).await?;
    info!("done: {} rows charted for {}", outcome.rows, request.country);

    Ok(())
}
