use std::env;
use std::path::PathBuf;

use color_eyre::eyre::{Result, WrapErr};
use dotenv::dotenv;

use stonks_watch::config::SummarySettings;
use stonks_watch::logging::{self, LoggingConfig};
use stonks_watch::{render, summary};

// usage: summarize [LOG] [SUMMARY]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenv().ok();
    logging::init_logging(LoggingConfig::from_env());

    let settings = SummarySettings::from_env().wrap_err("invalid configuration")?;

    let mut args = env::args().skip(1);
    let log_path = args.next().map(PathBuf::from).unwrap_or(settings.log_path);
    let summary_path = args.next().map(PathBuf::from).unwrap_or(settings.summary_path);

    let entries = summary::run_summary(&log_path, &summary_path)
        .await
        .wrap_err("summary failed")?;
    print!("{}", render::render_summary(&entries, settings.display_tz));

    Ok(())
}
