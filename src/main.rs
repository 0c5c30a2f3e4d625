use color_eyre::eyre::{Result, WrapErr};
use dotenv::dotenv;

use stonks_watch::app;
use stonks_watch::config::Config;
use stonks_watch::cycle::Watcher;
use stonks_watch::logging::{self, LoggingConfig};
use stonks_watch::stocks;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenv().ok();
    logging::init_logging(LoggingConfig::from_env());

    let config = Config::from_env().wrap_err("invalid configuration")?;
    let source = stocks::from_config(&config.provider).wrap_err("couldn't set up quote source")?;
    let watcher = Watcher::new(&config, source);

    tracing::info!(
        symbols = config.symbols.len(),
        interval_secs = config.poll_interval.as_secs(),
        log = %config.log_path.display(),
        "watching quotes, press Ctrl-C to stop"
    );

    let shutdown = async {
        if let Err(why) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %why, "couldn't listen for Ctrl-C");
        }
    };

    app::run(watcher, &config, shutdown)
        .await
        .wrap_err("summary failed")?;

    Ok(())
}
