use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use newsdiff::config::Config;
use newsdiff::db::Database;
use newsdiff::diff::DiffRenderer;
use newsdiff::environment::get_env_var;
use newsdiff::logging::configure_logging;
use newsdiff::notify::Notifier;
use newsdiff::poll::{poll_feeds, poll_loop, PollContext};

#[derive(Parser)]
#[clap(name = "newsdiff", about = "Track and post edits made to articles on news RSS feeds")]
struct Cli {
    /// Path to the TOML configuration file
    #[clap(short, long, default_value = "newsdiff.toml")]
    config: PathBuf,

    /// Log would-be posts instead of posting them
    #[clap(long)]
    dry_run: bool,

    /// Keep polling on the configured interval instead of exiting after one pass
    #[clap(long = "loop")]
    run_loop: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_logging();
    info!("Starting newsdiff");

    let config = Config::load(&cli.config)?;
    if config.feeds.is_empty() {
        warn!("No feeds configured in {}", cli.config.display());
    }

    let db = Database::new(&config.db_path).await?;

    // Token from the environment wins over the config file.
    let access_token = get_env_var("MASTODON_ACCESS_TOKEN").or_else(|| config.mastodon_access_token.clone());

    let notifier = if cli.dry_run {
        info!("Dry run: notifications will be logged, not posted");
        Notifier::dry_run()
    } else {
        match (config.mastodon_base_url.as_deref(), access_token.as_deref()) {
            (Some(base_url), Some(token)) => Notifier::mastodon(base_url, token),
            _ => {
                warn!("No Mastodon credentials configured, falling back to dry run");
                Notifier::dry_run()
            }
        }
    };

    let renderer = match config.render_url.as_deref() {
        Some(render_url) if !cli.dry_run => DiffRenderer::http(render_url),
        _ => DiffRenderer::Plain,
    };

    let ctx = PollContext {
        config,
        db,
        notifier,
        renderer,
    };

    if cli.run_loop {
        poll_loop(&ctx).await;
    } else {
        poll_feeds(&ctx).await;
    }

    info!("Finished newsdiff");
    Ok(())
}
