mod cli;
mod render;
mod snapshot;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use forum_search::{
    config::read_config,
    domain::{
        models::{ChannelId, UserId},
        search::SYNTAX_HELP,
    },
    factory::{build_cache, build_search},
};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cli::{Cli, Commands, SearchArgs},
    render::{print_outcome, StderrProgress},
    snapshot::SnapshotForum,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Syntax => {
            println!("{SYNTAX_HELP}");
            Ok(())
        }
        Commands::Search(args) => search(args).await,
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("forum_search={level},forum_search_cli={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn search(args: SearchArgs) -> anyhow::Result<()> {
    let settings = read_config().context("failed to load configuration")?;
    init_tracing(&settings.logging.level);

    let forum = Arc::new(SnapshotForum::load(&args.snapshot)?);
    let channel = args.channel.map(ChannelId::new).unwrap_or(forum.channel());
    info!(%channel, threads = forum.thread_count(), "Loaded forum snapshot");

    let shutdown = CancellationToken::new();
    let cache = build_cache(&settings.cache);
    let mut background =
        cache.start_background_tasks(settings.cache.cleanup_interval(), shutdown.clone());

    let search = build_search(&settings, forum, &cache);
    background.push(search.start_session_sweep(shutdown.clone()));

    let session = search.open_session();
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or(settings.search.search_timeout());
    let watchdog = {
        let token = session.token().clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    warn!(?timeout, "Search timed out, cancelling");
                    token.cancel();
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, cancelling search");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    };

    let outcome = search
        .search(
            session,
            UserId::new(args.user),
            channel,
            &args.to_request(),
            &StderrProgress,
        )
        .await;
    watchdog.abort();

    print_outcome(&outcome, args.page);

    if args.show_cache_stats {
        let stats = cache.stats().await;
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    shutdown.cancel();
    join_all(background).await;
    Ok(())
}
