use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use badgeboard::app::refresh::Refresher;
use badgeboard::app::store::open_store;
use badgeboard::badges::BadgeAllowList;
use badgeboard::cli::{Cli, Command, StoreArgs};
use badgeboard::config::Config;
use badgeboard::fetch::{FetchOutcome, ProfileFetcher};
use badgeboard::roster::RosterColumns;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    badgeboard::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let config = Config::from_env().context("load config")?;

    match cli.command {
        Command::Refresh(args) => {
            let store_url = store_url(&config, &args.store);
            let store = open_store(&store_url).await.context("open store")?;
            let roster = args
                .roster
                .map(PathBuf::from)
                .unwrap_or_else(|| config.roster_path.clone());
            let fetcher = ProfileFetcher::new(config.fetcher_options(), BadgeAllowList::default())
                .context("build fetcher")?;
            let refresher = Refresher::new(roster, RosterColumns::default(), fetcher, store.clone());

            let result = refresher.perform_refresh().await.context("refresh");
            store.close().await;
            let summary = result?;
            println!(
                "refreshed {} students ({} failed)",
                summary.students, summary.failed
            );
        }
        Command::Count(args) => {
            let fetcher = ProfileFetcher::new(config.fetcher_options(), BadgeAllowList::default())
                .context("build fetcher")?;
            match fetcher.fetch(&args.url).await {
                FetchOutcome::Counted(count) => println!("{count}"),
                FetchOutcome::Failed(failure) => anyhow::bail!("{}: {failure}", args.url),
            }
        }
        Command::Extract(args) => {
            let html = std::fs::read_to_string(&args.html)
                .with_context(|| format!("read html: {}", args.html))?;
            println!("{}", badgeboard::badges::extract_badge_count(&html));
        }
        Command::Students(args) => {
            let store = open_store(&store_url(&config, &args.store))
                .await
                .context("open store")?;
            let result = store.list().await.context("list students");
            store.close().await;
            let entries = result?;
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).context("serialize students")?
            );
        }
    }

    Ok(())
}

fn store_url(config: &Config, args: &StoreArgs) -> String {
    args.store_url
        .clone()
        .unwrap_or_else(|| config.store_url.clone())
}
