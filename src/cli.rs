use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one refresh cycle over the roster and save the counts.
    Refresh(RefreshArgs),
    /// Fetch one public profile and print its badge count.
    Count(CountArgs),
    /// Count badges in a saved profile page.
    Extract(ExtractArgs),
    /// Print the stored leaderboard as JSON.
    Students(StudentsArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Store URL (postgres://, file:// or memory://). Overrides BADGEBOARD_STORE_URL.
    #[arg(long)]
    pub store_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Roster CSV path. Overrides BADGEBOARD_ROSTER.
    #[arg(long)]
    pub roster: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct CountArgs {
    /// Public profile URL (must be http/https).
    #[arg(long)]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Saved profile HTML file.
    #[arg(long)]
    pub html: String,
}

#[derive(Debug, Args)]
pub struct StudentsArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}
