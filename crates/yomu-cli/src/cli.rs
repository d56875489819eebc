use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use yomu_core::models::DeletionBehavior;

#[derive(Parser)]
#[command(name = "yomu")]
#[command(about = "Sync reading progress and library data with the Yomu backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local library database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge local state with the backend
    Sync,
    /// Download remote state and apply it locally
    Pull,
    /// Upload local state without merging
    Push,
    /// Show connection and sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List conflicts reported by the last sync
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a reading position for a book
    Progress {
        /// Book ID
        book_id: String,
        /// Zero-based chapter index
        #[arg(long)]
        chapter: usize,
        /// Character offset inside the chapter
        #[arg(long, default_value = "0")]
        offset: u64,
        /// Text around the position
        #[arg(long)]
        snippet: Option<String>,
    },
    /// Remove a book locally and ship the removal with the next sync
    Remove {
        /// Book ID
        book_id: String,
    },
    /// Show or change sync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Connect or disconnect the sync backend
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DeletionMode {
    Keep,
    Delete,
    Ask,
}

impl From<DeletionMode> for DeletionBehavior {
    fn from(mode: DeletionMode) -> Self {
        match mode {
            DeletionMode::Keep => Self::KeepEverywhere,
            DeletionMode::Delete => Self::DeleteEverywhere,
            DeletionMode::Ask => Self::AskEachTime,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show client settings and the synced preferences
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change synced preferences on the backend
    Set(ConfigSetArgs),
    /// Write client settings to the config file
    Client {
        /// Sync API base URL
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Where the auth flow returns to
        #[arg(long, value_name = "URL")]
        redirect_uri: Option<String>,
    },
}

#[derive(Debug, Default, clap::Args)]
pub struct ConfigSetArgs {
    /// Include reading progress
    #[arg(long, value_name = "BOOL")]
    pub progress: Option<bool>,
    /// Include book metadata and categories
    #[arg(long, value_name = "BOOL")]
    pub metadata: Option<bool>,
    /// Include parsed chapter content
    #[arg(long, value_name = "BOOL")]
    pub content: Option<bool>,
    /// Include raw book files
    #[arg(long, value_name = "BOOL")]
    pub files: Option<bool>,
    /// Sync when the app starts
    #[arg(long, value_name = "BOOL")]
    pub on_app_start: Option<bool>,
    /// Sync when the app resumes
    #[arg(long, value_name = "BOOL")]
    pub on_app_resume: Option<bool>,
    /// Sync after reading a chapter
    #[arg(long, value_name = "BOOL")]
    pub on_chapter_read: Option<bool>,
    /// Sync when opening a chapter
    #[arg(long, value_name = "BOOL")]
    pub on_chapter_open: Option<bool>,
    /// What to do with books removed on other devices
    #[arg(long, value_enum)]
    pub deletions: Option<DeletionMode>,
    /// Google Drive folder name
    #[arg(long, value_name = "NAME")]
    pub folder: Option<String>,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Start the connect flow and print the URL to open
    Login,
    /// Finish the connect flow with the redirect URL or query
    Complete {
        /// Redirect URL or its query string
        redirect: String,
    },
    /// Disconnect the sync backend
    Logout,
}
