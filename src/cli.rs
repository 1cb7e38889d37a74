use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::index::DEFAULT_SEARCH_PATH;
use crate::page::{DEFAULT_INPUT_SELECTOR, DEFAULT_RESULT_SELECTOR};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProgressMode {
    /// Enable progress UI when stderr is a TTY.
    Auto,
    /// Always enable progress UI (even when piped).
    Always,
    /// Never show progress UI.
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Title, url and excerpt per match, highlights in brackets.
    Text,
    /// Outcome as JSON.
    Json,
    /// A standalone results page.
    Html,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeAction {
    /// Apply the stored (or `--scheme`) preference.
    Apply,
    /// Flip the scheme as a toggle click would and persist it.
    Toggle,
    /// Pointer entered the toggle button.
    HoverEnter,
    /// Pointer left the toggle button.
    HoverLeave,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Progress display: `auto`, `always`, or `never`.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub progress: ProgressMode,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search a local-search index.
    Search(SearchArgs),
    /// Resolve and apply the light/dark color scheme.
    Theme(ThemeArgs),
}

#[derive(Debug, ClapArgs)]
pub struct SearchArgs {
    /// Search query. Keywords are split on whitespace and hyphens.
    pub query: String,

    /// Index location: a file path, an absolute URL, or a path joined onto `--base-url`.
    #[arg(long, default_value = DEFAULT_SEARCH_PATH)]
    pub index: String,

    /// Site base URL the index path is resolved against.
    #[arg(long)]
    pub base_url: Option<Url>,

    /// Output format when no `--page` is given.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// HTML page containing the search input and result container to fill in.
    #[arg(long)]
    pub page: Option<PathBuf>,

    /// Output path. Defaults to stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Selector of the search input on `--page`.
    #[arg(long, default_value = DEFAULT_INPUT_SELECTOR)]
    pub input_selector: String,

    /// Selector of the result container on `--page`.
    #[arg(long, default_value = DEFAULT_RESULT_SELECTOR)]
    pub result_selector: String,

    /// HTTP User-Agent used for fetching a remote index.
    #[arg(long, default_value = "fluid-local-search/0.1")]
    pub user_agent: String,

    /// Request timeout in seconds for a remote index.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, ClapArgs)]
pub struct ThemeArgs {
    #[arg(value_enum)]
    pub action: ThemeAction,

    /// JSON file holding the persisted preference.
    #[arg(long)]
    pub store: PathBuf,

    /// Scheme to apply instead of the stored one.
    #[arg(long)]
    pub scheme: Option<String>,

    /// Page default scheme, as `data-default-color-scheme` would give it. Read from `--page` when omitted.
    #[arg(long)]
    pub default_scheme: Option<String>,

    /// System color mode (`prefers-color-scheme`).
    #[arg(long)]
    pub color_mode: Option<String>,

    /// Local hour of day; defaults to the current local time.
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    pub hour: Option<u32>,

    /// Current `data` of the toggle icon. Read from `--page` when omitted.
    #[arg(long)]
    pub icon_data: Option<String>,

    /// Utterances theme for light mode.
    #[arg(long, default_value = "github-light")]
    pub utterances_light: String,

    /// Utterances theme for dark mode.
    #[arg(long, default_value = "github-dark")]
    pub utterances_dark: String,

    /// Giscus theme for light mode.
    #[arg(long, default_value = "light")]
    pub giscus_light: String,

    /// Giscus theme for dark mode.
    #[arg(long, default_value = "dark")]
    pub giscus_dark: String,

    /// HTML page to apply the plan to. Without it the plan is printed as JSON.
    #[arg(long)]
    pub page: Option<PathBuf>,

    /// Output path for the updated page. Defaults to stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}
