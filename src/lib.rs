mod builtin;
mod cli;
mod error;
mod fetcher;
mod index;
mod matcher;
mod page;
mod progress;
mod render;
mod session;
mod theme;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use cli::{Args, Command, SearchArgs, ThemeArgs};

pub use cli::{Args as CliArgs, Command as CliCommand, OutputFormat, ProgressMode, ThemeAction};
pub use cli::{SearchArgs as CliSearchArgs, ThemeArgs as CliThemeArgs};
pub use error::SearchError;
pub use fetcher::Fetcher;
pub use index::{DEFAULT_SEARCH_PATH, Document, IndexSource, load_documents, parse_index};
pub use matcher::{Corpus, Excerpt, MatchResult, QueryState, SearchOutcome, Segment};
pub use page::{Page, SearchAnchors, Selectors};
pub use render::{RenderPlan, handle_query_changed};
pub use session::SearchSession;
pub use theme::{
    ColorScheme, JsonFileStore, MemoryStore, PreferenceChange, PreferenceStore, ThemeEnvironment,
    ThemePlan, ThemePreference, WidgetThemes,
};

pub async fn run(args: Args) -> anyhow::Result<()> {
    use std::io::IsTerminal as _;

    let progress_enabled = match args.progress {
        ProgressMode::Always => true,
        ProgressMode::Never => false,
        ProgressMode::Auto => std::io::stderr().is_terminal(),
    };
    let progress = progress::Progress::new(progress_enabled);

    let res = match &args.command {
        Command::Search(search) => run_search(search, progress.clone()).await,
        Command::Theme(theme) => run_theme(theme),
    };
    progress.finish();
    res
}

async fn run_search(args: &SearchArgs, progress: Arc<progress::Progress>) -> anyhow::Result<()> {
    let source = IndexSource::resolve(&args.index, args.base_url.as_ref())
        .with_context(|| format!("resolve index location {}", args.index))?;
    let fetcher = Fetcher::new(&args.user_agent, Duration::from_secs(args.timeout_secs))?;
    let session = SearchSession::new(source, fetcher);

    let bound = match &args.page {
        Some(path) => {
            progress.set_stage("binding page");
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            let page = Page::parse(&html);
            let selectors = Selectors {
                input: args.input_selector.clone(),
                results: args.result_selector.clone(),
            };
            let anchors = page.bind_search(&selectors)?;
            anchors.show_loading();
            Some((page, anchors))
        }
        None => None,
    };

    progress.set_stage("loading index");
    let corpus = session.activate().await;
    progress.documents_loaded(corpus.loaded());
    if corpus.is_empty() {
        tracing::warn!("index holds no searchable documents");
    }

    progress.set_stage("searching");
    let output = match bound {
        Some((page, anchors)) => {
            anchors.finish_loading();
            anchors.set_query(&args.query);
            let plan = session.handle_query_changed(&args.query);
            progress.matched(plan.match_count);
            anchors.apply(&plan);
            page.to_html()?
        }
        None => {
            let outcome = corpus.search(&args.query);
            progress.matched(outcome.matches.len());
            tracing::info!(
                state = ?outcome.state,
                matches = outcome.matches.len(),
                "search finished"
            );
            match args.format {
                OutputFormat::Text => render::render_text(&outcome),
                OutputFormat::Json => {
                    serde_json::to_string_pretty(&outcome).context("serialize outcome")?
                }
                OutputFormat::Html => {
                    render::build_results_page(&args.query, &render::plan_for(&outcome))
                }
            }
        }
    };

    write_output(args.out.as_deref(), &output)
}

fn run_theme(args: &ThemeArgs) -> anyhow::Result<()> {
    let mut store = JsonFileStore::new(args.store.clone());
    let preference = ThemePreference::load(&store);

    let page = match &args.page {
        Some(path) => {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            Some(Page::parse(&html))
        }
        None => None,
    };

    if let ThemeAction::HoverEnter | ThemeAction::HoverLeave = args.action {
        let entering = matches!(args.action, ThemeAction::HoverEnter);
        return match &page {
            Some(page) => {
                page.hover_icon(entering);
                write_output(args.out.as_deref(), &page.to_html()?)
            }
            None => {
                let data = args
                    .icon_data
                    .as_deref()
                    .context("hover needs --page or --icon-data")?;
                let swap = theme::hover_icon_swap(data, entering).map(|(from, to)| {
                    serde_json::json!({ "from": from, "to": to })
                });
                let json = serde_json::to_string_pretty(&swap).context("serialize hover swap")?;
                write_output(args.out.as_deref(), &json)
            }
        };
    }

    let mut env = match &page {
        Some(page) => page.theme_environment(args.color_mode.clone()),
        None => ThemeEnvironment::with_local_hour(None, args.color_mode.clone()),
    };
    if args.default_scheme.is_some() {
        env.default_attr = args.default_scheme.clone();
    }
    if let Some(hour) = args.hour {
        env.hour = hour;
    }

    let widgets = theme::default_widgets(&WidgetThemes {
        utterances_light: args.utterances_light.clone(),
        utterances_dark: args.utterances_dark.clone(),
        giscus_light: args.giscus_light.clone(),
        giscus_dark: args.giscus_dark.clone(),
    });
    let presence: &dyn theme::WidgetPresence = match &page {
        Some(page) => page,
        None => &theme::AllPresent,
    };

    let plan = match args.action {
        ThemeAction::Toggle => {
            let icon_data = args
                .icon_data
                .clone()
                .or_else(|| page.as_ref().and_then(Page::icon_data));
            theme::toggle(&preference, &env, icon_data.as_deref(), &widgets, presence)
        }
        _ => theme::apply(args.scheme.as_deref(), &preference, &env, &widgets, presence),
    };
    theme::commit_preference(&mut store, &plan.preference);
    tracing::info!(
        scheme = ?plan.scheme,
        preference = ?plan.preference,
        widgets = plan.notifications.len(),
        "color scheme resolved"
    );

    match &page {
        Some(page) => {
            page.apply_theme(&plan);
            write_output(args.out.as_deref(), &page.to_html()?)
        }
        None => {
            let json = serde_json::to_string_pretty(&plan).context("serialize theme plan")?;
            write_output(args.out.as_deref(), &json)
        }
    }
}

fn write_output(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    use std::io::Write as _;

    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("create {}", parent.display()))?;
                }
            }
            std::fs::write(path, text).with_context(|| format!("write {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes()).context("write stdout")?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n").context("write stdout")?;
            }
            Ok(())
        }
    }
}
