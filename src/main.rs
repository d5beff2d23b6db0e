use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::rc::Rc;

use dom_waiter::browser::BrowserSession;
use dom_waiter::document::ChromeDocument;
use dom_waiter::script::{run_script, ScriptResult, ScriptTarget};
use dom_waiter::WaitConfig;

/// dom-waiter: run a page script whose callbacks wait on document conditions
#[derive(Parser)]
#[command(name = "dom-waiter", version, about)]
struct Cli {
    /// JavaScript file to run
    script: PathBuf,

    /// HTML snapshot to run against (default: an empty page)
    #[arg(long, conflicts_with = "url")]
    html: Option<PathBuf>,

    /// Run against a live page opened in Chrome
    #[arg(long)]
    url: Option<String>,

    /// Run Chrome with a visible window (default: headless)
    #[arg(long, requires = "url")]
    headed: bool,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Milliseconds between condition checks
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Give up on pending waits after this many milliseconds
    #[arg(long)]
    budget_ms: Option<u64>,

    /// Sleep in real time between checks
    #[arg(long)]
    realtime: bool,
}

impl Cli {
    fn wait_config(&self) -> anyhow::Result<WaitConfig> {
        let mut config = match &self.config {
            Some(path) => WaitConfig::from_file(path)?,
            None => WaitConfig::default(),
        };
        if let Some(ms) = self.interval_ms {
            config = config.with_check_interval(ms);
        }
        if let Some(ms) = self.budget_ms {
            config = config.with_budget(ms);
        }
        // A live page renders on its own clock.
        if self.realtime || self.url.is_some() {
            config = config.with_realtime(true);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();
    let config = cli.wait_config()?;
    let script = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("Failed to read script {}", cli.script.display()))?;

    let result = match &cli.url {
        Some(url) => run_live(url, !cli.headed, script, config).await?,
        None => {
            let html = match &cli.html {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read HTML {}", path.display()))?,
                None => String::new(),
            };
            tracing::info!("Running {} against an HTML snapshot", cli.script.display());
            tokio::task::spawn_blocking(move || {
                run_script(&script, ScriptTarget::html(&html), &config)
            })
            .await?
        }
    };

    println!("{}", result.format_output());
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_live(
    url: &str,
    headless: bool,
    script: String,
    config: WaitConfig,
) -> anyhow::Result<ScriptResult> {
    let session = BrowserSession::launch(headless).await?;
    tracing::info!("Running against {} (headless: {})", url, session.is_headless());
    let page = session.open(url).await?;

    let handle = tokio::runtime::Handle::current();
    // Chrome queries block on the runtime, so the script runs off the workers.
    let result = tokio::task::spawn_blocking(move || {
        let document = Rc::new(ChromeDocument::new(handle, page));
        run_script(&script, ScriptTarget::Live(document), &config)
    })
    .await;

    session.close().await?;
    Ok(result?)
}
