//! mindful: focus and calm browsing companion, terminal edition.
//!
//! Runs the content agent against a page read from a file or stdin, with
//! an in-process background service and page responder.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use mindful::agent::{ContentAgent, LayeredExtractor, Presenter, StaticText, View};
use mindful::background::BackgroundService;
use mindful::bridge::{PageBridge, PageResponder, window};
use mindful::command::{self, CommandClient};
use mindful::config::Config;
use mindful::journal::{Journal, MoodDetector};
use mindful::providers::CapabilityRegistry;
use mindful::storage::{FileStore, KeyValueStore, Settings, SystemClock};
use mindful::types::{FeatureOutcome, Mode};

/// Focus and calm browsing companion.
#[derive(Parser)]
#[command(name = "mindful")]
#[command(version)]
#[command(about = "Score pages against your goal, summarize them calmly, keep a mood journal")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "MINDFUL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a page's usefulness for the browsing intent
    Assess {
        /// Page text file (or omit to read from stdin)
        file: Option<PathBuf>,
        /// Page URL
        #[arg(short, long, default_value = "about:blank")]
        url: String,
        /// Page title
        #[arg(short, long, default_value = "")]
        title: String,
        /// Intent to use instead of the saved one
        #[arg(short, long)]
        intent: Option<String>,
    },

    /// Produce a calm summary of a page
    Summarize {
        /// Page text file (or omit to read from stdin)
        file: Option<PathBuf>,
        #[arg(short, long, default_value = "about:blank")]
        url: String,
        #[arg(short, long, default_value = "")]
        title: String,
    },

    /// Show or set the operating mode
    Mode {
        /// "calm" or "focus"
        mode: Option<Mode>,
    },

    /// Show or set the browsing intent
    Intent {
        intent: Option<String>,
    },

    /// Mood-tagged journal
    Journal {
        #[command(subcommand)]
        action: JournalAction,
    },
}

#[derive(Subcommand)]
enum JournalAction {
    /// Add an entry (or omit the text to read from stdin)
    Add { text: Option<String> },
    /// List entries, newest first
    List,
    /// Delete an entry by id
    Delete { id: String },
}

/// Prints views: progress to stderr, results to stdout.
struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn present(&self, view: View) {
        match view {
            View::FocusBar { intent } => eprintln!("focus: {intent}"),
            View::FocusBarHidden => {}
            View::AssessmentLoading => eprintln!("Analyzing page content..."),
            View::AssessmentStatus(status)
            | View::SummaryLoading(status)
            | View::SummaryStatus(status) => eprintln!("{status}"),
            View::Assessment {
                assessment,
                provenance,
                note,
            } => {
                if let Some(note) = note {
                    eprintln!("({note})");
                }
                println!("{assessment}");
                eprintln!("[{}]", provenance.as_str());
            }
            View::NoContent => println!("N/A: No content found on this page"),
            View::SummarySnippet { summary, when } => {
                eprintln!("Last calm summary {when}:\n{}", summary.text)
            }
            View::Summary {
                summary,
                provenance,
                note,
            } => {
                if let Some(note) = note {
                    eprintln!("({note})");
                }
                println!("{}", summary.text);
                eprintln!("[{}]", provenance.as_str());
            }
            View::Nudge { nudge, message } => {
                println!("\n{}\n{message}", nudge.title())
            }
            View::Refocus { intent } => println!("Back to it: {intent}"),
            View::NudgeSnoozed => {}
            View::Feature(feature) => println!("{feature} opened"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mindful=info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;
    let store_path = config
        .storage
        .path
        .clone()
        .unwrap_or_else(FileStore::default_path);
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(store_path));
    let settings = Settings::new(store.clone());

    match args.command {
        Command::Mode { mode } => match mode {
            Some(mode) => {
                settings.set_mode(mode).await?;
                println!("mode: {mode}");
            }
            None => println!("mode: {}", settings.mode().await),
        },

        Command::Intent { intent } => match intent {
            Some(intent) => {
                settings.set_intent(&intent).await?;
                println!("intent: {}", intent.trim());
            }
            None => println!("intent: {}", settings.intent().await),
        },

        Command::Journal { action } => {
            let (background, _server) = background_client(&config)?;
            let journal = Journal::new(store, Arc::new(SystemClock), MoodDetector::new(background));
            match action {
                JournalAction::Add { text } => {
                    let text = resolve_text(text, "journal add")?;
                    let entry = journal.add(&text).await?;
                    println!("{} [{}] {}", entry.id, entry.mood, entry.created_at);
                }
                JournalAction::List => {
                    let entries = journal.entries().await;
                    if entries.is_empty() {
                        println!("No journal entries yet.");
                    }
                    for entry in entries.iter().rev() {
                        println!("{} {} [{}]\n  {}", entry.id, entry.created_at, entry.mood, entry.text);
                    }
                }
                JournalAction::Delete { id } => {
                    if journal.delete(&id).await? {
                        println!("deleted {id}");
                    } else {
                        println!("no entry {id}");
                    }
                }
            }
        }

        Command::Assess {
            file,
            url,
            title,
            intent,
        } => {
            let text = resolve_text(read_file(file)?, "assess")?;
            let intent = match intent {
                Some(intent) => intent,
                None => settings.intent().await,
            };
            let agent = build_agent(&config, store, &url, &title, text)?;
            info!(%url, "assessing page");
            if let Some(task) = agent.update_intent(&intent, Mode::Focus) {
                report(task.await?)?;
            } else {
                return Err("No browsing intent set. Use `mindful intent <text>` or --intent.".into());
            }
        }

        Command::Summarize { file, url, title } => {
            let text = resolve_text(read_file(file)?, "summarize")?;
            let agent = build_agent(&config, store, &url, &title, text)?;
            agent.update_intent(&settings.intent().await, Mode::Calm);
            report(agent.calm_summarize().await)?;
        }
    }

    Ok(())
}

fn report<T>(outcome: mindful::Result<FeatureOutcome<T>>) -> mindful::Result<()> {
    if outcome?.is_cancelled() {
        eprintln!("cancelled");
    }
    Ok(())
}

/// Wire the background service, page responder, bridge and agent.
fn build_agent(
    config: &Config,
    store: Arc<dyn KeyValueStore>,
    url: &str,
    title: &str,
    text: String,
) -> mindful::Result<ContentAgent> {
    let (background, _server) = background_client(config)?;

    let (content_port, page_port) = window();
    PageResponder::spawn(Arc::new(registry(config, true)?), page_port);
    let bridge = PageBridge::connect(content_port, config.bridge_config());

    let extractor = LayeredExtractor::new(url, title, Arc::new(StaticText(text)));
    Ok(
        ContentAgent::builder(store, background, Arc::new(extractor), Arc::new(TerminalPresenter))
            .bridge(Arc::new(bridge))
            .drift_config(config.drift_config())
            .calm_summary_cache(config.calm_summary_cache())
            .usefulness_cache(config.usefulness_cache())
            .build(),
    )
}

fn background_client(
    config: &Config,
) -> mindful::Result<(CommandClient, tokio::task::JoinHandle<()>)> {
    let service = BackgroundService::new(Arc::new(registry(config, false)?));
    let (client, server) = command::channel("background", Arc::new(service));
    Ok((client.retry_config(config.retry_config()), server))
}

#[cfg(feature = "ollama")]
fn registry(config: &Config, allow_download: bool) -> mindful::Result<CapabilityRegistry> {
    use mindful::providers::OllamaProvider;

    let builder = CapabilityRegistry::builder().allow_download(allow_download);
    let Some(ollama) = &config.ollama else {
        return Ok(builder.build());
    };
    let provider = OllamaProvider::with_base_url(&ollama.base_url, &ollama.model)?
        .retry_config(config.retry_config());
    Ok(builder.provider(Arc::new(provider)).build())
}

#[cfg(not(feature = "ollama"))]
fn registry(_config: &Config, allow_download: bool) -> mindful::Result<CapabilityRegistry> {
    Ok(CapabilityRegistry::builder()
        .allow_download(allow_download)
        .build())
}

fn read_file(file: Option<PathBuf>) -> io::Result<Option<String>> {
    file.map(std::fs::read_to_string).transpose()
}

/// Resolve text from an argument or stdin.
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(text) = arg {
        return Ok(text);
    }
    if io::stdin().is_terminal() {
        return Err(format!("{command}: provide text as an argument or pipe via stdin").into());
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
