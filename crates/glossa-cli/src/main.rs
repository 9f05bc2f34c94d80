use std::path::PathBuf;

use clap::{Parser, Subcommand};
use glossa_common::config::ConfigFile;
use glossa_common::documents::DocumentPatch;
use glossa_common::telemetry::{self, TelemetryConfig};
use glossa_common::{Analyzer, ChatAnalyzer, Config, DocumentStore, FileStore, parse_terms};
use glossa_editor_core::{MarkupTree, annotations, rewrite};
use miette::{IntoDiagnostic, Result, miette};

#[derive(Parser)]
#[command(version, about = "Glossa - notes that explain their own jargon", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to config file (.toml or .json)
    #[arg(long, env = "GLOSSA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the notes, overrides `storage.path`
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List notes, pinned first, most recent first
    List,
    /// Create a new note
    New {
        #[arg(long)]
        title: Option<String>,
    },
    /// Pin or unpin a note
    Pin { id: String },
    /// Delete a note
    Delete { id: String },
    /// Print a note with its annotations
    Show { id: String },
    /// Run one analysis pass over a note and store the annotated markup
    Annotate { id: String },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();

    let cli = Cli::parse();

    let mut telemetry_config = TelemetryConfig::from_env("glossa-cli");
    if cli.verbose {
        telemetry_config = telemetry_config.with_level(tracing::Level::DEBUG);
    }
    telemetry::init(telemetry_config);

    let config_file = ConfigFile::new(cli.config.clone().unwrap_or_else(default_config_path));
    let config = Config::load(&config_file).await?;
    let data_dir = match cli.data_dir.clone().or_else(|| config.storage.path.clone()) {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let mut store = DocumentStore::load(FileStore::new(&data_dir));

    match cli.command {
        Commands::List => {
            for doc in store.list() {
                let pin = if doc.is_pinned { "*" } else { " " };
                println!(
                    "{pin} {:<15} {:<30} {}",
                    doc.id,
                    doc.title,
                    doc.last_modified.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::New { title } => {
            let mut doc = store.create();
            if let Some(title) = title {
                doc = store.update(&doc.id, DocumentPatch::title(title))?;
            }
            println!("Created {} ({})", doc.id, doc.title);
        }
        Commands::Pin { id } => {
            let doc = store.toggle_pin(&id)?;
            let state = if doc.is_pinned { "Pinned" } else { "Unpinned" };
            println!("{state} {} ({})", doc.id, doc.title);
        }
        Commands::Delete { id } => {
            let doc = store.delete(&id)?;
            println!("Deleted {} ({})", doc.id, doc.title);
        }
        Commands::Show { id } => {
            let doc = store
                .get(&id)
                .ok_or_else(|| miette!("no note with id {id}"))?;
            println!("# {}", doc.title);
            println!();
            println!("{}", MarkupTree::parse(&doc.content).plain_text());
            let found = annotations(&doc.content);
            if !found.is_empty() {
                println!();
                for annotation in found {
                    println!("  {}: {}", annotation.text, annotation.definition);
                }
            }
        }
        Commands::Annotate { id } => {
            let content = store
                .get(&id)
                .ok_or_else(|| miette!("no note with id {id}"))?
                .content
                .clone();
            let text = MarkupTree::parse(&content).plain_text();
            if text.trim().is_empty() {
                println!("Nothing to analyze");
                return Ok(());
            }

            let analyzer = ChatAnalyzer::from_env(config.analyzer.clone())?;
            let payload = analyzer.analyze(text).await?;
            let terms = parse_terms(&payload);
            let annotated = rewrite(&content, &terms);
            for term in &terms {
                println!("  {}: {}", term.term, term.definition);
            }
            if annotated == content {
                println!("No new annotations");
            } else {
                store.update(&id, DocumentPatch::content(annotated))?;
                println!("Annotated {id}");
            }
        }
        Commands::Config { write } => {
            print!("{}", toml::to_string_pretty(&config).into_diagnostic()?);
            if write {
                config.save(&config_file).await?;
                eprintln!("Wrote {}", config_file.path().display());
            }
        }
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glossa")
        .join("config.toml")
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("glossa"))
        .ok_or_else(|| miette!("could not determine a data directory, pass --data-dir"))
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
