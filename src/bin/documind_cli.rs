use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use documind::config::Config;
use documind::processing::{DocumentService, QueryRequest, ResponseStyle, SessionMode, Upload};
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "txt", "text", "md", "markdown"];

#[derive(Parser)]
#[command(
    name = "documind-cli",
    about = "Ask questions about local documents without running the server"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index documents in memory and answer one question with sentence citations.
    Ask {
        /// Files or directories to index (directories are walked recursively).
        #[arg(long, required = true, num_args = 1..)]
        docs: Vec<PathBuf>,
        #[arg(long)]
        question: String,
        #[arg(long, value_enum, default_value_t = Mode::Single)]
        mode: Mode,
        #[arg(long, value_enum, default_value_t = Style::Concise)]
        style: Style,
        /// Print the raw answer without per-sentence sources.
        #[arg(long)]
        no_cite: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Single,
    Multi,
}

#[derive(Clone, Copy, ValueEnum)]
enum Style {
    Concise,
    Detailed,
    Technical,
    ExecutiveSummary,
}

impl From<Mode> for SessionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Single => SessionMode::Single,
            Mode::Multi => SessionMode::Multi,
        }
    }
}

impl From<Style> for ResponseStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Concise => ResponseStyle::Concise,
            Style::Detailed => ResponseStyle::Detailed,
            Style::Technical => ResponseStyle::Technical,
            Style::ExecutiveSummary => ResponseStyle::ExecutiveSummary,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Ask {
            docs,
            question,
            mode,
            style,
            no_cite,
        } => ask(&docs, question, mode.into(), style.into(), !no_cite).await,
    }
}

async fn ask(
    docs: &[PathBuf],
    question: String,
    mode: SessionMode,
    style: ResponseStyle,
    cite: bool,
) -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("failed to load configuration")?;
    config.ensure_credentials()?;

    let files = collect_documents(docs)?;
    if files.is_empty() {
        bail!("no supported documents found (expected .pdf, .txt or .md files)");
    }

    let mut uploads = Vec::with_capacity(files.len());
    for path in &files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document")
            .to_string();
        uploads.push(Upload { filename, bytes });
    }

    let service = DocumentService::new(config)?;
    let session = service.create_session(mode).await;
    for outcome in service
        .add_session_documents(session.session_id, uploads)
        .await?
    {
        eprintln!(
            "indexed {} ({} chunks, {} pages)",
            outcome.filename, outcome.embeddings_created, outcome.pages
        );
    }

    let answers = service
        .query_session(
            session.session_id,
            QueryRequest {
                query: question,
                k: None,
                style,
                cite,
            },
        )
        .await?;
    service.close_session(session.session_id).await?;

    for answer in answers {
        if let Some(document) = &answer.document {
            println!("## {document}\n");
        }
        println!("{}\n", answer.cited_answer.unwrap_or(answer.answer));
    }
    Ok(())
}

/// Expand files and directories into a sorted list of supported documents.
fn collect_documents(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
            continue;
        }
        if !input.is_dir() {
            bail!("{} does not exist", input.display());
        }
        for entry in WalkDir::new(input).follow_links(false) {
            let entry = entry.with_context(|| format!("failed to walk {}", input.display()))?;
            if entry.file_type().is_file() && is_supported(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
