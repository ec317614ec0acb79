use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use docquery_core::{
    chunk_words, classify_small_talk, load_document, with_follow_up, AnswerRouter, ChunkingConfig,
    DocumentSession, Embedder, GeneratorConfig, HashedNgramEmbedder, HttpGenerator,
    IndexedDocument, LoadOptions, QueryOptions, Role, Transcript, DEFAULT_ENDPOINT, DEFAULT_MODEL,
    WELCOME_MESSAGE,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CHUNK_PREVIEW_WORDS: usize = 12;

#[derive(Parser)]
#[command(name = "docquery", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Args)]
struct Settings {
    /// OpenAI-compatible inference base URL
    #[arg(long, global = true, env = "DOCQUERY_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Model name sent with every completion request
    #[arg(long, global = true, env = "DOCQUERY_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Bearer token for the inference endpoint
    #[arg(long, global = true, env = "HF_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Number of chunks handed to the model as context.
    #[arg(long, global = true, default_value = "15")]
    top_k: usize,

    /// Words per chunk.
    #[arg(long, global = true, default_value = "500")]
    chunk_size: usize,

    /// Words shared by consecutive chunks.
    #[arg(long, global = true, default_value = "100")]
    chunk_overlap: usize,

    /// Generation attempts before giving up.
    #[arg(long, global = true, default_value = "5")]
    max_attempts: u32,

    /// First retry delay in milliseconds; doubles on every further retry.
    #[arg(long, global = true, default_value = "1000")]
    backoff_base_ms: u64,

    /// HTTP timeout for a single generation request.
    #[arg(long, global = true, default_value = "60")]
    request_timeout_secs: u64,
}

impl Settings {
    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            retry_max_attempts: self.max_attempts,
            retry_base_delay_ms: self.backoff_base_ms,
            ..QueryOptions::default()
        }
    }

    fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone().filter(|key| !key.trim().is_empty()),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Load a document and answer one question about it.
    Ask {
        /// Document to load (pdf, txt, md, csv, tsv).
        #[arg(long)]
        file: PathBuf,
        /// Question to answer.
        #[arg(long)]
        query: String,
        /// The file holds OCR text extracted from an image.
        #[arg(long, default_value_t = false)]
        image: bool,
        /// Print which strategy produced the answer.
        #[arg(long, default_value_t = false)]
        explain: bool,
    },
    /// Load a document and answer questions read from stdin, one per line.
    Chat {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        image: bool,
    },
    /// Show how a document would be chunked.
    Chunks {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let options = cli.settings.query_options();
    let chunking = ChunkingConfig::from(&options);
    chunking.validate()?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docquery boot"
    );

    match cli.command {
        Command::Ask {
            file,
            query,
            image,
            explain,
        } => {
            let router = build_router(&cli.settings, options)?;
            let session = DocumentSession::new(chunking, embedder());
            upload(&session, &file, image).await?;

            let answer = match classify_small_talk(&query) {
                Some(small_talk) => small_talk.reply().to_string(),
                None => {
                    let answer = router.answer_in(&session, &query).await;
                    if explain {
                        println!("explain: strategy={}", answer.strategy);
                    }
                    with_follow_up(&answer.text)
                }
            };
            println!("{answer}");
        }
        Command::Chat { file, image } => {
            let router = build_router(&cli.settings, options)?;
            let session = DocumentSession::new(chunking, embedder());
            upload(&session, &file, image).await?;
            println!("{WELCOME_MESSAGE}");
            run_chat(&router, &session).await?;
        }
        Command::Chunks { file } => {
            let document = load_document(&file, LoadOptions::default())
                .with_context(|| format!("unable to load {}", file.display()))?;
            let chunks = chunk_words(&document.full_text, &chunking);

            println!("{} chunks from {}", chunks.len(), file.display());
            for (position, chunk) in chunks.iter().enumerate() {
                let preview = chunk
                    .split_whitespace()
                    .take(CHUNK_PREVIEW_WORDS)
                    .collect::<Vec<_>>()
                    .join(" ");
                let words = chunk.split_whitespace().count();
                println!("[{position}] words={words} {preview}");
            }
        }
    }

    Ok(())
}

fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashedNgramEmbedder::default())
}

fn build_router(
    settings: &Settings,
    options: QueryOptions,
) -> anyhow::Result<AnswerRouter<HttpGenerator>> {
    let config = settings.generator_config();
    if config.api_key.is_none() {
        warn!("no api key configured; the endpoint may reject requests");
    }
    let generator = HttpGenerator::new(config)?;
    info!(url = %generator.url(), "generation endpoint configured");
    Ok(AnswerRouter::new(generator, options))
}

async fn upload(
    session: &DocumentSession,
    path: &Path,
    image: bool,
) -> anyhow::Result<Arc<IndexedDocument>> {
    let document = load_document(
        path,
        LoadOptions {
            treat_as_image: image,
        },
    )
    .with_context(|| format!("unable to load {}", path.display()))?;
    Ok(session.index(document).await)
}

/// Reads questions from stdin until EOF or `/quit`.
///
/// `/load <path>` swaps in another document and clears the history;
/// `/history` prints the transcript.
async fn run_chat(
    router: &AnswerRouter<HttpGenerator>,
    session: &DocumentSession,
) -> anyhow::Result<()> {
    let mut transcript = Transcript::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/history" => {
                for message in transcript.messages() {
                    let speaker = match message.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                    };
                    println!("{speaker}: {}", message.content);
                }
                continue;
            }
            _ => {}
        }

        if let Some(path) = line.strip_prefix("/load ") {
            match upload(session, Path::new(path.trim()), false).await {
                Ok(indexed) => {
                    transcript.clear();
                    info!(chunks = indexed.chunk_count(), "document replaced");
                    println!("{WELCOME_MESSAGE}");
                }
                Err(error) => println!("{error:#}"),
            }
            continue;
        }

        let reply = match classify_small_talk(line) {
            Some(small_talk) => small_talk.reply().to_string(),
            None => {
                let answer = router.answer_in(session, line).await;
                info!(strategy = %answer.strategy, "answered");
                with_follow_up(&answer.text)
            }
        };
        println!("{reply}");
        transcript.record_exchange(line, &reply);
    }

    Ok(())
}
