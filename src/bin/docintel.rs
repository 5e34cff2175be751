//! CLI binary for docintel.
//!
//! A thin shim over the library: maps flags onto `ProcessorConfig` /
//! `ServerConfig`, then either serves the HTTP API or processes one file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docintel::{
    router, DocumentProcessor, LlmBackend, ProcessorConfig, ServerConfig,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the API on port 8000
  docintel serve --port 8000

  # Serve the frontend too
  docintel serve --static-dir frontend/

  # Process one file and print the JSON result
  docintel process receipt.jpg

  # Use a local OpenAI-compatible server
  docintel serve --llm-base-url http://localhost:11434/v1 --model llama3.1

  # Use Anthropic through edgequake-llm (reads ANTHROPIC_API_KEY)
  docintel serve --provider anthropic --model claude-3-5-haiku-latest

ENVIRONMENT VARIABLES:
  OCR_API_KEY       OCR.space API key (required)
  OPENAI_API_KEY    Key for the OpenAI-compatible backend
  RUST_LOG          Log filter, e.g. docintel=debug
"#;

/// Extract structured data from document images with OCR and an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docintel",
    version,
    about = "Extract structured data from document images with OCR and an LLM",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    providers: ProviderArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCINTEL_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, global = true, env = "DOCINTEL_QUIET")]
    quiet: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "DOCINTEL_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve {
        /// Address to bind.
        #[arg(long, env = "DOCINTEL_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to bind.
        #[arg(short, long, env = "DOCINTEL_PORT", default_value_t = 8000)]
        port: u16,

        /// Directory uploads are staged in.
        #[arg(long, env = "DOCINTEL_UPLOAD_DIR", default_value = "uploads")]
        upload_dir: PathBuf,

        /// Frontend directory served under /static.
        #[arg(long, env = "DOCINTEL_STATIC_DIR")]
        static_dir: Option<PathBuf>,

        /// Maximum upload size in bytes.
        #[arg(long, env = "DOCINTEL_MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
        max_upload_bytes: usize,
    },
    /// Process one local file and print the result as JSON.
    Process {
        /// Path to the document image.
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ProviderArgs {
    /// OCR.space API key.
    #[arg(long, env = "OCR_API_KEY", hide_env_values = true, global = true)]
    ocr_api_key: Option<String>,

    /// OCR endpoint URL.
    #[arg(long, env = "OCR_ENDPOINT", global = true)]
    ocr_endpoint: Option<String>,

    /// OCR language code.
    #[arg(long, env = "OCR_LANGUAGE", default_value = "eng", global = true)]
    ocr_language: String,

    /// OCR call timeout in seconds.
    #[arg(long, env = "OCR_TIMEOUT", default_value_t = 60, global = true)]
    ocr_timeout: u64,

    /// LLM provider: openai (built-in client) or an edgequake-llm provider name.
    #[arg(long, env = "LLM_PROVIDER", default_value = "openai", global = true)]
    provider: String,

    /// Key for the OpenAI-compatible backend.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    llm_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "LLM_BASE_URL", global = true)]
    llm_base_url: Option<String>,

    /// Model identifier.
    #[arg(long, env = "LLM_MODEL", default_value = docintel::config::DEFAULT_MODEL, global = true)]
    model: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.0, global = true)]
    temperature: f32,

    /// Maximum tokens the model may generate.
    #[arg(long, env = "LLM_MAX_TOKENS", global = true)]
    max_tokens: Option<u32>,

    /// LLM call timeout in seconds.
    #[arg(long, env = "LLM_TIMEOUT", default_value_t = 60, global = true)]
    llm_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = build_config(&cli.providers).context("Invalid configuration")?;
    let processor =
        DocumentProcessor::from_config(&config).context("Failed to initialise providers")?;

    match cli.command {
        Command::Serve {
            host,
            port,
            upload_dir,
            static_dir,
            max_upload_bytes,
        } => {
            let server = ServerConfig {
                upload_dir,
                static_dir,
                max_upload_bytes,
            };
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("Invalid bind address {host}:{port}"))?;
            let app = router(processor, &server);

            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            info!(addr = %addr, upload_dir = %server.upload_dir.display(), "HTTP API listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;
        }
        Command::Process { file } => {
            let result = processor
                .process_file(&file)
                .await
                .with_context(|| format!("Processing {} failed", file.display()))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("Failed to serialise result")?
            );
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Map CLI args to `ProcessorConfig`.
fn build_config(args: &ProviderArgs) -> Result<ProcessorConfig> {
    let mut builder = ProcessorConfig::builder()
        .ocr_language(&args.ocr_language)
        .ocr_timeout_secs(args.ocr_timeout)
        .llm_backend(LlmBackend::from_name(&args.provider))
        .model(&args.model)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .llm_timeout_secs(args.llm_timeout);

    if let Some(ref key) = args.ocr_api_key {
        builder = builder.ocr_api_key(key);
    }
    if let Some(ref url) = args.ocr_endpoint {
        builder = builder.ocr_endpoint(url);
    }
    if let Some(ref key) = args.llm_api_key {
        builder = builder.llm_api_key(key);
    }
    if let Some(ref url) = args.llm_base_url {
        builder = builder.llm_base_url(url);
    }

    Ok(builder.build()?)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
