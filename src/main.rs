use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

use docchat::chat::{upload_status, ChatSession};
use docchat::{Config, Document, ExtractionPipeline, ExtractionResult, OcrEngineHandle, OcrProgress};

/// Exit code when the document was read but produced no usable text
const EXIT_EXTRACTION_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "docchat", version, about = "Extract chat context from text and PDF uploads")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract text from a .txt or .pdf file
    Extract {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Extract a file and print the chat request that would carry it
    Prompt {
        file: PathBuf,
        /// User message to send along with the file
        #[arg(short, long)]
        message: String,
    },
    /// Check that the rasterizer and OCR engine are usable
    Check,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let engine = Arc::new(OcrEngineHandle::from_config(config.ocr.clone()));
    let pipeline = ExtractionPipeline::from_config(&config, engine);

    match cli.command {
        Commands::Extract { file, format } => extract(&pipeline, &file, format),
        Commands::Prompt { file, message } => prompt(&pipeline, &config, &file, message),
        Commands::Check => check(&pipeline),
    }
}

fn extract(pipeline: &ExtractionPipeline, file: &Path, format: OutputFormat) -> Result<ExitCode> {
    let result = extract_file(pipeline, file)?;

    match format {
        OutputFormat::Text => match &result {
            Ok(extracted) => println!("{}", extracted.text),
            Err(failure) => eprintln!("{}", failure.user_guidance()),
        },
        OutputFormat::Json => {
            let value = match &result {
                Ok(extracted) => json!({
                    "status": "ok",
                    "method": extracted.method,
                    "chars": extracted.char_count(),
                    "pages": extracted.method.ocr_pages(),
                    "elapsed_ms": extracted.elapsed_ms,
                    "text": extracted.text,
                }),
                Err(failure) => json!({
                    "status": "failed",
                    "reason": failure.reason_code(),
                    "message": failure.to_string(),
                    "guidance": failure.user_guidance(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(exit_code_for(&result))
}

fn prompt(pipeline: &ExtractionPipeline, config: &Config, file: &Path, message: String) -> Result<ExitCode> {
    let result = extract_file(pipeline, file)?;
    eprintln!("{}", upload_status(&result));

    let mut session = ChatSession::new();
    session.set_extraction(&result);
    session.push_user(message);

    let request = session.request(&config.chat);
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(exit_code_for(&result))
}

fn check(pipeline: &ExtractionPipeline) -> Result<ExitCode> {
    let rasterizer_ok = pipeline.rasterizer().is_available();
    let engine_ok = pipeline.engine().ensure_initialized();

    println!("pdftoppm:   {}", if rasterizer_ok { "ok" } else { "unavailable" });
    println!("OCR engine: {}", if engine_ok { "ok" } else { "unavailable" });

    Ok(if rasterizer_ok && engine_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_EXTRACTION_FAILED)
    })
}

fn extract_file(pipeline: &ExtractionPipeline, file: &Path) -> Result<ExtractionResult> {
    let document =
        Document::from_path(file).with_context(|| format!("failed to load {}", file.display()))?;

    let mut report = |p: OcrProgress| {
        eprint!("\rOCR page {} of {} ({:.0}%)", p.page, p.total, p.fraction() * 100.0);
        if p.page == p.total {
            eprintln!();
        }
        let _ = std::io::stderr().flush();
    };
    Ok(pipeline.extract_with_progress(document.bytes(), document.kind(), &mut report))
}

fn exit_code_for(result: &ExtractionResult) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::from(EXIT_EXTRACTION_FAILED),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
