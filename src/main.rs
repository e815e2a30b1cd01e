use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use std::path::Path;

use pdf_tutor::gemini::{GeminiClient, GeminiConfig};
use pdf_tutor::rag::RagEngine;
use pdf_tutor::session::{DocumentSession, SessionConfig};

/// An AI tutor that answers questions about a PDF using TF-IDF retrieval and Gemini
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the document to load on startup (PDF or text)
    #[arg(index = 1)]
    file_path: Option<String>,

    /// Number of chunks used as context for each answer
    #[arg(long)]
    top_k: Option<usize>,

    /// Print the ranked chunks instead of asking the model
    #[arg(long)]
    retrieve_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Load configuration from environment
    let session_config = SessionConfig::from_env().context("Invalid document session settings")?;
    let gemini_config = if args.retrieve_only {
        GeminiConfig::from_env().unwrap_or_default()
    } else {
        GeminiConfig::from_env().context("Missing GEMINI_API_KEY")?
    };

    let context_chunks = args.top_k.unwrap_or(session_config.context_chunks);
    let session = DocumentSession::new(session_config.chunker());
    let mut engine = RagEngine::new(session, GeminiClient::new(gemini_config), context_chunks);

    if let Some(file_path) = args.file_path {
        info!("Processing file: {}", file_path);

        // Validate input file exists
        if !Path::new(&file_path).exists() {
            error!("File not found: {}", file_path);
            return Err(anyhow::anyhow!("File not found"));
        }

        let chunk_count = engine
            .load_document(file_path.as_str())
            .await
            .context("Failed to process document")?;
        println!("Processed {}: {} chunks", file_path, chunk_count);
    }

    // Enter interactive Q&A loop
    engine
        .run_query_loop(args.retrieve_only)
        .await
        .context("Error in query loop")?;

    Ok(())
}
