use crate::document::SourceDocument;
use crate::error::TutorError;
use crate::gemini::{AskLlm, GeminiClient};
use crate::session::{DocumentSession, RetrievedChunk};
use anyhow::{Context, Result};
use log::{info, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Separator placed between retrieved chunks in the prompt context
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Build the tutor prompt for a question grounded on PDF context
pub fn build_tutor_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an AI tutor helping a student understand content from their educational materials.\n\
         Use the following context from their PDF to answer their question. If the context doesn't\n\
         contain relevant information, say so and provide general guidance.\n\
         \n\
         CONTEXT FROM PDF:\n\
         {}\n\
         \n\
         STUDENT QUESTION:\n\
         {}\n\
         \n\
         Provide a comprehensive answer based on the context. Use LaTeX formatting for any mathematical expressions.",
        context, question
    )
}

/// A line typed into the interactive loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopCommand {
    Exit,
    Status,
    Clear,
    Load(String),
    Ask(String),
    Empty,
}

impl LoopCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => LoopCommand::Empty,
            _ if line.eq_ignore_ascii_case("exit") => LoopCommand::Exit,
            ":status" => LoopCommand::Status,
            ":clear" => LoopCommand::Clear,
            _ => match line.strip_prefix(":load") {
                Some(path) if path.starts_with(char::is_whitespace) => {
                    LoopCommand::Load(path.trim().to_string())
                }
                _ => LoopCommand::Ask(line.to_string()),
            },
        }
    }
}

/// PDF tutor: owns the document session and answers questions about it
pub struct RagEngine<L = GeminiClient> {
    session: DocumentSession,
    llm: L,
    context_chunks: usize,
}

impl<L: AskLlm> RagEngine<L> {
    /// Create a new RAG engine
    pub fn new(session: DocumentSession, llm: L, context_chunks: usize) -> Self {
        RagEngine {
            session,
            llm,
            context_chunks,
        }
    }

    pub fn session(&self) -> &DocumentSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DocumentSession {
        &mut self.session
    }

    /// Read and extract a file off the async runtime, then replace the session with it.
    ///
    /// The session moves into the blocking task and comes back with it; it is
    /// left empty only if that task panics.
    pub async fn load_document(&mut self, file_path: impl Into<PathBuf>) -> Result<usize> {
        let path = file_path.into();
        let mut session = std::mem::take(&mut self.session);

        let (session, loaded) = tokio::task::spawn_blocking(move || {
            let loaded = SourceDocument::from_file(&path).and_then(|document| {
                let chunk_count = session.load_document(&document)?;
                Ok((document.name, chunk_count))
            });
            (session, loaded)
        })
        .await
        .context("Document extraction task failed")?;
        self.session = session;

        let (name, chunk_count) = loaded?;
        info!("Loaded document: {}", name);

        Ok(chunk_count)
    }

    /// Chunks most relevant to `question`, using the configured context size
    pub fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, TutorError> {
        self.session.query(question, self.context_chunks)
    }

    /// Answer a question from the retrieved chunks.
    ///
    /// Retrieval errors are returned as-is; model failures come back as a
    /// placeholder answer.
    pub async fn answer(&self, question: &str) -> Result<String, TutorError> {
        let chunks = self.retrieve(question)?;

        let context = chunks
            .iter()
            .map(|chunk| chunk.chunk_text.as_str())
            .collect::<Vec<&str>>()
            .join(CONTEXT_SEPARATOR);

        let prompt = build_tutor_prompt(&context, question);
        Ok(self.llm.ask_llm(&prompt).await)
    }

    /// Run the interactive question loop on stdin
    pub async fn run_query_loop(&mut self, retrieve_only: bool) -> Result<()> {
        println!("Ask a question, or use :status, :clear, :load <path>. Type 'exit' to quit.");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.lock().read_line(&mut buffer)? == 0 {
                break;
            }

            match LoopCommand::parse(&buffer) {
                LoopCommand::Empty => continue,
                LoopCommand::Exit => {
                    println!("Goodbye!");
                    break;
                }
                LoopCommand::Status => {
                    println!("{}", serde_json::to_string_pretty(&self.session.status())?);
                }
                LoopCommand::Clear => {
                    self.session.clear();
                    println!("Document cleared");
                }
                LoopCommand::Load(path) => match self.load_document(path.as_str()).await {
                    Ok(count) => println!("Processed {}: {} chunks", path, count),
                    Err(e) => println!("Error processing document: {:#}", e),
                },
                LoopCommand::Ask(question) if retrieve_only => match self.retrieve(&question) {
                    Ok(chunks) => {
                        for chunk in chunks {
                            println!("\n[{}] score {:.4}\n{}", chunk.index, chunk.score, chunk.chunk_text);
                        }
                    }
                    Err(e) => println!("{}", e),
                },
                LoopCommand::Ask(question) => match self.answer(&question).await {
                    Ok(answer) => println!("\n{}", answer),
                    Err(e) => {
                        warn!("Query not answered: {}", e);
                        println!("{}", e);
                    }
                },
            }
        }

        Ok(())
    }
}
