// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `index` — load a document and show what was indexed
//   2. `ask`   — answer one typed or recorded question
//   3. `chat`  — keep a document loaded and answer questions
//                line by line, with slash commands:
//
//                  /voice <wav>   ask with a recorded clip
//                  /load <path>   switch to another document
//                  /history       show the conversation so far
//                  /clear         forget the conversation
//                  /quit          leave

pub mod commands;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{AskArgs, ChatArgs, Commands, ConfigArgs, IndexArgs};

use crate::application::session::{Answer, IndexSummary, Session, VoiceOutcome};
use crate::data::loader::load_path;
use crate::domain::chat::QuestionSource;
use crate::domain::error::RagError;
use crate::infra::services::Services;

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-doc-qa",
    version,
    about = "Ask questions about a PDF by text or voice, answered from the document itself."
)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// The subcommand to run (index, ask or chat)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Build the session once, then dispatch to the subcommand.
    pub fn run(self) -> Result<()> {
        let config   = self.config.resolve()?;
        let services = Services::from_config(&config);
        let session  = Session::new(config, services)?;

        match self.command {
            Commands::Index(args) => run_index(&session, args),
            Commands::Ask(args)   => run_ask(&session, args),
            Commands::Chat(args)  => run_chat(&session, args),
        }
    }
}

/// Handles the `index` subcommand.
fn run_index(session: &Session, args: IndexArgs) -> Result<()> {
    let summary = load(session, &args.file)?;
    print_summary(&summary);

    let cfg = session.config();
    println!(
        "  Chunking: {} words, {} overlap, {}",
        cfg.chunking.chunk_size,
        cfg.chunking.overlap,
        if cfg.chunking.respect_pages { "per page" } else { "across pages" }
    );
    if let Some(doc) = session.document() {
        println!("  Embedding: {} ({} dims)", cfg.embedding.model, doc.pack.dimensions());
    }

    if args.show_chunks {
        if let Some(doc) = session.document() {
            for (i, chunk) in doc.pack.chunks().iter().enumerate() {
                println!("\n--- chunk {} ---\n{}", i + 1, chunk);
            }
        }
    }
    Ok(())
}

/// Handles the `ask` subcommand.
fn run_ask(session: &Session, args: AskArgs) -> Result<()> {
    load(session, &args.file)?;

    let answer = match (&args.question, &args.audio) {
        (Some(question), _) => session.ask(question)?,
        (None, Some(audio)) => match ask_voice(session, audio)? {
            Some(answer) => answer,
            None         => return Ok(()),
        },
        // clap's ArgGroup requires one of the two
        (None, None) => anyhow::bail!("either --question or --audio is required"),
    };

    println!("\nAnswer: {}", answer.text);
    if args.speak {
        speak(session, &answer);
    }
    Ok(())
}

/// Handles the `chat` subcommand.
fn run_chat(session: &Session, args: ChatArgs) -> Result<()> {
    print_summary(&load(session, &args.file)?);
    println!("\nType a question, or /voice <wav>, /load <path>, /history, /clear, /quit.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\n> ");
        io::stdout().flush().context("Cannot write to stdout")?;

        let Some(line) = lines.next() else { break };
        let line = line.context("Cannot read from stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None         => (line, ""),
        };

        // Per-line failures are reported and the session goes on
        let outcome = match command {
            "/quit" | "/exit" => break,
            "/history" => {
                print_history(session);
                Ok(())
            }
            "/clear" => {
                session.clear_history();
                println!("Chat history cleared.");
                Ok(())
            }
            "/load" if !rest.is_empty() => load(session, Path::new(rest)).map(|s| print_summary(&s)),
            "/voice" if !rest.is_empty() => ask_voice(session, Path::new(rest)).map(|answer| {
                if let Some(answer) = answer {
                    print_answer(session, &answer, args.speak);
                }
            }),
            "/load" | "/voice" => {
                println!("Usage: {command} <path>");
                Ok(())
            }
            _ => session.ask(line).map(|answer| print_answer(session, &answer, args.speak)),
        };

        if let Err(e) = outcome {
            eprintln!("Error: {e:#}");
        }
    }
    Ok(())
}

fn load(session: &Session, path: &Path) -> Result<IndexSummary> {
    let doc = load_path(path)?;
    session.load_document(doc).map_err(|e| {
        if matches!(e.root_cause().downcast_ref::<RagError>(), Some(RagError::EmptyDocument)) {
            e.context("Could not extract any text from this document. Try another file.")
        } else {
            e
        }
    })
}

/// Transcribe and answer; `None` when the clip held no speech.
fn ask_voice(session: &Session, audio: &Path) -> Result<Option<Answer>> {
    let bytes = fs::read(audio)
        .with_context(|| format!("Cannot read audio '{}'", audio.display()))?;
    match session.ask_voice(&bytes)? {
        VoiceOutcome::NoSpeech => {
            println!("Transcription produced no text. Try speaking louder or closer to the microphone.");
            Ok(None)
        }
        VoiceOutcome::Answered { transcript, answer } => {
            println!("You asked (voice): {transcript}");
            Ok(Some(answer))
        }
    }
}

fn speak(session: &Session, answer: &Answer) {
    if let Some(path) = session.speak(&answer.text) {
        println!("Audio: {}", path.display());
    }
}

fn print_answer(session: &Session, answer: &Answer, speak_it: bool) {
    println!("\nAssistant: {}", answer.text);
    if speak_it {
        speak(session, answer);
    }
}

fn print_summary(summary: &IndexSummary) {
    println!("Loaded '{}'", summary.source);
    if let Some(meta) = &summary.metadata {
        for (label, value) in meta.entries() {
            println!("  {label}: {value}");
        }
    } else {
        println!("  Page count: {}", summary.pages);
    }
    println!("  Chunks: {}", summary.chunks);
}

fn print_history(session: &Session) {
    let history = session.history();
    if history.is_empty() {
        println!("No questions yet.");
        return;
    }
    for turn in history {
        let via = match turn.source {
            QuestionSource::Text  => "",
            QuestionSource::Voice => " (voice)",
        };
        println!("You{via}: {}", turn.question);
        println!("Assistant: {}", turn.answer);
    }
}
