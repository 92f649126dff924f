// src/main.rs

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use promptsmith::config::storage::{FileSettingsStore, SettingsStore};
use promptsmith::config::{Language, Settings};
use promptsmith::editor::EditorEngine;
use promptsmith::export;
use promptsmith::interview::InterviewSession;
use promptsmith::llm::PromptServices;

#[derive(Parser)]
#[command(name = "promptsmith", about = "Guided prompt-engineering assistant")]
struct Cli {
    /// Interview language: english, spanish, german or french
    #[arg(long, default_value = "english")]
    language: String,

    /// API key override (otherwise the saved settings apply)
    #[arg(long, env = "PROMPTSMITH_API_KEY")]
    api_key: Option<String>,

    /// Run a critique scan on the finished draft
    #[arg(long)]
    scan: bool,
}

fn parse_language(raw: &str) -> anyhow::Result<Language> {
    match raw.to_lowercase().as_str() {
        "english" | "en" => Ok(Language::English),
        "spanish" | "es" => Ok(Language::Spanish),
        "german" | "de" => Ok(Language::German),
        "french" | "fr" => Ok(Language::French),
        other => anyhow::bail!("unknown language '{other}'"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let language = parse_language(&cli.language)?;

    let store = FileSettingsStore::default_location().context("locating settings store")?;
    let mut settings = store
        .load()
        .context("loading settings")?
        .unwrap_or_else(Settings::default);
    if let Some(key) = cli.api_key {
        settings.default_api_key = Some(key);
    }

    let services = Arc::new(PromptServices::new(settings));
    let mut session = InterviewSession::new(services.clone());
    session.start(language)?;

    info!("interview started ({})", language.name());
    println!("Describe the prompt you want to build. Type /done to finish early.\n");

    let stdin = io::stdin();
    let mut draft = None;

    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let answer = line.trim();
        if answer.is_empty() {
            continue;
        }
        if answer == "/done" {
            draft = Some(session.finalize().await?);
            break;
        }

        let reply = session.send_turn(answer).await?;
        if reply.is_final_draft {
            draft = Some(reply.generated_prompt.unwrap_or(reply.question));
            break;
        }

        println!("\n{}", reply.question);
        for (i, option) in reply.options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }
        print!("> ");
        io::stdout().flush()?;
    }

    let Some(draft) = draft else {
        info!("interview ended without a draft");
        return Ok(());
    };

    println!("\n{}", export::to_markdown(&draft, ""));

    if cli.scan {
        let mut engine = EditorEngine::new(services, draft, "");
        let count = engine.deep_scan().await?;
        info!("critique scan stored {count} suggestions");
        for suggestion in engine.suggestions() {
            println!("- [{}] \"{}\" -> \"{}\" ({})",
                suggestion.category,
                suggestion.original_text,
                suggestion.suggested_text,
                suggestion.reason,
            );
        }
    }

    Ok(())
}
