//! Tabletalk CLI Entry Point
//!
//! Three subcommands:
//! - `ask` - answer a single question and print the answer
//! - `repl` - interactive conversation loop with write confirmation
//! - `serve` - stdio JSON-RPC server mode (for editor/agent integration)
//!
//! Answers go to stdout. Logs go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tabletalk::config::Config;
use tabletalk::engine::DataSource;
use tabletalk::model::GeminiModel;
use tabletalk::{Agent, ResponseEnvelope};

/// Tabletalk - Conversational NL→SQL agent
#[derive(Parser)]
#[command(name = "tabletalk")]
#[command(about = "Ask natural-language questions about a SQLite or MySQL database")]
#[command(version)]
struct Cli {
    /// Path to the config file (default: ~/.config/tabletalk/config.json,
    /// falling back to environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The natural-language question
        question: String,
    },

    /// Interactive conversation loop
    Repl,

    /// Stdio JSON-RPC server mode (for editor/agent integration)
    #[command(hide = true)]
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs to stderr; stdout carries only answers
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let model = config.build_model()?;
    let source = config.build_data_source()?;
    let mut agent = Agent::with_options(model, source, config.agent_options());

    match cli.command {
        Commands::Ask { question } => {
            let envelope = agent.ask(&question).await;
            println!("{}", envelope.answer_text()?);
        }
        Commands::Repl => run_repl(&mut agent).await?,
        Commands::Serve => tabletalk::rpc::serve(&mut agent).await?,
    }

    agent.close();
    Ok(())
}

/// Interactive read-eval loop
///
/// Commands: `context` prints the agent summary, `clear` resets the
/// conversation, `exit` leaves. Everything else is a question. Confirm
/// envelopes prompt before the statement is executed.
async fn run_repl(agent: &mut Agent<GeminiModel, DataSource>) -> Result<()> {
    println!("tabletalk - ask about your data (type 'exit' to quit)");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        write!(stdout, "you> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" => break,
            "context" => {
                println!("{}", serde_json::to_string_pretty(&agent.context_summary())?);
                continue;
            }
            "clear" => {
                agent.clear_context();
                println!("Context cleared.");
                continue;
            }
            question => {
                let envelope = agent.ask(question).await;
                match &envelope {
                    ResponseEnvelope::Confirm { message, sql_query, .. } => {
                        println!("{message}");
                        println!("\n  {sql_query}\n");
                        confirm_and_execute(agent, sql_query).await?;
                    }
                    other => println!("{}", other.answer_text()?),
                }
            }
        }
    }

    Ok(())
}

/// Two-step write protocol at the terminal
async fn confirm_and_execute(
    agent: &Agent<GeminiModel, DataSource>,
    sql: &str,
) -> Result<()> {
    let confirmed = dialoguer::Confirm::new()
        .with_prompt("Execute this statement?")
        .default(false)
        .interact()?;

    if confirmed {
        let ack = agent.execute_write(sql).await;
        if ack.success {
            println!("Done: {}", ack.message);
        } else {
            println!("Failed: {}", ack.message);
        }
    } else {
        println!("Statement discarded.");
    }

    Ok(())
}
