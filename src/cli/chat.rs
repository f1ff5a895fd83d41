use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use futures_util::StreamExt;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::ai::chat::{ChatContext, MODELS};
use crate::core::AppConfig;
use crate::openai::{CompletionBackend, OpenAiClient};

#[derive(Debug, PartialEq)]
enum Input {
    Message(String),
    Reset,
    Model(Option<String>),
    System(String),
    Models,
    History,
    Help,
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "reset" => Input::Reset,
        "model" if arg.is_empty() => Input::Model(None),
        "model" => Input::Model(Some(arg.to_string())),
        "system" if !arg.is_empty() => Input::System(arg.to_string()),
        "models" => Input::Models,
        "history" => Input::History,
        "help" => Input::Help,
        // Anything else is sent as is
        _ => Input::Message(line.to_string()),
    }
}

const HELP: &str = "Commands:
  /reset            Clear the conversation
  /model [id]       Show or switch the model
  /system <text>    Replace the system message
  /models           List available models
  /history          Show the conversation
  /help             Show this message";

/// Send a message and print the response as it streams in.
async fn submit(ctx: &mut ChatContext, text: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    let mut printed = 0;
    let mut turn = std::pin::pin!(ctx.submit(text));

    while let Some(partial) = turn.next().await {
        let partial = partial?;
        // Each item is the whole response so far so only print what's new
        write!(stdout, "{}", &partial[printed..])?;
        stdout.flush()?;
        printed = partial.len();
    }
    writeln!(stdout)?;

    Ok(())
}

pub async fn run(model: Option<String>, system: Option<String>) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::default().with_overrides(model, system);
    let backend: Arc<dyn CompletionBackend> =
        Arc::new(OpenAiClient::new(&config.api_hostname, &config.api_key)?);
    let mut ctx = ChatContext::new(backend, &config.model, &config.system_message)?;

    let mut rl = DefaultEditor::new()?;
    println!(
        "👋 Welcome! Chatting with {}. Type /help for commands.",
        ctx.chatbot().model()
    );

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match parse_input(&line) {
                    Input::Empty => {}
                    Input::Message(text) => {
                        if let Err(e) = submit(&mut ctx, &text).await {
                            eprintln!("\nError: {}", e);
                        }
                    }
                    Input::Reset => {
                        ctx.reset();
                        println!("Conversation reset successfully!");
                    }
                    Input::Model(None) => println!("{}", ctx.chatbot().model()),
                    Input::Model(Some(model)) => {
                        let system_message = ctx.chatbot().system_message().to_string();
                        match ctx.apply_settings(&model, &system_message) {
                            Ok(()) => println!("Settings applied successfully!"),
                            Err(e) => eprintln!("Error: {}", e),
                        }
                    }
                    Input::System(system_message) => {
                        let model = ctx.chatbot().model().to_string();
                        match ctx.apply_settings(&model, &system_message) {
                            Ok(()) => println!("Settings applied successfully!"),
                            Err(e) => eprintln!("Error: {}", e),
                        }
                    }
                    Input::Models => {
                        for m in MODELS {
                            println!("{}", m);
                        }
                    }
                    Input::History => {
                        for m in ctx.conversation() {
                            println!("{:?}: {}", m.role, m.content);
                        }
                    }
                    Input::Help => println!("{}", HELP),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
