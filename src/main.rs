//! Wikichat CLI - ask a wiki-hosted LLM from the terminal.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wikichat::config::UiSetting;
use wikichat::{
    CancellationToken, ChatClient, ChatError, ChatMessage, ClientConfig, CompletionOutcome,
    CompletionRequest, ConfigLoader, StreamAccumulator, Usage,
};

/// Wikichat CLI - chat completions from a wiki-hosted LLM service
#[derive(Parser, Debug)]
#[command(name = "wikichat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file to load instead of the default locations
    #[arg(short, long, env = "WIKICHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Server root, e.g. https://wiki.example.com/xwiki
    #[arg(long)]
    base_url: Option<String>,

    /// Wiki serving the completion API
    #[arg(long)]
    wiki: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message and print the reply
    Ask {
        /// The user message
        message: String,

        /// Model identifier (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,

        /// System prompt
        #[arg(short, long, conflicts_with = "prompt")]
        system: Option<String>,

        /// Name of a stored prompt template to use as the system prompt
        #[arg(short, long)]
        prompt: Option<String>,

        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,

        /// Show token usage after the reply
        #[arg(long)]
        usage: bool,
    },

    /// List the available models
    Models,

    /// List the stored prompt templates
    Prompts,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("wikichat=debug")
        } else {
            EnvFilter::new("wikichat=warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

fn build_client(args: &Args) -> anyhow::Result<ChatClient> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::new()?,
    };

    let mut config = loader.into_config()?;
    if let Some(base_url) = &args.base_url {
        ensure_allowed(&config, UiSetting::ServerAddress, "--base-url")?;
        config.base_url = base_url.clone();
        config.api_base_env = None;
    }
    if let Some(wiki) = &args.wiki {
        config.wiki_name = wiki.clone();
    }

    Ok(ChatClient::from_config(config)?)
}

/// Reject an override the configured `chat_ui_settings` does not expose
fn ensure_allowed(
    config: &ClientConfig,
    setting: UiSetting,
    flag: &str,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        config.allows(setting),
        "{flag} is disabled by the chat_ui_settings configuration"
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn ask(
    client: &ChatClient,
    message: String,
    model: Option<String>,
    temperature: Option<f64>,
    system: Option<String>,
    prompt: Option<String>,
    no_stream: bool,
    show_usage: bool,
) -> anyhow::Result<()> {
    let config = client.config();
    if model.is_some() {
        ensure_allowed(config, UiSetting::Model, "--model")?;
    }
    if temperature.is_some() {
        ensure_allowed(config, UiSetting::Temperature, "--temperature")?;
    }
    if no_stream {
        ensure_allowed(config, UiSetting::Stream, "--no-stream")?;
    }

    let mut system = system;
    let mut temperature = temperature;

    if let Some(name) = prompt {
        let template = client
            .prompts()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .with_context(|| format!("no prompt template named '{name}'"))?;
        system = template.prompt;
        temperature = temperature.or(template.temperature);
    }

    let mut messages = Vec::new();
    if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(message));

    let mut request = match model {
        Some(model) => {
            CompletionRequest::create(model, config.temperature, messages, true)?
        }
        None => client.new_request(messages)?,
    };
    request.set_stream(!no_stream);
    if let Some(temperature) = temperature {
        request.set_temperature(temperature)?;
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let mut acc = StreamAccumulator::new();
    let mut stdout = io::stdout();
    let result = client
        .complete(
            &request,
            |event| {
                acc.process(&event);
                if let Some(text) = event.content() {
                    print!("{text}");
                    stdout.flush().ok();
                }
            },
            &cancel,
        )
        .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(ChatError::Aborted) => {
            println!();
            eprintln!("(cancelled)");
            return Ok(());
        }
        Err(e) => {
            if !acc.content.is_empty() {
                println!();
            }
            return Err(e.into());
        }
    };

    match &outcome {
        CompletionOutcome::Complete(response) => {
            println!("{}", response.content().unwrap_or_default());
        }
        CompletionOutcome::Streamed(_) => {
            println!();
            for error in &acc.errors {
                eprintln!("server error: {}", error.message);
            }
        }
    }

    if show_usage {
        print_usage(outcome.usage());
    }

    Ok(())
}

fn print_usage(usage: Option<Usage>) {
    match usage {
        Some(usage) => println!(
            "[tokens: {} prompt + {} completion = {} total]",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        ),
        None => println!("[no usage reported]"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.verbose);

    let client = build_client(&args)?;

    match args.command {
        Command::Ask {
            message,
            model,
            temperature,
            system,
            prompt,
            no_stream,
            usage,
        } => {
            ask(
                &client,
                message,
                model,
                temperature,
                system,
                prompt,
                no_stream,
                usage,
            )
            .await?;
        }
        Command::Models => {
            for model in client.models().await? {
                let streaming = if model.can_stream { "streaming" } else { "" };
                println!(
                    "{:<40} {:<30} {:>8} {}",
                    model.id, model.name, model.context_length, streaming
                );
            }
        }
        Command::Prompts => {
            for prompt in client.prompts().await? {
                let marker = if prompt.is_default.unwrap_or(false) { "*" } else { " " };
                let state = if prompt.is_active() { "" } else { " (inactive)" };
                println!(
                    "{marker} {}{state}  {}",
                    prompt.name,
                    prompt.description.as_deref().unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
