// chatline: send one prompt to a chat provider and stream the reply.
//
// Usage:
//   chatline "How do I stay focused?"
//   chatline --provider anthropic --model claude-3-haiku-20240307 "Hi"
//   echo "Hello" | chatline --provider offline
//   chatline --list-models --provider openai
//
// Ctrl-C stops the generation and keeps whatever text has arrived.

use anyhow::{Context, Result};
use chatline::config::{self, ChatlineConfig};
use chatline::llm::{
    make, make_with_config, ChatProvider, ProviderSelector, ANTHROPIC_MODELS, OFFLINE_MODELS,
    OPENAI_MODELS,
};
use chatline::logging::{self, LogLevel, LoggingConfig};
use chatline::messages::ChatMessage;
use chatline::session::{ChatSession, SessionUpdate, StreamingOutcome};
use clap::Parser;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "chatline",
    version,
    about = "Stream a chat reply from OpenAI, Anthropic, or the offline bot."
)]
struct Cli {
    /// Prompt to send. Read from stdin when omitted.
    prompt: Vec<String>,

    /// Provider to use: openai, anthropic, or offline.
    #[arg(long, short, env = "CHATLINE_PROVIDER")]
    provider: Option<ProviderSelector>,

    /// Model identifier (default: from config, then the provider default).
    #[arg(long, short)]
    model: Option<String>,

    /// System prompt (overrides the config file).
    #[arg(long)]
    system: Option<String>,

    /// Configuration file (default: ./chatline.toml, then the XDG config dir).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Minimum "thinking" time before the request goes out, in milliseconds.
    #[arg(long, value_name = "MS")]
    thinking_delay: Option<u64>,

    /// Use a single buffered request instead of streaming.
    #[arg(long)]
    no_stream: bool,

    /// Print the provider's model list and exit.
    #[arg(long)]
    list_models: bool,

    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    /// Also log to stderr.
    #[arg(long, short)]
    verbose: bool,

    /// Do not write a log file.
    #[arg(long)]
    no_log_file: bool,
}

fn models_for(selector: ProviderSelector) -> &'static [&'static str] {
    match selector {
        ProviderSelector::OpenAI => OPENAI_MODELS,
        ProviderSelector::Anthropic => ANTHROPIC_MODELS,
        ProviderSelector::Offline => OFFLINE_MODELS,
    }
}

fn read_prompt(cli: &Cli) -> Result<String> {
    if !cli.prompt.is_empty() {
        return Ok(cli.prompt.join(" "));
    }
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read prompt from stdin")?;
    Ok(input)
}

fn load_config(cli: &Cli) -> Result<ChatlineConfig> {
    let config = match cli.config {
        Some(ref path) => config::from_path(path)?,
        None => config::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging_config = LoggingConfig::new()
        .with_level(cli.log_level)
        .with_console(cli.verbose);
    logging_config.enabled = !cli.no_log_file;
    logging::init_and_store_logging(&logging_config).context("failed to initialize logging")?;

    let config = load_config(&cli)?;
    let selector = cli.provider.unwrap_or_else(|| config.effective_default());

    if cli.list_models {
        for model in models_for(selector) {
            println!("{model}");
        }
        return Ok(());
    }

    let mut params = config.generation_parameters(selector);
    if let Some(ref model) = cli.model {
        params.model.clone_from(model);
    }
    if let Some(ref system) = cli.system {
        params.system_prompt = Some(system.clone());
    }

    let credentials = config.credentials();
    let provider = match config.provider_config(selector) {
        Some(endpoint) => make_with_config(selector, &credentials, endpoint)?,
        None => make(selector, &credentials)?,
    };

    let messages = vec![ChatMessage::user(read_prompt(&cli)?)];

    if cli.no_stream {
        let text = provider.complete(&messages, &params).await?;
        println!("{text}");
        return Ok(());
    }

    let mut session_config = config.session_config();
    if let Some(ms) = cli.thinking_delay {
        session_config.thinking_delay = Duration::from_millis(ms);
    }

    let mut session = ChatSession::new(provider, session_config);
    let mut generation = session.submit(messages, params).await?;

    let mut stdout = std::io::stdout();
    let mut printed = false;
    let mut stopping = false;
    loop {
        tokio::select! {
            update = generation.next_update() => match update {
                Some(SessionUpdate::Text { delta, .. }) => {
                    printed = true;
                    write!(stdout, "{delta}")?;
                    stdout.flush()?;
                }
                Some(SessionUpdate::State(state)) => {
                    tracing::debug!(state = %state, "Session update");
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !stopping => {
                signal.context("failed to listen for Ctrl-C")?;
                stopping = true;
                session.stop();
            }
        }
    }

    let outcome = generation.outcome().await;
    if !printed {
        write!(stdout, "{}", outcome.display_text())?;
    }
    writeln!(stdout)?;

    match outcome {
        StreamingOutcome::Completed(_) => Ok(()),
        StreamingOutcome::Cancelled(_) => {
            eprintln!("[stopped]");
            Ok(())
        }
        StreamingOutcome::Failed { error, .. } => Err(error.into()),
    }
}
