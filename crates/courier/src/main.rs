//! Send a prompt to one provider through the relay and print the answer.
//!
//! Configuration comes from `COURIER_BASE_URL`, `COURIER_PROVIDER` and
//! `COURIER_API_KEY` (or the provider's own key variable); flags override it.
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
//!
//! # Examples
//!
//! ```sh
//! # Buffered request to the default provider
//! courier --user "Summarize this statement"
//!
//! # Stream from Gemini with a thinking budget
//! courier --provider gemini --thinking-budget 2048 --stream \
//!   --user "Explain the borrow checker"
//!
//! # Pipe content from stdin, print token usage afterwards
//! cat notes.md | courier --system "Extract action items." --stdin --usage
//! ```

use clap::Parser;
use courier::api::usage::pricing_for_model;
use courier::config::ClientConfig;
use courier::normalize::resolve_model;
use courier::{CallOptions, CourierClient, Message, ReasoningEffort, Verbosity};
use std::io::{self, Read, Write};
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Send a prompt to an LLM provider through the relay and print the answer.
#[derive(Parser)]
#[command(name = "courier", version)]
struct Cli {
    // ── Message content ────────────────────────────────────────
    /// System prompt to set the assistant's behavior
    #[arg(long)]
    system: Option<String>,

    /// User message to send
    #[arg(long)]
    user: Option<String>,

    /// Read user content from stdin
    #[arg(long)]
    stdin: bool,

    // ── Provider / model ───────────────────────────────────────
    /// Provider: anthropic, openai, gemini or grok (aliases accepted)
    #[arg(long)]
    provider: Option<String>,

    /// Model identifier (defaults to the provider's default model)
    #[arg(long)]
    model: Option<String>,

    /// Relay base URL
    #[arg(long)]
    base_url: Option<String>,

    // ── Output control ─────────────────────────────────────────
    /// Maximum tokens in the response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Extended-thinking token budget
    #[arg(long)]
    thinking_budget: Option<u32>,

    /// Reasoning effort: none, minimal, low, medium, high, xhigh
    #[arg(long)]
    reasoning: Option<ReasoningEffort>,

    /// Turn extended thinking off where the model allows it
    #[arg(long)]
    no_thinking: bool,

    /// Output verbosity: low, medium, high
    #[arg(long)]
    verbosity: Option<Verbosity>,

    // ── Mode ───────────────────────────────────────────────────
    /// Stream the answer as it is generated
    #[arg(long)]
    stream: bool,

    /// Print token usage and estimated cost to stderr afterwards
    #[arg(long)]
    usage: bool,
}

/// Read all of stdin into a string.
fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn build_user_content(cli: &Cli) -> Result<String, String> {
    let stdin_text = if cli.stdin {
        Some(read_stdin_content()?)
    } else {
        None
    };

    match (&cli.user, stdin_text) {
        (Some(msg), Some(piped)) => Ok(format!("{msg}\n\n{piped}")),
        (Some(msg), None) => Ok(msg.clone()),
        (None, Some(piped)) => Ok(piped),
        (None, None) => Err("provide --user, --stdin, or both".to_string()),
    }
}

fn build_options(cli: &Cli) -> CallOptions {
    let mut options = CallOptions::default();
    if let Some(system) = &cli.system {
        options = options.with_system_prompt(system);
    }
    if let Some(model) = &cli.model {
        options = options.with_model(model);
    }
    if let Some(max_tokens) = cli.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }
    if let Some(budget) = cli.thinking_budget {
        options = options.with_thinking_budget(budget);
    }
    if let Some(level) = cli.reasoning {
        options = options.with_reasoning_level(level);
    }
    if let Some(verbosity) = cli.verbosity {
        options = options.with_verbosity(verbosity);
    }
    if cli.no_thinking {
        options = options.with_thinking_disabled();
    }
    options
}

async fn send_request(cli: &Cli, cancel: &CancellationToken) -> Result<(), String> {
    let mut config = ClientConfig::from_env();
    if let Some(provider) = &cli.provider {
        config = config.with_provider(provider);
    }
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }

    let client = CourierClient::new(config).map_err(|e| e.to_string())?;
    if client.fell_back() {
        eprintln!("  Unknown provider; using {}", client.provider());
    }

    let messages = vec![Message::user(build_user_content(cli)?)];
    let options = build_options(cli);
    debug!("Sending to {} (stream={})", client.provider(), cli.stream);

    if cli.stream {
        let mut stdout = io::stdout();
        let mut printed = 0;
        client
            .call_streaming_with_cancel(&messages, &options, cancel, |so_far| {
                // Each callback carries the whole text so far; print only
                // what is new.
                let delta = so_far.get(printed..).unwrap_or_default();
                let _ = stdout.write_all(delta.as_bytes());
                let _ = stdout.flush();
                printed = so_far.len();
            })
            .await
            .map_err(|e| e.to_string())?;
        println!();
    } else {
        let text = client
            .call_with_cancel(&messages, &options, cancel)
            .await
            .map_err(|e| e.to_string())?;
        println!("{text}");
    }

    if cli.usage {
        let model = resolve_model(client.provider(), &options);
        let cost = pricing_for_model(&model).estimate_cost(&client.usage().read());
        eprintln!("  {}", client.usage().summary());
        eprintln!("  estimated cost: ${cost:.4} ({model})");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    if let Err(e) = send_request(&cli, &cancel).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
