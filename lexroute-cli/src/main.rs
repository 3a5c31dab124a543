// lexroute-cli/src/main.rs
mod models;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::*;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};
use uuid::Uuid;

use lexroute_core::{
    FulfillmentRouter, IntentEvent, IntentRoute, LexEvent, LiteLlmClient, RouterConfig,
    TurnAction, FALLBACK_INTENT,
};

use crate::models::cli::{Cli, Commands};

const CONFIG_FILENAME: &str = "Lexroute.toml";

/// Walks up from `start` looking for [`CONFIG_FILENAME`].
fn find_config_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .find(|candidate| candidate.is_file())
}

fn load_config(explicit: Option<&Path>) -> Result<RouterConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = env::current_dir().context("Failed to get current directory")?;
            find_config_file(&cwd)
        }
    };
    match &path {
        Some(path) => info!("Using configuration file at: {:?}", path),
        None => info!(
            "No {} found; using environment variables only.",
            CONFIG_FILENAME
        ),
    }
    RouterConfig::load(path.as_deref()).context("Failed to load or validate configuration")
}

fn build_router(config: RouterConfig) -> Result<FulfillmentRouter> {
    let client = LiteLlmClient::new(&config.proxy).context("Failed to create proxy client")?;
    debug!(url = client.url(), "Proxy client ready.");
    Ok(FulfillmentRouter::new(config.responses, Arc::new(client)))
}

fn read_event(source: &Path) -> Result<LexEvent> {
    let content = if source == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read event from stdin")?;
        buffer
    } else {
        fs::read_to_string(source)
            .with_context(|| format!("Failed to read event file: {:?}", source))?
    };
    parse_event(&content)
}

fn parse_event(content: &str) -> Result<LexEvent> {
    serde_json::from_str(content).context("Event is not a valid Lex V2 fulfillment event")
}

fn action_label(action: TurnAction) -> ColoredString {
    match action {
        TurnAction::Fulfilled => "Fulfilled".green().bold(),
        TurnAction::Closed => "Closed".yellow().bold(),
        TurnAction::Delegate => "Delegate".cyan().bold(),
    }
}

async fn run_invoke(config: RouterConfig, event_path: &Path) -> Result<()> {
    let event = read_event(event_path)?;
    let router = build_router(config)?;
    let reply = router.handle_lex(event).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&reply).context("Failed to serialize Lex reply")?
    );
    Ok(())
}

/// Synthesises the turn for `ask`. An explicit intent may be sent without an
/// utterance, which is how canned replies are exercised.
fn ask_event(
    intent: Option<String>,
    session: Option<String>,
    utterance: &[String],
) -> Result<IntentEvent> {
    if intent.is_none() && utterance.is_empty() {
        return Err(anyhow!(
            "Nothing to ask: pass an utterance after the options, or an --intent"
        ));
    }
    let intent = intent.unwrap_or_else(|| FALLBACK_INTENT.to_string());
    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());
    Ok(IntentEvent::new(intent, session_id, utterance.join(" ")))
}

async fn run_ask(config: RouterConfig, event: IntentEvent) -> Result<()> {
    let router = build_router(config)?;

    let outcome = router.handle(&event).await;
    println!(
        "{} {} {}",
        "[".dimmed(),
        action_label(outcome.action),
        "]".dimmed()
    );
    println!("{}", outcome.message);
    Ok(())
}

fn run_check(config: &RouterConfig) {
    let proxy = &config.proxy;
    println!("{}", "Configuration OK".green().bold());
    println!("{}: {}", "Endpoint".cyan(), proxy.completions_url());
    println!(
        "{}: {}",
        "Model".cyan(),
        proxy.model.as_deref().unwrap_or("<proxy default>")
    );
    println!("{}: {:?}", "Timeout".cyan(), proxy.timeout);
    println!(
        "{}: {}",
        "API key".cyan(),
        if proxy.api_key.is_some() { "set" } else { "none (anonymous)" }
    );
    println!(
        "{}: {}",
        "System prompt".cyan(),
        config
            .responses
            .system_prompt
            .as_deref()
            .unwrap_or("<none>")
    );

    let mut intents: Vec<_> = config.responses.intents.iter().collect();
    intents.sort_by(|a, b| a.0.cmp(b.0));
    println!("{}", "Intents:".cyan());
    if intents.is_empty() {
        println!("  {}", "(none; every intent is forwarded)".dimmed());
    }
    for (name, route) in intents {
        match route {
            IntentRoute::Canned(canned) => println!(
                "  {} -> {} {}",
                name.bold(),
                action_label(canned.action),
                canned.message.dimmed()
            ),
            IntentRoute::Forward => println!("  {} -> {}", name.bold(), "forward".magenta()),
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Invoke { event } => run_invoke(config, &event).await,
        Commands::Ask {
            intent,
            session,
            utterance,
        } => {
            let event = ask_event(intent, session, &utterance)?;
            run_ask(config, event).await
        }
        Commands::Check => {
            run_check(&config);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Logging Setup ---
    let default_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let stderr_layer = match time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) {
        Ok(desc) => fmt::layer()
            .with_writer(io::stderr)
            .with_timer(LocalTime::new(desc))
            .with_target(false)
            .boxed(),
        Err(e) => {
            eprintln!("Warning: Failed to parse time format, using default: {}", e);
            fmt::layer().with_writer(io::stderr).with_target(false).boxed()
        }
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
    {
        eprintln!("{} Failed to initialize logging: {}", "Error:".red(), e);
        return ExitCode::FAILURE;
    }
    // --- End Logging Setup ---

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:?}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}
