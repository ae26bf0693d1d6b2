use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use visionpilot::agent_engine::{SessionHistory, VisionActionAgent};
use visionpilot::config::load_or_default;
use visionpilot::executor::ChromeDriver;
use visionpilot::llm::registry::ProviderRegistry;
use visionpilot::PilotResult;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Provider id from config.toml, overriding `llm.active_provider`
    #[arg(long, global = true)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the browser toward a natural-language goal
    Run {
        task: String,
        /// Page to open before the first step
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        max_steps: Option<u32>,
    },
    /// Find a business phone number through web search
    Lookup { query: String },
    /// Open and capture the top search results for a topic
    Research {
        query: String,
        #[arg(long, default_value_t = 3)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    visionpilot::init_tracing();

    let cli = Cli::parse();
    match run(cli.command, cli.provider).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "visionpilot failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, provider: Option<String>) -> PilotResult<()> {
    let mut config = load_or_default();
    if let Command::Run {
        max_steps: Some(n), ..
    } = &command
    {
        config.agent.max_steps = *n;
    }

    let mut registry = ProviderRegistry::from_config(&config)?;
    if let Some(id) = provider {
        registry.set_active(id)?;
    }
    let vision = registry.get_active()?;
    let driver = Arc::new(ChromeDriver::launch(config.browser.clone()).await?);
    let history = SessionHistory::new()?;
    tracing::info!(path = %history.path().display(), "session history");

    let agent = VisionActionAgent::new(vision, driver, config.agent, config.planner)?
        .with_history(history);

    match command {
        Command::Run { task, url, .. } => {
            let outcome = agent.execute_task(&task, url.as_deref()).await?;
            print_json(&outcome)
        }
        Command::Lookup { query } => print_json(&agent.lookup_phone_number(&query).await),
        Command::Research { query, count } => {
            print_json(&agent.research_topic(&query, count).await)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> PilotResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
