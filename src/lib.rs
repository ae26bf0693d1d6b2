pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;
pub mod planner;
pub mod playbook;

#[cfg(test)]
mod testing;

pub use agent_engine::VisionActionAgent;
pub use errors::{PilotError, PilotResult};

/// Installs the fmt subscriber. `RUST_LOG` wins; otherwise everything at `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
