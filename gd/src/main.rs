//! GoalDaemon entry point

use clap::Parser;
use eyre::{Context, Result};

use goaldaemon::cli::{Cli, Command};
use goaldaemon::config::Config;
use goaldaemon::daemon::Daemon;
use goaldaemon::domain::{Priority, Task};
use goaldaemon::interaction::Answer;
use goaldaemon::planning::{FilePatternLibrary, PatternLibrary, PlanningReply};
use planstore::Store;

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "goaldaemon=debug,planstore=debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_ref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            config.validate()?;
            let daemon = Daemon::new(config)?;
            daemon.run().await
        }

        Command::Plan { request } => {
            config.validate()?;
            let daemon = Daemon::new(config)?;
            let task = Task::new(&request, "cli", Priority::User);

            let reply = daemon
                .orchestrator()
                .handle_with_planning(&task, "request")
                .await
                .context("Planning failed")?;

            match reply {
                PlanningReply::NeedsApproval { plan_id, message, .. } => {
                    println!("{}", message);

                    let mut line = String::new();
                    std::io::stdin().read_line(&mut line).context("Failed to read answer")?;
                    daemon
                        .orchestrator()
                        .submit_approval_answer(&plan_id, Answer::from_text(line.trim()))
                        .await;

                    if let Some((_, result)) = daemon.orchestrator().await_approval(&plan_id).await {
                        println!("{}", result);
                    }
                }
                other => println!("{}", other.message()),
            }
            Ok(())
        }

        Command::Patterns => {
            let store = Store::open(&config.storage.data_dir).context("Failed to open data directory")?;
            let library = FilePatternLibrary::open(store)?;

            let mut patterns = library.all();
            patterns.sort_by(|a, b| {
                b.evaluation_score
                    .unwrap_or(0.0)
                    .partial_cmp(&a.evaluation_score.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            if patterns.is_empty() {
                println!("No patterns stored yet.");
            }
            for pattern in patterns {
                println!(
                    "{}  score={:.2}  goals={}  {}",
                    pattern.pattern_signature.as_deref().unwrap_or(&pattern.id),
                    pattern.evaluation_score.unwrap_or(0.0),
                    pattern.goals.len(),
                    pattern.description,
                );
            }
            Ok(())
        }
    }
}
