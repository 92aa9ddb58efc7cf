use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use trip_core::{
    ItineraryCombination, PlanOutcome, RatingRange, TripRequest, DEFAULT_MAX_OPTIONS,
};
use trip_observability::{init_tracing, AppMetrics};
use trip_service::{
    open_store, PlannerConfig, TripPlannerService, DEFAULT_DATASET_PATH, DEFAULT_MODEL_PATH,
};
use trip_storage::Store;

#[derive(Debug, Parser)]
#[command(name = "tripplan")]
#[command(about = "Trip budget prediction and itinerary combinations")]
struct Cli {
    #[arg(long, env = "TRIP_DATASET_PATH", default_value = DEFAULT_DATASET_PATH)]
    dataset: PathBuf,

    #[arg(long, env = "TRIP_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,

    #[arg(long, env = "TRIP_MAX_OPTIONS", default_value_t = DEFAULT_MAX_OPTIONS)]
    max_options: usize,

    #[arg(long, env = "TRIP_DATABASE_URL")]
    database_url: Option<String>,

    /// Repeats the same draws on every run.
    #[arg(long, env = "TRIP_SEED")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate priced itinerary combinations.
    Predict {
        #[arg(long = "location", required = true)]
        locations: Vec<String>,
        #[arg(long)]
        package: String,
        #[arg(long)]
        days: u32,
        #[arg(long, default_value = "0-5")]
        rating: RatingRange,
        #[arg(long)]
        companion: String,
        /// Include per-location resolutions and per-trial details.
        #[arg(long)]
        explain: bool,
    },
    /// Print catalog statistics.
    Catalog,
    /// List the most recent logged predictions.
    Predictions {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Manage confirmed plans.
    Plans {
        #[command(subcommand)]
        command: PlansCommand,
    },
}

#[derive(Debug, Subcommand)]
enum PlansCommand {
    /// List confirmed plans, newest first.
    List,
    /// Store a combination read from a JSON file, or stdin with `-`.
    Confirm {
        #[arg(long)]
        plan_number: u32,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a confirmed plan by id.
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("trip_cli");
    let cli = Cli::parse();
    ensure!(cli.max_options > 0, "--max-options must be at least 1");

    let config = PlannerConfig {
        dataset_path: cli.dataset,
        model_path: cli.model,
        max_options: cli.max_options,
        database_url: cli.database_url,
        seed: cli.seed,
    };
    let planner = build_planner(&config).await?;

    match cli.command {
        Command::Predict {
            locations,
            package,
            days,
            rating,
            companion,
            explain,
        } => {
            let report = planner
                .predict(TripRequest {
                    locations,
                    package,
                    total_days: days,
                    rating_range: rating,
                    travel_companion: companion,
                })
                .await?;

            let combinations = match report.outcome {
                PlanOutcome::Combinations(combinations) => combinations,
                PlanOutcome::Rejected(rejection) => bail!("{}", rejection),
            };

            let output = if explain {
                serde_json::json!({
                    "combinations": combinations,
                    "locations": report.locations,
                    "trials": report.trials,
                })
            } else {
                serde_json::json!({ "combinations": combinations })
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Catalog => {
            let output = serde_json::json!({
                "catalog": planner.catalog_stats(),
                "model": planner.model_name(),
                "fallback_model": planner.uses_fallback_model(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Predictions { limit } => {
            let predictions = planner.recent_predictions(limit).await?;
            println!("{}", serde_json::to_string_pretty(&predictions)?);
        }
        Command::Plans { command } => match command {
            PlansCommand::List => {
                let plans = planner.list_confirmed_plans().await?;
                println!("{}", serde_json::to_string_pretty(&plans)?);
            }
            PlansCommand::Confirm { plan_number, file } => {
                let full_plan = read_combination(&file)?;
                ensure!(
                    !full_plan.plan.is_empty(),
                    "plan in {} has no packages",
                    file.display()
                );
                let plan = planner.confirm_plan(plan_number, full_plan).await?;
                println!("{}", serde_json::to_string_pretty(&plan)?);
            }
            PlansCommand::Delete { id } => {
                if !planner.delete_confirmed_plan(&id).await? {
                    bail!("no confirmed plan with id {}", id);
                }
                println!("deleted {id}");
            }
        },
    }

    Ok(())
}

async fn build_planner(config: &PlannerConfig) -> Result<TripPlannerService<Store>> {
    let store = open_store(config).await?;
    TripPlannerService::bootstrap(config, Arc::new(store), AppMetrics::shared())
}

fn read_combination(file: &Path) -> Result<ItineraryCombination> {
    let raw = if file.as_os_str() == "-" {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("failed reading plan from stdin")?;
        raw
    } else {
        fs::read_to_string(file)
            .with_context(|| format!("failed reading plan from {}", file.display()))?
    };

    serde_json::from_str(&raw).context("plan is not a valid itinerary combination")
}
