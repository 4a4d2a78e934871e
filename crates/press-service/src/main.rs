//! Command-line front end for the press production workflow.
//!
//! Each invocation loads the configuration, builds the workflow engine on the
//! configured storage backend, runs one operation and prints the result as
//! JSON on stdout. Logs go to stderr.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use press_config::Config;
use press_core::{NewOrder, ReviewSubmission, WorkflowBuilder, WorkflowEngine, WorkflowFactories};
use press_storage::implementations::file::create_storage as create_file_storage;
use press_storage::implementations::memory::create_storage as create_memory_storage;
use press_types::{Actor, IntakeDetails, Stage, Status};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Command-line arguments for the press tool.
#[derive(Parser, Debug)]
#[command(name = "press", author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Id of the operator recorded on every change
	#[arg(long, env = "PRESS_ACTOR_ID", default_value = "cli")]
	actor_id: String,

	/// Display name of the operator
	#[arg(long, env = "PRESS_ACTOR_NAME", default_value = "Command line")]
	actor_name: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create an order from a JSON file
	Create { file: PathBuf },
	/// Replace the intake fields of an order in the order stage
	UpdateIntake {
		order_id: u64,
		file: PathBuf,
		#[arg(long)]
		expected_delivery_date: Option<NaiveDate>,
	},
	/// Move an order into review
	Review {
		order_id: u64,
		#[arg(long)]
		notes: Option<String>,
	},
	/// Submit review selections and the manufacturing checklist from a JSON file
	UpdateReview { order_id: u64, file: PathBuf },
	/// Move a reviewed order into manufacturing
	Manufacture {
		order_id: u64,
		#[arg(long)]
		notes: Option<String>,
	},
	/// Mark one checklist item as done
	CompleteItem { order_id: u64, item_id: u64 },
	/// Move an order into printing once its checklist is done
	Print {
		order_id: u64,
		#[arg(long)]
		notes: Option<String>,
	},
	StartPrinting {
		order_id: u64,
		#[arg(long)]
		notes: Option<String>,
	},
	CompletePrinting {
		order_id: u64,
		#[arg(long)]
		notes: Option<String>,
	},
	Cancel {
		order_id: u64,
		#[arg(long)]
		reason: Option<String>,
	},
	/// Force an order's status
	Status {
		order_id: u64,
		status: Status,
		#[arg(long)]
		notes: Option<String>,
	},
	/// Force an order's stage
	Stage {
		order_id: u64,
		stage: Stage,
		#[arg(long)]
		notes: Option<String>,
	},
	/// Soft-delete an order
	Delete {
		order_id: u64,
		#[arg(long)]
		reason: Option<String>,
	},
	SetPriority {
		order_id: u64,
		#[arg(allow_negative_numbers = true)]
		priority: i64,
	},
	/// Update many priorities at once, given as ORDER_ID=PRIORITY pairs
	Reorder {
		#[arg(required = true, value_parser = parse_assignment)]
		assignments: Vec<(u64, i64)>,
	},
	/// Show the print queue
	Queue,
	/// Show an order's history, newest first
	Timeline { order_id: u64 },
	/// Show the manufacturing checklist and its progress
	Checklist { order_id: u64 },
	Show { order_id: u64 },
	Find { order_number: String },
	List {
		#[arg(long)]
		stage: Option<Stage>,
	},
}

/// Parses an `ORDER_ID=PRIORITY` pair.
fn parse_assignment(value: &str) -> Result<(u64, i64), String> {
	let (order_id, priority) = value
		.split_once('=')
		.ok_or_else(|| format!("Expected ORDER_ID=PRIORITY, got '{}'", value))?;
	let order_id = order_id
		.trim()
		.parse()
		.map_err(|_| format!("Invalid order id '{}'", order_id))?;
	let priority = priority
		.trim()
		.parse()
		.map_err(|_| format!("Invalid priority '{}'", priority))?;
	Ok((order_id, priority))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.workflow.id);

	let engine = build_engine(config)?;
	let actor = Actor::new(args.actor_id, args.actor_name);

	let output = run(&engine, &actor, args.command).await?;
	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the workflow engine on the configured primary storage backend.
fn build_engine(config: Config) -> Result<WorkflowEngine, Box<dyn std::error::Error>> {
	let storage_factories = create_factory_map!(
		press_storage::StorageInterface,
		press_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	Ok(WorkflowBuilder::new(config).build(WorkflowFactories { storage_factories })?)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
	let content = tokio::fs::read_to_string(path).await?;
	Ok(serde_json::from_str(&content)?)
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
	Ok(serde_json::to_value(value)?)
}

/// Runs one command against the engine and returns its result as JSON.
async fn run(
	engine: &WorkflowEngine,
	actor: &Actor,
	command: Command,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
	match command {
		Command::Create { file } => {
			let input: NewOrder = read_json(&file).await?;
			to_json(engine.create_order(&input, actor).await?)
		},
		Command::UpdateIntake {
			order_id,
			file,
			expected_delivery_date,
		} => {
			let intake: IntakeDetails = read_json(&file).await?;
			to_json(
				engine
					.update_intake(order_id, &intake, expected_delivery_date, actor)
					.await?,
			)
		},
		Command::Review { order_id, notes } => {
			to_json(engine.move_to_review(order_id, notes, actor).await?)
		},
		Command::UpdateReview { order_id, file } => {
			let submission: ReviewSubmission = read_json(&file).await?;
			to_json(engine.update_review(order_id, &submission, actor).await?)
		},
		Command::Manufacture { order_id, notes } => {
			to_json(engine.move_to_manufacturing(order_id, notes, actor).await?)
		},
		Command::CompleteItem { order_id, item_id } => {
			to_json(engine.complete_checklist_item(order_id, item_id, actor).await?)
		},
		Command::Print { order_id, notes } => {
			to_json(engine.move_to_printing(order_id, notes, actor).await?)
		},
		Command::StartPrinting { order_id, notes } => {
			to_json(engine.start_printing(order_id, notes, actor).await?)
		},
		Command::CompletePrinting { order_id, notes } => {
			to_json(engine.complete_printing(order_id, notes, actor).await?)
		},
		Command::Cancel { order_id, reason } => {
			to_json(engine.cancel_order(order_id, reason, actor).await?)
		},
		Command::Status {
			order_id,
			status,
			notes,
		} => to_json(engine.change_status(order_id, status, notes, actor).await?),
		Command::Stage {
			order_id,
			stage,
			notes,
		} => to_json(engine.change_stage(order_id, stage, notes, actor).await?),
		Command::Delete { order_id, reason } => {
			to_json(engine.delete_order(order_id, reason, actor).await?)
		},
		Command::SetPriority { order_id, priority } => {
			to_json(engine.set_priority(order_id, priority, actor).await?)
		},
		Command::Reorder { assignments } => {
			to_json(engine.reorder_queue(assignments, actor).await?)
		},
		Command::Queue => to_json(engine.print_queue().await?),
		Command::Timeline { order_id } => to_json(engine.timeline(order_id).await?),
		Command::Checklist { order_id } => Ok(serde_json::json!({
			"items": engine.checklist(order_id).await?,
			"completed": engine.checklist_completed(order_id).await?,
			"completionPercentage": engine.completion_percentage(order_id).await?,
		})),
		Command::Show { order_id } => to_json(engine.get_order(order_id).await?),
		Command::Find { order_number } => to_json(engine.find_by_order_number(&order_number).await?),
		Command::List { stage } => to_json(engine.list_orders(stage).await?),
	}
}
