//! tachyon: command-line client for the evaluation backend.
//!
//! Manages datasets and goldens of a usecase, submits evaluation runs and
//! follows their progress.

mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tachyon_client::{
    defaults, export_goldens, parse_golden_import, project_rows, sort_rows, ApiClient,
    ClientConfig, EvaluationRequest, EvaluationStatus, GoldenPatch, HistoryPoller, NewGolden,
    SharedClient, SortField, SortOrder, SortState, KNOWN_MODELS,
};

#[derive(Parser, Debug)]
#[command(name = "tachyon")]
#[command(author, version, about = "Evaluation datasets, goldens and runs from the command line")]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Backend base URL (default: TACHYON_API_BASE_URL or http://localhost:8000)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Usecase to operate on (default: TACHYON_USECASE or usecase_001)
    #[arg(short, long, global = true)]
    usecase: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, env = "TACHYON_API_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage datasets
    #[command(subcommand)]
    Datasets(DatasetCommand),

    /// Manage the goldens of a dataset
    #[command(subcommand)]
    Goldens(GoldenCommand),

    /// Run and inspect evaluations
    #[command(subcommand)]
    Eval(EvalCommand),
}

#[derive(Subcommand, Debug)]
enum DatasetCommand {
    /// List datasets
    List,

    /// Create a dataset
    Create {
        /// Display name of the dataset
        alias: String,
    },

    /// Delete a dataset
    Delete {
        dataset_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum GoldenCommand {
    /// List goldens of a dataset
    List {
        dataset_id: String,
    },

    /// Add a golden
    Add {
        dataset_id: String,

        #[arg(short, long)]
        input: String,

        #[arg(short, long)]
        expected: String,

        #[arg(short, long, default_value = "")]
        context: String,

        /// Comma-separated tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Update fields of a golden
    Update {
        dataset_id: String,
        golden_id: String,

        #[arg(short, long)]
        input: Option<String>,

        #[arg(short, long)]
        expected: Option<String>,

        #[arg(short, long)]
        context: Option<String>,

        /// Comma-separated tags, replacing the current ones
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },

    /// Delete a golden
    Delete {
        dataset_id: String,
        golden_id: String,
    },

    /// Import goldens from a JSON file
    Import {
        dataset_id: String,

        /// JSON array of {input, expectedOutput, ...} objects
        file: PathBuf,
    },

    /// Export goldens as JSON
    Export {
        dataset_id: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Have the server generate goldens from a seed
    Generate {
        dataset_id: String,

        #[arg(short, long)]
        input: String,

        #[arg(short, long)]
        expected: Option<String>,

        #[arg(short, long)]
        context: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum EvalCommand {
    /// Start an evaluation run
    Submit {
        /// Name of the run
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        dataset: String,

        /// Model id, see `tachyon eval models`
        #[arg(short, long)]
        model: String,

        #[arg(short, long, default_value_t = 0.7)]
        temperature: f64,

        /// Extra job parameter, repeatable
        #[arg(short, long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Follow the run until it finishes
        #[arg(short, long)]
        watch: bool,
    },

    /// Show the run history of the usecase
    History {
        /// Column to sort by
        #[arg(short, long)]
        sort: Option<SortField>,

        #[arg(short, long, value_enum)]
        order: Option<Order>,
    },

    /// Show the progress report of a run
    Status {
        evaluation_id: String,
    },

    /// Poll the history until a run finishes
    Watch {
        evaluation_id: String,

        /// Milliseconds between polls
        #[arg(long, default_value_t = defaults::POLL_INTERVAL_MS)]
        interval_ms: u64,
    },

    /// List the models the backend offers
    Models,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Order {
    Asc,
    Desc,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Asc => SortOrder::Asc,
            Order::Desc => SortOrder::Desc,
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so command output stays pipeable.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "tachyon=info")
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tachyon=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        if let Some(ansi) = log_ansi {
            layer = layer.with_ansi(ansi);
        }
        registry.with(layer).init();
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<tachyon_client::Error>() {
        Some(e) => {
            eprintln!("Error ({}): {}", e.status(), e.message());
            if e.status() == 401 {
                eprintln!(
                    "hint: sign in again and pass the new token with --token or TACHYON_API_TOKEN"
                );
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

fn build_client(global: &GlobalArgs) -> anyhow::Result<SharedClient> {
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = &global.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(usecase) = &global.usecase {
        config = config.with_usecase(usecase);
    }

    let client = ApiClient::with_config(config)?;
    if let Some(token) = &global.token {
        client.credentials().set_token(token.clone());
    }
    Ok(Arc::new(client))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let json = cli.global.json;

    let client = build_client(&cli.global)?;
    debug!(usecase = %client.usecase().await, "Client ready");

    match cli.command {
        Commands::Datasets(cmd) => cmd_datasets(&client, cmd, json).await,
        Commands::Goldens(cmd) => cmd_goldens(&client, cmd, json).await,
        Commands::Eval(cmd) => cmd_eval(&client, cmd, json).await,
    }
}

async fn cmd_datasets(
    client: &SharedClient,
    cmd: DatasetCommand,
    json: bool,
) -> anyhow::Result<()> {
    match cmd {
        DatasetCommand::List => {
            let datasets = client.get_datasets().await?;
            if json {
                return output::print_json(&datasets);
            }
            println!("{}", output::datasets_table(&datasets));
        }
        DatasetCommand::Create { alias } => {
            let dataset = client.create_dataset(&alias).await?;
            if json {
                return output::print_json(&dataset);
            }
            println!("Created dataset {} ({})", dataset.alias, dataset.id);
        }
        DatasetCommand::Delete { dataset_id } => {
            client.delete_dataset(&dataset_id).await?;
            if !json {
                println!("Deleted dataset {}", dataset_id);
            }
        }
    }
    Ok(())
}

async fn cmd_goldens(
    client: &SharedClient,
    cmd: GoldenCommand,
    json: bool,
) -> anyhow::Result<()> {
    match cmd {
        GoldenCommand::List { dataset_id } => {
            let goldens = client.get_goldens(&dataset_id).await?;
            if json {
                return output::print_json(&goldens);
            }
            println!("{}", output::goldens_table(&goldens));
        }
        GoldenCommand::Add {
            dataset_id,
            input,
            expected,
            context,
            tags,
        } => {
            let golden = NewGolden {
                context,
                tags,
                ..NewGolden::new(input, expected)
            };
            let created = client.create_golden(&dataset_id, &golden).await?;
            if json {
                return output::print_json(&created);
            }
            println!("Created golden {} in {}", created.id, dataset_id);
        }
        GoldenCommand::Update {
            dataset_id,
            golden_id,
            input,
            expected,
            context,
            tags,
        } => {
            let patch = GoldenPatch {
                input,
                expected_output: expected,
                context,
                tags,
                ..GoldenPatch::default()
            };
            if patch.is_empty() {
                anyhow::bail!(
                    "nothing to update, pass at least one of --input, --expected, --context, --tags"
                );
            }
            let updated = client.update_golden(&dataset_id, &golden_id, &patch).await?;
            if json {
                return output::print_json(&updated);
            }
            println!("Updated golden {}", updated.id);
        }
        GoldenCommand::Delete {
            dataset_id,
            golden_id,
        } => {
            client.delete_golden(&dataset_id, &golden_id).await?;
            if !json {
                println!("Deleted golden {}", golden_id);
            }
        }
        GoldenCommand::Import { dataset_id, file } => {
            let text = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {}", file.display(), e))?;
            let goldens = parse_golden_import(&text)?;
            info!(count = goldens.len(), file = %file.display(), "Importing goldens");
            let created = client.import_goldens(&dataset_id, &goldens).await?;
            if json {
                return output::print_json(&created);
            }
            println!("Imported {} goldens into {}", created.len(), dataset_id);
        }
        GoldenCommand::Export { dataset_id, output } => {
            let goldens = client.get_goldens(&dataset_id).await?;
            let text = export_goldens(&goldens)?;
            match output {
                Some(path) => {
                    write_file(&path, &text)?;
                    eprintln!("Exported {} goldens to {}", goldens.len(), path.display());
                }
                None => println!("{}", text),
            }
        }
        GoldenCommand::Generate {
            dataset_id,
            input,
            expected,
            context,
        } => {
            let seed = GoldenPatch {
                input: Some(input),
                expected_output: expected,
                context,
                ..GoldenPatch::default()
            };
            let generated = client.generate_content(&dataset_id, &seed).await?;
            if json {
                return output::print_json(&generated);
            }
            println!("{}", output::goldens_table(&generated));
        }
    }
    Ok(())
}

fn write_file(path: &Path, text: &str) -> anyhow::Result<()> {
    std::fs::write(path, text)
        .map_err(|e| anyhow::anyhow!("cannot write {}: {}", path.display(), e))
}

async fn cmd_eval(client: &SharedClient, cmd: EvalCommand, json: bool) -> anyhow::Result<()> {
    match cmd {
        EvalCommand::Submit {
            name,
            dataset,
            model,
            temperature,
            params,
            watch,
        } => {
            if !KNOWN_MODELS.iter().any(|(id, _)| *id == model) {
                warn!(model = %model, "Model is not in the known catalogue");
            }
            let request = params.into_iter().fold(
                EvaluationRequest::new(name, dataset, model, temperature),
                |req, (name, value)| req.with_parameter(name, value),
            );
            let run = client.submit_evaluation(&request).await?;
            if json {
                output::print_json(&run)?;
            } else {
                println!("Submitted evaluation {} ({})", run.evaluation_name, run.id);
            }
            if watch {
                let interval = Duration::from_millis(defaults::POLL_INTERVAL_MS);
                watch_run(client, &run.id, interval, json).await?;
            }
        }
        EvalCommand::History { sort, order } => {
            let (history, datasets) =
                tokio::try_join!(client.get_evaluation_history(), client.get_datasets())?;
            let rows = project_rows(&history, &datasets);

            let rows = sort_rows(&rows, history_sort(sort, order));

            if json {
                return output::print_json(&rows);
            }
            println!("{}", output::history_table(&rows));
        }
        EvalCommand::Status { evaluation_id } => {
            let report = client.get_evaluation_status(&evaluation_id).await?;
            if json {
                return output::print_json(&report);
            }
            println!("{}", output::status_report(&evaluation_id, &report));
        }
        EvalCommand::Watch {
            evaluation_id,
            interval_ms,
        } => {
            watch_run(client, &evaluation_id, Duration::from_millis(interval_ms), json).await?;
        }
        EvalCommand::Models => {
            if json {
                let models: Vec<_> = KNOWN_MODELS
                    .iter()
                    .map(|(id, name)| serde_json::json!({"id": id, "name": name}))
                    .collect();
                return output::print_json(&models);
            }
            println!("{}", output::models_table());
        }
    }
    Ok(())
}

/// Sort for `eval history`: newest first unless `--sort` picks a column,
/// which then starts ascending. `--order` overrides either.
fn history_sort(sort: Option<SortField>, order: Option<Order>) -> SortState {
    let mut state = match sort {
        Some(field) => SortState::new(field, SortOrder::Asc),
        None => SortState::default(),
    };
    if let Some(order) = order {
        state.order = order.into();
    }
    state
}

/// Print status changes of a run until it finishes or Ctrl-C.
async fn watch_run(
    client: &SharedClient,
    evaluation_id: &str,
    interval: Duration,
    json: bool,
) -> anyhow::Result<()> {
    let mut handle = HistoryPoller::new(client.clone(), evaluation_id)
        .with_interval(interval)
        .start();
    let mut last: Option<EvaluationStatus> = None;

    loop {
        tokio::select! {
            snapshot = handle.changed() => {
                let Some(snapshot) = snapshot else { break };
                let Some(row) = snapshot.tracked() else {
                    debug!(polls = snapshot.polls, "Run not listed yet");
                    continue;
                };
                if last == Some(row.status) {
                    continue;
                }
                last = Some(row.status);
                if json {
                    println!("{}", serde_json::to_string(row)?);
                } else if row.status.is_terminal() {
                    println!(
                        "{} {} after {}",
                        row.id,
                        row.status,
                        output::format_duration(row.duration())
                    );
                } else {
                    println!("{} {}", row.id, row.status);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping poller");
                handle.stop();
                break;
            }
        }
    }

    match last {
        Some(EvaluationStatus::Failed) => anyhow::bail!("evaluation {} failed", evaluation_id),
        _ => Ok(()),
    }
}
