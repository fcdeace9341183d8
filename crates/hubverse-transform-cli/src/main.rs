//! CLI tool for transforming hub model-output submissions.

mod error;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use hubverse_transform_core::{
    DEFAULT_ORIGIN_PREFIX, Outcome, RunOutcome, StorageEvent, StorageLocation, TransformOptions,
    add_model_output, delete_model_output, dispatch, parse_file_name,
};
use snafu::ResultExt;
use tokio::io::AsyncReadExt;

use crate::error::{
    AddModelOutputSnafu, CliResult, DecodeEventSnafu, DeleteModelOutputSnafu, EventsFailedSnafu,
    InvalidLocationSnafu, ParseFileNameSnafu, ReadEventFileSnafu, ReadEventStdinSnafu,
};

#[derive(Debug, Args)]
struct LocationArgs {
    /// Hub root: a local directory or s3://bucket[/prefix]
    #[arg(long)]
    hub: String,

    /// Where canonical files are written (default: the hub root)
    #[arg(long)]
    output: Option<String>,

    /// Leading path segment submissions live under
    #[arg(
        long = "origin-prefix",
        env = "HUBVERSE_ORIGIN_PREFIX",
        default_value = DEFAULT_ORIGIN_PREFIX
    )]
    origin_prefix: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transform a raw submission into its canonical Parquet file
    Add {
        #[command(flatten)]
        location: LocationArgs,

        /// Submission path relative to the hub root, e.g. raw/team/2420-01-01-team-model.csv
        #[arg(long)]
        path: String,

        /// Ignore hub-config/tasks.json when typing columns
        #[arg(long = "no-hub-config", default_value_t = false)]
        no_hub_config: bool,
    },

    /// Remove the canonical Parquet file of a deleted submission
    Delete {
        #[command(flatten)]
        location: LocationArgs,

        /// Submission path relative to the hub root
        #[arg(long)]
        path: String,
    },

    /// Dispatch every record of an S3 event notification
    Event {
        /// Hub root (default: s3://<bucket> of each record)
        #[arg(long)]
        hub: Option<String>,

        /// Where canonical files are written (default: the hub root)
        #[arg(long)]
        output: Option<String>,

        #[arg(
            long = "origin-prefix",
            env = "HUBVERSE_ORIGIN_PREFIX",
            default_value = DEFAULT_ORIGIN_PREFIX
        )]
        origin_prefix: String,

        /// Notification JSON file (default: stdin)
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long = "no-hub-config", default_value_t = false)]
        no_hub_config: bool,
    },

    /// Print the round id and model id encoded in a file name
    Parse { file_name: String },
}

#[derive(Debug, Parser)]
#[command(name = "hubverse-transform", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

fn parse_location(spec: &str) -> CliResult<StorageLocation> {
    StorageLocation::parse(spec).context(InvalidLocationSnafu { spec })
}

fn resolve_locations(args: &LocationArgs) -> CliResult<(StorageLocation, StorageLocation)> {
    let hub = parse_location(&args.hub)?;
    let output = match &args.output {
        Some(spec) => parse_location(spec)?,
        None => hub.clone(),
    };
    Ok((hub, output))
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Written { output_uri, rows } => println!("Wrote {output_uri} ({rows} rows)"),
        Outcome::Deleted { output_uri } => println!("Deleted {output_uri}"),
        Outcome::Skipped(reason) => println!("Skipped: {reason}"),
    }
}

async fn cmd_add(location: LocationArgs, path: String, no_hub_config: bool) -> CliResult<()> {
    let (hub, output) = resolve_locations(&location)?;
    let options = TransformOptions::default()
        .with_origin_prefix(location.origin_prefix)
        .with_hub_config(!no_hub_config);

    let outcome = add_model_output(&hub, &path, &output, &options)
        .await
        .context(AddModelOutputSnafu { path: path.clone() })?;
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_delete(location: LocationArgs, path: String) -> CliResult<()> {
    let (hub, output) = resolve_locations(&location)?;
    let options = TransformOptions::default().with_origin_prefix(location.origin_prefix);

    let outcome = delete_model_output(&hub, &path, &output, &options)
        .await
        .context(DeleteModelOutputSnafu { path: path.clone() })?;
    print_outcome(&outcome);
    Ok(())
}

async fn read_notification(file: Option<&Path>) -> CliResult<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .context(ReadEventFileSnafu { path }),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context(ReadEventStdinSnafu)?;
            Ok(buf)
        }
    }
}

struct EventArgs {
    hub: Option<String>,
    output: Option<String>,
    origin_prefix: String,
    file: Option<PathBuf>,
    no_hub_config: bool,
}

async fn cmd_event(args: EventArgs) -> CliResult<()> {
    let json = read_notification(args.file.as_deref()).await?;
    let events = StorageEvent::from_s3_notification(&json).context(DecodeEventSnafu)?;
    log::debug!(records = events.len(); "decoded storage event notification");
    let options = TransformOptions::default()
        .with_origin_prefix(args.origin_prefix)
        .with_hub_config(!args.no_hub_config);

    let fixed_hub = args.hub.as_deref().map(parse_location).transpose()?;
    let fixed_output = args.output.as_deref().map(parse_location).transpose()?;

    let mut failed = 0usize;
    for event in &events {
        let hub = match &fixed_hub {
            Some(hub) => hub.clone(),
            None => parse_location(&format!("s3://{}", event.bucket))?,
        };
        let output = fixed_output.clone().unwrap_or_else(|| hub.clone());

        match dispatch(event, &hub, &output, &options).await {
            RunOutcome::Success(uri) => println!("{}: {uri}", event.key),
            RunOutcome::Skipped(reason) => println!("{}: skipped: {reason}", event.key),
            RunOutcome::Failed(e) => {
                eprintln!("{}: {e}", event.key);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return EventsFailedSnafu {
            failed,
            total: events.len(),
        }
        .fail();
    }
    Ok(())
}

fn cmd_parse(file_name: &str) -> CliResult<()> {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parts = parse_file_name(&stem).context(ParseFileNameSnafu { file_name })?;
    println!("round_id: {}", parts.round_id);
    println!("model_id: {}", parts.model_id);
    Ok(())
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Add {
            location,
            path,
            no_hub_config,
        } => cmd_add(location, path, no_hub_config).await,

        Command::Delete { location, path } => cmd_delete(location, path).await,

        Command::Event {
            hub,
            output,
            origin_prefix,
            file,
            no_hub_config,
        } => {
            cmd_event(EventArgs {
                hub,
                output,
                origin_prefix,
                file,
                no_hub_config,
            })
            .await
        }

        Command::Parse { file_name } => cmd_parse(&file_name),
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
