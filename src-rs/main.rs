use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod command;
mod config;
mod dispatch;
mod error;
mod naming;
mod rect;
mod reimport;
mod runner;

use command::{Direction, JpegpixiCommand, Method, PixelizationRequest};
use config::Config;
use dispatch::{dispatch, DispatchInput, DispatchResult, GridInstruction};
use naming::{next_name, NamingPolicy};
use rect::{parse_quad, Rectangle};
use reimport::inspect_target;
use runner::{ProcessRunner, RunTool};

#[derive(Parser, Debug)]
#[command(
    name = "pixi-dispatch",
    version,
    about = "Run jpegpixi on an editor selection and report the image to load next"
)]
struct Cli {
    /// JSON config file (default: $PIXI_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the host option schema in JSON
    Options,
    /// Print the target file name for a source image
    Name(NameArgs),
    /// Validate a selection and print the planned jpegpixi call without running it
    Plan(DispatchArgs),
    /// Run jpegpixi on the selection and report the new image
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct NameArgs {
    /// Source image path
    source: PathBuf,
    /// rect_coords|rect_coords_hex|incremental|cropgui
    #[arg(long, value_enum)]
    naming: Option<NamingPolicy>,
    /// Filename suffix base
    #[arg(long, allow_hyphen_values = true)]
    suffix_base: Option<String>,
    /// Rectangle as X,Y,W,H (needed by the coordinate policies)
    #[arg(long, allow_hyphen_values = true)]
    rect: Option<String>,
}

#[derive(Args, Debug)]
struct DispatchArgs {
    /// Source image path (the file on disk; unsaved edits are ignored)
    source: PathBuf,
    /// Selection bounds as X1,Y1,X2,Y2; omit when nothing is selected
    #[arg(long, allow_hyphen_values = true)]
    selection: Option<String>,
    /// average|linear|quadratic|cubic
    #[arg(long, value_enum)]
    method: Option<Method>,
    /// 2d|vertical|horizontal
    #[arg(long, value_enum)]
    direction: Option<Direction>,
    /// Maximum selection size in pixels
    #[arg(long)]
    max_selection_size: Option<u64>,
    /// rect_coords|rect_coords_hex|incremental|cropgui
    #[arg(long, value_enum)]
    naming: Option<NamingPolicy>,
    /// Filename suffix base
    #[arg(long, allow_hyphen_values = true)]
    suffix_base: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    dispatch: DispatchArgs,
    /// Kill jpegpixi after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Skip reading the output image after the run
    #[arg(long, action = ArgAction::SetTrue)]
    no_verify: bool,
    /// Print the run report JSON to stdout
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    /// Path to write the run report JSON
    #[arg(long)]
    json_out: Option<PathBuf>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixi_dispatch=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Options => print_options(),
        Commands::Name(args) => command_name(args, &Config::load(cli.config.as_deref())?),
        Commands::Plan(args) => command_plan(args, &Config::load(cli.config.as_deref())?),
        Commands::Run(args) => command_run(args, Config::load(cli.config.as_deref())?),
    }
}

fn print_options() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&config::option_schema())?);
    Ok(())
}

fn command_name(args: NameArgs, config: &Config) -> Result<()> {
    let policy = args.naming.unwrap_or(config.naming);
    let suffix_base = args.suffix_base.as_deref().unwrap_or(&config.suffix_base);
    let rect = match args.rect.as_deref() {
        Some(raw) => {
            let [x, y, w, h] = parse_quad(raw)?;
            Rectangle::new(x, y, w, h)?
        }
        None if matches!(
            policy,
            NamingPolicy::CoordsSuffix | NamingPolicy::CoordsSuffixHex
        ) =>
        {
            bail!("--rect X,Y,W,H is required for the {} naming policy", policy.as_str())
        }
        None => Rectangle::new(0, 0, 0, 0)?,
    };

    naming::require_utf8(&args.source)?;
    let target = next_name(&args.source, policy, suffix_base, &rect);
    println!("{}", target.display());
    Ok(())
}

fn command_plan(args: DispatchArgs, config: &Config) -> Result<()> {
    match plan_dispatch(&args, config) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(err) => {
            let report = failure_report(&args.source, &err);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Err(err)
        }
    }
}

fn command_run(args: RunArgs, mut config: Config) -> Result<()> {
    if args.timeout.is_some() {
        config.timeout_secs = args.timeout;
    }
    let runner = ProcessRunner::new(config.timeout_secs.map(Duration::from_secs));
    let payload = match run_dispatch(&args.dispatch, &config, &runner, !args.no_verify) {
        Ok(payload) => payload,
        Err(err) => {
            let report = failure_report(&args.dispatch.source, &err);
            if let Some(path) = args.json_out.as_deref() {
                write_json_pretty(path, &report)?;
            }
            if args.json {
                println!("{}", serde_json::to_string(&report)?);
            }
            return Err(err);
        }
    };

    if let Some(path) = args.json_out.as_deref() {
        write_json_pretty(path, &payload)?;
    }
    if args.json {
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        let target = payload
            .get("target_path")
            .and_then(Value::as_str)
            .unwrap_or_default();
        println!("{target}");
    }
    Ok(())
}

fn dispatch_input<'a>(args: &'a DispatchArgs, config: &'a Config) -> Result<DispatchInput<'a>> {
    let selection_bounds = match args.selection.as_deref() {
        Some(raw) => {
            let [x1, y1, x2, y2] =
                parse_quad(raw).with_context(|| format!("invalid --selection {raw:?}"))?;
            (x1, y1, x2, y2)
        }
        None => (0, 0, 0, 0),
    };
    let max_selection_size = args.max_selection_size.unwrap_or(config.max_selection_size);
    if max_selection_size == 0 {
        bail!("--max-selection-size must be a positive pixel count");
    }

    Ok(DispatchInput {
        has_selection: args.selection.is_some(),
        selection_bounds,
        source_path: &args.source,
        request: PixelizationRequest {
            method: args.method.unwrap_or(config.method),
            direction: args.direction.unwrap_or(config.direction),
        },
        max_selection_size,
        naming_policy: args.naming.unwrap_or(config.naming),
        suffix_base: args.suffix_base.as_deref().unwrap_or(&config.suffix_base),
    })
}

fn plan_dispatch(args: &DispatchArgs, config: &Config) -> Result<DispatchResult> {
    let input = dispatch_input(args, config)?;
    let result = dispatch(&input, &JpegpixiCommand::new(config.program.clone()))?;
    Ok(result)
}

fn run_dispatch(
    args: &DispatchArgs,
    config: &Config,
    runner: &impl RunTool,
    verify: bool,
) -> Result<Value> {
    let result = plan_dispatch(args, config)?;
    if let Some(parent) = result.target_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            bail!("target directory does not exist: {}", parent.display());
        }
    }

    let outcome = runner.run(&result.command)?;
    let target_image = if verify {
        Some(inspect_target(
            result.command.program(),
            &result.target_path,
            &result.rectangle,
        )?)
    } else {
        None
    };

    Ok(json!({
        "dispatched_at": timestamp_iso(),
        "source_path": result.source_path.display().to_string(),
        "target_path": result.target_path.display().to_string(),
        "command": result.command,
        "rectangle": result.rectangle,
        "selection_size": result.selection_size,
        "reselect": result.rectangle,
        "grid": result.grid,
        "tool": outcome,
        "target_image": target_image,
    }))
}

/// Report for a failed dispatch. The source grid is still set so the user can
/// retry with a block-aligned selection.
fn failure_report(source: &Path, err: &anyhow::Error) -> Value {
    json!({
        "error": format!("{err:#}"),
        "source_path": source.display().to_string(),
        "grid": [GridInstruction::dct_blocks(source)],
    })
}

fn write_json_pretty(path: &Path, value: &Value) -> Result<()> {
    ensure_parent_dir(path)?;
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).with_context(|| format!("failed to write JSON: {}", path.display()))?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

fn timestamp_iso() -> String {
    Utc::now().to_rfc3339()
}
