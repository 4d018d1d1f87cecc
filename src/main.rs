use std::path::{Path, PathBuf};

use sentiment_tail_driver::{ConsumerConfig, Driver};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod viz;

use viz::renderer::{ChartConfig, ChartRenderer};
use viz::tracer::JsonTracer;

const USAGE: &str = "\
Usage: sentiment-tail [watch] [<file>] [--config <file.toml>] [--poll-ms <ms>]
                      [--width <cols>] [--no-color] [--headless] [--trace-json <path>]
       sentiment-tail help";

/// Flags that take a value; everything else starting with `--` is a switch.
const VALUE_FLAGS: &[&str] = &["--config", "--poll-ms", "--width", "--trace-json"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let positionals = positional_args(&args);

    let path_arg = match positionals.first().map(|s| s.as_str()) {
        Some("help") => {
            println!("{USAGE}");
            return Ok(());
        }
        Some("watch") => positionals.get(1).cloned(),
        other => other.map(str::to_string),
    };
    if let Some(unknown) = args.iter().skip(1).find(|a| a.starts_with("--") && !is_known_flag(a)) {
        eprintln!("Unknown flag: {unknown}\n{USAGE}");
        std::process::exit(2);
    }
    if let Err(msg) = check_flag_values(&args) {
        eprintln!("{msg}\n{USAGE}");
        std::process::exit(2);
    }

    let config = build_config(&args, path_arg)?;
    let headless = args.iter().any(|a| a == "--headless");
    run_watch(config, headless).await
}

/// Defaults, then the TOML file, then command-line flags.
fn build_config(args: &[String], path_arg: Option<String>) -> anyhow::Result<ConsumerConfig> {
    let mut config = match parse_flag_string(args, "--config") {
        Some(file) => ConsumerConfig::load(Path::new(&file))?,
        None => ConsumerConfig::default(),
    };

    if let Some(path) = path_arg {
        config.path = PathBuf::from(path);
    }
    if let Some(ms) = parse_flag_value(args, "--poll-ms")? {
        config.poll_interval_ms = ms;
    }
    if let Some(cols) = parse_flag_value(args, "--width")? {
        config.chart_width = cols as usize;
    }
    if let Some(trace) = parse_flag_string(args, "--trace-json") {
        config.trace_json = Some(PathBuf::from(trace));
    }
    if args.iter().any(|a| a == "--no-color") {
        config.color = false;
    }
    config.validate()?;
    Ok(config)
}

async fn run_watch(config: ConsumerConfig, headless: bool) -> anyhow::Result<()> {
    let mut renderer = ChartRenderer::new(ChartConfig {
        color: config.color,
        width: config.chart_width,
        live: !headless,
    });
    if let Some(ref path) = config.trace_json {
        let tracer = JsonTracer::open(path)?;
        renderer.set_tracer(tracer);
        info!(path = %path.display(), "tracing snapshots");
    }

    info!(path = %config.path.display(), "START consumer");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("consumer stopped by user");
        signal_cancel.cancel();
    });

    let mut driver = Driver::from_config(&config, renderer);
    let summary = driver.run(cancel).await?;

    info!(
        groups = summary.state.len(),
        frames = driver.renderer().frames(),
        metrics = %summary.metrics,
        "consumer closed"
    );
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn is_known_flag(arg: &str) -> bool {
    VALUE_FLAGS.contains(&arg) || matches!(arg, "--no-color" | "--headless" | "--help")
}

/// Arguments that are neither flags nor the value of a value-taking flag.
fn positional_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--help" || arg == "-h" {
            out.insert(0, "help".to_string());
        } else if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with("--") {
            out.push(arg.clone());
        }
    }
    out
}

/// Numeric value following `flag`. A flag that is present but has no value,
/// or a value that is not a whole number, is an error.
fn parse_flag_value(args: &[String], flag: &str) -> anyhow::Result<Option<u64>> {
    let Some(i) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    let raw = args
        .get(i + 1)
        .ok_or_else(|| anyhow::anyhow!("{flag} needs a value"))?;
    raw.parse()
        .map(Some)
        .map_err(|_| anyhow::anyhow!("invalid value for {flag}: {raw:?}"))
}

/// Reject malformed values up front, like unknown flags.
fn check_flag_values(args: &[String]) -> Result<(), String> {
    for flag in ["--poll-ms", "--width"] {
        parse_flag_value(args, flag).map_err(|e| e.to_string())?;
    }
    for flag in ["--config", "--trace-json"] {
        if args.iter().any(|a| a == flag) && parse_flag_string(args, flag).is_none() {
            return Err(format!("{flag} needs a value"));
        }
    }
    Ok(())
}

fn parse_flag_string(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
