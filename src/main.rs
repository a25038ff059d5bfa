use anyhow::{bail, Context, Result};
use bpaf::Bpaf;
use nogvl_check::{render_report, CheckConfig, Checker, OutputFormat, ViolationKind};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
/// Check GC-safe and NoGVL-safe call contracts in Ruby extension sources
///
/// EXIT STATUS:
///     0  no violations
///     1  violations found
///     2  usage, configuration or I/O error
struct Cli {
    /// Configuration file (default: ./nogvl-check.toml if present)
    #[bpaf(long, argument("FILE"))]
    config: Option<PathBuf>,

    /// Output format [human (default), json]
    #[bpaf(long, argument("FORMAT"), fallback(OutputFormat::default()))]
    format: OutputFormat,

    /// Disable a rule [gc-safety, nogvl-safety, nogvl-transition]
    #[bpaf(long, argument("RULE"))]
    disable: Vec<ViolationKind>,

    /// Files or directories to check
    #[bpaf(positional("PATH"))]
    paths: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = match cli().run_inner(bpaf::Args::current_args()) {
        Ok(cli) => cli,
        Err(bpaf::ParseFailure::Stdout(msg, _)) => {
            print!("{}", msg);
            return ExitCode::SUCCESS;
        }
        Err(bpaf::ParseFailure::Completion(c)) => {
            print!("{}", c);
            return ExitCode::SUCCESS;
        }
        Err(bpaf::ParseFailure::Stderr(msg)) => {
            eprintln!("{}", msg);
            return ExitCode::from(2);
        }
    };

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the run was clean.
fn run(cli: Cli) -> Result<bool> {
    if cli.paths.is_empty() {
        bail!("at least one PATH is required");
    }

    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    let config = CheckConfig::discover(cli.config.as_deref(), &cwd).context("failed to load configuration")?;
    let config = cli
        .disable
        .into_iter()
        .fold(config, |config, rule| config.with_disabled_rule(rule));

    let checker = Checker::new(&config).context("invalid configuration")?;
    let report = checker.check_paths(&cli.paths)?;
    tracing::debug!(
        "checked {} file(s): {} violation(s)",
        report.files.len(),
        report.violations
    );

    print!("{}", render_report(&report, cli.format)?);
    Ok(report.is_clean())
}
