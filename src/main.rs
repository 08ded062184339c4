//! ci-bootstrap CLI Entry Point
//!
//! Reads the CI flags from the environment and prepares the worker.
//!
//! # Usage
//!
//! ```bash
//! # Bootstrap using the CI matrix variables
//! DISTRIB=conda PYTHON_VERSION=3.8 ci-bootstrap
//!
//! # Preview commands without running them
//! ci-bootstrap --dry-run
//!
//! # Hand the activated environment to the next CI step
//! ci-bootstrap --export-env /tmp/bootstrap.env && . /tmp/bootstrap.env
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use log::{debug, error, info};

use ci_bootstrap::config::flags::ALL_FLAGS;
use ci_bootstrap::{build_plan, Engine, Flags, ProcessEnv, Settings, SystemRunner};
use ci_bootstrap::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    dry_run: bool,
    print_plan: bool,
    working_dir: Option<PathBuf>,
    settings_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
    export_env_path: Option<PathBuf>,
    verbose: bool,
}

/// Default log level for a run, overridable through `RUST_LOG`.
///
/// `--print-plan` keeps stdout to the JSON document, so only warnings show.
fn log_level(config: &Config) -> &'static str {
    if config.print_plan {
        "warn"
    } else if config.verbose {
        "debug"
    } else {
        "info"
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("CI Environment Bootstrapper");
    println!();
}

fn print_usage() {
    println!("Usage: ci-bootstrap [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --dry-run            Preview commands without execution");
    println!("  --print-plan         Print the bootstrap plan as JSON and exit");
    println!("  --working-dir PATH   Directory commands run in");
    println!("  --settings PATH      YAML settings file");
    println!("  --report PATH        Write a JSON run report");
    println!("  --export-env PATH    Write the changed environment as a shell snippet");
    println!("  --verbose            Enable debug logging");
    println!("  --help               Show this help message");
    println!("  --version            Show version information");
    println!();
    println!("Environment:");
    println!("  {}", ALL_FLAGS.join(", "));
}

/// Takes the value following an option.
fn option_value(args: &[String], i: &mut usize, name: &str) -> Result<PathBuf, String> {
    *i += 1;
    args.get(*i)
        .map(PathBuf::from)
        .ok_or_else(|| format!("{} requires a path argument", name))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--dry-run" => config.dry_run = true,
            "--print-plan" => config.print_plan = true,
            "--verbose" | "-v" => config.verbose = true,
            "--working-dir" => {
                config.working_dir = Some(option_value(args, &mut i, "--working-dir")?)
            }
            "--settings" => config.settings_path = Some(option_value(args, &mut i, "--settings")?),
            "--report" => config.report_path = Some(option_value(args, &mut i, "--report")?),
            "--export-env" => {
                config.export_env_path = Some(option_value(args, &mut i, "--export-env")?)
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }

    Ok(config)
}

/// Per-step timings of an executed run, `None` for a dry run.
fn timing_summary(engine: &Engine, dry_run: bool) -> Option<String> {
    if dry_run {
        None
    } else {
        Some(engine.timeline().summary())
    }
}

/// Resolves the directory commands run in.
fn resolve_working_dir(
    working_dir: Option<PathBuf>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let dir = match working_dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    if !dir.is_dir() {
        return Err(ci_bootstrap::BootstrapError::InvalidWorkingDir(dir).into());
    }

    let dir = dir.canonicalize()?;
    info!("Working directory: {}", dir.display());
    Ok(dir)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(log_level(&config));

    let settings = match &config.settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let flags = Flags::from_env();
    let plan = build_plan(&flags, &settings);

    if config.print_plan {
        println!("{}", plan.to_json()?);
        return Ok(());
    }

    print_banner();

    for name in ALL_FLAGS {
        debug!("{}={}", name, env::var(name).unwrap_or_default());
    }
    info!("Distribution: {}", flags.distribution);

    if config.dry_run {
        info!("Mode: DRY RUN (commands will not execute)");
        println!();
    }

    let working_dir = resolve_working_dir(config.working_dir)?;

    let mut engine = Engine::new(plan, ProcessEnv::capture());
    engine.set_working_dir(working_dir);
    engine.set_dry_run(config.dry_run);

    let result = engine.run(&mut SystemRunner::new());

    if let Some(summary) = timing_summary(&engine, config.dry_run) {
        println!("{}", summary);
    }

    if let Some(path) = &config.report_path {
        if let Err(e) = engine.report().save(path) {
            error!("Failed to write report: {}", e);
        }
    }

    result?;

    for id in engine.report().tolerated_steps() {
        println!("{} {}", "tolerated:".yellow(), id);
    }

    if let Some(path) = &config.export_env_path {
        fs::write(path, engine.env().export_script())?;
        info!("Wrote environment to {}", path.display());
    }

    println!("{}", "Bootstrap complete".green().bold());
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("ci-bootstrap")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_defaults() {
        let config = parse_arguments(&args(&[])).unwrap();
        assert!(!config.dry_run);
        assert!(config.working_dir.is_none());
    }

    #[test]
    fn test_parse_all_options() {
        let config = parse_arguments(&args(&[
            "--dry-run",
            "--working-dir",
            "/src",
            "--settings",
            "ci.yaml",
            "--report",
            "out.json",
            "--export-env",
            "env.sh",
            "-v",
        ]))
        .unwrap();

        assert!(config.dry_run);
        assert!(config.verbose);
        assert_eq!(config.working_dir, Some(PathBuf::from("/src")));
        assert_eq!(config.settings_path, Some(PathBuf::from("ci.yaml")));
        assert_eq!(config.report_path, Some(PathBuf::from("out.json")));
        assert_eq!(config.export_env_path, Some(PathBuf::from("env.sh")));
    }

    #[test]
    fn test_parse_missing_value() {
        let err = parse_arguments(&args(&["--report"])).unwrap_err();
        assert!(err.contains("--report"));
    }

    #[test]
    fn test_parse_unknown_argument() {
        assert!(parse_arguments(&args(&["--parallel"])).is_err());
        assert!(parse_arguments(&args(&["extra-arg"])).is_err());
    }

    #[test]
    fn test_resolve_working_dir_rejects_missing() {
        assert!(resolve_working_dir(Some(PathBuf::from("/nonexistent/dir"))).is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(&Config::default()), "info");

        let verbose = Config {
            verbose: true,
            ..Config::default()
        };
        assert_eq!(log_level(&verbose), "debug");

        let print_plan = Config {
            print_plan: true,
            verbose: true,
            ..Config::default()
        };
        assert_eq!(log_level(&print_plan), "warn");
    }

    #[test]
    fn test_timing_summary_covers_failed_run() {
        use ci_bootstrap::plan::{BootstrapState, Invocation, Plan, Stage, Step};

        let mut plan = Plan::new();
        plan.push_stage(
            Stage::SystemSync,
            BootstrapState::PackagesSynced,
            vec![Step::run("apt_update", "Refresh", Invocation::new("false"))],
        );
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::new(plan, ProcessEnv::from_vars([("PATH", "/usr/bin:/bin")]));
        engine.set_working_dir(dir.path());

        assert!(engine.run(&mut SystemRunner::new()).is_err());

        let summary = timing_summary(&engine, false).unwrap();
        assert!(summary.contains("apt_update"));
        assert!(timing_summary(&engine, true).is_none());
    }
}
