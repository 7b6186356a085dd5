//! Command line front end for the sdkgen passes.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use sdkgen_core::codegen::EmitOptions;
use sdkgen_core::format::{compare_artifacts, write_artifacts};
use sdkgen_core::{Drift, Error, FormatFailure, Formatter, Generator, Pass, PrettyFormatter};
use similar::{ChangeTag, TextDiff};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Crates whose events `SDKGEN_LOG=<level>` enables.
const LOG_TARGETS: [&str; 3] = ["sdkgen_cli", "sdkgen_core", "sdkgen_common"];

#[derive(Parser, Debug)]
#[command(
    name = "sdkgen",
    version,
    about = "Generate a Rust client SDK from an OpenAPI document"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one type per component schema
    Models(PassArgs),
    /// Generate one async function per operation, grouped by package
    Services(PassArgs),
    /// Generate the path navigation builder
    Builder(PassArgs),
    /// Run all three passes into one directory
    All(PassArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct PassArgs {
    /// OpenAPI document (JSON or YAML)
    #[arg(long, value_name = "PATH", default_value = "openapi.json")]
    spec: PathBuf,

    /// Output directory, or file for the builder pass
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Generator configuration (defaults to the embedded one)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Compare with the files on disk instead of writing them
    #[arg(long)]
    check: bool,

    /// Module path of the generated models
    #[arg(long, value_name = "PATH", default_value = "crate::models")]
    models_module: String,

    /// Module path of the generated services
    #[arg(long, value_name = "PATH", default_value = "crate::services")]
    services_module: String,

    /// Module path of the SDK runtime client
    #[arg(long, value_name = "PATH", default_value = "crate::client")]
    client_module: String,
}

impl PassArgs {
    fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            models_path: self.models_module.clone(),
            services_path: self.services_module.clone(),
            client_path: self.client_module.clone(),
        }
    }
}

/// Passes to run with their output locations.
fn plan(command: &Command) -> (Vec<(Pass, PathBuf)>, &PassArgs) {
    let single = |pass: Pass, args: &PassArgs| {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(pass.default_output()));
        vec![(pass, output)]
    };
    match command {
        Command::Models(args) => (single(Pass::Models, args), args),
        Command::Services(args) => (single(Pass::Services, args), args),
        Command::Builder(args) => (single(Pass::Builder, args), args),
        Command::All(args) => {
            let root = args.output.clone().unwrap_or_else(|| PathBuf::from("."));
            let passes = Pass::ALL
                .into_iter()
                .map(|pass| (pass, root.join(pass.default_output())))
                .collect();
            (passes, args)
        }
    }
}

/// Run the CLI with the given arguments (program name first) and return the
/// process exit code.
pub fn run(args: Vec<String>) -> i32 {
    match Cli::try_parse_from(args) {
        Ok(cli) => match cli.command {
            Some(command) => {
                init_tracing();
                match execute(&command) {
                    Ok(code) => code,
                    Err(err) => {
                        eprintln!("Error: {err}");
                        1
                    }
                }
            }
            None => {
                let mut cmd = Cli::command();
                let _ = cmd.print_help();
                println!();
                0
            }
        },
        Err(e) => {
            let code = e.exit_code();
            let _ = e.print();
            code
        }
    }
}

fn execute(command: &Command) -> sdkgen_core::Result<i32> {
    let (passes, args) = plan(command);
    let generator =
        Generator::from_paths(&args.spec, args.config.as_deref())?.with_options(args.emit_options());
    info!(
        spec = %args.spec.display(),
        fingerprint = %generator.config().fingerprint(),
        "Loaded spec and config"
    );

    run_passes(&generator, &passes, args.check, &PrettyFormatter)
}

/// Write or check each pass in turn. Files the formatter rejects fail their
/// own pass only; the remaining passes still run and the failures are
/// reported together at the end.
fn run_passes(
    generator: &Generator,
    passes: &[(Pass, PathBuf)],
    check: bool,
    formatter: &dyn Formatter,
) -> sdkgen_core::Result<i32> {
    let colorize = std::io::stdout().is_terminal();
    let mut drifted = 0;
    let mut failures: Vec<FormatFailure> = Vec::new();
    for (pass, output) in passes {
        let artifacts = generator.render(*pass, output, formatter);
        let outcome = if check {
            compare_artifacts(&artifacts).map(|drift| {
                for d in &drift {
                    print!("{}", generate_diff(d, &display_path(&d.path), colorize));
                }
                drift.len()
            })
        } else {
            write_artifacts(&artifacts).map(|summary| {
                debug!(pass = %pass, written = summary.written, unchanged = summary.unchanged, "Pass done");
                0
            })
        };
        match outcome {
            Ok(count) => drifted += count,
            Err(Error::Format(failed)) => {
                warn!(pass = %pass, failed = failed.len(), "Pass has files that failed to format");
                failures.extend(failed);
            }
            Err(err) => return Err(err),
        }
    }

    for failure in &failures {
        eprintln!(
            "Error: {} failed to format: {} (raw output in {})",
            display_path(&failure.path),
            failure.message,
            display_path(&failure.unformatted_path)
        );
    }
    if drifted > 0 {
        eprintln!("{drifted} generated file(s) are out of date");
    }
    if drifted > 0 || !failures.is_empty() {
        return Ok(1);
    }
    Ok(0)
}

fn display_path(path: &Path) -> String {
    path.strip_prefix(".").unwrap_or(path).display().to_string()
}

/// Unified diff between the file on disk and the freshly generated one.
fn generate_diff(drift: &Drift, rel_path: &str, colorize: bool) -> String {
    let (bold, reset) = if colorize { ("\x1b[1m", "\x1b[0m") } else { ("", "") };
    let existing = drift.current.as_deref().unwrap_or_default();
    let diff = TextDiff::from_lines(existing, drift.expected.as_str());
    let mut output = String::new();

    let label = if drift.current.is_some() { "current" } else { "missing" };
    output.push_str(&format!("{bold}--- {rel_path} ({label}){reset}\n"));
    output.push_str(&format!("{bold}+++ {rel_path} (new){reset}\n"));

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let (sign, color) = match change.tag() {
                    ChangeTag::Delete => ("-", "\x1b[31m"),
                    ChangeTag::Insert => ("+", "\x1b[32m"),
                    ChangeTag::Equal => (" ", ""),
                };
                let color = if colorize { color } else { "" };
                output.push_str(color);
                output.push_str(sign);
                output.push_str(change.value());
                if change.missing_newline() {
                    output.push('\n');
                }
                if !color.is_empty() {
                    output.push_str(reset);
                }
            }
        }
    }

    output
}

fn init_tracing() {
    // SDKGEN_LOG takes a plain level ("debug") for the sdkgen crates or a
    // full filter spec like "sdkgen_core=trace,sdkgen_cli=info"
    let filter = match std::env::var("SDKGEN_LOG") {
        Ok(level) if is_plain_level(&level) => crate_filter(&level),
        Ok(spec) => spec,
        Err(_) => crate_filter("info"),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        debug!("tracing subscriber already initialized");
    }
}

fn crate_filter(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn is_plain_level(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}
