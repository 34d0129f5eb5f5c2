//! Kiln CLI, the command-line interface for the kiln HDL compiler.
//!
//! Provides `kiln demo` for converting the bundled example designs to
//! Verilog and `kiln check-config` for validating a `kiln.toml`.

#![warn(missing_docs)]

mod check;
mod demo;
mod designs;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use designs::DemoDesign;

/// Kiln, an embedded hardware description compiler.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln HDL compiler")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Directory containing a `kiln.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a bundled design to Verilog.
    Demo(DemoArgs),
    /// Validate a `kiln.toml` configuration.
    CheckConfig {
        /// Directory holding `kiln.toml` (default: current directory).
        dir: Option<String>,
    },
}

/// Arguments for the `kiln demo` subcommand.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Which design to convert.
    #[arg(value_enum)]
    pub design: DemoDesign,

    /// Output file for the Verilog source (default: stdout). Data files are
    /// written next to it.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Override the emitted module name.
    #[arg(long)]
    pub name: Option<String>,

    /// Lowering table: `native`, `generic` or `vendor`.
    #[arg(short, long, default_value = "generic")]
    pub target: String,

    /// Output format for diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Warning codes to suppress (e.g., `--allow W301`).
    #[arg(long, num_args = 1..)]
    pub allow: Vec<String>,

    /// Warning codes to promote to errors (e.g., `--deny W304`).
    #[arg(long, num_args = 1..)]
    pub deny: Vec<String>,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// One JSON object per line.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional configuration directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var("TERM").is_ok_and(|t| t != "dumb"),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Demo(ref args) => demo::run(args, &global),
        Command::CheckConfig { ref dir } => check::run(dir.as_deref(), &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr subscriber. `RUST_LOG` takes precedence over the
/// `-q`/`-v` defaults.
fn init_tracing(global: &GlobalArgs) {
    let default = if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(global.color)
        .with_target(false)
        .try_init();
}
