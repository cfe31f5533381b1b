use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::Severity;
use owo_colors::OwoColorize;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use trellis_manifest::Manifest;
use trellisc::{DiscoveryConfig, SourceWriter};

use config::Config;

mod config;

const INTROSPECTION_HEADING: &str = "Introspection";

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(long, env = "TRELLIS_COLOR", default_value_t = Color::Auto)]
    color: Color,
    #[clap(subcommand)]
    command: Commands,
    #[clap(
        long,
        env = "TRELLIS_LOG",
        help_heading = Some(INTROSPECTION_HEADING),
        hide_short_help = true,
        hide_env = true,
        long_help = "trellisc will emit internal logs to the console.\nSet `TRELLIS_LOG=true` to enable this option using an environment variable."
    )]
    pub log: bool,
    #[clap(
        long,
        env = "TRELLIS_LOG_FILTER",
        help_heading = Some(INTROSPECTION_HEADING),
        hide_short_help = true,
        hide_env = true,
        long_help = "Control which logs are emitted if `--log` is enabled.\nIf no filter is specified, trellisc will default to `info,trellisc=debug`."
    )]
    pub log_filter: Option<String>,
}

#[derive(Copy, Clone, Debug)]
enum Color {
    Auto,
    Always,
    Never,
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Auto => write!(f, "auto"),
            Color::Always => write!(f, "always"),
            Color::Never => write!(f, "never"),
        }
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Color::Auto),
            "always" => Ok(Color::Always),
            "never" => Ok(Color::Never),
            s => Err(anyhow::anyhow!("Invalid color setting: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the application and print the manifest of its endpoints.
    Discover {
        #[clap(flatten)]
        discovery: DiscoveryArgs,
        /// Write the manifest to this file instead of printing it.
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,
    },
    /// Generate dispatch code from a manifest produced by `trellisc discover`.
    Codegen {
        /// The manifest to generate code from.
        #[clap(short, long, value_parser)]
        manifest: PathBuf,
        #[clap(flatten)]
        codegen: CodegenArgs,
    },
    /// Discover the application's endpoints and generate dispatch code in one go.
    Generate {
        #[clap(flatten)]
        discovery: DiscoveryArgs,
        #[clap(flatten)]
        codegen: CodegenArgs,
    },
}

#[derive(Args)]
struct DiscoveryArgs {
    /// The module exposing `pub fn register(bp: &mut Blueprint)`, e.g. `petstore::api`.
    #[clap(short, long)]
    package: Option<String>,
    /// The module exposing `pub fn register_middleware(registry: &mut MiddlewareRegistry)`.
    #[clap(long)]
    middleware: Option<String>,
    /// The `Cargo.toml` of the workspace containing the application.
    #[clap(long)]
    manifest_path: Option<String>,
    /// Run `cargo` without accessing the network.
    #[clap(long)]
    offline: bool,
}

#[derive(Args)]
struct CodegenArgs {
    /// The name of the crate the generated code is going to live in.
    /// Paths into that crate are spelled `crate::...`.
    #[clap(long)]
    crate_name: Option<String>,
    /// The directory that will contain the generated sources.
    #[clap(short, long, value_parser)]
    output: Option<PathBuf>,
    #[clap(long)]
    /// Verify that the generated code is up-to-date.
    /// If it isn't, `trellisc` will return an error without updating it.
    check: bool,
}

fn init_telemetry(log_filter: Option<String>, color: Color) -> Result<(), anyhow::Error> {
    let filter_layer = EnvFilter::try_new(log_filter.as_deref().unwrap_or("info,trellisc=debug"))
        .context("Invalid log filter configuration")?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(use_color_on_stderr(color))
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_target(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_timer(tracing_subscriber::fmt::time::uptime());
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    Ok(())
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let color = cli.color;
    miette::set_hook(Box::new(move |_| {
        let mut handler = miette::MietteHandlerOpts::new();
        // Force the width of the terminal as seen by the graphical error handler.
        if let Ok(width) = std::env::var("TRELLIS_TTY_WIDTH")
            && let Ok(width) = width.parse::<usize>()
        {
            handler = handler.width(width);
        }
        match color {
            Color::Auto => {}
            Color::Always => {
                handler = handler.color(true);
            }
            Color::Never => {
                handler = handler.color(false);
            }
        }
        Box::new(handler.build())
    }))?;

    better_panic::install();
    if cli.log {
        init_telemetry(cli.log_filter, color)?;
    }
    let config = Config::load(&std::env::current_dir()?)?;
    match cli.command {
        Commands::Discover { discovery, output } => discover(discovery, output, &config, color),
        Commands::Codegen { manifest, codegen } => {
            let manifest = {
                let contents = fs_err::read_to_string(&manifest)?;
                Manifest::decode(&contents)
                    .with_context(|| format!("`{}` is not a valid manifest", manifest.display()))?
            };
            let crate_name = codegen
                .crate_name
                .clone()
                .or_else(|| config.codegen.crate_name.clone())
                .context("Specify the name of the crate to generate code for with `--crate-name`")?;
            codegen_(&manifest, &crate_name, codegen, &config, color)
        }
        Commands::Generate { discovery, codegen } => {
            let discovery_config = discovery_config(discovery, &config)?;
            let crate_name = codegen
                .crate_name
                .clone()
                .or_else(|| config.codegen.crate_name.clone())
                .unwrap_or_else(|| default_crate_name(&discovery_config.registration_path));
            let manifest = match trellisc::discover(&discovery_config) {
                Ok(manifest) => manifest,
                Err(e) => {
                    print_report(&miette::Report::new(e), color);
                    return Ok(ExitCode::FAILURE);
                }
            };
            codegen_(&manifest, &crate_name, codegen, &config, color)
        }
    }
}

#[tracing::instrument("Discover endpoints", skip_all)]
fn discover(
    args: DiscoveryArgs,
    output: Option<PathBuf>,
    config: &Config,
    color: Color,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let discovery_config = discovery_config(args, config)?;
    let manifest = match trellisc::discover(&discovery_config) {
        Ok(manifest) => manifest,
        Err(e) => {
            print_report(&miette::Report::new(e), color);
            return Ok(ExitCode::FAILURE);
        }
    };
    let encoded = manifest.encode()?;
    match output {
        Some(output) => {
            SourceWriter::update_mode().persist_if_changed(&output, encoded.as_bytes())?;
        }
        None => print!("{encoded}"),
    }
    Ok(ExitCode::SUCCESS)
}

#[tracing::instrument("Generate dispatch code", skip_all, fields(crate_name = crate_name))]
fn codegen_(
    manifest: &Manifest,
    crate_name: &str,
    args: CodegenArgs,
    config: &Config,
    color: Color,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let output = args
        .output
        .or_else(|| config.codegen.output.clone())
        .context("Specify where the generated code should be written with `--output`")?;
    let generated = match trellisc::generate(manifest, crate_name) {
        Ok(generated) => generated,
        Err(e) => {
            print_report(&miette::Report::new(e), color);
            return Ok(ExitCode::FAILURE);
        }
    };
    let mut writer = if args.check {
        SourceWriter::check_mode()
    } else {
        SourceWriter::update_mode()
    };
    generated.persist(&output, &mut writer)?;
    if let Err(e) = writer.verify() {
        print_report(&miette::Report::new(e), color);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Flags win over `trellis.toml` and environment variables.
fn discovery_config(
    args: DiscoveryArgs,
    config: &Config,
) -> Result<DiscoveryConfig, anyhow::Error> {
    let settings = &config.discovery;
    let registration_path = args
        .package
        .or_else(|| settings.package.clone())
        .context("Specify the module exposing `register` with `--package`")?;
    let mut discovery = DiscoveryConfig::new(registration_path);
    discovery.middleware_path = args.middleware.or_else(|| settings.middleware.clone());
    discovery.manifest_path = args
        .manifest_path
        .or_else(|| settings.manifest_path.clone())
        .map(Utf8PathBuf::from);
    discovery.offline = args.offline || settings.offline;
    discovery.target_dir = settings.target_dir.clone().map(Utf8PathBuf::from);
    if let Some(max_output_bytes) = settings.max_output_bytes {
        discovery.max_output_bytes = max_output_bytes;
    }
    if let Some(cargo) = &settings.cargo {
        discovery.cargo = Utf8PathBuf::from(cargo);
    }
    Ok(discovery)
}

/// The crate owning the registration module: its first path segment.
fn default_crate_name(registration_path: &str) -> String {
    registration_path
        .trim_start_matches("::")
        .split("::")
        .next()
        .unwrap_or_default()
        .to_owned()
}

fn print_report(e: &miette::Report, color_profile: Color) {
    let use_color = use_color_on_stderr(color_profile);
    match e.severity() {
        Some(Severity::Warning) => {
            if use_color {
                eprintln!("{}: {e:?}", "WARNING".bold().yellow());
            } else {
                eprintln!("WARNING: {e:?}");
            }
        }
        _ => {
            if use_color {
                eprintln!("{}: {e:?}", "ERROR".bold().red());
            } else {
                eprintln!("ERROR: {e:?}");
            }
        }
    }
}

fn use_color_on_stderr(color_profile: Color) -> bool {
    match color_profile {
        Color::Auto => supports_color::on(Stream::Stderr).is_some(),
        Color::Always => true,
        Color::Never => false,
    }
}
