//! NameVetter CLI Application
//!
//! A command-line interface for vetting candidate company names: domain
//! availability, social handles and similar registered names. This is the
//! request layer over the namevet-lib engine.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use console::Term;
use namevet_lib::{
    list_tld_profiles, load_env_config, parse_duration_string, ConfigManager,
    EngineConfig, FileConfig, HealthStatus, NameVetError, VerificationEngine, VetConfig,
};
use serde::Serialize;
use std::process;
use tracing_subscriber::EnvFilter;

/// Exit code for bad input or configuration.
const EXIT_USAGE: i32 = 1;

/// Exit code when `--health` reports the engine down.
const EXIT_DOWN: i32 = 2;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for namevet
#[derive(Parser, Debug)]
#[command(name = "namevet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check whether a company name is free: domains, social handles, look-alikes")]
#[command(
    long_about = "Check whether a company name is usable.\n\nDomains are checked over RDAP with WHOIS and DNS fallback, social handles by probing profile pages, and registered look-alike domains through a public corpus. Every run returns within its time budget; anything that could not be verified is reported as unknown."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Candidate name to vet (words are joined, e.g. `namevet Acme Robotics`)
    #[arg(value_name = "NAME", help_heading = "Target")]
    pub name: Vec<String>,

    /// Check a single fully qualified domain instead of a full vet
    #[arg(long = "domain", value_name = "FQDN", help_heading = "Target")]
    pub domain: Option<String>,

    /// Check a single handle on one platform (use with --handle)
    #[arg(long = "social", value_name = "PLATFORM", requires = "handle", help_heading = "Target")]
    pub social: Option<String>,

    /// Handle for --social
    #[arg(long = "handle", value_name = "HANDLE", requires = "social", help_heading = "Target")]
    pub handle: Option<String>,

    /// Report engine health and exit (exit code 2 when down)
    #[arg(long = "health", help_heading = "Target")]
    pub health: bool,

    /// List supported social platforms and exit
    #[arg(long = "list-platforms", help_heading = "Target")]
    pub list_platforms: bool,

    /// List built-in TLD registry profiles and exit
    #[arg(long = "list-tlds", help_heading = "Target")]
    pub list_tlds: bool,

    /// TLDs to check (comma-separated or multiple -t flags)
    #[arg(short = 't', long = "tld", value_name = "TLD", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Selection")]
    pub tlds: Option<Vec<String>>,

    /// Platforms to check (comma-separated or multiple flags)
    #[arg(long = "platform", value_name = "PLATFORM", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Selection")]
    pub platforms: Option<Vec<String>>,

    /// Total time budget for a vet (e.g. 8s, 1500ms)
    #[arg(long = "budget", value_name = "DURATION", help_heading = "Selection")]
    pub budget: Option<String>,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Grouped, structured output with section headers
    #[arg(short = 'p', long = "pretty", help_heading = "Output Format")]
    pub pretty: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug logs and verdict provenance
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose configuration reporting
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Everything resolved from defaults, files, environment and flags.
#[derive(Debug)]
struct ResolvedConfig {
    engine: EngineConfig,
    vet: VetConfig,
    json: bool,
    pretty: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(EXIT_USAGE);
    }

    init_logging(&args);

    // The TLD table is static and needs no configuration
    if args.list_tlds {
        exit_on_error(ui::print_tld_profiles(list_tld_profiles(), args.json));
        return;
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_USAGE);
        }
    };

    if args.verbose {
        eprintln!("🔧 namevet v{} starting...", env!("CARGO_PKG_VERSION"));
        eprintln!("🔧 Resolved configuration: {:?}", config);
    }

    let engine = match VerificationEngine::new(config.engine.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_USAGE);
        }
    };

    // Listed as configured, so forced manual checks show up
    if args.list_platforms {
        exit_on_error(ui::print_platforms(engine.platforms(), config.json));
        return;
    }

    match run(&engine, &args, &config).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_USAGE);
        }
    }
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    // Listings are self-contained
    if args.list_platforms || args.list_tlds {
        return Ok(());
    }

    let modes = [
        !args.name.is_empty(),
        args.domain.is_some(),
        args.social.is_some(),
        args.health,
    ]
    .iter()
    .filter(|&&x| x)
    .count();

    if modes == 0 {
        return Err(
            "You must specify a name, --domain <FQDN>, --social <PLATFORM> --handle <HANDLE>, or --health"
                .to_string(),
        );
    }
    if modes > 1 {
        return Err(
            "Cannot combine a name with --domain, --social or --health; pick one".to_string(),
        );
    }

    if args.json && args.pretty {
        return Err("Cannot specify both --json and --pretty".to_string());
    }

    if let Some(budget) = &args.budget {
        match parse_duration_string(budget) {
            Some(d) if !d.is_zero() => {}
            _ => {
                return Err(format!(
                    "Invalid --budget '{}'. Use a format like '500ms', '8s', '2m'",
                    budget
                ))
            }
        }
    }

    Ok(())
}

/// Install the tracing subscriber on stderr so JSON on stdout stays clean.
///
/// `RUST_LOG` wins when set; `--debug` turns on engine debug logs.
fn init_logging(args: &Args) {
    let default_filter = if args.debug {
        "namevet_lib=debug,namevet=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(args.debug)
        .init();
}

/// Build the effective configuration.
///
/// Precedence, lowest first: built-in defaults, config files, `NV_*`
/// environment variables, CLI flags.
fn build_config(args: &Args) -> Result<ResolvedConfig, NameVetError> {
    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config(args.verbose);

    // Step 1: config files
    let file_config = if let Some(explicit_config_path) = &args.config {
        if args.verbose {
            eprintln!(
                "🔧 Using explicit config file (CLI --config): {}",
                explicit_config_path
            );
        }
        config_manager.load_file(explicit_config_path)?
    } else if let Some(env_config_path) = &env_config.config {
        if args.verbose {
            eprintln!(
                "🔧 Using explicit config file (NV_CONFIG env var): {}",
                env_config_path
            );
        }
        config_manager.load_file(env_config_path)?
    } else {
        if args.verbose {
            eprintln!("🔧 Discovering config files...");
        }
        config_manager.discover_and_load().unwrap_or_else(|e| {
            if args.verbose {
                eprintln!("⚠️ Config discovery warning: {}", e);
            }
            FileConfig::default()
        })
    };

    let mut engine = file_config.apply_to_engine(EngineConfig::default())?;
    let mut vet = file_config.apply_to_vet(VetConfig::default())?;
    let defaults = file_config.defaults.unwrap_or_default();
    let mut json = defaults.json.unwrap_or(false);
    let mut pretty = defaults.pretty.unwrap_or(false);

    // Step 2: environment variables (NV_*)
    engine = env_config.apply_to_engine(engine);
    vet = env_config.apply_to_vet(vet);
    if let Some(env_json) = env_config.json {
        json = env_json;
    }

    // Step 3: CLI arguments (highest precedence)
    if let Some(tlds) = &args.tlds {
        vet = vet.with_tlds(tlds.as_slice());
    }
    if let Some(platforms) = &args.platforms {
        vet = vet.with_platforms(platforms.as_slice());
    }
    if let Some(budget) = &args.budget {
        let budget = parse_duration_string(budget)
            .ok_or_else(|| NameVetError::config(format!("Invalid --budget '{}'", budget)))?;
        vet = vet.with_timeout_budget(budget);
    }
    if args.json {
        json = true;
        pretty = false;
    }
    if args.pretty {
        pretty = true;
        json = false;
    }

    // Only a full vet walks the TLD and platform lists
    let vetting = !args.name.is_empty();
    if vetting && vet.tlds.is_empty() && vet.platforms.is_empty() {
        return Err(NameVetError::config("Nothing to check: no TLDs and no platforms"));
    }

    Ok(ResolvedConfig {
        engine,
        vet,
        json,
        pretty,
    })
}

/// Run the selected mode and return the process exit code.
async fn run(
    engine: &VerificationEngine,
    args: &Args,
    config: &ResolvedConfig,
) -> Result<i32, Box<dyn std::error::Error>> {
    if args.health {
        let report = engine.health().await;
        if config.json {
            print_json(&report)?;
        } else {
            ui::print_health(&report);
        }
        return Ok(if report.status == HealthStatus::Down {
            EXIT_DOWN
        } else {
            0
        });
    }

    if let Some(domain) = &args.domain {
        let verdict = engine.resolve_domain(domain).await;
        if config.json {
            print_json(&verdict)?;
        } else {
            ui::print_verdict(&verdict, args.debug);
        }
        return Ok(0);
    }

    if let (Some(platform), Some(handle)) = (&args.social, &args.handle) {
        let verdict = engine.check_social(platform, handle).await;
        if config.json {
            print_json(&verdict)?;
        } else {
            ui::print_verdict(&verdict, args.debug);
        }
        return Ok(0);
    }

    let name = args.name.join(" ");
    let show_spinner = config.pretty && Term::stderr().is_term();
    let spinner = show_spinner.then(|| {
        ui::Spinner::start(format!(
            "Vetting {} across {} TLDs and {} platforms...",
            name,
            config.vet.tlds.len(),
            config.vet.platforms.len()
        ))
    });

    let result = engine.vet(&name, &config.vet).await;
    if let Some(spinner) = spinner {
        spinner.stop().await;
    }
    let report = result?;

    if config.json {
        print_json(&report)?;
    } else {
        ui::print_report(&report, config.pretty, args.debug);
    }
    Ok(0)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_on_error(result: Result<(), serde_json::Error>) {
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(EXIT_USAGE);
    }
}
