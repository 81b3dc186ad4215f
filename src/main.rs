use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use graft::config::GraftConfig;
use graft::driver::{Fixture, run_to_fixed_point};
use graft::identity::IdentityGenerator;
use graft::model::ClassName;
use graft::{Engine, telemetry};

mod format;

use format::OutputFormat;

/// Contribution merge engine
///
/// Finds the declarations contributed to each merge target's scopes,
/// resolves binding conflicts, replacements and exclusions, and prints the
/// merged declarations and generated subcomponents a code writer must emit.
///
/// Logging goes to stderr. Set GRAFT_LOG to a filter (e.g. "graft=debug")
/// and GRAFT_LOG_FORMAT=json for JSON events.
#[derive(Parser)]
#[command(name = "graft")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'graft <command> --help' for more information on a specific command.")]
struct Cli {
    /// Engine configuration file
    #[arg(long, global = true, env = "GRAFT_CONFIG", default_value = "graft.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a fixture to a fixed point and print every round's requests
    ///
    /// The fixture is a JSON document with `library` declarations (and their
    /// hints) visible from the first round, raw `hints`, and `rounds` of
    /// source declarations offered one round at a time.
    Merge {
        /// Fixture file
        fixture: PathBuf,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the name generated for a contributed subcomponent
    ///
    /// Both names are dotted canonical names, e.g. `com.example.LoggedIn`.
    Identity {
        /// The contributed subcomponent
        child: String,
        /// The merge target it is generated under
        parent: String,
    },
}

fn main() -> Result<()> {
    telemetry::init();
    let cli = Cli::parse();
    let config = GraftConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Merge { fixture, format } => {
            let json = std::fs::read_to_string(&fixture)
                .with_context(|| format!("reading fixture {}", fixture.display()))?;
            let fixture = Fixture::from_json(&json)
                .with_context(|| format!("parsing fixture {}", fixture.display()))?;
            let mut engine = Engine::new(config);
            let report = run_to_fixed_point(&mut engine, &fixture)?;
            print!("{}", format.render(&report)?);
        }
        Commands::Identity { child, parent } => {
            let child = ClassName::parse(&child).with_context(|| format!("invalid child '{child}'"))?;
            let parent =
                ClassName::parse(&parent).with_context(|| format!("invalid parent '{parent}'"))?;
            let generated = IdentityGenerator::new(config.identity)
                .generated_subcomponent_name(&child, &parent);
            println!("{generated}");
        }
    }
    Ok(())
}
