#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the `lcore_map` tool, which prints the logical core table that a set of
//! core selection options produces on the current host.
//!
//! Diagnostics go to stderr and are filtered by `RUST_LOG` (default `warn`).

use std::io;
use std::process::ExitCode;

use argh::FromArgs;
use lcore_map::{CoreOption, DetectedProcessors, configure};
use tracing_subscriber::EnvFilter;

/// Shows which logical cores a set of core selection options enables and which processors each of
/// them may run on.
#[derive(FromArgs)]
struct Args {
    /// hexadecimal bitmask of logical cores to enable (e.g. 0x3f)
    #[argh(option, short = 'c')]
    coremask: Option<String>,

    /// list of logical cores and ranges to enable (e.g. 0-3,8)
    #[argh(option, short = 'l')]
    corelist: Option<String>,

    /// map of logical core groups to the processors they run on (e.g. 0,(1-2)@(4-7))
    #[argh(option)]
    lcores: Option<String>,

    /// ID of the master logical core (default: lowest enabled logical core)
    #[argh(option)]
    master_lcore: Option<String>,
}

impl Args {
    fn into_options(self) -> Vec<CoreOption> {
        [
            self.coremask.map(CoreOption::Coremask),
            self.corelist.map(CoreOption::Corelist),
            self.lcores.map(CoreOption::Lcores),
            self.master_lcore.map(CoreOption::MasterLcore),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let options = args.into_options();

    match configure(&options, &DetectedProcessors::host()) {
        Ok(config) => {
            print!("{config}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
