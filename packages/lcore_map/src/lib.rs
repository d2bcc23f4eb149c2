#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Parses the command-line expressions that decide which logical cores a runtime uses and which
//! processors each of them may run on, and validates them into a [`RuntimeConfig`].
//!
//! Three mutually exclusive expression syntaxes select logical cores:
//!
//! * a coremask such as `0x3f`, where bit N selects logical core N ([`parse_coremask()`])
//! * a corelist such as `0-3,8` ([`parse_corelist()`])
//! * an lcores map such as `0,(1-2)@(4-7)`, which also binds logical cores to processors
//!   ([`parse_lcores()`])
//!
//! The lcores map is written in a small set grammar of IDs, ranges and parenthesized groups that is
//! also available on its own via [`parse_set()`].
//!
//! Every processor an expression refers to must be present on the host. Presence is decided by a
//! [`ProcessorDetection`] predicate, typically [`DetectedProcessors::host()`].
//!
//! # Example
//!
//! ```
//! use lcore_map::{CoreOption, DetectedProcessors, configure};
//!
//! let options = [
//!     CoreOption::Lcores("0,(1-2)@(4-7)".to_string()),
//!     CoreOption::MasterLcore("2".to_string()),
//! ];
//!
//! let config = configure(&options, &DetectedProcessors::first_n(8)).unwrap();
//!
//! assert_eq!(config.active_lcores(), vec![0, 1, 2]);
//! assert_eq!(config.master_lcore(), 2);
//! assert_eq!(config.affinity(1).unwrap().to_string(), "4-7");
//!
//! print!("{config}");
//! ```
//!
//! # Failures
//!
//! A parser that fails leaves the configuration with every logical core off, so a half-applied
//! expression is never observed.

mod config;
mod corelist;
mod coremask;
mod cpu_set;
mod detection;
mod error;
mod lcores;
mod membership;
mod options;
mod primitive_types;
mod scanner;

pub use config::*;
pub use corelist::*;
pub use coremask::*;
pub use cpu_set::*;
pub use detection::*;
pub use error::*;
pub use lcores::*;
pub use membership::*;
pub use options::*;
pub use primitive_types::*;
