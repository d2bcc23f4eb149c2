use thiserror::Error;

use crate::{CpuId, LcoreId};

/// Errors that can occur when turning core selection options into a [`RuntimeConfig`][1].
///
/// Every error is fatal to startup of the runtime. The variants exist to produce a useful
/// diagnostic, not to enable recovery.
///
/// [1]: crate::RuntimeConfig
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller provided an option value that did not match the expected format.
    #[error("invalid syntax: '{invalid_value}' is invalid: {problem}")]
    InvalidSyntax {
        /// The specific value that was invalid. This may either be the entire option value
        /// or a specific part of it, depending on the problem.
        invalid_value: String,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// An index was syntactically valid but falls outside the domain it selects from.
    #[error("index {index} is out of range, must be less than {limit}")]
    IndexOutOfRange {
        /// The index as written in the option value.
        index: u64,

        /// The exclusive upper bound of the domain.
        limit: usize,
    },

    /// A processor (or a logical core interpreted as a processor) is not present on the host.
    #[error("processor {processor_id} is unavailable")]
    ProcessorNotDetected {
        /// The processor that was referenced.
        processor_id: CpuId,
    },

    /// The option value was valid but did not select any logical core.
    #[error("no logical core is selected")]
    NoActiveLcores,

    /// None of the core selection options was supplied.
    #[error("logical cores must be enabled with one of the coremask, corelist or lcores options")]
    NoCoreSelection,

    /// The master logical core is not one of the selected logical cores.
    #[error("master lcore {lcore_id} is not enabled")]
    MasterLcoreNotActive {
        /// The configured master logical core.
        lcore_id: LcoreId,
    },
}

impl Error {
    pub(crate) fn syntax(invalid_value: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            invalid_value: invalid_value.into(),
            problem: problem.into(),
        }
    }
}

/// A specialized `Result` type for core selection operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
