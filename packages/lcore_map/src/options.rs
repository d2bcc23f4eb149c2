use std::sync::Arc;

use tracing::{debug, error};

use crate::{
    LcoreId, MAX_LCORE, ProcessorDetection, RuntimeConfig, parse_corelist, parse_coremask,
    parse_lcores,
};

/// One logical core related command-line option and its value.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum CoreOption {
    /// `-c COREMASK`, see [`parse_coremask()`].
    Coremask(String),

    /// `-l CORELIST`, see [`parse_corelist()`].
    Corelist(String),

    /// `--lcores COREMAP`, see [`parse_lcores()`].
    Lcores(String),

    /// `--master-lcore ID`, see [`parse_master_lcore()`].
    MasterLcore(String),
}

impl CoreOption {
    /// The option as it is spelled on the command line.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Coremask(_) => "-c",
            Self::Corelist(_) => "-l",
            Self::Lcores(_) => "--lcores",
            Self::MasterLcore(_) => "--master-lcore",
        }
    }

    fn selects_lcores(&self) -> bool {
        !matches!(self, Self::MasterLcore(_))
    }
}

/// Accumulates logical core options into a [`RuntimeConfig`] and validates the result.
///
/// Exactly one of the core selection options (`-c`, `-l`, `--lcores`) is expected. Applying a
/// second one replaces the selection made by the first.
///
/// # Example
///
/// ```
/// use lcore_map::{CoreOption, DetectedProcessors, LcoreOptions};
///
/// let mut options = LcoreOptions::new(&DetectedProcessors::first_n(4));
/// options
///     .apply(&CoreOption::Lcores("(1-2)@3".to_string()))
///     .unwrap();
///
/// let config = options.finish().unwrap();
///
/// // Without --master-lcore, the lowest active logical core is the master.
/// assert_eq!(config.master_lcore(), 1);
/// ```
#[derive(Debug)]
pub struct LcoreOptions {
    config: RuntimeConfig,
    lcores_parsed: bool,
    master_lcore_parsed: bool,
}

impl LcoreOptions {
    /// Starts with every logical core off. `detection` decides which processors options may
    /// reference.
    #[must_use]
    pub fn new(detection: &(impl ProcessorDetection + ?Sized)) -> Self {
        Self {
            config: RuntimeConfig::new(detection),
            lcores_parsed: false,
            master_lcore_parsed: false,
        }
    }

    /// Applies one option.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying parser. After a failed core selection option, no
    /// logical core is selected.
    pub fn apply(&mut self, option: &CoreOption) -> crate::Result<()> {
        let result = match option {
            CoreOption::Coremask(value) => parse_coremask(&mut self.config, value),
            CoreOption::Corelist(value) => parse_corelist(&mut self.config, value),
            CoreOption::Lcores(value) => parse_lcores(&mut self.config, value),
            CoreOption::MasterLcore(value) => parse_master_lcore(value).map(|lcore_id| {
                self.config.set_master_lcore(lcore_id);
                self.master_lcore_parsed = true;
            }),
        };

        if option.selects_lcores() {
            self.lcores_parsed = result.is_ok();
        }

        if let Err(e) = &result {
            error!(option = option.name(), error = %e, "invalid option value");
        }

        result
    }

    /// The configuration built so far.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Fills in defaults for options that were not supplied: without `--master-lcore`, the master
    /// is the active logical core with the lowest ID.
    pub fn adjust(&mut self) {
        if self.master_lcore_parsed {
            return;
        }

        let first_active = self
            .config
            .entries()
            .find_map(|(lcore_id, entry)| entry.ordinal().map(|_| lcore_id));

        if let Some(lcore_id) = first_active {
            debug!(lcore_id, "defaulting master lcore to first active lcore");
            self.config.set_master_lcore(lcore_id);
        }
    }

    /// Verifies that the options form a usable configuration.
    ///
    /// # Errors
    ///
    /// Fails if no core selection option was applied successfully or if the master logical core
    /// is not active.
    pub fn check(&self) -> crate::Result<()> {
        if !self.lcores_parsed {
            error!("logical cores must be enabled with -c, -l or --lcores");
            return Err(crate::Error::NoCoreSelection);
        }

        let master_lcore = self.config.master_lcore();

        if !self.config.is_active(master_lcore) {
            error!(master_lcore, "master lcore is not enabled");
            return Err(crate::Error::MasterLcoreNotActive {
                lcore_id: master_lcore,
            });
        }

        Ok(())
    }

    /// Applies defaults, validates and publishes the configuration for sharing with the threads
    /// of the runtime.
    ///
    /// # Errors
    ///
    /// See [`check()`][Self::check].
    pub fn finish(mut self) -> crate::Result<Arc<RuntimeConfig>> {
        self.adjust();
        self.check()?;

        Ok(Arc::new(self.config))
    }
}

/// Applies every option in order and returns the published configuration.
///
/// # Errors
///
/// Fails on the first option that cannot be applied or if the result does not pass
/// [`LcoreOptions::check()`].
pub fn configure<'a>(
    options: impl IntoIterator<Item = &'a CoreOption>,
    detection: &(impl ProcessorDetection + ?Sized),
) -> crate::Result<Arc<RuntimeConfig>> {
    let mut lcore_options = LcoreOptions::new(detection);

    for option in options {
        lcore_options.apply(option)?;
    }

    lcore_options.finish()
}

/// Parses the ID of the master logical core.
///
/// The value is an integer in decimal, hexadecimal (`0x` prefix) or octal (`0` prefix) notation,
/// optionally preceded by whitespace and a sign.
///
/// # Errors
///
/// Fails if the value is not such an integer in its entirety or is not in `[0, MAX_LCORE)`.
pub fn parse_master_lcore(value: &str) -> crate::Result<LcoreId> {
    let unsigned = value.trim_start_matches(|c: char| c.is_ascii_whitespace());

    let (negative, unsigned) = match unsigned.as_bytes().first() {
        Some(b'-') => (true, unsigned.get(1..).unwrap_or_default()),
        Some(b'+') => (false, unsigned.get(1..).unwrap_or_default()),
        _ => (false, unsigned),
    };

    let (digits, radix) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (hex, 16)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (unsigned.get(1..).unwrap_or_default(), 8)
    } else {
        (unsigned, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(crate::Error::syntax(value, "master lcore must be an integer"));
    }

    let magnitude = u64::from_str_radix(digits, radix)
        .map_err(|e| crate::Error::syntax(value, e.to_string()))?;

    // Negative values wrap around to huge IDs, which are out of range.
    if negative && magnitude != 0 {
        return Err(crate::Error::IndexOutOfRange {
            index: magnitude.wrapping_neg(),
            limit: MAX_LCORE,
        });
    }

    usize::try_from(magnitude)
        .ok()
        .filter(|index| *index < MAX_LCORE)
        .and_then(|index| LcoreId::try_from(index).ok())
        .ok_or(crate::Error::IndexOutOfRange {
            index: magnitude,
            limit: MAX_LCORE,
        })
}
