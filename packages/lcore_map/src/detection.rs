use std::fs;
use std::num::NonZero;
use std::thread;

use tracing::{debug, warn};

use crate::{CpuId, CpuSet, MAX_CPU};

/// Answers whether a processor is present on the host.
///
/// Every processor referenced by a core selection option must be present. The parsers in this
/// package do not detect processors themselves; they only consult this predicate.
///
/// Any `Fn(CpuId) -> bool` closure is a valid predicate.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessorDetection {
    /// Whether the processor with the given ID was detected on the host.
    fn is_detected(&self, processor_id: CpuId) -> bool;
}

impl<F> ProcessorDetection for F
where
    F: Fn(CpuId) -> bool,
{
    #[cfg_attr(test, mutants::skip)] // Trivial delegation, do not waste time on mutation.
    #[inline]
    fn is_detected(&self, processor_id: CpuId) -> bool {
        self(processor_id)
    }
}

/// An explicit list of the processors present on the host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DetectedProcessors {
    present: CpuSet,
}

impl DetectedProcessors {
    /// Treats exactly the given processors as present. IDs `>= MAX_CPU` are ignored.
    #[must_use]
    pub fn from_ids(processor_ids: impl IntoIterator<Item = CpuId>) -> Self {
        Self {
            present: processor_ids.into_iter().collect(),
        }
    }

    /// Treats processors `0..count` as present.
    #[must_use]
    pub fn first_n(count: usize) -> Self {
        Self::from_ids((0..count.min(MAX_CPU)).filter_map(|index| CpuId::try_from(index).ok()))
    }

    /// The processors present on the current host.
    ///
    /// On Linux this is the `present` processor list published in sysfs. On other platforms, or
    /// if that list cannot be read, processors `0..n` are assumed present where `n` is the
    /// available parallelism reported by the standard library.
    #[must_use]
    pub fn host() -> Self {
        if let Some(detected) = Self::from_sysfs() {
            return detected;
        }

        let count = thread::available_parallelism().map_or(1, NonZero::get);
        debug!(count, "assuming processors 0..count are present");

        Self::first_n(count)
    }

    /// The processors treated as present.
    #[must_use]
    pub fn processors(&self) -> &CpuSet {
        &self.present
    }

    #[cfg_attr(coverage_nightly, coverage(off))]
    fn from_sysfs() -> Option<Self> {
        const PRESENT_PATH: &str = "/sys/devices/system/cpu/present";

        // Absent on platforms other than Linux.
        let contents = fs::read_to_string(PRESENT_PATH).ok()?;
        Self::from_cpulist(&contents)
    }

    // The sysfs file is a cpulist ("0-3,8") followed by a newline.
    fn from_cpulist(contents: &str) -> Option<Self> {
        match cpulist::parse(contents.trim()) {
            Ok(processor_ids) if !processor_ids.is_empty() => Some(Self::from_ids(processor_ids)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "ignoring malformed list of present processors");
                None
            }
        }
    }
}

impl ProcessorDetection for DetectedProcessors {
    #[inline]
    fn is_detected(&self, processor_id: CpuId) -> bool {
        self.present.contains(processor_id)
    }
}
