use std::fmt::{self, Debug, Display};

use tracing::error;

use crate::{CpuId, MAX_CPU, MembershipSet, ProcessorDetection};

const BITS_PER_WORD: usize = u64::BITS as usize;
const WORDS: usize = MAX_CPU.div_ceil(BITS_PER_WORD);

/// The processors a logical core's thread is allowed to run on.
///
/// This is a fixed-size bitset over `[0, MAX_CPU)`, comparable to the operating system's
/// `cpu_set_t`. It is displayed in the `cpulist` format (`0-2,5`).
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct CpuSet {
    words: [u64; WORDS],
}

impl CpuSet {
    /// Creates a set without any processors.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Creates a set with a single processor.
    ///
    /// Processors outside `[0, MAX_CPU)` cannot be members and are ignored.
    #[must_use]
    pub fn single(processor_id: CpuId) -> Self {
        let mut set = Self::new();
        set.insert(processor_id);
        set
    }

    /// Whether the processor is a member.
    #[must_use]
    pub fn contains(&self, processor_id: CpuId) -> bool {
        let (word, mask) = locate(processor_id);

        word.and_then(|w| self.words.get(w))
            .is_some_and(|bits| bits & mask != 0)
    }

    /// Number of processors in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Whether the set has no processors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Iterates over the processors in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = CpuId> + '_ {
        (0..MAX_CPU)
            .filter_map(|index| CpuId::try_from(index).ok())
            .filter(|processor_id| self.contains(*processor_id))
    }

    pub(crate) fn insert(&mut self, processor_id: CpuId) {
        let (word, mask) = locate(processor_id);

        if let Some(bits) = word.and_then(|w| self.words.get_mut(w)) {
            *bits |= mask;
        }
    }
}

// Word index (if inside the domain) and bit mask of a processor.
fn locate(processor_id: CpuId) -> (Option<usize>, u64) {
    let index = processor_id as usize;

    if index >= MAX_CPU {
        return (None, 0);
    }

    (
        index.checked_div(BITS_PER_WORD),
        1_u64 << index.checked_rem(BITS_PER_WORD).unwrap_or_default(),
    )
}

impl FromIterator<CpuId> for CpuSet {
    fn from_iter<T: IntoIterator<Item = CpuId>>(iter: T) -> Self {
        let mut set = Self::new();

        for processor_id in iter {
            set.insert(processor_id);
        }

        set
    }
}

impl Display for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", cpulist::emit(self.iter()))
    }
}

impl Debug for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpuSet({self})")
    }
}

/// Converts a membership set over the processor domain into a [`CpuSet`], requiring every
/// selected processor to be present on the host.
///
/// A membership set over the logical core domain may also be passed; its indexes are then
/// interpreted as processor IDs.
///
/// # Errors
///
/// Fails on the first (lowest) selected processor that is outside `[0, MAX_CPU)` or that the
/// detection predicate does not report as present.
pub fn to_cpu_set(
    set: &MembershipSet,
    detection: &(impl ProcessorDetection + ?Sized),
) -> crate::Result<CpuSet> {
    let mut cpu_set = CpuSet::new();

    for index in set.iter() {
        let processor_id = CpuId::try_from(index)
            .ok()
            .filter(|_| index < MAX_CPU)
            .ok_or(crate::Error::IndexOutOfRange {
                index: index as u64,
                limit: MAX_CPU,
            })?;

        if !detection.is_detected(processor_id) {
            error!(processor_id, "processor unavailable");
            return Err(crate::Error::ProcessorNotDetected { processor_id });
        }

        cpu_set.insert(processor_id);
    }

    Ok(cpu_set)
}
