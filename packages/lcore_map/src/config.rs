use std::fmt::{self, Display};
use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;

use crate::{
    CpuId, CpuSet, DetectedProcessors, LcoreId, LcoreRole, MAX_CPU, MAX_LCORE, ProcessorDetection,
};

/// The state of one logical core in a [`RuntimeConfig`].
#[derive(Clone, Debug, Default)]
pub struct LcoreEntry {
    role: LcoreRole,
    ordinal: Option<usize>,
    detected: bool,
    affinity: Arc<CpuSet>,
}

impl LcoreEntry {
    /// Whether the logical core takes part in the runtime.
    #[must_use]
    pub fn role(&self) -> LcoreRole {
        self.role
    }

    /// Dense index of the logical core among the active ones, in the order they were first
    /// selected. `None` if and only if the logical core is off.
    #[must_use]
    pub fn ordinal(&self) -> Option<usize> {
        self.ordinal
    }

    /// Whether the processor with the same numeric ID as this logical core is present on the host.
    #[must_use]
    pub fn is_detected(&self) -> bool {
        self.detected
    }

    /// The processors the logical core is explicitly allowed to run on.
    ///
    /// This is empty for logical cores selected by coremask or corelist, which do not express
    /// affinity. See [`RuntimeConfig::effective_affinity()`] for the affinity a launcher applies.
    #[must_use]
    pub fn affinity(&self) -> &CpuSet {
        &self.affinity
    }

    /// Whether both entries refer to the same affinity set object, which is the case for every
    /// logical core selected by the same group of an lcores expression.
    #[must_use]
    pub fn shares_affinity_with(&self, other: &Self) -> bool {
        !self.affinity.is_empty() && Arc::ptr_eq(&self.affinity, &other.affinity)
    }
}

/// The logical core table consumed by the runtime launcher.
///
/// A configuration is created with every logical core off and is then filled in by exactly one of
/// [`parse_coremask()`][1], [`parse_corelist()`][2] or [`parse_lcores()`][3]. Each of them resets
/// the table first, so a configuration only ever reflects the most recent parse.
///
/// Once populated, the configuration is meant to be shared read-only with the threads of the
/// runtime, typically as an `Arc<RuntimeConfig>`.
///
/// [1]: crate::parse_coremask
/// [2]: crate::parse_corelist
/// [3]: crate::parse_lcores
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    entries: Box<[LcoreEntry]>,
    active_count: usize,
    master_lcore: LcoreId,
    processors: DetectedProcessors,
}

impl RuntimeConfig {
    /// Creates a configuration with every logical core off, taking a snapshot of the processors
    /// that `detection` reports as present.
    ///
    /// # Example
    ///
    /// ```
    /// use lcore_map::{DetectedProcessors, RuntimeConfig, parse_corelist};
    ///
    /// let mut config = RuntimeConfig::new(&DetectedProcessors::first_n(4));
    /// parse_corelist(&mut config, "1-2").unwrap();
    ///
    /// assert_eq!(config.active_count(), 2);
    /// assert_eq!(config.ordinal(2), Some(1));
    /// ```
    #[must_use]
    pub fn new(detection: &(impl ProcessorDetection + ?Sized)) -> Self {
        let processors = DetectedProcessors::from_ids(
            (0..MAX_CPU)
                .filter_map(|index| CpuId::try_from(index).ok())
                .filter(|processor_id| detection.is_detected(*processor_id)),
        );

        let entries = (0..MAX_LCORE)
            .map(|index| LcoreEntry {
                detected: CpuId::try_from(index)
                    .is_ok_and(|processor_id| processors.is_detected(processor_id)),
                ..LcoreEntry::default()
            })
            .collect();

        Self {
            entries,
            active_count: 0,
            master_lcore: 0,
            processors,
        }
    }

    /// The entry of a logical core, or `None` if the ID is outside `[0, MAX_LCORE)`.
    #[must_use]
    pub fn entry(&self, lcore_id: LcoreId) -> Option<&LcoreEntry> {
        self.entries.get(lcore_id as usize)
    }

    /// Iterates over every logical core in the table, in ascending ID order.
    pub fn entries(&self) -> impl Iterator<Item = (LcoreId, &LcoreEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| Some((LcoreId::try_from(index).ok()?, entry)))
    }

    /// The role of a logical core. IDs outside the table are off.
    #[must_use]
    pub fn role(&self, lcore_id: LcoreId) -> LcoreRole {
        self.entry(lcore_id).map_or(LcoreRole::Off, LcoreEntry::role)
    }

    /// Whether the logical core takes part in the runtime.
    #[must_use]
    pub fn is_active(&self, lcore_id: LcoreId) -> bool {
        self.role(lcore_id) == LcoreRole::Active
    }

    /// The ordinal of an active logical core.
    #[must_use]
    pub fn ordinal(&self, lcore_id: LcoreId) -> Option<usize> {
        self.entry(lcore_id).and_then(LcoreEntry::ordinal)
    }

    /// The explicit affinity of a logical core. IDs outside the table have none.
    #[must_use]
    pub fn affinity(&self, lcore_id: LcoreId) -> Option<&CpuSet> {
        self.entry(lcore_id).map(LcoreEntry::affinity)
    }

    /// The processors a launcher should allow an active logical core to run on.
    ///
    /// This is the explicit affinity if one was expressed, otherwise the processor with the same
    /// numeric ID as the logical core. `None` for logical cores that are off.
    #[must_use]
    pub fn effective_affinity(&self, lcore_id: LcoreId) -> Option<CpuSet> {
        let entry = self.entry(lcore_id)?;

        if entry.ordinal.is_none() {
            return None;
        }

        if entry.affinity.is_empty() {
            Some(CpuSet::single(lcore_id))
        } else {
            Some(*entry.affinity)
        }
    }

    /// Number of active logical cores.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// The active logical cores, in ordinal order.
    #[must_use]
    pub fn active_lcores(&self) -> Vec<LcoreId> {
        self.entries()
            .filter_map(|(lcore_id, entry)| Some((entry.ordinal?, lcore_id)))
            .sorted_unstable()
            .map(|(_, lcore_id)| lcore_id)
            .collect()
    }

    /// The logical core that runs the control thread.
    ///
    /// Whether this logical core is active is not enforced here; see
    /// [`LcoreOptions::check()`][crate::LcoreOptions::check].
    #[must_use]
    pub fn master_lcore(&self) -> LcoreId {
        self.master_lcore
    }

    /// The processors that were present when the configuration was created.
    #[must_use]
    pub fn detected_processors(&self) -> &DetectedProcessors {
        &self.processors
    }

    pub(crate) fn set_master_lcore(&mut self, lcore_id: LcoreId) {
        self.master_lcore = lcore_id;
    }

    /// Turns every logical core off, keeping the detection snapshot and master lcore.
    pub(crate) fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.role = LcoreRole::Off;
            entry.ordinal = None;
            entry.affinity = Arc::default();
        }

        self.active_count = 0;
    }

    /// Applies a fully validated selection. The table must have been reset before.
    pub(crate) fn commit(&mut self, selection: Selection) -> crate::Result<()> {
        if selection.order.is_empty() {
            return Err(crate::Error::NoActiveLcores);
        }

        self.active_count = selection.order.len();

        for (ordinal, (index, affinity)) in selection.order.into_iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(index) {
                entry.role = LcoreRole::Active;
                entry.ordinal = Some(ordinal);
                entry.affinity = affinity;
            }
        }

        debug!(active_count = self.active_count, "logical core selection committed");

        Ok(())
    }
}

impl Display for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for lcore_id in self.active_lcores() {
            let ordinal = self.ordinal(lcore_id).unwrap_or_default();
            let affinity = self.effective_affinity(lcore_id).unwrap_or_default();

            writeln!(f, "lcore {lcore_id} (#{ordinal}) runs on processors {affinity}")?;
        }

        write!(f, "master lcore {}", self.master_lcore)
    }
}

/// Logical cores accumulated by a parser before they are committed to a [`RuntimeConfig`].
///
/// Ordinals follow the order in which logical cores are first activated.
#[derive(Debug)]
pub(crate) struct Selection {
    position: Box<[Option<usize>]>,
    order: Vec<(usize, Arc<CpuSet>)>,
}

impl Selection {
    pub(crate) fn new() -> Self {
        Self {
            position: vec![None; MAX_LCORE].into_boxed_slice(),
            order: Vec::new(),
        }
    }

    /// Activates a logical core without expressing affinity. Activating it again is a no-op.
    pub(crate) fn activate(&mut self, index: usize) {
        if !self.contains(index) {
            self.push(index, Arc::default());
        }
    }

    /// Activates a logical core (keeping its ordinal if already active) and replaces its affinity.
    pub(crate) fn activate_with_affinity(&mut self, index: usize, affinity: Arc<CpuSet>) {
        match self.position.get(index).copied().flatten() {
            Some(position) => {
                if let Some((_, existing)) = self.order.get_mut(position) {
                    *existing = affinity;
                }
            }
            None => self.push(index, affinity),
        }
    }

    pub(crate) fn contains(&self, index: usize) -> bool {
        self.position.get(index).is_some_and(Option::is_some)
    }

    fn push(&mut self, index: usize, affinity: Arc<CpuSet>) {
        if let Some(slot) = self.position.get_mut(index) {
            *slot = Some(self.order.len());
            self.order.push((index, affinity));
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(RuntimeConfig: Send, Sync);
    assert_impl_all!(LcoreEntry: Send, Sync);

    fn config() -> RuntimeConfig {
        RuntimeConfig::new(&DetectedProcessors::first_n(8))
    }

    #[test]
    fn new_config_is_all_off() {
        let config = config();

        assert_eq!(config.active_count(), 0);
        assert_eq!(config.entries().count(), MAX_LCORE);
        assert!(config.entries().all(|(_, e)| e.role() == LcoreRole::Off));
        assert!(config.entries().all(|(_, e)| e.ordinal().is_none()));
        assert!(config.active_lcores().is_empty());
        assert_eq!(config.master_lcore(), 0);
    }

    #[test]
    fn detected_flag_is_snapshot() {
        let config = config();

        assert!(config.entry(7).unwrap().is_detected());
        assert!(!config.entry(8).unwrap().is_detected());
        assert_eq!(config.detected_processors().processors().len(), 8);
    }

    #[test]
    fn out_of_table_lookups() {
        let config = config();

        assert!(config.entry(MAX_LCORE as LcoreId).is_none());
        assert_eq!(config.role(9999), LcoreRole::Off);
        assert!(config.affinity(9999).is_none());
        assert!(config.effective_affinity(9999).is_none());
    }

    #[test]
    fn commit_assigns_ordinals_in_activation_order() {
        let mut config = config();
        let mut selection = Selection::new();
        selection.activate(5);
        selection.activate(2);
        selection.activate(5);

        config.commit(selection).unwrap();

        assert_eq!(config.active_count(), 2);
        assert_eq!(config.ordinal(5), Some(0));
        assert_eq!(config.ordinal(2), Some(1));
        assert_eq!(config.active_lcores(), vec![5, 2]);
        assert!(config.is_active(2));
        assert!(!config.is_active(3));
    }

    #[test]
    fn later_affinity_replaces_earlier() {
        let mut config = config();
        let mut selection = Selection::new();
        selection.activate_with_affinity(1, Arc::new(CpuSet::single(3)));
        selection.activate_with_affinity(0, Arc::new(CpuSet::single(0)));
        selection.activate_with_affinity(1, Arc::new(CpuSet::single(4)));

        config.commit(selection).unwrap();

        assert_eq!(config.ordinal(1), Some(0));
        assert_eq!(config.affinity(1), Some(&CpuSet::single(4)));
    }

    #[test]
    fn empty_selection_is_error() {
        let mut config = config();

        assert!(matches!(
            config.commit(Selection::new()),
            Err(crate::Error::NoActiveLcores)
        ));
        assert_eq!(config.active_count(), 0);
    }

    #[test]
    fn reset_clears_everything_but_detection() {
        let mut config = config();
        let mut selection = Selection::new();
        selection.activate_with_affinity(3, Arc::new(CpuSet::single(3)));
        config.commit(selection).unwrap();

        config.reset();

        assert_eq!(config.active_count(), 0);
        assert!(!config.is_active(3));
        assert!(config.affinity(3).unwrap().is_empty());
        assert!(config.entry(3).unwrap().is_detected());
    }

    #[test]
    fn effective_affinity_defaults_to_same_id() {
        let mut config = config();
        let mut selection = Selection::new();
        selection.activate(6);
        selection.activate_with_affinity(2, Arc::new([0, 1].into_iter().collect()));
        config.commit(selection).unwrap();

        assert_eq!(config.effective_affinity(6), Some(CpuSet::single(6)));
        assert_eq!(config.effective_affinity(2).unwrap().to_string(), "0-1");
        assert_eq!(config.effective_affinity(4), None);
    }

    #[test]
    fn shared_affinity_is_same_object() {
        let mut config = config();
        let shared = Arc::new([0, 1].into_iter().collect::<CpuSet>());
        let mut selection = Selection::new();
        selection.activate_with_affinity(0, Arc::clone(&shared));
        selection.activate_with_affinity(1, Arc::clone(&shared));
        selection.activate_with_affinity(2, Arc::new([0, 1].into_iter().collect()));
        config.commit(selection).unwrap();

        let first = config.entry(0).unwrap();
        assert!(first.shares_affinity_with(config.entry(1).unwrap()));
        assert!(!first.shares_affinity_with(config.entry(2).unwrap()));
    }

    #[test]
    fn display_lists_active_lcores() {
        let mut config = config();
        let mut selection = Selection::new();
        selection.activate(1);
        config.commit(selection).unwrap();

        assert_eq!(
            config.to_string(),
            "lcore 1 (#0) runs on processors 1\nmaster lcore 0"
        );
    }
}
