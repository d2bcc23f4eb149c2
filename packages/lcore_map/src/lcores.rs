use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::Selection;
use crate::membership::parse_set_token;
use crate::scanner::Scanner;
use crate::{CpuSet, MAX_CPU, MAX_LCORE, RuntimeConfig, SetKind, to_cpu_set};

/// Selects logical cores and the processors they may run on from an expression such as
/// `1,2@(5-7),(3-5)@(0,2),(0,6),7-8`.
///
/// The expression is a comma-separated list of groups `<lcores>[@<cpus>]`, where both sides are
/// written in the [set grammar][crate::parse_set]. For each group, in order:
///
/// * With `@<cpus>`, every selected logical core may run on exactly the processors in `<cpus>`.
/// * Without it, a single ID or a range gives every logical core its own processor with the same
///   ID, while a parenthesized group lets all of its logical cores run on all processors with the
///   same IDs as the group's members.
///
/// Logical cores get ordinals in the order they are first selected (ascending ID within a group).
/// A logical core selected again by a later group keeps its ordinal but takes the later group's
/// affinity. All logical cores of a group share one affinity set object.
///
/// The example above yields:
///
/// | lcore | processors |
/// |-------|------------|
/// | 0     | 0,6        |
/// | 1     | 1          |
/// | 2     | 5-7        |
/// | 3-5   | 0,2        |
/// | 6     | 0,6        |
/// | 7     | 7          |
/// | 8     | 8          |
///
/// The configuration is reset first. Every group is validated before anything is committed; if
/// parsing fails, the configuration is left with every logical core off.
///
/// # Errors
///
/// Fails if any set is malformed or out of range, if a referenced processor is not present or if
/// the expression selects nothing.
///
/// # Example
///
/// ```
/// use lcore_map::{DetectedProcessors, RuntimeConfig, parse_lcores};
///
/// let mut config = RuntimeConfig::new(&DetectedProcessors::first_n(8));
/// parse_lcores(&mut config, "0,(1-2)@(4-7)").unwrap();
///
/// assert_eq!(config.affinity(0).unwrap().to_string(), "0");
/// assert_eq!(config.affinity(2).unwrap().to_string(), "4-7");
/// ```
pub fn parse_lcores(config: &mut RuntimeConfig, lcores: &str) -> crate::Result<()> {
    config.reset();

    let selection = select(config, lcores)?;
    config.commit(selection)?;

    debug!(lcores, active_count = config.active_count(), "lcores parsed");

    Ok(())
}

/// Affinity assigned to the logical cores of one group.
#[derive(Debug)]
enum GroupAffinity {
    /// Every logical core of the group runs on the same processors.
    Shared(Arc<CpuSet>),

    /// Every logical core runs on the processor with its own ID.
    SameId(CpuSet),
}

fn select(config: &RuntimeConfig, lcores: &str) -> crate::Result<Selection> {
    let mut selection = Selection::new();
    let mut scanner = Scanner::new(lcores);

    loop {
        scanner.skip_blanks();

        if scanner.is_at_end() {
            return Err(crate::Error::syntax(lcores, "expected a logical core set"));
        }

        let group_start = scanner.pos();
        let (lcore_set, kind) = parse_set_token(&mut scanner, MAX_LCORE)?;

        let affinity = if scanner.next_is(b'@') {
            scanner.bump();

            let (cpu_set, _) = parse_set_token(&mut scanner, MAX_CPU)?;

            if scanner.next_is(b'@') {
                return Err(crate::Error::syntax(
                    scanner.tail_from(group_start),
                    "a group can only have one '@'",
                ));
            }

            GroupAffinity::Shared(Arc::new(to_cpu_set(
                &cpu_set,
                config.detected_processors(),
            )?))
        } else {
            // The logical core IDs double as processor IDs.
            let same_ids = to_cpu_set(&lcore_set, config.detected_processors())?;

            match kind {
                SetKind::Group => GroupAffinity::Shared(Arc::new(same_ids)),
                SetKind::Single | SetKind::Range => GroupAffinity::SameId(same_ids),
            }
        };

        trace!(
            group = scanner.since(group_start),
            lcores = %lcore_set,
            ?affinity,
            "lcore group parsed"
        );

        match affinity {
            GroupAffinity::Shared(shared) => {
                for index in lcore_set.iter() {
                    selection.activate_with_affinity(index, Arc::clone(&shared));
                }
            }
            GroupAffinity::SameId(processors) => {
                for processor_id in processors.iter() {
                    selection.activate_with_affinity(
                        processor_id as usize,
                        Arc::new(CpuSet::single(processor_id)),
                    );
                }
            }
        }

        match scanner.peek() {
            None => return Ok(selection),
            Some(b',') => scanner.bump(),
            Some(_) => {
                return Err(crate::Error::syntax(
                    scanner.tail_from(group_start),
                    "groups must be separated by ','",
                ));
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{CpuId, DetectedProcessors, LcoreId, MockProcessorDetection};

    fn config() -> RuntimeConfig {
        RuntimeConfig::new(&DetectedProcessors::first_n(16))
    }

    fn affinity(config: &RuntimeConfig, lcore_id: LcoreId) -> Vec<CpuId> {
        config.affinity(lcore_id).unwrap().iter().collect()
    }

    #[test]
    fn explicit_processors() {
        let mut config = config();

        parse_lcores(&mut config, "2@(5-7)").unwrap();

        assert_eq!(config.active_lcores(), vec![2]);
        assert_eq!(affinity(&config, 2), vec![5, 6, 7]);
    }

    #[test]
    fn range_without_processors_runs_on_own_ids() {
        let mut config = config();

        parse_lcores(&mut config, "0-2").unwrap();

        assert_eq!(config.active_lcores(), vec![0, 1, 2]);
        assert_eq!(affinity(&config, 0), vec![0]);
        assert_eq!(affinity(&config, 1), vec![1]);
        assert_eq!(affinity(&config, 2), vec![2]);

        let first = config.entry(0).unwrap();
        assert!(!first.shares_affinity_with(config.entry(1).unwrap()));
    }

    #[test]
    fn group_without_processors_shares_group() {
        let mut config = config();

        parse_lcores(&mut config, "(0-2)").unwrap();

        assert_eq!(config.active_lcores(), vec![0, 1, 2]);

        for lcore_id in 0..3 {
            assert_eq!(affinity(&config, lcore_id), vec![0, 1, 2]);
        }

        let first = config.entry(0).unwrap();
        assert!(first.shares_affinity_with(config.entry(1).unwrap()));
        assert!(first.shares_affinity_with(config.entry(2).unwrap()));
    }

    #[test]
    fn group_with_processors_shares_one_set() {
        let mut config = config();

        parse_lcores(&mut config, "(3-5)@(0,2)").unwrap();

        assert_eq!(affinity(&config, 4), vec![0, 2]);
        assert!(
            config
                .entry(3)
                .unwrap()
                .shares_affinity_with(config.entry(5).unwrap())
        );
    }

    #[test]
    fn full_example() {
        let mut config = config();

        parse_lcores(&mut config, "1,2@(5-7),(3-5)@(0,2),(0,6),7-8").unwrap();

        assert_eq!(config.active_count(), 9);
        assert_eq!(config.active_lcores(), vec![1, 2, 3, 4, 5, 0, 6, 7, 8]);

        assert_eq!(affinity(&config, 0), vec![0, 6]);
        assert_eq!(affinity(&config, 1), vec![1]);
        assert_eq!(affinity(&config, 2), vec![5, 6, 7]);
        assert_eq!(affinity(&config, 3), vec![0, 2]);
        assert_eq!(affinity(&config, 4), vec![0, 2]);
        assert_eq!(affinity(&config, 5), vec![0, 2]);
        assert_eq!(affinity(&config, 6), vec![0, 6]);
        assert_eq!(affinity(&config, 7), vec![7]);
        assert_eq!(affinity(&config, 8), vec![8]);
    }

    #[test]
    fn revisited_lcore_keeps_ordinal_and_takes_new_affinity() {
        let mut config = config();

        parse_lcores(&mut config, "3@4,1,3@(8-9)").unwrap();

        assert_eq!(config.ordinal(3), Some(0));
        assert_eq!(config.ordinal(1), Some(1));
        assert_eq!(affinity(&config, 3), vec![8, 9]);
        assert_eq!(config.active_count(), 2);
    }

    #[test]
    fn range_with_processors() {
        let mut config = config();

        parse_lcores(&mut config, "1-3@6").unwrap();

        assert_eq!(config.active_lcores(), vec![1, 2, 3]);
        assert_eq!(affinity(&config, 2), vec![6]);
    }

    #[test]
    fn blanks() {
        let mut config = config();

        parse_lcores(&mut config, "  ( 0 , 1 ) @ ( 4 - 5 ) , 2 ").unwrap();

        assert_eq!(config.active_lcores(), vec![0, 1, 2]);
        assert_eq!(affinity(&config, 1), vec![4, 5]);
        assert_eq!(affinity(&config, 2), vec![2]);
    }

    #[test]
    fn undetected_processor_is_error() {
        let mut config = RuntimeConfig::new(&DetectedProcessors::first_n(4));

        assert!(matches!(
            parse_lcores(&mut config, "0,1@(2-6)"),
            Err(crate::Error::ProcessorNotDetected { processor_id: 4 })
        ));
        assert_eq!(config.active_count(), 0);
        assert!(!config.is_active(0));
    }

    #[test]
    fn undetected_own_id_is_error() {
        let mut config = RuntimeConfig::new(&DetectedProcessors::first_n(4));

        parse_lcores(&mut config, "6").unwrap_err();
        parse_lcores(&mut config, "(3-5)").unwrap_err();

        // The logical core ID does not need a processor when processors are given explicitly.
        parse_lcores(&mut config, "6@0").unwrap();
        assert_eq!(config.active_lcores(), vec![6]);
    }

    #[test]
    fn detection_is_snapshot_at_creation() {
        let mut detection = MockProcessorDetection::new();
        detection
            .expect_is_detected()
            .times(MAX_CPU)
            .returning(|processor_id| processor_id < 2);

        let mut config = RuntimeConfig::new(&detection);

        parse_lcores(&mut config, "0-1").unwrap();
        parse_lcores(&mut config, "0-2").unwrap_err();
    }

    #[test]
    fn malformed_is_error() {
        let mut config = config();

        for lcores in [
            "", " ", ",", "1,", ",1", "1,,2", "1@", "@1", "1@2@3", "(1,2", "1-2-3", "(1)(2)",
            "1@(2", "x", "1 2", "1@2 3",
        ] {
            assert!(
                parse_lcores(&mut config, lcores).is_err(),
                "lcores {lcores:?}"
            );
        }
    }

    #[test]
    fn out_of_range_is_error() {
        let mut config = config();

        assert!(matches!(
            parse_lcores(&mut config, &MAX_LCORE.to_string()),
            Err(crate::Error::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            parse_lcores(&mut config, &format!("0@{MAX_CPU}")),
            Err(crate::Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn failure_in_later_group_commits_nothing() {
        let mut config = config();
        parse_lcores(&mut config, "0-3").unwrap();

        parse_lcores(&mut config, "4,5@(1,x)").unwrap_err();

        assert_eq!(config.active_count(), 0);
        assert!(config.active_lcores().is_empty());
        assert!(config.affinity(4).unwrap().is_empty());
    }
}
