use tracing::debug;

use crate::config::Selection;
use crate::scanner::Scanner;
use crate::{MAX_LCORE, RuntimeConfig};

/// Selects logical cores from a list of IDs and ranges such as `0-3,8,10-11`.
///
/// Blanks are allowed around every number. Each logical core gets an ordinal the first time the
/// list reaches it; mentioning it again has no effect. A range is walked from its first endpoint
/// up to its second, so a descending range such as `5-2` selects nothing. No affinity is
/// expressed.
///
/// The configuration is reset first. If parsing fails, it is left with every logical core off.
///
/// # Errors
///
/// Fails on an empty list or list item, malformed numbers, IDs `>= MAX_LCORE`, anything after an
/// item other than `,`, or a list that selects nothing.
///
/// # Example
///
/// ```
/// use lcore_map::{DetectedProcessors, RuntimeConfig, parse_corelist};
///
/// let mut config = RuntimeConfig::new(&DetectedProcessors::first_n(16));
/// parse_corelist(&mut config, "8,0-1").unwrap();
///
/// assert_eq!(config.active_lcores(), vec![8, 0, 1]);
/// ```
pub fn parse_corelist(config: &mut RuntimeConfig, corelist: &str) -> crate::Result<()> {
    config.reset();

    let selection = select(corelist)?;
    config.commit(selection)?;

    debug!(corelist, active_count = config.active_count(), "corelist parsed");

    Ok(())
}

fn select(corelist: &str) -> crate::Result<Selection> {
    let mut selection = Selection::new();
    let mut scanner = Scanner::new(corelist);

    loop {
        scanner.skip_blanks();

        if scanner.is_at_end() {
            return Err(crate::Error::syntax(
                corelist,
                "expected a logical core ID or range",
            ));
        }

        let first = scanner.parse_index(MAX_LCORE)?;
        scanner.skip_blanks();

        let last = if scanner.next_is(b'-') {
            scanner.bump();
            scanner.skip_blanks();

            let last = scanner.parse_index(MAX_LCORE)?;
            scanner.skip_blanks();
            last
        } else {
            first
        };

        for index in first..=last {
            selection.activate(index);
        }

        match scanner.peek() {
            None => return Ok(selection),
            Some(b',') => scanner.bump(),
            Some(_) => {
                return Err(crate::Error::syntax(
                    scanner.rest(),
                    "list items must be separated by ','",
                ));
            }
        }
    }
}
