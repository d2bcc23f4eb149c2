use tracing::{debug, error};

use crate::config::Selection;
use crate::primitive_types::is_blank;
use crate::{LcoreEntry, LcoreId, MAX_LCORE, RuntimeConfig};

const BITS_PER_HEX_DIGIT: usize = 4;

/// Selects logical cores from a hexadecimal bitmask such as `0x3f`.
///
/// The least significant bit selects logical core 0. Blanks around the value and a `0x`/`0X`
/// prefix are allowed. Digits that would select logical cores `>= MAX_LCORE` must be zero.
/// Ordinals follow ascending logical core ID and no affinity is expressed.
///
/// The configuration is reset first. If parsing fails, it is left with every logical core off.
///
/// # Errors
///
/// Fails if the value is empty, contains anything but hexadecimal digits, selects a logical core
/// whose processor is not present, selects a logical core `>= MAX_LCORE` or selects nothing.
///
/// # Example
///
/// ```
/// use lcore_map::{DetectedProcessors, RuntimeConfig, parse_coremask};
///
/// let mut config = RuntimeConfig::new(&DetectedProcessors::first_n(8));
/// parse_coremask(&mut config, "0x14").unwrap();
///
/// assert_eq!(config.active_lcores(), vec![2, 4]);
/// ```
pub fn parse_coremask(config: &mut RuntimeConfig, coremask: &str) -> crate::Result<()> {
    config.reset();

    let selection = select(config, coremask)?;
    config.commit(selection)?;

    debug!(coremask, active_count = config.active_count(), "coremask parsed");

    Ok(())
}

fn select(config: &RuntimeConfig, coremask: &str) -> crate::Result<Selection> {
    let trimmed = coremask.trim_matches(|c: char| u8::try_from(c).is_ok_and(is_blank));
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(crate::Error::syntax(coremask, "coremask must not be empty"));
    }

    let mut selection = Selection::new();

    // The rightmost digit holds the lowest logical cores.
    for (digit_index, c) in digits.chars().rev().enumerate() {
        let value = c.to_digit(16).ok_or_else(|| {
            crate::Error::syntax(coremask, format!("'{c}' is not a hexadecimal digit"))
        })?;

        let first_lcore = digit_index.saturating_mul(BITS_PER_HEX_DIGIT);

        for bit in 0..BITS_PER_HEX_DIGIT {
            if value & (1 << bit) == 0 {
                continue;
            }

            let index = first_lcore.saturating_add(bit);

            if index >= MAX_LCORE {
                return Err(crate::Error::syntax(
                    coremask,
                    format!("coremask selects logical cores beyond the maximum of {MAX_LCORE}"),
                ));
            }

            let lcore_id = LcoreId::try_from(index).unwrap_or(LcoreId::MAX);

            if !config.entry(lcore_id).is_some_and(LcoreEntry::is_detected) {
                error!(lcore_id, "lcore unavailable");
                return Err(crate::Error::ProcessorNotDetected {
                    processor_id: lcore_id,
                });
            }

            selection.activate(index);
        }
    }

    Ok(selection)
}
