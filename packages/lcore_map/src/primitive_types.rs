/// Identifies a logical core, the execution unit index used by the runtime itself.
///
/// Logical cores are numbered independently from the processors of the host. The mapping from
/// logical cores to processors is what the expressions parsed by this package describe.
pub type LcoreId = u32;

/// Identifies a processor of the host, matching the numeric identifier used by standard tooling of
/// the operating system.
pub type CpuId = u32;

/// Upper bound (exclusive) of the logical core domain.
pub const MAX_LCORE: usize = 128;

/// Upper bound (exclusive) of the processor domain.
pub const MAX_CPU: usize = 128;

/// Whether a logical core takes part in the runtime.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, derive_more::Display)]
#[expect(
    clippy::exhaustive_enums,
    reason = "a logical core is either used by the runtime or it is not"
)]
pub enum LcoreRole {
    /// The logical core is not used.
    #[default]
    #[display("off")]
    Off,

    /// The logical core runs a runtime thread.
    #[display("active")]
    Active,
}

/// Blanks are space and horizontal tab. Newlines are not blanks.
pub(crate) const fn is_blank(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn default_role_is_off() {
        assert_eq!(LcoreRole::default(), LcoreRole::Off);
    }

    #[test]
    fn role_display() {
        assert_eq!(LcoreRole::Off.to_string(), "off");
        assert_eq!(LcoreRole::Active.to_string(), "active");
    }

    #[test]
    fn blanks() {
        assert!(is_blank(b' '));
        assert!(is_blank(b'\t'));
        assert!(!is_blank(b'\n'));
        assert!(!is_blank(b'0'));
    }
}
