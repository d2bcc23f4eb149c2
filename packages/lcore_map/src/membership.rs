//! The set grammar shared by every option that selects logical cores or processors.
//!
//! A set is written as one of three token kinds:
//!
//! * a single index (`9`)
//! * an inclusive range of indexes (`2-6`, endpoints in either order)
//! * a group of single indexes and ranges in parentheses (`(0,2-4,6)`)
//!
//! Blanks are allowed around the token and around the numbers inside it. The token must be
//! followed by `,`, `@` or the end of the input.

use std::fmt::{self, Display};
use std::ops::RangeInclusive;

use itertools::Itertools;

use crate::scanner::Scanner;

/// Selection of indexes in a bounded domain `[0, domain)`, produced by parsing one set token.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MembershipSet {
    members: Box<[bool]>,
}

impl MembershipSet {
    /// Creates an empty set over the domain `[0, domain)`.
    #[must_use]
    pub fn new(domain: usize) -> Self {
        Self {
            members: vec![false; domain].into_boxed_slice(),
        }
    }

    /// The exclusive upper bound of the indexes this set can hold.
    #[must_use]
    pub fn domain(&self) -> usize {
        self.members.len()
    }

    /// Whether `index` is a member. Indexes outside the domain are never members.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.members.get(index).copied().unwrap_or(false)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.iter().filter(|m| **m).count()
    }

    /// Whether the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.members.iter().any(|m| *m)
    }

    /// Iterates over the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.members
            .iter()
            .enumerate()
            .filter_map(|(index, member)| member.then_some(index))
    }

    // Both endpoints must already be validated against the domain.
    fn insert_range(&mut self, range: RangeInclusive<usize>) {
        for member in self.members.get_mut(range).into_iter().flatten() {
            *member = true;
        }
    }
}

impl Display for MembershipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.iter().join(","))
    }
}

/// Which of the three token kinds a set was written as.
///
/// The lcores option gives a bare index or range different default affinity than a group.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "the grammar has exactly these three token kinds"
)]
pub enum SetKind {
    /// `<uint>`
    Single,

    /// `<uint> '-' <uint>`
    Range,

    /// `'(' <elem> (',' <elem>)* ')'`
    Group,
}

/// Result of parsing one set token from the start of a string.
#[derive(Clone, Debug)]
pub struct ParsedSet {
    set: MembershipSet,
    kind: SetKind,
    consumed: usize,
}

impl ParsedSet {
    /// The selected indexes.
    #[must_use]
    pub fn set(&self) -> &MembershipSet {
        &self.set
    }

    /// Which token kind the set was written as.
    #[must_use]
    pub fn kind(&self) -> SetKind {
        self.kind
    }

    /// Number of bytes of input consumed, including surrounding blanks. The byte at this offset
    /// (if any) is the separator that terminated the token.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Takes the selected indexes, discarding the parse metadata.
    #[must_use]
    pub fn into_set(self) -> MembershipSet {
        self.set
    }
}

/// Parses one set token from the start of `input`, selecting from `[0, domain)`.
///
/// Parsing stops at the first `,` or `@` that follows the token; the remainder is left for the
/// caller, who can resume after [`ParsedSet::consumed()`] bytes.
///
/// # Errors
///
/// Fails if the input is empty or blank, does not start with a digit or `(`, contains a malformed
/// number, selects an index `>= domain`, chains ranges (`1-2-3`), leaves a group unterminated or
/// is followed by anything other than `,`, `@` or the end of the input.
///
/// # Example
///
/// ```
/// use lcore_map::{SetKind, parse_set};
///
/// let parsed = parse_set("(1,3-4)@5", 8).unwrap();
///
/// assert_eq!(parsed.kind(), SetKind::Group);
/// assert_eq!(parsed.set().iter().collect::<Vec<_>>(), vec![1, 3, 4]);
/// assert_eq!(parsed.consumed(), 7);
/// ```
pub fn parse_set(input: &str, domain: usize) -> crate::Result<ParsedSet> {
    let mut scanner = Scanner::new(input);
    let (set, kind) = parse_set_token(&mut scanner, domain)?;

    Ok(ParsedSet {
        set,
        kind,
        consumed: scanner.pos(),
    })
}

/// Parses one set token at the scanner position, leaving the scanner at the separator.
pub(crate) fn parse_set_token(
    scanner: &mut Scanner<'_>,
    domain: usize,
) -> crate::Result<(MembershipSet, SetKind)> {
    let start = scanner.pos();
    scanner.skip_blanks();

    let mut set = MembershipSet::new(domain);

    let kind = match scanner.peek() {
        Some(b'(') => {
            parse_group(scanner, &mut set)?;
            SetKind::Group
        }
        Some(c) if c.is_ascii_digit() => {
            let (range, kind) = parse_element(scanner, domain)?;
            set.insert_range(range);
            kind
        }
        Some(_) => {
            return Err(crate::Error::syntax(
                scanner.tail_from(start),
                "a set must start with a digit or '('",
            ));
        }
        None => {
            return Err(crate::Error::syntax(
                scanner.tail_from(start),
                "a set must not be empty",
            ));
        }
    };

    scanner.skip_blanks();

    match scanner.peek() {
        None | Some(b',' | b'@') => Ok((set, kind)),
        Some(b'-') => Err(crate::Error::syntax(
            scanner.tail_from(start),
            "a range cannot be extended with another '-'",
        )),
        Some(_) => Err(crate::Error::syntax(
            scanner.tail_from(start),
            "a set must be followed by ',', '@' or the end of the value",
        )),
    }
}

/// NUMBER or RANGE, returned as an inclusive range in ascending order.
fn parse_element(
    scanner: &mut Scanner<'_>,
    domain: usize,
) -> crate::Result<(RangeInclusive<usize>, SetKind)> {
    let first = scanner.parse_index(domain)?;
    scanner.skip_blanks();

    if !scanner.next_is(b'-') {
        return Ok((first..=first, SetKind::Single));
    }

    scanner.bump();
    scanner.skip_blanks();

    if !scanner.next_is_digit() {
        return Err(crate::Error::syntax(
            scanner.rest(),
            "a range must end with a number",
        ));
    }

    let last = scanner.parse_index(domain)?;
    scanner.skip_blanks();

    Ok((first.min(last)..=first.max(last), SetKind::Range))
}

/// GROUP: `'(' <elem> (',' <elem>)* ')'`. The scanner is positioned at the opening bracket.
fn parse_group(scanner: &mut Scanner<'_>, set: &mut MembershipSet) -> crate::Result<()> {
    let start = scanner.pos();
    scanner.bump();

    loop {
        scanner.skip_blanks();

        if !scanner.next_is_digit() {
            return Err(crate::Error::syntax(
                scanner.tail_from(start),
                "every element of a group must start with a digit",
            ));
        }

        let (range, _) = parse_element(scanner, set.domain())?;
        set.insert_range(range);

        match scanner.peek() {
            Some(b',') => scanner.bump(),
            Some(b')') => {
                scanner.bump();
                return Ok(());
            }
            Some(b'-') => {
                return Err(crate::Error::syntax(
                    scanner.tail_from(start),
                    "a range cannot be extended with another '-'",
                ));
            }
            None => {
                return Err(crate::Error::syntax(
                    scanner.tail_from(start),
                    "group is missing the closing ')'",
                ));
            }
            Some(_) => {
                return Err(crate::Error::syntax(
                    scanner.tail_from(start),
                    "group elements must be separated by ','",
                ));
            }
        }
    }
}
