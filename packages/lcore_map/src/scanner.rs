use crate::primitive_types::is_blank;

/// Byte cursor over an option value.
///
/// The grammars only ever advance over ASCII bytes, so every position the cursor stops at is a
/// valid `str` boundary.
#[derive(Clone, Debug)]
pub(crate) struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub(crate) fn next_is(&self, expected: u8) -> bool {
        self.peek() == Some(expected)
    }

    pub(crate) fn next_is_digit(&self) -> bool {
        self.peek().is_some_and(|c| c.is_ascii_digit())
    }

    /// Advances past one byte. The caller must have seen an ASCII byte via `peek()`.
    pub(crate) fn bump(&mut self) {
        if !self.is_at_end() {
            self.pos = self.pos.saturating_add(1);
        }
    }

    pub(crate) fn skip_blanks(&mut self) {
        while self.peek().is_some_and(is_blank) {
            self.bump();
        }
    }

    /// The unconsumed remainder of the text.
    pub(crate) fn rest(&self) -> &'a str {
        self.text.get(self.pos..).unwrap_or_default()
    }

    /// The text from `start` to the end, regardless of the current position.
    pub(crate) fn tail_from(&self, start: usize) -> &'a str {
        self.text.get(start..).unwrap_or_default()
    }

    /// The text between `start` and the current position.
    pub(crate) fn since(&self, start: usize) -> &'a str {
        self.text.get(start..self.pos).unwrap_or_default()
    }

    /// Parses an unsigned decimal integer at the cursor. At least one digit is required.
    pub(crate) fn parse_uint(&mut self) -> crate::Result<u64> {
        let start = self.pos;

        if !self.next_is_digit() {
            return Err(crate::Error::syntax(
                self.rest(),
                "expected a decimal number",
            ));
        }

        let mut value: u64 = 0;

        while let Some(c) = self.peek().filter(u8::is_ascii_digit) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(c.wrapping_sub(b'0'))))
                .ok_or_else(|| {
                    crate::Error::syntax(
                        self.text.get(start..).unwrap_or_default(),
                        "number is too large",
                    )
                })?;

            self.bump();
        }

        Ok(value)
    }

    /// Parses an unsigned decimal integer and requires it to be below `limit`.
    pub(crate) fn parse_index(&mut self, limit: usize) -> crate::Result<usize> {
        let value = self.parse_uint()?;

        usize::try_from(value)
            .ok()
            .filter(|index| *index < limit)
            .ok_or(crate::Error::IndexOutOfRange {
                index: value,
                limit,
            })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parse_uint_stops_at_non_digit() {
        let mut scanner = Scanner::new("123-4");

        assert_eq!(scanner.parse_uint().unwrap(), 123);
        assert_eq!(scanner.pos(), 3);
        assert!(scanner.next_is(b'-'));
        assert_eq!(scanner.rest(), "-4");
    }

    #[test]
    fn parse_uint_requires_digit() {
        let mut scanner = Scanner::new("x1");

        scanner.parse_uint().unwrap_err();
        assert_eq!(scanner.pos(), 0);
    }

    #[test]
    fn parse_uint_overflow_is_error() {
        let mut scanner = Scanner::new("99999999999999999999999");

        scanner.parse_uint().unwrap_err();
    }

    #[test]
    fn parse_index_checks_limit() {
        assert_eq!(Scanner::new("7").parse_index(8).unwrap(), 7);

        assert!(matches!(
            Scanner::new("8").parse_index(8),
            Err(crate::Error::IndexOutOfRange { index: 8, limit: 8 })
        ));
    }

    #[test]
    fn skip_blanks_only_skips_space_and_tab() {
        let mut scanner = Scanner::new(" \t\n1");

        scanner.skip_blanks();
        assert_eq!(scanner.pos(), 2);
        assert!(scanner.next_is(b'\n'));
    }

    #[test]
    fn since_returns_consumed_text() {
        let mut scanner = Scanner::new("12,3");
        scanner.parse_uint().unwrap();

        assert_eq!(scanner.since(0), "12");
    }

    #[test]
    fn bump_at_end_is_noop() {
        let mut scanner = Scanner::new("");

        scanner.bump();
        assert!(scanner.is_at_end());
        assert_eq!(scanner.peek(), None);
    }
}
