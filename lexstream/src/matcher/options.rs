//! Matcher option strings.
//!
//! `reset()` accepts a short option string of the form
//! `(A|N|X|W|T(=digit)?|;)*`. Unknown characters are ignored for
//! compatibility with older option strings.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Flags: u8 {
        /// `A`: include the terminating newline in FIND matches.
        const NEWLINE = 1 << 0;
        /// `N`: permit empty matches.
        const NULLABLE = 1 << 1;
        /// `X`: accept only empty lines (line matcher).
        const EMPTY_LINES = 1 << 2;
        /// `W`: FIND accepts only matches falling on word boundaries.
        const WORDS = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    pub flags: Flags,
    /// Tab width for column counting.
    pub tab: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            flags: Flags::empty(),
            tab: 8,
        }
    }
}

impl Options {
    pub fn parse(spec: &str) -> Options {
        let mut options = Options::default();
        let mut chars = spec.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                'A' => options.flags |= Flags::NEWLINE,
                'N' => options.flags |= Flags::NULLABLE,
                'X' => options.flags |= Flags::EMPTY_LINES,
                'W' => options.flags |= Flags::WORDS,
                'T' => {
                    if chars.peek() == Some(&'=') {
                        chars.next();
                    }
                    if let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                        chars.next();
                        if d > 0 {
                            options.tab = d as usize;
                        }
                    }
                }
                // Separators and unknown characters are ignored.
                _ => {}
            }
        }
        options
    }

    #[inline]
    pub fn has(&self, flags: Flags) -> bool {
        self.flags.contains(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_combinations() {
        let o = Options::parse("AN;");
        assert!(o.has(Flags::NEWLINE));
        assert!(o.has(Flags::NULLABLE));
        assert_eq!(o.tab, 8);

        let o = Options::parse("T=4");
        assert_eq!(o.tab, 4);
        let o = Options::parse("T2");
        assert_eq!(o.tab, 2);

        let o = Options::parse("XW");
        assert!(o.has(Flags::EMPTY_LINES));
        assert!(o.has(Flags::WORDS));
    }

    #[test]
    fn unknown_characters_are_ignored() {
        let o = Options::parse("zA?q;N%");
        assert!(o.has(Flags::NEWLINE));
        assert!(o.has(Flags::NULLABLE));
    }

    #[test]
    fn zero_tab_is_rejected() {
        assert_eq!(Options::parse("T=0").tab, 8);
    }
}
