/*!
Encoding primitives for [lexstream](https://docs.rs/lexstream/).

Everything a streaming matcher needs below the level of pattern matching:

- The [`Encoding`] tag set and its textual labels.
- [UTF-8 transcoding helpers](utf8), including the historic 5/6-byte forms
  required to carry the `U+200000` non-character sentinel that replaces
  malformed input. Because that code point lies above `U+10FFFF`, none of
  this crate traffics in `char` or `String`; the canonical stream is octets.
- [Code-page tables](page): 256-entry code-point pages for the single-byte
  encodings, either built in (`cp437`, `cp850`, `cp858`, `ebcdic`) or
  derived from [`encoding_rs`] at construction time.
- UTF-16 [surrogate helpers](utf16) and [byte-order-mark constants](bom).
*/
pub mod page;
pub mod utf8;

/// Code point substituted for malformed input by default. Deliberately
/// outside the Unicode scalar range so it can never collide with decoded
/// text; encoded in UTF-8 it occupies five octets.
pub const NONCHARACTER: u32 = 0x20_0000;

/// Standard replacement character, for callers that prefer `U+FFFD` over
/// [`NONCHARACTER`].
pub const REPLACEMENT: u32 = 0xFFFD;

/// Byte-order marks recognized at the head of file-like sources.
pub mod bom {
    pub const UTF8: [u8; 3] = [0xEF, 0xBB, 0xBF];
    pub const UTF16_BE: [u8; 2] = [0xFE, 0xFF];
    pub const UTF16_LE: [u8; 2] = [0xFF, 0xFE];
    pub const UTF32_BE: [u8; 4] = [0x00, 0x00, 0xFE, 0xFF];
    pub const UTF32_LE: [u8; 4] = [0xFF, 0xFE, 0x00, 0x00];
}

/// UTF-16 surrogate helpers.
pub mod utf16 {
    #[inline]
    pub fn is_high_surrogate(unit: u16) -> bool {
        (0xD800..0xDC00).contains(&unit)
    }

    #[inline]
    pub fn is_low_surrogate(unit: u16) -> bool {
        (0xDC00..0xE000).contains(&unit)
    }

    #[inline]
    pub fn is_surrogate(unit: u16) -> bool {
        (0xD800..0xE000).contains(&unit)
    }

    /// Combines a surrogate pair into its code point. The arguments must
    /// satisfy [`is_high_surrogate`] and [`is_low_surrogate`] respectively.
    #[inline]
    pub fn combine(high: u16, low: u16) -> u32 {
        0x1_0000 + (((high as u32 & 0x3FF) << 10) | (low as u32 & 0x3FF))
    }
}

/// The source encodings a matcher input can be declared (or detected) as.
///
/// `Plain` is raw octets: no transcoding, no validation. Everything else is
/// converted to a canonical UTF-8 octet stream on read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Encoding {
    /// Raw octets, passed through untouched.
    Plain,
    /// UTF-8, validated on read; malformed sequences are replaced.
    Utf8,
    Utf16Be,
    Utf16Le,
    Utf32Be,
    Utf32Le,
    /// ISO-8859-1. The identity page: every byte is its own code point.
    Latin,
    Cp437,
    Cp850,
    Cp858,
    /// EBCDIC, IBM code page 1047.
    Ebcdic,
    Cp1250,
    Cp1251,
    Cp1252,
    Cp1253,
    Cp1254,
    Cp1255,
    Cp1256,
    Cp1257,
    Cp1258,
    Iso8859_2,
    Iso8859_3,
    Iso8859_4,
    Iso8859_5,
    Iso8859_6,
    Iso8859_7,
    Iso8859_8,
    Iso8859_9,
    Iso8859_10,
    Iso8859_11,
    Iso8859_13,
    Iso8859_14,
    Iso8859_15,
    Iso8859_16,
    MacRoman,
    Koi8R,
    Koi8U,
    Koi8Ru,
    /// A caller-supplied 256-entry code-point page.
    Custom,
}

impl Encoding {
    /// Parses a textual encoding label. Labels are matched
    /// case-insensitively with `-` and `_` treated alike.
    pub fn from_label(label: &str) -> Option<Encoding> {
        let label = label
            .chars()
            .map(|c| match c {
                '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect::<String>();
        use Encoding::*;
        Some(match label.as_str() {
            "plain" | "binary" => Plain,
            "utf8" | "utf_8" => Utf8,
            "utf16be" | "utf_16be" => Utf16Be,
            "utf16le" | "utf_16le" | "utf16" | "utf_16" => Utf16Le,
            "utf32be" | "utf_32be" => Utf32Be,
            "utf32le" | "utf_32le" | "utf32" | "utf_32" => Utf32Le,
            "latin" | "latin1" | "iso8859_1" => Latin,
            "cp437" => Cp437,
            "cp850" => Cp850,
            "cp858" => Cp858,
            "ebcdic" | "cp1047" => Ebcdic,
            "cp1250" => Cp1250,
            "cp1251" => Cp1251,
            "cp1252" => Cp1252,
            "cp1253" => Cp1253,
            "cp1254" => Cp1254,
            "cp1255" => Cp1255,
            "cp1256" => Cp1256,
            "cp1257" => Cp1257,
            "cp1258" => Cp1258,
            "iso8859_2" => Iso8859_2,
            "iso8859_3" => Iso8859_3,
            "iso8859_4" => Iso8859_4,
            "iso8859_5" => Iso8859_5,
            "iso8859_6" => Iso8859_6,
            "iso8859_7" => Iso8859_7,
            "iso8859_8" => Iso8859_8,
            "iso8859_9" => Iso8859_9,
            "iso8859_10" => Iso8859_10,
            "iso8859_11" => Iso8859_11,
            "iso8859_13" => Iso8859_13,
            "iso8859_14" => Iso8859_14,
            "iso8859_15" => Iso8859_15,
            "iso8859_16" => Iso8859_16,
            "macroman" | "macintosh" => MacRoman,
            "koi8_r" | "koi8r" => Koi8R,
            "koi8_u" | "koi8u" => Koi8U,
            "koi8_ru" | "koi8ru" => Koi8Ru,
            "custom" => Custom,
            _ => return None,
        })
    }

    /// Size in octets of one source code unit.
    #[inline]
    pub fn code_unit_len(self) -> usize {
        use Encoding::*;
        match self {
            Utf16Be | Utf16Le => 2,
            Utf32Be | Utf32Le => 4,
            _ => 1,
        }
    }

    /// True for the UTF-16/32 encodings whose code units are wider than one
    /// octet.
    #[inline]
    pub fn is_wide(self) -> bool {
        self.code_unit_len() > 1
    }

    /// True when the encoding maps single octets through a 256-entry page.
    pub fn is_byte_page(self) -> bool {
        !matches!(
            self,
            Encoding::Plain
                | Encoding::Utf8
                | Encoding::Utf16Be
                | Encoding::Utf16Le
                | Encoding::Utf32Be
                | Encoding::Utf32Le
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(Encoding::from_label("UTF-8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::from_label("ISO-8859-15"), Some(Encoding::Iso8859_15));
        assert_eq!(Encoding::from_label("KOI8-RU"), Some(Encoding::Koi8Ru));
        assert_eq!(Encoding::from_label("macintosh"), Some(Encoding::MacRoman));
        assert_eq!(Encoding::from_label("no-such"), None);
    }

    #[test]
    fn code_units() {
        assert_eq!(Encoding::Utf8.code_unit_len(), 1);
        assert_eq!(Encoding::Utf16Be.code_unit_len(), 2);
        assert_eq!(Encoding::Utf32Le.code_unit_len(), 4);
        assert!(!Encoding::Utf8.is_byte_page());
        assert!(Encoding::Cp437.is_byte_page());
        assert!(Encoding::Latin.is_byte_page());
    }

    #[test]
    fn surrogates() {
        assert!(utf16::is_high_surrogate(0xD83D));
        assert!(utf16::is_low_surrogate(0xDE00));
        assert_eq!(utf16::combine(0xD83D, 0xDE00), 0x1F600);
        assert_eq!(utf16::combine(0xD800, 0xDC00), 0x1_0000);
    }
}
