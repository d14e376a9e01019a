//! 256-entry code-point pages for the single-byte encodings.
//!
//! A page maps every source octet to the code point it denotes; the input
//! layer then emits that code point as UTF-8. Pages for the DOS and EBCDIC
//! code pages are built in; the ISO-8859 / Windows-125x / KOI8 / MacRoman
//! family is derived from [`encoding_rs`] one octet at a time, which keeps
//! the hot path table-driven while delegating the mappings themselves.
//! Octets an encoding leaves unmapped keep the decoder's replacement value
//! and pass through as-is.

use crate::Encoding;

/// High half (`0x80..=0xFF`) of IBM code page 437.
const CP437_HI: [u16; 128] = [
    0x00C7, 0x00FC, 0x00E9, 0x00E2, 0x00E4, 0x00E0, 0x00E5, 0x00E7, //
    0x00EA, 0x00EB, 0x00E8, 0x00EF, 0x00EE, 0x00EC, 0x00C4, 0x00C5, //
    0x00C9, 0x00E6, 0x00C6, 0x00F4, 0x00F6, 0x00F2, 0x00FB, 0x00F9, //
    0x00FF, 0x00D6, 0x00DC, 0x00A2, 0x00A3, 0x00A5, 0x20A7, 0x0192, //
    0x00E1, 0x00ED, 0x00F3, 0x00FA, 0x00F1, 0x00D1, 0x00AA, 0x00BA, //
    0x00BF, 0x2310, 0x00AC, 0x00BD, 0x00BC, 0x00A1, 0x00AB, 0x00BB, //
    0x2591, 0x2592, 0x2593, 0x2502, 0x2524, 0x2561, 0x2562, 0x2556, //
    0x2555, 0x2563, 0x2551, 0x2557, 0x255D, 0x255C, 0x255B, 0x2510, //
    0x2514, 0x2534, 0x252C, 0x251C, 0x2500, 0x253C, 0x255E, 0x255F, //
    0x255A, 0x2554, 0x2569, 0x2566, 0x2560, 0x2550, 0x256C, 0x2567, //
    0x2568, 0x2564, 0x2565, 0x2559, 0x2558, 0x2552, 0x2553, 0x256B, //
    0x256A, 0x2518, 0x250C, 0x2588, 0x2584, 0x258C, 0x2590, 0x2580, //
    0x03B1, 0x00DF, 0x0393, 0x03C0, 0x03A3, 0x03C3, 0x00B5, 0x03C4, //
    0x03A6, 0x0398, 0x03A9, 0x03B4, 0x221E, 0x03C6, 0x03B5, 0x2229, //
    0x2261, 0x00B1, 0x2265, 0x2264, 0x2320, 0x2321, 0x00F7, 0x2248, //
    0x00B0, 0x2219, 0x00B7, 0x221A, 0x207F, 0x00B2, 0x25A0, 0x00A0, //
];

/// High half of IBM code page 850. Code page 858 is identical except that
/// `0xD5` is `€` instead of `ı`.
const CP850_HI: [u16; 128] = [
    0x00C7, 0x00FC, 0x00E9, 0x00E2, 0x00E4, 0x00E0, 0x00E5, 0x00E7, //
    0x00EA, 0x00EB, 0x00E8, 0x00EF, 0x00EE, 0x00EC, 0x00C4, 0x00C5, //
    0x00C9, 0x00E6, 0x00C6, 0x00F4, 0x00F6, 0x00F2, 0x00FB, 0x00F9, //
    0x00FF, 0x00D6, 0x00DC, 0x00F8, 0x00A3, 0x00D8, 0x00D7, 0x0192, //
    0x00E1, 0x00ED, 0x00F3, 0x00FA, 0x00F1, 0x00D1, 0x00AA, 0x00BA, //
    0x00BF, 0x00AE, 0x00AC, 0x00BD, 0x00BC, 0x00A1, 0x00AB, 0x00BB, //
    0x2591, 0x2592, 0x2593, 0x2502, 0x2524, 0x00C1, 0x00C2, 0x00C0, //
    0x00A9, 0x2563, 0x2551, 0x2557, 0x255D, 0x00A2, 0x00A5, 0x2510, //
    0x2514, 0x2534, 0x252C, 0x251C, 0x2500, 0x253C, 0x00E3, 0x00C3, //
    0x255A, 0x2554, 0x2569, 0x2566, 0x2560, 0x2550, 0x256C, 0x00A4, //
    0x00F0, 0x00D0, 0x00CA, 0x00CB, 0x00C8, 0x0131, 0x00CD, 0x00CE, //
    0x00CF, 0x2518, 0x250C, 0x2588, 0x2584, 0x00A6, 0x00CC, 0x2580, //
    0x00D3, 0x00DF, 0x00D4, 0x00D2, 0x00F5, 0x00D5, 0x00B5, 0x00FE, //
    0x00DE, 0x00DA, 0x00DB, 0x00D9, 0x00FD, 0x00DD, 0x00AF, 0x00B4, //
    0x00AD, 0x00B1, 0x2017, 0x00BE, 0x00B6, 0x00A7, 0x00F7, 0x00B8, //
    0x00B0, 0x00A8, 0x00B7, 0x00B9, 0x00B3, 0x00B2, 0x25A0, 0x00A0, //
];

/// IBM code page 1047 (EBCDIC) to ISO-8859-1, the full 256 octets.
const EBCDIC_1047: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x9C, 0x09, 0x86, 0x7F, //
    0x97, 0x8D, 0x8E, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, //
    0x10, 0x11, 0x12, 0x13, 0x9D, 0x85, 0x08, 0x87, //
    0x18, 0x19, 0x92, 0x8F, 0x1C, 0x1D, 0x1E, 0x1F, //
    0x80, 0x81, 0x82, 0x83, 0x84, 0x0A, 0x17, 0x1B, //
    0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x05, 0x06, 0x07, //
    0x90, 0x91, 0x16, 0x93, 0x94, 0x95, 0x96, 0x04, //
    0x98, 0x99, 0x9A, 0x9B, 0x14, 0x15, 0x9E, 0x1A, //
    0x20, 0xA0, 0xE2, 0xE4, 0xE0, 0xE1, 0xE3, 0xE5, //
    0xE7, 0xF1, 0xA2, 0x2E, 0x3C, 0x28, 0x2B, 0x7C, //
    0x26, 0xE9, 0xEA, 0xEB, 0xE8, 0xED, 0xEE, 0xEF, //
    0xEC, 0xDF, 0x21, 0x24, 0x2A, 0x29, 0x3B, 0x5E, //
    0x2D, 0x2F, 0xC2, 0xC4, 0xC0, 0xC1, 0xC3, 0xC5, //
    0xC7, 0xD1, 0xA6, 0x2C, 0x25, 0x5F, 0x3E, 0x3F, //
    0xF8, 0xC9, 0xCA, 0xCB, 0xC8, 0xCD, 0xCE, 0xCF, //
    0xCC, 0x60, 0x3A, 0x23, 0x40, 0x27, 0x3D, 0x22, //
    0xD8, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, //
    0x68, 0x69, 0xAB, 0xBB, 0xF0, 0xFD, 0xFE, 0xB1, //
    0xB0, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, //
    0x71, 0x72, 0xAA, 0xBA, 0xE6, 0xB8, 0xC6, 0xA4, //
    0xB5, 0x7E, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, //
    0x79, 0x7A, 0xA1, 0xBF, 0xD0, 0x5B, 0xDE, 0xAE, //
    0xAC, 0xA3, 0xA5, 0xB7, 0xA9, 0xA7, 0xB6, 0xBC, //
    0xBD, 0xBE, 0xDD, 0xA8, 0xAF, 0x5D, 0xB4, 0xD7, //
    0x7B, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, //
    0x48, 0x49, 0xAD, 0xF4, 0xF6, 0xF2, 0xF3, 0xF5, //
    0x7D, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F, 0x50, //
    0x51, 0x52, 0xB9, 0xFB, 0xFC, 0xF9, 0xFA, 0xFF, //
    0x5C, 0xF7, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, //
    0x59, 0x5A, 0xB2, 0xD4, 0xD6, 0xD2, 0xD3, 0xD5, //
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, //
    0x38, 0x39, 0xB3, 0xDB, 0xDC, 0xD9, 0xDA, 0x9F, //
];

fn with_ascii_low(hi: &[u16; 128]) -> [u32; 256] {
    let mut table = [0u32; 256];
    for (b, slot) in table.iter_mut().enumerate() {
        *slot = if b < 0x80 {
            b as u32
        } else {
            hi[b - 0x80] as u32
        };
    }
    table
}

fn from_encoding_rs(encoding: &'static encoding_rs::Encoding) -> [u32; 256] {
    let mut table = [0u32; 256];
    for (b, slot) in table.iter_mut().enumerate() {
        let bytes = [b as u8];
        let (decoded, _) = encoding.decode_without_bom_handling(&bytes);
        // Single-byte encodings decode one octet to exactly one code point
        // (U+FFFD where the page has a hole).
        *slot = decoded.chars().next().map_or(b as u32, |c| c as u32);
    }
    table
}

fn label_of(encoding: Encoding) -> Option<&'static [u8]> {
    use Encoding::*;
    Some(match encoding {
        Cp1250 => b"windows-1250",
        Cp1251 => b"windows-1251",
        Cp1252 => b"windows-1252",
        Cp1253 => b"windows-1253",
        Cp1254 => b"windows-1254",
        Cp1255 => b"windows-1255",
        Cp1256 => b"windows-1256",
        Cp1257 => b"windows-1257",
        Cp1258 => b"windows-1258",
        Iso8859_2 => b"iso-8859-2",
        Iso8859_3 => b"iso-8859-3",
        Iso8859_4 => b"iso-8859-4",
        Iso8859_5 => b"iso-8859-5",
        Iso8859_6 => b"iso-8859-6",
        Iso8859_7 => b"iso-8859-7",
        Iso8859_8 => b"iso-8859-8",
        // encoding_rs resolves these two labels to their windows supersets,
        // which is the mapping we want for whole-octet pages.
        Iso8859_9 => b"iso-8859-9",
        Iso8859_10 => b"iso-8859-10",
        Iso8859_11 => b"iso-8859-11",
        Iso8859_13 => b"iso-8859-13",
        Iso8859_14 => b"iso-8859-14",
        Iso8859_15 => b"iso-8859-15",
        Iso8859_16 => b"iso-8859-16",
        MacRoman => b"macintosh",
        Koi8R => b"koi8-r",
        Koi8U | Koi8Ru => b"koi8-u",
        _ => return None,
    })
}

/// Returns the 256-entry code-point page for `encoding`, or `None` for the
/// multi-octet and `Plain`/`Utf8`/`Custom` encodings.
pub fn table(encoding: Encoding) -> Option<[u32; 256]> {
    use Encoding::*;
    match encoding {
        Latin => {
            let mut t = [0u32; 256];
            for (b, slot) in t.iter_mut().enumerate() {
                *slot = b as u32;
            }
            Some(t)
        }
        Cp437 => Some(with_ascii_low(&CP437_HI)),
        Cp850 => Some(with_ascii_low(&CP850_HI)),
        Cp858 => {
            let mut t = with_ascii_low(&CP850_HI);
            t[0xD5] = 0x20AC;
            Some(t)
        }
        Ebcdic => {
            let mut t = [0u32; 256];
            for (b, slot) in t.iter_mut().enumerate() {
                *slot = EBCDIC_1047[b] as u32;
            }
            Some(t)
        }
        Koi8Ru => {
            let encoding = encoding_rs::Encoding::for_label(b"koi8-u")?;
            let mut t = from_encoding_rs(encoding);
            // KOI8-RU swaps in the Byelorussian short U.
            t[0xAE] = 0x045E;
            t[0xBE] = 0x040E;
            Some(t)
        }
        _ => {
            let label = label_of(encoding)?;
            encoding_rs::Encoding::for_label(label).map(from_encoding_rs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_low_halves() {
        for enc in [
            Encoding::Latin,
            Encoding::Cp437,
            Encoding::Cp850,
            Encoding::Cp858,
            Encoding::Cp1252,
            Encoding::Koi8R,
        ] {
            let t = table(enc).unwrap();
            for b in 0..0x80u32 {
                assert_eq!(t[b as usize], b, "{enc:?} low half must be ASCII");
            }
        }
    }

    #[test]
    fn cp437_spot_checks() {
        let t = table(Encoding::Cp437).unwrap();
        assert_eq!(t[0x82], 0xE9); // é
        assert_eq!(t[0xE1], 0xDF); // ß
        assert_eq!(t[0xB0], 0x2591); // ░
        assert_eq!(t[0xFF], 0xA0); // NBSP
    }

    #[test]
    fn cp858_euro() {
        let t850 = table(Encoding::Cp850).unwrap();
        let t858 = table(Encoding::Cp858).unwrap();
        assert_eq!(t850[0xD5], 0x0131);
        assert_eq!(t858[0xD5], 0x20AC);
        for b in (0..256).filter(|&b| b != 0xD5) {
            assert_eq!(t850[b], t858[b]);
        }
    }

    #[test]
    fn ebcdic_spot_checks() {
        let t = table(Encoding::Ebcdic).unwrap();
        assert_eq!(t[0x40], 0x20); // space
        assert_eq!(t[0x81], b'a' as u32);
        assert_eq!(t[0xC1], b'A' as u32);
        assert_eq!(t[0xF0], b'0' as u32);
        assert_eq!(t[0x25], 0x0A); // LF
        assert_eq!(t[0xAD], b'[' as u32);
        assert_eq!(t[0xBD], b']' as u32);
    }

    #[test]
    fn derived_pages() {
        let t = table(Encoding::Iso8859_5).unwrap();
        assert_eq!(t[0xB0], 0x0420); // Cyrillic capital ER
        let t = table(Encoding::Cp1252).unwrap();
        assert_eq!(t[0x80], 0x20AC); // €
        let t = table(Encoding::Iso8859_15).unwrap();
        assert_eq!(t[0xA4], 0x20AC); // €
    }

    #[test]
    fn koi8_ru_patch() {
        let u = table(Encoding::Koi8U).unwrap();
        let ru = table(Encoding::Koi8Ru).unwrap();
        assert_eq!(ru[0xAE], 0x045E);
        assert_eq!(ru[0xBE], 0x040E);
        assert_ne!(u[0xAE], ru[0xAE]);
    }

    #[test]
    fn wide_encodings_have_no_page() {
        assert!(table(Encoding::Utf8).is_none());
        assert!(table(Encoding::Utf16Le).is_none());
        assert!(table(Encoding::Plain).is_none());
        assert!(table(Encoding::Custom).is_none());
    }
}
