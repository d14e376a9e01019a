//! Stateless transcoding steps from source code units to canonical UTF-8.
//!
//! Each routine consumes whole code units only: a unit (or surrogate pair)
//! whose UTF-8 form does not fit in `dst`, or whose trailing octets have
//! not arrived yet, is left unconsumed. The caller carries unconsumed
//! octets into the next call and passes `eof = true` once the source is
//! exhausted, at which point dangling prefixes are replaced with the
//! sentinel instead of being carried forever.

use lexstream_encoding::{utf16, utf8};

/// Room `dst` must have before we commit to consuming another unit.
/// The sentinel may occupy five octets; six covers every encodable form.
const MAX_SEQ: usize = 6;

pub(crate) struct ByteDecoder {
    /// Single-byte page, when the encoding maps octets through one.
    pub page: Option<Box<[u32; 256]>>,
    /// Replacement for malformed input; `NONCHARACTER` unless the input
    /// was configured for `U+FFFD`.
    pub sentinel: u32,
    /// Cleared the first time malformed UTF-8 is replaced.
    pub valid: bool,
}

impl ByteDecoder {
    /// Copies `src` to `dst` verbatim. `Plain` sources and in-memory
    /// `&str` origins take this path.
    pub fn run_raw(src: &[u8], dst: &mut [u8]) -> (usize, usize) {
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);
        (n, n)
    }

    /// Validates `src` as UTF-8, replacing malformed sequences with the
    /// sentinel. Well-formed runs are copied in bulk.
    pub fn run_utf8(&mut self, src: &[u8], dst: &mut [u8], eof: bool) -> (usize, usize) {
        let (mut consumed, mut written) = (0, 0);
        while consumed < src.len() {
            match utf8::check(&src[consumed..]) {
                Ok(n) => {
                    if written + n > dst.len() {
                        break;
                    }
                    dst[written..written + n].copy_from_slice(&src[consumed..consumed + n]);
                    consumed += n;
                    written += n;
                }
                Err(utf8::CheckError::Incomplete) if !eof => break,
                Err(err) => {
                    if written + MAX_SEQ > dst.len() {
                        break;
                    }
                    let bad = match err {
                        utf8::CheckError::Malformed(n) => n,
                        // A dangling prefix at true EOF.
                        utf8::CheckError::Incomplete => src.len() - consumed,
                    };
                    self.valid = false;
                    written += utf8::encode(self.sentinel, &mut dst[written..]);
                    consumed += bad;
                }
            }
        }
        (consumed, written)
    }

    /// Maps each octet through the 256-entry page.
    pub fn run_page(&mut self, src: &[u8], dst: &mut [u8]) -> (usize, usize) {
        let page = self.page.as_deref().expect("page encoding without a page");
        let (mut consumed, mut written) = (0, 0);
        for &b in src {
            let cp = page[b as usize];
            if written + utf8::len(cp) > dst.len() {
                break;
            }
            written += utf8::encode(cp, &mut dst[written..]);
            consumed += 1;
        }
        (consumed, written)
    }

    /// Decodes UTF-16 octet pairs. A lone high surrogate waits for its
    /// partner across calls (the pair may be split by the source); lone or
    /// inverted surrogates become the sentinel.
    pub fn run_utf16(
        &mut self,
        src: &[u8],
        dst: &mut [u8],
        big_endian: bool,
        eof: bool,
    ) -> (usize, usize) {
        let (mut consumed, mut written) = (0, 0);
        loop {
            if written + MAX_SEQ > dst.len() {
                break;
            }
            let rest = &src[consumed..];
            let Some(unit) = take_u16(rest, big_endian) else {
                if eof && !rest.is_empty() {
                    // Trailing half of a code unit.
                    written += utf8::encode(self.sentinel, &mut dst[written..]);
                    consumed = src.len();
                }
                break;
            };
            if utf16::is_high_surrogate(unit) {
                let Some(low) = take_u16(&rest[2..], big_endian) else {
                    if eof {
                        if rest.len() > 2 {
                            // High surrogate plus half a unit.
                            written += utf8::encode(self.sentinel, &mut dst[written..]);
                            consumed = src.len();
                        } else {
                            written += utf8::encode(self.sentinel, &mut dst[written..]);
                            consumed += 2;
                        }
                    }
                    break;
                };
                if utf16::is_low_surrogate(low) {
                    written += utf8::encode(utf16::combine(unit, low), &mut dst[written..]);
                    consumed += 4;
                } else {
                    written += utf8::encode(self.sentinel, &mut dst[written..]);
                    consumed += 2;
                }
            } else if utf16::is_low_surrogate(unit) {
                written += utf8::encode(self.sentinel, &mut dst[written..]);
                consumed += 2;
            } else {
                written += utf8::encode(unit as u32, &mut dst[written..]);
                consumed += 2;
            }
        }
        (consumed, written)
    }

    /// Decodes UTF-32 octet quadruples. Surrogate code points become the
    /// sentinel; out-of-range values pass through in the historic forms.
    pub fn run_utf32(
        &mut self,
        src: &[u8],
        dst: &mut [u8],
        big_endian: bool,
        eof: bool,
    ) -> (usize, usize) {
        let (mut consumed, mut written) = (0, 0);
        loop {
            if written + MAX_SEQ > dst.len() {
                break;
            }
            let rest = &src[consumed..];
            if rest.len() < 4 {
                if eof && !rest.is_empty() {
                    written += utf8::encode(self.sentinel, &mut dst[written..]);
                    consumed = src.len();
                }
                break;
            }
            let q = [rest[0], rest[1], rest[2], rest[3]];
            let cp = if big_endian {
                u32::from_be_bytes(q)
            } else {
                u32::from_le_bytes(q)
            };
            let cp = if (0xD800..0xE000).contains(&cp) {
                self.sentinel
            } else {
                cp
            };
            written += utf8::encode(cp, &mut dst[written..]);
            consumed += 4;
        }
        (consumed, written)
    }
}

#[inline]
fn take_u16(src: &[u8], big_endian: bool) -> Option<u16> {
    if src.len() < 2 {
        return None;
    }
    Some(if big_endian {
        u16::from_be_bytes([src[0], src[1]])
    } else {
        u16::from_le_bytes([src[0], src[1]])
    })
}

/// Transcodes wide-string code units (an in-memory UTF-16 origin).
pub(crate) fn run_wide_u16(units: &[u16], dst: &mut [u8], sentinel: u32) -> (usize, usize) {
    let (mut consumed, mut written) = (0, 0);
    while consumed < units.len() {
        if written + MAX_SEQ > dst.len() {
            break;
        }
        let unit = units[consumed];
        if utf16::is_high_surrogate(unit) {
            match units.get(consumed + 1) {
                Some(&low) if utf16::is_low_surrogate(low) => {
                    written += utf8::encode(utf16::combine(unit, low), &mut dst[written..]);
                    consumed += 2;
                    continue;
                }
                _ => {}
            }
        }
        if utf16::is_surrogate(unit) {
            written += utf8::encode(sentinel, &mut dst[written..]);
        } else {
            written += utf8::encode(unit as u32, &mut dst[written..]);
        }
        consumed += 1;
    }
    (consumed, written)
}

/// Transcodes wide-string code units (an in-memory UTF-32 origin).
pub(crate) fn run_wide_u32(units: &[u32], dst: &mut [u8], sentinel: u32) -> (usize, usize) {
    let (mut consumed, mut written) = (0, 0);
    for &cp in units {
        if written + MAX_SEQ > dst.len() {
            break;
        }
        let cp = if (0xD800..0xE000).contains(&cp) {
            sentinel
        } else {
            cp
        };
        written += utf8::encode(cp, &mut dst[written..]);
        consumed += 1;
    }
    (consumed, written)
}
