//! CRLF-normalizing input adapter.

use std::io::{self, Read};

use super::{Input, Origin};

/// Wraps an [`Input`] and replaces every `\r\n` with `\n` on read, keeping
/// one octet of lookahead across reads. A `\r` not followed by `\n` passes
/// through untouched.
///
/// The adapter implements [`Read`] over the already-canonical UTF-8
/// stream, so it nests back into an [`Input`] for matcher construction:
///
/// ```
/// use lexstream::input::{DosInput, Input};
///
/// let inner = Input::from("a\r\nb\rc");
/// let mut input = Input::from(DosInput::new(inner));
/// let mut buf = [0u8; 16];
/// let n = input.get(&mut buf);
/// assert_eq!(&buf[..n], b"a\nb\rc");
/// ```
pub struct DosInput<'a> {
    inner: Input<'a>,
    /// Octet read past a `\r` that turned out not to be `\n`.
    hold: Option<u8>,
    chunk: Vec<u8>,
    idx: usize,
}

impl<'a> DosInput<'a> {
    pub fn new(inner: impl Into<Input<'a>>) -> Self {
        DosInput {
            inner: inner.into(),
            hold: None,
            chunk: Vec::new(),
            idx: 0,
        }
    }

    fn next_octet(&mut self) -> Option<u8> {
        if let Some(b) = self.hold.take() {
            return Some(b);
        }
        if self.idx >= self.chunk.len() {
            let mut tmp = [0u8; 256];
            let n = self.inner.get(&mut tmp);
            if n == 0 {
                return None;
            }
            self.chunk.clear();
            self.chunk.extend_from_slice(&tmp[..n]);
            self.idx = 0;
        }
        let b = self.chunk[self.idx];
        self.idx += 1;
        Some(b)
    }
}

impl Read for DosInput<'_> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < dst.len() {
            let Some(b) = self.next_octet() else {
                break;
            };
            if b == b'\r' {
                match self.next_octet() {
                    Some(b'\n') => {
                        dst[written] = b'\n';
                        written += 1;
                        continue;
                    }
                    other => self.hold = other,
                }
            }
            dst[written] = b;
            written += 1;
        }
        if written == 0 && !self.inner.good() {
            return Err(io::Error::new(io::ErrorKind::Other, "input read error"));
        }
        Ok(written)
    }
}

impl<'a> From<DosInput<'a>> for Input<'a> {
    fn from(dos: DosInput<'a>) -> Self {
        // The inner input already produced canonical UTF-8.
        Input::builder(Origin::Reader(Box::new(dos))).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(src: &str) -> Vec<u8> {
        let mut dos = DosInput::new(Input::from(src));
        let mut out = Vec::new();
        dos.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn crlf_collapses() {
        assert_eq!(filter("a\r\nb\r\n"), b"a\nb\n");
        assert_eq!(filter("\r\n\r\n"), b"\n\n");
    }

    #[test]
    fn lone_cr_survives() {
        assert_eq!(filter("a\rb"), b"a\rb");
        assert_eq!(filter("a\r"), b"a\r");
        assert_eq!(filter("\r\r\n"), b"\r\n");
    }
}
