//! The line matcher: a degenerate engine whose match is "the next line".
//!
//! Options steer it: `A` includes the terminating newline in the text,
//! `N` accepts empty lines, `X` accepts *only* empty lines. No captures.

use crate::matcher::{Context, Flags, EMPTY};

use super::{Engine, Group, Method};

/// Matches lines. Its pattern is trivial, so `Pattern = ()`.
#[derive(Clone, Default)]
pub struct LineEngine;

impl crate::private::Sealed for LineEngine {}

impl LineEngine {
    /// Locates the next newline at or after `cur`, filling as needed.
    /// Returns the newline's offset, or `None` at end of input (any tail
    /// without a newline runs to `end`).
    fn next_newline(ctx: &mut Context<'_>) -> Option<usize> {
        let mut from = ctx.buf.cur;
        loop {
            if let Some(i) = memchr::memchr(b'\n', &ctx.buf.octets()[from..]) {
                return Some(from + i);
            }
            from = ctx.buf.end;
            let before = ctx.buf.num;
            if ctx.buf.eof || ctx.fill() == 0 {
                return None;
            }
            from -= ctx.buf.num - before;
        }
    }

    /// Accepts or skips the line `[cur, nl)` per the `N`/`X` options.
    fn wanted(ctx: &Context<'_>, len: usize) -> bool {
        if ctx.opt.has(Flags::EMPTY_LINES) {
            len == 0
        } else if len == 0 {
            ctx.opt.has(Flags::NULLABLE)
        } else {
            true
        }
    }

    /// The shared line step: matches the line at `cur`, or skips forward
    /// when `find` allows it.
    fn step(&self, ctx: &mut Context<'_>, skip_unwanted: bool) -> usize {
        ctx.begin();
        loop {
            ctx.buf.pos = ctx.buf.cur;
            if !ctx.ensure_pos() {
                return ctx.miss();
            }
            let nl = Self::next_newline(ctx);
            let line_end = nl.unwrap_or(ctx.buf.end);
            let len = line_end - ctx.buf.cur;
            if Self::wanted(ctx, len) {
                ctx.buf.txt = ctx.buf.cur;
                // The reader always passes the newline; option A decides
                // whether the text includes it.
                ctx.buf.cur = nl.map_or(ctx.buf.end, |nl| nl + 1);
                ctx.buf.pos = ctx.buf.cur;
                ctx.cap = 1;
                ctx.len = if ctx.opt.has(Flags::NEWLINE) {
                    ctx.buf.cur - ctx.buf.txt
                } else {
                    len
                };
                ctx.absorb_kept();
                return 1;
            }
            if !skip_unwanted {
                return ctx.miss();
            }
            match nl {
                Some(nl) => {
                    ctx.buf.cur = nl + 1;
                    ctx.buf.txt = ctx.buf.cur;
                }
                None => {
                    ctx.buf.cur = ctx.buf.end;
                    return ctx.miss();
                }
            }
        }
    }

    fn split(&self, ctx: &mut Context<'_>) -> usize {
        if ctx.fin {
            return ctx.miss();
        }
        ctx.begin();
        match Self::next_newline(ctx) {
            Some(nl) => {
                ctx.len = nl - ctx.buf.txt;
                ctx.absorb_kept();
                ctx.buf.cur = nl + 1;
                ctx.buf.pos = ctx.buf.cur;
                ctx.cap = 1;
                1
            }
            None => {
                ctx.len = ctx.buf.end - ctx.buf.txt;
                ctx.buf.cur = ctx.buf.end;
                ctx.buf.pos = ctx.buf.end;
                ctx.absorb_kept();
                ctx.cap = EMPTY;
                ctx.fin = true;
                EMPTY
            }
        }
    }

    fn full_match(&self, ctx: &mut Context<'_>) -> usize {
        ctx.begin();
        while ctx.fill() > 0 {}
        let text = &ctx.buf.octets()[ctx.buf.cur..];
        let line_len = match memchr::memchr(b'\n', text) {
            // A newline anywhere but last makes this more than one line.
            Some(nl) if nl + 1 != text.len() => return ctx.miss(),
            Some(nl) => nl,
            None => text.len(),
        };
        if !Self::wanted(ctx, line_len) {
            return ctx.miss();
        }
        ctx.buf.txt = ctx.buf.cur;
        ctx.buf.cur = ctx.buf.end;
        ctx.buf.pos = ctx.buf.end;
        ctx.cap = 1;
        ctx.len = if ctx.opt.has(Flags::NEWLINE) {
            ctx.buf.end - ctx.buf.txt
        } else {
            line_len
        };
        ctx.absorb_kept();
        1
    }
}

impl Engine for LineEngine {
    type Pattern = ();

    fn from_pattern(_pattern: ()) -> Self {
        LineEngine
    }

    fn set_pattern(&mut self, _pattern: ()) {}

    fn reset(&mut self) {}

    fn search(&mut self, ctx: &mut Context<'_>, method: Method) -> usize {
        match method {
            Method::Scan => self.step(ctx, false),
            Method::Find => self.step(ctx, true),
            Method::Split => self.split(ctx),
            Method::Match => self.full_match(ctx),
        }
    }

    fn group(&self, ctx: &Context<'_>, index: usize) -> Option<Group> {
        (index == 0 && ctx.cap != 0).then(|| Group {
            start: ctx.buf.txt,
            end: ctx.buf.txt + ctx.len,
        })
    }

    fn group_id(&mut self) -> Option<(usize, Option<&str>)> {
        None
    }

    fn group_next_id(&mut self) -> Option<(usize, Option<&str>)> {
        None
    }
}
