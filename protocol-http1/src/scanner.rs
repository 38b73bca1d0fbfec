//! Header section scanner.
//!
//! Splits `name: value` lines, rewrites obsolete line folding in place, and
//! reports each header to a [`HeaderVisitor`]. Scanning stops at the blank
//! line that ends the section or at the start of the first incomplete line,
//! so a caller can read more bytes and call again from `consumed`.
//!
//! The byte searches come in a portable scalar form and in SSE2/AVX2 forms
//! selected once at runtime. All forms share one line-splitting routine and
//! differ only in how they find the next `:` or `\n`. Vector loads read up
//! to [`SCAN_PADDING`] bytes past the meaningful length when the slice has
//! room for them; near the end of a slice without padding the search falls
//! back to scalar.

use std::sync::OnceLock;

use crate::error::ParseError;

/// Bytes past the meaningful length a vector load may touch.
pub const SCAN_PADDING: usize = 31;

/// Receives each header as it is scanned.
pub trait HeaderVisitor {
    fn on_header(&mut self, name: &[u8], value: &[u8]) -> Result<(), ParseError>;
}

impl<F> HeaderVisitor for F
where
    F: FnMut(&[u8], &[u8]) -> Result<(), ParseError>,
{
    fn on_header(&mut self, name: &[u8], value: &[u8]) -> Result<(), ParseError> {
        self(name, value)
    }
}

/// Outcome of one scanning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    /// The blank line ending the section was consumed.
    pub done: bool,
    /// Bytes fully processed. Everything before this offset may be discarded.
    pub consumed: usize,
}

/// Signature shared by every scanner implementation.
///
/// `buf[..len]` holds the meaningful bytes; anything after is padding.
pub type ScanFn = fn(&mut [u8], usize, &mut dyn HeaderVisitor) -> Result<Scan, ParseError>;

trait Finder {
    fn find_colon_or_lf(buf: &[u8], from: usize, end: usize) -> Option<usize>;
    fn find_lf(buf: &[u8], from: usize, end: usize) -> Option<usize>;
}

fn scan<F: Finder>(
    buf: &mut [u8],
    len: usize,
    visitor: &mut dyn HeaderVisitor,
) -> Result<Scan, ParseError> {
    debug_assert!(len <= buf.len());
    let mut line = 0;
    loop {
        let pending = Scan {
            done: false,
            consumed: line,
        };

        let Some(sep) = F::find_colon_or_lf(buf, line, len) else {
            return Ok(pending);
        };
        if buf[sep] == b'\n' {
            return Ok(Scan {
                done: true,
                consumed: sep + 1,
            });
        }

        let mut value_start = sep + 1;
        while value_start < len && matches!(buf[value_start], b' ' | b'\t') {
            value_start += 1;
        }
        if value_start == len {
            return Ok(pending);
        }

        let mut search = value_start;
        let mut folded = false;
        let (value_end, next_line) = loop {
            let Some(lf) = F::find_lf(buf, search, len) else {
                return Ok(pending);
            };
            // The byte after LF decides whether the line is folded.
            if lf + 1 == len {
                return Ok(pending);
            }
            if !matches!(buf[lf + 1], b' ' | b'\t') {
                break (line_end(buf, value_start, lf), lf + 1);
            }
            folded = true;
            search = lf + 2;
        };

        // Rewrite only once the logical line is complete, so a pass that
        // returns early leaves the bytes as it found them.
        if folded {
            let mut search = value_start;
            while let Some(lf) = F::find_lf(buf, search, value_end) {
                let end = line_end(buf, value_start, lf);
                buf[end..lf + 2].fill(b' ');
                search = lf + 2;
            }
        }

        visitor.on_header(&buf[line..sep], &buf[value_start..value_end])?;
        line = next_line;
    }
}

/// Where the line ending at `lf` ends, excluding an optional CR.
#[inline]
fn line_end(buf: &[u8], value_start: usize, lf: usize) -> usize {
    if lf > value_start && buf[lf - 1] == b'\r' {
        lf - 1
    } else {
        lf
    }
}

struct Scalar;

impl Finder for Scalar {
    #[inline]
    fn find_colon_or_lf(buf: &[u8], from: usize, end: usize) -> Option<usize> {
        buf[from..end]
            .iter()
            .position(|&b| b == b':' || b == b'\n')
            .map(|i| from + i)
    }

    #[inline]
    fn find_lf(buf: &[u8], from: usize, end: usize) -> Option<usize> {
        buf[from..end]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| from + i)
    }
}

/// Portable scanner. Always available; the reference the vector forms must match.
pub fn scan_headers_scalar(
    buf: &mut [u8],
    len: usize,
    visitor: &mut dyn HeaderVisitor,
) -> Result<Scan, ParseError> {
    scan::<Scalar>(buf, len, visitor)
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::*;

    use super::{Finder, HeaderVisitor, Scan, scan};
    use crate::error::ParseError;

    #[inline]
    fn tail(buf: &[u8], from: usize, end: usize, a: u8, b: u8) -> Option<usize> {
        buf[from..end]
            .iter()
            .position(|&c| c == a || c == b)
            .map(|i| from + i)
    }

    /// # Safety
    ///
    /// The CPU must support SSE2.
    #[target_feature(enable = "sse2")]
    unsafe fn find2_sse2(buf: &[u8], from: usize, end: usize, a: u8, b: u8) -> Option<usize> {
        const WIDTH: usize = 16;
        let mut i = from;
        while i < end {
            if i + WIDTH > buf.len() {
                return tail(buf, i, end, a, b);
            }
            // SAFETY: `i + WIDTH <= buf.len()` so the load stays in bounds.
            let mask = unsafe {
                let chunk = _mm_loadu_si128(buf.as_ptr().add(i).cast::<__m128i>());
                let hits = _mm_or_si128(
                    _mm_cmpeq_epi8(chunk, _mm_set1_epi8(a as i8)),
                    _mm_cmpeq_epi8(chunk, _mm_set1_epi8(b as i8)),
                );
                _mm_movemask_epi8(hits) as u32
            };
            if mask != 0 {
                let idx = i + mask.trailing_zeros() as usize;
                return (idx < end).then_some(idx);
            }
            i += WIDTH;
        }
        None
    }

    /// # Safety
    ///
    /// The CPU must support AVX2.
    #[target_feature(enable = "avx2")]
    unsafe fn find2_avx2(buf: &[u8], from: usize, end: usize, a: u8, b: u8) -> Option<usize> {
        const WIDTH: usize = 32;
        let mut i = from;
        while i < end {
            if i + WIDTH > buf.len() {
                return tail(buf, i, end, a, b);
            }
            // SAFETY: `i + WIDTH <= buf.len()` so the load stays in bounds.
            let mask = unsafe {
                let chunk = _mm256_loadu_si256(buf.as_ptr().add(i).cast::<__m256i>());
                let hits = _mm256_or_si256(
                    _mm256_cmpeq_epi8(chunk, _mm256_set1_epi8(a as i8)),
                    _mm256_cmpeq_epi8(chunk, _mm256_set1_epi8(b as i8)),
                );
                _mm256_movemask_epi8(hits) as u32
            };
            if mask != 0 {
                let idx = i + mask.trailing_zeros() as usize;
                return (idx < end).then_some(idx);
            }
            i += WIDTH;
        }
        None
    }

    struct Sse2;
    struct Avx2;

    impl Finder for Sse2 {
        fn find_colon_or_lf(buf: &[u8], from: usize, end: usize) -> Option<usize> {
            // SAFETY: SSE2 is part of the x86_64 baseline.
            unsafe { find2_sse2(buf, from, end, b':', b'\n') }
        }

        fn find_lf(buf: &[u8], from: usize, end: usize) -> Option<usize> {
            // SAFETY: SSE2 is part of the x86_64 baseline.
            unsafe { find2_sse2(buf, from, end, b'\n', b'\n') }
        }
    }

    impl Finder for Avx2 {
        fn find_colon_or_lf(buf: &[u8], from: usize, end: usize) -> Option<usize> {
            // SAFETY: only reachable through `scan_avx2`, handed out after detection.
            unsafe { find2_avx2(buf, from, end, b':', b'\n') }
        }

        fn find_lf(buf: &[u8], from: usize, end: usize) -> Option<usize> {
            // SAFETY: as above.
            unsafe { find2_avx2(buf, from, end, b'\n', b'\n') }
        }
    }

    pub(super) fn scan_sse2(
        buf: &mut [u8],
        len: usize,
        visitor: &mut dyn HeaderVisitor,
    ) -> Result<Scan, ParseError> {
        scan::<Sse2>(buf, len, visitor)
    }

    fn scan_avx2(
        buf: &mut [u8],
        len: usize,
        visitor: &mut dyn HeaderVisitor,
    ) -> Result<Scan, ParseError> {
        scan::<Avx2>(buf, len, visitor)
    }

    pub(super) fn avx2() -> Option<super::ScanFn> {
        is_x86_feature_detected!("avx2").then_some(scan_avx2 as super::ScanFn)
    }
}

/// The vector scanners this CPU supports, widest first.
pub fn vector_scanners() -> Vec<(&'static str, ScanFn)> {
    #[allow(unused_mut)]
    let mut scanners: Vec<(&'static str, ScanFn)> = Vec::new();
    #[cfg(target_arch = "x86_64")]
    {
        if let Some(avx2) = x86::avx2() {
            scanners.push(("avx2", avx2));
        }
        scanners.push(("sse2", x86::scan_sse2 as ScanFn));
    }
    scanners
}

static SELECTED: OnceLock<(&'static str, ScanFn)> = OnceLock::new();

fn selected() -> &'static (&'static str, ScanFn) {
    SELECTED.get_or_init(|| {
        vector_scanners()
            .into_iter()
            .next()
            .unwrap_or(("scalar", scan_headers_scalar as ScanFn))
    })
}

/// Name of the scanner [`scan_headers`] dispatches to.
pub fn selected_scanner() -> &'static str {
    selected().0
}

/// Scan with the fastest scanner available, chosen on first use.
pub fn scan_headers(
    buf: &mut [u8],
    len: usize,
    visitor: &mut dyn HeaderVisitor,
) -> Result<Scan, ParseError> {
    (selected().1)(buf, len, visitor)
}
