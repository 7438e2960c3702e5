//! Line-oriented scrollback ring.
//!
//! A bounded FIFO of committed lines plus a partial accumulator for the
//! current, not-yet-newline-terminated line. Used for non-TUI command
//! output; full-screen TUI applications are served from the virtual screen
//! instead (see [`crate::screen`]).

use std::collections::VecDeque;

const DEFAULT_CAPACITY: usize = 2000;

/// A mutex-guarded circular buffer of committed lines with a partial tail.
///
/// `write` is the sole mutator and is meant to be called from a single
/// writer task (the output pump); `last`/`last_with_partial` are safe to
/// call concurrently from request handlers because the whole structure
/// sits behind a lock owned by the caller (see [`crate::daemon::Daemon`]).
#[derive(Debug)]
pub struct Scrollback {
    lines: VecDeque<Vec<u8>>,
    capacity: usize,
    partial: Vec<u8>,
}

impl Scrollback {
    pub fn new(capacity: usize) -> Self {
        Scrollback {
            lines: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
            partial: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.lines.len()
    }

    /// Feed raw bytes: `\n` commits `partial` as a new line, `\r` is
    /// discarded, everything else is appended to `partial`.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match b {
                b'\n' => self.commit(),
                b'\r' => {}
                _ => self.partial.push(b),
            }
        }
    }

    fn commit(&mut self) {
        let line = std::mem::take(&mut self.partial);
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// The newest `min(n, count)` committed lines, oldest to newest.
    pub fn last(&self, n: usize) -> Vec<String> {
        let n = n.min(self.lines.len());
        self.lines
            .iter()
            .skip(self.lines.len() - n)
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect()
    }

    /// Same as [`Scrollback::last`] but appends the partial line as the
    /// final element, iff it is non-empty.
    pub fn last_with_partial(&self, n: usize) -> Vec<String> {
        if self.partial.is_empty() {
            return self.last(n);
        }
        let mut out = if n == 0 { Vec::new() } else { self.last(n - 1) };
        out.push(String::from_utf8_lossy(&self.partial).into_owned());
        out
    }

    /// Resize the ring, preserving the last `min(count, m)` committed lines.
    /// The partial accumulator is untouched.
    pub fn set_capacity(&mut self, m: usize) {
        let m = m.max(1);
        let keep = self.lines.len().min(m);
        if keep < self.lines.len() {
            let drop = self.lines.len() - keep;
            for _ in 0..drop {
                self.lines.pop_front();
            }
        }
        self.capacity = m;
    }
}

impl Default for Scrollback {
    fn default() -> Self {
        Scrollback::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_on_newline_and_strips_cr() {
        let mut sb = Scrollback::new(10);
        sb.write(b"line1\r\nline2\r\npartial");
        assert_eq!(sb.last(10), vec!["line1", "line2"]);
        assert_eq!(sb.last_with_partial(10), vec!["line1", "line2", "partial"]);
    }

    #[test]
    fn count_equals_newline_count_capped_at_capacity() {
        let mut sb = Scrollback::new(3);
        for i in 0..10 {
            sb.write(format!("line{}\n", i).as_bytes());
        }
        assert_eq!(sb.count(), 3);
        assert_eq!(sb.last(3), vec!["line7", "line8", "line9"]);
    }

    #[test]
    fn last_n_is_suffix_of_last_n_plus_1() {
        let mut sb = Scrollback::new(100);
        for i in 0..20 {
            sb.write(format!("l{}\n", i).as_bytes());
        }
        for n in 1..15 {
            let smaller = sb.last(n);
            let bigger = sb.last(n + 1);
            assert_eq!(&bigger[bigger.len() - smaller.len()..], smaller.as_slice());
        }
    }

    #[test]
    fn last_with_partial_equals_last_when_partial_empty() {
        let mut sb = Scrollback::new(10);
        sb.write(b"a\nb\n");
        assert_eq!(sb.last_with_partial(5), sb.last(5));
    }

    #[test]
    fn last_with_partial_prefix_matches_last_n_minus_1() {
        let mut sb = Scrollback::new(10);
        sb.write(b"a\nb\nc\npartial");
        let lwp = sb.last_with_partial(10);
        assert_eq!(lwp.last().unwrap(), "partial");
        assert_eq!(&lwp[..lwp.len() - 1], sb.last(9).as_slice());
    }

    #[test]
    fn set_capacity_preserves_tail_and_never_exceeds() {
        let mut sb = Scrollback::new(10);
        for i in 0..8 {
            sb.write(format!("l{}\n", i).as_bytes());
        }
        sb.set_capacity(3);
        assert!(sb.count() <= 3);
        assert_eq!(sb.last(3), vec!["l5", "l6", "l7"]);

        // Growing capacity afterwards must not retroactively invent lines.
        sb.set_capacity(10);
        assert_eq!(sb.count(), 3);
    }

    #[test]
    fn set_capacity_preserves_partial() {
        let mut sb = Scrollback::new(5);
        sb.write(b"a\nb\nptl");
        sb.set_capacity(1);
        assert_eq!(sb.last_with_partial(10), vec!["b", "ptl"]);
    }

    #[test]
    fn partial_never_contains_newline_or_cr() {
        let mut sb = Scrollback::new(5);
        sb.write(b"no-newline-yet");
        assert!(!sb.partial.contains(&b'\n'));
        assert!(!sb.partial.contains(&b'\r'));
    }
}
