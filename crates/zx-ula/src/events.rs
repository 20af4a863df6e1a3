//! Per-frame event logs: every mid-frame side effect that feeds rendering
//! is recorded as `(t_state, ..)` tuples, strictly ordered by non-decreasing
//! T-state because they are appended in execution order.

/// A fixed-capacity inline log, used for the 768 per-attribute-cell override
/// lists. 8 entries comfortably covers any known multicolor effect's changes
/// to a single
/// character cell within one frame; an effect that exceeds it silently
/// drops the oldest-but-one entry rather than growing unboundedly. The
/// attribute space is fixed by hardware (768 cells, always), which is why
/// this one log is a true fixed-size ring rather than a growable `Vec`
/// (see [`EventLog`] for the latter).
#[derive(Debug, Clone, Copy)]
pub struct SmallLog {
    entries: [(u32, u8); 8],
    len: u8,
}

impl Default for SmallLog {
    fn default() -> Self {
        Self {
            entries: [(0, 0); 8],
            len: 0,
        }
    }
}

impl SmallLog {
    /// Reset to a single initial entry capturing current state at frame
    /// start.
    pub fn reset(&mut self, initial_value: u8) {
        self.entries[0] = (0, initial_value);
        self.len = 1;
    }

    /// Append a change. If the log is full, the oldest change after the
    /// initial snapshot is dropped to make room — the initial entry (index
    /// 0) is never evicted since every lookup needs a fallback.
    pub fn push(&mut self, t_state: u32, value: u8) {
        if (self.len as usize) < self.entries.len() {
            self.entries[self.len as usize] = (t_state, value);
            self.len += 1;
        } else {
            self.entries.copy_within(2.., 1);
            self.entries[self.entries.len() - 1] = (t_state, value);
        }
    }

    /// The value in effect at `t_state`: the last recorded change with
    /// `t_state' <= t_state`, or the initial snapshot.
    #[must_use]
    pub fn value_at(&self, t_state: u32) -> u8 {
        let mut result = self.entries[0].1;
        for &(t, value) in &self.entries[..self.len as usize] {
            if t <= t_state {
                result = value;
            } else {
                break;
            }
        }
        result
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Pre-allocation hint for the growable frame-scoped logs: a reasonable
/// demo's worth of border or palette changes, not a cap — `reset()`
/// reserves this much but the log grows past it without dropping anything.
const GROWABLE_LOG_CAPACITY_HINT: usize = 1024;

/// A growable log of `(t_state, value)` events. Unlike [`SmallLog`], nothing
/// here is ever silently dropped, because a long multicolor demo legitimately
/// exceeding the capacity hint is a real program, not a buggy one.
#[derive(Debug, Clone)]
pub struct EventLog<T> {
    entries: Vec<(u32, T)>,
}

impl<T> Default for EventLog<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: Copy> EventLog<T> {
    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.reserve(GROWABLE_LOG_CAPACITY_HINT);
    }

    pub fn push(&mut self, t_state: u32, value: T) {
        self.entries.push((t_state, value));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, T)> + '_ {
        self.entries.iter().copied()
    }

    /// The value in effect at `t_state` given `initial` as the pre-frame
    /// fallback, i.e. the last entry with `t <= t_state`, else `initial`.
    /// Entries are appended in non-decreasing T-state order, so a linear
    /// scan from the end would also work; scanning forward keeps this
    /// identical in shape to `SmallLog::value_at`.
    #[must_use]
    pub fn value_at(&self, t_state: u32, initial: T) -> T {
        let mut result = initial;
        for (t, value) in self.iter() {
            if t <= t_state {
                result = value;
            } else {
                break;
            }
        }
        result
    }
}

/// Border-colour change log: `(t_state, colour)`.
pub type BorderLog = EventLog<u8>;

/// Screen-bank change log (128K split-screen effects): `(t_state, bank)`.
pub type ScreenBankLog = EventLog<u8>;

/// ULAplus palette-register change log: `(t_state, register, value)`.
#[derive(Debug, Clone, Default)]
pub struct PaletteLog {
    inner: EventLog<(u8, u8)>,
}

impl PaletteLog {
    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn push(&mut self, t_state: u32, register: u8, value: u8) {
        self.inner.push(t_state, (register, value));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u8, u8)> + '_ {
        self.inner.iter().map(|(t, (r, v))| (t, r, v))
    }

    /// Number of distinct registers touched this frame, for the per-scanline
    /// rewrite vs multi-CLUT per-strip rewrite heuristic.
    #[must_use]
    pub fn unique_register_count(&self) -> usize {
        let mut seen = [false; 64];
        let mut count = 0;
        for (_, r, _) in self.iter() {
            let r = usize::from(r) & 0x3F;
            if !seen[r] {
                seen[r] = true;
                count += 1;
            }
        }
        count
    }
}
