//! ULAplus: the community 64-entry palette extension.
//!
//! Register select (port 0xBF3B) and data (port 0xFF3B) are plain latches;
//! the interesting part is how the palette is *applied*, which lives in
//! [`crate::Ula::attribute_colours`] since it needs the attribute byte too.

use crate::events::PaletteLog;

/// Register 64 (mode) is out of the 0..64 palette range; anything above
/// that is an invalid register write and is silently ignored.
const MODE_REGISTER: u8 = 64;

/// Above this many distinct registers touched in one frame, a demo is
/// assumed to be doing a multi-CLUT per-strip rewrite rather than a
/// per-scanline single-register rewrite. Empirical, like the split-screen
/// threshold.
const RASTER_FEW_UNIQUE_REGISTERS: usize = 8;

/// Paper rows per per-strip CLUT reload group (`group = paper_line / 16`).
const RASTER_STRIP_ROWS: u16 = 16;

/// 64-entry palette RAM plus the mode register, with per-T-state change
/// history for raster-palette demo effects.
#[derive(Debug, Clone)]
pub struct UlaPlus {
    /// Currently selected register (0..=64), latched by port 0xBF3B.
    selected: u8,
    /// Live palette entries, GRB332-encoded.
    palette: [u8; 64],
    /// Palette as it stood at the start of the current frame, the replay
    /// baseline for [`UlaPlus::entry_at`]/[`UlaPlus::entry_for_line`].
    baseline: [u8; 64],
    /// Bit 0: palette mode enabled.
    mode: u8,
    /// Full change history, replayed by [`crate::Ula::end_frame`]'s raster
    /// palette-effect heuristic.
    pub(crate) log: PaletteLog,
}

impl Default for UlaPlus {
    fn default() -> Self {
        Self {
            selected: 0,
            palette: [0; 64],
            baseline: [0; 64],
            mode: 0,
            log: PaletteLog::default(),
        }
    }
}

impl UlaPlus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start_frame(&mut self) {
        self.log.reset();
        self.baseline = self.palette;
    }

    /// Port 0xBF3B write: select a register (7 bits significant).
    pub fn select_register(&mut self, value: u8) {
        self.selected = value & 0x7F;
    }

    /// Port 0xFF3B write: write the currently-selected register.
    ///
    /// A register above 64 is invalid and silently ignored. Writes to the
    /// mode register are not logged by T-state:
    /// only palette-entry writes feed the raster-effect log, since mode
    /// changes mid-frame are not a known demo pattern.
    pub fn write_data(&mut self, value: u8, t_state: u32) {
        match self.selected {
            r @ 0..=63 => {
                self.palette[r as usize] = value;
                self.log.push(t_state, r, value);
            }
            MODE_REGISTER => self.mode = value,
            _ => {}
        }
    }

    /// Port 0xFF3B read: the currently-selected register's value.
    #[must_use]
    pub fn read_data(&self) -> u8 {
        match self.selected {
            r @ 0..=63 => self.palette[r as usize],
            MODE_REGISTER => self.mode,
            _ => 0xFF,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.mode & 0x01 != 0
    }

    #[must_use]
    pub fn entry(&self, index: u8) -> u8 {
        self.palette[usize::from(index) & 0x3F]
    }

    /// The palette entry the border uses while ULAplus mode is enabled:
    /// register 8 (CLUT 0, PAPER 0).
    #[must_use]
    pub fn border_entry(&self) -> u8 {
        self.entry(8)
    }

    /// Replay the change log to find the value a register held at
    /// `t_state`, starting from the frame's opening baseline. Used for the
    /// border, which is rendered continuously rather than a row at a time.
    #[must_use]
    pub(crate) fn entry_at(&self, register: u8, t_state: u32) -> u8 {
        let register = register & 0x3F;
        let mut value = self.baseline[usize::from(register)];
        for (t, r, v) in self.log.iter() {
            if t > t_state {
                break;
            }
            if r == register {
                value = v;
            }
        }
        value
    }

    /// Resolve a palette entry as paper row `row` (starting at
    /// `line_start_t`) should see it: a demo that rewrites only a handful of
    /// registers across
    /// the frame is assumed to be doing a per-scanline single-register
    /// rewrite (replay changes up to this line's start), while one that
    /// rewrites many registers is assumed to be reloading whole CLUTs a
    /// strip at a time (apply the log in bulk, `(strip + 1) * 64` entries
    /// at a time, regardless of each entry's own T-state).
    #[must_use]
    pub(crate) fn entry_for_line(&self, register: u8, row: u16, line_start_t: u32) -> u8 {
        let register = register & 0x3F;
        if self.log.is_empty() {
            return self.baseline[usize::from(register)];
        }
        if self.log.unique_register_count() <= RASTER_FEW_UNIQUE_REGISTERS {
            self.entry_at(register, line_start_t)
        } else {
            let strip = usize::from(row) / usize::from(RASTER_STRIP_ROWS);
            let take = (strip + 1) * 64;
            let mut table = self.baseline;
            for (_, r, v) in self.log.iter().take(take) {
                table[usize::from(r) & 0x3F] = v;
            }
            table[usize::from(register)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        assert!(!UlaPlus::new().is_enabled());
    }

    #[test]
    fn mode_register_enables_palette() {
        let mut plus = UlaPlus::new();
        plus.select_register(64);
        plus.write_data(0x01, 0);
        assert!(plus.is_enabled());
    }

    #[test]
    fn register_above_63_palette_range_is_ignored_below_mode() {
        let mut plus = UlaPlus::new();
        plus.select_register(65); // invalid: not a palette entry, not mode
        plus.write_data(0xAA, 0);
        plus.select_register(0);
        assert_eq!(plus.read_data(), 0);
    }

    #[test]
    fn palette_entry_roundtrips() {
        let mut plus = UlaPlus::new();
        plus.select_register(8);
        plus.write_data(0b010_101_01, 0);
        assert_eq!(plus.entry(8), 0b010_101_01);
        assert_eq!(plus.border_entry(), 0b010_101_01);
    }

    #[test]
    fn entry_at_replays_changes_up_to_a_tstate() {
        let mut plus = UlaPlus::new();
        plus.start_frame();
        plus.select_register(8);
        plus.write_data(1, 100);
        plus.write_data(2, 200);
        assert_eq!(plus.entry_at(8, 50), 0);
        assert_eq!(plus.entry_at(8, 100), 1);
        assert_eq!(plus.entry_at(8, 199), 1);
        assert_eq!(plus.entry_at(8, 200), 2);
    }

    #[test]
    fn entry_for_line_with_few_registers_uses_per_scanline_replay() {
        let mut plus = UlaPlus::new();
        plus.start_frame();
        plus.select_register(8);
        plus.write_data(5, 10_000);
        // Only one register touched this frame: per-scanline replay applies.
        assert_eq!(plus.entry_for_line(8, 0, 9_999), 0);
        assert_eq!(plus.entry_for_line(8, 0, 10_000), 5);
    }

    #[test]
    fn entry_for_line_with_many_registers_applies_strips_in_bulk() {
        let mut plus = UlaPlus::new();
        plus.start_frame();
        for r in 0..=RASTER_FEW_UNIQUE_REGISTERS as u8 + 1 {
            plus.select_register(r);
            plus.write_data(r + 1, u32::from(r) * 1000);
        }
        // Strip 0 (rows 0..16) only sees the first 64 log entries applied,
        // which is everything written here, so every register lands.
        assert_eq!(plus.entry_for_line(0, 0, 0), 1);
        assert_eq!(
            plus.entry_for_line(RASTER_FEW_UNIQUE_REGISTERS as u8 + 1, 0, 0),
            RASTER_FEW_UNIQUE_REGISTERS as u8 + 2
        );
    }
}
