//! Per-machine-variant timing constants.
//!
//! Every quantity the ULA needs to convert an absolute T-state into a beam
//! position, or to anchor its contention pattern, lives here rather than as
//! a hardcoded constant in [`crate::Ula`] — the same `Ula` type serves all
//! three variants, parameterised by one of these tables.

/// Timing constants for one ZX Spectrum hardware variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UlaTiming {
    /// CPU T-states per scanline.
    pub tstates_per_line: u16,
    /// Scanlines per frame, including vertical blanking.
    pub lines_per_frame: u16,
    /// First scanline of the visible 256x192 paper area.
    pub first_screen_line: u16,
    /// Absolute T-state of the top-left paper pixel.
    pub top_left_tstate: u32,
    /// Absolute T-state at which the contention window of each screen line
    /// begins, or `None` on machines that never contend (Pentagon).
    pub contention_start_tstate: Option<u32>,
    /// Border-colour-change quantisation, in T-states: 4 on Ferranti ULA
    /// variants (48K/128K), 1 on Pentagon's clone ULA.
    pub border_quantum: u8,
}

impl UlaTiming {
    /// Total T-states in one frame.
    #[must_use]
    pub const fn tstates_per_frame(&self) -> u32 {
        self.tstates_per_line as u32 * self.lines_per_frame as u32
    }
}

pub const SPECTRUM_48: UlaTiming = UlaTiming {
    tstates_per_line: 224,
    lines_per_frame: 312,
    first_screen_line: 64,
    top_left_tstate: 14336,
    contention_start_tstate: Some(14335),
    border_quantum: 4,
};

pub const SPECTRUM_128: UlaTiming = UlaTiming {
    tstates_per_line: 228,
    lines_per_frame: 311,
    first_screen_line: 63,
    top_left_tstate: 14364,
    contention_start_tstate: Some(14361),
    border_quantum: 4,
};

pub const PENTAGON: UlaTiming = UlaTiming {
    tstates_per_line: 224,
    lines_per_frame: 320,
    first_screen_line: 80,
    top_left_tstate: 17988,
    contention_start_tstate: None,
    border_quantum: 1,
};
