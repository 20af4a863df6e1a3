//! The per-variant constant tables a [`crate::Machine`] is built from:
//! which ROM/RAM slot map to use, which ULA raster timing to use, and how
//! long the INT line stays asserted.

use zx_memory::MachineVariant;
use zx_ula::profiles;
use zx_ula::UlaTiming;

/// T-states the INT line is held low at the start of every frame. Observed
/// from hardware reference, not derived from the raster timing; the same
/// on every variant this crate supports.
const INT_PULSE_TSTATES: u16 = 32;

/// The ROM/RAM slot map and raster timing paired together for one hardware
/// variant. [`MachineVariant`] (from `zx-memory`) and [`UlaTiming`] (from
/// `zx-ula`) are independent axes in their own crates; this is just the
/// pairing the aggregate needs to build both pieces from one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineProfile {
    pub variant: MachineVariant,
    pub timing: UlaTiming,
    pub int_pulse_tstates: u16,
}

impl MachineProfile {
    #[must_use]
    pub const fn spectrum_48() -> Self {
        Self {
            variant: MachineVariant::Spectrum48,
            timing: profiles::SPECTRUM_48,
            int_pulse_tstates: INT_PULSE_TSTATES,
        }
    }

    #[must_use]
    pub const fn spectrum_128() -> Self {
        Self {
            variant: MachineVariant::Spectrum128,
            timing: profiles::SPECTRUM_128,
            int_pulse_tstates: INT_PULSE_TSTATES,
        }
    }

    #[must_use]
    pub const fn pentagon() -> Self {
        Self {
            variant: MachineVariant::Pentagon,
            timing: profiles::PENTAGON,
            int_pulse_tstates: INT_PULSE_TSTATES,
        }
    }
}

/// Selects a variant and carries the ROM pages needed to build a
/// [`crate::Machine`].
pub struct MachineConfig {
    pub profile: MachineProfile,
    pub rom_pages: Vec<zx_memory::Page>,
    pub tunables: TimingTunables,
}

impl MachineConfig {
    #[must_use]
    pub fn new(profile: MachineProfile, rom_pages: Vec<zx_memory::Page>) -> Self {
        Self {
            profile,
            rom_pages,
            tunables: TimingTunables::default(),
        }
    }

    #[must_use]
    pub fn build(self) -> crate::Machine {
        crate::Machine::with_tunables(self.profile, self.rom_pages, self.tunables)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingTunables {
    /// T-state adjustment applied to a memory write before it reaches the
    /// ULA's attribute-change log.
    pub write_adjust: i16,
}

impl Default for TimingTunables {
    fn default() -> Self {
        Self {
            write_adjust: zx_ula::WRITE_ADJUST_TSTATES as i16,
        }
    }
}
