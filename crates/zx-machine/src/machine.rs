//! The machine aggregate: owns the Z80 and the wiring bus by value and
//! drives them one frame (or one instruction) at a time. This is the only
//! place the `Z80Io` callback loop closes.

use zx_memory::{PagingLatch, Page};
use zx_ula::Key;
use zx_z80::Z80;

use crate::bus::MachineBus;
use crate::error::Error;
use crate::profile::{MachineProfile, TimingTunables};
use crate::snapshot::CpuState;

/// Frames between frame-timing drift log lines in debug builds, chosen to
/// land roughly once a second at 50 Hz without being tied to any
/// particular variant's exact frame rate.
const FRAME_TIMING_LOG_INTERVAL: u64 = 50;

/// A complete ZX Spectrum: Z80 CPU, banked memory and ULA wired together,
/// driven one instruction or one frame at a time.
pub struct Machine {
    cpu: Z80,
    bus: MachineBus,
    profile: MachineProfile,
    frame_count: u64,
}

impl Machine {
    #[must_use]
    pub fn new(profile: MachineProfile, rom_pages: Vec<Page>) -> Self {
        Self::with_tunables(profile, rom_pages, TimingTunables::default())
    }

    #[must_use]
    pub fn with_tunables(profile: MachineProfile, rom_pages: Vec<Page>, tunables: TimingTunables) -> Self {
        let mut cpu = Z80::new();
        cpu.reset();
        Self {
            cpu,
            bus: MachineBus::new(&profile, rom_pages, tunables),
            profile,
            frame_count: 0,
        }
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.memory_mut().reset();
        self.bus.ula_mut().reset();
    }

    #[must_use]
    pub const fn profile(&self) -> &MachineProfile {
        &self.profile
    }

    #[must_use]
    pub const fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub const fn bus(&self) -> &MachineBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MachineBus {
        &mut self.bus
    }

    pub fn key_down(&mut self, key: Key) {
        self.bus.ula_mut().key_down(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.bus.ula_mut().key_up(key);
    }

    pub fn queue_extended_key(&mut self, letter: Key) {
        self.bus.ula_mut().queue_extended_key(letter);
    }

    pub fn set_kempston(&mut self, value: u8) {
        self.bus.set_kempston(value);
    }

    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.ula().framebuffer()
    }

    /// Run exactly one frame: assert the INT line at the frame's start,
    /// step the CPU until its T-state counter has passed the frame
    /// boundary, letting the ULA render after every instruction, and
    /// return the completed framebuffer.
    ///
    /// The INT line is level-triggered in this model (it stays pending
    /// until IFF1 allows acceptance), so asserting it once per frame at
    /// T=0 is enough: if the previous frame's request is still pending
    /// because interrupts were disabled throughout, re-asserting is a
    /// no-op, matching how an already-active hardware line behaves.
    pub fn run_frame(&mut self) -> &[u32] {
        let frame_tstates = u64::from(self.profile.timing.tstates_per_frame());
        let frame_start = self.cpu.t_states();
        self.bus.begin_frame(frame_start);
        self.cpu.request_interrupt();

        while self.cpu.t_states() - frame_start < frame_tstates {
            self.step_one();
        }

        self.frame_count += 1;
        if cfg!(debug_assertions) && self.frame_count % FRAME_TIMING_LOG_INTERVAL == 0 {
            let elapsed = self.cpu.t_states() - frame_start;
            let drift = i64::from(elapsed as u32) - i64::from(frame_tstates as u32);
            if drift != 0 {
                log::debug!("frame {} ended {drift} T-states past the nominal boundary", self.frame_count);
            }
        }

        self.bus.finish_frame()
    }

    /// Execute exactly one instruction and let the ULA render up to the
    /// CPU's new T-state. Exposed for single-instruction stepping / debug
    /// mode, where a host drives the machine without a frame boundary in
    /// view.
    pub fn step_one(&mut self) -> u32 {
        let t_states = self.cpu.step(&mut self.bus);
        let absolute = self.cpu.t_states();
        self.bus.render_tick(absolute);
        t_states
    }

    // -- snapshot hooks: a concrete CPU-state struct for an external
    // loader to populate ------------------------------------------------

    #[must_use]
    pub fn cpu_state(&self) -> CpuState {
        CpuState::capture(self.cpu.registers())
    }

    pub fn apply_cpu_state(&mut self, state: &CpuState) -> Result<(), Error> {
        state.apply(self.cpu.registers_mut()).inspect_err(|err| {
            log::warn!("rejected snapshot field: {err}");
        })
    }

    #[must_use]
    pub fn ram_bank(&self, n: u8) -> &[u8] {
        self.bus.memory().ram_bank(n)
    }

    pub fn apply_ram_bank(&mut self, n: u8, bytes: &[u8]) -> Result<(), Error> {
        if n > 7 {
            let err = Error::InvalidField {
                field: "ram_bank",
                reason: format!("{n} is not a valid bank index (0..=7)"),
            };
            log::warn!("rejected snapshot field: {err}");
            return Err(err);
        }
        if bytes.len() != zx_memory::PAGE_SIZE {
            let err = Error::InvalidField {
                field: "ram_bank",
                reason: format!("expected {} bytes, got {}", zx_memory::PAGE_SIZE, bytes.len()),
            };
            log::warn!("rejected snapshot field: {err}");
            return Err(err);
        }
        self.bus.memory_mut().ram_bank_mut(n).copy_from_slice(bytes);
        Ok(())
    }

    #[must_use]
    pub fn paging_latch(&self) -> PagingLatch {
        *self.bus.memory().paging()
    }

    pub fn set_paging_latch(&mut self, latch: PagingLatch) {
        self.bus.memory_mut().set_paging_latch(latch);
    }

    pub fn set_border(&mut self, colour: u8) {
        self.bus.ula_mut().set_border(colour);
    }
}
