//! The `Z80Io` implementation wiring memory, the ULA and the Kempston
//! joystick into the single collaborator [`zx_z80::Z80::step`] needs — the
//! aggregate is the only `Z80Io` implementation in the workspace.

use zx_memory::{MachineVariant, Memory, Page};
use zx_ula::Ula;
use zx_z80::Z80Io;

use crate::profile::{MachineProfile, TimingTunables};

/// Low byte of the Kempston joystick port: bits 0-3 are
/// right/left/down/up, bit 4 is fire, all active-high; included here since
/// it costs nothing beyond a one-byte register and a port match.
const KEMPSTON_PORT_LOW: u16 = 0x1F;

/// Any port with address bits 1 and 15 both clear selects the 128K paging
/// latch, regardless of the other bits — real hardware only decodes those
/// two.
const PAGING_PORT_MASK: u16 = 0x8002;

pub struct MachineBus {
    pub(crate) memory: Memory,
    pub(crate) ula: Ula,
    tunables: TimingTunables,
    kempston: u8,
    /// Absolute CPU T-state the current frame began at; subtracted from
    /// every access's T-state before it reaches a `Ula` event log, which is
    /// indexed frame-relative (every `Ula` log resets to T=0 at frame
    /// start).
    frame_start_t_state: u64,
    /// Cached absolute T-state of the bus cycle in progress, set by
    /// `contend_memory`/`contend_port` (always called immediately before
    /// the matching `read_*`/`write_*`, per `Z80Io`'s contract) since the
    /// read/write methods themselves don't carry a T-state.
    last_access_t_state: u64,
}

impl MachineBus {
    #[must_use]
    pub fn new(profile: &MachineProfile, rom_pages: Vec<Page>, tunables: TimingTunables) -> Self {
        Self {
            memory: Memory::new(profile.variant, rom_pages),
            ula: Ula::new(profile.timing),
            tunables,
            kempston: 0,
            frame_start_t_state: 0,
            last_access_t_state: 0,
        }
    }

    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    #[must_use]
    pub const fn ula(&self) -> &Ula {
        &self.ula
    }

    pub fn ula_mut(&mut self) -> &mut Ula {
        &mut self.ula
    }

    pub fn set_kempston(&mut self, value: u8) {
        self.kempston = value;
    }

    pub(crate) fn begin_frame(&mut self, cpu_t_states: u64) {
        self.frame_start_t_state = cpu_t_states;
        let bank = self.current_screen_bank();
        let mut snapshot = [0u8; zx_ula::ATTR_CELLS];
        snapshot.copy_from_slice(&self.memory.ram_bank(bank)[0x1800..0x1800 + zx_ula::ATTR_CELLS]);
        self.ula.start_frame(&snapshot, bank);
    }

    pub(crate) fn render_tick(&mut self, absolute_t_state: u64) {
        let t = self.frame_t(absolute_t_state);
        let bank = self.current_screen_bank();
        let memory = &self.memory;
        self.ula
            .render_up_to(t, &|b, a| Self::read_bank_byte_full(memory, b, a), bank);
    }

    pub(crate) fn finish_frame(&mut self) -> &[u32] {
        let bank = self.current_screen_bank();
        let memory = &self.memory;
        self.ula
            .end_frame(&|b, a| Self::read_bank_byte_full(memory, b, a), bank)
    }

    fn frame_t(&self, absolute: u64) -> u32 {
        absolute.saturating_sub(self.frame_start_t_state) as u32
    }

    fn tagged_t_state(&self, adjust: i16) -> u32 {
        let frame_relative = i64::from(self.frame_t(self.last_access_t_state)) + i64::from(adjust);
        frame_relative.max(0) as u32
    }

    fn current_screen_bank(&self) -> u8 {
        if self.memory.paging().screen_bank_is_7() {
            7
        } else {
            5
        }
    }

    /// Resolve the physical RAM bank and bank-relative offset a CPU
    /// address currently maps to, or `None` for ROM slots and the
    /// never-screen-relevant bank-2 slot. On 128K, screen bank 7 is only
    /// ever reachable through the bank-switched slot 3 — it is never the
    /// fixed slot 1 — so this has to track the actual mapped bank rather
    /// than assume a fixed address range is "the screen".
    fn physical_bank(&self, address: u16) -> Option<(u8, u16)> {
        match address >> 14 {
            1 => Some((5, address & 0x3FFF)),
            3 if self.memory.variant() != MachineVariant::Spectrum48 => {
                Some((self.memory.paging().ram_bank(), address & 0x3FFF))
            }
            _ => None,
        }
    }

    fn read_bank_byte_full(memory: &Memory, bank: u8, full_address: u16) -> u8 {
        memory.ram_bank(bank)[usize::from(full_address & 0x3FFF)]
    }
}

/// A plain memory-mapped view with no contention or port semantics, for
/// generic tooling (disassemblers, memory inspectors) built against
/// `zx_core::Bus` rather than the CPU-specific [`Z80Io`]. The Z80 itself
/// always drives execution through `Z80Io` below, which is the only path
/// that triggers ULA side effects and contention.
impl zx_core::Bus for MachineBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory.read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory.write(address, value);
    }
}

impl Z80Io for MachineBus {
    fn read_mem(&mut self, address: u16) -> u8 {
        if (0x4000..=0x5AFF).contains(&address) && self.ula.is_screen_fetch_phase(self.frame_t(self.last_access_t_state)) {
            self.ula.latch_snow_byte(self.memory.peek(address));
        }
        self.memory.read(address)
    }

    fn write_mem(&mut self, address: u16, value: u8) {
        self.memory.write(address, value);
        if let Some((bank, offset)) = self.physical_bank(address) {
            if bank == self.current_screen_bank() && (0x1800..=0x1AFF).contains(&offset) {
                let attr_address = 0x5800 + (offset - 0x1800);
                let t = self.tagged_t_state(self.tunables.write_adjust);
                self.ula.on_memory_write(attr_address, value, t);
            }
        }
    }

    fn read_port(&mut self, port: u16) -> u8 {
        if port & 0xFF == KEMPSTON_PORT_LOW {
            return self.kempston;
        }
        if port & 1 == 0 || port == 0xFF3B {
            return self.ula.on_port_read(port);
        }
        let bank = self.current_screen_bank();
        let memory = &self.memory;
        let t = self.frame_t(self.last_access_t_state);
        self.ula
            .floating_bus_byte(t, &|b, a| Self::read_bank_byte_full(memory, b, a), bank)
            .unwrap_or(0xFF)
    }

    fn write_port(&mut self, port: u16, value: u8) {
        let t = self.tagged_t_state(0);
        self.ula.on_port_write(port, value, t);

        if port & PAGING_PORT_MASK == 0x0000 {
            let was_bank_7 = self.memory.paging().screen_bank_is_7();
            self.memory.write_paging(value);
            let is_bank_7 = self.memory.paging().screen_bank_is_7();
            if is_bank_7 != was_bank_7 {
                self.ula
                    .on_screen_bank_change(if is_bank_7 { 7 } else { 5 }, t);
            }
        }
    }

    fn contend_memory(&mut self, t_states: u64, address: u16) -> u8 {
        let contended = self.memory.is_contended(address);
        let delay = self.ula.contention_delay(t_states, contended);
        self.last_access_t_state = t_states + u64::from(delay);
        delay
    }

    fn contend_port(&mut self, t_states: u64, port: u16) -> u8 {
        let contended_high = self.memory.is_contended(port);
        let delay = self.ula.io_contention_delay(t_states, port, contended_high);
        self.last_access_t_state = t_states + u64::from(delay);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zx_memory::PAGE_SIZE;

    fn bus_48k() -> MachineBus {
        MachineBus::new(
            &MachineProfile::spectrum_48(),
            vec![[0; PAGE_SIZE]],
            TimingTunables::default(),
        )
    }

    fn bus_128k() -> MachineBus {
        MachineBus::new(
            &MachineProfile::spectrum_128(),
            vec![[0; PAGE_SIZE], [0; PAGE_SIZE]],
            TimingTunables::default(),
        )
    }

    #[test]
    fn kempston_port_reads_the_latched_register() {
        let mut bus = bus_48k();
        bus.set_kempston(0b0001_0110);
        assert_eq!(bus.read_port(0x001F), 0b0001_0110);
        assert_eq!(bus.read_port(0xFF1F), 0b0001_0110);
    }

    #[test]
    fn paging_port_updates_the_paging_latch() {
        let mut bus = bus_128k();
        bus.begin_frame(0);
        bus.write_port(0x7FFD, 0b0000_1000); // screen bank 7
        assert!(bus.memory.paging().screen_bank_is_7());
    }

    #[test]
    fn attribute_write_to_current_screen_bank_updates_memory() {
        let mut bus = bus_48k();
        bus.begin_frame(0);
        bus.write_mem(0x5800, 0x80);
        assert_eq!(bus.memory.read(0x5800), 0x80);
    }

    #[test]
    fn attribute_write_to_bank_7_via_slot3_is_observed_only_when_screen_bank_is_7() {
        let mut bus = bus_128k();
        bus.write_port(0x7FFD, 0b0000_1111); // ram_bank=7, screen=7
        bus.begin_frame(0);
        // 0xD800 = slot 3 base 0xC000 + attribute offset 0x1800.
        bus.write_mem(0xD800, 0x40);
        assert_eq!(bus.memory.read(0xD800), 0x40);
    }

    #[test]
    fn floating_bus_falls_back_to_0xff_outside_the_paper_window() {
        let mut bus = bus_48k();
        bus.begin_frame(0);
        assert_eq!(bus.read_port(0x00FD), 0xFF);
    }
}
