//! The Z80 interpreter: fetch/decode/execute, T-state accounting and
//! interrupt handling. Decode is split by prefix class into sibling
//! modules; this module owns the register file, the bus plumbing every
//! decode path shares, and the top-level `step()` state machine.

mod cb;
mod ed;
mod indexed;
mod tables;
mod unprefixed;

use crate::flags::{sz53, CF, HF, NF, PF, SF, ZF};
use crate::io::Z80Io;
use crate::registers::Registers;
pub use tables::Index;

/// A cycle-accurate Zilog Z80 CPU interpreter.
///
/// Owns only its own register file and T-state counter; every memory/port
/// access and every contention query goes through the [`Z80Io`] the caller
/// supplies to [`Z80::step`]. This keeps the CPU free of any reference back
/// to the memory/ULA it runs against.
#[derive(Debug, Clone, Default)]
pub struct Z80 {
    regs: Registers,
    t_states: u64,
    pending_nmi: bool,
    pending_int: bool,
    /// Set while executing the instruction immediately after `EI`; that
    /// instruction must complete before `IFF1`/`IFF2` actually flip.
    ei_delay: bool,
    /// F as captured at the *start* of the current instruction, for
    /// SCF/CCF's undocumented bit 5/3 formula.
    prev_q: u8,
    /// Whether the instruction currently executing has written F.
    flags_touched: bool,
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.regs.pc
    }

    #[must_use]
    pub const fn t_states(&self) -> u64 {
        self.t_states
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.regs.halted
    }

    /// Power-on/reset state: A=F=0xFF, SP=0xFFFF, PC=0, IFF1=IFF2=false,
    /// IM=0. The T-state counter is left untouched — that's the driver's
    /// concern, not the CPU's.
    pub fn reset(&mut self) {
        let t_states = self.t_states;
        self.regs = Registers::default();
        self.t_states = t_states;
        self.pending_nmi = false;
        self.pending_int = false;
        self.ei_delay = false;
        self.prev_q = 0;
        self.flags_touched = false;
    }

    /// Assert the INT line. Accepted at the next instruction boundary if
    /// `IFF1` is set and the instruction after `EI` has already completed.
    pub fn request_interrupt(&mut self) {
        self.pending_int = true;
    }

    /// Assert NMI. Always accepted at the next instruction boundary.
    pub fn request_nmi(&mut self) {
        self.pending_nmi = true;
    }

    fn set_flags(&mut self, f: u8) {
        self.regs.f = f;
        self.flags_touched = true;
    }

    // -- bus helpers -------------------------------------------------

    fn fetch_byte(&mut self, io: &mut dyn Z80Io) -> u8 {
        io.on_fetch(self.regs.pc);
        let delay = io.contend_memory(self.t_states, self.regs.pc);
        self.t_states += u64::from(delay);
        let value = io.read_mem(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.regs.inc_r();
        self.t_states += 4;
        value
    }

    /// Read an immediate operand byte at PC: a plain 3T memory read, not an
    /// M1 cycle — unlike [`Self::fetch_byte`], this does not touch R and is
    /// not reported through `on_fetch`. Used for `n`, `nn`, and displacement
    /// bytes, which the real Z80 reads as ordinary memory cycles.
    fn imm8(&mut self, io: &mut dyn Z80Io) -> u8 {
        let pc = self.regs.pc;
        let value = self.read_byte(io, pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn imm16(&mut self, io: &mut dyn Z80Io) -> u16 {
        let lo = self.imm8(io);
        let hi = self.imm8(io);
        u16::from_le_bytes([lo, hi])
    }

    fn read_byte(&mut self, io: &mut dyn Z80Io, addr: u16) -> u8 {
        let delay = io.contend_memory(self.t_states, addr);
        self.t_states += u64::from(delay);
        let value = io.read_mem(addr);
        self.t_states += 3;
        value
    }

    fn write_byte(&mut self, io: &mut dyn Z80Io, addr: u16, value: u8) {
        let delay = io.contend_memory(self.t_states, addr);
        self.t_states += u64::from(delay);
        io.write_mem(addr, value);
        self.t_states += 3;
    }

    fn read_word(&mut self, io: &mut dyn Z80Io, addr: u16) -> u16 {
        let lo = self.read_byte(io, addr);
        let hi = self.read_byte(io, addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write_word(&mut self, io: &mut dyn Z80Io, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(io, addr, lo);
        self.write_byte(io, addr.wrapping_add(1), hi);
    }

    fn internal(&mut self, t_states: u32) {
        self.t_states += u64::from(t_states);
    }

    fn in_port(&mut self, io: &mut dyn Z80Io, port: u16) -> u8 {
        let delay = io.contend_port(self.t_states, port);
        self.t_states += u64::from(delay);
        let value = io.read_port(port);
        self.t_states += 4;
        value
    }

    fn out_port(&mut self, io: &mut dyn Z80Io, port: u16, value: u8) {
        let delay = io.contend_port(self.t_states, port);
        self.t_states += u64::from(delay);
        io.write_port(port, value);
        self.t_states += 4;
    }

    fn push(&mut self, io: &mut dyn Z80Io, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_byte(io, self.regs.sp, (value >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_byte(io, self.regs.sp, value as u8);
    }

    fn pop(&mut self, io: &mut dyn Z80Io) -> u16 {
        let lo = self.read_byte(io, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.read_byte(io, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    // -- top-level step ------------------------------------------------

    /// Execute one instruction (or accept one pending interrupt, or burn
    /// one HALT cycle) and return the T-states it took.
    pub fn step(&mut self, io: &mut dyn Z80Io) -> u32 {
        let start = self.t_states;

        if self.pending_nmi {
            self.pending_nmi = false;
            self.accept_nmi(io);
            return (self.t_states - start) as u32;
        }

        if self.pending_int && self.regs.iff1 && !self.ei_delay {
            self.pending_int = false;
            self.accept_int(io);
            return (self.t_states - start) as u32;
        }

        if self.regs.halted {
            // HALT keeps re-fetching at the same PC; the fetch is still a
            // contended M1 cycle if PC lands in a contended bank.
            let delay = io.contend_memory(self.t_states, self.regs.pc);
            self.t_states += u64::from(delay);
            self.regs.inc_r();
            self.internal(4);
            return (self.t_states - start) as u32;
        }

        self.prev_q = self.regs.q;
        self.flags_touched = false;
        let was_ei_delay = self.ei_delay;
        self.ei_delay = false;

        self.dispatch(io);

        if was_ei_delay {
            self.regs.iff1 = true;
            self.regs.iff2 = true;
        }
        self.regs.q = if self.flags_touched { self.regs.f } else { 0 };

        (self.t_states - start) as u32
    }

    /// Set `EI`'s one-instruction delay in motion; called by the `EI`
    /// opcode handler.
    fn request_ei_delay(&mut self) {
        self.ei_delay = true;
    }

    fn dispatch(&mut self, io: &mut dyn Z80Io) {
        let opcode = self.fetch_byte(io);
        match opcode {
            0xDD => self.dispatch_indexed(io, Index::Ix),
            0xFD => self.dispatch_indexed(io, Index::Iy),
            0xCB => {
                let op = self.fetch_byte(io);
                cb::execute(self, io, op, None);
            }
            0xED => ed::execute(self, io),
            _ => unprefixed::execute(self, io, opcode),
        }
    }

    /// Continue a DD/FD chain. Per the real CPU, a run of DD/FD prefixes
    /// each cost a plain 4T fetch and only the *last* one before a
    /// non-prefix (or CB) byte has any effect; a following ED cancels the
    /// index prefix entirely and falls through to the ED decoder.
    fn dispatch_indexed(&mut self, io: &mut dyn Z80Io, index: Index) {
        let opcode = self.fetch_byte(io);
        match opcode {
            0xDD => self.dispatch_indexed(io, Index::Ix),
            0xFD => self.dispatch_indexed(io, Index::Iy),
            0xED => ed::execute(self, io),
            0xCB => {
                // The displacement and the trailing opcode byte are plain
                // memory reads on real hardware, not M1 fetch cycles: no R
                // increment, 3T each instead of 4T.
                let base = indexed::index_addr(self, index);
                let displacement = self.read_byte(io, self.regs.pc) as i8;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                let op = self.read_byte(io, self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                let addr = base.wrapping_add(displacement as i16 as u16);
                self.regs.wz = addr;
                self.internal(2);
                cb::execute(self, io, op, Some(addr));
            }
            _ => indexed::execute(self, io, opcode, index),
        }
    }

    fn accept_nmi(&mut self, io: &mut dyn Z80Io) {
        self.regs.halted = false;
        self.regs.iff2 = self.regs.iff1;
        self.regs.iff1 = false;
        self.internal(5);
        let pc = self.regs.pc;
        self.push(io, pc);
        self.regs.pc = 0x0066;
    }

    fn accept_int(&mut self, io: &mut dyn Z80Io) {
        self.regs.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.regs.inc_r();
        match self.regs.im {
            2 => {
                self.internal(7);
                let pc = self.regs.pc;
                self.push(io, pc);
                let vector = (u16::from(self.regs.i) << 8) | 0xFF;
                let target = self.read_word(io, vector);
                self.regs.wz = target;
                self.regs.pc = target;
            }
            _ => {
                self.internal(7);
                let pc = self.regs.pc;
                self.push(io, pc);
                self.regs.pc = 0x0038;
                self.regs.wz = 0x0038;
            }
        }
    }
}

/// Test-only escape hatches for driving the CPU from external conformance
/// vectors (e.g. single-step test suites), which need to pin down state
/// `step()` would otherwise never let you set directly.
#[cfg(feature = "test-utils")]
impl Z80 {
    pub fn force_pc(&mut self, pc: u16) {
        self.regs.pc = pc;
    }

    pub fn force_sp(&mut self, sp: u16) {
        self.regs.sp = sp;
    }

    /// Reset the T-state counter, so a single test case's cycle count
    /// doesn't have to account for whatever ran before it.
    pub fn set_t_states(&mut self, t_states: u64) {
        self.t_states = t_states;
    }
}

/// Shared ALU-and-flags glue used by more than one decode module.
pub(crate) fn apply_alu(cpu: &mut Z80, op: tables::AluOp, operand: u8) {
    let a = cpu.regs.a;
    let (result, f) = match op {
        tables::AluOp::Add => crate::alu::add8(a, operand, 0),
        tables::AluOp::Adc => crate::alu::add8(a, operand, cpu.regs.f & CF),
        tables::AluOp::Sub => crate::alu::sub8(a, operand, 0),
        tables::AluOp::Sbc => crate::alu::sub8(a, operand, cpu.regs.f & CF),
        tables::AluOp::And => crate::alu::and8(a, operand),
        tables::AluOp::Xor => crate::alu::xor8(a, operand),
        tables::AluOp::Or => crate::alu::or8(a, operand),
        tables::AluOp::Cp => {
            let f = crate::alu::cp8(a, operand);
            cpu.set_flags(f);
            return;
        }
    };
    cpu.regs.a = result;
    cpu.set_flags(f);
}

pub(crate) fn read_reg8(cpu: &mut Z80, io: &mut dyn Z80Io, reg: tables::Reg8) -> u8 {
    use tables::Reg8;
    match reg {
        Reg8::B => cpu.regs.b,
        Reg8::C => cpu.regs.c,
        Reg8::D => cpu.regs.d,
        Reg8::E => cpu.regs.e,
        Reg8::H => cpu.regs.h,
        Reg8::L => cpu.regs.l,
        Reg8::A => cpu.regs.a,
        Reg8::HlInd => {
            let addr = cpu.regs.hl();
            cpu.read_byte(io, addr)
        }
    }
}

pub(crate) fn write_reg8(cpu: &mut Z80, io: &mut dyn Z80Io, reg: tables::Reg8, value: u8) {
    use tables::Reg8;
    match reg {
        Reg8::B => cpu.regs.b = value,
        Reg8::C => cpu.regs.c = value,
        Reg8::D => cpu.regs.d = value,
        Reg8::E => cpu.regs.e = value,
        Reg8::H => cpu.regs.h = value,
        Reg8::L => cpu.regs.l = value,
        Reg8::A => cpu.regs.a = value,
        Reg8::HlInd => {
            let addr = cpu.regs.hl();
            cpu.write_byte(io, addr, value);
        }
    }
}

pub(crate) fn read_rp(cpu: &Z80, rp: tables::Reg16) -> u16 {
    use tables::Reg16;
    match rp {
        Reg16::Bc => cpu.regs.bc(),
        Reg16::De => cpu.regs.de(),
        Reg16::Hl => cpu.regs.hl(),
        Reg16::Sp => cpu.regs.sp,
    }
}

pub(crate) fn write_rp(cpu: &mut Z80, rp: tables::Reg16, value: u16) {
    use tables::Reg16;
    match rp {
        Reg16::Bc => cpu.regs.set_bc(value),
        Reg16::De => cpu.regs.set_de(value),
        Reg16::Hl => cpu.regs.set_hl(value),
        Reg16::Sp => cpu.regs.sp = value,
    }
}

pub(crate) fn read_rp2(cpu: &Z80, rp: tables::Reg16Alt) -> u16 {
    use tables::Reg16Alt;
    match rp {
        Reg16Alt::Bc => cpu.regs.bc(),
        Reg16Alt::De => cpu.regs.de(),
        Reg16Alt::Hl => cpu.regs.hl(),
        Reg16Alt::Af => cpu.regs.af(),
    }
}

pub(crate) fn write_rp2(cpu: &mut Z80, rp: tables::Reg16Alt, value: u16) {
    use tables::Reg16Alt;
    match rp {
        Reg16Alt::Bc => cpu.regs.set_bc(value),
        Reg16Alt::De => cpu.regs.set_de(value),
        Reg16Alt::Hl => cpu.regs.set_hl(value),
        Reg16Alt::Af => cpu.regs.set_af(value),
    }
}

pub(crate) fn check_cond(cpu: &Z80, cond: tables::Cond) -> bool {
    use tables::Cond;
    let f = cpu.regs.f;
    match cond {
        Cond::Nz => f & ZF == 0,
        Cond::Z => f & ZF != 0,
        Cond::Nc => f & CF == 0,
        Cond::C => f & CF != 0,
        Cond::Po => f & PF == 0,
        Cond::Pe => f & PF != 0,
        Cond::P => f & SF == 0,
        Cond::M => f & SF != 0,
    }
}
