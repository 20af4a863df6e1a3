//! CB-prefixed opcode decode: rotate/shift, BIT, RES, SET.
//!
//! When `addr_override` is `Some`, this is an indexed DDCB/FDCB form: the
//! operand always comes from `(IX+d)`/`(IY+d)`, and ROT/RES/SET additionally
//! copy the result into the `z`-selected register (the well-known
//! undocumented DDCB/FDCB "copy" behaviour) unless `z == 6`.

use super::tables::{decompose, Reg8, R8};
use super::{read_reg8, write_reg8, Z80};
use crate::alu;
use crate::flags::{CF, HF, PF, SF, XF, YF, ZF};
use crate::io::Z80Io;

pub(super) fn execute(cpu: &mut Z80, io: &mut dyn Z80Io, opcode: u8, addr_override: Option<u16>) {
    let (x, y, z, _, _) = decompose(opcode);
    let reg = R8[z as usize];
    let is_memory_target = addr_override.is_some() || reg == Reg8::HlInd;

    let value = if let Some(addr) = addr_override {
        cpu.read_byte(io, addr)
    } else {
        read_reg8(cpu, io, reg)
    };

    match x {
        0 => {
            let carry_in = cpu.regs.f & CF != 0;
            let (result, f) = alu::rotate_shift(y, value, carry_in);
            store(cpu, io, reg, addr_override, result);
            cpu.set_flags(f);
        }
        1 => {
            let bit_set = value & (1 << y) != 0;
            let mut f = (cpu.regs.f & CF) | HF;
            if !bit_set {
                f |= ZF | PF;
            }
            if y == 7 && bit_set {
                f |= SF;
            }
            // Register-direct BIT reads its undocumented bits from the
            // tested byte; any (HL)/(IX+d)/(IY+d) form reads them from
            // MEMPTR's high byte instead, since the real hardware derives
            // them from the address bus latch, not the data bus.
            let xy_source = if is_memory_target {
                (cpu.regs.wz >> 8) as u8
            } else {
                value
            };
            f |= xy_source & (XF | YF);
            if is_memory_target {
                cpu.internal(1);
            }
            cpu.set_flags(f);
        }
        2 => {
            let result = value & !(1 << y);
            store(cpu, io, reg, addr_override, result);
        }
        _ => {
            let result = value | (1 << y);
            store(cpu, io, reg, addr_override, result);
        }
    }
}

fn store(cpu: &mut Z80, io: &mut dyn Z80Io, reg: Reg8, addr_override: Option<u16>, result: u8) {
    if let Some(addr) = addr_override {
        cpu.internal(1);
        cpu.write_byte(io, addr, result);
        if reg != Reg8::HlInd {
            write_reg8(cpu, io, reg, result);
        }
    } else if reg == Reg8::HlInd {
        cpu.internal(1);
        write_reg8(cpu, io, reg, result);
    } else {
        write_reg8(cpu, io, reg, result);
    }
}
