//! ED-prefixed opcode decode: 16-bit arithmetic against HL, block
//! transfer/compare/IO instructions, `I`/`R` loads, `NEG`, `RETN`/`RETI`,
//! interrupt mode selection, `RRD`/`RLD`. Unlisted ED opcodes (`x` in
//! `{0,3}`, or `x==2` with `y<4`) are documented as an 8 T-state no-op —
//! the Z80 has no truly undefined opcode.

use super::tables::RP;
use super::tables::decompose;
use super::{read_rp, write_rp, Z80};
use crate::alu;
use crate::flags::{parity, sz53, CF, HF, NF, PF};
use crate::io::Z80Io;

pub(super) fn execute(cpu: &mut Z80, io: &mut dyn Z80Io) {
    let opcode = cpu.fetch_byte(io);
    let (x, y, z, p, q) = decompose(opcode);
    match (x, z) {
        (1, 0) => {
            let port = cpu.regs.bc();
            let value = cpu.in_port(io, port);
            cpu.regs.wz = port.wrapping_add(1);
            let f = (cpu.regs.f & CF) | sz53(value) | parity(value);
            cpu.set_flags(f);
            if y != 6 {
                super::write_reg8(cpu, io, super::tables::R8[y as usize], value);
            }
        }
        (1, 1) => {
            let port = cpu.regs.bc();
            let value = if y == 6 { 0 } else { super::read_reg8(cpu, io, super::tables::R8[y as usize]) };
            cpu.out_port(io, port, value);
            cpu.regs.wz = port.wrapping_add(1);
        }
        (1, 2) if q == 0 => {
            let hl = cpu.regs.hl();
            let operand = read_rp(cpu, RP[p as usize]);
            cpu.regs.wz = hl.wrapping_add(1);
            cpu.internal(7);
            let (result, f) = alu::sbc16(hl, operand, cpu.regs.f & CF);
            cpu.regs.set_hl(result);
            cpu.set_flags(f);
        }
        (1, 2) => {
            let hl = cpu.regs.hl();
            let operand = read_rp(cpu, RP[p as usize]);
            cpu.regs.wz = hl.wrapping_add(1);
            cpu.internal(7);
            let (result, f) = alu::adc16(hl, operand, cpu.regs.f & CF);
            cpu.regs.set_hl(result);
            cpu.set_flags(f);
        }
        (1, 3) if q == 0 => {
            let addr = cpu.imm16(io);
            let value = read_rp(cpu, RP[p as usize]);
            cpu.write_word(io, addr, value);
            cpu.regs.wz = addr.wrapping_add(1);
        }
        (1, 3) => {
            let addr = cpu.imm16(io);
            let value = cpu.read_word(io, addr);
            write_rp(cpu, RP[p as usize], value);
            cpu.regs.wz = addr.wrapping_add(1);
        }
        (1, 4) => {
            let a = cpu.regs.a;
            let (result, f) = alu::sub8(0, a, 0);
            cpu.regs.a = result;
            cpu.set_flags(f);
        }
        (1, 5) => {
            let pc = cpu.pop(io);
            cpu.regs.pc = pc;
            cpu.regs.wz = pc;
            cpu.regs.iff1 = cpu.regs.iff2;
            // RETI (y==1) and the undocumented RETN variants behave the
            // same here; a host-level peripheral ack hook is out of scope.
            let _ = y;
        }
        (1, 6) => {
            cpu.regs.im = [0, 0, 1, 2][(y % 4) as usize];
        }
        (1, 7) => match y {
            0 => {
                cpu.internal(1);
                cpu.regs.i = cpu.regs.a;
            }
            1 => {
                cpu.internal(1);
                cpu.regs.r = cpu.regs.a & 0x7F;
                cpu.regs.r7 = cpu.regs.a & 0x80 != 0;
            }
            2 => {
                cpu.internal(1);
                cpu.regs.a = cpu.regs.i;
                let iff2 = cpu.regs.iff2;
                let mut f = (cpu.regs.f & CF) | sz53(cpu.regs.a);
                if iff2 {
                    f |= PF;
                }
                cpu.set_flags(f);
            }
            3 => {
                cpu.internal(1);
                cpu.regs.a = cpu.regs.r_full();
                let iff2 = cpu.regs.iff2;
                let mut f = (cpu.regs.f & CF) | sz53(cpu.regs.a);
                if iff2 {
                    f |= PF;
                }
                cpu.set_flags(f);
            }
            4 => rld(cpu, io),
            5 => rrd(cpu, io),
            _ => {} // ED NOP, undocumented
        },
        (2, _) if y >= 4 => block_op(cpu, io, y, z),
        _ => {} // ED NOP: x in {0,3}, or x==2 with y<4
    }
}

fn rld(cpu: &mut Z80, io: &mut dyn Z80Io) {
    let addr = cpu.regs.hl();
    let mem = cpu.read_byte(io, addr);
    let a = cpu.regs.a;
    let new_mem = (mem << 4) | (a & 0x0F);
    let new_a = (a & 0xF0) | (mem >> 4);
    cpu.internal(4);
    cpu.write_byte(io, addr, new_mem);
    cpu.regs.a = new_a;
    cpu.regs.wz = addr.wrapping_add(1);
    let f = (cpu.regs.f & CF) | sz53(new_a) | parity(new_a);
    cpu.set_flags(f);
}

fn rrd(cpu: &mut Z80, io: &mut dyn Z80Io) {
    let addr = cpu.regs.hl();
    let mem = cpu.read_byte(io, addr);
    let a = cpu.regs.a;
    let new_mem = (a << 4) | (mem >> 4);
    let new_a = (a & 0xF0) | (mem & 0x0F);
    cpu.internal(4);
    cpu.write_byte(io, addr, new_mem);
    cpu.regs.a = new_a;
    cpu.regs.wz = addr.wrapping_add(1);
    let f = (cpu.regs.f & CF) | sz53(new_a) | parity(new_a);
    cpu.set_flags(f);
}

/// Block LDxx/CPxx/INxx/OUTxx, `z` selects LD(0)/CP(1)/IN(2)/OUT(3), `y-4`
/// selects the direction/repeat combination.
fn block_op(cpu: &mut Z80, io: &mut dyn Z80Io, y: u8, z: u8) {
    let increment = matches!(y, 4 | 6);
    let repeat = y >= 6;
    match z {
        0 => block_ld(cpu, io, increment, repeat),
        1 => block_cp(cpu, io, increment, repeat),
        2 => block_in(cpu, io, increment, repeat),
        _ => block_out(cpu, io, increment, repeat),
    }
}

fn step_hl_de(cpu: &mut Z80, increment: bool) {
    let hl = cpu.regs.hl();
    let de = cpu.regs.de();
    if increment {
        cpu.regs.set_hl(hl.wrapping_add(1));
        cpu.regs.set_de(de.wrapping_add(1));
    } else {
        cpu.regs.set_hl(hl.wrapping_sub(1));
        cpu.regs.set_de(de.wrapping_sub(1));
    }
}

fn block_ld(cpu: &mut Z80, io: &mut dyn Z80Io, increment: bool, repeat: bool) {
    let hl = cpu.regs.hl();
    let de = cpu.regs.de();
    let value = cpu.read_byte(io, hl);
    cpu.write_byte(io, de, value);
    cpu.internal(2);
    step_hl_de(cpu, increment);
    let bc = cpu.regs.bc().wrapping_sub(1);
    cpu.regs.set_bc(bc);

    let n = value.wrapping_add(cpu.regs.a);
    let mut f = (cpu.regs.f & (0x80 | 0x40 | 0x01)) | (n & 0x08);
    if n & 0x02 != 0 {
        f |= 0x20;
    }
    if bc != 0 {
        f |= PF;
    }
    cpu.set_flags(f);

    if repeat && bc != 0 {
        cpu.internal(5);
        cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
        cpu.regs.wz = cpu.regs.pc.wrapping_add(1);
    }
}

fn block_cp(cpu: &mut Z80, io: &mut dyn Z80Io, increment: bool, repeat: bool) {
    let hl = cpu.regs.hl();
    let value = cpu.read_byte(io, hl);
    cpu.internal(5);
    let a = cpu.regs.a;
    let result = a.wrapping_sub(value);
    let half = (a & 0x0F) < (value & 0x0F);
    let n = if half { result.wrapping_sub(1) } else { result };

    if increment {
        cpu.regs.set_hl(hl.wrapping_add(1));
        cpu.regs.wz = cpu.regs.wz.wrapping_add(1);
    } else {
        cpu.regs.set_hl(hl.wrapping_sub(1));
        cpu.regs.wz = cpu.regs.wz.wrapping_sub(1);
    }
    let bc = cpu.regs.bc().wrapping_sub(1);
    cpu.regs.set_bc(bc);

    let mut f = (cpu.regs.f & CF) | NF | sz53(result);
    if half {
        f |= HF;
    }
    f = (f & !0x28) | (n & 0x08);
    if n & 0x02 != 0 {
        f |= 0x20;
    }
    if bc != 0 {
        f |= PF;
    }
    cpu.set_flags(f);

    if repeat && bc != 0 && result != 0 {
        cpu.internal(5);
        cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
        cpu.regs.wz = cpu.regs.pc.wrapping_add(1);
    }
}

fn block_in(cpu: &mut Z80, io: &mut dyn Z80Io, increment: bool, repeat: bool) {
    let port = cpu.regs.bc();
    cpu.internal(1);
    let value = cpu.in_port(io, port);
    let hl = cpu.regs.hl();
    cpu.write_byte(io, hl, value);
    let new_b = cpu.regs.b.wrapping_sub(1);
    cpu.regs.b = new_b;
    if increment {
        cpu.regs.set_hl(hl.wrapping_add(1));
        cpu.regs.wz = port.wrapping_add(1);
    } else {
        cpu.regs.set_hl(hl.wrapping_sub(1));
        cpu.regs.wz = port.wrapping_sub(1);
    }

    let c_adj = if increment {
        cpu.regs.c.wrapping_add(1)
    } else {
        cpu.regs.c.wrapping_sub(1)
    };
    let sum = u16::from(value) + u16::from(c_adj);
    let parity_val = ((sum as u8) & 0x07) ^ new_b;
    let mut f = sz53(new_b) | (value & 0x80).wrapping_shr(7).wrapping_mul(NF) | parity(parity_val);
    if sum > 0xFF {
        f |= HF | CF;
    }
    cpu.set_flags(f);

    if repeat && new_b != 0 {
        cpu.internal(5);
        cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
    }
}

fn block_out(cpu: &mut Z80, io: &mut dyn Z80Io, increment: bool, repeat: bool) {
    let hl = cpu.regs.hl();
    cpu.internal(1);
    let value = cpu.read_byte(io, hl);
    let new_b = cpu.regs.b.wrapping_sub(1);
    cpu.regs.b = new_b;
    let port = cpu.regs.bc();
    cpu.out_port(io, port, value);
    if increment {
        cpu.regs.set_hl(hl.wrapping_add(1));
    } else {
        cpu.regs.set_hl(hl.wrapping_sub(1));
    }
    cpu.regs.wz = port.wrapping_add(if increment { 1 } else { u16::MAX });

    let l = cpu.regs.l;
    let sum = u16::from(value) + u16::from(l);
    let parity_val = ((sum as u8) & 0x07) ^ new_b;
    let mut f = sz53(new_b) | (value & 0x80).wrapping_shr(7).wrapping_mul(NF) | parity(parity_val);
    if sum > 0xFF {
        f |= HF | CF;
    }
    cpu.set_flags(f);

    if repeat && new_b != 0 {
        cpu.internal(5);
        cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
    }
}
