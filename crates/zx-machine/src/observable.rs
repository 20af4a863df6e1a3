//! `zx_core::Observable` for the aggregate: dotted-path queries routed to
//! whichever component owns the named state, for debuggers and test
//! harnesses.

use zx_core::{Observable, Value};

use crate::Machine;

const QUERY_PATHS: &[&str] = &[
    "cpu.pc",
    "cpu.sp",
    "cpu.a",
    "cpu.f",
    "cpu.bc",
    "cpu.de",
    "cpu.hl",
    "cpu.ix",
    "cpu.iy",
    "cpu.i",
    "cpu.r",
    "cpu.iff1",
    "cpu.iff2",
    "cpu.im",
    "cpu.halted",
    "cpu.t_states",
    "ula.border",
    "ula.ear",
    "ula.mic",
    "memory.<address>",
];

impl Observable for Machine {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            let regs = self.cpu().registers();
            return match rest {
                "pc" => Some(regs.pc.into()),
                "sp" => Some(regs.sp.into()),
                "a" => Some(regs.a.into()),
                "f" => Some(regs.f.into()),
                "bc" => Some(regs.bc().into()),
                "de" => Some(regs.de().into()),
                "hl" => Some(regs.hl().into()),
                "ix" => Some(regs.ix.into()),
                "iy" => Some(regs.iy.into()),
                "i" => Some(regs.i.into()),
                "r" => Some(regs.r_full().into()),
                "iff1" => Some(regs.iff1.into()),
                "iff2" => Some(regs.iff2.into()),
                "im" => Some(regs.im.into()),
                "halted" => Some(regs.halted.into()),
                "t_states" => Some(self.cpu().t_states().into()),
                _ => None,
            };
        }
        if let Some(rest) = path.strip_prefix("ula.") {
            let ula = self.bus().ula();
            return match rest {
                "border" => Some(ula.border_colour().into()),
                "ear" => Some(ula.ear_output().into()),
                "mic" => Some(ula.mic_output().into()),
                _ => None,
            };
        }
        if let Some(rest) = path.strip_prefix("memory.") {
            let addr = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
                u16::from_str_radix(hex, 16).ok()
            } else if let Some(hex) = rest.strip_prefix('$') {
                u16::from_str_radix(hex, 16).ok()
            } else {
                rest.parse().ok()
            };
            return addr.map(|a| Value::U8(self.bus().memory().peek(a)));
        }
        None
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}
