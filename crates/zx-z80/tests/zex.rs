//! Minimal CP/M harness for ZEXDOC/ZEXALL.
//!
//! CP/M memory layout:
//! - 0x0000: Warm boot (we use HALT)
//! - 0x0005: BDOS entry (intercepted before execution)
//! - 0x0006-0x0007: Top of TPA (programs read this for stack init)
//! - 0x0100: Program load address (TPA start)

use std::io::Write;
use zx_z80::{Z80, Z80Io};

struct SimpleBus {
    mem: Vec<u8>,
}

impl SimpleBus {
    fn new() -> Self {
        Self { mem: vec![0; 0x10000] }
    }

    fn load(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.mem[start..start + data.len()].copy_from_slice(data);
    }

    fn peek(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }
}

impl Z80Io for SimpleBus {
    fn read_mem(&mut self, address: u16) -> u8 {
        self.mem[address as usize]
    }
    fn write_mem(&mut self, address: u16, value: u8) {
        self.mem[address as usize] = value;
    }
    fn read_port(&mut self, _port: u16) -> u8 {
        0xFF
    }
    fn write_port(&mut self, _port: u16, _value: u8) {}
}

fn run_zex(binary: &[u8]) -> bool {
    let mut bus = SimpleBus::new();

    bus.load(0x0100, binary);
    bus.load(0x0000, &[0x76]); // HALT: warm boot
    bus.load(0x0005, &[0xC9]); // RET: BDOS entry, intercepted below
    bus.load(0x0006, &[0x00, 0xFE]); // top of TPA = 0xFE00

    let mut cpu = Z80::new();
    cpu.reset();
    cpu.registers_mut().pc = 0x0100;

    let mut output = String::new();
    let mut instructions: u64 = 0;

    loop {
        let pc = cpu.pc();

        if pc == 0x0000 {
            eprintln!("Warm boot at instruction {instructions}");
            break;
        }

        if pc == 0x0005 {
            let func = cpu.registers().c;
            match func {
                2 => {
                    let ch = cpu.registers().e as char;
                    eprint!("{ch}");
                    std::io::stderr().flush().unwrap();
                    output.push(ch);
                }
                9 => {
                    let mut addr = cpu.registers().de();
                    loop {
                        let ch = bus.peek(addr);
                        if ch == b'$' {
                            break;
                        }
                        eprint!("{}", ch as char);
                        output.push(ch as char);
                        addr = addr.wrapping_add(1);
                    }
                    std::io::stderr().flush().unwrap();
                }
                other => eprintln!("\nUnknown BDOS function: {other}"),
            }
            // Simulate the RET we placed at 0x0005.
            let ret = cpu.registers().sp;
            let lo = bus.peek(ret);
            let hi = bus.peek(ret.wrapping_add(1));
            cpu.registers_mut().sp = ret.wrapping_add(2);
            cpu.registers_mut().pc = u16::from_le_bytes([lo, hi]);
            continue;
        }

        cpu.step(&mut bus);
        instructions += 1;
        if instructions % 1_000_000 == 0 {
            eprintln!("[{instructions} instructions]");
        }

        if cpu.is_halted() {
            eprintln!("HALT at instruction {instructions}");
            break;
        }
    }

    eprintln!("\nTotal: {instructions} instructions");
    eprintln!("Output length: {} chars", output.len());

    !output.contains("ERROR")
}

#[test]
#[ignore = "requires tests/data/zexdoc.com, not vendored"]
fn zexdoc() {
    let binary = std::fs::read("tests/data/zexdoc.com").expect("tests/data/zexdoc.com not found");
    assert!(run_zex(&binary), "ZEXDOC failed");
}

#[test]
#[ignore = "requires tests/data/zexall.com, not vendored"]
fn zexall() {
    let binary = std::fs::read("tests/data/zexall.com").expect("tests/data/zexall.com not found");
    assert!(run_zex(&binary), "ZEXALL failed");
}
