//! The machine aggregate: wires `zx-z80`, `zx-memory` and `zx-ula` into a
//! runnable ZX Spectrum. This crate owns the machine-profile constant
//! table and the workspace's only `Z80Io` implementation.

mod bus;
mod error;
mod machine;
mod observable;
mod profile;
mod snapshot;

pub use bus::MachineBus;
pub use error::Error;
pub use machine::Machine;
pub use profile::{MachineConfig, MachineProfile, TimingTunables};
pub use snapshot::CpuState;

pub use zx_core::{Bus, Observable, Value};
pub use zx_memory::{MachineVariant, Page, PagingLatch, PAGE_SIZE};
pub use zx_ula::Key;
