//! Memory/IO contention as pure functions of an absolute frame T-state,
//! anchored by the machine profile's contention-start T-state rather than
//! a ticked beam position — the driver calls these once per bus cycle and
//! adds the result to the CPU's T-state counter.

use crate::UlaTiming;

/// Contention delay pattern, repeats every 8 T-states within the 128
/// T-state paper window of each screen line.
const CONTENTION_PATTERN: [u8; 8] = [6, 5, 4, 3, 2, 1, 0, 0];

/// Width, in T-states, of the contended window at the start of each screen
/// line.
const CONTENTION_WINDOW: u32 = 128;

/// Number of screen (paper) lines contention applies to.
const SCREEN_LINES: u32 = 192;

/// Contention delay for a memory access at `t_state`, given whether the
/// target address is in contended RAM. Pentagon (`contention_start_tstate
/// == None`) always reports 0.
#[must_use]
pub fn contention_delay(timing: &UlaTiming, t_state: u32, contended: bool) -> u8 {
    if !contended {
        return 0;
    }
    delay_at(timing, t_state)
}

/// Contention delay for an IO access at `t_state`. `ula_port` is true when
/// the port's bit 0 is clear (a ULA-decoded even port); `contended_high` is
/// true when the port's high byte falls in the contended RAM window.
#[must_use]
pub fn io_contention_delay(timing: &UlaTiming, t_state: u32, ula_port: bool, contended_high: bool) -> u8 {
    match (contended_high, ula_port) {
        (false, false) => 0,
        (false, true) => delay_at(timing, t_state.wrapping_add(1)),
        (true, true) => {
            let d0 = delay_at(timing, t_state);
            let d1 = delay_at(timing, t_state + 1 + u32::from(d0));
            d0 + d1
        }
        (true, false) => {
            let d0 = delay_at(timing, t_state);
            let d1 = delay_at(timing, t_state + 1 + u32::from(d0));
            let d2 = delay_at(timing, t_state + 2 + u32::from(d0) + u32::from(d1));
            let d3 = delay_at(timing, t_state + 3 + u32::from(d0) + u32::from(d1) + u32::from(d2));
            d0 + d1 + d2 + d3
        }
    }
}

/// Look up the contention pattern value for an absolute frame T-state,
/// anchored at the machine's per-line contention-start T-state and
/// repeating every `tstates_per_line` for `SCREEN_LINES` lines.
fn delay_at(timing: &UlaTiming, t_state: u32) -> u8 {
    let Some(start) = timing.contention_start_tstate else {
        return 0;
    };
    if t_state < start {
        return 0;
    }
    let rel = t_state - start;
    let line = rel / u32::from(timing.tstates_per_line);
    if line >= SCREEN_LINES {
        return 0;
    }
    let offset = rel % u32::from(timing.tstates_per_line);
    if offset >= CONTENTION_WINDOW {
        return 0;
    }
    CONTENTION_PATTERN[(offset % 8) as usize]
}
