//! The Sinclair ULA (Uncommitted Logic Array): video generation, memory/IO
//! contention, keyboard matrix and the ULAplus palette extension.
//!
//! Unlike a pixel-clock-ticked design, this ULA is *event-driven*: the
//! driver calls [`Ula::on_port_write`]/[`Ula::on_memory_write`] whenever the
//! CPU touches something the ULA cares about, tagged with the T-state the
//! access happened at, and calls [`Ula::render_up_to`] after every
//! instruction to let the beam catch up. This mirrors how the real
//! hardware's *output* is reconstructed from a trace of bus activity rather
//! than literally ticking a 7 MHz pixel clock in lockstep with the CPU —
//! both converge on the same picture, but this one doesn't pay a per-pixel
//! closure call for every T-state of every instruction.

mod contention;
mod events;
mod keyboard;
mod palette;
pub mod profiles;
mod ula_plus;

pub use events::{BorderLog, EventLog, PaletteLog, ScreenBankLog, SmallLog};
pub use keyboard::{Key, Keyboard};
pub use palette::{grb332_to_argb, PALETTE};
pub use profiles::UlaTiming;
pub use ula_plus::UlaPlus;

/// 32x24 attribute cells over the 256x192 paper area.
pub const ATTR_COLUMNS: usize = 32;
pub const ATTR_ROWS: usize = 24;
pub const ATTR_CELLS: usize = ATTR_COLUMNS * ATTR_ROWS;

/// Paper dimensions.
pub const SCREEN_WIDTH: u32 = 256;
pub const SCREEN_HEIGHT: u32 = 192;

/// Border margin rendered around the paper area, in the framebuffer's own
/// coordinate system. Dimensions depend on the chosen border preset; all
/// timing is computed in full-border coordinates regardless.
pub const BORDER_H: u32 = 32;
pub const BORDER_V: u32 = 48;

pub const TOTAL_WIDTH: u32 = SCREEN_WIDTH + 2 * BORDER_H;
pub const TOTAL_HEIGHT: u32 = SCREEN_HEIGHT + 2 * BORDER_V;

/// T-states per paper column (8 pixels = 1 bitmap byte, 2px/T-state).
const COLUMN_TSTATES: u32 = 4;
/// T-states spanning the 256px paper row.
const SCREEN_ROW_TSTATES: u32 = SCREEN_WIDTH / 2;
/// T-states spanning one side border.
const BORDER_COL_TSTATES: u32 = BORDER_H / 2;

/// Number of recorded screen-bank changes within one frame above which
/// paper rendering is deferred to end-of-frame. The threshold distinguishing
/// true split-screen effects from simple double-buffering is empirical,
/// named here rather than inlined.
pub const SPLIT_SCREEN_THRESHOLD: usize = 2;

/// T-state adjustment applied by the driver to PUSH-class memory writes
/// before calling [`Ula::on_memory_write`]. Observed, not derived; exposed
/// so a host can tune it without forking this crate.
pub const WRITE_ADJUST_TSTATES: u32 = 5;

/// Decoded attribute byte. `bright`/`flash` and `clut` are two readings of
/// the same top two bits: standard mode uses them as BRIGHT/FLASH, ULAplus
/// mode reinterprets them as a 4-way CLUT select — which one applies is a
/// property of the ULA's mode, not of the byte, so both readings are kept
/// and [`Ula::attribute_colours`] picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attribute {
    ink: u8,
    paper: u8,
    bright: bool,
    flash: bool,
    clut: u8,
}

impl Attribute {
    fn decode(byte: u8) -> Self {
        Self {
            ink: byte & 0x07,
            paper: (byte >> 3) & 0x07,
            bright: byte & 0x40 != 0,
            flash: byte & 0x80 != 0,
            clut: (byte >> 6) & 0x03,
        }
    }
}

/// The Sinclair ULA.
pub struct Ula {
    timing: UlaTiming,
    keyboard: Keyboard,
    plus: UlaPlus,

    border_log: BorderLog,
    screen_bank_log: ScreenBankLog,
    attr_logs: Vec<SmallLog>,

    border: u8,
    ear_out: bool,
    mic_out: bool,
    ear_in: bool,

    flash_phase: bool,
    flash_frame_counter: u8,

    framebuffer: Vec<u32>,
    /// Frame-local T-state up to which border pixels have been rendered.
    border_cursor: u32,
    /// Border colour in effect as of `border_cursor`.
    border_cursor_colour: u8,
    /// Highest paper row index fully rendered this frame (eager path).
    next_paper_row: u16,
    deferred_paper: bool,
    /// Byte latched by a driver-reported M1/ULA fetch collision during the
    /// paper-drawing window ("snow" effect).
    snow_byte: Option<u8>,
}

impl Ula {
    #[must_use]
    pub fn new(timing: UlaTiming) -> Self {
        Self {
            timing,
            keyboard: Keyboard::new(),
            plus: UlaPlus::new(),
            border_log: BorderLog::default(),
            screen_bank_log: ScreenBankLog::default(),
            attr_logs: vec![SmallLog::default(); ATTR_CELLS],
            border: 7,
            ear_out: false,
            mic_out: false,
            ear_in: false,
            flash_phase: false,
            flash_frame_counter: 0,
            framebuffer: vec![0xFF00_0000; (TOTAL_WIDTH * TOTAL_HEIGHT) as usize],
            border_cursor: 0,
            border_cursor_colour: 7,
            next_paper_row: 0,
            deferred_paper: false,
            snow_byte: None,
        }
    }

    #[must_use]
    pub const fn timing(&self) -> &UlaTiming {
        &self.timing
    }

    pub fn reset(&mut self) {
        self.border = 7;
        self.ear_out = false;
        self.mic_out = false;
        self.flash_phase = false;
        self.flash_frame_counter = 0;
        self.keyboard = Keyboard::new();
        self.plus = UlaPlus::new();
        self.snow_byte = None;
    }

    /// Force the border colour directly, bypassing the port-write event
    /// log. For snapshot restore, which happens before any frame has
    /// started rendering.
    pub fn set_border(&mut self, colour: u8) {
        self.border = colour & 0x07;
    }

    // -- keyboard -------------------------------------------------------

    pub fn key_down(&mut self, key: Key) {
        self.keyboard.key_down(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.keyboard.key_up(key);
    }

    pub fn queue_extended_key(&mut self, letter: Key) {
        self.keyboard.queue_extended(letter);
    }

    /// Set the EAR input bit (tape read / external input), sampled by the
    /// next ULA port read.
    pub fn set_ear_input(&mut self, value: bool) {
        self.ear_in = value;
    }

    #[must_use]
    pub const fn mic_output(&self) -> bool {
        self.mic_out
    }

    #[must_use]
    pub const fn ear_output(&self) -> bool {
        self.ear_out
    }

    #[must_use]
    pub const fn border_colour(&self) -> u8 {
        self.border
    }

    #[must_use]
    pub const fn ula_plus(&self) -> &UlaPlus {
        &self.plus
    }

    // -- frame lifecycle --------------------------------------------------

    /// Reset all per-frame event logs to a single initial entry capturing
    /// current state. `attribute_snapshot` is the 768-byte attribute area
    /// as it stands at frame start; `screen_bank` is the currently-mapped
    /// screen bank (5 or 7) for 128K split-screen bookkeeping.
    pub fn start_frame(&mut self, attribute_snapshot: &[u8; ATTR_CELLS], screen_bank: u8) {
        self.border_log.reset();
        self.border_log.push(0, self.border);
        self.border_cursor = 0;
        self.border_cursor_colour = self.border;

        self.screen_bank_log.reset();
        self.screen_bank_log.push(0, screen_bank);

        for (cell, log) in self.attr_logs.iter_mut().enumerate() {
            log.reset(attribute_snapshot[cell]);
        }

        self.plus.start_frame();
        self.keyboard.start_frame();
        self.next_paper_row = 0;
        self.deferred_paper = self.screen_bank_log.len() > SPLIT_SCREEN_THRESHOLD;
    }

    /// Flush any remaining rendering and advance the flash phase every 16th
    /// frame. Returns the completed ARGB32 framebuffer.
    pub fn end_frame(&mut self, read_bank: &dyn Fn(u8, u16) -> u8, current_bank: u8) -> &[u32] {
        self.deferred_paper =
            self.deferred_paper || self.screen_bank_log.len() > SPLIT_SCREEN_THRESHOLD;

        if self.deferred_paper {
            self.render_all_paper_deferred(read_bank);
        } else {
            self.render_paper_rows_up_to(ATTR_ROWS as u16, read_bank, current_bank);
        }

        let frame_end = self.timing.tstates_per_frame();
        self.render_border_span(self.border_cursor, frame_end, self.border_cursor_colour);
        self.border_cursor = frame_end;

        self.flash_frame_counter += 1;
        if self.flash_frame_counter >= 16 {
            self.flash_frame_counter = 0;
            self.flash_phase = !self.flash_phase;
        }

        &self.framebuffer
    }

    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    // -- port / memory side effects --------------------------------------

    /// Port write reaching an even (ULA-decoded) port, or either ULAplus
    /// port. Other ports (0x7FFD, WD-ports) are the driver's concern.
    pub fn on_port_write(&mut self, port: u16, value: u8, t_state: u32) {
        if port & 1 == 0 {
            let t_state = self.quantize_border_t(t_state);
            self.flush_border(t_state);
            self.border = value & 0x07;
            self.ear_out = value & 0x10 != 0;
            self.mic_out = value & 0x08 != 0;
            self.border_log.push(t_state, self.border);
            self.border_cursor_colour = self.border;
        } else if port == 0xBF3B {
            self.plus.select_register(value);
        } else if port == 0xFF3B {
            self.plus.write_data(value, t_state);
        }
    }

    /// Port read from an even (ULA-decoded) port or the ULAplus data port.
    #[must_use]
    pub fn on_port_read(&mut self, port: u16) -> u8 {
        if port & 1 == 0 {
            let high_byte = (port >> 8) as u8;
            let rows = self.keyboard.scan(high_byte) & 0x1F;
            let ear_bit = u8::from(self.ear_in) << 6;
            0xA0 | ear_bit | rows
        } else if port == 0xFF3B {
            self.plus.read_data()
        } else {
            0xFF
        }
    }

    /// Record a write that lands in the current screen bank's attribute
    /// region (`0x5800..0x5AFF` relative to that bank). The driver is
    /// responsible for only calling this for such writes.
    pub fn on_memory_write(&mut self, address: u16, value: u8, t_state: u32) {
        if !(0x5800..=0x5AFF).contains(&address) {
            return;
        }
        let cell = usize::from(address - 0x5800);
        if cell < ATTR_CELLS {
            self.attr_logs[cell].push(t_state, value);
        }
    }

    pub fn on_screen_bank_change(&mut self, new_bank: u8, t_state: u32) {
        self.screen_bank_log.push(t_state, new_bank);
    }

    // -- contention -------------------------------------------------------

    #[must_use]
    pub fn contention_delay(&self, t_state: u64, contended: bool) -> u8 {
        let frame_t = self.frame_local(t_state);
        contention::contention_delay(&self.timing, frame_t, contended)
    }

    #[must_use]
    pub fn io_contention_delay(&self, t_state: u64, port: u16, contended_high: bool) -> u8 {
        let frame_t = self.frame_local(t_state);
        let ula_port = port & 1 == 0;
        contention::io_contention_delay(&self.timing, frame_t, ula_port, contended_high)
    }

    fn frame_local(&self, t_state: u64) -> u32 {
        (t_state % u64::from(self.timing.tstates_per_frame())) as u32
    }

    /// Quantise a border-change T-state down to the machine's border
    /// quantum: 4-T boundaries on the Ferranti ULA, 1-T (unquantised) on
    /// Pentagon's clone ULA.
    fn quantize_border_t(&self, t_state: u32) -> u32 {
        let quantum = u32::from(self.timing.border_quantum).max(1);
        (t_state / quantum) * quantum
    }

    // -- rendering ----------------------------------------------------------

    /// Called after every instruction: renders border pixels up to
    /// `t_state` and, unless this frame is using deferred paper rendering,
    /// any paper lines the beam has now fully passed.
    pub fn render_up_to(&mut self, t_state: u32, read_bank: &dyn Fn(u8, u16) -> u8, current_bank: u8) {
        self.flush_border(t_state);

        if self.deferred_paper {
            return;
        }

        let frame_t = t_state.min(self.timing.tstates_per_frame());
        let first_screen_line = u32::from(self.timing.first_screen_line);
        let tpl = u32::from(self.timing.tstates_per_line);
        if frame_t < first_screen_line * tpl {
            return;
        }
        let lines_elapsed = (frame_t - first_screen_line * tpl) / tpl;
        let rows_passed = (lines_elapsed + 1).min(ATTR_ROWS as u32) as u16;
        if rows_passed > self.next_paper_row {
            self.render_paper_rows_up_to(rows_passed, read_bank, current_bank);
        }
    }

    /// Render any outstanding border span up to `t_state` using whatever
    /// colour was in effect, without changing what colour is "in effect" —
    /// that only changes when a border write happens (see
    /// [`Ula::on_port_write`]).
    fn flush_border(&mut self, t_state: u32) {
        let frame_t = t_state.min(self.timing.tstates_per_frame());
        if frame_t > self.border_cursor {
            self.render_border_span(self.border_cursor, frame_t, self.border_cursor_colour);
            self.border_cursor = frame_t;
        }
    }

    /// Resolve the border colour in effect at `t_state`. In ULAplus mode
    /// this replays the palette log for register 8 rather than trusting
    /// the live (end-of-frame) palette, so a raster-effect demo that
    /// rewrites register 8 mid-frame renders correctly: every visible
    /// pixel's colour equals the colour in effect at that pixel's T-state.
    fn border_colour_argb(&self, index: u8, t_state: u32) -> u32 {
        if self.plus.is_enabled() {
            grb332_to_argb(self.plus.entry_at(8, t_state))
        } else {
            PALETTE[usize::from(index) & 0x0F]
        }
    }

    fn render_border_span(&mut self, from: u32, to: u32, colour: u8) {
        if from >= to {
            return;
        }
        let plus_enabled = self.plus.is_enabled();
        let tpl = u32::from(self.timing.tstates_per_line);
        let first_screen_line = u32::from(self.timing.first_screen_line);
        let top = first_screen_line.saturating_sub(BORDER_V);

        let mut t = from;
        while t < to {
            let line = t / tpl;
            let col = t % tpl;
            if line >= top {
                let visible_y = line - top;
                if visible_y < TOTAL_HEIGHT {
                    let is_screen_row =
                        visible_y >= BORDER_V && visible_y < BORDER_V + SCREEN_HEIGHT;
                    if let Some(x) = self.border_x(col, tpl) {
                        if !(is_screen_row && col < SCREEN_ROW_TSTATES) {
                            let argb = if plus_enabled {
                                self.border_colour_argb(colour, t)
                            } else {
                                PALETTE[usize::from(colour) & 0x0F]
                            };
                            self.put_pixel(x, visible_y, argb);
                            self.put_pixel(x + 1, visible_y, argb);
                        }
                    }
                }
            }
            t += 1;
        }
    }

    /// Framebuffer x for a within-line T-state, or `None` during
    /// horizontal blanking (not rendered).
    fn border_x(&self, col: u32, tpl: u32) -> Option<u32> {
        if col < SCREEN_ROW_TSTATES {
            Some(BORDER_H + col * 2)
        } else if col < SCREEN_ROW_TSTATES + BORDER_COL_TSTATES {
            Some(BORDER_H + SCREEN_WIDTH + (col - SCREEN_ROW_TSTATES) * 2)
        } else if col >= tpl - BORDER_COL_TSTATES {
            Some((col - (tpl - BORDER_COL_TSTATES)) * 2)
        } else {
            None
        }
    }

    fn put_pixel(&mut self, x: u32, y: u32, colour: u32) {
        if x < TOTAL_WIDTH && y < TOTAL_HEIGHT {
            self.framebuffer[(y * TOTAL_WIDTH + x) as usize] = colour;
        }
    }

    fn paper_line_start_t(&self, row: u16) -> u32 {
        let first = u32::from(self.timing.first_screen_line);
        let tpl = u32::from(self.timing.tstates_per_line);
        (first + u32::from(row)) * tpl
    }

    /// Eager path: render paper rows `[self.next_paper_row, upto)` from the
    /// single currently-mapped bank.
    fn render_paper_rows_up_to(&mut self, upto: u16, read_bank: &dyn Fn(u8, u16) -> u8, bank: u8) {
        while self.next_paper_row < upto {
            let row = self.next_paper_row;
            self.render_paper_row_single_bank(row, read_bank, bank);
            self.next_paper_row += 1;
        }
    }

    /// Deferred path: replay the screen-bank log per column to pick the
    /// bank that was mapped when each column was drawn.
    fn render_all_paper_deferred(&mut self, read_bank: &dyn Fn(u8, u16) -> u8) {
        for row in 0..ATTR_ROWS as u16 {
            self.render_paper_row_bank_aware(row, read_bank);
        }
    }

    fn attribute_at(&self, row: u16, col: u16, t_state: u32) -> Attribute {
        let cell = usize::from(row) * ATTR_COLUMNS + usize::from(col);
        Attribute::decode(self.attr_logs[cell].value_at(t_state))
    }

    fn bank_at(&self, t_state: u32) -> u8 {
        self.screen_bank_log.value_at(t_state, 5)
    }

    fn bitmap_addr_px(screen_y: u8, char_col: u8) -> u16 {
        let y7y6 = (screen_y >> 6) & 0x03;
        let y5y4y3 = (screen_y >> 3) & 0x07;
        let y2y1y0 = screen_y & 0x07;
        0x4000
            | (u16::from(y7y6) << 11)
            | (u16::from(y2y1y0) << 8)
            | (u16::from(y5y4y3) << 5)
            | u16::from(char_col)
    }

    /// Render one full 8-pixel-tall, 32-column paper row from a single,
    /// already-known screen bank (the eager path).
    fn render_paper_row_single_bank(&mut self, row: u16, read_bank: &dyn Fn(u8, u16) -> u8, bank: u8) {
        let line_start = self.paper_line_start_t(row);
        for py in 0..8u8 {
            let screen_y = row as u8 * 8 + py;
            let fb_y = BORDER_V + u32::from(row) * 8 + u32::from(py);
            for col in 0..ATTR_COLUMNS as u16 {
                let lookup_t = line_start + col * COLUMN_TSTATES;
                let attr = self.attribute_at(row, col, lookup_t);
                let (ink_colour, paper_colour) = self.attribute_colours(attr, row);
                let bitmap = read_bank(bank, Self::bitmap_addr_px(screen_y, col as u8));
                self.blit_byte(fb_y, col, bitmap, ink_colour, paper_colour);
            }
        }
    }

    /// Bank-aware variant used only by the deferred path: resolves each
    /// column's bank from the screen-bank log instead of a single fixed
    /// bank.
    fn render_paper_row_bank_aware(&mut self, row: u16, read_bank: &dyn Fn(u8, u16) -> u8) {
        let line_start = self.paper_line_start_t(row);
        for py in 0..8u8 {
            let screen_y = row as u8 * 8 + py;
            let fb_y = BORDER_V + u32::from(row) * 8 + u32::from(py);
            for col in 0..ATTR_COLUMNS as u16 {
                let lookup_t = line_start + col * COLUMN_TSTATES;
                let attr = self.attribute_at(row, col, lookup_t);
                let (ink_colour, paper_colour) = self.attribute_colours(attr, row);
                let bank = self.bank_at(lookup_t);
                let bitmap = read_bank(bank, Self::bitmap_addr_px(screen_y, col as u8));
                self.blit_byte(fb_y, col, bitmap, ink_colour, paper_colour);
            }
        }
    }

    /// Resolve an attribute's ink/paper ARGB colours. In ULAplus mode the
    /// top two bits select one of four 16-entry CLUTs instead of
    /// BRIGHT/FLASH: ink reads CLUT entries 0-7, paper
    /// reads entries 8-15, and each lookup goes through the raster-effect
    /// heuristic in [`UlaPlus::entry_for_line`] rather than the live
    /// palette, so mid-frame palette rewrites render at the right place.
    fn attribute_colours(&self, attr: Attribute, row: u16) -> (u32, u32) {
        if self.plus.is_enabled() {
            let line_start = self.paper_line_start_t(row);
            let base = attr.clut * 16;
            let ink = self.plus.entry_for_line(base + attr.ink, row, line_start);
            let paper = self.plus.entry_for_line(base + 8 + attr.paper, row, line_start);
            (grb332_to_argb(ink), grb332_to_argb(paper))
        } else {
            let (ink, paper) = if attr.flash && self.flash_phase {
                (attr.paper, attr.ink)
            } else {
                (attr.ink, attr.paper)
            };
            let bright = u8::from(attr.bright) * 8;
            (
                PALETTE[usize::from(ink + bright)],
                PALETTE[usize::from(paper + bright)],
            )
        }
    }

    fn blit_byte(&mut self, fb_y: u32, col: u16, bitmap: u8, ink_colour: u32, paper_colour: u32) {
        let fb_x0 = BORDER_H + u32::from(col) * 8;
        for bit in 0..8u32 {
            let set = bitmap & (0x80 >> bit) != 0;
            let colour = if set { ink_colour } else { paper_colour };
            self.put_pixel(fb_x0 + bit, fb_y, colour);
        }
    }

    /// Floating-bus read: an IO read from an unattached port
    /// during the contended paper-drawing window returns whatever byte the
    /// ULA itself last fetched from video RAM, not 0xFF. Each 4-T-state
    /// paper column fetches the bitmap byte then the attribute byte, two
    /// T-states apiece; `None` outside the paper-drawing window, where
    /// there is nothing for the ULA to have fetched.
    #[must_use]
    pub fn floating_bus_byte(&self, t_state: u32, read_bank: &dyn Fn(u8, u16) -> u8, bank: u8) -> Option<u8> {
        let tpl = u32::from(self.timing.tstates_per_line);
        let first_screen_line = u32::from(self.timing.first_screen_line);
        let line = t_state / tpl;
        if line < first_screen_line || line >= first_screen_line + SCREEN_HEIGHT {
            return None;
        }
        let col = t_state % tpl;
        if col >= SCREEN_ROW_TSTATES {
            return None;
        }
        let screen_y = (line - first_screen_line) as u8;
        let char_col = (col / COLUMN_TSTATES) as u8;
        let sub = col % COLUMN_TSTATES;
        Some(if sub < 2 {
            read_bank(bank, Self::bitmap_addr_px(screen_y, char_col))
        } else {
            let attr_addr = 0x5800 + u16::from(screen_y / 8) * ATTR_COLUMNS as u16 + u16::from(char_col);
            read_bank(bank, attr_addr)
        })
    }

    /// True while `t_state` falls in the contended paper-drawing window
    /// (same window [`Ula::floating_bus_byte`] reads from): a 128K M1 fetch
    /// landing here collides with the ULA's own video fetch and corrupts
    /// the byte the CPU sees, the "snow" effect.
    #[must_use]
    pub fn is_screen_fetch_phase(&self, t_state: u32) -> bool {
        let tpl = u32::from(self.timing.tstates_per_line);
        let first_screen_line = u32::from(self.timing.first_screen_line);
        let line = t_state / tpl;
        if line < first_screen_line || line >= first_screen_line + SCREEN_HEIGHT {
            return false;
        }
        t_state % tpl < SCREEN_ROW_TSTATES
    }

    /// Record the byte a driver-detected M1/ULA fetch collision produced.
    pub fn latch_snow_byte(&mut self, value: u8) {
        self.snow_byte = Some(value);
    }

    /// Take and clear the last latched snow byte, if any.
    pub fn take_snow_byte(&mut self) -> Option<u8> {
        self.snow_byte.take()
    }
}
