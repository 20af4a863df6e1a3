//! ZX Spectrum colour palettes: the standard 16-colour set and the ULAplus
//! GRB332 expansion.

/// ARGB32 palette: 16 entries (8 normal + 8 bright).
///
/// Index layout: `bright_bit << 3 | ink_3bit`.
///
/// Colours: black, blue, red, magenta, green, cyan, yellow, white.
pub const PALETTE: [u32; 16] = [
    // Normal (bright = 0)
    0xFF00_0000, // 0: Black
    0xFF00_00CD, // 1: Blue
    0xFFCD_0000, // 2: Red
    0xFFCD_00CD, // 3: Magenta
    0xFF00_CD00, // 4: Green
    0xFF00_CDCD, // 5: Cyan
    0xFFCD_CD00, // 6: Yellow
    0xFFCD_CDCD, // 7: White
    // Bright (bright = 1)
    0xFF00_0000, // 8: Black (same as normal)
    0xFF00_00FF, // 9: Bright Blue
    0xFFFF_0000, // 10: Bright Red
    0xFFFF_00FF, // 11: Bright Magenta
    0xFF00_FF00, // 12: Bright Green
    0xFF00_FFFF, // 13: Bright Cyan
    0xFFFF_FF00, // 14: Bright Yellow
    0xFFFF_FFFF, // 15: Bright White
];

/// Expand a ULAplus GRB332 byte (`GGGRRRBB`) into an ARGB32 colour by
/// bit-replicating each channel up to 8 bits.
#[must_use]
pub fn grb332_to_argb(value: u8) -> u32 {
    let g3 = (value >> 5) & 0x07;
    let r3 = (value >> 2) & 0x07;
    let b2 = value & 0x03;

    let expand3 = |c: u8| (c << 5) | (c << 2) | (c >> 1);
    let expand2 = |c: u8| (c << 6) | (c << 4) | (c << 2) | c;

    let r = expand3(r3);
    let g = expand3(g3);
    let b = expand2(b2);

    0xFF00_0000 | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}
