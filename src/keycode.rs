//! HID keyboard usage ids and the US-layout character table used to type text.
//!
//! Only the usages the link itself needs are named here; anything else travels as a
//! raw `u8` straight from the key matrix.

/// No key / key released.
pub const KC_NO: u8 = 0x00;
/// `a` / `A`. The rest of the alphabet follows contiguously.
pub const KC_A: u8 = 0x04;
/// `l` / `L`.
pub const KC_L: u8 = 0x0F;
/// `1` / `!`. Digits 2..9 follow contiguously.
pub const KC_1: u8 = 0x1E;
/// `0` / `)`.
pub const KC_0: u8 = 0x27;
/// Enter.
pub const KC_ENTER: u8 = 0x28;
/// Escape.
pub const KC_ESC: u8 = 0x29;
/// Backspace.
pub const KC_BSPC: u8 = 0x2A;
/// Tab.
pub const KC_TAB: u8 = 0x2B;
/// Space bar.
pub const KC_SPACE: u8 = 0x2C;
/// `-` / `_`.
pub const KC_MINUS: u8 = 0x2D;
/// `=` / `+`.
pub const KC_EQUAL: u8 = 0x2E;
/// `[` / `{`.
pub const KC_LBRACKET: u8 = 0x2F;
/// `]` / `}`.
pub const KC_RBRACKET: u8 = 0x30;
/// `\` / `|`.
pub const KC_BSLASH: u8 = 0x31;
/// `;` / `:`.
pub const KC_SCOLON: u8 = 0x33;
/// `'` / `"`.
pub const KC_QUOTE: u8 = 0x34;
/// `` ` `` / `~`.
pub const KC_GRAVE: u8 = 0x35;
/// `,` / `<`.
pub const KC_COMMA: u8 = 0x36;
/// `.` / `>`.
pub const KC_DOT: u8 = 0x37;
/// `/` / `?`.
pub const KC_SLASH: u8 = 0x38;
/// F1.
pub const KC_F1: u8 = 0x3A;
/// F2.
pub const KC_F2: u8 = 0x3B;
/// F3.
pub const KC_F3: u8 = 0x3C;
/// F4.
pub const KC_F4: u8 = 0x3D;
/// F5.
pub const KC_F5: u8 = 0x3E;
/// F6.
pub const KC_F6: u8 = 0x3F;
/// Delete (forward).
pub const KC_DEL: u8 = 0x4C;
/// Keypad `-`.
pub const KC_KP_MINUS: u8 = 0x56;
/// Keypad `+`.
pub const KC_KP_PLUS: u8 = 0x57;
/// Keypad `.`.
pub const KC_KP_DOT: u8 = 0x63;
/// Left control, the first modifier usage.
pub const KC_LCTRL: u8 = 0xE0;
/// Left shift.
pub const KC_LSHIFT: u8 = 0xE1;
/// Right control.
pub const KC_RCTRL: u8 = 0xE4;
/// Right GUI, the last modifier usage.
pub const KC_RGUI: u8 = 0xE7;
/// The keyboard's own layer key. Never sent to the host.
pub const KC_FN: u8 = 0xF0;

/// Modifier bit of left control.
pub const MOD_LCTRL: u8 = 0x01;
/// Modifier bit of left shift.
pub const MOD_LSHIFT: u8 = 0x02;

/// Whether `keycode` is one of the eight modifier usages.
pub fn is_modifier(keycode: u8) -> bool {
    (KC_LCTRL..=KC_RGUI).contains(&keycode)
}

/// Modifier bitmask contribution of `keycode`, or 0 for a regular key.
pub fn modifier_bit(keycode: u8) -> u8 {
    if is_modifier(keycode) {
        1 << (keycode - KC_LCTRL)
    } else {
        0
    }
}

/// Maps a text byte to the keycode and modifiers that type it on a US layout.
///
/// Control characters other than tab, newline, backspace and escape are typed as
/// Ctrl + letter, so `0x01` is Ctrl-A. `\0`, `\r` and anything without a key map to
/// `(KC_NO, 0)`, which the synthesizer turns into a key-up.
pub fn keycode_for_char(c: u8) -> (u8, u8) {
    match c {
        b'a'..=b'z' => (KC_A + (c - b'a'), 0),
        b'A'..=b'Z' => (KC_A + (c - b'A'), MOD_LSHIFT),
        b'1'..=b'9' => (KC_1 + (c - b'1'), 0),
        b'0' => (KC_0, 0),
        b' ' => (KC_SPACE, 0),
        b'\n' => (KC_ENTER, 0),
        b'\t' => (KC_TAB, 0),
        0x08 => (KC_BSPC, 0),
        0x1b => (KC_ESC, 0),
        b'\r' => (KC_NO, 0),
        0x01..=0x1a => (KC_A + (c - 0x01), MOD_LCTRL),
        b'-' => (KC_MINUS, 0),
        b'=' => (KC_EQUAL, 0),
        b'[' => (KC_LBRACKET, 0),
        b']' => (KC_RBRACKET, 0),
        b'\\' => (KC_BSLASH, 0),
        b';' => (KC_SCOLON, 0),
        b'\'' => (KC_QUOTE, 0),
        b'`' => (KC_GRAVE, 0),
        b',' => (KC_COMMA, 0),
        b'.' => (KC_DOT, 0),
        b'/' => (KC_SLASH, 0),
        b'!' => (KC_1, MOD_LSHIFT),
        b'@' => (KC_1 + 1, MOD_LSHIFT),
        b'#' => (KC_1 + 2, MOD_LSHIFT),
        b'$' => (KC_1 + 3, MOD_LSHIFT),
        b'%' => (KC_1 + 4, MOD_LSHIFT),
        b'^' => (KC_1 + 5, MOD_LSHIFT),
        b'&' => (KC_1 + 6, MOD_LSHIFT),
        b'*' => (KC_1 + 7, MOD_LSHIFT),
        b'(' => (KC_1 + 8, MOD_LSHIFT),
        b')' => (KC_0, MOD_LSHIFT),
        b'_' => (KC_MINUS, MOD_LSHIFT),
        b'+' => (KC_EQUAL, MOD_LSHIFT),
        b'{' => (KC_LBRACKET, MOD_LSHIFT),
        b'}' => (KC_RBRACKET, MOD_LSHIFT),
        b'|' => (KC_BSLASH, MOD_LSHIFT),
        b':' => (KC_SCOLON, MOD_LSHIFT),
        b'"' => (KC_QUOTE, MOD_LSHIFT),
        b'~' => (KC_GRAVE, MOD_LSHIFT),
        b'<' => (KC_COMMA, MOD_LSHIFT),
        b'>' => (KC_DOT, MOD_LSHIFT),
        b'?' => (KC_SLASH, MOD_LSHIFT),
        _ => (KC_NO, 0),
    }
}
