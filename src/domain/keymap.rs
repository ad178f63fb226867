//! Linux input key code → character mapping
//!
//! Scanners in USB HID mode present as keyboards and type the barcode one
//! key at a time. Shift is not tracked: letters always map to lowercase.

use super::types::KeyInput;

pub const KEY_ENTER: u16 = 28;
pub const KEY_KPENTER: u16 = 96;

/// Map a Linux key code (`linux/input-event-codes.h`) to decoder input
pub fn key_input(code: u16) -> KeyInput {
    let c = match code {
        2 => '1',
        3 => '2',
        4 => '3',
        5 => '4',
        6 => '5',
        7 => '6',
        8 => '7',
        9 => '8',
        10 => '9',
        11 => '0',
        12 => '-',
        13 => '=',
        16 => 'q',
        17 => 'w',
        18 => 'e',
        19 => 'r',
        20 => 't',
        21 => 'y',
        22 => 'u',
        23 => 'i',
        24 => 'o',
        25 => 'p',
        26 => '[',
        27 => ']',
        30 => 'a',
        31 => 's',
        32 => 'd',
        33 => 'f',
        34 => 'g',
        35 => 'h',
        36 => 'j',
        37 => 'k',
        38 => 'l',
        39 => ';',
        40 => '\'',
        41 => '`',
        43 => '\\',
        44 => 'z',
        45 => 'x',
        46 => 'c',
        47 => 'v',
        48 => 'b',
        49 => 'n',
        50 => 'm',
        51 => ',',
        52 => '.',
        53 => '/',
        57 => ' ',
        KEY_ENTER | KEY_KPENTER => return KeyInput::Enter,
        other => return KeyInput::Unmapped(other),
    };
    KeyInput::Char(c)
}

/// Key code that types `c`, used when replaying text through the decoder
pub fn code_for_char(c: char) -> Option<u16> {
    let lower = c.to_ascii_lowercase();
    (0u16..=KEY_KPENTER).find(|&code| key_input(code) == KeyInput::Char(lower))
}
