//! Character classification for XML names and character data.
//!
//! Every UTF-16 code unit is classified once into a 65536-entry flag table
//! built from the XML 1.0 (Fifth Edition) productions `[2] Char`,
//! `[4] NameStartChar` and `[4a] NameChar`. The table lives behind a
//! `once_cell` lazy static and is immutable afterwards, so lookups from any
//! thread are a single indexed load.
//!
//! Supplementary-plane scalars (above U+FFFF) cannot be table entries; they
//! are classified by range instead.

use once_cell::sync::Lazy;

/// The character may appear in XML content (`[2] Char`).
const XML_CHARACTER: u8 = 0x01;
/// The character may start an XML name.
const NAME_START_CHARACTER: u8 = 0x02;
/// The character may appear after the first position of an XML name.
const NAME_CHARACTER: u8 = 0x04;
/// The character may appear after the first position of an `NCName`.
const NCNAME_CHARACTER: u8 = 0x08;

/// `[4] NameStartChar`, restricted to the Basic Multilingual Plane.
const NAME_START_RANGES: &[(u16, u16)] = &[
    (0x3A, 0x3A),
    (0x41, 0x5A),
    (0x5F, 0x5F),
    (0x61, 0x7A),
    (0xC0, 0xD6),
    (0xD8, 0xF6),
    (0xF8, 0x2FF),
    (0x370, 0x37D),
    (0x37F, 0x1FFF),
    (0x200C, 0x200D),
    (0x2070, 0x218F),
    (0x2C00, 0x2FEF),
    (0x3001, 0xD7FF),
    (0xF900, 0xFDCF),
    (0xFDF0, 0xFFFD),
];

/// The extra characters `[4a] NameChar` allows after the first position.
const NAME_EXTRA_RANGES: &[(u16, u16)] = &[
    (0x2D, 0x2E),
    (0x30, 0x39),
    (0xB7, 0xB7),
    (0x300, 0x36F),
    (0x203F, 0x2040),
];

static TABLE: Lazy<Box<[u8]>> = Lazy::new(build_table);

fn build_table() -> Box<[u8]> {
    let mut table = vec![0u8; 0x1_0000];

    for (unit, flags) in table.iter_mut().enumerate() {
        if unit == 0x9 || unit == 0xA || unit == 0xD || (0x20..=0xD7FF).contains(&unit) {
            *flags |= XML_CHARACTER;
        }
        if (0xE000..=0xFFFD).contains(&unit) {
            *flags |= XML_CHARACTER;
        }
    }

    for &(lo, hi) in NAME_START_RANGES {
        for unit in lo..=hi {
            table[usize::from(unit)] |= NAME_START_CHARACTER | NAME_CHARACTER | NCNAME_CHARACTER;
        }
    }
    for &(lo, hi) in NAME_EXTRA_RANGES {
        for unit in lo..=hi {
            table[usize::from(unit)] |= NAME_CHARACTER | NCNAME_CHARACTER;
        }
    }
    table[usize::from(b':')] &= !NCNAME_CHARACTER;

    tracing::trace!("built XML character class table");
    table.into_boxed_slice()
}

#[inline]
fn flags(c: char) -> u8 {
    let code = u32::from(c);
    if let Ok(unit) = u16::try_from(code) {
        TABLE[usize::from(unit)]
    } else if code <= 0xE_FFFF {
        XML_CHARACTER | NAME_START_CHARACTER | NAME_CHARACTER | NCNAME_CHARACTER
    } else {
        XML_CHARACTER
    }
}

/// Returns the raw flag byte for a single UTF-16 code unit.
///
/// Surrogate code units are never flagged; callers must pair them first.
#[must_use]
pub fn unit_flags(unit: u16) -> u8 {
    TABLE[usize::from(unit)]
}

/// Returns `true` if a BMP code unit (not a surrogate) is a legal XML character.
#[must_use]
pub fn is_xml_code_unit(unit: u16) -> bool {
    unit_flags(unit) & XML_CHARACTER != 0
}

/// Returns `true` if `c` matches the `Char` production.
#[must_use]
pub fn is_xml_character(c: char) -> bool {
    flags(c) & XML_CHARACTER != 0
}

/// Returns `true` if `c` may start an XML name (`:` included).
#[must_use]
pub fn is_name_start_character(c: char) -> bool {
    flags(c) & NAME_START_CHARACTER != 0
}

/// Returns `true` if `c` may appear inside an XML name.
#[must_use]
pub fn is_name_character(c: char) -> bool {
    flags(c) & NAME_CHARACTER != 0
}

/// Returns `true` if `c` may start an `NCName`.
#[must_use]
pub fn is_ncname_start_character(c: char) -> bool {
    c != ':' && is_name_start_character(c)
}

/// Returns `true` if `c` may appear inside an `NCName`.
#[must_use]
pub fn is_ncname_character(c: char) -> bool {
    flags(c) & NCNAME_CHARACTER != 0
}

/// Returns `true` if the code unit is a UTF-16 high (leading) surrogate.
#[must_use]
pub fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

/// Returns `true` if the code unit is a UTF-16 low (trailing) surrogate.
#[must_use]
pub fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

/// Combines a surrogate pair into the scalar value it encodes.
#[must_use]
pub fn combine_surrogates(high: u16, low: u16) -> u32 {
    (u32::from(high) - 0xD800) * 0x400 + (u32::from(low) - 0xDC00) + 0x1_0000
}

/// Returns `true` for the four XML whitespace characters.
#[must_use]
pub fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}
