//! Utilities for converting between raw token bytes and serialized token strings.
//!
//! Persisted vocabularies render every byte through the GPT-2 byte-level alphabet: printable
//! bytes map to themselves and the remaining ones to code points from `U+0100` upward, so any
//! byte sequence becomes a printable string without spaces (a space is rendered as `Ġ`).

use std::sync::OnceLock;

use rustc_hash::{FxHashMap, FxHashSet};

fn byte_level_tables() -> &'static ([char; 256], FxHashMap<char, u8>) {
    static TABLES: OnceLock<([char; 256], FxHashMap<char, u8>)> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut forward = ['\0'; 256];
        let mut reverse = FxHashMap::default();
        let mut bs: Vec<u8> = (b'!'..=b'~').collect();
        bs.extend(b'\xA1'..=b'\xAC');
        bs.extend(b'\xAE'..=b'\xFF');
        let mut cs: Vec<u32> = bs.iter().map(|&b| u32::from(b)).collect();
        let mut seen: FxHashSet<u8> = bs.iter().copied().collect();
        let mut n = 0u32;
        for byte in 0u8..=255 {
            if seen.contains(&byte) {
                continue;
            }
            bs.push(byte);
            cs.push(256 + n);
            seen.insert(byte);
            n += 1;
        }
        for (byte, codepoint) in bs.into_iter().zip(cs) {
            // Every code point below U+0200 is a valid scalar value.
            let ch = char::from_u32(codepoint).unwrap_or('\u{FFFD}');
            forward[byte as usize] = ch;
            reverse.insert(ch, byte);
        }
        (forward, reverse)
    })
}

/// Renders raw bytes with the GPT-2 byte-level alphabet.
#[must_use]
pub fn bytes_to_string(bytes: &[u8]) -> String {
    let (forward, _) = byte_level_tables();
    bytes.iter().map(|&b| forward[b as usize]).collect()
}

/// Converts a string produced by [`bytes_to_string`] back to raw bytes.
///
/// Returns `None` when `text` contains a character outside the byte-level alphabet.
#[must_use]
pub fn string_to_bytes(text: &str) -> Option<Vec<u8>> {
    let (_, reverse) = byte_level_tables();
    text.chars().map(|c| reverse.get(&c).copied()).collect()
}
