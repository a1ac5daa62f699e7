//! Reversible scrambling of a grammar's text form.
//!
//! This is obfuscation, not encryption: it only keeps a saved grammar from
//! being read at a glance. Characters in the printable ASCII band are shifted
//! by a per-position keystream `base^i mod modulus`; the two key values are
//! stored as a two-character header.

use rand::Rng;

use crate::utils::{GrammarError, Result};

const BAND_START: u32 = 0x20;
const BAND_WIDTH: u32 = 95;

fn in_band(c: char) -> bool {
    (BAND_START..BAND_START + BAND_WIDTH).contains(&(c as u32))
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Pick a coprime `(base, modulus)` pair in `[0, 95)`
fn pick_key<R: Rng + ?Sized>(rng: &mut R) -> (u32, u32) {
    loop {
        let base = rng.gen_range(1..BAND_WIDTH);
        let modulus = rng.gen_range(2..BAND_WIDTH);
        if gcd(base, modulus) == 1 {
            return (base, modulus);
        }
    }
}

/// Shift every in-band character forward (or back) by the keystream
fn shift(text: &str, base: u32, modulus: u32, forward: bool) -> String {
    let mut factor = 1 % modulus;
    text.chars()
        .map(|c| {
            let out = if in_band(c) {
                let offset = c as u32 - BAND_START;
                let shifted = if forward {
                    (offset + factor) % BAND_WIDTH
                } else {
                    (offset + BAND_WIDTH - factor) % BAND_WIDTH
                };
                char::from_u32(shifted + BAND_START).unwrap_or(c)
            } else {
                c
            };
            factor = factor * base % modulus;
            out
        })
        .collect()
}

fn header_char(value: u32) -> char {
    char::from_u32(value + BAND_START).unwrap_or(' ')
}

/// Only keys that fit the header and are coprime can be decoded
fn check_key(base: u32, modulus: u32) -> Result<()> {
    if base >= BAND_WIDTH || modulus >= BAND_WIDTH {
        return Err(GrammarError::Decode(format!(
            "key ({}, {}) does not fit the header",
            base, modulus
        )));
    }
    if modulus == 0 || gcd(base, modulus) != 1 {
        return Err(GrammarError::Decode(format!(
            "key ({}, {}) is not a coprime pair",
            base, modulus
        )));
    }
    Ok(())
}

fn encode(plain: &str, base: u32, modulus: u32) -> String {
    let mut out = String::with_capacity(plain.len() + 2);
    out.push(header_char(base));
    out.push(header_char(modulus));
    out.push_str(&shift(plain, base, modulus, true));
    out
}

/// Scramble `plain` with a fresh random key
pub fn obfuscate<R: Rng + ?Sized>(plain: &str, rng: &mut R) -> String {
    let (base, modulus) = pick_key(rng);
    encode(plain, base, modulus)
}

/// Scramble `plain` with a given key, both values in `[0, 95)` and coprime
pub fn obfuscate_with_key(plain: &str, base: u32, modulus: u32) -> Result<String> {
    check_key(base, modulus)?;
    Ok(encode(plain, base, modulus))
}

/// Recover the plain text from [`obfuscate`] output
pub fn deobfuscate(text: &str) -> Result<String> {
    let mut chars = text.chars();
    let (Some(b), Some(m)) = (chars.next(), chars.next()) else {
        return Err(GrammarError::Decode("missing key header".to_string()));
    };
    if !in_band(b) || !in_band(m) {
        return Err(GrammarError::Decode("key header is not printable".to_string()));
    }
    let base = b as u32 - BAND_START;
    let modulus = m as u32 - BAND_START;
    check_key(base, modulus)?;
    Ok(shift(chars.as_str(), base, modulus, false))
}
