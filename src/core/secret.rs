//! Random secret generation for generated application settings.

use rand::Rng;

/// Characters a generated secret is drawn from.
pub const SECRET_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*(-_=+)";

/// Means "the whole match" in a sed replacement, so it may not appear in
/// a value substituted with sed.
pub const SED_DELIMITER: char = '&';

pub const DEFAULT_SECRET_LENGTH: usize = 50;

const HEX_DIGITS: &[u8] = b"0123456789abcdef";

/// Draw `length` characters uniformly from [`SECRET_ALPHABET`].
///
/// Uses the thread-local generator, a CSPRNG seeded from the OS.
pub fn generate_random(length: usize) -> String {
    let alphabet = SECRET_ALPHABET.as_bytes();
    let mut rng = rand::rng();
    (0..length)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

/// A random secret safe to substitute with sed.
///
/// Every [`SED_DELIMITER`] is replaced by its own random hex digit.
pub fn generate_secret(length: usize) -> String {
    let mut rng = rand::rng();
    generate_random(length)
        .chars()
        .map(|c| {
            if c == SED_DELIMITER {
                HEX_DIGITS[rng.random_range(0..HEX_DIGITS.len())] as char
            } else {
                c
            }
        })
        .collect()
}
