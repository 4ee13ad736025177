//! # Utilities
//!
//! Small helpers shared across the controller.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Characters accepted in Kubernetes object names and label values
const OBJECT_SAFE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a random string of `n` characters from `[0-9a-z]`
///
/// Drawn from the operating system RNG, so the result is safe to use in
/// generated object names.
#[must_use]
pub fn random_object_safe_string(n: usize) -> String {
    random_object_safe_string_with(&mut OsRng, n)
}

/// Same as [`random_object_safe_string`] with a caller-provided RNG
pub fn random_object_safe_string_with<R: RngCore + ?Sized>(rng: &mut R, n: usize) -> String {
    (0..n)
        .map(|_| {
            let idx = rng.gen_range(0..OBJECT_SAFE_ALPHABET.len());
            char::from(OBJECT_SAFE_ALPHABET[idx])
        })
        .collect()
}
