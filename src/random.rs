//! Secure random state generation.
//!
//! Anti-CSRF `state` and `nonce` values are 32-bit unsigned integers drawn
//! from the operating system's cryptographically secure source. There is no
//! fallback: a platform without a secure source fails the whole attempt.

use crate::error::{AuthError, Result};
use rand::RngCore;

/// Generate a cryptographically strong, nonzero 32-bit state value.
///
/// Zero is reserved as the "no state" sentinel downstream, so a zero draw
/// is discarded and redrawn.
///
/// # Errors
///
/// Returns [`AuthError::SecureRandomUnavailable`] when the operating
/// system's random source cannot be read.
pub fn generate_state() -> Result<u32> {
    let mut rng = rand::rngs::OsRng;
    let mut buf = [0u8; 4];

    loop {
        rng.try_fill_bytes(&mut buf)
            .map_err(|e| AuthError::SecureRandomUnavailable(e.to_string()))?;

        let value = u32::from_le_bytes(buf);
        if value != 0 {
            return Ok(value);
        }
    }
}
