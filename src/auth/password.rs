//! Password hashing
//!
//! Stored format: `hex(salt)$hex(argon2id(password, salt))`, using the
//! argon2 crate's default Argon2id parameters.

use argon2::Argon2;
use rand::RngCore;
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;
const OUTPUT_LEN: usize = 32;

/// Key derivation failed
#[derive(Debug, thiserror::Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordError(String);

fn derive(salt: &[u8], password: &str) -> Result<[u8; OUTPUT_LEN], PasswordError> {
    let mut output = [0u8; OUTPUT_LEN];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut output)
        .map_err(|e| PasswordError(e.to_string()))?;
    Ok(output)
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let output = derive(&salt, password)?;
    Ok(format!("{}${}", hex::encode(salt), hex::encode(output)))
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, expected_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(expected_hex)) else {
        return false;
    };
    match derive(&salt, password) {
        Ok(computed) => computed.as_slice().ct_eq(expected.as_slice()).into(),
        Err(_) => false,
    }
}
