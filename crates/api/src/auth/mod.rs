//! Authentication primitives.
//!
//! - [`password`] -- checks of users-file passwords (plaintext or Argon2id).
//! - [`jwt`] -- JWT access-token generation and validation.

pub mod jwt;
pub mod password;
