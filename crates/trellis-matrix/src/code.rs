//! Referral codes.
//!
//! Codes are [`CODE_LEN`] characters drawn from [`CODE_ALPHABET`], which
//! leaves out characters that are easy to misread (`0 O 1 I L`). 31 symbols
//! over 8 places gives roughly 8.5e11 codes.

use crate::error::{Error, Result};
use rand::rngs::ThreadRng;
use rand::Rng;

/// Unambiguous code alphabet.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Referral code length.
pub const CODE_LEN: usize = 8;

/// A validated referral code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ReferralCode(String);

impl ReferralCode {
    /// Parse user input. Surrounding whitespace is ignored and lowercase is
    /// accepted.
    pub fn parse(input: &str) -> Result<Self> {
        let code = input.trim().to_ascii_uppercase();
        if code.len() != CODE_LEN {
            return Err(Error::InvalidCode(format!(
                "{:?} must be {} characters",
                input, CODE_LEN
            )));
        }
        if let Some(bad) = code.bytes().find(|b| !CODE_ALPHABET.contains(b)) {
            return Err(Error::InvalidCode(format!(
                "{:?} contains {:?}",
                input, bad as char
            )));
        }
        Ok(Self(code))
    }

    /// Draw a uniformly random code.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let code = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ReferralCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ReferralCode> for String {
    fn from(value: ReferralCode) -> Self {
        value.0
    }
}

impl std::fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ReferralCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Supplies candidate codes to the allocator.
pub trait CodeSource {
    /// Next candidate. May repeat earlier candidates.
    fn draw(&mut self) -> ReferralCode;
}

/// Code source backed by a random number generator.
#[derive(Debug)]
pub struct RandomCodes<R>(pub R);

impl RandomCodes<ThreadRng> {
    /// Codes from the thread-local RNG.
    pub fn thread() -> Self {
        Self(rand::thread_rng())
    }
}

impl<R: Rng> CodeSource for RandomCodes<R> {
    fn draw(&mut self) -> ReferralCode {
        ReferralCode::random(&mut self.0)
    }
}
