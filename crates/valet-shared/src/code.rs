//! Human-enterable shift codes.
//!
//! A code is six symbols drawn uniformly and independently from
//! [`CODE_ALPHABET`]. Generation is stateless and never checks for
//! collisions; the session registry retries when a fresh code clashes with
//! an active shift.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{CODE_ALPHABET, CODE_LENGTH};
use crate::error::CodeError;

/// Deserialization goes through [`ShiftCode::parse`], so a code read off the
/// wire or from disk holds the same invariant as a typed one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShiftCode(String);

impl ShiftCode {
    /// Generate a fresh code using the thread RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse a typed or scanned code. Surrounding whitespace is ignored and
    /// lowercase input is accepted.
    pub fn parse(input: &str) -> Result<Self, CodeError> {
        let normalized = input.trim().to_ascii_uppercase();

        let actual = normalized.chars().count();
        if actual != CODE_LENGTH {
            return Err(CodeError::Length {
                expected: CODE_LENGTH,
                actual,
            });
        }

        if let Some(bad) = normalized
            .chars()
            .find(|c| !c.is_ascii() || !CODE_ALPHABET.contains(&(*c as u8)))
        {
            return Err(CodeError::InvalidCharacter(bad));
        }

        Ok(Self(normalized))
    }

    /// Case-insensitive comparison against raw user input.
    pub fn matches(&self, input: &str) -> bool {
        self.0.eq_ignore_ascii_case(input.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShiftCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShiftCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShiftCode> for String {
    fn from(code: ShiftCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for ShiftCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_codes_use_alphabet() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..2_000 {
            let code = ShiftCode::generate_with(&mut rng);
            assert_eq!(code.as_str().len(), CODE_LENGTH);
            for c in code.as_str().chars() {
                assert!(CODE_ALPHABET.contains(&(c as u8)), "unexpected {c}");
                assert!(!matches!(c, '0' | 'O' | '1' | 'I'));
            }
        }
    }

    #[test]
    fn test_every_symbol_is_reachable() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1_000 {
            seen.extend(ShiftCode::generate_with(&mut rng).as_str().chars());
        }
        assert_eq!(seen.len(), CODE_ALPHABET.len());
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let code = ShiftCode::parse("  ab23xz ").unwrap();
        assert_eq!(code.as_str(), "AB23XZ");
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert_eq!(
            ShiftCode::parse("AB23"),
            Err(CodeError::Length {
                expected: 6,
                actual: 4
            })
        );
    }

    #[test]
    fn test_parse_rejects_ambiguous_characters() {
        assert_eq!(
            ShiftCode::parse("AB0CDE"),
            Err(CodeError::InvalidCharacter('0'))
        );
        assert_eq!(
            ShiftCode::parse("ABCDEO"),
            Err(CodeError::InvalidCharacter('O'))
        );
        assert!(ShiftCode::parse("ÄBCDEF").is_err());
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let code = ShiftCode::parse("AB23XZ").unwrap();
        assert!(code.matches("ab23xz"));
        assert!(code.matches("Ab23Xz"));
        assert!(!code.matches("AB23XY"));
    }
}
