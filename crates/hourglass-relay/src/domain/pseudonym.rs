//! Pseudonym keys: 256-bit values encoded as 64 lowercase hex characters.

use std::fmt;

/// Encoded length of a pseudonym key
pub const PSEUDONYM_KEY_LEN: usize = 64;

/// Maximum contact keys accepted in a single registration
pub const MAX_CONTACT_KEYS: usize = 256;

/// A validated pseudonym key.
///
/// Used both for a caller's temporary identity and for each contact pseudonym.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PseudonymKey(String);

impl PseudonymKey {
    /// Parse and validate a pseudonym key
    pub fn parse(s: &str) -> Result<Self, KeyFormatError> {
        if s.len() != PSEUDONYM_KEY_LEN {
            return Err(KeyFormatError::WrongLength(s.len()));
        }
        if let Some((position, found)) = s
            .char_indices()
            .find(|&(_, c)| !matches!(c, '0'..='9' | 'a'..='f'))
        {
            return Err(KeyFormatError::NotLowercaseHex { position, found });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PseudonymKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pseudonym key format errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyFormatError {
    /// Key is not exactly 64 bytes long
    #[error("key is not a 256bit hash key: length {0}, expected 64")]
    WrongLength(usize),
    /// Key contains a character outside `[0-9a-f]`
    #[error("key is not a lowercase hex string: {found:?} at position {position}")]
    NotLowercaseHex { position: usize, found: char },
}
