//! Account-style 64-bit names identifying handlers and write contexts.

use core::{fmt, str::FromStr};

/// Symbols of the base-32 name alphabet, indexed by their 5-bit value.
const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Maximum length of a name in its text form.
const MAX_NAME_LEN: usize = 13;

/// A 64-bit name in the 13-character base-32 encoding used by the chain.
///
/// The first twelve characters take five bits each, the thirteenth takes the remaining four bits
/// and is therefore limited to `.12345abcdefghij`. Names identify handlers in the
/// [`ConnectionRegistry`](crate::ConnectionRegistry) and the write contexts a handler's
/// [`StoreView`](crate::StoreView) is scoped to. Sandboxed code passes the raw [`Name::value`]
/// to the store-access host functions.
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::From,
    derive_more::Into,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Name(u64);

impl Name {
    /// Creates a name from its raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value of the name.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns whether this is the empty name.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Errors that can occur when parsing a [`Name`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The text is longer than thirteen characters.
    #[error("name is longer than 13 characters: {0}")]
    TooLong(String),
    /// The text contains a character outside the name alphabet.
    #[error("invalid character {character:?} in name {name}")]
    InvalidCharacter {
        /// The offending character
        character: char,
        /// The text being parsed
        name: String,
    },
    /// The thirteenth character does not fit into the remaining four bits.
    #[error("thirteenth character of name {0} must be one of .12345abcdefghij")]
    InvalidThirteenthCharacter(String),
    /// The text is not the canonical form of the name it encodes (e.g. trailing dots).
    #[error("name {0} is not in canonical form")]
    NonCanonical(String),
}

const fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong(s.to_string()));
        }

        let mut value = 0u64;
        for (i, c) in s.bytes().enumerate() {
            let symbol = char_to_symbol(c).ok_or_else(|| NameError::InvalidCharacter {
                character: c as char,
                name: s.to_string(),
            })?;
            if i < MAX_NAME_LEN - 1 {
                value |= symbol << (64 - 5 * (i + 1));
            } else {
                if symbol > 0x0f {
                    return Err(NameError::InvalidThirteenthCharacter(s.to_string()));
                }
                value |= symbol;
            }
        }

        let name = Self(value);
        if name.to_string() != s {
            return Err(NameError::NonCanonical(s.to_string()));
        }
        Ok(name)
    }
}

impl TryFrom<String> for Name {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.to_string()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; MAX_NAME_LEN];
        let mut tmp = self.0;
        for i in 0..MAX_NAME_LEN {
            let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
            out[MAX_NAME_LEN - 1 - i] = CHARMAP[(tmp & mask) as usize];
            tmp >>= shift;
        }
        let end = out.iter().rposition(|&c| c != b'.').map_or(0, |pos| pos + 1);
        f.write_str(core::str::from_utf8(&out[..end]).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_known_value() {
        let name: Name = "eosio".parse().unwrap();
        assert_eq!(name.value(), 6138663577826885632);
        assert_eq!(name.to_string(), "eosio");
    }

    #[rstest]
    #[case("")]
    #[case("a")]
    #[case("h1")]
    #[case("eosio.token")]
    #[case("zzzzzzzzzzzzj")]
    #[case("a.b.c")]
    fn test_text_roundtrip(#[case] text: &str) {
        let name: Name = text.parse().unwrap();
        assert_eq!(name.to_string(), text);
        assert_eq!(Name::new(name.value()), name);
    }

    #[rstest]
    #[case("abcdefghijklmn", NameError::TooLong("abcdefghijklmn".into()))]
    #[case("Alice", NameError::InvalidCharacter { character: 'A', name: "Alice".into() })]
    #[case("bob6", NameError::InvalidCharacter { character: '6', name: "bob6".into() })]
    #[case("zzzzzzzzzzzzz", NameError::InvalidThirteenthCharacter("zzzzzzzzzzzzz".into()))]
    #[case("alice.", NameError::NonCanonical("alice.".into()))]
    fn test_rejects_invalid(#[case] text: &str, #[case] expected: NameError) {
        assert_eq!(text.parse::<Name>().unwrap_err(), expected);
    }

    #[test]
    fn test_ordering_follows_value() {
        let a: Name = "a".parse().unwrap();
        let b: Name = "b".parse().unwrap();
        assert!(a < b);
        assert!(Name::default().is_empty());
    }
}
