use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tiny_keccak::{Hasher, Keccak};

/// Loose "label.tld" shape accepted as a name worth resolving.
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)?$",
    )
    .expect("name pattern is a valid regex")
});

/// A 20-byte EVM account address.
///
/// Equality and hashing work on the raw bytes, so every textual casing of the
/// same address compares equal. `Display` always renders the EIP-55 form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn to_checksum(&self) -> String {
        let hex_addr = hex::encode(self.0);
        let mut hasher = Keccak::v256();
        hasher.update(hex_addr.as_bytes());
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        let mut result = String::with_capacity(42);
        result.push_str("0x");
        for (i, c) in hex_addr.chars().enumerate() {
            let hash_nibble = if i % 2 == 0 {
                (hash[i / 2] >> 4) & 0x0f
            } else {
                hash[i / 2] & 0x0f
            };
            if hash_nibble >= 8 {
                result.push(c.to_ascii_uppercase());
            } else {
                result.push(c);
            }
        }
        result
    }

    /// Lowercase `0x`-prefixed hex, used for lookup keys.
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

/// Returned when a string does not have the `0x` + 40 hex digit shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address: {0:?}")]
pub struct InvalidAddress(pub String);

impl FromStr for Address {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s).ok_or_else(|| InvalidAddress(s.to_string()))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn parse_address(s: &str) -> Option<Address> {
    let digits = s.strip_prefix("0x")?;
    if digits.len() != 40 {
        return None;
    }
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(digits, &mut bytes).ok()?;
    Some(Address(bytes))
}

/// Whether `s` has the address shape (`0x` followed by 40 hex digits).
///
/// Casing is not checked against the checksum: any mix of upper and lower
/// case hex digits is accepted.
pub fn is_valid_address(s: &str) -> bool {
    parse_address(s).is_some()
}

/// Canonical checksummed form of `s`, or `None` when `s` is not an address.
pub fn normalize_address(s: &str) -> Option<String> {
    parse_address(s).map(|addr| addr.to_checksum())
}

/// Whether `s` looks like a resolvable name such as `alice.eth`.
pub fn is_name_like(s: &str) -> bool {
    NAME_PATTERN.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_vector() {
        let addr: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        assert_eq!(addr.to_string(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn test_normalize_accepts_any_casing() {
        let expected = Some("0xdAC17F958D2ee523a2206206994597C13D831ec7".to_string());
        assert_eq!(
            normalize_address("0xdac17f958d2ee523a2206206994597c13d831ec7"),
            expected
        );
        assert_eq!(
            normalize_address("0xDAC17F958D2EE523A2206206994597C13D831EC7"),
            expected
        );
        // wrong checksum casing still normalizes
        assert_eq!(
            normalize_address("0xDac17f958d2ee523a2206206994597c13d831ec7"),
            expected
        );
    }

    #[test]
    fn test_normalize_idempotent() {
        for input in [
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
            "0xFB6916095CA1DF60BB79CE92CE3EA74C37C5D359",
            "0x0000000000000000000000000000000000000000",
        ] {
            let once = normalize_address(input).unwrap();
            assert_eq!(normalize_address(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("0xNOTVALID"));
        assert!(!is_valid_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beae"));
        assert!(!is_valid_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed0"));
        assert!(!is_valid_address("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed00"));
        assert!(!is_valid_address("0X5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(!is_valid_address(" 0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(!is_valid_address("0xgaaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert_eq!(normalize_address("0xNOTVALID"), None);
    }

    #[test]
    fn test_name_pattern() {
        assert!(is_name_like("pancakeswap.eth"));
        assert!(is_name_like("alice.bnb"));
        assert!(is_name_like("sub.alice.crypto"));
        assert!(!is_name_like(""));
        assert!(!is_name_like("alice"));
        assert!(!is_name_like("0xNOTVALID"));
        assert!(!is_name_like("alice.toolongtld"));
    }

    #[test]
    fn test_equality_ignores_casing() {
        let a: Address = "0xdac17f958d2ee523a2206206994597c13d831ec7".parse().unwrap();
        let b: Address = "0xDAC17F958D2EE523A2206206994597C13D831EC7".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_lower_hex(), "0xdac17f958d2ee523a2206206994597c13d831ec7");
    }

    #[test]
    fn test_serde_uses_checksum() {
        let addr: Address = serde_json::from_str("\"0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed\"").unwrap();
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed\""
        );
        assert!(serde_json::from_str::<Address>("\"alice.eth\"").is_err());
    }
}
