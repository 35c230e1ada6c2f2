//! Account identifiers.

use std::{fmt, str::FromStr};

/// Length of an account address in bytes.
pub const ACCOUNT_ID_LEN: usize = 20;

/// Address-like opaque key identifying a ledger account.
///
/// Displayed and parsed as `0x`-prefixed lowercase hex. The ledger never
/// interprets the bytes; it only compares them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct AccountId([u8; ACCOUNT_ID_LEN]);

impl AccountId {
    /// The all-zero address.
    pub const ZERO: AccountId = AccountId([0u8; ACCOUNT_ID_LEN]);

    /// Create an account ID from raw bytes.
    pub const fn new(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Create an account ID whose low 8 bytes hold `value` (big-endian).
    ///
    /// Handy for tests and simulations where addresses only need to be
    /// distinct.
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; ACCOUNT_ID_LEN];
        bytes[ACCOUNT_ID_LEN - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({self})")
    }
}

/// Errors from parsing an [`AccountId`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AccountIdParseError {
    #[error("Invalid hex in account address: {0}")]
    InvalidHex(String),

    #[error("Account address must be {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

impl FromStr for AccountId {
    type Err = AccountIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes =
            hex::decode(digits).map_err(|e| AccountIdParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; ACCOUNT_ID_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| AccountIdParseError::InvalidLength {
                    expected: ACCOUNT_ID_LEN,
                    got: bytes.len(),
                })?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.to_string()
    }
}
