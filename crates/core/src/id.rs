// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identities: builder UUIDs and client session tokens.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer identity handed to a builder at handshake time.
///
/// Ids are recycled after the holder disconnects, so they identify a live
/// connection, not a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuilderId(pub u32);

impl std::fmt::Display for BuilderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hex digits in a session token.
const TOKEN_LEN: usize = 32;

/// A session token that is not 32 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session token {0:?}: expected 32 lowercase hex digits")]
pub struct InvalidSessionToken(pub String);

/// Token correlating every message of one client build.
///
/// Always exactly 32 lowercase hex digits. Builders use it as a directory
/// name, so anything else is refused at the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random (v4) UUID token: 122 random bits written
    /// as 32 lowercase hex digits.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn parse(s: &str) -> Result<Self, InvalidSessionToken> {
        let valid = s.len() == TOKEN_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidSessionToken(s.to_string()))
        }
    }

    /// Deterministic token for fixtures: `seed` zero-padded to 32 hex digits.
    #[cfg(any(test, feature = "test-support"))]
    pub fn from_seed(seed: u64) -> Self {
        Self(format!("{seed:032x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `n` characters, for log lines.
    pub fn short(&self, n: usize) -> &str {
        match self.0.char_indices().nth(n) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SessionToken {
    type Err = InvalidSessionToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionToken {
    type Error = InvalidSessionToken;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SessionToken> for String {
    fn from(token: SessionToken) -> Self {
        token.0
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
