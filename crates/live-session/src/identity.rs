//! Caller identity, role and join options.

use crate::errors::SessionError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller identifier within a room.
///
/// The transport normalizes numeric identifiers internally, so any identity
/// that parses as a `u32` is carried as `Numeric` to keep comparisons with
/// transport-reported uids stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallerId {
    Numeric(u32),
    Named(String),
}

impl CallerId {
    /// Normalize a raw identity string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<u32>() {
            Ok(n) => CallerId::Numeric(n),
            Err(_) => CallerId::Named(trimmed.to_string()),
        }
    }

    /// Render target name for this caller's remote video.
    #[must_use]
    pub fn player_target(&self) -> String {
        format!("player-{self}")
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerId::Numeric(n) => write!(f, "{n}"),
            CallerId::Named(s) => f.write_str(s),
        }
    }
}

impl From<u32> for CallerId {
    fn from(n: u32) -> Self {
        CallerId::Numeric(n)
    }
}

impl From<&str> for CallerId {
    fn from(raw: &str) -> Self {
        CallerId::parse(raw)
    }
}

impl From<String> for CallerId {
    fn from(raw: String) -> Self {
        CallerId::parse(&raw)
    }
}

/// Session role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Acquires and publishes microphone and camera on join.
    #[default]
    Publisher,
    /// Receives remote media only.
    Subscriber,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Publisher => "publisher",
            Role::Subscriber => "subscriber",
        }
    }

    #[must_use]
    pub const fn publishes(&self) -> bool {
        matches!(self, Role::Publisher)
    }
}

/// Options for joining a room.
///
/// The credential is a `SecretString`, so `Debug` output stays redacted.
#[derive(Debug, Clone)]
pub struct JoinOptions {
    pub room: String,
    pub uid: CallerId,
    pub credential: SecretString,
    pub role: Role,
}

impl JoinOptions {
    /// Build options from raw UI values, normalizing the identity.
    #[must_use]
    pub fn new(
        room: impl Into<String>,
        identity: &str,
        credential: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            room: room.into(),
            uid: CallerId::parse(identity),
            credential: SecretString::from(credential.into()),
            role,
        }
    }

    /// Check the options before any transport call is made.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidOptions` if the room or credential is empty.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.room.trim().is_empty() {
            return Err(SessionError::InvalidOptions(
                "Room identifier must not be empty".to_string(),
            ));
        }
        if self.credential.expose_secret().is_empty() {
            return Err(SessionError::InvalidOptions(
                "Access credential must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_identity_normalized() {
        assert_eq!(CallerId::parse("42"), CallerId::Numeric(42));
        assert_eq!(CallerId::parse(" 7 "), CallerId::Numeric(7));
        assert_eq!(CallerId::parse("0"), CallerId::Numeric(0));
    }

    #[test]
    fn test_non_numeric_identity_kept() {
        assert_eq!(
            CallerId::parse("tutor-1"),
            CallerId::Named("tutor-1".to_string())
        );
        assert_eq!(CallerId::parse("-5"), CallerId::Named("-5".to_string()));
        // Out of u32 range stays a string
        assert_eq!(
            CallerId::parse("99999999999"),
            CallerId::Named("99999999999".to_string())
        );
    }

    #[test]
    fn test_player_target_is_deterministic() {
        assert_eq!(CallerId::Numeric(42).player_target(), "player-42");
        assert_eq!(CallerId::parse("alice").player_target(), "player-alice");
    }

    #[test]
    fn test_caller_id_serializes_untagged() {
        let json = serde_json::to_string(&CallerId::Numeric(42)).unwrap();
        assert_eq!(json, "42");
        let json = serde_json::to_string(&CallerId::Named("bob".to_string())).unwrap();
        assert_eq!(json, "\"bob\"");

        let id: CallerId = serde_json::from_str("17").unwrap();
        assert_eq!(id, CallerId::Numeric(17));
    }

    #[test]
    fn test_validate_rejects_empty_room() {
        let options = JoinOptions::new("  ", "42", "token", Role::Publisher);
        assert!(matches!(
            options.validate(),
            Err(SessionError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_credential() {
        let options = JoinOptions::new("room1", "42", "", Role::Subscriber);
        assert!(matches!(
            options.validate(),
            Err(SessionError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let options = JoinOptions::new("room1", "42", "super-secret-token", Role::Publisher);
        assert!(options.validate().is_ok());
        let debug_output = format!("{options:?}");
        assert!(!debug_output.contains("super-secret-token"));
        assert!(debug_output.contains("room1"));
    }
}
