//! Registered users and the validated inputs used to create them.

use chrono::{DateTime, Utc};
use thiserror::Error;

use gatehouse_core::UserId;

use crate::Role;
use crate::password::{PasswordError, hash_password};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 64;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 128;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("username is required")]
    MissingUsername,

    #[error("username must be between 3 and 64 characters")]
    UsernameLength,

    #[error("username may only contain letters, digits, '_', '-' and '.'")]
    UsernameCharset,

    #[error("password is required")]
    MissingPassword,

    #[error("password must be between 6 and 128 characters")]
    PasswordLength,
}

/// A username that is safe to use as a row key and as a policy subject.
///
/// Usernames end up as fields in the CSV policy file, so separators and
/// control characters are rejected up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        if raw.is_empty() {
            return Err(CredentialError::MissingUsername);
        }
        let len = raw.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(CredentialError::UsernameLength);
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(CredentialError::UsernameCharset);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for Username {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A plaintext password that passed shape validation. Never stored as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        if raw.is_empty() {
            return Err(CredentialError::MissingPassword);
        }
        let len = raw.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
            return Err(CredentialError::PasswordLength);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Password {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// A user row as persisted by the user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Insert payload: everything the store needs to create a [`User`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub username: Username,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    /// Build a self-registration insert: fresh id, default role, hashed password.
    pub fn register(
        username: Username,
        password: &Password,
        now: DateTime<Utc>,
    ) -> Result<Self, PasswordError> {
        Ok(Self {
            id: UserId::new(),
            username,
            password_hash: hash_password(password.expose())?,
            role: Role::USER,
            created_at: now,
        })
    }

    pub fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username.into_inner(),
            password_hash: self.password_hash,
            role: self.role,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::password::verify_password;

    #[test]
    fn accepts_reasonable_usernames() {
        for name in ["bob", "alice_01", "j.doe", "a-b-c"] {
            assert!(Username::parse(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_short_long_and_empty() {
        assert_eq!(Username::parse(""), Err(CredentialError::MissingUsername));
        assert_eq!(Username::parse("ab"), Err(CredentialError::UsernameLength));
        assert_eq!(
            Username::parse(&"x".repeat(USERNAME_MAX_LEN + 1)),
            Err(CredentialError::UsernameLength)
        );
    }

    #[test]
    fn rejects_policy_separators() {
        assert_eq!(Username::parse("eve,admin"), Err(CredentialError::UsernameCharset));
        assert_eq!(Username::parse("eve\nadmin"), Err(CredentialError::UsernameCharset));
        assert_eq!(Username::parse("eve admin"), Err(CredentialError::UsernameCharset));
    }

    #[test]
    fn password_bounds() {
        assert_eq!(Password::parse("").unwrap_err(), CredentialError::MissingPassword);
        assert_eq!(Password::parse("12345").unwrap_err(), CredentialError::PasswordLength);
        assert!(Password::parse("123456").is_ok());
    }

    #[test]
    fn password_debug_is_redacted() {
        let p = Password::parse("topsecret").unwrap();
        assert_eq!(format!("{p:?}"), "Password(***)");
    }

    #[test]
    fn registration_hashes_and_defaults_role() {
        let password = Password::parse("hunter22").unwrap();
        let new_user = NewUser::register(Username::parse("alice").unwrap(), &password, Utc::now())
            .unwrap();

        assert_eq!(new_user.role, Role::USER);
        assert_ne!(new_user.password_hash, "hunter22");
        assert!(verify_password("hunter22", &new_user.password_hash).unwrap());

        let user = new_user.clone().into_user();
        assert_eq!(user.username, "alice");
        assert_eq!(user.id, new_user.id);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: every name drawn from the allowed alphabet and length range parses.
        #[test]
        fn allowed_alphabet_always_parses(name in "[A-Za-z0-9_.-]{3,64}") {
            prop_assert!(Username::parse(&name).is_ok());
        }

        /// Property: any name containing a comma or whitespace is rejected.
        #[test]
        fn separators_never_parse(
            head in "[a-z]{2,10}",
            sep in prop::sample::select(vec![',', ' ', '\n', '\r', '\t', '\0']),
            tail in "[a-z]{1,10}",
        ) {
            let name = format!("{head}{sep}{tail}");
            prop_assert!(Username::parse(&name).is_err());
        }
    }
}
