use std::borrow::Cow;

/// Role label stored on the user row and used as a policy subject.
///
/// Roles are opaque strings; what a role may do is decided by the policy
/// engine, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Role assigned to every self-registered user.
    pub const USER: Role = Role(Cow::Borrowed("user"));

    /// Role granted to configured bootstrap administrators.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::USER
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
