//! `gatehouse-auth`: authentication and authorization building blocks.
//!
//! Tokens, passwords, usernames and the policy enforcer live here. The crate is
//! decoupled from HTTP and from user storage.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod roles;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{DEFAULT_TOKEN_TTL_SECS, Hs256Jwt, JwtValidator, TokenError, TokenIssuer};
pub use password::{PasswordError, hash_password, verify_password};
pub use policy::{PolicyEnforcer, PolicyError};
pub use roles::Role;
pub use user::{CredentialError, NewUser, Password, User, Username};
