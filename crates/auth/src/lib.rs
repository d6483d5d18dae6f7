//! `flashsale-auth` — authentication boundary (session resolution).
//!
//! This crate is intentionally decoupled from HTTP and storage. It owns the
//! claims model carried by a bearer token and the validator that turns a raw
//! token into an authenticated user identity.

pub mod claims;
pub mod jwt;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
