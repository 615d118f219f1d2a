//! The two public entry points of this crate: [`validator::TokenProcessor`]
//! (§4.3) and [`issuer::TokenIssuer`] (§4.4). Both are state-free services:
//! configuration and key source are injected once at construction, and
//! concurrent calls to either are independent of one another.

pub mod issuer;
pub mod validator;
