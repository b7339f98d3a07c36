//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the user of a valid JWT Bearer token (required).
//! - [`auth::OptionalUser`] -- the same, but anonymous requests pass.
//! - [`viewer::RequestViewer`] -- the user, language and part allow-lists
//!   a request browses with.

pub mod auth;
pub mod viewer;
