//! Common code shared between `sign_server` and `sign_client`.
pub mod labels;
pub mod protocol;
