//! Runtime helpers for the binary

pub mod errors;

pub use errors::format_user_error;
