//! Utility functions for the request-handling layers.
//!
//! - **URL validation**: SSRF guard for client-supplied feed URLs
//! - **File names**: sanitizing the names of uploaded feed files

mod text;
mod url_validator;

pub use text::sanitize_filename;
pub use url_validator::{validate_scheme, validate_url, UrlValidationError};
