//! Client for the CLIProxyAPI management endpoints
//!
//! Wraps the handful of `/v0/management` calls the quota guard needs: listing
//! auth files with their health fields, toggling the disabled flag, and the
//! download/delete/upload trio used to take a credential offline and put it
//! back. This crate knows nothing about quota policy; it is a thin, typed
//! transport that can be used and tested on its own.

pub mod auth_file;
pub mod client;
pub mod constants;
pub mod error;

pub use auth_file::{AuthFile, parse_auth_files};
pub use client::Client;
pub use constants::*;
pub use error::{Error, Result};
