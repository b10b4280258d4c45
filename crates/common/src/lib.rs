//! Common types shared by the quota guard crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
