//! Headless Chrome session supervision.
//!
//! A [`session::Session`] is one browser subprocess with a private profile
//! directory, a known DevTools endpoint, and a wall-clock lifetime. The
//! [`registry::SessionRegistry`] is the process-wide table of live sessions.

#![deny(unsafe_code)]

pub mod chrome;
pub mod error;
pub mod registry;
pub mod session;

pub use error::BrowserError;
pub use registry::SessionRegistry;
pub use session::Session;
