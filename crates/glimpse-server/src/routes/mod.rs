//! HTTP route handlers.

pub mod cdp;
pub mod sessions;
pub mod whip;
