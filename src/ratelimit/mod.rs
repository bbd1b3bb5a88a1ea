pub mod client_key;
pub mod limiter;

pub use client_key::ClientKeyExtractor;
pub use limiter::{Decision, FixedWindowLimiter};
