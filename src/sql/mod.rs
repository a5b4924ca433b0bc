mod normalize;
mod quote;

pub use normalize::normalize;
pub use quote::{ensure_pragma_allowed, quote, PRAGMA_WHITELIST};
