//! Stateless anti-spoofing: security tokens and tagged message ids.

mod message_id;
mod token;

pub use message_id::*;
pub use token::*;
