#![doc = include_str!("../README.md")]

// Public modules
pub mod common;
pub mod config;
pub mod context;
pub mod db;
pub mod messages;
pub mod routing;
pub mod security;
pub mod server;

mod error;

pub use crate::config::Config;
pub use crate::context::Context;
pub use crate::error::{Error, Result};
pub use bytes::Bytes;
