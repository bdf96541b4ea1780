//! Client SDK layer for the LevelUp loyalty and payments web service.
//!
//! - [`config`]: SDK configuration and the context requests resolve against.
//! - [`net`]: requests, the network transport, buffered responses and status
//!   mapping.
//! - [`errors`]: the error type carried by failed responses.
pub mod config;
pub mod errors;
pub mod net;

pub use config::{SdkConfig, SdkContext};
pub use errors::LevelUpError;
