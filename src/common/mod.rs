//! Common utilities and types shared across segkv

pub mod config;
pub mod document;
pub mod error;
pub mod utils;

pub use config::MasterConfig;
pub use document::AttributeDocument;
pub use error::{Error, Result};
pub use utils::{
    find_available_tcp_port, find_local_ip_addresses, timestamp_now, timestamp_now_millis,
};
