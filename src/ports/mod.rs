//! Capability traits the domain depends on. Implementations live in
//! [`crate::adapters`].

pub mod config_port;
pub mod data_port;
pub mod indicator_port;
pub mod report_port;
