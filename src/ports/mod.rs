//! Port traits: data in, configuration in, reports out.

pub mod config_port;
pub mod data_port;
pub mod report_port;
