//! CLI command implementations

pub mod ccp;
pub mod hazard;
pub mod init;
pub mod monitor;
pub mod product;
pub mod report;
pub mod status;
pub mod step;
pub mod verify;
