pub mod clock;
pub mod config;
pub mod error;
pub mod link;
pub mod memory;
pub mod register;
pub mod serial;
