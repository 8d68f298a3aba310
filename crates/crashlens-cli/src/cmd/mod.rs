pub mod config;
pub mod crash;
pub mod investigate;
pub mod rca;
