pub mod audit;
pub mod cli;
pub mod config;
pub mod errors;
pub mod policy;
pub mod sync;
