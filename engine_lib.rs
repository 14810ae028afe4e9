extern crate self as trader_sim_engine;

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod market;
pub mod session;
pub mod sim;
pub mod types;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
