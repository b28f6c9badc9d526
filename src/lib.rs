//! Cycle-level simulation of a memory controller arbitrating between a ROM
//! and a main memory with per-block ownership.

#![warn(missing_docs)]

pub mod bus;
pub mod config;
pub mod parse;
pub mod sim;
pub mod system;
