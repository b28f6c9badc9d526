//! Simulation parameters.

use crate::bus::ControllerConfig;
use std::num::NonZeroU32;
use thiserror::Error;

//===========================================================================//

/// The default cycle budget.
pub const DEFAULT_CYCLES: u64 = 100_000;
/// The default ROM latency, in clock cycles.
pub const DEFAULT_LATENCY_ROM: u32 = 1;
/// The default main memory latency, in clock cycles.
pub const DEFAULT_LATENCY_RAM: u32 = 1;
/// The default ROM size, in bytes.
pub const DEFAULT_ROM_SIZE: u32 = 0x100000;
/// The default ownership block size, in bytes.
pub const DEFAULT_BLOCK_SIZE: u32 = 0x1000;

//===========================================================================//

/// An invalid combination of simulation parameters.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ConfigError {
    /// The ROM size is zero or not a multiple of the word size.
    #[error("ROM size {0:#x} must be a positive multiple of 4")]
    InvalidRomSize(u32),
    /// The block size is zero.
    #[error("block size must be positive")]
    ZeroBlockSize,
}

/// All parameters of one simulation run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SimConfig {
    /// The maximum number of clock cycles to simulate.
    pub cycles: u64,
    /// The ROM latency, in clock cycles.
    pub latency_rom: u32,
    /// The main memory latency, in clock cycles.
    pub latency_ram: u32,
    /// The ROM size in bytes; also the first main memory address.
    pub rom_size: u32,
    /// The size of one ownership block of main memory, in bytes.
    pub block_size: u32,
}

impl SimConfig {
    /// Checks the parameters and returns the controller's view of them.
    pub fn validate(&self) -> Result<ControllerConfig, ConfigError> {
        if self.rom_size == 0 || self.rom_size % 4 != 0 {
            return Err(ConfigError::InvalidRomSize(self.rom_size));
        }
        let block_size = NonZeroU32::new(self.block_size)
            .ok_or(ConfigError::ZeroBlockSize)?;
        Ok(ControllerConfig { rom_size: self.rom_size, block_size })
    }
}

impl Default for SimConfig {
    fn default() -> SimConfig {
        SimConfig {
            cycles: DEFAULT_CYCLES,
            latency_rom: DEFAULT_LATENCY_ROM,
            latency_ram: DEFAULT_LATENCY_RAM,
            rom_size: DEFAULT_ROM_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

//===========================================================================//


//===========================================================================//
