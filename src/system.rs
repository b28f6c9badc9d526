//! The complete simulated memory system and the driver that feeds it
//! requests.

use crate::bus::{
    ByteStore, ControllerConfig, HostPort, MainMemory, MemoryController,
    MemoryRequest, MemoryResponse, RamPort, RamStorage, RomDevice, RomError,
    RomPort, RomStorage,
};
use crate::config::{ConfigError, SimConfig};
use crate::sim::{CLOCK_PERIOD_NS, Kernel, SimError};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;

//===========================================================================//

/// The most cycles [`MemorySystem::execute`] will spend on one request.
pub const EXECUTE_CYCLE_CAP: u64 = 1_000_000;

//===========================================================================//

/// An error while assembling a [`MemorySystem`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SetupError {
    /// The simulation parameters are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The initial ROM contents do not fit the ROM.
    #[error(transparent)]
    Rom(#[from] RomError),
}

/// How a simulation run ended.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum RunStatus {
    /// Every request completed within the cycle budget.
    #[default]
    Completed,
    /// The cycle budget ran out before every request completed.
    CycleDeficit,
}

/// The outcome of [`MemorySystem::run`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SimResult {
    /// The number of clock cycles spent on requests.
    pub cycles: u64,
    /// The number of completed requests that reported an error.
    pub errors: u64,
    /// The response to each completed request, in order.
    pub responses: Vec<MemoryResponse>,
    /// Whether the run finished within its budget.
    pub status: RunStatus,
}

//===========================================================================//

/// A ROM, a main memory and a memory controller, wired together on one
/// simulation kernel.
pub struct MemorySystem {
    kernel: Kernel,
    host: HostPort,
    controller: Rc<RefCell<MemoryController>>,
    description: String,
}

impl MemorySystem {
    /// Builds a memory system whose ROM is preloaded with `rom_words`.
    pub fn new(
        config: &SimConfig,
        rom_words: &[u32],
    ) -> Result<MemorySystem, SetupError> {
        let controller_config = config.validate()?;
        let rom = RomStorage::from_words(rom_words, config.rom_size)?;
        Ok(MemorySystem::with_rom(config, controller_config, rom))
    }

    fn with_rom(
        config: &SimConfig,
        controller_config: ControllerConfig,
        rom: RomStorage,
    ) -> MemorySystem {
        let description = format!(
            "{} (latency {}), main memory (latency {}), {}B blocks",
            rom.description(),
            config.latency_rom,
            config.latency_ram,
            controller_config.block_size
        );
        let mut kernel = Kernel::new();
        let host = HostPort::new(&mut kernel);
        let ram_port = RamPort::new(&mut kernel);
        let rom_port = RomPort::new(&mut kernel);
        let controller = kernel.spawn_shared(MemoryController::new(
            controller_config,
            host.clone(),
            rom_port.clone(),
            ram_port.clone(),
        ));
        kernel.spawn(RomDevice::new(rom, config.latency_rom, rom_port));
        let ram = RamStorage::new();
        kernel.spawn(MainMemory::new(ram, config.latency_ram, ram_port));
        MemorySystem { kernel, host, controller, description }
    }

    /// Returns a human-readable description of the system.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the number of clock cycles simulated so far, including idle
    /// cycles.
    pub fn cycle(&self) -> u64 {
        self.kernel.cycle()
    }

    /// Returns the owner of the main memory block containing `addr`.
    pub fn owner_of(&self, addr: u32) -> Option<u8> {
        self.controller.borrow().owner_of(addr)
    }

    /// Starts writing a VCD waveform of every wire in the system to `out`.
    pub fn trace_to(&mut self, out: Box<dyn Write>) {
        self.kernel.trace_to(out);
    }

    /// Flushes and closes the waveform trace, if any.
    pub fn finish_trace(&mut self) -> Result<(), SimError> {
        self.kernel.finish_trace()
    }

    /// Feeds `requests` to the controller one at a time, spending at most
    /// `budget` clock cycles in total.  Whatever is left of the budget after
    /// the last request is simulated with the request lines idle.  If the
    /// budget runs out mid-request, that request is still run to completion
    /// (outside the budget) so the system is idle when this returns.
    pub fn run(
        &mut self,
        requests: &[MemoryRequest],
        budget: u64,
    ) -> Result<SimResult, SimError> {
        let mut result = SimResult::default();
        for request in requests {
            let remaining = budget.saturating_sub(result.cycles);
            let (response, cycles) = self.step(request, remaining)?;
            result.cycles += cycles;
            let Some(response) = response else {
                log::warn!(
                    "cycle budget of {budget} ran out during {request}"
                );
                result.status = RunStatus::CycleDeficit;
                self.drain()?;
                break;
            };
            if response.error {
                log::warn!("request {request} failed");
                result.errors += 1;
            }
            result.responses.push(response);
        }
        self.host.release();
        for _ in result.cycles..budget {
            self.kernel.tick()?;
        }
        log::info!(
            "finished after {} request cycles with {} errors",
            result.cycles,
            result.errors
        );
        Ok(result)
    }

    /// Runs a single request to completion and returns its response.
    pub fn execute(
        &mut self,
        request: &MemoryRequest,
    ) -> Result<MemoryResponse, SimError> {
        match self.step(request, EXECUTE_CYCLE_CAP)? {
            (Some(response), _) => Ok(response),
            (None, cycles) => Err(SimError::Stalled { cycles }),
        }
    }

    /// Lowers the request lines and ticks until the controller has finished
    /// whatever request it was working on.  The response is discarded, but
    /// the request's effects on memory and ownership stand.
    fn drain(&mut self) -> Result<(), SimError> {
        self.host.release();
        let mut cycles = 0;
        while !self.controller.borrow().is_idle() {
            if cycles == EXECUTE_CYCLE_CAP {
                return Err(SimError::Stalled { cycles });
            }
            self.kernel.tick()?;
            cycles += 1;
        }
        if cycles > 0 {
            log::debug!("drained an unfinished request in {cycles} cycles");
        }
        Ok(())
    }

    /// Issues `request` and ticks until the controller raises `ready`, for
    /// at most `limit` cycles.  Returns the response (if the request
    /// completed) and the number of cycles spent.
    fn step(
        &mut self,
        request: &MemoryRequest,
        limit: u64,
    ) -> Result<(Option<MemoryResponse>, u64), SimError> {
        log::info!(
            "[{}ns] {request}",
            self.kernel.cycle() * CLOCK_PERIOD_NS
        );
        self.host.issue(request);
        let mut cycles = 0;
        while cycles < limit {
            self.kernel.tick()?;
            cycles += 1;
            if self.host.ready.read() {
                let response = MemoryResponse {
                    data: self.host.rdata.read(),
                    error: self.host.error.read(),
                    cycles,
                };
                log::debug!("{request} -> {response:?}");
                return Ok((Some(response), cycles));
            }
        }
        Ok((None, cycles))
    }
}

//===========================================================================//


//===========================================================================//
