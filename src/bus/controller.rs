use super::{
    AccessKind, MemoryRequest, OwnershipTable, RamPort, RomPort, Width,
};
use crate::sim::{Kernel, Process, Signal, Wait};
use std::num::NonZeroU32;
use std::ops::RangeInclusive;

//===========================================================================//

/// The address map parameters of a [`MemoryController`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    /// Addresses below this go to ROM; all others go to main memory.
    pub rom_size: u32,
    /// The size of one ownership block of main memory, in bytes.
    pub block_size: NonZeroU32,
}

//===========================================================================//

/// The wires between the control unit and the memory controller.
#[derive(Clone, Debug)]
pub struct HostPort {
    /// Raised to request a read.
    pub r: Signal<bool>,
    /// Raised to request a write.
    pub w: Signal<bool>,
    /// True for a 4-byte access, false for a 1-byte access.
    pub wide: Signal<bool>,
    /// The address of the first byte accessed.
    pub addr: Signal<u32>,
    /// The data to write.
    pub wdata: Signal<u32>,
    /// The id of the user issuing the request.
    pub user: Signal<u8>,
    /// The data read.
    pub rdata: Signal<u32>,
    /// Raised by the controller when the request has completed.
    pub ready: Signal<bool>,
    /// Valid while `ready` is high; set if the request failed.
    pub error: Signal<bool>,
}

impl HostPort {
    /// Registers the control unit wires with the kernel.
    pub fn new(kernel: &mut Kernel) -> HostPort {
        HostPort {
            addr: kernel.signal("addr", 0),
            wdata: kernel.signal("wdata", 0),
            rdata: kernel.signal("rdata", 0),
            r: kernel.signal("r", false),
            w: kernel.signal("w", false),
            wide: kernel.signal("wide", false),
            ready: kernel.signal("ready", false),
            error: kernel.signal("error", false),
            user: kernel.signal("user", 0),
        }
    }

    /// Drives the request lines for `request`.
    pub fn issue(&self, request: &MemoryRequest) {
        self.addr.write(request.addr);
        self.wdata.write(request.data);
        self.wide.write(request.width.is_wide());
        self.user.write(request.user);
        self.r.write(!request.is_write());
        self.w.write(request.is_write());
    }

    /// Lowers both request lines.
    pub fn release(&self) {
        self.r.write(false);
        self.w.write(false);
    }

    fn latch(&self) -> MemoryRequest {
        let width = if self.wide.read() { Width::Wide } else { Width::Narrow };
        MemoryRequest {
            kind: if self.w.read() {
                AccessKind::Write
            } else {
                AccessKind::Read
            },
            addr: self.addr.read(),
            data: self.wdata.read(),
            width,
            user: self.user.read(),
        }
    }
}

//===========================================================================//

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CtrlState {
    Idle,
    Respond { data: u32, error: bool },
    AwaitRom,
    AwaitRamRead(MemoryRequest),
    RmwMerge { request: MemoryRequest, word: u32 },
    AwaitRamWrite(MemoryRequest),
}

/// Routes requests from the control unit to ROM or main memory, enforcing
/// per-block ownership of main memory.
///
/// Main memory only moves whole words, so the controller turns a 1-byte
/// read into a read of the containing aligned word, and a 1-byte write
/// into a read-modify-write of that word.  4-byte accesses to main memory
/// are passed through as-is and need not be aligned.
pub struct MemoryController {
    config: ControllerConfig,
    host: HostPort,
    rom: RomPort,
    ram: RamPort,
    ownership: OwnershipTable,
    state: CtrlState,
}

impl MemoryController {
    /// Returns a new controller with an empty ownership table.
    pub fn new(
        config: ControllerConfig,
        host: HostPort,
        rom: RomPort,
        ram: RamPort,
    ) -> MemoryController {
        MemoryController {
            config,
            host,
            rom,
            ram,
            ownership: OwnershipTable::new(),
            state: CtrlState::Idle,
        }
    }

    /// Returns true if no request is in flight.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, CtrlState::Idle)
    }

    /// Returns the owner of the main memory block containing `addr`, or
    /// `None` if the block is unowned or `addr` is in ROM.
    pub fn owner_of(&self, addr: u32) -> Option<u8> {
        if addr < self.config.rom_size {
            return None;
        }
        self.ownership.owner(self.block_of(addr))
    }

    fn block_of(&self, addr: u32) -> u32 {
        (addr - self.config.rom_size) / self.config.block_size
    }

    fn blocks(&self, request: &MemoryRequest) -> RangeInclusive<u32> {
        // Main memory drops bytes past the top of the address space, so
        // the touched range stops there too.
        let last = request.addr.saturating_add(request.width.bytes() - 1);
        self.block_of(request.addr)..=self.block_of(last)
    }

    fn accept(&mut self, request: MemoryRequest) -> Wait {
        log::debug!("accepted {request}");
        self.host.ready.write(false);
        self.host.error.write(false);
        if request.addr < self.config.rom_size {
            if request.is_write() {
                log::info!("denied {request}: ROM is read-only");
                return self.fail();
            }
            self.rom.addr.write(request.addr);
            self.rom.wide.write(request.width.is_wide());
            self.rom.en.write(true);
            self.state = CtrlState::AwaitRom;
            return Wait::Rising(self.rom.ready.id());
        }
        let blocks = self.blocks(&request);
        if !self.ownership.check(request.user, blocks) {
            log::info!("denied {request}: block owned by another user");
            return self.fail();
        }
        match (request.kind, request.width) {
            (AccessKind::Write, Width::Wide) => {
                self.ram.addr.write(request.addr);
                self.ram.wdata.write(request.data);
                self.ram.w.write(true);
                self.state = CtrlState::AwaitRamWrite(request);
            }
            (AccessKind::Read, Width::Wide) => {
                self.ram.addr.write(request.addr);
                self.ram.r.write(true);
                self.state = CtrlState::AwaitRamRead(request);
            }
            (_, Width::Narrow) => {
                self.ram.addr.write(aligned(request.addr));
                self.ram.r.write(true);
                self.state = CtrlState::AwaitRamRead(request);
            }
        }
        Wait::Rising(self.ram.ready.id())
    }

    /// Publishes an access error at the next clock edge, so that `ready` is
    /// seen low for at least one cycle.
    fn fail(&mut self) -> Wait {
        self.state = CtrlState::Respond { data: 0, error: true };
        Wait::Clock
    }

    fn respond(&mut self, data: u32, error: bool) -> Wait {
        log::trace!("respond data=0x{data:08x} error={error}");
        self.host.rdata.write(data);
        self.host.error.write(error);
        self.host.ready.write(true);
        self.state = CtrlState::Idle;
        Wait::Clock
    }
}

impl Process for MemoryController {
    fn name(&self) -> &str {
        "memory_controller"
    }

    fn resume(&mut self) -> Wait {
        match self.state {
            CtrlState::Idle => match (self.host.r.read(), self.host.w.read()) {
                (false, false) => Wait::Clock,
                (true, true) => {
                    log::warn!(
                        "read and write requested together at 0x{:08x}; \
                         ignoring",
                        self.host.addr.read()
                    );
                    Wait::Clock
                }
                _ => {
                    let request = self.host.latch();
                    self.accept(request)
                }
            },
            CtrlState::Respond { data, error } => self.respond(data, error),
            CtrlState::AwaitRom => {
                self.rom.en.write(false);
                self.respond(self.rom.data.read(), self.rom.error.read())
            }
            CtrlState::AwaitRamRead(request) => {
                self.ram.r.write(false);
                let word = self.ram.rdata.read();
                let shift = 8 * (request.addr % 4);
                match (request.kind, request.width) {
                    (_, Width::Wide) => self.respond(word, false),
                    (AccessKind::Read, Width::Narrow) => {
                        self.respond((word >> shift) & 0xff, false)
                    }
                    (AccessKind::Write, Width::Narrow) => {
                        let word = (word & !(0xff << shift))
                            | ((request.data & 0xff) << shift);
                        // Give main memory a clock edge to see the read
                        // request drop before issuing the write.
                        self.state = CtrlState::RmwMerge { request, word };
                        Wait::Clock
                    }
                }
            }
            CtrlState::RmwMerge { request, word } => {
                self.ram.addr.write(aligned(request.addr));
                self.ram.wdata.write(word);
                self.ram.w.write(true);
                self.state = CtrlState::AwaitRamWrite(request);
                Wait::Rising(self.ram.ready.id())
            }
            CtrlState::AwaitRamWrite(request) => {
                self.ram.w.write(false);
                let blocks = self.blocks(&request);
                self.ownership.claim(request.user, blocks);
                self.respond(0, false)
            }
        }
    }
}

fn aligned(addr: u32) -> u32 {
    addr & !3
}

//===========================================================================//


//===========================================================================//
