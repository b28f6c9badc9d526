use super::ByteStore;
use crate::sim::{Kernel, Process, Signal, Wait};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

//===========================================================================//

/// The contents of a simulated main memory.  Storage is sparse: every
/// address is backed, and bytes that were never written read as zero.
#[derive(Clone, Debug, Default)]
pub struct RamStorage {
    bytes: HashMap<u32, u8>,
}

impl RamStorage {
    /// Returns a new, all-zero RAM.
    pub fn new() -> RamStorage {
        RamStorage { bytes: HashMap::new() }
    }

    /// Returns the number of bytes that have ever been written.
    pub fn mapped_len(&self) -> usize {
        self.bytes.len()
    }

    /// Reads four consecutive bytes starting at `addr` as a little-endian
    /// word.  Bytes past the top of the address space read as zero.
    pub fn read_word(&self, addr: u32) -> u32 {
        let mut bytes = [0u8; 4];
        for (offset, byte) in (0..).zip(bytes.iter_mut()) {
            if let Some(addr) = addr.checked_add(offset) {
                *byte = self.byte_at(addr);
            }
        }
        LittleEndian::read_u32(&bytes)
    }

    /// Stores `data` as four little-endian bytes starting at `addr`.  Bytes
    /// that would land past the top of the address space are dropped.
    pub fn write_word(&mut self, addr: u32, data: u32) {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, data);
        for (offset, byte) in (0..).zip(bytes) {
            match addr.checked_add(offset) {
                Some(addr) => {
                    self.bytes.insert(addr, byte);
                }
                None => {
                    log::warn!("dropped RAM write past 0x{:08x}", u32::MAX);
                    break;
                }
            }
        }
    }

    fn byte_at(&self, addr: u32) -> u8 {
        self.bytes.get(&addr).copied().unwrap_or(0)
    }
}

impl ByteStore for RamStorage {
    fn description(&self) -> String {
        format!("sparse RAM ({} bytes mapped)", self.bytes.len())
    }

    fn peek_byte(&self, addr: u32) -> Option<u8> {
        Some(self.byte_at(addr))
    }

    fn write_byte(&mut self, addr: u32, data: u8) -> bool {
        self.bytes.insert(addr, data);
        true
    }
}

//===========================================================================//

/// The wires between the memory controller and main memory.
#[derive(Clone, Debug)]
pub struct RamPort {
    /// Raised by the controller to request a word read.
    pub r: Signal<bool>,
    /// Raised by the controller to request a word write.
    pub w: Signal<bool>,
    /// The address of the first byte of the word.
    pub addr: Signal<u32>,
    /// The word to write.
    pub wdata: Signal<u32>,
    /// The word read.
    pub rdata: Signal<u32>,
    /// Raised by the memory when the access has completed.
    pub ready: Signal<bool>,
}

impl RamPort {
    /// Registers the main memory wires with the kernel.
    pub fn new(kernel: &mut Kernel) -> RamPort {
        RamPort {
            r: kernel.signal("mem_r", false),
            w: kernel.signal("mem_w", false),
            addr: kernel.signal("mem_addr", 0),
            wdata: kernel.signal("mem_wdata", 0),
            rdata: kernel.signal("mem_rdata", 0),
            ready: kernel.signal("mem_ready", false),
        }
    }
}

//===========================================================================//

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RamOp {
    Read { addr: u32 },
    Write { addr: u32, data: u32 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RamState {
    Idle,
    Busy(RamOp),
    Done,
}

/// A simulated main memory that performs word reads and writes requested
/// on a [`RamPort`] after a fixed number of clock cycles.
pub struct MainMemory {
    storage: RamStorage,
    latency: u32,
    port: RamPort,
    state: RamState,
}

impl MainMemory {
    /// Returns a new main memory with the given contents and latency, in
    /// clock cycles.
    pub fn new(
        storage: RamStorage,
        latency: u32,
        port: RamPort,
    ) -> MainMemory {
        MainMemory { storage, latency, port, state: RamState::Idle }
    }

    /// Returns the contents of the memory.
    pub fn storage(&self) -> &RamStorage {
        &self.storage
    }

    fn perform(&mut self, op: RamOp) {
        match op {
            RamOp::Read { addr } => {
                let word = self.storage.read_word(addr);
                log::debug!("RAM read at 0x{addr:08x}: 0x{word:08x}");
                self.port.rdata.write(word);
            }
            RamOp::Write { addr, data } => {
                log::debug!("RAM write at 0x{addr:08x}: 0x{data:08x}");
                self.storage.write_word(addr, data);
            }
        }
        self.port.ready.write(true);
    }
}

impl Process for MainMemory {
    fn name(&self) -> &str {
        "main_memory"
    }

    fn resume(&mut self) -> Wait {
        match self.state {
            RamState::Idle => {
                let addr = self.port.addr.read();
                let op = match (self.port.r.read(), self.port.w.read()) {
                    (false, false) => return Wait::Clock,
                    (true, true) => {
                        log::warn!(
                            "RAM read and write requested together at \
                             0x{addr:08x}; ignoring"
                        );
                        return Wait::Clock;
                    }
                    (true, false) => RamOp::Read { addr },
                    (false, true) => {
                        RamOp::Write { addr, data: self.port.wdata.read() }
                    }
                };
                self.port.ready.write(false);
                if self.latency == 0 {
                    self.perform(op);
                    self.state = RamState::Done;
                    Wait::Clock
                } else {
                    self.state = RamState::Busy(op);
                    Wait::Cycles(self.latency)
                }
            }
            RamState::Busy(op) => {
                self.perform(op);
                self.state = RamState::Done;
                Wait::Clock
            }
            RamState::Done => {
                if !self.port.r.read() && !self.port.w.read() {
                    self.port.ready.write(false);
                    self.state = RamState::Idle;
                }
                Wait::Clock
            }
        }
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{MainMemory, RamPort, RamStorage};
    use crate::bus::ByteStore;
    use crate::sim::Kernel;

    #[test]
    fn unwritten_bytes_read_as_zero() {
        let ram = RamStorage::new();
        assert_eq!(ram.peek_byte(0x1234), Some(0));
        assert_eq!(ram.read_word(0xfffffff0), 0);
        assert_eq!(ram.mapped_len(), 0);
    }

    #[test]
    fn words_are_little_endian() {
        let mut ram = RamStorage::new();
        ram.write_word(40, 0xa5a5a5a5);
        ram.write_word(42, 0xdeadbeef);
        assert_eq!(ram.peek_byte(42), Some(0xef));
        assert_eq!(ram.peek_byte(45), Some(0xde));
        assert_eq!(ram.read_word(40), 0xbeefa5a5);
        assert_eq!(ram.mapped_len(), 6);
        assert_eq!(ram.description(), "sparse RAM (6 bytes mapped)");
    }

    #[test]
    fn words_stop_at_top_of_address_space() {
        let mut ram = RamStorage::new();
        ram.write_word(0xfffffffe, 0x11223344);
        assert_eq!(ram.peek_byte(0xfffffffe), Some(0x44));
        assert_eq!(ram.peek_byte(0xffffffff), Some(0x33));
        assert_eq!(ram.peek_byte(0), Some(0));
        assert_eq!(ram.peek_byte(1), Some(0));
        assert_eq!(ram.mapped_len(), 2);
        assert_eq!(ram.read_word(0xfffffffe), 0x00003344);
    }

    fn setup(latency: u32) -> (Kernel, RamPort) {
        let mut kernel = Kernel::new();
        let port = RamPort::new(&mut kernel);
        let ram = MainMemory::new(RamStorage::new(), latency, port.clone());
        kernel.spawn(ram);
        (kernel, port)
    }

    fn wait_ready(kernel: &mut Kernel, port: &RamPort) -> u64 {
        for cycles in 1..=20 {
            kernel.tick().unwrap();
            if port.ready.read() {
                return cycles;
            }
        }
        panic!("main memory never became ready");
    }

    #[test]
    fn write_then_read() {
        let (mut kernel, port) = setup(1);
        port.addr.write(0x40);
        port.wdata.write(0xcafebabe);
        port.w.write(true);
        assert_eq!(wait_ready(&mut kernel, &port), 2);
        port.w.write(false);
        kernel.tick().unwrap();
        assert!(!port.ready.read());
        port.r.write(true);
        assert_eq!(wait_ready(&mut kernel, &port), 2);
        assert_eq!(port.rdata.read(), 0xcafebabe);
    }

    #[test]
    fn storage_reflects_completed_writes() {
        let mut kernel = Kernel::new();
        let port = RamPort::new(&mut kernel);
        let ram = kernel.spawn_shared(MainMemory::new(
            RamStorage::new(),
            0,
            port.clone(),
        ));
        port.addr.write(0x41);
        port.wdata.write(0x04030201);
        port.w.write(true);
        assert_eq!(wait_ready(&mut kernel, &port), 1);
        let ram = ram.borrow();
        assert_eq!(ram.storage().mapped_len(), 4);
        assert_eq!(ram.storage().read_word(0x40), 0x03020100);
        assert_eq!(ram.storage().peek_byte(0x44), Some(0x04));
    }

    #[test]
    fn zero_latency() {
        let (mut kernel, port) = setup(0);
        port.r.write(true);
        assert_eq!(wait_ready(&mut kernel, &port), 1);
        assert_eq!(port.rdata.read(), 0);
    }

    #[test]
    fn simultaneous_read_and_write_is_ignored() {
        let (mut kernel, port) = setup(0);
        port.r.write(true);
        port.w.write(true);
        for _ in 0..5 {
            kernel.tick().unwrap();
            assert!(!port.ready.read());
        }
        port.w.write(false);
        assert_eq!(wait_ready(&mut kernel, &port), 1);
    }
}

//===========================================================================//
