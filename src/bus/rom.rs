use super::{ByteStore, describe_size};
use crate::sim::{Kernel, Process, Signal, Wait};
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

//===========================================================================//

/// An error in the initial contents of a ROM.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum RomError {
    /// The ROM size is zero or not a multiple of the word size.
    #[error("ROM size {0:#x} must be a positive multiple of 4 bytes")]
    InvalidSize(u32),
    /// More initial words were given than fit in the ROM.
    #[error("ROM content has {count} words, but only {capacity} fit")]
    TooManyWords {
        /// The number of words given.
        count: usize,
        /// The number of words that fit.
        capacity: usize,
    },
}

//===========================================================================//

/// The immutable contents of a simulated ROM.
#[derive(Clone, Debug)]
pub struct RomStorage {
    bytes: Box<[u8]>,
}

impl RomStorage {
    /// Builds ROM contents of `size` bytes by unpacking each word
    /// little-endian into four consecutive bytes, starting at address zero.
    /// Any bytes not covered by `words` are zero.
    pub fn from_words(
        words: &[u32],
        size: u32,
    ) -> Result<RomStorage, RomError> {
        if size == 0 || size % 4 != 0 {
            return Err(RomError::InvalidSize(size));
        }
        let capacity = (size / 4) as usize;
        if words.len() > capacity {
            let count = words.len();
            return Err(RomError::TooManyWords { count, capacity });
        }
        let mut bytes = vec![0u8; size as usize].into_boxed_slice();
        LittleEndian::write_u32_into(words, &mut bytes[..words.len() * 4]);
        Ok(RomStorage { bytes })
    }

    /// Returns the size of the ROM in bytes.
    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Overwrites a byte of the ROM image.  This is only meant for preloading
    /// contents before the simulation starts; simulated requests can never
    /// reach it.  Returns false if the address is outside the ROM.
    pub fn poke(&mut self, addr: u32, data: u8) -> bool {
        match self.bytes.get_mut(addr as usize) {
            Some(byte) => {
                *byte = data;
                true
            }
            None => false,
        }
    }
}

impl ByteStore for RomStorage {
    fn description(&self) -> String {
        describe_size(self.bytes.len(), "ROM")
    }

    fn peek_byte(&self, addr: u32) -> Option<u8> {
        self.bytes.get(addr as usize).copied()
    }

    fn write_byte(&mut self, addr: u32, data: u8) -> bool {
        self.poke(addr, data)
    }
}

//===========================================================================//

/// The wires between the memory controller and the ROM.
#[derive(Clone, Debug)]
pub struct RomPort {
    /// Raised by the controller to request a read.
    pub en: Signal<bool>,
    /// The address to read.
    pub addr: Signal<u32>,
    /// True for a 4-byte read, false for a 1-byte read.
    pub wide: Signal<bool>,
    /// The data read.
    pub data: Signal<u32>,
    /// Raised by the ROM when `data` and `error` are valid.
    pub ready: Signal<bool>,
    /// Raised by the ROM for a misaligned wide read.
    pub error: Signal<bool>,
}

impl RomPort {
    /// Registers the ROM wires with the kernel.
    pub fn new(kernel: &mut Kernel) -> RomPort {
        RomPort {
            en: kernel.signal("rom_en", false),
            addr: kernel.signal("rom_addr", 0),
            wide: kernel.signal("rom_wide", false),
            data: kernel.signal("rom_data", 0),
            ready: kernel.signal("rom_ready", false),
            error: kernel.signal("rom_error", false),
        }
    }
}

//===========================================================================//

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RomState {
    Idle,
    Busy { addr: u32, wide: bool },
    Done,
}

/// A simulated read-only memory that answers read requests on a
/// [`RomPort`] after a fixed number of clock cycles.
pub struct RomDevice {
    storage: RomStorage,
    latency: u32,
    port: RomPort,
    state: RomState,
}

impl RomDevice {
    /// Returns a new ROM device serving `storage` with the given latency, in
    /// clock cycles.
    pub fn new(
        storage: RomStorage,
        latency: u32,
        port: RomPort,
    ) -> RomDevice {
        RomDevice { storage, latency, port, state: RomState::Idle }
    }

    /// Returns the size of the ROM in bytes.
    pub fn size(&self) -> u32 {
        self.storage.size()
    }

    /// Returns the contents of the ROM.
    pub fn storage(&self) -> &RomStorage {
        &self.storage
    }

    fn fetch_byte(&self, addr: u32) -> u8 {
        self.storage.peek_byte(addr).unwrap_or_else(|| {
            log::warn!("ROM read from unmapped address 0x{addr:08x}");
            0xff
        })
    }

    fn respond(&self, addr: u32, wide: bool) {
        if !wide {
            let byte = self.fetch_byte(addr);
            log::debug!("ROM 1B read at 0x{addr:08x}: 0x{byte:02x}");
            self.port.data.write(byte.into());
            self.port.error.write(false);
        } else if addr % 4 != 0 {
            log::debug!("ROM 4B read at misaligned address 0x{addr:08x}");
            self.port.data.write(0);
            self.port.error.write(true);
        } else {
            let mut bytes = [0u8; 4];
            for (offset, byte) in (0..).zip(bytes.iter_mut()) {
                *byte = self.fetch_byte(addr.wrapping_add(offset));
            }
            let word = LittleEndian::read_u32(&bytes);
            log::debug!("ROM 4B read at 0x{addr:08x}: 0x{word:08x}");
            self.port.data.write(word);
            self.port.error.write(false);
        }
        self.port.ready.write(true);
    }
}

impl Process for RomDevice {
    fn name(&self) -> &str {
        "rom"
    }

    fn resume(&mut self) -> Wait {
        match self.state {
            RomState::Idle => {
                if !self.port.en.read() {
                    return Wait::Clock;
                }
                self.port.ready.write(false);
                self.port.error.write(false);
                let addr = self.port.addr.read();
                let wide = self.port.wide.read();
                if self.latency == 0 {
                    self.respond(addr, wide);
                    self.state = RomState::Done;
                    Wait::Clock
                } else {
                    self.state = RomState::Busy { addr, wide };
                    Wait::Cycles(self.latency)
                }
            }
            RomState::Busy { addr, wide } => {
                self.respond(addr, wide);
                self.state = RomState::Done;
                Wait::Clock
            }
            RomState::Done => {
                if !self.port.en.read() {
                    self.port.ready.write(false);
                    self.state = RomState::Idle;
                }
                Wait::Clock
            }
        }
    }
}

//===========================================================================//


//===========================================================================//
