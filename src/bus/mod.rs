//! Simulated memory devices and the controller that arbitrates them.

mod controller;
mod ownership;
mod ram;
mod rom;

pub use controller::{ControllerConfig, HostPort, MemoryController};
pub use ownership::{OwnershipTable, RELEASE_USER, SUPERUSER};
pub use ram::{MainMemory, RamPort, RamStorage};
pub use rom::{RomDevice, RomError, RomPort, RomStorage};

use std::fmt;

//===========================================================================//

/// Byte-addressed backing storage for a simulated memory device.
///
/// Addresses are absolute bus addresses.  Implementations should *not*
/// panic when given an address that is out of range.
pub trait ByteStore {
    /// Returns a human-readable description of this storage.
    fn description(&self) -> String;

    /// Returns the value of a single byte, or `None` if the address is not
    /// backed by this storage.
    fn peek_byte(&self, addr: u32) -> Option<u8>;

    /// Writes a single byte.  Returns false (and changes nothing) if the
    /// address is not backed by this storage.
    fn write_byte(&mut self, addr: u32, data: u8) -> bool;
}

pub(crate) fn describe_size(size: usize, kind: &str) -> String {
    if size < 1024 {
        format!("{size}B {kind}")
    } else if size < 1024 * 1024 {
        format!("{}kB {kind}", size >> 10)
    } else {
        format!("{}MB {kind}", size >> 20)
    }
}

//===========================================================================//

/// Whether a request reads or writes memory.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AccessKind {
    /// Read data from memory.
    Read,
    /// Write data to memory.
    Write,
}

/// The width of a memory access.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Width {
    /// A single byte.
    Narrow,
    /// A 4-byte little-endian word.
    Wide,
}

impl Width {
    /// Returns the number of bytes moved by an access of this width.
    pub fn bytes(self) -> u32 {
        match self {
            Width::Narrow => 1,
            Width::Wide => 4,
        }
    }

    /// Returns true for [`Width::Wide`].
    pub fn is_wide(self) -> bool {
        self == Width::Wide
    }
}

//===========================================================================//

/// One access issued by the control unit.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MemoryRequest {
    /// Read or write.
    pub kind: AccessKind,
    /// The bus address of the first byte accessed.
    pub addr: u32,
    /// The data to write.  Ignored for reads.
    pub data: u32,
    /// How many bytes are accessed.
    pub width: Width,
    /// The id of the user issuing the request.
    pub user: u8,
}

impl MemoryRequest {
    /// Returns a read request.
    pub fn read(addr: u32, width: Width, user: u8) -> MemoryRequest {
        MemoryRequest { kind: AccessKind::Read, addr, data: 0, width, user }
    }

    /// Returns a write request.
    pub fn write(
        addr: u32,
        data: u32,
        width: Width,
        user: u8,
    ) -> MemoryRequest {
        MemoryRequest { kind: AccessKind::Write, addr, data, width, user }
    }

    /// Returns true if this request writes memory.
    pub fn is_write(&self) -> bool {
        self.kind == AccessKind::Write
    }
}

impl fmt::Display for MemoryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.width.bytes();
        match self.kind {
            AccessKind::Read => write!(
                f,
                "read {width}B at 0x{:08x} by user {}",
                self.addr, self.user
            ),
            AccessKind::Write => write!(
                f,
                "write {width}B 0x{:x} at 0x{:08x} by user {}",
                self.data, self.addr, self.user
            ),
        }
    }
}

/// The outcome of one [`MemoryRequest`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MemoryResponse {
    /// The data read, or zero for writes and failed reads.
    pub data: u32,
    /// True if the controller reported an access error.
    pub error: bool,
    /// The number of clock cycles the request took.
    pub cycles: u64,
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{MemoryRequest, Width, describe_size};

    #[test]
    fn size_descriptions() {
        assert_eq!(describe_size(0x20, "ROM"), "32B ROM");
        assert_eq!(describe_size(0x1000, "ROM"), "4kB ROM");
        assert_eq!(describe_size(0x100000, "ROM"), "1MB ROM");
    }

    #[test]
    fn request_display() {
        let read = MemoryRequest::read(0x1f, Width::Narrow, 3);
        assert_eq!(read.to_string(), "read 1B at 0x0000001f by user 3");
        let write = MemoryRequest::write(40, 0xa5a5a5a5, Width::Wide, 2);
        assert!(write.is_write());
        assert_eq!(
            write.to_string(),
            "write 4B 0xa5a5a5a5 at 0x00000028 by user 2"
        );
    }
}

//===========================================================================//
