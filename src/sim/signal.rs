use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

//===========================================================================//

/// Unique identifier for a signal registered with a simulation kernel.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SignalId(pub(super) usize);

//===========================================================================//

/// A value that can be carried by a [`Signal`].
pub trait SignalValue: Copy + PartialEq + fmt::Debug + 'static {
    /// The number of bits needed to represent this value in a trace.
    const WIDTH: u32;

    /// Returns the raw bits of this value, zero-extended to 64 bits.
    fn to_bits(self) -> u64;
}

impl SignalValue for bool {
    const WIDTH: u32 = 1;

    fn to_bits(self) -> u64 {
        self as u64
    }
}

impl SignalValue for u8 {
    const WIDTH: u32 = 8;

    fn to_bits(self) -> u64 {
        self.into()
    }
}

impl SignalValue for u32 {
    const WIDTH: u32 = 32;

    fn to_bits(self) -> u64 {
        self.into()
    }
}

//===========================================================================//

/// How a signal's committed value changed during an update phase.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Edge {
    /// The value went from zero to non-zero.
    Rising,
    /// The value went from non-zero to zero.
    Falling,
    /// The value changed between two non-zero values.
    Changed,
}

impl Edge {
    fn between(old: u64, new: u64) -> Edge {
        match (old, new) {
            (0, _) => Edge::Rising,
            (_, 0) => Edge::Falling,
            _ => Edge::Changed,
        }
    }
}

//===========================================================================//

struct SignalCell<T> {
    id: SignalId,
    name: String,
    current: Cell<T>,
    pending: Cell<Option<T>>,
}

/// A wire between two simulated components.
///
/// Writes to a signal do not take effect immediately; they are buffered as
/// a pending value (the last write wins) until the kernel's next update
/// phase.  Until then, every reader sees the previously committed value.
/// Cloning a `Signal` yields another handle to the same wire.
pub struct Signal<T> {
    cell: Rc<SignalCell<T>>,
}

impl<T: SignalValue> Signal<T> {
    pub(super) fn new(id: SignalId, name: &str, init: T) -> Signal<T> {
        Signal {
            cell: Rc::new(SignalCell {
                id,
                name: name.to_string(),
                current: Cell::new(init),
                pending: Cell::new(None),
            }),
        }
    }

    /// Returns the identifier the kernel assigned to this signal.
    pub fn id(&self) -> SignalId {
        self.cell.id
    }

    /// Returns the name this signal was registered with.
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Returns the currently committed value.
    pub fn read(&self) -> T {
        self.cell.current.get()
    }

    /// Schedules `value` to become visible at the next update phase.
    pub fn write(&self, value: T) {
        self.cell.pending.set(Some(value));
    }

    pub(super) fn as_wire(&self) -> Rc<dyn Wire> {
        self.cell.clone()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Signal<T> {
        Signal { cell: self.cell.clone() }
    }
}

impl<T: SignalValue> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.cell.name, self.cell.current.get())
    }
}

//===========================================================================//

/// Type-erased view of a signal, used by the kernel for the update phase and
/// for tracing.
pub(super) trait Wire {
    fn id(&self) -> SignalId;
    fn name(&self) -> &str;
    fn width(&self) -> u32;
    fn bits(&self) -> u64;

    /// Commits the pending value, if any.  Returns how the committed value
    /// changed, or `None` if it stayed the same.
    fn commit(&self) -> Option<Edge>;
}

impl<T: SignalValue> Wire for SignalCell<T> {
    fn id(&self) -> SignalId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        T::WIDTH
    }

    fn bits(&self) -> u64 {
        self.current.get().to_bits()
    }

    fn commit(&self) -> Option<Edge> {
        let new = self.pending.take()?;
        let old = self.current.replace(new);
        if old == new {
            None
        } else {
            Some(Edge::between(old.to_bits(), new.to_bits()))
        }
    }
}

//===========================================================================//


//===========================================================================//
