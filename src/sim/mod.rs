//! A cooperative discrete-event simulation kernel with two-phase signals.

mod kernel;
mod signal;
mod trace;

pub use kernel::{
    CLOCK_PERIOD_NS, DELTA_LIMIT, Kernel, Process, SimError, Wait,
};
pub use signal::{Edge, Signal, SignalId, SignalValue};
pub use trace::VcdWriter;

//===========================================================================//
