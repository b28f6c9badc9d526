use super::signal::{Edge, Signal, SignalId, SignalValue, Wire};
use super::trace::VcdWriter;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use thiserror::Error;

//===========================================================================//

/// The number of delta cycles a single tick may take before the kernel
/// gives up on it.
pub const DELTA_LIMIT: usize = 1000;

/// The simulated clock period, in nanoseconds.  Only used for traces.
pub const CLOCK_PERIOD_NS: u64 = 10;

//===========================================================================//

/// A fatal error in the simulation itself (as opposed to an access error,
/// which the simulated hardware reports through its own signals).
#[derive(Debug, Error)]
pub enum SimError {
    /// Processes kept waking each other without the tick ever settling.
    #[error(
        "cycle {cycle} did not settle within {limit} delta cycles \
         (last runnable: {process})"
    )]
    DeltaOverflow {
        /// The cycle during which the overflow happened.
        cycle: u64,
        /// The delta cycle limit that was exceeded.
        limit: usize,
        /// The name of a process that was still runnable.
        process: String,
    },
    /// A single request did not complete within the safety cap.
    #[error("request did not complete within {cycles} cycles")]
    Stalled {
        /// The number of cycles simulated for the request.
        cycles: u64,
    },
    /// Writing the waveform trace failed.
    #[error("failed to write trace: {0}")]
    Trace(#[from] io::Error),
}

//===========================================================================//

/// What a suspended process is waiting for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Wait {
    /// Resume at the next rising clock edge.
    Clock,
    /// Resume after the given number of rising clock edges.  Zero behaves
    /// like one.
    Cycles(u32),
    /// Resume in the delta cycle after the given signal rises.
    Rising(SignalId),
}

/// A unit of simulated logic.
///
/// Every call to `resume` runs the process from where it last suspended
/// until its next suspension point, which it returns.  A process must keep
/// all state it needs across suspensions in `self`.
pub trait Process {
    /// Returns the name of this process, for diagnostics.
    fn name(&self) -> &str;

    /// Runs the process until it suspends again.
    fn resume(&mut self) -> Wait;
}

//===========================================================================//

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Blocked {
    Runnable,
    Clock,
    Edges(u32),
    Rising(SignalId),
}

impl From<Wait> for Blocked {
    fn from(wait: Wait) -> Blocked {
        match wait {
            Wait::Clock | Wait::Cycles(0) | Wait::Cycles(1) => Blocked::Clock,
            Wait::Cycles(count) => Blocked::Edges(count),
            Wait::Rising(id) => Blocked::Rising(id),
        }
    }
}

struct Slot {
    process: Box<dyn Process>,
    blocked: Blocked,
}

struct SharedProcess<P> {
    name: String,
    inner: Rc<RefCell<P>>,
}

impl<P: Process> Process for SharedProcess<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn resume(&mut self) -> Wait {
        self.inner.borrow_mut().resume()
    }
}

//===========================================================================//

/// A cooperative discrete-event simulation kernel.
///
/// Each call to [`Kernel::tick`] advances simulated time by one clock
/// cycle.  Within a tick, processes run in delta cycles: every runnable
/// process runs against the values committed before the delta cycle, then
/// all pending signal writes are committed at once, and processes waiting
/// on a resulting rising edge become runnable for the next delta cycle.
pub struct Kernel {
    wires: Vec<Rc<dyn Wire>>,
    slots: Vec<Slot>,
    clk: Signal<bool>,
    cycle: u64,
    trace: Option<VcdWriter<Box<dyn Write>>>,
}

impl Kernel {
    /// Returns a new kernel with only the clock signal registered.
    pub fn new() -> Kernel {
        let clk = Signal::new(SignalId(0), "clk", false);
        Kernel {
            wires: vec![clk.as_wire()],
            slots: Vec::new(),
            clk,
            cycle: 0,
            trace: None,
        }
    }

    /// Registers a new signal with the given initial value.
    pub fn signal<T: SignalValue>(
        &mut self,
        name: &str,
        init: T,
    ) -> Signal<T> {
        let signal = Signal::new(SignalId(self.wires.len()), name, init);
        self.wires.push(signal.as_wire());
        signal
    }

    /// Returns the clock signal.
    pub fn clk(&self) -> &Signal<bool> {
        &self.clk
    }

    /// Returns the number of clock cycles simulated so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Adds a process to the simulation.  It first runs at the next clock
    /// edge.  Processes spawned earlier always run earlier within a delta
    /// cycle, although that order never affects what they observe.
    pub fn spawn<P: Process + 'static>(&mut self, process: P) {
        log::trace!("spawned process {}", process.name());
        let process = Box::new(process);
        self.slots.push(Slot { process, blocked: Blocked::Clock });
    }

    /// Like [`Kernel::spawn`], but returns a handle through which the
    /// process can be inspected between ticks.  The handle must not be
    /// borrowed while the kernel is ticking.
    pub fn spawn_shared<P: Process + 'static>(
        &mut self,
        process: P,
    ) -> Rc<RefCell<P>> {
        let name = process.name().to_string();
        let inner = Rc::new(RefCell::new(process));
        self.spawn(SharedProcess { name, inner: inner.clone() });
        inner
    }

    /// Starts dumping every registered signal to `out` as a VCD stream.
    /// Signals registered after this call are not traced.
    pub fn trace_to(&mut self, out: Box<dyn Write>) {
        let mut vcd = VcdWriter::new(out, env!("CARGO_PKG_NAME"));
        for wire in self.wires.iter() {
            vcd.declare(wire.name(), wire.width());
        }
        self.trace = Some(vcd);
    }

    /// Flushes and closes the trace stream, if any.
    pub fn finish_trace(&mut self) -> Result<(), SimError> {
        if let Some(vcd) = self.trace.take() {
            vcd.finish()?;
        }
        Ok(())
    }

    /// Simulates one full clock cycle.
    pub fn tick(&mut self) -> Result<(), SimError> {
        // Writes made from outside the kernel since the last tick land
        // before the clock edge.
        self.settle()?;
        if self.cycle == 0 {
            self.sample(0)?;
        }
        self.cycle += 1;
        let edge_time = self.cycle * CLOCK_PERIOD_NS;
        self.clk.write(true);
        let edges = self.commit();
        for slot in self.slots.iter_mut() {
            slot.blocked = match slot.blocked {
                Blocked::Clock | Blocked::Edges(1) => Blocked::Runnable,
                Blocked::Edges(count) => Blocked::Edges(count - 1),
                other => other,
            };
        }
        self.wake(&edges);
        self.settle()?;
        self.sample(edge_time)?;
        self.clk.write(false);
        self.settle()?;
        self.sample(edge_time + CLOCK_PERIOD_NS / 2)?;
        Ok(())
    }

    /// Runs delta cycles until no process is runnable and no signal has a
    /// pending write.
    fn settle(&mut self) -> Result<(), SimError> {
        for _ in 0..DELTA_LIMIT {
            for slot in self.slots.iter_mut() {
                if slot.blocked == Blocked::Runnable {
                    slot.blocked = Blocked::from(slot.process.resume());
                }
            }
            let edges = self.commit();
            if edges.is_empty() {
                return Ok(());
            }
            self.wake(&edges);
        }
        let process = self
            .slots
            .iter()
            .find(|slot| slot.blocked == Blocked::Runnable)
            .map(|slot| slot.process.name().to_string())
            .unwrap_or_default();
        Err(SimError::DeltaOverflow {
            cycle: self.cycle,
            limit: DELTA_LIMIT,
            process,
        })
    }

    fn commit(&mut self) -> Vec<(SignalId, Edge)> {
        self.wires
            .iter()
            .filter_map(|wire| wire.commit().map(|edge| (wire.id(), edge)))
            .collect()
    }

    fn wake(&mut self, edges: &[(SignalId, Edge)]) {
        for &(id, edge) in edges {
            if edge != Edge::Rising {
                continue;
            }
            for slot in self.slots.iter_mut() {
                if slot.blocked == Blocked::Rising(id) {
                    slot.blocked = Blocked::Runnable;
                }
            }
        }
    }

    fn sample(&mut self, time: u64) -> Result<(), SimError> {
        if let Some(vcd) = self.trace.as_mut() {
            let values: Vec<u64> = self
                .wires
                .iter()
                .take(vcd.num_vars())
                .map(|wire| wire.bits())
                .collect();
            vcd.sample(time, &values)?;
        }
        Ok(())
    }
}

impl Default for Kernel {
    fn default() -> Kernel {
        Kernel::new()
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{Kernel, Process, SimError, Wait};
    use crate::sim::Signal;
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    /// Copies `input` to `output` on every clock edge.
    struct Flop {
        name: &'static str,
        input: Signal<u32>,
        output: Signal<u32>,
    }

    impl Process for Flop {
        fn name(&self) -> &str {
            self.name
        }

        fn resume(&mut self) -> Wait {
            self.output.write(self.input.read());
            Wait::Clock
        }
    }

    fn swap_chain(reverse: bool) -> (u32, u32) {
        let mut kernel = Kernel::new();
        let a = kernel.signal("a", 1u32);
        let b = kernel.signal("b", 2u32);
        let ab = Flop { name: "ab", input: a.clone(), output: b.clone() };
        let ba = Flop { name: "ba", input: b.clone(), output: a.clone() };
        if reverse {
            kernel.spawn(ba);
            kernel.spawn(ab);
        } else {
            kernel.spawn(ab);
            kernel.spawn(ba);
        }
        kernel.tick().unwrap();
        (a.read(), b.read())
    }

    #[test]
    fn same_tick_order_does_not_matter() {
        assert_eq!(swap_chain(false), (2, 1));
        assert_eq!(swap_chain(true), (2, 1));
    }

    /// Counts how often it was resumed, waiting `wait` each time.
    struct Counter {
        wait: Wait,
        count: Rc<RefCell<u32>>,
    }

    impl Process for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn resume(&mut self) -> Wait {
            *self.count.borrow_mut() += 1;
            self.wait
        }
    }

    #[test]
    fn cycles_wait() {
        let count = Rc::new(RefCell::new(0));
        let mut kernel = Kernel::new();
        kernel.spawn(Counter { wait: Wait::Cycles(3), count: count.clone() });
        for _ in 0..7 {
            kernel.tick().unwrap();
        }
        // Resumed at cycles 1, 4 and 7.
        assert_eq!(*count.borrow(), 3);
        assert_eq!(kernel.cycle(), 7);
    }

    #[test]
    fn zero_cycles_wait_means_next_edge() {
        let count = Rc::new(RefCell::new(0));
        let mut kernel = Kernel::new();
        kernel.spawn(Counter { wait: Wait::Cycles(0), count: count.clone() });
        for _ in 0..4 {
            kernel.tick().unwrap();
        }
        assert_eq!(*count.borrow(), 4);
    }

    #[test]
    fn shared_process_can_be_inspected() {
        let count = Rc::new(RefCell::new(0));
        let mut kernel = Kernel::new();
        let counter = kernel
            .spawn_shared(Counter { wait: Wait::Clock, count: count.clone() });
        kernel.tick().unwrap();
        kernel.tick().unwrap();
        assert_eq!(counter.borrow().wait, Wait::Clock);
        assert_eq!(*counter.borrow().count.borrow(), 2);
    }

    /// Raises `strobe` on its first clock edge, then idles.
    struct Strober {
        strobe: Signal<bool>,
    }

    impl Process for Strober {
        fn name(&self) -> &str {
            "strober"
        }

        fn resume(&mut self) -> Wait {
            self.strobe.write(true);
            Wait::Cycles(u32::MAX)
        }
    }

    /// Latches `data` whenever `strobe` rises.
    struct Listener {
        strobe: Signal<bool>,
        data: Signal<u32>,
        seen: Rc<RefCell<Vec<u32>>>,
        armed: bool,
    }

    impl Process for Listener {
        fn name(&self) -> &str {
            "listener"
        }

        fn resume(&mut self) -> Wait {
            if self.armed {
                self.seen.borrow_mut().push(self.data.read());
            }
            self.armed = true;
            Wait::Rising(self.strobe.id())
        }
    }

    #[test]
    fn rising_edge_wakes_within_the_same_tick() {
        let mut kernel = Kernel::new();
        let strobe = kernel.signal("strobe", false);
        let data = kernel.signal("data", 0u32);
        let seen = Rc::new(RefCell::new(Vec::new()));
        kernel.spawn(Strober { strobe: strobe.clone() });
        kernel.spawn(Listener {
            strobe: strobe.clone(),
            data: data.clone(),
            seen: seen.clone(),
            armed: false,
        });
        data.write(0xabcd);
        kernel.tick().unwrap();
        assert_eq!(*seen.borrow(), vec![0xabcd]);
        kernel.tick().unwrap();
        assert_eq!(*seen.borrow(), vec![0xabcd]);
    }

    /// Alternately raises one of two signals and waits for that one to
    /// rise, so it never settles.
    struct PingPong {
        ping: Signal<bool>,
        pong: Signal<bool>,
        phase: bool,
    }

    impl Process for PingPong {
        fn name(&self) -> &str {
            "ping-pong"
        }

        fn resume(&mut self) -> Wait {
            self.phase = !self.phase;
            self.ping.write(self.phase);
            self.pong.write(!self.phase);
            if self.phase {
                Wait::Rising(self.ping.id())
            } else {
                Wait::Rising(self.pong.id())
            }
        }
    }

    #[test]
    fn delta_overflow_is_detected() {
        let mut kernel = Kernel::new();
        let ping = kernel.signal("ping", false);
        let pong = kernel.signal("pong", false);
        kernel.spawn(PingPong { ping, pong, phase: false });
        match kernel.tick() {
            Err(SimError::DeltaOverflow { cycle, process, .. }) => {
                assert_eq!(cycle, 1);
                assert_eq!(process, "ping-pong");
            }
            other => panic!("expected delta overflow, got {other:?}"),
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn trace_records_clock_and_signals() {
        let buffer = SharedBuffer::default();
        let mut kernel = Kernel::new();
        let strobe = kernel.signal("strobe", false);
        kernel.spawn(Strober { strobe });
        kernel.trace_to(Box::new(buffer.clone()));
        kernel.tick().unwrap();
        kernel.tick().unwrap();
        kernel.finish_trace().unwrap();
        let text = String::from_utf8(buffer.0.borrow().clone()).unwrap();
        assert!(text.contains("$var wire 1 ! clk $end"));
        assert!(text.contains("$var wire 1 \" strobe $end"));
        assert!(text.contains("#10\n1!\n1\"\n#15\n0!\n#20\n1!\n"));
    }
}

//===========================================================================//
