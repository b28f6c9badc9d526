use std::io::{self, Write};

//===========================================================================//

/// Writes signal values as a VCD (Value Change Dump) waveform stream.
///
/// The header is emitted together with the first sample; after that, each
/// sample only writes the variables whose value changed.
pub struct VcdWriter<W: Write> {
    out: W,
    scope: String,
    vars: Vec<VcdVar>,
    header_written: bool,
}

struct VcdVar {
    code: String,
    name: String,
    width: u32,
    last: Option<u64>,
}

impl<W: Write> VcdWriter<W> {
    /// Returns a new writer that puts all variables under the given module
    /// scope.
    pub fn new(out: W, scope: &str) -> VcdWriter<W> {
        VcdWriter {
            out,
            scope: scope.to_string(),
            vars: Vec::new(),
            header_written: false,
        }
    }

    /// Declares a variable.  Variables must all be declared before the first
    /// sample is written; they are identified by declaration order.
    pub fn declare(&mut self, name: &str, width: u32) {
        debug_assert!(!self.header_written);
        let code = vcd_code(self.vars.len());
        self.vars.push(VcdVar {
            code,
            name: name.to_string(),
            width,
            last: None,
        });
    }

    /// Returns the number of declared variables.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Records the values of all variables (in declaration order) at the
    /// given time, in nanoseconds.
    pub fn sample(&mut self, time: u64, values: &[u64]) -> io::Result<()> {
        debug_assert_eq!(values.len(), self.vars.len());
        if !self.header_written {
            self.write_header()?;
            writeln!(self.out, "#{time}")?;
            writeln!(self.out, "$dumpvars")?;
            for (var, &value) in self.vars.iter_mut().zip(values) {
                write_value(&mut self.out, var, value)?;
                var.last = Some(value);
            }
            writeln!(self.out, "$end")?;
            return Ok(());
        }
        let mut stamped = false;
        for (var, &value) in self.vars.iter_mut().zip(values) {
            if var.last == Some(value) {
                continue;
            }
            if !stamped {
                writeln!(self.out, "#{time}")?;
                stamped = true;
            }
            write_value(&mut self.out, var, value)?;
            var.last = Some(value);
        }
        Ok(())
    }

    /// Flushes the stream and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.out, "$version {} $end", env!("CARGO_PKG_NAME"))?;
        writeln!(self.out, "$timescale 1ns $end")?;
        writeln!(self.out, "$scope module {} $end", self.scope)?;
        for var in self.vars.iter() {
            writeln!(
                self.out,
                "$var wire {} {} {} $end",
                var.width, var.code, var.name
            )?;
        }
        writeln!(self.out, "$upscope $end")?;
        writeln!(self.out, "$enddefinitions $end")?;
        self.header_written = true;
        Ok(())
    }
}

fn write_value<W: Write>(
    out: &mut W,
    var: &VcdVar,
    value: u64,
) -> io::Result<()> {
    if var.width == 1 {
        writeln!(out, "{}{}", value & 1, var.code)
    } else {
        writeln!(out, "b{:b} {}", value, var.code)
    }
}

/// Converts a variable index into a VCD identifier code, using the printable
/// ASCII characters `!` through `~` as base-94 digits.
fn vcd_code(index: usize) -> String {
    const BASE: usize = 94;
    let mut code = Vec::new();
    let mut rest = index;
    loop {
        code.push(b'!' + (rest % BASE) as u8);
        rest /= BASE;
        if rest == 0 {
            break;
        }
        rest -= 1;
    }
    code.reverse();
    String::from_utf8_lossy(&code).into_owned()
}

//===========================================================================//


//===========================================================================//
