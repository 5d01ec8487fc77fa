//! Execution engine.
//!
//! [`Runner`] owns a [`Machine`] together with its input and output channels
//! and executes one instruction per [`Runner::step`]. See [`Runner`] docs for
//! more.

use std::io::{self, Write};

use tracing::{debug, info, trace};

use crate::{
    error::{Error, Fault, Result},
    io::{CharInput, CharOutput},
    opcode::{Instruction, Opcode},
    vm::{Machine, MODULUS, REGISTER_COUNT, VALUE_MASK},
};

/// Result of one [`Runner::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Instruction executed, machine keeps running.
    Continue,
    /// Machine is halted. Further steps do nothing.
    Halted,
}

/// Engine configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Recognize the operator characters `%` and `+` on program input.
    ///
    /// `%` toggles call tracing, `+` sets the last register to 1. Either way
    /// the rest of the input token is discarded and the character never
    /// reaches the program.
    pub input_hooks: bool,
    /// Start with call tracing on.
    pub trace_calls: bool,
}

/// Fetch-decode-execute loop over a [`Machine`].
///
/// # Example
/// ```
/// # use synvm_base::{runner::*, vm::Machine, io::Chars};
/// #
/// // add <0> <1> 4; out <0>; halt
/// let machine = Machine::load(&[9, 32768, 32769, 4, 19, 32768, 0]);
/// let mut output = Vec::new();
/// let mut runner = Runner::new(machine, Chars::new(&b""[..]), &mut output);
///
/// assert_eq!(runner.step().unwrap(), Signal::Continue);
/// assert_eq!(runner.machine.register(0), 4);
///
/// runner.run().unwrap();
/// assert!(runner.machine.is_halted());
/// assert_eq!(runner.step().unwrap(), Signal::Halted);
///
/// drop(runner);
/// assert_eq!(output, &[4]);
/// ```
pub struct Runner<I, O> {
    pub machine: Machine,
    input: I,
    output: O,
    options: Options,
    trace_calls: bool,
    diagnostics: Box<dyn Write>,
}

impl<I: CharInput, O: CharOutput> Runner<I, O> {
    /// Creates new runner with default [`Options`] and diagnostics going
    /// nowhere.
    pub fn new(machine: Machine, input: I, output: O) -> Self {
        Self {
            machine,
            input,
            output,
            options: Options::default(),
            trace_calls: false,
            diagnostics: Box::new(io::sink()),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self.trace_calls = options.trace_calls;
        self
    }

    /// Sets the stream call traces are written to.
    pub fn with_diagnostics(mut self, diagnostics: impl Write + 'static) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// `true` while `call` instructions are being traced.
    pub fn is_tracing_calls(&self) -> bool {
        self.trace_calls
    }

    pub fn flush_output(&mut self) -> io::Result<()> {
        self.output.flush_chars()
    }

    /// Gives the channels back.
    pub fn into_parts(self) -> (Machine, I, O) {
        (self.machine, self.input, self.output)
    }

    /// Steps until the machine halts.
    pub fn run(&mut self) -> Result<()> {
        let res = loop {
            match self.step() {
                Ok(Signal::Continue) => continue,
                Ok(Signal::Halted) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.flush_output()?;
        res
    }

    /// Execute one instruction.
    ///
    /// The program counter moves past the operands before the instruction
    /// takes effect, so `call` pushes the address of the following
    /// instruction. On a halted machine this is a no-op.
    pub fn step(&mut self) -> Result<Signal> {
        if self.machine.is_halted() {
            return Ok(Signal::Halted);
        }

        let addr = self.machine.pc;
        let instruction =
            Instruction::decode(self.machine.cells(), addr).map_err(|fault| fault.at(addr))?;
        trace!(addr, %instruction, "exec");

        if self.trace_calls && instruction.opcode() == Opcode::Call {
            self.trace_call(addr)?;
        }

        self.machine.pc = addr.wrapping_add(instruction.len());

        match instruction {
            Instruction::Out([src]) => {
                let v = self.machine.resolve(src).map_err(|fault| fault.at(addr))?;
                let c = char::from_u32(v as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
                self.output.write_char(c)?;
                Ok(Signal::Continue)
            }
            Instruction::In([dst]) => {
                let v = self.read_input(addr)?;
                self.machine.store(dst, v).map_err(|fault| fault.at(addr))?;
                Ok(Signal::Continue)
            }
            other => {
                let signal = execute(&mut self.machine, &other).map_err(|fault| fault.at(addr))?;
                if signal == Signal::Halted {
                    info!(addr, "halted");
                }
                Ok(signal)
            }
        }
    }

    fn trace_call(&mut self, addr: u16) -> Result<()> {
        let cells = self.machine.cells();
        let start = (addr as usize + 1).min(cells.len());
        let end = (start + 3).min(cells.len());
        writeln!(
            self.diagnostics,
            " / mem[{addr}] = {} .. {:?}",
            cells[addr as usize],
            Words(&cells[start..end])
        )?;
        Ok(())
    }

    fn next_char(&mut self, addr: u16) -> Result<char> {
        self.input
            .read_char()?
            .ok_or(Error::InputExhausted { addr })
    }

    /// Reads the value `in` stores, running the operator hooks on the way.
    /// A `\r` consumes the character after it, so a trailing `\r` ends input.
    fn read_input(&mut self, addr: u16) -> Result<u16> {
        self.flush_output()?;

        loop {
            let c = self.next_char(addr)?;

            if self.options.input_hooks {
                match c {
                    '%' => {
                        self.input.skip_token()?;
                        self.trace_calls = !self.trace_calls;
                        debug!(enabled = self.trace_calls, "call tracing toggled");
                        continue;
                    }
                    '+' => {
                        self.input.skip_token()?;
                        self.machine.set_register(REGISTER_COUNT - 1, 1);
                        debug!(register = REGISTER_COUNT - 1, "privileged flag set");
                        continue;
                    }
                    _ => {}
                }
            }

            if c == '\r' {
                self.next_char(addr)?;
                return Ok(b'\n' as u16);
            }
            return Ok(u32::from(c) as u16);
        }
    }
}

/// Formats words the way the call trace shows them: `[a b c]`.
struct Words<'a>(&'a [u16]);

impl std::fmt::Debug for Words<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (idx, word) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{word}")?;
        }
        f.write_str("]")
    }
}

/// Applies every instruction that does not touch a channel. The program
/// counter must already point past `instruction`.
fn execute(vm: &mut Machine, instruction: &Instruction) -> std::result::Result<Signal, Fault> {
    match *instruction {
        Instruction::Halt(_) => {
            vm.halt();
            return Ok(Signal::Halted);
        }
        Instruction::Noop(_) => {}

        Instruction::Set([dst, src]) => {
            let v = vm.resolve(src)?;
            vm.store(dst, v)?;
        }
        Instruction::Push([src]) => {
            let v = vm.resolve(src)?;
            vm.push(v);
        }
        Instruction::Pop([dst]) => {
            let v = vm.pop().ok_or(Fault::StackUnderflow(Opcode::Pop))?;
            vm.store(dst, v)?;
        }

        Instruction::Eq([dst, a, b])
        | Instruction::Gt([dst, a, b])
        | Instruction::Add([dst, a, b])
        | Instruction::Mult([dst, a, b])
        | Instruction::Mod([dst, a, b])
        | Instruction::And([dst, a, b])
        | Instruction::Or([dst, a, b]) => {
            let (a, b) = (vm.resolve(a)? as u32, vm.resolve(b)? as u32);
            let v = match instruction.opcode() {
                Opcode::Mod if b == 0 => return Err(Fault::DivisionByZero),

                Opcode::Eq => (a == b) as u32,
                Opcode::Gt => (a > b) as u32,
                Opcode::Add => (a + b) % MODULUS as u32,
                Opcode::Mult => (a * b) % MODULUS as u32,
                Opcode::Mod => a % b,
                Opcode::And => a & b,
                Opcode::Or => a | b,

                _ => unreachable!(),
            };
            vm.store(dst, v as u16)?;
        }
        Instruction::Not([dst, src]) => {
            let v = !vm.resolve(src)? & VALUE_MASK;
            vm.store(dst, v)?;
        }

        Instruction::Rmem([dst, addr]) => {
            let addr = vm.resolve(addr)?;
            let v = vm.read(addr)?;
            vm.store(dst, v)?;
        }
        Instruction::Wmem([addr, src]) => {
            let (addr, v) = (vm.resolve(addr)?, vm.resolve(src)?);
            vm.write(addr, v)?;
        }

        Instruction::Jmp([target]) => vm.pc = vm.resolve(target)?,
        Instruction::Jt([cond, target]) | Instruction::Jf([cond, target]) => {
            let (cond, target) = (vm.resolve(cond)?, vm.resolve(target)?);
            let jump = match instruction.opcode() {
                Opcode::Jt => cond != 0,
                Opcode::Jf => cond == 0,

                _ => unreachable!(),
            };
            if jump {
                vm.pc = target;
            }
        }
        Instruction::Call([target]) => {
            let target = vm.resolve(target)?;
            vm.push(vm.pc);
            vm.pc = target;
        }
        Instruction::Ret(_) => {
            vm.pc = vm.pop().ok_or(Fault::StackUnderflow(Opcode::Ret))?;
        }

        Instruction::Out(_) | Instruction::In(_) => {
            unreachable!("channel instructions run in Runner::step")
        }
    }

    Ok(Signal::Continue)
}
