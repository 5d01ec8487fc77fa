//! Interactive debugger layered over [`Runner`].
//!
//! Before every instruction the debugger asks its [`BreakMode`] whether to
//! pause. While paused it reads one command line and acts on it:
//!
//! | Command | Action                                                          |
//! |---------|-----------------------------------------------------------------|
//! | `w`     | print program counter, stack and registers, stay paused         |
//! | `d`     | disassemble from the program counter, stay paused               |
//! | `cf`    | run until the current call frame returns to its caller          |
//! | *other* | execute one instruction (an empty line is the usual way)        |
//!
//! Unknown commands are not an error, they just step.
//!
//! # Example
//! ```
//! # use synvm_base::{debugger::Debugger, runner::Runner, vm::Machine, io::{Chars, Lines}};
//! // set <0> 7; halt
//! let runner = Runner::new(Machine::load(&[1, 32768, 7, 0]), Chars::new(&b""[..]), Vec::new());
//! let mut console = Vec::new();
//! let mut debugger = Debugger::new(runner, Lines::new(&b"w\n\nw\n"[..]), &mut console);
//!
//! debugger.run().unwrap();
//! drop(debugger);
//!
//! let console = String::from_utf8(console).unwrap();
//! assert!(console.starts_with("pc: 0\n"));
//! assert!(console.contains("pc: 3\nstack: []\nregisters: [7, 0, 0, 0, 0, 0, 0, 0]\n"));
//! ```

use std::io::Write;

use tracing::debug;

use crate::{
    disasm::disassemble,
    error::Result,
    io::{CharInput, CharOutput, CommandSource},
    opcode::Opcode,
    runner::{Runner, Signal},
};

/// Pause policy, evaluated before each instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BreakMode {
    /// Pause before everything except `out`, so text prints in one go.
    #[default]
    Default,
    /// Run until the frame that was active when entering this mode returns.
    /// `depth` counts frames entered since, plus one.
    RunToReturn { depth: u32 },
}

impl BreakMode {
    /// Decides whether to pause before `next` and returns the mode for the
    /// instruction after it. `next` is [`None`] if the program counter does
    /// not point at a valid opcode.
    ///
    /// ```
    /// # use synvm_base::{debugger::BreakMode, opcode::Opcode};
    /// let mode = BreakMode::RunToReturn { depth: 1 };
    ///
    /// let (pause, mode) = mode.check(Some(Opcode::Ret));
    /// assert!(!pause);
    /// assert_eq!(mode, BreakMode::RunToReturn { depth: 0 });
    ///
    /// // the frame has returned, pause before whatever comes next
    /// assert_eq!(mode.check(Some(Opcode::Noop)), (true, BreakMode::Default));
    /// ```
    pub fn check(self, next: Option<Opcode>) -> (bool, BreakMode) {
        match self {
            BreakMode::Default => (next != Some(Opcode::Out), self),
            BreakMode::RunToReturn { depth: 0 } => (true, BreakMode::Default),
            BreakMode::RunToReturn { depth } => {
                let depth = match next {
                    Some(Opcode::Call) => depth + 1,
                    Some(Opcode::Ret) => depth - 1,
                    _ => depth,
                };
                (false, BreakMode::RunToReturn { depth })
            }
        }
    }
}

/// A parsed command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `w`
    Where,
    /// `d`
    Disassemble,
    /// `cf`
    ContinueFunction,
    /// Empty line.
    Step,
    /// Anything else. Treated as [`Command::Step`].
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "w" => Command::Where,
            "d" => Command::Disassemble,
            "cf" => Command::ContinueFunction,
            "" => Command::Step,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Debugger over a [`Runner`]. See module-level documentation.
///
/// Commands come from `C`, everything the debugger prints goes to `W`. The
/// runner keeps its own program input and output.
pub struct Debugger<I, O, C, W> {
    pub runner: Runner<I, O>,
    commands: C,
    console: W,
    mode: BreakMode,
}

impl<I, O, C, W> Debugger<I, O, C, W>
where
    I: CharInput,
    O: CharOutput,
    C: CommandSource,
    W: Write,
{
    pub fn new(runner: Runner<I, O>, commands: C, console: W) -> Self {
        Self {
            runner,
            commands,
            console,
            mode: BreakMode::Default,
        }
    }

    pub fn mode(&self) -> BreakMode {
        self.mode
    }

    /// Runs until the machine halts.
    pub fn run(&mut self) -> Result<()> {
        while self.tick()? == Signal::Continue {}
        self.runner.flush_output()?;
        Ok(())
    }

    /// Evaluates the pause policy once and then either handles one command or
    /// executes one instruction.
    pub fn tick(&mut self) -> Result<Signal> {
        if self.runner.machine.is_halted() {
            return Ok(Signal::Halted);
        }

        let (pause, mode) = self.mode.check(self.next_opcode());
        if mode != self.mode {
            debug!(from = ?self.mode, to = ?mode, "break mode");
        }
        self.mode = mode;

        if pause {
            match self.read_command()? {
                Command::Where => {
                    self.print_where()?;
                    return Ok(Signal::Continue);
                }
                Command::Disassemble => {
                    self.print_listing()?;
                    return Ok(Signal::Continue);
                }
                Command::ContinueFunction => {
                    self.mode = BreakMode::RunToReturn { depth: 1 };
                    debug!(pc = self.runner.machine.pc, "running to return");
                    return Ok(Signal::Continue);
                }
                Command::Step | Command::Unknown(_) => {}
            }
        }

        self.runner.step()
    }

    fn next_opcode(&self) -> Option<Opcode> {
        let machine = &self.runner.machine;
        let raw = machine.cells().get(machine.pc as usize)?;
        Opcode::from_raw(*raw)
    }

    /// End of the command stream reads as an empty line.
    fn read_command(&mut self) -> Result<Command> {
        self.runner.flush_output()?;
        self.console.flush()?;

        let line = self.commands.read_command()?.unwrap_or_default();
        Ok(Command::parse(&line))
    }

    fn print_where(&mut self) -> Result<()> {
        let machine = &self.runner.machine;
        writeln!(self.console, "pc: {}", machine.pc)?;
        writeln!(self.console, "stack: {:?}", machine.stack)?;
        writeln!(self.console, "registers: {:?}", machine.registers())?;
        Ok(())
    }

    fn print_listing(&mut self) -> Result<()> {
        let machine = &self.runner.machine;
        for line in disassemble(machine.cells(), machine.pc) {
            writeln!(self.console, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        io::{Chars, Lines},
        vm::Machine,
    };

    const R0: u16 = 32768;

    /// Runs `program` under the debugger and returns (program output, console).
    fn debug(program: &[u16], input: &str, commands: &str) -> (String, String) {
        let runner = Runner::new(Machine::load(program), Chars::new(input.as_bytes()), Vec::new());
        let mut debugger = Debugger::new(runner, Lines::new(commands.as_bytes()), Vec::new());
        debugger.run().unwrap();

        let Debugger { runner, console, .. } = debugger;
        let output = runner.into_parts().2;
        (
            String::from_utf8(output).unwrap(),
            String::from_utf8(console).unwrap(),
        )
    }

    #[test]
    fn default_pauses_on_everything_but_out() {
        let mut mode = BreakMode::Default;
        for kind in Opcode::VARIANTS {
            let (pause, next) = mode.check(Some(*kind));
            assert_eq!(pause, *kind != Opcode::Out, "{kind}");
            mode = next;
        }
        assert_eq!(mode, BreakMode::Default);
        assert_eq!(mode.check(None), (true, BreakMode::Default));
    }

    #[test]
    fn run_to_return_counts_frames() {
        #[rustfmt::skip]
        let trace = [
            (Opcode::Call, false, 2),
            (Opcode::Out,  false, 2),
            (Opcode::Call, false, 3),
            (Opcode::Ret,  false, 2),
            (Opcode::In,   false, 2),
            (Opcode::Ret,  false, 1),
            (Opcode::Ret,  false, 0),
        ];
        let mut mode = BreakMode::RunToReturn { depth: 1 };
        for (idx, (kind, pause, depth)) in trace.into_iter().enumerate() {
            let (p, next) = mode.check(Some(kind));
            assert_eq!((p, next), (pause, BreakMode::RunToReturn { depth }), "Testing step #{idx}");
            mode = next;
        }

        assert_eq!(mode.check(Some(Opcode::Call)), (true, BreakMode::Default));
        let deep = BreakMode::RunToReturn { depth: 4 };
        assert_eq!(deep.check(None), (false, deep));
    }

    #[test]
    fn commands_parse() {
        assert_eq!(Command::parse("w"), Command::Where);
        assert_eq!(Command::parse(" d "), Command::Disassemble);
        assert_eq!(Command::parse("cf"), Command::ContinueFunction);
        assert_eq!(Command::parse(""), Command::Step);
        assert_eq!(Command::parse("quit"), Command::Unknown("quit".into()));
    }

    #[test]
    fn output_runs_without_pausing() {
        #[rustfmt::skip]
        let program = [
            19, 'o' as u16,
            19, 'k' as u16,
            0,
        ];
        // no commands at all: only the halt pauses, and end of commands steps
        let (output, console) = debug(&program, "", "");

        assert_eq!(output, "ok");
        assert_eq!(console, "");
    }

    #[test]
    fn where_and_disassemble_stay_paused() {
        #[rustfmt::skip]
        let program = [
            1, R0, 5,       // 0: set <0> 5
            19, R0,         // 3: out <0>
            18,             // 5: ret
        ];
        let runner = Runner::new(Machine::load(&program), Chars::new(&b""[..]), Vec::new());
        let mut debugger = Debugger::new(runner, Lines::new(&b"w\nd\n\n"[..]), Vec::new());

        for _ in 0..2 {
            assert_eq!(debugger.tick().unwrap(), Signal::Continue);
            assert_eq!(debugger.runner.machine.pc, 0);
        }
        debugger.tick().unwrap();
        assert_eq!(debugger.runner.machine.register(0), 5);

        let console = String::from_utf8(debugger.console.clone()).unwrap();
        assert_eq!(
            console,
            "pc: 0\nstack: []\nregisters: [0, 0, 0, 0, 0, 0, 0, 0]\n\
             0: set <0> 5\n3: out <0>\n5: ret\n"
        );
    }

    #[test]
    fn continue_function_skips_nested_calls() {
        #[rustfmt::skip]
        let program = [
            17, 3,          // 0: call 3
            0,              // 2: halt
            17, 7,          // 3: call 7     <- cf here
            18,             // 5: ret
            21,             // 6: noop
            17, 11,         // 7: call 11
            18,             // 9: ret
            21,             // 10: noop
            19, 'x' as u16, // 11: out 'x'
            18,             // 13: ret
        ];
        let (output, console) = debug(&program, "", "\ncf\nw\n");

        assert_eq!(output, "x");
        // the frame entered at 0 has returned, next up is the halt at 2
        assert_eq!(console, "pc: 2\nstack: []\nregisters: [0, 0, 0, 0, 0, 0, 0, 0]\n");
    }

    #[test]
    fn continue_function_mode_reverts() {
        let program = [17, 4, 21, 0, 21, 18];
        let runner = Runner::new(Machine::load(&program), Chars::new(&b""[..]), Vec::new());
        let mut debugger = Debugger::new(runner, Lines::new(&b"\ncf\nw\n"[..]), Vec::new());

        debugger.tick().unwrap(); // step into call
        assert_eq!(debugger.runner.machine.pc, 4);
        debugger.tick().unwrap(); // cf
        assert_eq!(debugger.mode(), BreakMode::RunToReturn { depth: 1 });

        while debugger.mode() != BreakMode::Default {
            debugger.tick().unwrap();
        }
        // back at 2 and paused there: the `w` was read before anything ran
        assert_eq!(debugger.runner.machine.pc, 2);
        assert!(String::from_utf8(debugger.console.clone()).unwrap().starts_with("pc: 2\n"));
        assert!(debugger.runner.machine.stack.is_empty());
    }

    #[test]
    fn program_input_is_separate_from_commands() {
        #[rustfmt::skip]
        let program = [
            20, R0,         // 0: in <0>
            19, R0,         // 2: out <0>
            0,              // 4: halt
        ];
        let (output, console) = debug(&program, "q", "w\nnonsense\n\n");

        assert_eq!(output, "q");
        assert!(console.starts_with("pc: 0\n"));
    }

    #[test]
    fn errors_propagate() {
        let runner = Runner::new(Machine::load(&[3, R0]), Chars::new(&b""[..]), Vec::new());
        let mut debugger = Debugger::new(runner, Lines::new(&b""[..]), Vec::new());

        let err = debugger.run().unwrap_err();
        assert_eq!(err.fault(), Some(crate::error::Fault::StackUnderflow(Opcode::Pop)));
    }
}
