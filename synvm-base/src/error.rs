//! Errors reported by the machine.

use std::io;

use thiserror::Error;

use crate::opcode::Opcode;

pub type Result<T> = std::result::Result<T, Error>;

/// A fatal machine condition, without location. Malformed programs end up here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("stack underflow on {0}")]
    StackUnderflow(Opcode),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),
    #[error("address {0} is outside of the address space")]
    AddressOutOfRange(u16),
    #[error("operand {0} is neither a literal nor a register")]
    InvalidOperand(u16),
    #[error("division by zero")]
    DivisionByZero,
}

impl Fault {
    /// Tags the fault with the address of the instruction that raised it.
    pub fn at(self, addr: u16) -> Error {
        Error::Machine { addr, fault: self }
    }
}

/// Errors returned by [`Runner::step`](crate::runner::Runner::step) and the debugger.
#[derive(Debug, Error)]
pub enum Error {
    #[error("mem[{addr}]: {fault}")]
    Machine {
        addr: u16,
        #[source]
        fault: Fault,
    },
    #[error("mem[{addr}]: program input exhausted")]
    InputExhausted { addr: u16 },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns the machine fault, if this is one.
    pub fn fault(&self) -> Option<Fault> {
        match self {
            Error::Machine { fault, .. } => Some(*fault),
            _ => None,
        }
    }
}
