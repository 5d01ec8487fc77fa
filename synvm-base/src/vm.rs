//! Machine state: address space, operand stack, program counter.
//!
//! The address space is 32768 memory cells followed by 8 registers, so register
//! `n` is simply cell `32768 + n`. An operand word names a literal or a
//! register (see [`Operand`]).

use std::fmt;

use tracing::{debug, warn};

use crate::error::Fault;

/// Arithmetic modulus. Also the address of register 0.
pub const MODULUS: u16 = 1 << 15;
/// Mask of the 15 significant bits.
pub const VALUE_MASK: u16 = MODULUS - 1;
/// Count of registers.
pub const REGISTER_COUNT: usize = 8;
/// Count of memory cells (without registers).
pub const MEMORY_SIZE: usize = MODULUS as usize;
/// Count of all addressable cells.
pub const ADDRESS_SPACE: usize = MEMORY_SIZE + REGISTER_COUNT;

/// One decoded operand word.
///
/// ```
/// # use synvm_base::vm::Operand;
/// assert_eq!(Operand::from_raw(42), Operand::Literal(42));
/// assert_eq!(Operand::from_raw(32770), Operand::Register(2));
/// assert_eq!(Operand::from_raw(40000), Operand::Invalid(40000));
/// assert_eq!(Operand::Register(2).to_string(), "<2>");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    /// `0..=32767`. As a destination this is a memory cell.
    Literal(u16),
    /// `32768..=32775`, register number `0..=7`.
    Register(u8),
    /// `32776..`. Neither readable nor writable.
    Invalid(u16),
}

impl Operand {
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            0..=VALUE_MASK => Self::Literal(raw),
            _ if (raw as usize) < ADDRESS_SPACE => Self::Register((raw - MODULUS) as u8),
            _ => Self::Invalid(raw),
        }
    }

    pub const fn to_raw(self) -> u16 {
        match self {
            Self::Literal(v) | Self::Invalid(v) => v,
            Self::Register(n) => MODULUS + n as u16,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{v}"),
            Operand::Register(n) => write!(f, "<{n}>"),
            Operand::Invalid(v) => write!(f, "<{}>", v - MODULUS),
        }
    }
}

/// Full machine state. Created once per program and mutated by every
/// instruction.
#[derive(Clone)]
pub struct Machine {
    cells: Box<[u16]>,
    pub stack: Vec<u16>,
    /// Address of the next instruction to fetch.
    pub pc: u16,
    halted: bool,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("pc", &self.pc)
            .field("halted", &self.halted)
            .field("stack", &self.stack)
            .field("registers", &self.registers())
            .finish_non_exhaustive()
    }
}

impl Machine {
    /// Allocate zeroed machine.
    pub fn new() -> Self {
        Self {
            cells: vec![0; ADDRESS_SPACE].into_boxed_slice(),
            stack: Vec::new(),
            pc: 0,
            halted: false,
        }
    }

    /// Allocate machine with `image` copied to memory starting at address 0.
    /// Only the first [`MEMORY_SIZE`] words are loaded, registers stay zero.
    pub fn load(image: &[u16]) -> Self {
        let mut machine = Self::new();
        let len = image.len().min(MEMORY_SIZE);
        if len < image.len() {
            warn!(
                words = image.len(),
                dropped = image.len() - len,
                "program image exceeds memory, tail dropped"
            );
        }
        machine.cells[..len].copy_from_slice(&image[..len]);
        debug!(words = len, "program loaded");

        machine
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    /// The whole address space, registers included.
    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    /// The memory region, without registers.
    pub fn memory(&self) -> &[u16] {
        &self.cells[..MEMORY_SIZE]
    }

    pub fn registers(&self) -> &[u16] {
        &self.cells[MEMORY_SIZE..]
    }

    /// Gets value of register. Panics if `n` is not below [`REGISTER_COUNT`].
    pub fn register(&self, n: usize) -> u16 {
        self.registers()[n]
    }

    /// Sets value of register. Panics if `n` is not below [`REGISTER_COUNT`].
    pub fn set_register(&mut self, n: usize, v: u16) {
        self.cells[MEMORY_SIZE + n] = v;
    }

    /// Reads any cell of the address space.
    pub fn read(&self, addr: u16) -> Result<u16, Fault> {
        self.cells
            .get(addr as usize)
            .copied()
            .ok_or(Fault::AddressOutOfRange(addr))
    }

    /// Writes any cell of the address space.
    pub fn write(&mut self, addr: u16, v: u16) -> Result<(), Fault> {
        let cell = self
            .cells
            .get_mut(addr as usize)
            .ok_or(Fault::AddressOutOfRange(addr))?;
        *cell = v;
        Ok(())
    }

    /// Gets value of a source operand: literals are returned as is, registers
    /// are replaced by their contents.
    pub fn resolve(&self, op: Operand) -> Result<u16, Fault> {
        match op {
            Operand::Literal(v) => Ok(v),
            Operand::Register(n) => Ok(self.register(n as usize)),
            Operand::Invalid(v) => Err(Fault::InvalidOperand(v)),
        }
    }

    /// Writes to a destination operand. A destination is a raw address and is
    /// never resolved.
    pub fn store(&mut self, dst: Operand, v: u16) -> Result<(), Fault> {
        match dst {
            Operand::Literal(addr) => self.write(addr, v),
            Operand::Register(n) => {
                self.set_register(n as usize, v);
                Ok(())
            }
            Operand::Invalid(raw) => Err(Fault::InvalidOperand(raw)),
        }
    }

    pub fn push(&mut self, v: u16) {
        self.stack.push(v);
    }

    pub fn pop(&mut self) -> Option<u16> {
        self.stack.pop()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    #[rustfmt::skip]
    fn operand_classes() {
        let expected = [
            (0,     Operand::Literal(0)),
            (32767, Operand::Literal(32767)),
            (32768, Operand::Register(0)),
            (32775, Operand::Register(7)),
            (32776, Operand::Invalid(32776)),
            (65535, Operand::Invalid(65535)),
        ];

        for (raw, op) in expected {
            assert_eq!(Operand::from_raw(raw), op);
            assert_eq!(op.to_raw(), raw);
        }
    }

    #[test]
    fn registers_follow_memory() {
        let mut vm = Machine::new();
        vm.set_register(3, 77);

        assert_eq!(vm.read(32771), Ok(77));
        assert_eq!(vm.cells().len(), ADDRESS_SPACE);
        assert_eq!(vm.memory().len(), MEMORY_SIZE);

        vm.write(32775, 1).unwrap();
        assert_eq!(vm.register(7), 1);
        assert_eq!(vm.read(32776), Err(Fault::AddressOutOfRange(32776)));
        assert_eq!(vm.write(40000, 1), Err(Fault::AddressOutOfRange(40000)));
    }

    #[test]
    fn destinations_are_not_resolved() {
        let mut vm = Machine::new();
        vm.set_register(0, 500);

        // literal destination is a memory cell, even if a register holds that number
        vm.store(Operand::Literal(10), 9).unwrap();
        assert_eq!(vm.read(10), Ok(9));
        assert_eq!(vm.register(0), 500);

        vm.store(Operand::Register(0), 3).unwrap();
        assert_eq!(vm.register(0), 3);
        assert_eq!(vm.store(Operand::Invalid(33000), 1), Err(Fault::InvalidOperand(33000)));
    }

    #[test]
    fn load_copies_to_low_memory() {
        let vm = Machine::load(&[19, 65, 0]);

        assert_eq!(&vm.memory()[..4], &[19, 65, 0, 0]);
        assert_eq!(vm.pc, 0);
        assert!(vm.stack.is_empty());
        assert!(!vm.is_halted());
    }

    #[test]
    fn load_never_touches_registers() {
        let image = vec![7; MEMORY_SIZE + 4];
        let vm = Machine::load(&image);

        assert_eq!(vm.memory()[MEMORY_SIZE - 1], 7);
        assert_eq!(vm.registers(), &[0; REGISTER_COUNT]);
    }

    proptest! {
        #[test]
        fn resolve_literal_or_register(raw in 0u16..(ADDRESS_SPACE as u16), fill in 0u16..MODULUS) {
            let mut vm = Machine::new();
            for n in 0..REGISTER_COUNT {
                vm.set_register(n, fill.wrapping_add(n as u16));
            }
            let expected = if raw < MODULUS {
                raw
            } else {
                fill.wrapping_add(raw - MODULUS)
            };
            prop_assert_eq!(vm.resolve(Operand::from_raw(raw)), Ok(expected));
        }
    }
}
