//! Opcode table and instruction decoding.
use synvm_base_proc_mnemonic::mnemonic;

use core::{array, convert, fmt};

use crate::{error::Fault, vm::Operand};

/// Generates the opcode kind enum and the instruction enum from one table.
///
/// ```ignore
/// enum Bar {
///     /// doc
///     Foo = 3 => 2, // raw opcode 3, two operands
/// }
/// ```
macro_rules! impl_opcodes {
    ($(#[$m1:meta])* $v1:vis enum $name1:ident {} $(#[$m2:meta])* $v2:vis enum $name2:ident { $($(#[doc = $vm:expr])* $var:ident = $code:literal => $argc:literal),* $(,)? }) => {
        $(#[$m1])*
        $v1 enum $name1 {$(
            $(#[doc = $vm])* $var = $code,
        )*}

        impl $name1 {
            /// Array of all variants.
            pub const VARIANTS: &[$name1] = &[$(Self::$var, )*];

            /// Get mnemonic of variant.
            pub const fn name(self) -> &'static str {
                match self {$(
                    Self::$var => mnemonic!($var),
                )*}
            }

            /// Get documentation for variant.
            pub const fn incode_doc(self) -> &'static str {
                match self {$(
                    Self::$var => concat!( $($vm)* , ),
                )*}
            }

            /// Count of operand words following the opcode word.
            pub const fn operand_count(self) -> u16 {
                match self {$(
                    Self::$var => $argc,
                )*}
            }

            /// Try get opcode kind by raw word.
            pub const fn from_raw(raw: u16) -> Option<Self> {
                match raw {
                    $( $code => Some(Self::$var), )*
                    _ => None,
                }
            }
        }

        $(#[$m2])*
        $v2 enum $name2 {$(
            $(#[doc = $vm])* $var ([Operand; $argc]),
        )*}

        impl $name2 {
            /// Operands in encoding order.
            pub fn operands(&self) -> &[Operand] {
                match self {$(
                    Self::$var(args) => args,
                )*}
            }
        }

        impl convert::TryFrom<($name1, &[Operand])> for $name2 {
            type Error = array::TryFromSliceError;

            fn try_from(v: ($name1, &[Operand])) -> Result<Self, Self::Error> {
                match v.0 {$(
                    $name1::$var => Ok(Self::$var(v.1.try_into()?)),
                )*}
            }
        }
        impl From<&$name2> for $name1 {
            fn from(v: &$name2) -> Self {
                match v {$(
                    $name2::$var(_) => Self::$var,
                )*}
            }
        }
    };
}

impl_opcodes! {
    /// Represents opcode kind. Can be obtained from [`Instruction`]
    /// using [`Instruction::opcode`] or from a raw word with [`Opcode::from_raw`].
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    #[repr(u16)]
    pub enum Opcode {}

    /// Decoded instruction with its operands. Extended version of [`Opcode`].
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum Instruction {
        /// Stop execution
        Halt = 0 => 0,
        /// `a <- b`
        Set = 1 => 2,
        /// Push `a` onto the stack
        Push = 2 => 1,
        /// Pop the stack into `a`, fatal if empty
        Pop = 3 => 1,
        /// `a <- 1` if `b == c`, else `a <- 0`
        Eq = 4 => 3,
        /// `a <- 1` if `b > c`, else `a <- 0`
        Gt = 5 => 3,
        /// Jump to `a`
        Jmp = 6 => 1,
        /// Jump to `b` if `a != 0`
        Jt = 7 => 2,
        /// Jump to `b` if `a == 0`
        Jf = 8 => 2,
        /// `a <- (b + c) % 32768`
        Add = 9 => 3,
        /// `a <- (b * c) % 32768`
        Mult = 10 => 3,
        /// `a <- b % c`
        Mod = 11 => 3,
        /// `a <- b & c`
        And = 12 => 3,
        /// `a <- b | c`
        Or = 13 => 3,
        /// `a <- !b`, 15-bit
        Not = 14 => 2,
        /// `a <- mem[b]`
        Rmem = 15 => 2,
        /// `mem[a] <- b`
        Wmem = 16 => 2,
        /// Push address of the next instruction and jump to `a`
        Call = 17 => 1,
        /// Pop the stack and jump to it, fatal if empty
        Ret = 18 => 0,
        /// Write character `a` to output
        Out = 19 => 1,
        /// Read a character from input into `a`
        In = 20 => 1,
        /// Do nothing
        Noop = 21 => 0,
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Opcode {
    /// Returns raw opcode word.
    #[inline(always)]
    pub const fn as_raw(self) -> u16 {
        self as u16
    }

    /// Convert opcode kind to full [`Instruction`] object. Returns [`None`]
    /// if `args` has fewer operands than the opcode takes.
    #[inline(always)]
    pub fn to_instruction(self, args: &[Operand]) -> Option<Instruction> {
        let args = args.get(0..self.operand_count() as usize)?;
        Instruction::try_from((self, args)).ok()
    }
}

impl Instruction {
    /// Gets opcode kind.
    #[inline(always)]
    pub fn opcode(&self) -> Opcode {
        self.into()
    }

    /// Encoded length in words, opcode included.
    #[inline(always)]
    pub fn len(&self) -> u16 {
        1 + self.opcode().operand_count()
    }

    /// `true` if the listing of a code region ends after this instruction.
    pub fn ends_block(&self) -> bool {
        matches!(self, Instruction::Halt(_) | Instruction::Ret(_))
    }

    /// Decodes the instruction stored at `addr` of `cells`.
    ///
    /// ```
    /// # use synvm_base::{opcode::*, vm::Operand, error::Fault};
    /// let cells = [9, 32768, 32769, 4, 12345];
    ///
    /// let add = Instruction::decode(&cells, 0).unwrap();
    /// let (r0, r1) = (Operand::Register(0), Operand::Register(1));
    /// assert_eq!(add, Instruction::Add([r0, r1, Operand::Literal(4)]));
    /// assert_eq!(add.len(), 4);
    /// assert_eq!(add.to_string(), "add <0> <1> 4");
    ///
    /// assert_eq!(Instruction::decode(&cells, 4), Err(Fault::UnknownOpcode(12345)));
    /// ```
    pub fn decode(cells: &[u16], addr: u16) -> Result<Self, Fault> {
        let raw = *cells
            .get(addr as usize)
            .ok_or(Fault::AddressOutOfRange(addr))?;
        let kind = Opcode::from_raw(raw).ok_or(Fault::UnknownOpcode(raw))?;

        let mut args = [Operand::Literal(0); 3];
        for (idx, slot) in args[..kind.operand_count() as usize].iter_mut().enumerate() {
            let at = addr.wrapping_add(1 + idx as u16);
            let word = *cells
                .get(at as usize)
                .ok_or(Fault::AddressOutOfRange(at))?;
            *slot = Operand::from_raw(word);
        }

        kind.to_instruction(&args).ok_or(Fault::UnknownOpcode(raw))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode().name())?;
        for op in self.operands() {
            write!(f, " {op}")?;
        }
        Ok(())
    }
}
