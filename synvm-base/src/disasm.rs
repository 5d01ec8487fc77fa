//! Disassembler for forward runs of code.
//!
//! A listing starts at an address and decodes instruction after instruction
//! until it has emitted a `halt` or `ret`. Literal operands are printed as
//! numbers, registers as `<n>`.
//!
//! # Example
//! ```
//! # use synvm_base::disasm::disassemble;
//! let cells = [1, 32768, 5, 19, 32768, 18, 19, 65];
//! let listing: Vec<String> = disassemble(&cells, 0).map(|line| line.to_string()).collect();
//!
//! assert_eq!(listing, &["0: set <0> 5", "3: out <0>", "5: ret"]);
//! ```

use std::fmt;

use crate::opcode::Instruction;

/// One line of a listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Line {
    /// Decoded instruction at `addr`.
    Instruction { addr: u16, instruction: Instruction },
    /// A word at `addr` that could not be decoded. Ends the listing.
    Data { addr: u16, raw: u16 },
}

impl Line {
    pub fn addr(&self) -> u16 {
        match self {
            Line::Instruction { addr, .. } | Line::Data { addr, .. } => *addr,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Instruction { addr, instruction } => write!(f, "{addr}: {instruction}"),
            Line::Data { addr, raw } => write!(f, "{addr}: ??? {raw}"),
        }
    }
}

/// Lists instructions of `cells` starting at `start`. See module-level
/// documentation.
pub fn disassemble(cells: &[u16], start: u16) -> Listing<'_> {
    Listing {
        cells,
        next: Some(start),
    }
}

/// Iterator over the [`Line`]s of a listing.
#[derive(Clone, Debug)]
pub struct Listing<'a> {
    cells: &'a [u16],
    next: Option<u16>,
}

impl Iterator for Listing<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Self::Item> {
        let addr = self.next.take()?;
        let raw = *self.cells.get(addr as usize)?;

        match Instruction::decode(self.cells, addr) {
            Ok(instruction) => {
                if !instruction.ends_block() {
                    self.next = addr.checked_add(instruction.len());
                }
                Some(Line::Instruction { addr, instruction })
            }
            Err(_) => Some(Line::Data { addr, raw }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(cells: &[u16], start: u16) -> Vec<String> {
        disassemble(cells, start).map(|line| line.to_string()).collect()
    }

    #[test]
    #[rustfmt::skip]
    fn stops_after_halt_or_ret() {
        let cells = [
            9, 32768, 32768, 1,     // 0: add <0> <0> 1
            7, 32768, 0,            // 4: jt <0> 0
            0,                      // 7: halt
            19, 65,                 // 8: out 65
            17, 8,                  // 10: call 8
            18,                     // 12: ret
            21,                     // 13: never listed
        ];

        assert_eq!(lines(&cells, 0), &["0: add <0> <0> 1", "4: jt <0> 0", "7: halt"]);
        assert_eq!(lines(&cells, 8), &["8: out 65", "10: call 8", "12: ret"]);
        assert_eq!(lines(&cells, 12), &["12: ret"]);
    }

    #[test]
    fn undecodable_word_ends_listing() {
        let cells = [21, 99, 21, 0];
        let listing: Vec<_> = disassemble(&cells, 0).collect();

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[1], Line::Data { addr: 1, raw: 99 });
        assert_eq!(listing[1].to_string(), "1: ??? 99");
    }

    #[test]
    fn end_of_cells_ends_listing() {
        // noop, then a push whose operand is missing
        assert_eq!(lines(&[21, 2], 0), &["0: noop", "1: ??? 2"]);
        assert_eq!(lines(&[21, 21], 0), &["0: noop", "1: noop"]);
        assert_eq!(lines(&[21], 5), Vec::<String>::new());
    }

    #[test]
    fn does_not_execute() {
        // ret with an empty stack is fine to list
        let listing: Vec<_> = disassemble(&[18], 0).collect();

        assert_eq!(listing, &[Line::Instruction { addr: 0, instruction: Instruction::Ret([]) }]);
        assert_eq!(listing[0].addr(), 0);
    }
}
