//! # 15-bit word Virtual Machine
//!
//! This crate contains the machine, its disassembler and an interactive
//! debugger. A program goes through 3 stages to be executed:
//!
//! 1. [`codec`] -- decodes the raw little-endian image into words.
//! 2. [`vm`] -- machine state. Memory is loaded with the words, registers and stack start empty.
//! 3. [`runner`] -- fetches, decodes (see [`opcode`]) and executes one instruction per step.
//!
//! [`debugger`] wraps stage 3 and pauses before instructions, [`disasm`] lists
//! code without running it.
//!
//! # Example
//! Opcode list with operand counts can be found in [`Instruction`] enum.
//!
//! ```
//! # use synvm_base::{codec, runner::*, vm::*, io::Chars};
//! #
//! let image: &[u8] = &[
//!     0x01, 0x00, 0x00, 0x80, 0x30, 0x00,             // set  <0> 48
//!     0x11, 0x00, 0x08, 0x00,                         // call 8
//!     0x13, 0x00, 0x00, 0x80,                         // out  <0>
//!     0x00, 0x00,                                     // halt
//!
//!     0x09, 0x00, 0x00, 0x80, 0x00, 0x80, 0x01, 0x00, // add  <0> <0> 1     # 8
//!     0x12, 0x00,                                     // ret
//! ];
//! let program = codec::decode(image);
//!
//! let mut output = Vec::new();
//! let mut vm = Runner::new(Machine::load(&program), Chars::new(&b""[..]), &mut output);
//!
//! loop {
//!     match vm.step() {
//!         Ok(Signal::Continue) => continue,
//!         Ok(Signal::Halted) => break,
//!         Err(e) => panic!("runtime-error: {e}"),
//!     }
//! }
//!
//! assert_eq!(vm.machine.register(0), 49);
//! drop(vm);
//! assert_eq!(output, b"1");
//! ```
//!
//! # Machine model
//!
//! Every word is a 16-bit unsigned number. Only the low 15 bits take part in
//! arithmetic: `add`, `mult` and `not` work modulo 32768.
//!
//! ## Address space
//!
//! |      Range       |   Description   |
//! |------------------|-----------------|
//! | `0..=32767`      | memory          |
//! | `32768..=32775`  | registers 0..=7 |
//!
//! Program image is loaded at address 0. The operand stack is separate and
//! unbounded; `call` pushes return addresses to it and `ret` pops them.
//!
//! ## Operands
//!
//! | Raw value        | Meaning as source        | Meaning as destination |
//! |------------------|--------------------------|------------------------|
//! | `0..=32767`      | the number itself        | memory cell            |
//! | `32768..=32775`  | contents of register     | register               |
//! | `32776..`        | invalid                  | invalid                |
//!
//! There is [`Operand`] enum, that represents all of them.
//!
//! ## Opcodes
//!
//! Opcode word is followed by its operands. See [`Instruction`] for the
//! full table with operand counts.

// doc imports
#[allow(unused_imports)]
use {opcode::Instruction, vm::Operand};

pub mod codec;
pub mod debugger;
pub mod disasm;
pub mod error;
pub mod io;
pub mod opcode;
pub mod runner;
pub mod vm;

pub use error::{Error, Fault, Result};
