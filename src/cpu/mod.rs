//! CPU emulation.
//!
//! This module implements the scalar arithmetic unit:
//! - 1024 byte memory cells, program loaded at address 0
//! - A (accumulator), B (auxiliary), PC, zero and carry flags
//! - 8-instruction set with immediate or absolute byte operands

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::Registers;
pub use decode::Instruction;
pub use execute::{Cpu, CpuError, CpuReport, CpuState, DEFAULT_MAX_STEPS};
