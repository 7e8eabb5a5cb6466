//! CPU registers and flags.
//!
//! The CPU has:
//! - A: 8-bit accumulator (main computation register)
//! - B: 8-bit auxiliary register (no instruction touches it yet)
//! - PC: program counter, an index into memory
//! - zero / carry flags, recomputed by every arithmetic instruction

use serde::{Serialize, Deserialize};

/// The CPU register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// A: accumulator
    pub a: u8,

    /// B: auxiliary register
    pub b: u8,

    /// PC: program counter
    pub pc: usize,

    /// Set when the last arithmetic result was zero.
    pub zero: bool,

    /// Set when the last ADD overflowed or the last SUB borrowed.
    pub carry: bool,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers and flags to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Increment the program counter by 1.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> usize {
        let old = self.pc;
        self.pc += 1;
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = addr as usize;
    }

    /// A := value, zero recomputed. Carry is left alone.
    pub fn load(&mut self, value: u8) {
        self.a = value;
        self.zero = self.a == 0;
    }

    /// A := A + value with carry out of bit 7.
    pub fn add(&mut self, value: u8) {
        let raw = self.a as u16 + value as u16;
        self.carry = raw > 0xFF;
        self.a = (raw & 0xFF) as u8;
        self.zero = self.a == 0;
    }

    /// A := A - value with borrow.
    pub fn sub(&mut self, value: u8) {
        let raw = self.a as i16 - value as i16;
        self.carry = raw < 0;
        self.a = (raw & 0xFF) as u8;
        self.zero = self.a == 0;
    }
}
