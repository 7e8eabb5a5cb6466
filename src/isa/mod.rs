//! Instruction set tables for both processors.
//!
//! Each processor owns a fixed registry of [`OpcodeDescriptor`]s. The two
//! opcode spaces overlap numerically (`0x00`..=`0x06` and `0xFF` appear in
//! both), so a code value alone never identifies the processor it belongs to.

use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

/// Which processor an instruction stream (or assembler section) targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Processor {
    /// The scalar arithmetic unit.
    Cpu,
    /// The raster drawing unit.
    Gpu,
}

impl Processor {
    /// The instruction set of this processor.
    pub fn isa(self) -> &'static InstructionSet {
        match self {
            Processor::Cpu => &CPU_ISA,
            Processor::Gpu => &GPU_ISA,
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Processor::Cpu => write!(f, "CPU"),
            Processor::Gpu => write!(f, "GPU"),
        }
    }
}

/// One entry of an instruction set: mnemonic, opcode byte and operand count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDescriptor {
    /// Canonical upper-case mnemonic.
    pub mnemonic: &'static str,
    /// Alternative spellings accepted by the assembler.
    pub aliases: &'static [&'static str],
    /// Opcode byte.
    pub code: u8,
    /// Number of operand bytes following the opcode.
    pub arity: usize,
}

impl OpcodeDescriptor {
    const fn new(mnemonic: &'static str, code: u8, arity: usize) -> Self {
        Self { mnemonic, aliases: &[], code, arity }
    }

    const fn with_aliases(mnemonic: &'static str, aliases: &'static [&'static str], code: u8, arity: usize) -> Self {
        Self { mnemonic, aliases, code, arity }
    }

    /// Encoded length of the instruction in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        1 + self.arity
    }

    fn answers_to(&self, mnemonic: &str) -> bool {
        self.mnemonic.eq_ignore_ascii_case(mnemonic)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(mnemonic))
    }
}

/// A processor's complete opcode registry.
#[derive(Debug)]
pub struct InstructionSet {
    processor: Processor,
    ops: &'static [OpcodeDescriptor],
}

impl InstructionSet {
    /// The processor this set belongs to.
    pub fn processor(&self) -> Processor {
        self.processor
    }

    /// Look up a descriptor by mnemonic (case-insensitive, aliases included).
    pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&'static OpcodeDescriptor> {
        self.ops.iter().find(|op| op.answers_to(mnemonic))
    }

    /// Look up a descriptor by opcode byte.
    pub fn by_code(&self, code: u8) -> Option<&'static OpcodeDescriptor> {
        self.ops.iter().find(|op| op.code == code)
    }

    /// Whether the opcode byte is defined in this set.
    #[inline]
    pub fn contains(&self, code: u8) -> bool {
        self.by_code(code).is_some()
    }

    /// All descriptors in table order.
    pub fn iter(&self) -> impl Iterator<Item = &'static OpcodeDescriptor> {
        self.ops.iter()
    }

    /// Split the instruction starting at `at` into its descriptor and
    /// operand bytes.
    pub fn fetch<'a>(&self, bytes: &'a [u8], at: usize) -> Result<(&'static OpcodeDescriptor, &'a [u8]), DecodeError> {
        let opcode = *bytes.get(at).ok_or(DecodeError::EndOfStream { at })?;
        let desc = self.by_code(opcode).ok_or(DecodeError::UnknownOpcode {
            processor: self.processor,
            opcode,
        })?;
        let operands = bytes.get(at + 1..at + desc.len()).ok_or(DecodeError::Truncated {
            processor: self.processor,
            opcode,
            needed: desc.arity,
            available: bytes.len().saturating_sub(at + 1),
        })?;
        Ok((desc, operands))
    }
}

/// Errors that can occur while decoding an instruction from a byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("no instruction at offset {at:#x}")]
    EndOfStream { at: usize },

    #[error("unknown {processor} opcode {opcode:#04x}")]
    UnknownOpcode { processor: Processor, opcode: u8 },

    #[error("{processor} opcode {opcode:#04x} needs {needed} operand byte(s), {available} left")]
    Truncated { processor: Processor, opcode: u8, needed: usize, available: usize },
}

/// Opcode bytes of the CPU.
pub mod cpu_op {
    pub const NOP: u8 = 0x00;
    pub const LDA: u8 = 0x01;
    pub const ADD: u8 = 0x02;
    pub const SUB: u8 = 0x03;
    pub const STA: u8 = 0x04;
    pub const JMP: u8 = 0x05;
    pub const JZ: u8 = 0x06;
    pub const HALT: u8 = 0xFF;
}

/// Opcode bytes of the GPU.
pub mod gpu_op {
    pub const NOP: u8 = 0x00;
    pub const SETX: u8 = 0x01;
    pub const SETY: u8 = 0x02;
    pub const SETC: u8 = 0x03;
    pub const PLOT: u8 = 0x04;
    pub const CLEAR: u8 = 0x05;
    pub const LINE: u8 = 0x06;
    pub const RECT: u8 = 0x07;
    pub const HALT: u8 = 0xFF;
}

/// The CPU instruction set.
pub static CPU_ISA: InstructionSet = InstructionSet {
    processor: Processor::Cpu,
    ops: &[
        OpcodeDescriptor::new("NOP", cpu_op::NOP, 0),
        OpcodeDescriptor::new("LDA", cpu_op::LDA, 1),
        OpcodeDescriptor::new("ADD", cpu_op::ADD, 1),
        OpcodeDescriptor::new("SUB", cpu_op::SUB, 1),
        OpcodeDescriptor::new("STA", cpu_op::STA, 1),
        OpcodeDescriptor::new("JMP", cpu_op::JMP, 1),
        OpcodeDescriptor::new("JZ", cpu_op::JZ, 1),
        OpcodeDescriptor::new("HALT", cpu_op::HALT, 0),
    ],
};

/// The GPU instruction set.
pub static GPU_ISA: InstructionSet = InstructionSet {
    processor: Processor::Gpu,
    ops: &[
        OpcodeDescriptor::with_aliases("NOP", &["GNOP"], gpu_op::NOP, 0),
        OpcodeDescriptor::new("SETX", gpu_op::SETX, 1),
        OpcodeDescriptor::new("SETY", gpu_op::SETY, 1),
        OpcodeDescriptor::new("SETC", gpu_op::SETC, 3),
        OpcodeDescriptor::new("PLOT", gpu_op::PLOT, 0),
        OpcodeDescriptor::new("CLEAR", gpu_op::CLEAR, 0),
        OpcodeDescriptor::new("LINE", gpu_op::LINE, 2),
        OpcodeDescriptor::new("RECT", gpu_op::RECT, 2),
        OpcodeDescriptor::with_aliases("HALT", &["GHALT"], gpu_op::HALT, 0),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_mnemonic_is_case_insensitive() {
        let lda = CPU_ISA.by_mnemonic("lda").unwrap();
        assert_eq!(lda.code, 0x01);
        assert_eq!(lda.arity, 1);
        assert!(CPU_ISA.by_mnemonic("SETX").is_none());
    }

    #[test]
    fn test_gpu_aliases() {
        assert_eq!(GPU_ISA.by_mnemonic("GHALT").unwrap().code, 0xFF);
        assert_eq!(GPU_ISA.by_mnemonic("gnop").unwrap().mnemonic, "NOP");
        assert!(CPU_ISA.by_mnemonic("GHALT").is_none());
    }

    #[test]
    fn test_code_spaces_overlap() {
        for code in [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xFF] {
            assert!(CPU_ISA.contains(code) && GPU_ISA.contains(code), "0x{:02X}", code);
        }
        assert!(!CPU_ISA.contains(0x07));
        assert!(GPU_ISA.contains(0x07));
        assert_eq!(GPU_ISA.by_code(gpu_op::SETC).unwrap().len(), 4);
    }

    #[test]
    fn test_fetch_splits_operands() {
        let bytes = [0x03, 1, 2, 3, 0x04];
        let (desc, ops) = GPU_ISA.fetch(&bytes, 0).unwrap();
        assert_eq!(desc.mnemonic, "SETC");
        assert_eq!(ops, &[1, 2, 3]);

        let (desc, ops) = GPU_ISA.fetch(&bytes, 4).unwrap();
        assert_eq!(desc.mnemonic, "PLOT");
        assert!(ops.is_empty());

        assert_eq!(GPU_ISA.fetch(&bytes, 5), Err(DecodeError::EndOfStream { at: 5 }));
    }

    #[test]
    fn test_fetch_errors() {
        assert_eq!(
            CPU_ISA.fetch(&[0x07], 0),
            Err(DecodeError::UnknownOpcode { processor: Processor::Cpu, opcode: 0x07 })
        );
        assert_eq!(
            GPU_ISA.fetch(&[0x06, 10], 0),
            Err(DecodeError::Truncated { processor: Processor::Gpu, opcode: 0x06, needed: 2, available: 1 })
        );
    }

    #[test]
    fn test_processor_isa() {
        assert_eq!(Processor::Cpu.isa().processor(), Processor::Cpu);
        assert_eq!(Processor::Gpu.isa().iter().count(), 9);
        assert_eq!(Processor::Gpu.to_string(), "GPU");
    }
}
