//! Instruction decoder for the CPU.
//!
//! Every instruction is one opcode byte followed by the number of operand
//! bytes the CPU table declares for it (zero or one).

use crate::isa::{cpu_op, DecodeError, OpcodeDescriptor, CPU_ISA};
use serde::{Serialize, Deserialize};

/// Decoded CPU instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// No operation
    Nop,

    /// Load immediate: A := imm
    Lda(u8),

    /// Add immediate: A := A + imm (carry out)
    Add(u8),

    /// Subtract immediate: A := A - imm (borrow out)
    Sub(u8),

    /// Store accumulator: [addr] := A
    Sta(u8),

    /// Unconditional jump: PC := addr
    Jmp(u8),

    /// Jump if zero: if zero then PC := addr
    Jz(u8),

    /// Halt execution
    Halt,
}

impl Instruction {
    /// The opcode byte of this instruction.
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Nop => cpu_op::NOP,
            Instruction::Lda(_) => cpu_op::LDA,
            Instruction::Add(_) => cpu_op::ADD,
            Instruction::Sub(_) => cpu_op::SUB,
            Instruction::Sta(_) => cpu_op::STA,
            Instruction::Jmp(_) => cpu_op::JMP,
            Instruction::Jz(_) => cpu_op::JZ,
            Instruction::Halt => cpu_op::HALT,
        }
    }

    /// The table entry for this instruction.
    pub fn descriptor(&self) -> &'static OpcodeDescriptor {
        match CPU_ISA.by_code(self.opcode()) {
            Some(desc) => desc,
            None => unreachable!("every CPU instruction has a table entry"),
        }
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.descriptor().len()
    }

    fn operand(&self) -> Option<u8> {
        match *self {
            Instruction::Lda(v)
            | Instruction::Add(v)
            | Instruction::Sub(v)
            | Instruction::Sta(v)
            | Instruction::Jmp(v)
            | Instruction::Jz(v) => Some(v),
            Instruction::Nop | Instruction::Halt => None,
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mnemonic = self.descriptor().mnemonic;
        match self.operand() {
            Some(v) => write!(f, "{} {:#04x}", mnemonic, v),
            None => write!(f, "{}", mnemonic),
        }
    }
}

/// Decode the instruction starting at `at`.
pub fn decode(bytes: &[u8], at: usize) -> Result<Instruction, DecodeError> {
    let (desc, operands) = CPU_ISA.fetch(bytes, at)?;
    let imm = operands.first().copied().unwrap_or(0);

    let instruction = match desc.code {
        cpu_op::NOP => Instruction::Nop,
        cpu_op::LDA => Instruction::Lda(imm),
        cpu_op::ADD => Instruction::Add(imm),
        cpu_op::SUB => Instruction::Sub(imm),
        cpu_op::STA => Instruction::Sta(imm),
        cpu_op::JMP => Instruction::Jmp(imm),
        cpu_op::JZ => Instruction::Jz(imm),
        cpu_op::HALT => Instruction::Halt,
        opcode => return Err(DecodeError::UnknownOpcode { processor: CPU_ISA.processor(), opcode }),
    };

    Ok(instruction)
}

/// Encode an instruction back to bytes.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let mut bytes = vec![instr.opcode()];
    bytes.extend(instr.operand());
    bytes
}

/// Encode a sequence of instructions into one program.
pub fn encode_program(instructions: &[Instruction]) -> Vec<u8> {
    instructions.iter().flat_map(encode).collect()
}
