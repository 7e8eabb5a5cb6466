//! Instruction decoder for the GPU.

use crate::isa::{gpu_op, DecodeError, OpcodeDescriptor, GPU_ISA};
use serde::{Serialize, Deserialize};

/// Decoded GPU instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Nop,
    /// Move the cursor column (wrapped by the frame width).
    SetX(u8),
    /// Move the cursor row (wrapped by the frame height).
    SetY(u8),
    /// Select the draw color.
    SetC { r: u8, g: u8, b: u8 },
    /// Write the draw color at the cursor.
    Plot,
    /// Zero the frame buffer.
    Clear,
    /// Carries an end point but draws nothing.
    Line { x: u8, y: u8 },
    /// Carries a size but draws nothing.
    Rect { w: u8, h: u8 },
    Halt,
}

impl Instruction {
    /// The opcode byte of this instruction.
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Nop => gpu_op::NOP,
            Instruction::SetX(_) => gpu_op::SETX,
            Instruction::SetY(_) => gpu_op::SETY,
            Instruction::SetC { .. } => gpu_op::SETC,
            Instruction::Plot => gpu_op::PLOT,
            Instruction::Clear => gpu_op::CLEAR,
            Instruction::Line { .. } => gpu_op::LINE,
            Instruction::Rect { .. } => gpu_op::RECT,
            Instruction::Halt => gpu_op::HALT,
        }
    }

    /// The table entry for this instruction.
    pub fn descriptor(&self) -> &'static OpcodeDescriptor {
        match GPU_ISA.by_code(self.opcode()) {
            Some(desc) => desc,
            None => unreachable!("every GPU instruction has a table entry"),
        }
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.descriptor().len()
    }

    /// Operand bytes in encoding order.
    pub fn operands(&self) -> Vec<u8> {
        match *self {
            Instruction::SetX(v) | Instruction::SetY(v) => vec![v],
            Instruction::SetC { r, g, b } => vec![r, g, b],
            Instruction::Line { x, y } => vec![x, y],
            Instruction::Rect { w, h } => vec![w, h],
            Instruction::Nop | Instruction::Plot | Instruction::Clear | Instruction::Halt => Vec::new(),
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor().mnemonic)?;
        for op in self.operands() {
            write!(f, " {:#04x}", op)?;
        }
        Ok(())
    }
}

/// Decode the instruction starting at `at`.
pub fn decode(bytes: &[u8], at: usize) -> Result<Instruction, DecodeError> {
    let (desc, ops) = GPU_ISA.fetch(bytes, at)?;
    let op = |i: usize| ops.get(i).copied().unwrap_or(0);

    let instruction = match desc.code {
        gpu_op::NOP => Instruction::Nop,
        gpu_op::SETX => Instruction::SetX(op(0)),
        gpu_op::SETY => Instruction::SetY(op(0)),
        gpu_op::SETC => Instruction::SetC { r: op(0), g: op(1), b: op(2) },
        gpu_op::PLOT => Instruction::Plot,
        gpu_op::CLEAR => Instruction::Clear,
        gpu_op::LINE => Instruction::Line { x: op(0), y: op(1) },
        gpu_op::RECT => Instruction::Rect { w: op(0), h: op(1) },
        gpu_op::HALT => Instruction::Halt,
        opcode => return Err(DecodeError::UnknownOpcode { processor: GPU_ISA.processor(), opcode }),
    };

    Ok(instruction)
}

/// Encode an instruction back to bytes.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let mut bytes = vec![instr.opcode()];
    bytes.extend(instr.operands());
    bytes
}

/// Encode a sequence of instructions into one program.
pub fn encode_program(instructions: &[Instruction]) -> Vec<u8> {
    instructions.iter().flat_map(encode).collect()
}
