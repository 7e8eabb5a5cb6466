//! Splits a combined machine code stream into per-processor programs.
//!
//! The assembler discards section boundaries, so the processor of each
//! instruction is re-derived from its opcode byte:
//!
//! - a code only the CPU defines switches to the CPU,
//! - a code only the GPU defines switches to the GPU,
//! - a code both define (`0x00`..=`0x06`, `0xFF`) keeps the current
//!   ("sticky") processor, which starts as the CPU.
//!
//! The operand count always comes from the current processor's table.
//!
//! # Limitations
//!
//! The guess is wrong whenever a shared code was assembled for the other
//! processor than the sticky one. A GPU `LINE` (`0x06`) that is not preceded
//! by a GPU-only opcode is read as a CPU `JZ` with one operand, and every
//! instruction after it may be misaligned. With the current tables only
//! `RECT` (`0x07`) is GPU-only and no code is CPU-only, so once a `RECT` is
//! seen the rest of the stream stays with the GPU. Nothing in the stream can
//! tell these cases apart.

use crate::isa::{Processor, CPU_ISA, GPU_ISA};
use serde::Serialize;
use thiserror::Error;

/// One routed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Offset of the opcode in the combined stream.
    pub offset: usize,
    /// Processor the instruction was routed to.
    pub processor: Processor,
    /// Opcode plus operand bytes.
    pub len: usize,
}

/// Split a combined stream into `(cpu_bytes, gpu_bytes)`.
pub fn split(bytes: &[u8]) -> Result<(Vec<u8>, Vec<u8>), DemuxError> {
    let mut cpu = Vec::new();
    let mut gpu = Vec::new();

    for seg in segments(bytes)? {
        let out = match seg.processor {
            Processor::Cpu => &mut cpu,
            Processor::Gpu => &mut gpu,
        };
        out.extend_from_slice(&bytes[seg.offset..seg.offset + seg.len]);
    }

    Ok((cpu, gpu))
}

/// Route every instruction of a combined stream, in stream order.
pub fn segments(bytes: &[u8]) -> Result<Vec<Segment>, DemuxError> {
    let mut scan = DemuxScan::new();
    while scan.cursor < bytes.len() {
        scan.route(bytes)?;
    }
    Ok(scan.segments)
}

/// Scan state threaded through the stream.
#[derive(Debug)]
struct DemuxScan {
    mode: Processor,
    cursor: usize,
    segments: Vec<Segment>,
}

impl DemuxScan {
    fn new() -> Self {
        Self {
            mode: Processor::Cpu,
            cursor: 0,
            segments: Vec::new(),
        }
    }

    /// Route the instruction at the cursor and advance past it.
    fn route(&mut self, bytes: &[u8]) -> Result<(), DemuxError> {
        let offset = self.cursor;
        let opcode = bytes[offset];

        let target = match (CPU_ISA.contains(opcode), GPU_ISA.contains(opcode)) {
            (true, false) => Processor::Cpu,
            (false, true) => Processor::Gpu,
            (true, true) => self.mode,
            (false, false) => return Err(DemuxError::UnknownOpcode { offset, opcode }),
        };

        if target != self.mode {
            log::debug!("demux: {} -> {} at {:#x} (opcode {:#04x})", self.mode, target, offset, opcode);
            self.mode = target;
        }

        let len = match self.mode.isa().by_code(opcode) {
            Some(desc) => desc.len(),
            None => unreachable!("routed opcode belongs to the active set"),
        };
        if offset + len > bytes.len() {
            return Err(DemuxError::TruncatedInstruction {
                offset,
                opcode,
                needed: len - 1,
            });
        }

        self.segments.push(Segment { offset, processor: self.mode, len });
        self.cursor += len;
        Ok(())
    }
}

/// Errors that can occur while splitting a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DemuxError {
    #[error("byte {opcode:#04x} at {offset:#x} is not an opcode of either processor")]
    UnknownOpcode { offset: usize, opcode: u8 },

    #[error("opcode {opcode:#04x} at {offset:#x} needs {needed} operand byte(s) past the end of the stream")]
    TruncatedInstruction { offset: usize, opcode: u8, needed: usize },
}
