//! Disassembler for CPU and GPU programs.
//!
//! Converts machine code back to readable assembly. Bytes that do not
//! decode are printed as `.BYTE` so the listing never stops early.

use crate::asm::demux::{segments, DemuxError};
use crate::cpu::decode as cpu_decode;
use crate::gpu::decode as gpu_decode;
use crate::isa::Processor;

/// Disassemble the instruction at `at` for one processor.
///
/// Returns the text and the number of bytes consumed (at least 1).
pub fn disassemble_instruction(bytes: &[u8], at: usize, processor: Processor) -> (String, usize) {
    let decoded = match processor {
        Processor::Cpu => cpu_decode::decode(bytes, at).map(|i| (i.to_string(), i.len())),
        Processor::Gpu => gpu_decode::decode(bytes, at).map(|i| (i.to_string(), i.len())),
    };

    match decoded {
        Ok(pair) => pair,
        Err(_) => (format!(".BYTE {:#04x}", bytes.get(at).copied().unwrap_or(0)), 1),
    }
}

/// Disassemble a whole program for one processor.
pub fn disassemble(bytes: &[u8], processor: Processor) -> String {
    let mut output = header(&format!("{} Disassembly", processor));

    let mut at = 0;
    while at < bytes.len() {
        let (text, len) = disassemble_instruction(bytes, at, processor);
        output.push_str(&format_line(at, &bytes[at..at + len], &text, None));
        at += len;
    }

    output
}

/// Disassemble a CPU program.
pub fn disassemble_cpu(bytes: &[u8]) -> String {
    disassemble(bytes, Processor::Cpu)
}

/// Disassemble a GPU program.
pub fn disassemble_gpu(bytes: &[u8]) -> String {
    disassemble(bytes, Processor::Gpu)
}

/// Disassemble a combined stream, tagging each line with the processor the
/// demultiplexer routes it to.
///
/// If the stream cannot be split, the remainder after the last routed
/// instruction is dumped as `.BYTE` lines.
pub fn disassemble_combined(bytes: &[u8]) -> String {
    let mut output = header("Combined Disassembly");

    let routed = match segments(bytes) {
        Ok(all) => all,
        // Routing is prefix-stable, so everything before the failure stands.
        Err(e) => {
            log::debug!("disasm: {}", e);
            let stop = match e {
                DemuxError::UnknownOpcode { offset, .. } | DemuxError::TruncatedInstruction { offset, .. } => offset,
            };
            segments(&bytes[..stop]).unwrap_or_default()
        }
    };

    let mut at = 0;
    for seg in &routed {
        let (text, _) = disassemble_instruction(&bytes[..seg.offset + seg.len], seg.offset, seg.processor);
        output.push_str(&format_line(seg.offset, &bytes[seg.offset..seg.offset + seg.len], &text, Some(seg.processor)));
        at = seg.offset + seg.len;
    }
    for (i, byte) in bytes.iter().enumerate().skip(at) {
        output.push_str(&format_line(i, &[*byte], &format!(".BYTE {:#04x}", byte), None));
    }

    output
}

fn header(title: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!("; {}\n", title));
    output.push_str(&format!("; {}\n\n", "-".repeat(title.len())));
    output
}

fn format_line(addr: usize, raw: &[u8], text: &str, processor: Option<Processor>) -> String {
    let hex: Vec<String> = raw.iter().map(|b| format!("{:02X}", b)).collect();
    match processor {
        Some(p) => format!("{:04X}: {:<12} {}  {}\n", addr, hex.join(" "), p, text),
        None => format!("{:04X}: {:<12} {}\n", addr, hex.join(" "), text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_disassemble_halt() {
        let (text, len) = disassemble_instruction(&[0xFF], 0, Processor::Cpu);
        assert_eq!(text, "HALT");
        assert_eq!(len, 1);
    }

    #[test]
    fn test_same_bytes_per_processor() {
        assert_eq!(disassemble_instruction(&[0x03, 1, 2, 3], 0, Processor::Cpu).0, "SUB 0x01");
        assert_eq!(disassemble_instruction(&[0x03, 1, 2, 3], 0, Processor::Gpu).0, "SETC 1 2 3");
    }

    #[test]
    fn test_bad_byte() {
        let (text, len) = disassemble_instruction(&[0x42], 0, Processor::Cpu);
        assert_eq!(text, ".BYTE 0x42");
        assert_eq!(len, 1);
    }

    #[test]
    fn test_truncated_operand_is_raw() {
        let (text, len) = disassemble_instruction(&[0x07, 1], 0, Processor::Gpu);
        assert_eq!(text, ".BYTE 0x07");
        assert_eq!(len, 1);
    }

    #[test]
    fn test_disassemble_program() {
        let code = assemble("LDA 5\nSTA 0x20\nHALT").unwrap();
        let text = disassemble_cpu(&code);
        assert!(text.starts_with("; CPU Disassembly"));
        assert!(text.contains("0000: 01 05        LDA 0x05"));
        assert!(text.contains("0002: 04 20        STA 0x20"));
        assert!(text.contains("0004: FF           HALT"));
    }

    #[test]
    fn test_disassemble_gpu_program() {
        let code = assemble(".GPU\nSETX 10\nPLOT\nGHALT").unwrap();
        let text = disassemble_gpu(&code);
        assert!(text.contains("0000: 01 0A        SETX 0x0a"));
        assert!(text.contains("PLOT"));
        assert!(text.contains("HALT"));
    }

    #[test]
    fn test_disassemble_combined() {
        let code = assemble("LDA 1\n.GPU\nRECT 2 3\nPLOT").unwrap();
        let text = disassemble_combined(&code);
        assert!(text.contains("CPU  LDA 0x01"));
        assert!(text.contains("GPU  RECT 0x02 0x03"));
        assert!(text.contains("GPU  PLOT"));
    }

    #[test]
    fn test_disassemble_combined_bad_tail() {
        let text = disassemble_combined(&[0x01, 5, 0x42, 0xFF]);
        assert!(text.contains("CPU  LDA 0x05"));
        assert!(text.contains("0002: 42           .BYTE 0x42"));
        assert!(text.contains("0003: FF           .BYTE 0xff"));
    }
}
