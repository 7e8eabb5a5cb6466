//! Two-pass assembler for CPU and GPU programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! .CPU                ; Following lines use the CPU instruction set
//! start:  LDA 5       ; Label, then instruction
//!         STA 0x20
//! .GPU
//!         SETC 255 0 0b1
//!         PLOT
//! .CPU
//!         JMP start
//! ```
//!
//! Pass 1 strips comments, records directives and binds labels to a single
//! address counter that keeps counting across `.CPU`/`.GPU` switches. Pass 2
//! encodes every instruction with the instruction set of its section, so the
//! output is one stream with both processors' code interleaved in source
//! order.

use crate::isa::Processor;
use serde::Serialize;
use std::collections::BTreeMap;
use std::num::IntErrorKind;
use thiserror::Error;

/// Assemble source code to a combined machine code stream.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    Ok(assemble_listing(source)?.bytes)
}

/// Assemble source code, keeping the per-instruction listing and the
/// symbol table alongside the bytes.
pub fn assemble_listing(source: &str) -> Result<Listing, AssemblerError> {
    let scan = scan(source)?;
    log::debug!(
        "pass 1: {} line(s), {} symbol(s), {} byte(s)",
        scan.lines.len(),
        scan.symbols.len(),
        scan.address
    );
    encode(scan)
}

/// Label name to address mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    symbols: BTreeMap<String, usize>,
}

impl SymbolTable {
    /// Bind a label. Rebinding an existing label is an error.
    fn define(&mut self, label: &str, address: usize, line: usize) -> Result<(), AssemblerError> {
        if self.symbols.contains_key(label) {
            return Err(AssemblerError::SyntaxError {
                line,
                message: format!("duplicate label '{}'", label),
            });
        }
        self.symbols.insert(label.to_string(), address);
        Ok(())
    }

    /// Address bound to a label.
    pub fn resolve(&self, label: &str) -> Option<usize> {
        self.symbols.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Labels in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.symbols.iter().map(|(name, &addr)| (name.as_str(), addr))
    }
}

/// One assembled instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    /// 1-based source line.
    pub line: usize,
    /// Offset of the opcode in the combined stream.
    pub address: usize,
    /// Section the instruction was assembled in.
    pub mode: Processor,
    /// Encoded length in bytes.
    pub len: usize,
    /// Instruction text without label or comment.
    pub source: String,
}

/// Assembler output with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub bytes: Vec<u8>,
    pub entries: Vec<ListingEntry>,
    pub symbols: SymbolTable,
}

impl Listing {
    /// Encoded bytes of one entry.
    pub fn bytes_of(&self, entry: &ListingEntry) -> &[u8] {
        &self.bytes[entry.address..entry.address + entry.len]
    }

    /// Human-readable listing: address, section, bytes and source text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let hex: Vec<String> = self.bytes_of(entry).iter().map(|b| format!("{:02X}", b)).collect();
            out.push_str(&format!(
                "{:04X}  {}  {:<12} {}\n",
                entry.address,
                entry.mode,
                hex.join(" "),
                entry.source
            ));
        }
        if !self.symbols.is_empty() {
            out.push_str("\n; symbols\n");
            for (name, addr) in self.symbols.iter() {
                out.push_str(&format!("; {:<16} {:#06x}\n", name, addr));
            }
        }
        out
    }
}

/// A line kept by pass 1.
#[derive(Debug, Clone)]
enum CleanLine {
    Directive(Processor),
    Instruction {
        line: usize,
        address: usize,
        mode: Processor,
        text: String,
    },
}

/// State threaded from pass 1 into pass 2.
#[derive(Debug, Default)]
struct ScanContext {
    lines: Vec<CleanLine>,
    symbols: SymbolTable,
    /// Shared by both sections, never reset.
    address: usize,
}

/// Pass 1: strip comments, record directives and bind labels.
fn scan(source: &str) -> Result<ScanContext, AssemblerError> {
    let mut ctx = ScanContext::default();
    let mut mode = Processor::Cpu;

    for (idx, raw) in source.lines().enumerate() {
        let line_num = idx + 1;

        // Remove comments
        let mut rest = match raw.find(';') {
            Some(i) => &raw[..i],
            None => raw,
        }
        .trim();

        if rest.is_empty() {
            continue;
        }

        // Check for label definition
        if !rest.starts_with('.') {
            if let Some((label, tail)) = rest.split_once(':') {
                let label = label.trim();
                if label.is_empty() || label.contains(char::is_whitespace) {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("invalid label '{}'", label),
                    });
                }
                ctx.symbols.define(label, ctx.address, line_num)?;
                rest = tail.trim();
                if rest.is_empty() {
                    continue;
                }
            }
        }

        if let Some(directive) = rest.strip_prefix('.') {
            mode = parse_directive(directive, line_num)?;
            ctx.lines.push(CleanLine::Directive(mode));
            continue;
        }

        let operands = rest.split_whitespace().count() - 1;
        ctx.lines.push(CleanLine::Instruction {
            line: line_num,
            address: ctx.address,
            mode,
            text: rest.to_string(),
        });
        ctx.address += 1 + operands;
    }

    Ok(ctx)
}

fn parse_directive(directive: &str, line: usize) -> Result<Processor, AssemblerError> {
    match directive.trim().to_ascii_uppercase().as_str() {
        "CPU" => Ok(Processor::Cpu),
        "GPU" => Ok(Processor::Gpu),
        _ => Err(AssemblerError::SyntaxError {
            line,
            message: format!("unknown directive '.{}'", directive.trim()),
        }),
    }
}

/// Pass 2: encode every instruction line against its section's table.
fn encode(ctx: ScanContext) -> Result<Listing, AssemblerError> {
    let mut bytes = Vec::with_capacity(ctx.address);
    let mut entries = Vec::new();
    let mut mode = Processor::Cpu;

    for clean in &ctx.lines {
        let (line, text) = match clean {
            CleanLine::Directive(m) => {
                mode = *m;
                continue;
            }
            CleanLine::Instruction { line, address, mode: scanned, text } => {
                debug_assert_eq!(*address, bytes.len());
                debug_assert_eq!(*scanned, mode);
                (*line, text)
            }
        };

        let mut tokens = text.split_whitespace();
        let mnemonic = tokens.next().unwrap_or_default();
        let desc = mode.isa().by_mnemonic(mnemonic).ok_or_else(|| AssemblerError::UnknownInstruction {
            line,
            mode,
            mnemonic: mnemonic.to_ascii_uppercase(),
        })?;

        let operands: Vec<&str> = tokens.collect();
        if operands.len() != desc.arity {
            return Err(AssemblerError::SyntaxError {
                line,
                message: format!(
                    "{} expects {} operand(s), found {}",
                    desc.mnemonic,
                    desc.arity,
                    operands.len()
                ),
            });
        }

        let address = bytes.len();
        bytes.push(desc.code);
        for operand in operands {
            bytes.push(resolve_operand(operand, &ctx.symbols, line)?);
        }

        entries.push(ListingEntry {
            line,
            address,
            mode,
            len: desc.len(),
            source: text.clone(),
        });
    }

    Ok(Listing {
        bytes,
        entries,
        symbols: ctx.symbols,
    })
}

/// Turn one operand token into its byte: a literal or a label address.
fn resolve_operand(operand: &str, symbols: &SymbolTable, line: usize) -> Result<u8, AssemblerError> {
    let value = match parse_literal(operand) {
        Some(Ok(value)) => value,
        Some(Err(LiteralError::Overflow)) => {
            return Err(AssemblerError::OperandRange { line, operand: operand.to_string() })
        }
        Some(Err(LiteralError::Malformed)) => {
            return Err(AssemblerError::SyntaxError {
                line,
                message: format!("invalid numeric literal '{}'", operand),
            })
        }
        None => symbols.resolve(operand).ok_or_else(|| AssemblerError::UnresolvedSymbol {
            line,
            symbol: operand.to_string(),
        })? as u64,
    };

    u8::try_from(value).map_err(|_| AssemblerError::OperandRange { line, operand: operand.to_string() })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralError {
    Overflow,
    Malformed,
}

/// Parse a decimal, `0x` hex or `0b` binary literal.
///
/// Returns `None` when the token does not start with a digit and therefore
/// names a symbol.
fn parse_literal(token: &str) -> Option<Result<u64, LiteralError>> {
    if !token.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let (digits, radix) = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = token.strip_prefix("0b").or_else(|| token.strip_prefix("0B")) {
        (bin, 2)
    } else {
        (token, 10)
    };

    Some(u64::from_str_radix(digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => LiteralError::Overflow,
        _ => LiteralError::Malformed,
    }))
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown {mode} instruction on line {line}: {mnemonic}")]
    UnknownInstruction { line: usize, mode: Processor, mnemonic: String },

    #[error("operand out of range on line {line}: {operand}")]
    OperandRange { line: usize, operand: String },

    #[error("unresolved symbol on line {line}: {symbol}")]
    UnresolvedSymbol { line: usize, symbol: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_assemble_simple() {
        let source = ".CPU\nLDA 5\nSTA 0x20\nHALT";
        assert_eq!(assemble(source).unwrap(), vec![0x01, 0x05, 0x04, 0x20, 0xFF]);
    }

    #[test]
    fn test_default_mode_is_cpu() {
        let source = r#"
            ; no directive
            lda 1   ; lower-case mnemonic
            halt
        "#;
        assert_eq!(assemble(source).unwrap(), vec![0x01, 0x01, 0xFF]);
    }

    #[test]
    fn test_assemble_mixed_sections() {
        let source = r#"
            .CPU
            LDA 5
            .gpu
            SETC 1 2 3
            PLOT
            GHALT
            .CPU
            HALT
        "#;
        assert_eq!(
            assemble(source).unwrap(),
            vec![0x01, 5, 0x03, 1, 2, 3, 0x04, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_labels_count_across_sections() {
        let source = r#"
            .CPU
            LDA 1
            .GPU
            SETX 4
            SETC 0 0 0
        target:
            .CPU
            JMP target
        "#;
        let listing = assemble_listing(source).unwrap();
        assert_eq!(listing.symbols.resolve("target"), Some(8));
        assert_eq!(&listing.bytes[8..], &[0x05, 8]);
    }

    #[test]
    fn test_forward_reference() {
        let source = r#"
            LDA 0
            JZ done
            LDA 9
        done: HALT
        "#;
        assert_eq!(assemble(source).unwrap(), vec![0x01, 0, 0x06, 6, 0x01, 9, 0xFF]);
    }

    #[test]
    fn test_label_before_directive() {
        let source = "LDA 1\ngfx: .GPU\nPLOT";
        let listing = assemble_listing(source).unwrap();
        assert_eq!(listing.symbols.resolve("gfx"), Some(2));
        assert_eq!(listing.entries[1].mode, Processor::Gpu);
    }

    #[test]
    fn test_literal_forms() {
        assert_eq!(assemble("LDA 0b101").unwrap(), vec![0x01, 5]);
        assert_eq!(assemble("LDA 0xfF").unwrap(), vec![0x01, 255]);
        assert_eq!(assemble("LDA 255").unwrap(), vec![0x01, 255]);
    }

    #[test]
    fn test_unknown_directive() {
        let err = assemble("LDA 1\n.DATA").unwrap_err();
        assert!(matches!(err, AssemblerError::SyntaxError { line: 2, .. }));
    }

    #[test]
    fn test_unknown_instruction_names_mode() {
        let err = assemble(".CPU\nPLOT").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::UnknownInstruction { line: 2, mode: Processor::Cpu, mnemonic: "PLOT".into() }
        );
        assert_eq!(err.to_string(), "unknown CPU instruction on line 2: PLOT");

        let err = assemble(".GPU\nLDA 1").unwrap_err();
        assert!(matches!(err, AssemblerError::UnknownInstruction { mode: Processor::Gpu, .. }));
    }

    #[test]
    fn test_operand_range() {
        assert_eq!(
            assemble("LDA 256").unwrap_err(),
            AssemblerError::OperandRange { line: 1, operand: "256".into() }
        );
        assert!(matches!(
            assemble("LDA 99999999999999999999999").unwrap_err(),
            AssemblerError::OperandRange { .. }
        ));
    }

    #[test]
    fn test_label_address_too_large() {
        let mut source = String::new();
        for _ in 0..130 {
            source.push_str("LDA 0\n");
        }
        source.push_str("far: HALT\nJMP far\n");
        assert!(matches!(
            assemble(&source).unwrap_err(),
            AssemblerError::OperandRange { line: 132, .. }
        ));
    }

    #[test]
    fn test_unresolved_symbol() {
        assert_eq!(
            assemble("JMP nowhere").unwrap_err(),
            AssemblerError::UnresolvedSymbol { line: 1, symbol: "nowhere".into() }
        );
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        assert!(assemble("Loop: JMP loop").is_err());
        assert!(assemble("loop: JMP loop").is_ok());
    }

    #[test]
    fn test_malformed_literal() {
        assert!(matches!(
            assemble("LDA 0xZZ").unwrap_err(),
            AssemblerError::SyntaxError { .. }
        ));
    }

    #[test]
    fn test_operand_count_checked() {
        let err = assemble(".GPU\nSETC 1").unwrap_err();
        assert!(matches!(err, AssemblerError::SyntaxError { line: 2, .. }));
        assert!(assemble("HALT 1").is_err());
    }

    #[test]
    fn test_duplicate_label() {
        assert!(matches!(
            assemble("a: NOP\na: NOP").unwrap_err(),
            AssemblerError::SyntaxError { line: 2, .. }
        ));
    }

    #[test]
    fn test_listing_render() {
        let listing = assemble_listing("top: LDA 5\n.GPU\nPLOT").unwrap();
        let text = listing.render();
        assert!(text.contains("0000  CPU  01 05"));
        assert!(text.contains("0002  GPU  04"));
        assert!(text.contains("top"));
    }

    proptest! {
        #[test]
        fn prop_literal_forms_roundtrip(v in any::<u8>(), form in 0..3usize) {
            let literal = match form {
                0 => format!("{}", v),
                1 => format!("0x{:x}", v),
                _ => format!("0b{:b}", v),
            };
            prop_assert_eq!(assemble(&format!("LDA {}", literal)).unwrap(), vec![0x01, v]);
        }

        #[test]
        fn prop_out_of_range_rejected(v in 256u32..100_000) {
            let is_range_error = matches!(
                assemble(&format!("ADD {}", v)),
                Err(AssemblerError::OperandRange { .. })
            );
            prop_assert!(is_range_error);
        }
    }
}
