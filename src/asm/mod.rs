//! Assembler, stream splitter and disassembler.
//!
//! This module provides:
//! - A two-pass assembler (text with `.CPU`/`.GPU` sections → one byte stream)
//! - A demultiplexer (one byte stream → CPU program + GPU program)
//! - A disassembler (bytes → readable text)
//! - A hex image format for saving assembled programs

pub mod assembler;
pub mod demux;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, assemble_listing, AssemblerError, Listing, ListingEntry, SymbolTable};
pub use demux::{segments, split, DemuxError, Segment};
pub use disasm::{disassemble, disassemble_combined, disassemble_cpu, disassemble_gpu};
pub use image::{load_image, parse_image, render_image, save_image, ImageError, ImageFile};
