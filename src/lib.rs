//! # Duet
//!
//! A toy two-processor machine: an 8-bit accumulator CPU and a raster GPU
//! that share one assembly language and one machine code stream.
//!
//! Source is written in `.CPU` / `.GPU` sections, assembled into a single
//! byte stream, split back into one program per processor by opcode, and
//! run on two independent engines. The GPU draws into an RGB frame buffer
//! that callers read back pixel by pixel or as raw bytes.

pub mod isa;
pub mod cpu;
pub mod gpu;
pub mod asm;
pub mod config;
pub mod machine;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use isa::{Processor, CPU_ISA, GPU_ISA};
pub use cpu::{Cpu, CpuError, CpuReport, CpuState, Memory, Registers};
pub use gpu::{FrameBuffer, Gpu, GpuError, GpuReport, GpuState, Rgb};
pub use asm::{assemble, assemble_listing, disassemble, split, AssemblerError, DemuxError, ImageFile, load_image, save_image};
pub use config::{ConfigError, MachineConfig};
pub use machine::{Machine, MachineError, RunReport, Session};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
