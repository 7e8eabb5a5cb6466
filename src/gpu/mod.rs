//! GPU emulation.
//!
//! The raster unit draws into a row-major RGB frame buffer:
//! - a cursor (x, y) wrapped to the frame size when set
//! - a current draw color, white at the start of every run
//! - 9-instruction set; `LINE`/`RECT` carry operands but do not draw

pub mod framebuffer;
pub mod decode;
pub mod execute;

pub use framebuffer::{FrameBuffer, Rgb};
pub use decode::Instruction;
pub use execute::{Gpu, GpuError, GpuReport, GpuState, DEFAULT_HEIGHT, DEFAULT_WIDTH};
