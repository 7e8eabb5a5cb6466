//! GPU execution engine.
//!
//! The GPU walks its own program (a separate address space from CPU memory)
//! and draws into a [`FrameBuffer`]. Unlike the CPU, an unknown opcode aborts
//! the run with an error; pixels already committed stay in the buffer.
//!
//! `LINE` and `RECT` consume their operands but do not draw. Callers that
//! need real lines or rectangles use [`FrameBuffer::draw_line`] and
//! [`FrameBuffer::fill_rect`] directly.

use crate::cpu::DEFAULT_MAX_STEPS;
use crate::gpu::decode::{self, Instruction};
use crate::gpu::framebuffer::{FrameBuffer, Rgb};
use crate::isa::DecodeError;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Default frame width in pixels.
pub const DEFAULT_WIDTH: usize = 640;
/// Default frame height in pixels.
pub const DEFAULT_HEIGHT: usize = 480;

/// GPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuState {
    /// GPU is running normally.
    Running,
    /// GPU executed HALT.
    Halted,
    /// PC reached the end of the program without a HALT.
    EndOfProgram,
    /// GPU aborted on a bad instruction.
    Aborted,
}

/// Drawing state and progress, returned alongside the frame buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuReport {
    pub state: GpuState,
    pub pc: usize,
    pub cursor: (usize, usize),
    pub color: Rgb,
    pub steps: u64,
    pub width: usize,
    pub height: usize,
}

/// The GPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Gpu {
    fb: FrameBuffer,
    program: Vec<u8>,
    pub pc: usize,
    pub cursor_x: usize,
    pub cursor_y: usize,
    pub color: Rgb,
    pub state: GpuState,
    pub steps: u64,
    max_steps: u64,
    last_instr: Option<Instruction>,
}

impl Gpu {
    /// Create a GPU with the default 640x480 frame.
    pub fn new() -> Self {
        Self {
            fb: match FrameBuffer::new(DEFAULT_WIDTH, DEFAULT_HEIGHT) {
                Ok(fb) => fb,
                Err(_) => unreachable!("default dimensions are non-zero"),
            },
            program: Vec::new(),
            pc: 0,
            cursor_x: 0,
            cursor_y: 0,
            color: Rgb::WHITE,
            state: GpuState::Running,
            steps: 0,
            max_steps: DEFAULT_MAX_STEPS,
            last_instr: None,
        }
    }

    /// Create a GPU with a custom frame size.
    pub fn with_size(width: usize, height: usize) -> Result<Self, GpuError> {
        Ok(Self {
            fb: FrameBuffer::new(width, height)?,
            ..Self::new()
        })
    }

    /// Set the step budget used by [`run`](Gpu::run).
    pub fn with_budget(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Store a program. The frame buffer is left untouched.
    pub fn load(&mut self, program: &[u8]) {
        self.program = program.to_vec();
    }

    /// The loaded program.
    pub fn program(&self) -> &[u8] {
        &self.program
    }

    /// Rewind to the start of the program with white ink at (0, 0).
    pub fn start(&mut self) {
        self.pc = 0;
        self.cursor_x = 0;
        self.cursor_y = 0;
        self.color = Rgb::WHITE;
        self.state = GpuState::Running;
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or `None` when the PC has
    /// reached the end of the program. That is a normal stop and leaves the
    /// GPU in [`GpuState::EndOfProgram`].
    pub fn step(&mut self) -> Result<Option<Instruction>, GpuError> {
        if self.state != GpuState::Running {
            return Err(GpuError::NotRunning(self.state));
        }

        let at = self.pc;
        if at >= self.program.len() {
            self.state = GpuState::EndOfProgram;
            return Ok(None);
        }

        let instr = decode::decode(&self.program, at).map_err(|e| {
            self.state = GpuState::Aborted;
            GpuError::from_decode(e, at)
        })?;

        self.pc += instr.len();
        self.execute(instr);

        self.steps += 1;
        self.last_instr = Some(instr);
        Ok(Some(instr))
    }

    /// Run the loaded program from the start until it halts or runs out.
    pub fn run(&mut self) -> Result<&FrameBuffer, GpuError> {
        self.start();
        self.run_limited(self.max_steps)?;

        if self.is_running() {
            return Err(GpuError::BudgetExceeded { limit: self.max_steps });
        }

        log::debug!("GPU stopped after {} steps: {:?}", self.steps, self.state);
        Ok(&self.fb)
    }

    /// Run for at most `max_steps` instructions from the current PC.
    ///
    /// Returns the number of instructions executed.
    pub fn run_limited(&mut self, max_steps: u64) -> Result<u64, GpuError> {
        let start_steps = self.steps;
        let limit = self.steps.saturating_add(max_steps);

        while self.state == GpuState::Running && self.steps < limit {
            if self.pc >= self.program.len() {
                break;
            }
            self.step()?;
        }

        if self.state == GpuState::Running && self.pc >= self.program.len() {
            self.state = GpuState::EndOfProgram;
        }

        Ok(self.steps - start_steps)
    }

    fn execute(&mut self, instr: Instruction) {
        match instr {
            Instruction::Nop => {}

            Instruction::SetX(x) => self.cursor_x = x as usize % self.fb.width(),
            Instruction::SetY(y) => self.cursor_y = y as usize % self.fb.height(),
            Instruction::SetC { r, g, b } => self.color = Rgb::new(r, g, b),

            Instruction::Plot => {
                self.fb.write_pixel(self.cursor_x as i64, self.cursor_y as i64, self.color);
            }

            Instruction::Clear => self.fb.clear(),

            // Operands are consumed; nothing is rasterized.
            Instruction::Line { .. } | Instruction::Rect { .. } => {
                log::trace!("GPU {} at {:#x} draws nothing", instr, self.pc - instr.len());
            }

            Instruction::Halt => self.state = GpuState::Halted,
        }
    }

    /// Read a pixel from the frame buffer.
    pub fn read_pixel(&self, x: usize, y: usize) -> Rgb {
        self.fb.read_pixel(x as i64, y as i64)
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.fb
    }

    pub fn frame_buffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.fb
    }

    /// Snapshot of the drawing state.
    pub fn report(&self) -> GpuReport {
        GpuReport {
            state: self.state,
            pc: self.pc,
            cursor: (self.cursor_x, self.cursor_y),
            color: self.color,
            steps: self.steps,
            width: self.fb.width(),
            height: self.fb.height(),
        }
    }

    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    pub fn is_running(&self) -> bool {
        self.state == GpuState::Running
    }
}

impl Default for Gpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Gpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gpu")
            .field("state", &self.state)
            .field("pc", &self.pc)
            .field("cursor", &(self.cursor_x, self.cursor_y))
            .field("color", &self.color)
            .field("fb", &self.fb)
            .finish()
    }
}

/// Errors that can occur during GPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("unknown GPU instruction {opcode:#x} at {at:#x}")]
    UnknownOpcode { opcode: u8, at: usize },

    #[error("GPU instruction {opcode:#x} at {at:#x} is missing operand bytes")]
    TruncatedInstruction { opcode: u8, at: usize },

    #[error("GPU not running: {0:?}")]
    NotRunning(GpuState),

    #[error("execution budget of {limit} steps exceeded")]
    BudgetExceeded { limit: u64 },

    #[error("invalid frame size {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
}

impl GpuError {
    fn from_decode(err: DecodeError, at: usize) -> Self {
        match err {
            DecodeError::UnknownOpcode { opcode, .. } => GpuError::UnknownOpcode { opcode, at },
            DecodeError::Truncated { opcode, .. } => GpuError::TruncatedInstruction { opcode, at },
            DecodeError::EndOfStream { .. } => GpuError::NotRunning(GpuState::EndOfProgram),
        }
    }
}
