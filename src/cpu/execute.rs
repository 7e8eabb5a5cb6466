//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//! An unknown opcode is a soft fault: the CPU logs a register dump and stops,
//! keeping every register as last computed.

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction};
use crate::cpu::memory::{MemoryError, MEMORY_SIZE};
use crate::isa::DecodeError;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Step budget used by [`Cpu::run`] unless configured otherwise.
pub const DEFAULT_MAX_STEPS: u64 = 100_000;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HALT).
    Halted,
    /// CPU stopped on an opcode outside its instruction set.
    Faulted { opcode: u8, at: usize },
}

/// Terminal register state returned by [`Cpu::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuReport {
    pub a: u8,
    pub b: u8,
    pub pc: usize,
    pub zero: bool,
    pub carry: bool,
    pub state: CpuState,
    pub steps: u64,
}

/// The CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub steps: u64,
    /// Upper bound on instructions executed by [`Cpu::run`].
    max_steps: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_MAX_STEPS)
    }

    /// Create a CPU whose [`run`](Cpu::run) gives up after `max_steps`.
    pub fn with_budget(max_steps: u64) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            steps: 0,
            max_steps,
            last_instr: None,
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.steps = 0;
        self.last_instr = None;
    }

    /// Copy a program into memory at address 0.
    pub fn load(&mut self, program: &[u8]) -> Result<(), CpuError> {
        self.mem.load_program(program)?;
        Ok(())
    }

    /// Rewind to address 0 and mark the CPU running. Registers other than
    /// PC and memory are left as they are.
    pub fn start(&mut self) {
        self.regs.pc = 0;
        self.state = CpuState::Running;
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or `None` when the fetched
    /// byte is not a CPU opcode and the CPU soft-faulted.
    pub fn step(&mut self) -> Result<Option<Instruction>, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let at = self.regs.pc;
        if at >= MEMORY_SIZE {
            return Err(CpuError::PcOutOfBounds(at));
        }

        // Decode
        let instr = match decode::decode(self.mem.as_slice(), at) {
            Ok(instr) => instr,
            Err(DecodeError::UnknownOpcode { opcode, .. }) => {
                self.regs.advance_pc();
                self.fault(opcode, at);
                return Ok(None);
            }
            Err(_) => return Err(CpuError::PcOutOfBounds(MEMORY_SIZE)),
        };

        // Advance PC past opcode and operand (jumps will override)
        self.regs.pc += instr.len();

        // Execute
        self.execute(instr)?;

        self.steps += 1;
        self.last_instr = Some(instr);

        Ok(Some(instr))
    }

    /// Run the loaded program from address 0 until it halts or faults.
    ///
    /// Fails with [`CpuError::BudgetExceeded`] when the program is still
    /// running after the configured number of steps.
    pub fn run(&mut self) -> Result<CpuReport, CpuError> {
        self.start();
        self.run_limited(self.max_steps)?;

        if self.is_running() {
            return Err(CpuError::BudgetExceeded { limit: self.max_steps });
        }

        log::debug!("CPU stopped after {} steps: {:?}", self.steps, self.state);
        Ok(self.report())
    }

    /// Run for at most `max_steps` instructions from the current PC.
    ///
    /// Returns the number of instructions executed.
    pub fn run_limited(&mut self, max_steps: u64) -> Result<u64, CpuError> {
        let start_steps = self.steps;
        let limit = self.steps.saturating_add(max_steps);

        while self.state == CpuState::Running && self.steps < limit {
            self.step()?;
        }

        Ok(self.steps - start_steps)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            Instruction::Nop => {}

            Instruction::Lda(imm) => self.regs.load(imm),
            Instruction::Add(imm) => self.regs.add(imm),
            Instruction::Sub(imm) => self.regs.sub(imm),

            Instruction::Sta(addr) => {
                self.mem.write(addr as usize, self.regs.a)?;
            }

            Instruction::Jmp(addr) => self.regs.jump(addr),

            Instruction::Jz(addr) => {
                if self.regs.zero {
                    self.regs.jump(addr);
                }
            }

            Instruction::Halt => {
                self.state = CpuState::Halted;
                log::trace!("CPU halted at PC={:#x}", self.regs.pc);
            }
        }

        Ok(())
    }

    fn fault(&mut self, opcode: u8, at: usize) {
        self.state = CpuState::Faulted { opcode, at };
        log::warn!(
            "unknown CPU instruction {:#x} at {:#x}, halting\n{}",
            opcode,
            at,
            self.dump_state()
        );
    }

    /// Register and flag dump in the diagnostic format.
    pub fn dump_state(&self) -> String {
        format!(
            "A: {:#x}, B: {:#x}, PC: {:#x}\nFlags - Zero: {}, Carry: {}",
            self.regs.a, self.regs.b, self.regs.pc, self.regs.zero, self.regs.carry
        )
    }

    /// Snapshot of the registers, flags and state.
    pub fn report(&self) -> CpuReport {
        CpuReport {
            a: self.regs.a,
            b: self.regs.b,
            pc: self.regs.pc,
            zero: self.regs.zero,
            carry: self.regs.carry,
            state: self.state,
            steps: self.steps,
        }
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("steps", &self.steps)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("program counter {0:#x} ran past the end of memory")]
    PcOutOfBounds(usize),

    #[error("execution budget of {limit} steps exceeded")]
    BudgetExceeded { limit: u64 },
}
