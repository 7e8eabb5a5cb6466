//! Source-to-pixels driver.
//!
//! A [`Machine`] assembles a source, splits the stream and runs the two
//! programs one after the other: the CPU to completion first, then the GPU.
//! The processors never interleave and share no state.

use crate::asm::{assemble, split, AssemblerError, DemuxError};
use crate::config::{ConfigError, MachineConfig};
use crate::cpu::{Cpu, CpuError, CpuReport};
use crate::gpu::{FrameBuffer, Gpu, GpuError, GpuReport};
use serde::Serialize;
use thiserror::Error;

/// Runs combined programs with one configuration.
#[derive(Debug, Clone, Default)]
pub struct Machine {
    config: MachineConfig,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Result<Self, MachineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Assemble `source`, then run it.
    pub fn run_source(&self, source: &str) -> Result<Session, MachineError> {
        let bytes = assemble(source)?;
        self.run_bytes(&bytes)
    }

    /// Split a combined stream, then run both halves.
    pub fn run_bytes(&self, bytes: &[u8]) -> Result<Session, MachineError> {
        let (cpu_bytes, gpu_bytes) = split(bytes)?;
        log::debug!(
            "split {} byte(s): {} for the CPU, {} for the GPU",
            bytes.len(),
            cpu_bytes.len(),
            gpu_bytes.len()
        );
        self.run_split(&cpu_bytes, &gpu_bytes)
    }

    /// Run already separated programs. An empty program is not run.
    pub fn run_split(&self, cpu_bytes: &[u8], gpu_bytes: &[u8]) -> Result<Session, MachineError> {
        let mut cpu = Cpu::with_budget(self.config.max_steps);
        let cpu_ran = !cpu_bytes.is_empty();
        if cpu_ran {
            cpu.load(cpu_bytes)?;
            cpu.run()?;
        }

        self.run_gpu(cpu, cpu_ran, gpu_bytes)
    }

    /// Finish a loaded CPU the caller has been stepping, then run the GPU
    /// program.
    ///
    /// The CPU continues from its current PC with whatever is left of the
    /// step budget. Registers and step count carry into the session.
    pub fn run_with_cpu(&self, mut cpu: Cpu, gpu_bytes: &[u8]) -> Result<Session, MachineError> {
        let budget = self.config.max_steps;
        if cpu.is_running() {
            cpu.run_limited(budget.saturating_sub(cpu.steps))?;
            if cpu.is_running() {
                return Err(CpuError::BudgetExceeded { limit: budget }.into());
            }
        }

        self.run_gpu(cpu, true, gpu_bytes)
    }

    fn run_gpu(&self, cpu: Cpu, cpu_ran: bool, gpu_bytes: &[u8]) -> Result<Session, MachineError> {
        let mut gpu = Gpu::with_size(self.config.gpu_width, self.config.gpu_height)?
            .with_budget(self.config.max_steps);

        let gpu_ran = !gpu_bytes.is_empty();
        if gpu_ran {
            gpu.load(gpu_bytes);
            let outcome = gpu.run().map(|_| ());
            if let Err(error) = outcome {
                let session = Session { cpu, gpu, cpu_ran, gpu_ran };
                return Err(MachineError::GpuFailed { error, session: Box::new(session) });
            }
        }

        Ok(Session { cpu, gpu, cpu_ran, gpu_ran })
    }
}

/// Both engines after a run.
#[derive(Debug, Clone)]
pub struct Session {
    pub cpu: Cpu,
    pub gpu: Gpu,
    cpu_ran: bool,
    gpu_ran: bool,
}

impl Session {
    pub fn frame_buffer(&self) -> &FrameBuffer {
        self.gpu.frame_buffer()
    }

    /// Final state of each engine that had a program.
    pub fn report(&self) -> RunReport {
        RunReport {
            cpu: self.cpu_ran.then(|| self.cpu.report()),
            gpu: self.gpu_ran.then(|| self.gpu.report()),
        }
    }
}

/// Serializable outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub cpu: Option<CpuReport>,
    pub gpu: Option<GpuReport>,
}

/// Errors that can occur while running a program end to end.
#[derive(Debug, Clone, Error)]
pub enum MachineError {
    #[error("assembly error: {0}")]
    Assembler(#[from] AssemblerError),

    #[error("demux error: {0}")]
    Demux(#[from] DemuxError),

    #[error("CPU error: {0}")]
    Cpu(#[from] CpuError),

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    /// The GPU program failed. The session holds both engines as they
    /// stopped, pixels drawn before the failure included.
    #[error("GPU error: {error}")]
    GpuFailed {
        #[source]
        error: GpuError,
        session: Box<Session>,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl MachineError {
    /// Engines left behind by a run that failed part way.
    pub fn session(&self) -> Option<&Session> {
        match self {
            MachineError::GpuFailed { session, .. } => Some(session),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuState;
    use crate::gpu::{GpuState, Rgb};

    fn small() -> Machine {
        Machine::new(MachineConfig { gpu_width: 16, gpu_height: 16, max_steps: 1_000 }).unwrap()
    }

    #[test]
    fn test_cpu_only_run() {
        let session = small().run_source(".CPU\nLDA 5\nSTA 0x20\nHALT").unwrap();
        assert_eq!(session.cpu.regs.a, 5);
        assert_eq!(session.cpu.mem.read(0x20).unwrap(), 5);

        let report = session.report();
        assert_eq!(report.cpu.map(|c| c.state), Some(CpuState::Halted));
        assert!(report.gpu.is_none());
    }

    #[test]
    fn test_cpu_then_gpu() {
        let source = "LDA 7\nHALT\n.GPU\nRECT 0 0\nSETC 9 8 7\nSETX 3\nSETY 4\nPLOT\nHALT";
        let session = small().run_source(source).unwrap();
        assert_eq!(session.cpu.regs.a, 7);
        assert_eq!(session.gpu.read_pixel(3, 4), Rgb::new(9, 8, 7));
        assert_eq!(session.report().gpu.map(|g| g.state), Some(GpuState::Halted));
    }

    #[test]
    fn test_cursor_wraps_to_config() {
        let source = ".GPU\nRECT 0 0\nSETX 17\nSETY 33\nPLOT\nHALT";
        let session = small().run_source(source).unwrap();
        assert_eq!(session.gpu.read_pixel(1, 1), Rgb::WHITE);
    }

    #[test]
    fn test_budget_from_config() {
        let machine = Machine::new(MachineConfig { max_steps: 10, ..MachineConfig::default() }).unwrap();
        let err = machine.run_source("loop: JMP loop").unwrap_err();
        assert!(matches!(err, MachineError::Cpu(CpuError::BudgetExceeded { limit: 10 })));
    }

    #[test]
    fn test_gpu_budget_keeps_session() {
        let machine = Machine::new(MachineConfig { gpu_width: 8, gpu_height: 8, max_steps: 3 }).unwrap();
        let err = machine
            .run_source("HALT\n.GPU\nRECT 0 0\nSETC 9 9 9\nPLOT\nSETX 1\nPLOT\nHALT")
            .unwrap_err();

        assert!(matches!(
            err,
            MachineError::GpuFailed { error: GpuError::BudgetExceeded { limit: 3 }, .. }
        ));
        let session = err.session().unwrap();
        assert!(session.cpu.is_halted());
        assert_eq!(session.gpu.read_pixel(0, 0), Rgb::new(9, 9, 9));
        assert_eq!(session.gpu.read_pixel(1, 0), Rgb::BLACK);
        assert_eq!(session.report().gpu.map(|g| g.steps), Some(3));
    }

    #[test]
    fn test_gpu_abort_keeps_session() {
        let err = small().run_split(&[], &[0x07, 0, 0, 0x04, 0x42]).unwrap_err();
        assert_eq!(err.to_string(), "GPU error: unknown GPU instruction 0x42 at 0x4");
        let session = err.session().unwrap();
        assert_eq!(session.gpu.state, GpuState::Aborted);
        assert_eq!(session.gpu.read_pixel(0, 0), Rgb::WHITE);
        assert!(session.report().cpu.is_none());
    }

    #[test]
    fn test_run_with_stepped_cpu() {
        let machine = small();
        let mut cpu = Cpu::with_budget(machine.config().max_steps);
        cpu.load(&[0x01, 4, 0x02, 1, 0xFF]).unwrap();
        cpu.start();
        cpu.step().unwrap();
        cpu.regs.a = 40;

        let session = machine.run_with_cpu(cpu, &[0x04, 0xFF]).unwrap();
        assert_eq!(session.cpu.regs.a, 41);
        assert_eq!(session.cpu.steps, 3);
        assert_eq!(session.gpu.read_pixel(0, 0), Rgb::WHITE);
        assert_eq!(session.report().cpu.map(|c| c.state), Some(CpuState::Halted));
    }

    #[test]
    fn test_run_with_cpu_shares_budget() {
        let machine = Machine::new(MachineConfig { max_steps: 5, ..MachineConfig::default() }).unwrap();
        let mut cpu = Cpu::with_budget(5);
        cpu.load(&[0x05, 0x00]).unwrap();
        cpu.start();
        cpu.run_limited(4).unwrap();

        let err = machine.run_with_cpu(cpu, &[]).unwrap_err();
        assert!(matches!(err, MachineError::Cpu(CpuError::BudgetExceeded { limit: 5 })));
        assert!(err.session().is_none());
    }

    #[test]
    fn test_errors_propagate() {
        assert!(matches!(small().run_source("BOGUS"), Err(MachineError::Assembler(_))));
        assert!(matches!(small().run_bytes(&[0x42]), Err(MachineError::Demux(_))));
        assert!(matches!(
            Machine::new(MachineConfig { gpu_width: 0, ..MachineConfig::default() }),
            Err(MachineError::Config(_))
        ));
    }

    #[test]
    fn test_report_serializes() {
        let report = small().run_source("HALT").unwrap().report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["cpu"]["state"], "Halted");
        assert!(json["gpu"].is_null());
    }
}
