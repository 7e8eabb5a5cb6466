//! Debugger application state and logic.

use crate::asm::disasm::disassemble_instruction;
use crate::config::MachineConfig;
use crate::cpu::{Cpu, MEMORY_SIZE};
use crate::gpu::{Gpu, GpuError};
use crate::isa::Processor;
use std::collections::HashSet;

/// Memory bytes shown per row.
pub const MEM_ROW: usize = 8;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// The GPU, run once the CPU stops.
    pub gpu: Gpu,
    /// CPU program for reset.
    pub cpu_program: Vec<u8>,
    /// GPU program run after the CPU.
    pub gpu_program: Vec<u8>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<usize>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows.
    pub mem_scroll: usize,
    /// Outcome of the GPU run, once it happened.
    pub gpu_summary: Option<String>,
    config: MachineConfig,
}

impl DebuggerApp {
    /// Create a new debugger with loaded programs.
    pub fn new(cpu_program: Vec<u8>, gpu_program: Vec<u8>, config: MachineConfig) -> Result<Self, GpuError> {
        let mut app = Self {
            cpu: Cpu::with_budget(config.max_steps),
            gpu: Gpu::with_size(config.gpu_width, config.gpu_height)?.with_budget(config.max_steps),
            cpu_program,
            gpu_program,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: 0,
            gpu_summary: None,
            config,
        };
        app.reset();
        app.status = "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into();
        Ok(app)
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            self.finish_gpu();
            return;
        }

        let pc = self.cpu.regs.pc;
        match self.cpu.step() {
            Ok(Some(instr)) => {
                self.status = format!("PC={:#05x}: {}", pc, instr);
            }
            Ok(None) => {
                self.status = format!("Unknown opcode at {:#05x}, CPU stopped", pc);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
                return;
            }
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.finish_gpu();
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Stopped after {} steps", self.cpu.steps);
            return;
        }

        // Check for breakpoint
        let pc = self.cpu.regs.pc;
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:#05x}", pc);
            return;
        }

        if self.cpu.steps >= self.config.max_steps {
            self.running = false;
            self.status = format!("Step budget of {} reached", self.config.max_steps);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:#05x}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:#05x}", pc);
        }
    }

    /// Reset both engines to their initial state.
    pub fn reset(&mut self) {
        self.cpu.reset();
        if let Err(e) = self.cpu.load(&self.cpu_program) {
            self.status = format!("Error: {}", e);
        } else {
            self.status = "Reset. Ready.".into();
        }
        self.cpu.start();
        self.gpu.frame_buffer_mut().clear();
        self.gpu_summary = None;
        self.running = false;
    }

    /// Run the GPU program once the CPU has stopped.
    fn finish_gpu(&mut self) {
        if self.gpu_summary.is_some() {
            return;
        }
        if self.gpu_program.is_empty() {
            self.gpu_summary = Some("no GPU program".into());
            return;
        }

        self.gpu.load(&self.gpu_program);
        let outcome = self.gpu.run().map(|_| ());
        let summary = match outcome {
            Ok(()) => {
                let lit = self
                    .gpu
                    .frame_buffer()
                    .as_bytes()
                    .chunks(3)
                    .filter(|px| px.iter().any(|&c| c != 0))
                    .count();
                format!("{:?} after {} steps, {} pixel(s) lit", self.gpu.state, self.gpu.steps, lit)
            }
            Err(e) => format!("error: {}", e),
        };
        log::debug!("debugger GPU run: {}", summary);
        self.gpu_summary = Some(summary);
    }

    /// Get disassembly around current PC.
    ///
    /// Decoding starts at address 0 and realigns on the PC when a jump
    /// landed inside another instruction's operand.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let pc = self.cpu.regs.pc;
        let mem = self.cpu.mem.as_slice();

        let mut rows = Vec::new();
        let mut at = 0;
        while at < MEMORY_SIZE {
            let (text, len) = disassemble_instruction(mem, at, Processor::Cpu);
            if at < pc && at + len > pc {
                at = pc;
                continue;
            }
            rows.push((at, text, at == pc));
            at += len;
        }

        let current = rows.iter().position(|(_, _, is_pc)| *is_pc).unwrap_or(0);
        let start = current.saturating_sub(lines / 2).min(rows.len().saturating_sub(lines));
        rows.into_iter().skip(start).take(lines).collect()
    }

    /// Largest memory scroll offset.
    pub fn max_scroll(&self) -> usize {
        MEMORY_SIZE / MEM_ROW - 1
    }

    /// Move the memory view by `rows`, clamped to memory.
    pub fn scroll_memory(&mut self, rows: isize) {
        self.mem_scroll = self.mem_scroll.saturating_add_signed(rows).min(self.max_scroll());
    }

    /// Run the CPU to completion, ignoring breakpoints.
    pub fn go(&mut self) {
        self.running = false;
        let remaining = self.config.max_steps.saturating_sub(self.cpu.steps);
        match self.cpu.run_limited(remaining) {
            Ok(n) if self.cpu.is_running() => {
                self.status = format!("Ran {} steps, budget of {} reached", n, self.config.max_steps);
            }
            Ok(n) => {
                self.status = format!("Ran {} steps, CPU {:?}", n, self.cpu.state);
                self.finish_gpu();
            }
            Err(e) => self.status = format!("Error: {}", e),
        }
    }

    /// Apply one key press.
    pub fn handle_key(&mut self, key: char) {
        match key {
            'q' => self.should_quit = true,
            's' => {
                self.running = false;
                self.step();
            }
            'r' => self.run(),
            'g' => self.go(),
            'p' => {
                self.running = false;
                self.status = "Paused.".into();
            }
            'b' => self.toggle_breakpoint(),
            'x' => self.reset(),
            _ => {}
        }
    }
}

/// Run the debugger with a CPU program and the GPU program that follows it.
pub fn run_debugger(cpu_program: Vec<u8>, gpu_program: Vec<u8>, config: MachineConfig) -> std::io::Result<()> {
    use crossterm::{
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use std::io::stdout;

    let mut app = DebuggerApp::new(cpu_program, gpu_program, config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    // The terminal is restored even when the event loop fails.
    let outcome = event_loop(&mut app);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    outcome
}

fn event_loop(app: &mut DebuggerApp) -> std::io::Result<()> {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind};
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    while !app.should_quit {
        terminal.draw(|frame| super::ui::draw(frame, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char(c) => app.handle_key(c),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        KeyCode::PageUp => app.scroll_memory(-8),
                        KeyCode::PageDown => app.scroll_memory(8),
                        _ => {}
                    }
                }
            }
        }

        app.tick();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{assemble, split};
    use crate::cpu::CpuState;

    fn app(source: &str) -> DebuggerApp {
        let (cpu, gpu) = split(&assemble(source).unwrap()).unwrap();
        let config = MachineConfig { gpu_width: 8, gpu_height: 8, max_steps: 100 };
        DebuggerApp::new(cpu, gpu, config).unwrap()
    }

    #[test]
    fn test_step_updates_status() {
        let mut app = app("LDA 5\nHALT");
        app.step();
        assert_eq!(app.cpu.regs.a, 5);
        assert_eq!(app.status, "PC=0x000: LDA 0x05");
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = app("LDA 1\nADD 1\nHALT");
        app.step();
        app.toggle_breakpoint();
        assert!(app.breakpoints.contains(&2));

        app.reset();
        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert!(!app.running);
        assert_eq!(app.cpu.regs.pc, 2);
        assert_eq!(app.status, "Breakpoint at PC=0x002");
    }

    #[test]
    fn test_gpu_runs_after_halt() {
        let mut app = app("HALT\n.GPU\nRECT 0 0\nSETX 1\nPLOT\nHALT");
        assert!(app.gpu_summary.is_none());
        app.step();
        assert_eq!(app.cpu.state, CpuState::Halted);
        assert_eq!(app.gpu_summary.as_deref(), Some("Halted after 4 steps, 1 pixel(s) lit"));
    }

    #[test]
    fn test_keys_drive_the_session() {
        let mut app = app("LDA 2\nADD 3\nHALT\n.GPU\nRECT 0 0\nPLOT\nHALT");
        app.handle_key('s');
        assert_eq!(app.cpu.regs.a, 2);
        app.handle_key('g');
        assert_eq!(app.cpu.regs.a, 5);
        assert!(app.cpu.is_halted());
        assert!(app.gpu_summary.is_some());

        app.handle_key('x');
        assert_eq!(app.cpu.regs.pc, 0);
        assert!(app.gpu_summary.is_none());

        app.handle_key('q');
        assert!(app.should_quit);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut app = app("HALT");
        app.scroll_memory(-3);
        assert_eq!(app.mem_scroll, 0);
        app.scroll_memory(1_000);
        assert_eq!(app.mem_scroll, app.max_scroll());
    }

    #[test]
    fn test_disassembly_window() {
        let app = app("LDA 1\nSTA 0x20\nHALT");
        let rows = app.get_disassembly(3);
        assert_eq!(rows[0], (0, "LDA 0x01".to_string(), true));
        assert_eq!(rows[1].1, "STA 0x20");
        assert_eq!(rows[2].1, "HALT");
    }

    #[test]
    fn test_disassembly_realigns_on_pc() {
        let mut app = app("LDA 1\nHALT");
        app.cpu.regs.pc = 1;
        let rows = app.get_disassembly(4);
        assert!(rows.iter().any(|(addr, _, is_pc)| *addr == 1 && *is_pc));
    }
}
