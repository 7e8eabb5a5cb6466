//! WebAssembly bindings.
//!
//! JavaScript-friendly wrappers around the machine. The page owns the
//! canvas; these bindings only hand out raw frame buffer bytes.

use wasm_bindgen::prelude::*;
use crate::asm::{assemble, disassemble_combined, split};
use crate::config::MachineConfig;
use crate::cpu::Cpu;
use crate::gpu::Gpu;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// Both engines behind one JS object.
#[wasm_bindgen]
pub struct WasmMachine {
    cpu: Cpu,
    gpu: Gpu,
    cpu_program: Vec<u8>,
    gpu_program: Vec<u8>,
    max_steps: u64,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a machine with a `width` x `height` frame.
    #[wasm_bindgen(constructor)]
    pub fn new(width: usize, height: usize) -> Result<WasmMachine, JsError> {
        let config = MachineConfig { gpu_width: width, gpu_height: height, ..MachineConfig::default() };
        config.validate().map_err(js_err)?;

        Ok(Self {
            cpu: Cpu::with_budget(config.max_steps),
            gpu: Gpu::with_size(width, height).map_err(js_err)?.with_budget(config.max_steps),
            cpu_program: Vec::new(),
            gpu_program: Vec::new(),
            max_steps: config.max_steps,
        })
    }

    /// Assemble and split a source. Returns the combined stream length.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let bytes = assemble(source).map_err(js_err)?;
        let (cpu_program, gpu_program) = split(&bytes).map_err(js_err)?;

        self.cpu.reset();
        self.cpu.load(&cpu_program).map_err(js_err)?;
        self.gpu.load(&gpu_program);
        self.gpu.frame_buffer_mut().clear();
        self.cpu_program = cpu_program;
        self.gpu_program = gpu_program;

        Ok(bytes.len())
    }

    /// Run the CPU program, then the GPU program.
    #[wasm_bindgen]
    pub fn run(&mut self) -> Result<(), JsError> {
        if !self.cpu_program.is_empty() {
            self.cpu.run().map_err(js_err)?;
        }
        if !self.gpu_program.is_empty() {
            self.gpu.run().map_err(js_err)?;
        }
        Ok(())
    }

    /// Step the CPU once. Returns the executed instruction as text.
    #[wasm_bindgen]
    pub fn step_cpu(&mut self) -> Result<String, JsError> {
        match self.cpu.step().map_err(js_err)? {
            Some(instr) => Ok(instr.to_string()),
            None => Ok(format!("{:?}", self.cpu.state)),
        }
    }

    #[wasm_bindgen]
    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    #[wasm_bindgen]
    pub fn width(&self) -> usize {
        self.gpu.frame_buffer().width()
    }

    #[wasm_bindgen]
    pub fn height(&self) -> usize {
        self.gpu.frame_buffer().height()
    }

    /// Raw RGB bytes, row-major, three per pixel.
    #[wasm_bindgen]
    pub fn frame_buffer(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.gpu.frame_buffer().as_bytes())
    }

    /// Pixel as `[r, g, b]`; black outside the frame.
    #[wasm_bindgen]
    pub fn pixel(&self, x: usize, y: usize) -> Vec<u8> {
        let c = self.gpu.read_pixel(x, y);
        vec![c.r, c.g, c.b]
    }

    /// CPU memory cell, 0 outside memory.
    #[wasm_bindgen]
    pub fn memory_at(&self, addr: usize) -> u8 {
        self.cpu.mem.read(addr).unwrap_or(0)
    }

    #[wasm_bindgen]
    pub fn cpu_state(&self) -> String {
        format!("{:?}", self.cpu.state)
    }

    #[wasm_bindgen]
    pub fn gpu_state(&self) -> String {
        format!("{:?}", self.gpu.state)
    }

    /// CPU registers and flags as a JSON string.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.report()).map_err(js_err)
    }

    /// GPU cursor, color and state as a JSON string.
    #[wasm_bindgen]
    pub fn gpu_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.gpu.report()).map_err(js_err)
    }
}

/// Assemble source code and return the combined stream.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<Vec<u8>, JsError> {
    assemble(source).map_err(js_err)
}

/// Disassemble a combined stream.
#[wasm_bindgen]
pub fn wasm_disassemble(bytes: &[u8]) -> String {
    disassemble_combined(bytes)
}
