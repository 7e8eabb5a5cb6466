//! Duet Emulator - CLI Entry Point
//!
//! Commands:
//! - `duet-emu run <program>` - Run an ASM file or hex image on both engines
//! - `duet-emu debug <program>` - Interactive CPU debugger
//! - `duet-emu asm <source>` - Assemble to a hex image
//! - `duet-emu disasm <image>` - Disassemble a hex image
//! - `duet-emu split <program>` - Show how a stream splits between the engines

use clap::{Args, Parser, Subcommand};
use duet::asm::{self, ImageFile};
use duet::{Machine, MachineConfig, MachineError, Session};
use std::io::Write;
use std::path::Path;

#[derive(Parser)]
#[command(name = "duet-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An assembler and simulator for a paired 8-bit CPU and raster GPU")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    machine: MachineArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Overrides layered on top of the config file.
#[derive(Args)]
struct MachineArgs {
    /// JSON machine config
    #[arg(long, global = true)]
    config: Option<String>,
    /// Instruction budget per engine
    #[arg(long, global = true)]
    max_steps: Option<u64>,
    /// Frame buffer width
    #[arg(long, global = true)]
    width: Option<usize>,
    /// Frame buffer height
    #[arg(long, global = true)]
    height: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until both engines stop
    Run {
        /// Path to the ASM file or hex image to execute
        program: String,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
        /// Write the frame buffer as a binary PPM
        #[arg(long)]
        ppm: Option<String>,
        /// Show each CPU instruction as it executes
        #[arg(short, long)]
        trace: bool,
    },
    /// Interactive CPU debugger
    Debug {
        /// Path to the ASM file or hex image to debug
        program: String,
    },
    /// Assemble source to a hex image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
        /// Print the assembly listing
        #[arg(long)]
        listing: bool,
    },
    /// Disassemble a hex image to readable text
    Disasm {
        /// Path to the image
        image: String,
        /// Decode the whole image as CPU code
        #[arg(long, conflicts_with = "gpu")]
        cpu: bool,
        /// Decode the whole image as GPU code
        #[arg(long)]
        gpu: bool,
    },
    /// Split a program into its CPU and GPU streams
    Split {
        /// Path to the ASM file or hex image
        program: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.machine);

    match cli.command {
        Some(Commands::Run { program, json, ppm, trace }) => {
            run_program(&program, config, json, ppm, trace);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program, config);
        }
        Some(Commands::Asm { source, output, listing }) => {
            assemble_file(&source, output, listing);
        }
        Some(Commands::Disasm { image, cpu, gpu }) => {
            disassemble_file(&image, cpu, gpu);
        }
        Some(Commands::Split { program }) => {
            split_file(&program);
        }
        None => {
            println!("Duet Emulator v0.1.0");
            println!("A paired 8-bit CPU and raster GPU");
            println!();
            println!("Use --help for available commands");
            println!();
            demo();
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .format_timestamp(None)
        .init();
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}: {}", context, err);
    std::process::exit(1);
}

fn load_config(args: &MachineArgs) -> MachineConfig {
    let mut config = match &args.config {
        Some(path) => MachineConfig::load(path).unwrap_or_else(|e| fail("Failed to load config", e)),
        None => MachineConfig::default(),
    };

    if let Some(steps) = args.max_steps {
        config.max_steps = steps;
    }
    if let Some(width) = args.width {
        config.gpu_width = width;
    }
    if let Some(height) = args.height {
        config.gpu_height = height;
    }

    if let Err(e) = config.validate() {
        fail("Invalid configuration", e);
    }
    config
}

/// Read a program as combined machine code: `.asm` files are assembled,
/// anything else is read as a hex image.
fn load_bytes(path: &str, quiet: bool) -> Vec<u8> {
    if path.ends_with(".asm") {
        let source = std::fs::read_to_string(path).unwrap_or_else(|e| fail("Failed to read file", e));
        let bytes = asm::assemble(&source).unwrap_or_else(|e| fail("Assembly error", e));
        if !quiet {
            println!("📝 Assembled {} bytes", bytes.len());
        }
        bytes
    } else {
        let image = asm::load_image(path).unwrap_or_else(|e| fail("Failed to load image", e));
        if !quiet {
            println!("📂 Loaded {} bytes", image.len());
        }
        image.into_bytes()
    }
}

fn run_program(path: &str, config: MachineConfig, json: bool, ppm: Option<String>, trace: bool) {
    if !json {
        println!("🔧 Running: {}", path);
    }

    let bytes = load_bytes(path, json);
    if bytes.is_empty() {
        fail("Nothing to execute", "program is empty");
    }

    let machine = Machine::new(config).unwrap_or_else(|e| fail("Invalid configuration", e));
    let result = if trace {
        run_traced(&machine, &bytes)
    } else {
        machine.run_bytes(&bytes)
    };
    let session = match result {
        Ok(session) => session,
        Err(e) => {
            // Keep whatever the GPU drew before it stopped.
            if let (Some(out), Some(session)) = (&ppm, e.session()) {
                write_ppm(out, session);
                eprintln!("🖼  Partial frame written to {}", out);
            }
            fail("Run failed", e);
        }
    };

    if let Some(out) = ppm {
        write_ppm(&out, &session);
        if !json {
            println!("🖼  Frame written to {}", out);
        }
    }

    let report = session.report();
    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => fail("Failed to serialize report", e),
        }
        return;
    }

    println!();
    println!("━━━ Result ━━━");
    match report.cpu {
        Some(cpu) => {
            println!("CPU state: {:?} after {} steps", cpu.state, cpu.steps);
            println!("{}", session.cpu.dump_state());
        }
        None => println!("CPU: no program"),
    }
    match report.gpu {
        Some(gpu) => {
            println!("GPU state: {:?} after {} steps", gpu.state, gpu.steps);
            println!("Cursor: ({}, {})  Color: ({}, {}, {})",
                gpu.cursor.0, gpu.cursor.1, gpu.color.r, gpu.color.g, gpu.color.b);
        }
        None => println!("GPU: no program"),
    }
}

/// Run with a per-instruction CPU trace, then the GPU as usual. The
/// traced CPU is the one reported.
fn run_traced(machine: &Machine, bytes: &[u8]) -> Result<Session, MachineError> {
    let (cpu_bytes, gpu_bytes) = asm::split(bytes)?;
    if cpu_bytes.is_empty() {
        return machine.run_split(&cpu_bytes, &gpu_bytes);
    }

    let mut tracer = duet::Cpu::with_budget(machine.config().max_steps);
    tracer.load(&cpu_bytes)?;
    tracer.start();

    println!();
    println!("━━━ Execution ━━━");
    while tracer.is_running() && tracer.steps < machine.config().max_steps {
        let pc = tracer.regs.pc;
        match tracer.step()? {
            Some(instr) => println!("{:04X}: {:<12} A={:#04x} Z={} C={}",
                pc, instr.to_string(), tracer.regs.a, tracer.regs.zero as u8, tracer.regs.carry as u8),
            None => println!("{:04X}: unknown opcode, CPU stopped", pc),
        }
    }

    machine.run_with_cpu(tracer, &gpu_bytes)
}

fn write_ppm(path: &str, session: &Session) {
    let fb = session.frame_buffer();
    let mut file = std::fs::File::create(path).unwrap_or_else(|e| fail("Failed to create PPM", e));
    let written = write!(file, "P6\n{} {}\n255\n", fb.width(), fb.height())
        .and_then(|_| file.write_all(fb.as_bytes()));
    if let Err(e) = written {
        fail("Failed to write PPM", e);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, config: MachineConfig) {
    use duet::tui::run_debugger;

    println!("🔍 Loading: {}", path);

    let bytes = load_bytes(path, false);
    if bytes.is_empty() {
        fail("Nothing to execute", "program is empty");
    }
    let (cpu_bytes, gpu_bytes) = asm::split(&bytes).unwrap_or_else(|e| fail("Split failed", e));

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(cpu_bytes, gpu_bytes, config) {
        fail("Debugger error", e);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _config: MachineConfig) {
    fail("Debugger unavailable", "built without the `tui` feature");
}

fn assemble_file(source_path: &str, output: Option<String>, listing: bool) {
    let out_path = output.unwrap_or_else(|| {
        Path::new(source_path).with_extension("hex").to_string_lossy().into_owned()
    });
    if Path::new(&out_path) == Path::new(source_path) {
        fail("Refusing to overwrite the source", &out_path);
    }

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = std::fs::read_to_string(source_path).unwrap_or_else(|e| fail("Failed to read file", e));
    let result = asm::assemble_listing(&source).unwrap_or_else(|e| fail("Assembly error", e));

    println!("✓ Assembled {} bytes, {} instructions", result.bytes.len(), result.entries.len());

    if listing {
        println!();
        print!("{}", result.render());
        println!();
    }

    if let Err(e) = asm::save_image(&out_path, &ImageFile::from_listing(&result)) {
        fail("Failed to save image", e);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(path: &str, cpu: bool, gpu: bool) {
    println!("📖 Disassembling: {}", path);
    println!();

    let image = asm::load_image(path).unwrap_or_else(|e| fail("Failed to load image", e));

    let output = if cpu {
        asm::disassemble_cpu(image.bytes())
    } else if gpu {
        asm::disassemble_gpu(image.bytes())
    } else {
        asm::disassemble_combined(image.bytes())
    };
    println!("{}", output);
}

fn split_file(path: &str) {
    let bytes = load_bytes(path, false);
    let (cpu, gpu) = asm::split(&bytes).unwrap_or_else(|e| fail("Split failed", e));

    println!("✓ {} CPU bytes, {} GPU bytes", cpu.len(), gpu.len());
    println!();
    println!("{}", asm::disassemble_cpu(&cpu));
    println!("{}", asm::disassemble_gpu(&gpu));
}

fn demo() {
    let source = "\
.CPU
        LDA 5
        STA 0x20
        HALT
.GPU
        RECT 0 0
        SETC 255 128 0
        SETX 3
        SETY 4
        PLOT
        HALT";

    println!("━━━ Demo ━━━");
    println!("{}", source);
    println!();

    let machine = Machine::new(MachineConfig { gpu_width: 8, gpu_height: 8, ..MachineConfig::default() })
        .unwrap_or_else(|e| fail("Invalid configuration", e));
    let session = machine.run_source(source).unwrap_or_else(|e| fail("Demo failed", e));

    println!("{}", session.cpu.dump_state());
    let px = session.gpu.read_pixel(3, 4);
    println!("Pixel (3, 4) = ({}, {}, {})", px.r, px.g, px.b);
    println!();
    println!("✓ Both engines ran!");
}
