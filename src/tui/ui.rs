//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem, Wrap},
    style::{Color, Style, Modifier},
};
use super::app::{DebuggerApp, MEM_ROW};
use crate::cpu::MEMORY_SIZE;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: code and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(6),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory, GPU and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(4),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_gpu(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:04X}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(panel("Disassembly", Color::Cyan)), area);
}

fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = &app.cpu.regs;

    let content = vec![
        Line::from(vec![
            Span::raw("A: "),
            Span::styled(format!("{:#04x}", regs.a), Style::default().fg(Color::White)),
            Span::raw(format!(" = {:<3}", regs.a)),
            Span::raw("   B: "),
            Span::styled(format!("{:#04x}", regs.b), Style::default().fg(Color::White)),
            Span::raw("   PC: "),
            Span::styled(format!("{:#05x}", regs.pc), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::raw("Zero: "),
            Span::styled(flag_text(regs.zero), flag_style(regs.zero)),
            Span::raw("   Carry: "),
            Span::styled(flag_text(regs.carry), flag_style(regs.carry)),
        ]),
        Line::from(vec![
            Span::raw("Steps: "),
            Span::styled(format!("{}", app.cpu.steps), Style::default().fg(Color::Cyan)),
            Span::raw("   State: "),
            Span::styled(format!("{:?}", app.cpu.state),
                if app.cpu.is_running() {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                }),
        ]),
    ];

    frame.render_widget(Paragraph::new(content).block(panel("CPU", Color::Green)), area);
}

fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let start = app.mem_scroll;
    let end = (start + visible_rows).min(MEMORY_SIZE / MEM_ROW);
    let mem = app.cpu.mem.as_slice();
    let pc = app.cpu.regs.pc;

    let items: Vec<ListItem> = (start..end)
        .map(|row| {
            let base = row * MEM_ROW;
            let cells = &mem[base..base + MEM_ROW];
            let mut spans = vec![Span::raw(format!("{:04X}: ", base))];

            for (i, value) in cells.iter().enumerate() {
                let style = if base + i == pc {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if *value != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:02X} ", value), style));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!("Memory {:04X}-{:04X}", start * MEM_ROW, (end * MEM_ROW).saturating_sub(1));
    frame.render_widget(List::new(items).block(panel(&title, Color::Magenta)), area);
}

fn draw_gpu(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let fb = app.gpu.frame_buffer();
    let summary = app
        .gpu_summary
        .clone()
        .unwrap_or_else(|| "waits for the CPU to stop".into());

    let gpu = Paragraph::new(vec![
        Line::from(format!("{} byte program, {}x{} frame", app.gpu_program.len(), fb.width(), fb.height())),
        Line::from(summary),
    ])
    .block(panel("GPU", Color::Blue));

    frame.render_widget(gpu, area);
}

fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let style = if app.running {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::White)
    };
    frame.render_widget(
        Paragraph::new(app.status.as_str()).style(style).block(panel("Status", Color::White)),
        area,
    );
}

const KEYS: [(&str, &str); 9] = [
    ("s", "step"),
    ("r", "run"),
    ("g", "go"),
    ("p", "pause"),
    ("b", "break"),
    ("x", "reset"),
    ("↑↓", "scroll"),
    ("PgUp/PgDn", "page"),
    ("q", "quit"),
];

fn draw_help(frame: &mut Frame, area: Rect) {
    let spans: Vec<Span> = KEYS
        .iter()
        .flat_map(|(key, action)| {
            [
                Span::styled(*key, Style::default().fg(Color::Yellow)),
                Span::styled(format!(" {}  ", action), Style::default().fg(Color::DarkGray)),
            ]
        })
        .collect();

    let help = Paragraph::new(Line::from(spans))
        .wrap(Wrap { trim: true })
        .block(panel("Keys", Color::DarkGray));
    frame.render_widget(help, area);
}

fn panel(title: &str, color: Color) -> Block<'static> {
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

fn flag_text(set: bool) -> &'static str {
    if set { "1" } else { "0" }
}

fn flag_style(set: bool) -> Style {
    if set {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Gray)
    }
}
