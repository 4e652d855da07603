//! Terminal table and JSON presentation of snapshots.

use std::io::{self, Stdout, Write};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Borders, Cell, Row, Table};
use ratatui::{Frame, Terminal};
use log::info;
use crate::errors::MonitorError;
use crate::metrics::{AcceleratorReading, Snapshot, WorkerRow, WorkerStatus};

pub const TITLE: &str = "Worker Resource Monitor";
pub const STOPPED: &str = "Stopped.";
const NOT_FOUND: &str = "Not Found";
const PLACEHOLDER: &str = "-";
const MIB: f64 = 1024.0 * 1024.0;

pub fn headers(accelerator_columns: bool) -> Vec<&'static str> {
    let mut headers = vec!["Worker", "PID", "USR %", "SYS %", "TOTAL %"];
    if accelerator_columns {
        headers.extend(["GPU Mem", "GPU Util"]);
    }
    headers
}

fn accelerator_cells(reading: AcceleratorReading) -> [String; 2] {
    match reading {
        AcceleratorReading::Usage { memory_bytes: 0, utilization_percent: 0 } => {
            ["0 MB".to_string(), "0%".to_string()]
        }
        AcceleratorReading::Usage { memory_bytes, utilization_percent } => [
            format!("{:.0} MB", memory_bytes as f64 / MIB),
            format!("~{}%", utilization_percent),
        ],
        AcceleratorReading::Unsupported => ["N/A".to_string(), "N/A".to_string()],
    }
}

/// Formats one row into display cells, matching [`headers`].
pub fn cells(row: &WorkerRow, accelerator_columns: bool) -> Vec<String> {
    let mut cells = vec![row.name.clone()];
    match &row.status {
        WorkerStatus::Resolved { pid, cpu, accelerator } => {
            cells.push(pid.to_string());
            cells.push(format!("{:.1}", cpu.usr_percent));
            cells.push(format!("{:.1}", cpu.sys_percent));
            cells.push(format!("{:.1}", cpu.total_percent));
            if accelerator_columns {
                cells.extend(accelerator_cells(*accelerator));
            }
        }
        WorkerStatus::Unresolved => {
            cells.push(NOT_FOUND.to_string());
            let metrics = if accelerator_columns { 5 } else { 3 };
            cells.extend(std::iter::repeat_n(PLACEHOLDER.to_string(), metrics));
        }
    }
    cells
}

fn column_style(column: usize) -> Style {
    match column {
        0 => Style::new().fg(Color::Cyan),
        1 => Style::new().fg(Color::Magenta),
        2 => Style::new().fg(Color::Green),
        3 => Style::new().fg(Color::Yellow),
        4 => Style::new().fg(Color::Green).add_modifier(Modifier::BOLD),
        5 => Style::new().fg(Color::Blue),
        _ => Style::new().fg(Color::Blue).add_modifier(Modifier::BOLD),
    }
}

/// Names and PIDs are left aligned, metrics right aligned.
fn aligned(column: usize, text: String) -> Line<'static> {
    let line = Line::from(text);
    if column < 2 { line } else { line.alignment(Alignment::Right) }
}

/// Builds the bordered worker table for one snapshot.
pub fn table_widget(snapshot: &Snapshot) -> Table<'static> {
    let headers = headers(snapshot.accelerator_columns);
    let rows: Vec<Vec<String>> = snapshot
        .rows
        .iter()
        .map(|row| cells(row, snapshot.accelerator_columns))
        .collect();

    let mut widths: Vec<u16> = headers.iter().map(|h| h.len() as u16).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count() as u16);
        }
    }

    let header = Row::new(
        headers
            .iter()
            .enumerate()
            .map(|(column, h)| Cell::from(aligned(column, h.to_string()))),
    )
    .style(Style::new().add_modifier(Modifier::BOLD));

    let body: Vec<Row> = rows
        .into_iter()
        .map(|row| {
            Row::new(
                row.into_iter()
                    .enumerate()
                    .map(|(column, value)| Cell::from(aligned(column, value)).style(column_style(column))),
            )
        })
        .collect();

    Table::new(body, widths.into_iter().map(Constraint::Length))
        .header(header)
        .column_spacing(2)
        .block(
            Block::default()
                .title(TITLE)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        )
}

/// Rows plus header plus the two borders, clipped to the frame.
fn table_area(area: Rect, rows: usize) -> Rect {
    let height = (rows as u16).saturating_add(3).min(area.height);
    Rect { height, ..area }
}

pub fn draw(frame: &mut Frame, snapshot: &Snapshot) {
    let area = table_area(frame.area(), snapshot.rows.len());
    frame.render_widget(table_widget(snapshot), area);
}

/// Live view that redraws the table in place on every tick.
pub struct Screen<B: Backend> {
    terminal: Terminal<B>,
    cleared: bool,
    bottom: u16,
}

impl Screen<CrosstermBackend<Stdout>> {
    pub fn stdout() -> Result<Self, MonitorError> {
        Self::new(CrosstermBackend::new(io::stdout()))
    }
}

impl<B: Backend> Screen<B> {
    pub fn new(backend: B) -> Result<Self, MonitorError> {
        Ok(Self {
            terminal: Terminal::new(backend)?,
            cleared: false,
            bottom: 0,
        })
    }

    pub fn draw(&mut self, snapshot: &Snapshot) -> Result<(), MonitorError> {
        // Anything printed before the first frame is wiped once, not per tick.
        if !self.cleared {
            self.terminal.clear()?;
            self.cleared = true;
        }
        let completed = self.terminal.draw(|frame| draw(frame, snapshot))?;
        self.bottom = table_area(completed.area, snapshot.rows.len()).bottom();
        Ok(())
    }

    /// Restores the cursor below the last frame so later output follows it.
    pub fn finish(&mut self) -> Result<(), MonitorError> {
        self.terminal.show_cursor()?;
        if self.cleared {
            self.terminal.set_cursor_position((0, self.bottom))?;
        }
        Ok(())
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }
}

pub fn write_json_line<W: Write>(out: &mut W, snapshot: &Snapshot) -> Result<(), MonitorError> {
    serde_json::to_writer(&mut *out, snapshot)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Where snapshots go once per tick.
pub trait Presenter {
    fn present(&mut self, snapshot: &Snapshot) -> Result<(), MonitorError>;

    /// Called exactly once when sampling ends. `interrupted` asks for the
    /// stop acknowledgment.
    fn close(&mut self, interrupted: bool) -> Result<(), MonitorError>;
}

/// Table mode: redraws the screen and prints `Stopped.` below it on interrupt.
pub struct TableView<B: Backend, W: Write> {
    screen: Screen<B>,
    out: W,
}

impl<B: Backend, W: Write> TableView<B, W> {
    pub fn new(screen: Screen<B>, out: W) -> Self {
        Self { screen, out }
    }

    pub fn output(&self) -> &W {
        &self.out
    }
}

impl<B: Backend, W: Write> Presenter for TableView<B, W> {
    fn present(&mut self, snapshot: &Snapshot) -> Result<(), MonitorError> {
        self.screen.draw(snapshot)
    }

    fn close(&mut self, interrupted: bool) -> Result<(), MonitorError> {
        self.screen.finish()?;
        if interrupted {
            writeln!(self.out, "{}", STOPPED)?;
            self.out.flush()?;
        }
        Ok(())
    }
}

/// JSON mode: one object per line on the output, acknowledgment on the log.
pub struct JsonLines<W: Write> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn output(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Presenter for JsonLines<W> {
    fn present(&mut self, snapshot: &Snapshot) -> Result<(), MonitorError> {
        write_json_line(&mut self.out, snapshot)
    }

    fn close(&mut self, interrupted: bool) -> Result<(), MonitorError> {
        if interrupted {
            info!("{}", STOPPED);
        }
        Ok(())
    }
}
