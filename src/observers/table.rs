//! Table observer for pretty-printing results.
//!
//! [`TableObserver`] renders a [`ResultsSnapshot`] with the `tabled` crate,
//! either as one row per strategy or as a compact grid of `name: count`
//! cells.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! contendere = { version = "0.1", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ## Standard format
//!
//! ```rust,ignore
//! use contendere::observers::table::{TableObserver, TableStyle};
//!
//! let observer = TableObserver::new().with_style(TableStyle::Rounded);
//! println!("{}", observer.render(&orchestrator.snapshot()));
//! // ╭───────────┬────────┬────────┬────────────╮
//! // │ Strategy  │ Count  │ Target │ Verdict    │
//! // ├───────────┼────────┼────────┼────────────┤
//! // │ unguarded │ 97312  │ 100000 │ lost 2688  │
//! // │ atomic    │ 100000 │ 100000 │ exact      │
//! // │ ...       │        │        │            │
//! // ╰───────────┴────────┴────────┴────────────╯
//! ```
//!
//! ## Compact format
//!
//! ```rust,ignore
//! let observer = TableObserver::new().compact(true).columns(4);
//! println!("{}", observer.render(&orchestrator.snapshot()));
//! // ╭──────────────────┬────────────────┬───────────────┬───────────────────╮
//! // │ unguarded: 97312 │ atomic: 100000 │ mutex: 100000 │ semaphore: 100000 │
//! // ├──────────────────┼────────────────┼───────────────┼───────────────────┤
//! // │ pipeline: 100000 │ actor: 100000  │ broadcast: …  │                   │
//! // ╰──────────────────┴────────────────┴───────────────┴───────────────────╯
//! ```

use std::io::Write;

use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::observers::Result;
use crate::snapshot::{ResultsSnapshot, RunReport, RunState};

/// Available table styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// `+`, `-` and `|` only.
    Ascii,
    /// Rounded box-drawing corners.
    #[default]
    Rounded,
    /// Sharp box-drawing corners.
    Sharp,
    /// Box-drawing with row separators.
    Modern,
    /// GitHub-flavored Markdown.
    Markdown,
    /// No borders, just spacing.
    Blank,
}

/// Separator between name and count in compact mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompactSeparator {
    /// `name: count`
    #[default]
    Colon,
    /// `name = count`
    Equals,
    /// `name → count`
    Arrow,
    /// `name | count`
    Pipe,
}

impl CompactSeparator {
    /// Returns the separator string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompactSeparator::Colon => ": ",
            CompactSeparator::Equals => " = ",
            CompactSeparator::Arrow => " → ",
            CompactSeparator::Pipe => " | ",
        }
    }
}

/// Configuration for the table observer.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Border style.
    pub style: TableStyle,
    /// Whether to show the header row (standard mode only).
    pub show_header: bool,
    /// Line printed above the table.
    pub title: Option<String>,
    /// Whether to render a grid of `name: count` cells.
    pub compact: bool,
    /// Number of columns in compact mode.
    pub columns: usize,
    /// Separator between name and count in compact mode.
    pub separator: CompactSeparator,
    /// Placeholder for padding cells in compact mode.
    pub empty_cell: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            style: TableStyle::default(),
            show_header: true,
            title: None,
            compact: false,
            columns: 1,
            separator: CompactSeparator::default(),
            empty_cell: String::new(),
        }
    }
}

#[derive(Tabled)]
struct StrategyRow {
    #[tabled(rename = "Strategy")]
    strategy: &'static str,
    #[tabled(rename = "Count")]
    count: u64,
    #[tabled(rename = "Target")]
    target: u64,
    #[tabled(rename = "Verdict")]
    verdict: String,
}

/// Renders results snapshots as text tables.
///
/// While a run is in flight the verdict column reads `running`, since
/// partial counts say nothing about correctness yet.
///
/// ```rust,ignore
/// use contendere::observers::table::{CompactSeparator, TableObserver};
///
/// let observer = TableObserver::new()
///     .compact(true)
///     .columns(2)
///     .separator(CompactSeparator::Arrow);
/// let output = observer.render(&snapshot);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableObserver {
    config: TableConfig,
}

impl TableObserver {
    /// Creates an observer in standard mode with rounded borders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an observer from an explicit configuration.
    pub fn with_config(config: TableConfig) -> Self {
        Self { config }
    }

    /// Sets the border style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.config.style = style;
        self
    }

    /// Sets whether to show the header row.
    pub fn with_header(mut self, show: bool) -> Self {
        self.config.show_header = show;
        self
    }

    /// Sets a title printed above the table.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    /// Enables or disables compact mode.
    pub fn compact(mut self, enabled: bool) -> Self {
        self.config.compact = enabled;
        self
    }

    /// Sets the number of columns in compact mode. Values below 1 become 1.
    pub fn columns(mut self, count: usize) -> Self {
        self.config.columns = count.max(1);
        self
    }

    /// Sets the compact-mode separator.
    pub fn separator(mut self, sep: CompactSeparator) -> Self {
        self.config.separator = sep;
        self
    }

    /// Sets the placeholder for padding cells in compact mode.
    pub fn empty_cell(mut self, placeholder: impl Into<String>) -> Self {
        self.config.empty_cell = placeholder.into();
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.config.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    fn with_title_line(&self, title: Option<&str>, table: Table) -> String {
        match title {
            Some(title) => format!("{title}\n{table}"),
            None => table.to_string(),
        }
    }

    fn render_compact(&self, snapshot: &ResultsSnapshot, title: Option<&str>) -> String {
        let sep = self.config.separator.as_str();
        let cells: Vec<String> = snapshot
            .iter()
            .map(|(kind, count, _)| format!("{kind}{sep}{count}"))
            .collect();

        if cells.is_empty() {
            return String::new();
        }

        let cols = self.config.columns;
        let mut builder = Builder::default();
        for chunk in cells.chunks(cols) {
            let mut row = chunk.to_vec();
            row.resize(cols, self.config.empty_cell.clone());
            builder.push_record(row);
        }

        let mut table = builder.build();
        self.apply_style(&mut table);
        self.with_title_line(title, table)
    }

    fn render_standard(&self, snapshot: &ResultsSnapshot, title: Option<&str>) -> String {
        let running = snapshot.state == RunState::Running;
        let rows: Vec<StrategyRow> = snapshot
            .iter()
            .map(|(kind, count, verdict)| StrategyRow {
                strategy: kind.name(),
                count,
                target: snapshot.target,
                verdict: if running {
                    RunState::Running.to_string()
                } else {
                    verdict.to_string()
                },
            })
            .collect();

        let mut table = Table::new(&rows);
        self.apply_style(&mut table);

        if !self.config.show_header {
            table.with(tabled::settings::Remove::row(
                tabled::settings::object::Rows::first(),
            ));
        }

        self.with_title_line(title, table)
    }

    fn render_titled(&self, snapshot: &ResultsSnapshot, title: Option<&str>) -> String {
        if self.config.compact {
            self.render_compact(snapshot, title)
        } else {
            self.render_standard(snapshot, title)
        }
    }

    /// Renders a snapshot as a table string.
    pub fn render(&self, snapshot: &ResultsSnapshot) -> String {
        self.render_titled(snapshot, self.config.title.as_deref())
    }

    /// Renders a completed run: the final counts followed by shutdown details.
    ///
    /// Without a configured title the run number and duration are used.
    pub fn render_report(&self, report: &RunReport) -> String {
        let title = self.config.title.clone().unwrap_or_else(|| {
            format!("run {} ({} ms)", report.run, report.elapsed.as_millis())
        });
        let mut out = self.render_titled(&report.snapshot, Some(&title));
        out.push_str(&format!(
            "\npipeline drained: {}  actor reply: {}  broadcast dropped: {}  cas retries: {}",
            report.pipeline_drained, report.actor_reply, report.broadcast_dropped, report.cas_retries
        ));
        out
    }

    /// Renders a snapshot and writes it, newline-terminated, to `out`.
    pub fn write_to(&self, snapshot: &ResultsSnapshot, out: &mut impl Write) -> Result<()> {
        writeln!(out, "{}", self.render(snapshot))?;
        Ok(())
    }
}
