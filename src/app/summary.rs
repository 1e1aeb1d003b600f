//! Result table printed at the end of a demo run

use crate::core::styles::StyleRole;
use crate::queue::api::{CallResult, DrainReport, QueueError, QueueMessage, QueueResult};
use prettytable::{format, Cell, Row, Table};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The remote function returned a value
    Value(serde_json::Value),
    /// The remote function reported an error
    Failed(String),
    /// The engine stopped before a result arrived
    Cancelled,
}

impl Outcome {
    pub fn from_result<M: QueueMessage>(result: QueueResult<CallResult<M>>) -> Self {
        match result {
            Ok(result) => match result.error() {
                Some(error) => Outcome::Failed(error.to_string()),
                None => Outcome::Value(result.value().cloned().unwrap_or(serde_json::Value::Null)),
            },
            Err(QueueError::Cancelled { .. }) => Outcome::Cancelled,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Value(_) => "ok",
            Outcome::Failed(_) => "error",
            Outcome::Cancelled => "cancelled",
        }
    }

    fn role(&self) -> StyleRole {
        match self {
            Outcome::Value(_) => StyleRole::Success,
            Outcome::Failed(_) => StyleRole::Failure,
            Outcome::Cancelled => StyleRole::Cancelled,
        }
    }

    fn detail(&self) -> String {
        match self {
            Outcome::Value(value) => value.to_string(),
            Outcome::Failed(error) => error.clone(),
            Outcome::Cancelled => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRow {
    pub call_id: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub rows: Vec<CallRow>,
    pub drain: DrainReport,
    pub elapsed: Duration,
    pub invocations: usize,
    pub dropped: usize,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn count(&self, label: &str) -> usize {
        self.rows.iter().filter(|row| row.outcome.label() == label).count()
    }

    /// One row per call plus the column titles
    pub fn table(&self, color: bool) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(Row::new(
            ["Call", "Outcome", "Value / Error"]
                .iter()
                .map(|title| styled(title, StyleRole::Header, color))
                .collect(),
        ));
        for row in &self.rows {
            table.add_row(Row::new(vec![
                Cell::new(&row.call_id),
                styled(row.outcome.label(), row.outcome.role(), color),
                styled(&row.outcome.detail(), StyleRole::Value, color),
            ]));
        }
        table
    }

    /// Totals line printed under the table
    pub fn totals(&self, color: bool) -> String {
        let mut line = format!(
            "{} calls in {:.2?}: {} ok, {} error, {} cancelled; {} invocation(s), {} dropped and retried",
            self.rows.len(),
            self.elapsed,
            self.count("ok"),
            self.count("error"),
            self.count("cancelled"),
            self.invocations,
            self.dropped,
        );
        if self.interrupted {
            line.push_str(" (interrupted)");
        }
        StyleRole::Dim.paint(&line, color)
    }

    pub fn print(&self, color: bool) {
        let table = self.table(color);
        if let Err(e) = table.print_tty(color) {
            log::debug!("Falling back to plain table output: {}", e);
            print!("{}", table);
        }
        println!("{}", self.totals(color));
    }
}

fn styled(text: &str, role: StyleRole, color: bool) -> Cell {
    let cell = Cell::new(text);
    match role.to_prettytable_spec() {
        Some(spec) if color => cell.style_spec(&spec),
        _ => cell,
    }
}
