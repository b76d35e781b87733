//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Display contract, log ring buffer, and headless display."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::collections::VecDeque;

use chrono::Local;
use replmgr_topology::TopologySnapshot;
use tracing::{debug, info};

use crate::error::DisplayError;

/// Lines kept by the operator log under the topology table.
pub const TERM_LOG_LINES: usize = 20;

/// Surface the orchestrator renders to.
///
/// `render` is called on every tick and blocks the control loop while it runs.
pub trait TopologyDisplay: Send {
    /// Take over the output device. Failure here aborts the run.
    fn open(&mut self, banner: &str) -> Result<(), DisplayError>;

    fn append_log_line(&mut self, line: String);

    fn render(&mut self, snapshot: &TopologySnapshot) -> Result<(), DisplayError>;

    /// Redraw from scratch without a topology change.
    fn resync(&mut self) -> Result<(), DisplayError>;

    /// Give the output device back. Must be safe to call when not open.
    fn close(&mut self);
}

/// Fixed-size, timestamped operator log. Oldest lines fall off the front.
#[derive(Debug, Clone)]
pub struct TermLog {
    lines: VecDeque<String>,
    capacity: usize,
}

impl TermLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl AsRef<str>) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        let stamp = Local::now().format("%Y/%m/%d %H:%M:%S");
        self.lines.push_back(format!("{stamp} {}", line.as_ref()));
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for TermLog {
    fn default() -> Self {
        Self::new(TERM_LOG_LINES)
    }
}

/// Display that writes everything to the tracing pipeline instead of a terminal.
#[derive(Debug, Default)]
pub struct LogDisplay {
    log: TermLog,
    last: Option<TopologySnapshot>,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &TermLog {
        &self.log
    }
}

impl TopologyDisplay for LogDisplay {
    fn open(&mut self, banner: &str) -> Result<(), DisplayError> {
        info!(banner, "headless monitor started");
        Ok(())
    }

    fn append_log_line(&mut self, line: String) {
        info!(target: "replmgr::console", "{line}");
        self.log.push(line);
    }

    fn render(&mut self, snapshot: &TopologySnapshot) -> Result<(), DisplayError> {
        // only log topology changes, the tick rate would flood the file otherwise
        if self.last.as_ref() == Some(snapshot) {
            return Ok(());
        }
        let rendered = serde_json::to_string(snapshot).unwrap_or_default();
        info!(
            master = snapshot.master.as_deref().unwrap_or("none"),
            slaves = snapshot.slaves().count(),
            topology = %rendered,
            "topology changed"
        );
        self.last = Some(snapshot.clone());
        Ok(())
    }

    fn resync(&mut self) -> Result<(), DisplayError> {
        debug!("resync requested");
        self.last = None;
        Ok(())
    }

    fn close(&mut self) {
        debug!("headless monitor closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_log_keeps_last_lines() {
        let mut log = TermLog::new(3);
        for index in 0..5 {
            log.push(format!("line {index}"));
        }
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("line 2"));
        assert!(lines[2].ends_with("line 4"));
    }

    #[test]
    fn default_capacity_is_twenty() {
        let mut log = TermLog::default();
        for index in 0..25 {
            log.push(index.to_string());
        }
        assert_eq!(log.len(), TERM_LOG_LINES);
    }

    #[test]
    fn log_display_records_lines() {
        let mut display = LogDisplay::new();
        display.open("replmgr test").unwrap();
        display.append_log_line("Monitor started in failover mode".into());
        let snapshot = TopologySnapshot {
            master: None,
            nodes: Vec::new(),
        };
        display.render(&snapshot).unwrap();
        display.render(&snapshot).unwrap();
        display.resync().unwrap();
        display.close();
        assert_eq!(display.log().len(), 1);
    }
}
