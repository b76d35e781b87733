//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "binary"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Full-screen terminal monitor and keyboard command source."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::io::{self, Stdout};

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Row, Table};
use ratatui::{Frame, Terminal};
use replmgr_core::{DisplayError, EventSource, OperatorEvent, TermLog, TopologyDisplay, TERM_LOG_LINES};
use replmgr_topology::{NodeSnapshot, NodeState, TopologySnapshot};
use tracing::{debug, warn};

type Screen = Terminal<CrosstermBackend<Stdout>>;

/// Alternate-screen view of the topology with the operator log underneath.
pub struct TerminalDisplay {
    terminal: Option<Screen>,
    banner: String,
    log: TermLog,
    last: Option<TopologySnapshot>,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self {
            terminal: None,
            banner: String::new(),
            log: TermLog::default(),
            last: None,
        }
    }

    fn redraw(&mut self) -> Result<(), DisplayError> {
        let Self {
            terminal,
            banner,
            log,
            last,
        } = self;
        if let Some(terminal) = terminal.as_mut() {
            terminal.draw(|frame| draw_ui(frame, banner, last.as_ref(), log))?;
        }
        Ok(())
    }
}

impl TopologyDisplay for TerminalDisplay {
    fn open(&mut self, banner: &str) -> Result<(), DisplayError> {
        if self.terminal.is_some() {
            return Ok(());
        }
        enable_raw_mode().map_err(|err| DisplayError::Init(err.to_string()))?;
        let mut stdout = io::stdout();
        if let Err(err) = crossterm::execute!(stdout, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(DisplayError::Init(err.to_string()));
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))
            .map_err(|err| DisplayError::Init(err.to_string()))?;
        self.terminal = Some(terminal);
        self.banner = banner.to_owned();
        self.redraw()
    }

    fn append_log_line(&mut self, line: String) {
        self.log.push(line);
        if let Err(err) = self.redraw() {
            warn!(error = %err, "failed to draw log line");
        }
    }

    fn render(&mut self, snapshot: &TopologySnapshot) -> Result<(), DisplayError> {
        self.last = Some(snapshot.clone());
        self.redraw()
    }

    fn resync(&mut self) -> Result<(), DisplayError> {
        if let Some(terminal) = self.terminal.as_mut() {
            terminal.clear()?;
        }
        self.redraw()
    }

    fn close(&mut self) {
        if let Some(mut terminal) = self.terminal.take() {
            if let Err(err) = cleanup_terminal(&mut terminal) {
                warn!(error = %err, "failed to restore terminal");
            }
        }
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        self.close();
    }
}

fn cleanup_terminal(terminal: &mut Screen) -> io::Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, Show)?;
    terminal.show_cursor()?;
    Ok(())
}

fn draw_ui(frame: &mut Frame, banner: &str, snapshot: Option<&TopologySnapshot>, log: &TermLog) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(TERM_LOG_LINES as u16 + 2),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let master = snapshot.and_then(TopologySnapshot::master_node);
    let header = Paragraph::new(master_line(master)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                banner.to_owned(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
    );
    frame.render_widget(header, chunks[0]);

    let rows: Vec<Row> = snapshot
        .map(|snapshot| snapshot.slaves().map(slave_row).collect())
        .unwrap_or_default();
    let table = Table::new(
        rows,
        [
            Constraint::Length(22),
            Constraint::Length(11),
            Constraint::Length(10),
            Constraint::Length(18),
            Constraint::Length(11),
            Constraint::Length(22),
            Constraint::Length(7),
            Constraint::Length(4),
        ],
    )
    .header(
        Row::new(vec![
            "Slave", "State", "Server Id", "Master", "Using GTID", "GTID", "Delay", "RO",
        ])
        .style(Style::default().fg(Color::Yellow)),
    )
    .block(Block::default().borders(Borders::ALL).title("Slaves"));
    frame.render_widget(table, chunks[1]);

    let items: Vec<ListItem> = log.lines().map(|line| ListItem::new(line.to_owned())).collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Log"));
    frame.render_widget(list, chunks[2]);

    let help = Paragraph::new(Line::from(vec![
        Span::styled("Ctrl-Q", Style::default().fg(Color::Cyan)),
        Span::raw(" quit  "),
        Span::styled("Ctrl-S", Style::default().fg(Color::Cyan)),
        Span::raw(" switchover  "),
        Span::styled("Ctrl-F", Style::default().fg(Color::Cyan)),
        Span::raw(" failover  "),
        Span::styled("s", Style::default().fg(Color::Cyan)),
        Span::raw(" resync"),
    ]));
    frame.render_widget(help, chunks[3]);
}

fn master_line(master: Option<&NodeSnapshot>) -> Line<'static> {
    let Some(master) = master else {
        return Line::from("Master: none");
    };
    Line::from(vec![
        Span::raw(format!("Master: {}  ", master.url)),
        Span::styled(master.state.to_string(), state_style(master.state)),
        Span::raw(format!(
            "  GTID {}  RO {}",
            master.gtid_current_pos.as_deref().unwrap_or("-"),
            yes_no(master.read_only)
        )),
    ])
}

fn slave_row(node: &NodeSnapshot) -> Row<'static> {
    Row::new(vec![
        node.url.clone(),
        node.state.to_string(),
        node.server_id.to_string(),
        node.master_host.clone(),
        node.using_gtid.clone().unwrap_or_else(|| "No".to_owned()),
        node.gtid_current_pos.clone().unwrap_or_else(|| "-".to_owned()),
        node.seconds_behind_master
            .map(|delay| delay.to_string())
            .unwrap_or_else(|| "NULL".to_owned()),
        yes_no(node.read_only).to_owned(),
    ])
    .style(state_style(node.state))
}

fn state_style(state: NodeState) -> Style {
    match state {
        NodeState::Master => Style::default().fg(Color::Green),
        NodeState::Slave => Style::default(),
        NodeState::Unconnected => Style::default().fg(Color::Yellow),
        NodeState::Failed => Style::default().fg(Color::Red),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

/// Reads key presses from the terminal and turns the bound ones into commands.
#[derive(Debug, Default)]
pub struct KeyboardEvents;

impl EventSource for KeyboardEvents {
    fn next_event(&mut self) -> Option<OperatorEvent> {
        loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if let Some(command) = map_key(key) {
                        return Some(command);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(error = %err, "terminal input closed");
                    return None;
                }
            }
        }
    }
}

fn map_key(key: KeyEvent) -> Option<OperatorEvent> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('s') if ctrl => Some(OperatorEvent::Switchover),
        KeyCode::Char('f') if ctrl => Some(OperatorEvent::Failover),
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => Some(OperatorEvent::Quit),
        KeyCode::Char('s') => Some(OperatorEvent::Resync),
        _ => None,
    }
}
