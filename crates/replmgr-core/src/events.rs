//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Operator commands and the background event pump."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::debug;

/// A command issued by the operator while the monitor is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorEvent {
    Switchover,
    /// Fail over and leave the monitor.
    Failover,
    Quit,
    /// Redraw the screen.
    Resync,
}

/// Blocking producer of operator events, e.g. a keyboard reader.
pub trait EventSource: Send + 'static {
    /// Wait for the next event. `None` ends the stream.
    fn next_event(&mut self) -> Option<OperatorEvent>;
}

/// Run `source` on its own thread and forward events through a capacity-1
/// channel.
///
/// The producer blocks until the previous event has been taken, so events are
/// delivered in order and never more than one is in flight. The thread ends
/// when the source is exhausted or the receiver is dropped; a source blocked
/// in `next_event` only notices the latter after its next event.
pub fn spawn_event_pump<S: EventSource>(
    mut source: S,
) -> (mpsc::Receiver<OperatorEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1);
    let handle = thread::spawn(move || {
        while let Some(event) = source.next_event() {
            if tx.blocking_send(event).is_err() {
                debug!("event receiver dropped; stopping pump");
                return;
            }
        }
        debug!("event source exhausted");
    });
    (rx, handle)
}
