//! The two steps of the state machine.
//!
//! Each step has a blocking and an async entry point sharing one `prepare`
//! routine, so limit checks, cache keys and outcome classification are the
//! same in every execution mode.

pub(crate) mod reasoning;
pub(crate) mod tools;

use crate::stream_event::AgentEvent;
use tokio::sync::mpsc;

/// Forward an event to a streaming consumer, if any. A closed receiver is ignored here.
pub(crate) async fn emit(events: Option<&mpsc::Sender<AgentEvent>>, event: AgentEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
