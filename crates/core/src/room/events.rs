//! Event log and timeline (spec §4.2.8).

use tracing::debug;

use super::{append_event as append_event_inner, broadcast_frame, next_ts, now_ms, Room};
use crate::model::{Event, Pulse, TimelineEntry, PULSE_STALE_MS};
use crate::protocol::Frame;
use crate::storage::{keys, StorageExt};
use crate::Result;

const EVENT_LOG_LIMIT: usize = 500;
const TIMELINE_LIMIT: usize = 200;

impl Room {
    /// Appends a freeform event and re-broadcasts it verbatim as a generic
    /// `event` frame — the path the raw WS `event` kind and the GitHub
    /// webhook ingest both funnel through (spec §4.2.9, §4.2.10). Commands
    /// with their own specific frame (leader_changed, task_claimed, ...)
    /// append events without going through this broadcast.
    pub async fn ingest_event(&self, event_type: &str, payload: serde_json::Value) -> Result<Event> {
        let mut inner = self.inner.lock().await;
        let ts = next_ts(&mut inner);
        let event = append_event_inner(&inner.store, ts, event_type, payload).await?;
        broadcast_frame(
            &self.tx,
            Frame::Event {
                ts,
                event_type: event.event_type.clone(),
            },
        );
        debug!(event_type, "event ingested");
        Ok(event)
    }

    /// Chat isn't persisted beyond the rolling event log (spec §1
    /// Non-goals) — it's just another event type that also gets a
    /// dedicated `chat` frame so clients don't have to special-case it.
    pub async fn broadcast_chat(
        &self,
        agent: Option<&str>,
        message: &str,
        channel: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let ts = next_ts(&mut inner);
        append_event_inner(
            &inner.store,
            ts,
            "chat",
            serde_json::json!({ "message": message, "channel": channel, "agent": agent }),
        )
        .await?;
        broadcast_frame(
            &self.tx,
            Frame::Chat {
                ts,
                message: message.to_string(),
                channel: channel.map(str::to_string),
                agent: agent.map(str::to_string),
            },
        );
        debug!(agent = ?agent, channel = ?channel, "chat broadcast");
        Ok(())
    }

    /// Newest 500 events, ascending by `ts` (spec §3).
    pub async fn get_events(&self) -> Result<Vec<Event>> {
        let inner = self.inner.lock().await;
        let rows: Vec<(String, Event)> = inner.store.list_prefix(keys::EVENT_PREFIX).await?;
        let mut events: Vec<Event> = rows.into_iter().map(|(_, event)| event).collect();
        if events.len() > EVENT_LOG_LIMIT {
            let cut = events.len() - EVENT_LOG_LIMIT;
            events.drain(0..cut);
        }
        Ok(events)
    }

    /// Merge of the event log with live (non-stale) pulses, newest 200 by
    /// `ts` (spec §4.2.7/§4.2.8).
    pub async fn get_timeline(&self) -> Result<Vec<TimelineEntry>> {
        let inner = self.inner.lock().await;
        let now = now_ms();

        let event_rows: Vec<(String, Event)> = inner.store.list_prefix(keys::EVENT_PREFIX).await?;
        let pulse_rows: Vec<(String, Pulse)> = inner.store.list_prefix(keys::PULSE_PREFIX).await?;

        let mut entries: Vec<TimelineEntry> = event_rows
            .into_iter()
            .map(|(_, event)| TimelineEntry::Event {
                ts: event.ts,
                id: event.id,
                event_type: event.event_type,
                payload: event.payload,
            })
            .collect();

        entries.extend(
            pulse_rows
                .into_iter()
                .map(|(_, pulse)| pulse)
                .filter(|pulse| now - pulse.last_update <= PULSE_STALE_MS)
                .map(|pulse| TimelineEntry::Pulse {
                    ts: pulse.last_update,
                    agent: pulse.agent,
                    status: pulse.status,
                    current_file: pulse.current_file,
                    current_task: pulse.current_task,
                }),
        );

        entries.sort_by_key(TimelineEntry::ts);
        if entries.len() > TIMELINE_LIMIT {
            let cut = entries.len() - TIMELINE_LIMIT;
            entries.drain(0..cut);
        }
        Ok(entries)
    }
}
