//! Lifecycle event emission mirroring condition transitions (spec.md
//! §6.3 "the operator itself emits lifecycle events on the platform
//! event stream mirroring condition transitions").
use kube::runtime::events::{Event, EventType, Recorder};

pub async fn emit(recorder: &Recorder, action: &str, reason: &str, note: impl Into<String>) -> Result<(), kube::Error> {
    recorder
        .publish(&Event {
            type_: EventType::Normal,
            reason: reason.to_string(),
            note: Some(note.into()),
            action: action.to_string(),
            secondary: None,
        })
        .await
}

pub async fn emit_warning(recorder: &Recorder, action: &str, reason: &str, note: impl Into<String>) -> Result<(), kube::Error> {
    recorder
        .publish(&Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(note.into()),
            action: action.to_string(),
            secondary: None,
        })
        .await
}
