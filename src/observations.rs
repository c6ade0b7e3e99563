use crate::models::{EventRecord, ObservationEntry};

/// Noted events from both channels, newest first. Same-day entries fall
/// back to source order and then id, so the output never depends on input order.
pub fn merge_observations(events: &[EventRecord]) -> Vec<ObservationEntry> {
    let mut entries: Vec<ObservationEntry> = events
        .iter()
        .filter_map(|event| {
            let note = event.note.as_deref().filter(|note| !note.is_empty())?;
            let occurred_on = event.occurred_on?;
            Some(ObservationEntry {
                id: event.id,
                source: event.source,
                polarity: event.polarity,
                category: event.category.clone(),
                note: note.to_string(),
                occurred_on,
                multiplicity: event.multiplicity,
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.occurred_on
            .cmp(&a.occurred_on)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.id.cmp(&b.id))
    });
    entries
}
