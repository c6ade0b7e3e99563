use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    EventRecord, RawCallItem, RawCallReview, RawMessageCount, RawTextEvent, Source,
};

/// Folds both observation channels into one `EventRecord` stream. Call items
/// take their date and week from their parent review; orphans keep both unset.
pub fn normalize(
    messages: Vec<RawMessageCount>,
    text_events: Vec<RawTextEvent>,
    call_reviews: Vec<RawCallReview>,
    call_items: Vec<RawCallItem>,
) -> (Vec<RawMessageCount>, Vec<EventRecord>) {
    let reviews: HashMap<Uuid, RawCallReview> = call_reviews
        .into_iter()
        .inspect(|review| {
            if review.is_cancelled {
                warn!(review = %review.id, "cancelled call review was not filtered by retrieval");
            }
        })
        .map(|review| (review.id, review))
        .collect();

    let mut events = Vec::with_capacity(text_events.len() + call_items.len());

    for event in text_events {
        events.push(EventRecord {
            id: event.id,
            source: Source::TextChannel,
            polarity: event.polarity,
            category: event.category,
            note: clean_note(event.note),
            occurred_on: Some(event.occurred_on),
            week: Some(event.week),
            multiplicity: event.multiplicity.unwrap_or(1),
        });
    }

    for item in call_items {
        let parent = reviews.get(&item.review_id);
        events.push(EventRecord {
            id: item.id,
            source: Source::CallReview,
            polarity: item.polarity,
            category: item.category,
            note: clean_note(item.note),
            occurred_on: parent.map(|review| review.occurred_on),
            week: parent.map(|review| review.week),
            multiplicity: item.multiplicity.unwrap_or(1),
        });
    }

    let orphans = events.iter().filter(|event| !event.is_bucketable()).count();
    if orphans > 0 {
        debug!(orphans, "call items without a matching review cannot be dated");
    }

    (messages, events)
}

fn clean_note(note: Option<String>) -> Option<String> {
    note.map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
