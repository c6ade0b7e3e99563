use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Manager, ManagerId, Polarity, RawCallItem, RawCallReview, RawInputs, RawMessageCount,
    RawTextEvent,
};
use crate::period::{week_of_month, QueryPredicate};

const CALL_REVIEW_KIND: &str = "call";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn find_manager_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Manager> {
    let row = sqlx::query(
        "SELECT id, full_name, email FROM manager_scorecard.managers WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no manager registered with email {email}"))?;

    Ok(manager_from_row(&row))
}

pub async fn list_managers(pool: &PgPool) -> anyhow::Result<Vec<Manager>> {
    let rows = sqlx::query(
        "SELECT id, full_name, email FROM manager_scorecard.managers ORDER BY full_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(manager_from_row).collect())
}

fn manager_from_row(row: &PgRow) -> Manager {
    Manager {
        id: ManagerId(row.get("id")),
        full_name: row.get("full_name"),
        email: row.get("email"),
    }
}

/// Collects everything the engine needs for one manager and period. Each
/// query that fails is logged and treated as returning nothing.
pub async fn fetch_inputs(
    pool: &PgPool,
    manager: ManagerId,
    predicate: &QueryPredicate,
) -> RawInputs {
    let (messages, text_events, call_reviews) = tokio::join!(
        fetch_message_counts(pool, manager, predicate),
        fetch_text_events(pool, manager, predicate),
        fetch_call_reviews(pool, manager, predicate),
    );

    let messages = or_empty("message counts", manager, messages);
    let text_events = or_empty("text events", manager, text_events);
    let call_reviews = or_empty("call reviews", manager, call_reviews);

    let review_ids: Vec<Uuid> = call_reviews.iter().map(|review| review.id).collect();
    let call_items = or_empty(
        "call items",
        manager,
        fetch_call_items(pool, &review_ids).await,
    );

    debug!(
        %manager,
        messages = messages.len(),
        text_events = text_events.len(),
        call_reviews = call_reviews.len(),
        call_items = call_items.len(),
        "retrieved scorecard inputs"
    );

    RawInputs {
        messages,
        text_events,
        call_reviews,
        call_items,
    }
}

fn or_empty<T>(what: &str, manager: ManagerId, result: anyhow::Result<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|err| {
        warn!(%manager, error = %err, "failed to fetch {what}; continuing without them");
        Vec::new()
    })
}

pub async fn fetch_message_counts(
    pool: &PgPool,
    manager: ManagerId,
    predicate: &QueryPredicate,
) -> anyhow::Result<Vec<RawMessageCount>> {
    let rows = sqlx::query(
        "SELECT week, count FROM manager_scorecard.message_counts \
         WHERE manager_id = $1 AND month = $2 AND year = $3 \
         AND ($4::smallint IS NULL OR week = $4) \
         ORDER BY week",
    )
    .bind(manager.0)
    .bind(predicate.month as i32)
    .bind(predicate.year)
    .bind(predicate.week.map(i16::from))
    .fetch_all(pool)
    .await?;

    let mut counts = Vec::with_capacity(rows.len());
    for row in rows {
        let week: i16 = row.try_get("week")?;
        let count: i32 = row.try_get("count")?;
        counts.push(RawMessageCount {
            week: week_from_db(week),
            count: u32::try_from(count).unwrap_or(0),
        });
    }

    Ok(counts)
}

pub async fn fetch_text_events(
    pool: &PgPool,
    manager: ManagerId,
    predicate: &QueryPredicate,
) -> anyhow::Result<Vec<RawTextEvent>> {
    let rows = sqlx::query(
        "SELECT id, polarity, category, note, occurred_on, week, multiplicity \
         FROM manager_scorecard.text_events \
         WHERE manager_id = $1 AND month = $2 AND year = $3 \
         AND ($4::smallint IS NULL OR week = $4)",
    )
    .bind(manager.0)
    .bind(predicate.month as i32)
    .bind(predicate.year)
    .bind(predicate.week.map(i16::from))
    .fetch_all(pool)
    .await?;

    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.try_get("id")?;
        let Some(polarity) = polarity_from_db(id, row.try_get("polarity")?) else {
            continue;
        };
        let week: i16 = row.try_get("week")?;
        events.push(RawTextEvent {
            id,
            polarity,
            category: row.try_get("category")?,
            note: row.try_get("note")?,
            occurred_on: row.try_get("occurred_on")?,
            week: week_from_db(week),
            multiplicity: multiplicity_from_db(row.try_get("multiplicity")?),
        });
    }

    Ok(events)
}

/// Cancelled reviews are filtered here; the engine never sees them.
pub async fn fetch_call_reviews(
    pool: &PgPool,
    manager: ManagerId,
    predicate: &QueryPredicate,
) -> anyhow::Result<Vec<RawCallReview>> {
    let rows = sqlx::query(
        "SELECT id, occurred_on, week, is_cancelled FROM manager_scorecard.call_reviews \
         WHERE manager_id = $1 AND kind = $2 AND is_cancelled = FALSE \
         AND month = $3 AND year = $4 \
         AND ($5::smallint IS NULL OR week = $5)",
    )
    .bind(manager.0)
    .bind(CALL_REVIEW_KIND)
    .bind(predicate.month as i32)
    .bind(predicate.year)
    .bind(predicate.week.map(i16::from))
    .fetch_all(pool)
    .await?;

    let mut reviews = Vec::with_capacity(rows.len());
    for row in rows {
        let week: i16 = row.try_get("week")?;
        reviews.push(RawCallReview {
            id: row.try_get("id")?,
            occurred_on: row.try_get("occurred_on")?,
            week: week_from_db(week),
            is_cancelled: row.try_get("is_cancelled")?,
        });
    }

    Ok(reviews)
}

pub async fn fetch_call_items(
    pool: &PgPool,
    review_ids: &[Uuid],
) -> anyhow::Result<Vec<RawCallItem>> {
    if review_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        "SELECT id, review_id, polarity, category, note, multiplicity \
         FROM manager_scorecard.call_items WHERE review_id = ANY($1)",
    )
    .bind(review_ids)
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.try_get("id")?;
        let Some(polarity) = polarity_from_db(id, row.try_get("polarity")?) else {
            continue;
        };
        items.push(RawCallItem {
            id,
            review_id: row.try_get("review_id")?,
            polarity,
            category: row.try_get("category")?,
            note: row.try_get("note")?,
            multiplicity: multiplicity_from_db(row.try_get("multiplicity")?),
        });
    }

    Ok(items)
}

fn polarity_from_db(id: Uuid, value: String) -> Option<Polarity> {
    match value.parse() {
        Ok(polarity) => Some(polarity),
        Err(err) => {
            warn!(%id, error = %err, "skipping record with unreadable polarity");
            None
        }
    }
}

// Out-of-range weeks map to 0, which no weekly bucket claims.
fn week_from_db(week: i16) -> u8 {
    u8::try_from(week).unwrap_or(0)
}

fn multiplicity_from_db(value: Option<i32>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok()).filter(|v| *v > 0)
}

async fn upsert_manager(pool: &PgPool, full_name: &str, email: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO manager_scorecard.managers (id, full_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

struct NewTextEvent<'a> {
    manager_id: Uuid,
    polarity: Polarity,
    category: &'a str,
    note: Option<&'a str>,
    occurred_on: NaiveDate,
    week: u8,
    multiplicity: Option<u32>,
    source_key: &'a str,
}

async fn insert_text_event(pool: &PgPool, event: NewTextEvent<'_>) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO manager_scorecard.text_events
        (id, manager_id, polarity, category, note, occurred_on, year, month, week, multiplicity, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event.manager_id)
    .bind(event.polarity.to_string())
    .bind(event.category)
    .bind(event.note)
    .bind(event.occurred_on)
    .bind(event.occurred_on.year())
    .bind(event.occurred_on.month() as i32)
    .bind(i16::from(event.week))
    .bind(event.multiplicity.map(|v| v as i32))
    .bind(event.source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let managers = vec![
        ("Marina Costa", "marina.costa@example.com"),
        ("Rafael Nunes", "rafael.nunes@example.com"),
        ("Helena Prado", "helena.prado@example.com"),
    ];

    let mut ids = Vec::new();
    for (name, email) in managers {
        ids.push(upsert_manager(pool, name, email).await?);
    }

    let weekly_messages: [(usize, u8, i32); 7] = [
        (0, 1, 42),
        (0, 2, 38),
        (0, 3, 51),
        (1, 1, 27),
        (1, 2, 33),
        (2, 2, 19),
        (2, 4, 24),
    ];

    for (manager, week, count) in weekly_messages {
        sqlx::query(
            r#"
            INSERT INTO manager_scorecard.message_counts (id, manager_id, year, month, week, count)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (manager_id, year, month, week) DO UPDATE
            SET count = EXCLUDED.count
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ids[manager])
        .bind(2026_i32)
        .bind(2_i32)
        .bind(i16::from(week))
        .bind(count)
        .execute(pool)
        .await?;
    }

    let text_events = vec![
        (
            0,
            Polarity::Negative,
            "response time",
            Some("Left a client waiting over an hour"),
            3,
            Some(2),
            "seed-text-001",
        ),
        (
            0,
            Polarity::Positive,
            "tone",
            Some("Handled an upset client calmly"),
            10,
            None,
            "seed-text-002",
        ),
        (
            1,
            Polarity::Negative,
            "follow-up",
            None,
            5,
            Some(1),
            "seed-text-003",
        ),
        (
            2,
            Polarity::Negative,
            "response time",
            Some("Missed two callbacks"),
            24,
            Some(3),
            "seed-text-004",
        ),
    ];

    for (manager, polarity, category, note, day, multiplicity, source_key) in text_events {
        let occurred_on = NaiveDate::from_ymd_opt(2026, 2, day).context("invalid date")?;
        insert_text_event(
            pool,
            NewTextEvent {
                manager_id: ids[manager],
                polarity,
                category,
                note,
                occurred_on,
                week: week_of_month(occurred_on),
                multiplicity,
                source_key,
            },
        )
        .await?;
    }

    let reviews = vec![
        (
            0,
            4,
            false,
            "seed-call-001",
            vec![(
                Polarity::Positive,
                "greeting",
                Some("Clear opening and identification"),
            )],
        ),
        (
            0,
            12,
            true,
            "seed-call-002",
            vec![(
                Polarity::Negative,
                "script",
                Some("Review cancelled before scoring"),
            )],
        ),
        (
            1,
            9,
            false,
            "seed-call-003",
            vec![
                (
                    Polarity::Negative,
                    "script",
                    Some("Skipped the verification step"),
                ),
                (Polarity::Positive, "closing", None),
            ],
        ),
        (
            2,
            17,
            false,
            "seed-call-004",
            vec![(
                Polarity::Positive,
                "empathy",
                Some("Good rapport with a first-time client"),
            )],
        ),
    ];

    for (manager, day, is_cancelled, source_key, items) in reviews {
        let occurred_on = NaiveDate::from_ymd_opt(2026, 2, day).context("invalid date")?;
        let review_id: Option<Uuid> = sqlx::query(
            r#"
            INSERT INTO manager_scorecard.call_reviews
            (id, manager_id, kind, is_cancelled, occurred_on, year, month, week, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ids[manager])
        .bind(CALL_REVIEW_KIND)
        .bind(is_cancelled)
        .bind(occurred_on)
        .bind(occurred_on.year())
        .bind(occurred_on.month() as i32)
        .bind(i16::from(week_of_month(occurred_on)))
        .bind(source_key)
        .fetch_optional(pool)
        .await?
        .map(|row| row.get("id"));

        // Already seeded on an earlier run.
        let Some(review_id) = review_id else {
            continue;
        };

        for (polarity, category, note) in items {
            sqlx::query(
                r#"
                INSERT INTO manager_scorecard.call_items
                (id, review_id, polarity, category, note, multiplicity)
                VALUES ($1, $2, $3, $4, $5, NULL)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(review_id)
            .bind(polarity.to_string())
            .bind(category)
            .bind(note)
            .execute(pool)
            .await?;
        }
    }

    info!(managers = ids.len(), "seed data loaded");
    Ok(())
}

/// Loads text-channel events from CSV. Rows without a `week` column value are
/// placed by their date.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        polarity: String,
        category: String,
        note: Option<String>,
        occurred_on: NaiveDate,
        week: Option<u8>,
        multiplicity: Option<u32>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV record {}", line + 1))?;
        let polarity: Polarity = row
            .polarity
            .parse()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("invalid CSV record {}", line + 1))?;
        let manager_id = upsert_manager(pool, &row.full_name, &row.email).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let added = insert_text_event(
            pool,
            NewTextEvent {
                manager_id,
                polarity,
                category: &row.category,
                note: row.note.as_deref(),
                occurred_on: row.occurred_on,
                week: row.week.unwrap_or_else(|| week_of_month(row.occurred_on)),
                multiplicity: row.multiplicity,
                source_key: &source_key,
            },
        )
        .await?;

        if added {
            inserted += 1;
        } else {
            debug!(source_key = %source_key, "skipping already imported event");
        }
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_polarity_is_skipped() {
        assert_eq!(
            polarity_from_db(Uuid::new_v4(), "Negative".to_string()),
            Some(Polarity::Negative)
        );
        assert_eq!(polarity_from_db(Uuid::new_v4(), "neutral".to_string()), None);
    }

    #[test]
    fn stored_multiplicity_falls_back_when_unusable() {
        assert_eq!(multiplicity_from_db(Some(3)), Some(3));
        assert_eq!(multiplicity_from_db(None), None);
        assert_eq!(multiplicity_from_db(Some(0)), None);
        assert_eq!(multiplicity_from_db(Some(-2)), None);
    }

    #[test]
    fn stored_week_outside_u8_is_unbucketable() {
        assert_eq!(week_from_db(3), 3);
        assert_eq!(week_from_db(-1), 0);
        assert_eq!(week_from_db(300), 0);
    }

    #[test]
    fn failed_fetch_degrades_to_empty() {
        let manager = ManagerId(Uuid::new_v4());
        let failed: anyhow::Result<Vec<RawMessageCount>> = Err(anyhow::anyhow!("connection reset"));
        assert!(or_empty("message counts", manager, failed).is_empty());

        let fetched = Ok(vec![RawMessageCount { week: 1, count: 4 }]);
        assert_eq!(or_empty("message counts", manager, fetched).len(), 1);
    }
}
