use tracing::debug;

use crate::models::{
    EventRecord, Manager, ManagerPeriodStats, ManagerScorecard, Polarity, RankedManager,
    RawInputs, RawMessageCount, WeeklyBucket,
};
use crate::normalize;
use crate::observations;

/// Reporting weeks assumed for every month, whatever the calendar says.
pub const WEEKS_PER_MONTH: u8 = 5;

/// Score counts messages and subtracts negative events. Positive events are
/// tallied but never raise the score.
pub fn score(messages: u64, negative: u64) -> i64 {
    messages as i64 - negative as i64
}

pub fn aggregate(messages: &[RawMessageCount], events: &[EventRecord]) -> ManagerPeriodStats {
    let total_messages: u64 = messages.iter().map(|entry| u64::from(entry.count)).sum();
    let (total_positive, total_negative) = polarity_totals(events.iter());

    ManagerPeriodStats {
        total_messages,
        total_positive,
        total_negative,
        score: score(total_messages, total_negative),
    }
}

/// Per-week slices for weeks 1..=`WEEKS_PER_MONTH`, skipping weeks with no
/// activity. Undated events only count toward period totals.
pub fn build_weekly_history(
    messages: &[RawMessageCount],
    events: &[EventRecord],
) -> Vec<WeeklyBucket> {
    (1..=WEEKS_PER_MONTH)
        .filter_map(|week| {
            let week_messages: u64 = messages
                .iter()
                .filter(|entry| entry.week == week)
                .map(|entry| u64::from(entry.count))
                .sum();
            let (positive, negative) =
                polarity_totals(events.iter().filter(|event| event.week == Some(week)));

            if week_messages == 0 && positive == 0 && negative == 0 {
                return None;
            }

            Some(WeeklyBucket {
                week,
                messages: week_messages,
                positive,
                negative,
                score: score(week_messages, negative),
            })
        })
        .collect()
}

fn polarity_totals<'a>(events: impl Iterator<Item = &'a EventRecord>) -> (u64, u64) {
    events.fold((0, 0), |(positive, negative), event| {
        let weight = u64::from(event.multiplicity);
        match event.polarity {
            Polarity::Positive => (positive + weight, negative),
            Polarity::Negative => (positive, negative + weight),
        }
    })
}

/// Runs the whole engine over one manager's retrieved inputs.
pub fn compute_scorecard(inputs: RawInputs) -> ManagerScorecard {
    let (messages, events) = normalize::normalize(
        inputs.messages,
        inputs.text_events,
        inputs.call_reviews,
        inputs.call_items,
    );

    let stats = aggregate(&messages, &events);
    let weekly = build_weekly_history(&messages, &events);
    let observations = observations::merge_observations(&events);

    debug!(
        events = events.len(),
        weeks = weekly.len(),
        observations = observations.len(),
        score = stats.score,
        "scorecard computed"
    );

    ManagerScorecard {
        stats,
        weekly,
        observations,
    }
}

/// Leaderboard order: higher score first, then fewer negatives, then name.
pub fn rank_managers(mut entries: Vec<(Manager, ManagerPeriodStats)>) -> Vec<RankedManager> {
    entries.sort_by(|(a_manager, a), (b_manager, b)| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.total_negative.cmp(&b.total_negative))
            .then_with(|| a_manager.full_name.cmp(&b_manager.full_name))
            .then_with(|| a_manager.email.cmp(&b_manager.email))
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(index, (manager, stats))| RankedManager {
            position: index + 1,
            manager_name: manager.full_name,
            manager_email: manager.email,
            stats,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManagerId, RawCallItem, RawCallReview, RawTextEvent, Source};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn event(week: Option<u8>, polarity: Polarity, multiplicity: u32) -> EventRecord {
        EventRecord {
            id: Uuid::new_v4(),
            source: Source::TextChannel,
            polarity,
            category: "tone".to_string(),
            note: None,
            occurred_on: week.map(|_| date(4)),
            week,
            multiplicity,
        }
    }

    fn manager(name: &str) -> Manager {
        Manager {
            id: ManagerId(Uuid::new_v4()),
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        }
    }

    fn stats(messages: u64, negative: u64) -> ManagerPeriodStats {
        ManagerPeriodStats {
            total_messages: messages,
            total_positive: 0,
            total_negative: negative,
            score: score(messages, negative),
        }
    }

    fn scenario() -> RawInputs {
        let review_id = Uuid::new_v4();
        RawInputs {
            messages: vec![
                RawMessageCount { week: 1, count: 10 },
                RawMessageCount { week: 2, count: 5 },
            ],
            text_events: vec![RawTextEvent {
                id: Uuid::new_v4(),
                polarity: Polarity::Negative,
                category: "delay".to_string(),
                note: None,
                occurred_on: date(5),
                week: 1,
                multiplicity: Some(2),
            }],
            call_reviews: vec![RawCallReview {
                id: review_id,
                occurred_on: date(4),
                week: 1,
                is_cancelled: false,
            }],
            call_items: vec![RawCallItem {
                id: Uuid::new_v4(),
                review_id,
                polarity: Polarity::Positive,
                category: "service".to_string(),
                note: Some("bom atendimento".to_string()),
                multiplicity: Some(1),
            }],
        }
    }

    #[test]
    fn empty_inputs_produce_zeroed_scorecard() {
        let scorecard = compute_scorecard(RawInputs::default());
        assert_eq!(scorecard.stats, ManagerPeriodStats::default());
        assert!(scorecard.weekly.is_empty());
        assert!(scorecard.observations.is_empty());
    }

    #[test]
    fn score_ignores_positive_events() {
        let messages = vec![RawMessageCount { week: 1, count: 4 }];
        let events = vec![
            event(Some(1), Polarity::Positive, 10),
            event(Some(1), Polarity::Negative, 3),
        ];

        let stats = aggregate(&messages, &events);
        assert_eq!(stats.total_positive, 10);
        assert_eq!(stats.total_negative, 3);
        assert_eq!(stats.score, 1);
    }

    #[test]
    fn score_can_go_negative() {
        let stats = aggregate(&[], &[event(Some(2), Polarity::Negative, 3)]);
        assert_eq!(stats.score, -3);
    }

    #[test]
    fn mixed_sources_match_expected_totals() {
        let scorecard = compute_scorecard(scenario());

        assert_eq!(
            scorecard.stats,
            ManagerPeriodStats {
                total_messages: 15,
                total_positive: 1,
                total_negative: 2,
                score: 13,
            }
        );
        assert_eq!(
            scorecard.weekly,
            vec![
                WeeklyBucket {
                    week: 1,
                    messages: 10,
                    positive: 1,
                    negative: 2,
                    score: 8,
                },
                WeeklyBucket {
                    week: 2,
                    messages: 5,
                    positive: 0,
                    negative: 0,
                    score: 5,
                },
            ]
        );
        assert_eq!(scorecard.observations.len(), 1);
        assert_eq!(scorecard.observations[0].note, "bom atendimento");
        assert_eq!(scorecard.observations[0].category, "service");
        assert_eq!(scorecard.observations[0].occurred_on, date(4));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let inputs = scenario();
        let first = compute_scorecard(inputs.clone());
        let second = compute_scorecard(inputs);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn orphan_items_count_in_totals_only() {
        let mut inputs = scenario();
        inputs.call_items.push(RawCallItem {
            id: Uuid::new_v4(),
            review_id: Uuid::new_v4(),
            polarity: Polarity::Negative,
            category: "script".to_string(),
            note: Some("no greeting".to_string()),
            multiplicity: Some(4),
        });

        let scorecard = compute_scorecard(inputs);
        assert_eq!(scorecard.stats.total_negative, 6);
        assert_eq!(scorecard.stats.score, 9);
        let weekly_negative: u64 = scorecard.weekly.iter().map(|bucket| bucket.negative).sum();
        assert_eq!(weekly_negative, 2);
        assert!(scorecard
            .observations
            .iter()
            .all(|entry| entry.note != "no greeting"));
    }

    #[test]
    fn weekly_history_is_sparse_and_ascending() {
        let messages = vec![
            RawMessageCount { week: 4, count: 3 },
            RawMessageCount { week: 2, count: 0 },
        ];
        let events = vec![event(Some(5), Polarity::Positive, 1)];

        let weeks: Vec<u8> = build_weekly_history(&messages, &events)
            .iter()
            .map(|bucket| bucket.week)
            .collect();
        assert_eq!(weeks, vec![4, 5]);
    }

    #[test]
    fn weekly_messages_never_exceed_period_total() {
        let messages = vec![
            RawMessageCount { week: 1, count: 2 },
            RawMessageCount { week: 3, count: 6 },
            RawMessageCount { week: 5, count: 1 },
        ];
        let stats = aggregate(&messages, &[]);
        let weekly = build_weekly_history(&messages, &[]);
        let weekly_total: u64 = weekly.iter().map(|bucket| bucket.messages).sum();
        assert_eq!(weekly_total, stats.total_messages);
    }

    #[test]
    fn weeks_outside_the_fixed_range_are_not_bucketed() {
        let messages = vec![RawMessageCount { week: 6, count: 9 }];
        let weekly = build_weekly_history(&messages, &[]);
        assert!(weekly.is_empty());
        assert_eq!(aggregate(&messages, &[]).total_messages, 9);
    }

    #[test]
    fn ranking_orders_by_score_then_negatives_then_name() {
        let ranked = rank_managers(vec![
            (manager("Caio Lima"), stats(10, 2)),
            (manager("Bruna Reis"), stats(12, 4)),
            (manager("Ana Souza"), stats(20, 12)),
            (manager("Davi Melo"), stats(30, 10)),
        ]);

        let order: Vec<&str> = ranked.iter().map(|entry| entry.manager_name.as_str()).collect();
        assert_eq!(order, vec!["Davi Melo", "Caio Lima", "Bruna Reis", "Ana Souza"]);
        assert_eq!(ranked[0].position, 1);
        assert_eq!(ranked[3].position, 4);
    }
}
