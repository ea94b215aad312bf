//! Timeline derivation
//!
//! Maps a [`Meal`] to the ordered list of absolute alert events for a cooking
//! run. Every dish is scheduled backward from the same serve instant:
//!
//! ```text
//! dish_start = serve - sum(stage durations)
//! stage[i].start = dish_start + sum(durations of stages before i)
//! stage[i].end   = stage[i].start + stage[i].duration
//! ```
//!
//! Derivation is pure: the same meal always yields the same events (ids
//! included), which lets a session recognise already-fired events after a
//! restart.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, Local, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Meal;
use crate::time;

/// Whether an event marks entering or leaving a stage
///
/// Variant order is the tie-break order for simultaneous events: a stage
/// ending sorts before the next one starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    End,
    Start,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::End => "end",
        }
    }

    /// Upper-case label used in titles ("START" / "END")
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Start => "START",
            EventKind::End => "END",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One derived alert
///
/// Dish and stage names are copied at derivation time so an event stays
/// displayable even if the meal is edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// `"{stage_id}:{type}@{when_epoch_ms}"`
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub when: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub dish: String,
    pub stage: String,
    pub notes: String,
    pub duration_min: u32,
}

impl TimelineEvent {
    /// Deterministic event id
    pub fn make_id(stage_id: &str, kind: EventKind, when: DateTime<Utc>) -> String {
        format!("{}:{}@{}", stage_id, kind, when.timestamp_millis())
    }

    /// `"START: Roast Beef - Preheat oven"`
    pub fn title(&self) -> String {
        format!("{}: {} - {}", self.kind.label(), self.dish, self.stage)
    }

    /// Secondary line: the notes, else a duration/completion hint
    pub fn meta(&self) -> String {
        if !self.notes.is_empty() {
            return self.notes.clone();
        }
        match self.kind {
            EventKind::Start => format!("Duration: {} min", self.duration_min),
            EventKind::End => "Stage complete".to_string(),
        }
    }

    /// True once the event instant has passed
    pub fn is_done(&self, now: DateTime<Utc>) -> bool {
        self.when < now
    }

}

/// Derive the event sequence for a meal, resolving the serve time in `tz`
///
/// Returns an empty list when the meal has no resolvable serve instant.
pub fn derive_events_in<Tz: TimeZone>(meal: &Meal, tz: &Tz) -> Vec<TimelineEvent> {
    match meal.serve_instant_in(tz) {
        Some(serve) => derive_events_at(meal, serve),
        None => Vec::new(),
    }
}

/// Derive the event sequence using the local time zone
pub fn derive_events(meal: &Meal) -> Vec<TimelineEvent> {
    derive_events_in(meal, &Local)
}

/// Derive the event sequence against an already-resolved serve instant
///
/// A serve instant so close to the representable range that a stage
/// boundary overflows yields an empty list.
pub fn derive_events_at(meal: &Meal, serve: DateTime<Utc>) -> Vec<TimelineEvent> {
    let mut events = Vec::new();

    for dish in &meal.dishes {
        let total = i64::from(dish.total_minutes());
        let Some(mut cursor) = serve.checked_sub_signed(Duration::minutes(total)) else {
            return Vec::new();
        };

        for stage in &dish.stages {
            let minutes = stage.effective_minutes();
            let start = cursor;
            let Some(end) = cursor.checked_add_signed(Duration::minutes(i64::from(minutes))) else {
                return Vec::new();
            };

            let mut push = |kind: EventKind, when: DateTime<Utc>| {
                events.push(TimelineEvent {
                    id: TimelineEvent::make_id(&stage.id, kind, when),
                    when,
                    kind,
                    dish: dish.name.clone(),
                    stage: stage.name.clone(),
                    notes: stage.notes.clone(),
                    duration_min: minutes,
                });
            };

            if stage.alert_start {
                push(EventKind::Start, start);
            }
            if stage.alert_end {
                push(EventKind::End, end);
            }

            cursor = end;
        }
    }

    // Stable: equal (when, kind) keep dish-then-stage order
    events.sort_by_key(|e| (e.when, e.kind));
    events
}

/// Time zone used to resolve serve times and print labels
///
/// The session engine runs in `Local`; tests pin a fixed offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Zone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl Zone {
    pub fn utc() -> Self {
        Zone::Fixed(FixedOffset::east_opt(0).unwrap_or_else(|| Utc.fix()))
    }

    pub fn serve_instant(&self, meal: &Meal) -> Option<DateTime<Utc>> {
        match self {
            Zone::Local => meal.serve_instant_in(&Local),
            Zone::Fixed(tz) => meal.serve_instant_in(tz),
        }
    }

    pub fn derive(&self, meal: &Meal) -> Vec<TimelineEvent> {
        match self {
            Zone::Local => derive_events_in(meal, &Local),
            Zone::Fixed(tz) => derive_events_in(meal, tz),
        }
    }

    /// `HH:MM` label of an instant in this zone
    pub fn label(&self, when: DateTime<Utc>) -> String {
        match self {
            Zone::Local => time::time_label_in(when, &Local),
            Zone::Fixed(tz) => time::time_label_in(when, tz),
        }
    }

    pub fn meta(&self, meal: &Meal) -> String {
        match self {
            Zone::Local => timeline_meta_in(meal, &Local),
            Zone::Fixed(tz) => timeline_meta_in(meal, tz),
        }
    }
}

/// Which events to show relative to now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineFilter {
    #[default]
    All,
    Upcoming,
    Done,
}

/// Which event kinds to show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    All,
    Start,
    End,
}

impl std::str::FromStr for TimelineFilter {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "" => Ok(TimelineFilter::All),
            "upcoming" => Ok(TimelineFilter::Upcoming),
            "done" => Ok(TimelineFilter::Done),
            other => Err(crate::Error::Validation(format!("unknown timeline filter '{}'", other))),
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Granularity::All),
            "start" => Ok(Granularity::Start),
            "end" => Ok(Granularity::End),
            other => Err(crate::Error::Validation(format!("unknown granularity '{}'", other))),
        }
    }
}

/// Apply the view filters to a derived sequence, preserving order
pub fn filter_events(
    events: &[TimelineEvent],
    now: DateTime<Utc>,
    filter: TimelineFilter,
    granularity: Granularity,
) -> Vec<TimelineEvent> {
    events
        .iter()
        .filter(|e| match granularity {
            Granularity::All => true,
            Granularity::Start => e.kind == EventKind::Start,
            Granularity::End => e.kind == EventKind::End,
        })
        .filter(|e| match filter {
            TimelineFilter::All => true,
            TimelineFilter::Upcoming => !e.is_done(now),
            TimelineFilter::Done => e.is_done(now),
        })
        .cloned()
        .collect()
}

/// First event at or after `now`
pub fn next_upcoming(events: &[TimelineEvent], now: DateTime<Utc>) -> Option<&TimelineEvent> {
    events.iter().find(|e| !e.is_done(now))
}

/// Header line for a meal's timeline, with the serve time shown in `tz`
pub fn timeline_meta_in<Tz>(meal: &Meal, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    match (meal.serve_date, meal.serve_instant_in(tz)) {
        (Some(date), Some(serve)) => format!(
            "Serve at {} on {}",
            time::time_label_in(serve, tz),
            date.format("%Y-%m-%d")
        ),
        _ => "Set a serve time for this meal to build its timeline.".to_string(),
    }
}

/// Header line for a meal's timeline in the local zone
pub fn timeline_meta(meal: &Meal) -> String {
    timeline_meta_in(meal, &Local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dish, Stage};
    use chrono::{NaiveDate, NaiveTime};

    fn meal_at(hour: u32, minute: u32) -> Meal {
        let mut meal = Meal::new("Test");
        meal.set_serve(
            NaiveDate::from_ymd_opt(2026, 3, 1),
            NaiveTime::from_hms_opt(hour, minute, 0),
        );
        meal
    }

    fn utc(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_event_ids_encode_stage_kind_and_instant() {
        let meal = meal_at(12, 0).with_dish(Dish::new("Eggs").with_stage(Stage::new("Boil", 7)));
        let stage_id = meal.dishes[0].stages[0].id.clone();
        let events = derive_events_in(&meal, &Utc);

        assert_eq!(
            events[0].id,
            format!("{}:start@{}", stage_id, utc(11, 53).timestamp_millis())
        );
        assert_eq!(
            events[1].id,
            format!("{}:end@{}", stage_id, utc(12, 0).timestamp_millis())
        );
    }

    #[test]
    fn test_disabled_alerts_are_skipped_but_time_still_elapses() {
        let mut quiet = Stage::new("Marinate", 30);
        quiet.alert_start = false;
        quiet.alert_end = false;
        let meal = meal_at(12, 0).with_dish(
            Dish::new("Chicken")
                .with_stage(quiet)
                .with_stage(Stage::new("Grill", 15)),
        );

        let events = derive_events_in(&meal, &Utc);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].when, utc(11, 45));
        assert_eq!(events[1].when, utc(12, 0));
    }

    #[test]
    fn test_end_sorts_before_start_at_same_instant() {
        let meal = meal_at(12, 0).with_dish(
            Dish::new("Bread")
                .with_stage(Stage::new("Prove", 60))
                .with_stage(Stage::new("Bake", 30)),
        );
        let events = derive_events_in(&meal, &Utc);
        let kinds: Vec<_> = events.iter().map(|e| (e.stage.as_str(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("Prove", EventKind::Start),
                ("Prove", EventKind::End),
                ("Bake", EventKind::Start),
                ("Bake", EventKind::End),
            ]
        );
    }

    #[test]
    fn test_meta_lines() {
        let meal = meal_at(12, 0).with_dish(
            Dish::new("Veg")
                .with_stage(Stage::new("Steam", 8))
                .with_stage(Stage::new("Toss", 2).with_notes("butter + salt")),
        );
        let events = derive_events_in(&meal, &Utc);

        assert_eq!(events[0].title(), "START: Veg - Steam");
        assert_eq!(events[0].meta(), "Duration: 8 min");
        assert_eq!(events[1].meta(), "Stage complete");
        assert_eq!(events[2].meta(), "butter + salt");
    }

    #[test]
    fn test_filter_and_granularity() {
        let meal = meal_at(12, 0).with_dish(
            Dish::new("Rice")
                .with_stage(Stage::new("Rinse", 5))
                .with_stage(Stage::new("Cook", 20)),
        );
        let events = derive_events_in(&meal, &Utc);
        let now = utc(11, 50);

        let upcoming = filter_events(&events, now, TimelineFilter::Upcoming, Granularity::All);
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].when, utc(12, 0));

        let done_starts = filter_events(&events, now, TimelineFilter::Done, Granularity::Start);
        assert_eq!(done_starts.len(), 2);
        assert!(done_starts.iter().all(|e| e.kind == EventKind::Start));

        let ends = filter_events(&events, now, TimelineFilter::All, Granularity::End);
        assert_eq!(ends.len(), 2);

        assert_eq!(next_upcoming(&events, now).unwrap().when, utc(12, 0));
        assert!(next_upcoming(&events, utc(13, 0)).is_none());
        // An event exactly at now is still upcoming
        assert_eq!(next_upcoming(&events, utc(12, 0)).unwrap().when, utc(12, 0));
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("upcoming".parse::<TimelineFilter>().unwrap(), TimelineFilter::Upcoming);
        assert_eq!("END".parse::<Granularity>().unwrap(), Granularity::End);
        assert!("later".parse::<TimelineFilter>().is_err());
    }

    #[test]
    fn test_timeline_meta() {
        let meal = meal_at(18, 30);
        assert_eq!(timeline_meta_in(&meal, &Utc), "Serve at 18:30 on 2026-03-01");

        let mut unset = meal_at(18, 30);
        unset.set_serve(None, None);
        assert!(timeline_meta_in(&unset, &Utc).starts_with("Set a serve time"));
    }

    #[test]
    fn test_fixed_zone_matches_generic_derivation() {
        let meal = meal_at(12, 0).with_dish(Dish::new("Soup").with_stage(Stage::new("Simmer", 30)));
        let tz = FixedOffset::east_opt(3600).unwrap();
        let zone = Zone::Fixed(tz);

        assert_eq!(zone.derive(&meal), derive_events_in(&meal, &tz));
        assert_eq!(zone.serve_instant(&meal), Some(utc(11, 0)));
        assert_eq!(zone.label(utc(11, 0)), "12:00");
        assert_eq!(Zone::utc().label(utc(11, 0)), "11:00");
    }

    #[test]
    fn test_event_json_shape() {
        let meal = meal_at(12, 0).with_dish(Dish::new("Tea").with_stage(Stage::new("Steep", 4)));
        let events = derive_events_in(&meal, &Utc);
        let value = serde_json::to_value(&events[0]).unwrap();

        assert_eq!(value["type"], "start");
        assert_eq!(value["when"], utc(11, 56).timestamp_millis());
        assert_eq!(value["durationMin"], 4);
        assert_eq!(value["dish"], "Tea");
    }
}
