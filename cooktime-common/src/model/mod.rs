//! Meal document model
//!
//! A [`Meal`] owns an ordered list of [`Dish`]es; each dish owns an ordered
//! list of [`Stage`]s that run back to back. Dishes run in parallel, all
//! finishing at the meal's serve instant.
//!
//! Every way into a `Meal` goes through normalization (see [`normalize`]):
//! deserializing a `Meal` from JSON normalizes it, and every editing
//! operation below keeps durations clamped and ids non-empty.

pub mod normalize;
pub mod template;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::time;
use crate::uuid_utils;

pub use normalize::{
    clamp_minutes, clamp_minutes_value, normalize_catalog, normalize_meal, parse_meal_json,
    NormalizeMode, DEFAULT_STAGE_MINUTES, MAX_STAGE_MINUTES,
};

/// Atomic timed activity within a dish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    pub name: String,
    /// Whole minutes, always within `0..=MAX_STAGE_MINUTES`
    pub duration_min: u32,
    /// Emit an event when the stage begins
    pub alert_start: bool,
    /// Emit an event when the stage ends
    pub alert_end: bool,
    pub notes: String,
}

impl Stage {
    /// New stage with both alerts enabled and no notes
    pub fn new(name: impl Into<String>, duration_min: i64) -> Self {
        Self {
            id: uuid_utils::new_id(),
            name: name.into(),
            duration_min: clamp_minutes(duration_min),
            alert_start: true,
            alert_end: true,
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Clamp and store a new duration
    pub fn set_duration(&mut self, minutes: i64) {
        self.duration_min = clamp_minutes(minutes);
    }

    /// Duration re-clamped on read; stored values are not trusted
    pub fn effective_minutes(&self) -> u32 {
        clamp_minutes(i64::from(self.duration_min))
    }
}

/// Ordered stages sharing one continuous timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    pub id: String,
    pub name: String,
    pub stages: Vec<Stage>,
}

impl Dish {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid_utils::new_id(),
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sum of all stage durations in minutes
    pub fn total_minutes(&self) -> u32 {
        self.stages.iter().map(Stage::effective_minutes).sum()
    }

    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    pub fn stage_mut(&mut self, stage_id: &str) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.id == stage_id)
    }
}

/// Root aggregate: a meal with a serve date/time and parallel dishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "serde_json::Value")]
pub struct Meal {
    pub id: String,
    pub name: String,
    #[serde(with = "crate::time::ymd_opt")]
    pub serve_date: Option<NaiveDate>,
    #[serde(with = "crate::time::hhmm_opt")]
    pub serve_time: Option<NaiveTime>,
    pub dishes: Vec<Dish>,
}

impl TryFrom<serde_json::Value> for Meal {
    type Error = crate::Error;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        normalize_meal(&value, NormalizeMode::Stored)
    }
}

/// Direction for reordering dishes and stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Partial update of a stage; absent fields are left untouched
///
/// `duration_min` is kept untyped so that any client input (numbers, numeric
/// strings, garbage) goes through the same clamping as imported documents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePatch {
    pub name: Option<String>,
    pub duration_min: Option<serde_json::Value>,
    pub alert_start: Option<bool>,
    pub alert_end: Option<bool>,
    pub notes: Option<String>,
}

impl StagePatch {
    pub fn apply(&self, stage: &mut Stage) {
        if let Some(name) = &self.name {
            stage.name = name.clone();
        }
        if let Some(duration) = &self.duration_min {
            stage.duration_min = clamp_minutes_value(duration);
        }
        if let Some(alert_start) = self.alert_start {
            stage.alert_start = alert_start;
        }
        if let Some(alert_end) = self.alert_end {
            stage.alert_end = alert_end;
        }
        if let Some(notes) = &self.notes {
            stage.notes = notes.clone();
        }
    }
}

/// Swap the item at `idx` with its neighbour; past either end is a no-op
fn move_item<T>(items: &mut [T], idx: usize, direction: Direction) -> bool {
    let target = match direction {
        Direction::Up => idx.checked_sub(1),
        Direction::Down => Some(idx + 1).filter(|&i| i < items.len()),
    };
    match target {
        Some(target) => {
            items.swap(idx, target);
            true
        }
        None => false,
    }
}

impl Meal {
    /// Empty meal served today at the default serve time
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid_utils::new_id(),
            name: name.into(),
            serve_date: Some(time::today_local()),
            serve_time: time::parse_serve_time(time::DEFAULT_SERVE_TIME),
            dishes: Vec::new(),
        }
    }

    pub fn with_dish(mut self, dish: Dish) -> Self {
        self.dishes.push(dish);
        self
    }

    /// Fill in a missing serve date (today) and serve time (default)
    pub fn ensure_serve_defaults(&mut self) {
        if self.serve_date.is_none() {
            self.serve_date = Some(time::today_local());
        }
        if self.serve_time.is_none() {
            self.serve_time = time::parse_serve_time(time::DEFAULT_SERVE_TIME);
        }
    }

    /// Serve date and time combined, if both are set
    pub fn serve_naive(&self) -> Option<NaiveDateTime> {
        Some(self.serve_date?.and_time(self.serve_time?))
    }

    /// Absolute serve instant in the given zone
    pub fn serve_instant_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<chrono::DateTime<Utc>> {
        time::resolve_wall_clock(tz, self.serve_naive()?)
    }

    pub fn set_serve(&mut self, date: Option<NaiveDate>, time: Option<NaiveTime>) {
        self.serve_date = date;
        self.serve_time = time;
    }

    /// Deep copy under a new name with fresh meal, dish and stage ids
    pub fn duplicate(&self, name: impl Into<String>) -> Meal {
        let mut copy = self.clone();
        copy.id = uuid_utils::new_id();
        copy.name = name.into();
        for dish in &mut copy.dishes {
            dish.id = uuid_utils::new_id();
            for stage in &mut dish.stages {
                stage.id = uuid_utils::new_id();
            }
        }
        copy
    }

    pub fn dish(&self, dish_id: &str) -> Option<&Dish> {
        self.dishes.iter().find(|d| d.id == dish_id)
    }

    pub fn dish_mut(&mut self, dish_id: &str) -> Option<&mut Dish> {
        self.dishes.iter_mut().find(|d| d.id == dish_id)
    }

    /// Append a new empty dish, returning its id
    pub fn add_dish(&mut self, name: impl Into<String>) -> String {
        let dish = Dish::new(name);
        let id = dish.id.clone();
        self.dishes.push(dish);
        id
    }

    pub fn remove_dish(&mut self, dish_id: &str) -> bool {
        let before = self.dishes.len();
        self.dishes.retain(|d| d.id != dish_id);
        self.dishes.len() != before
    }

    pub fn rename_dish(&mut self, dish_id: &str, name: impl Into<String>) -> bool {
        match self.dish_mut(dish_id) {
            Some(dish) => {
                dish.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Move a dish one position; false when unknown or already at the edge
    pub fn move_dish(&mut self, dish_id: &str, direction: Direction) -> bool {
        match self.dishes.iter().position(|d| d.id == dish_id) {
            Some(idx) => move_item(&mut self.dishes, idx, direction),
            None => false,
        }
    }

    /// Append a default stage to a dish, returning the new stage id
    pub fn add_stage(&mut self, dish_id: &str) -> Option<String> {
        let dish = self.dish_mut(dish_id)?;
        let stage = Stage::new("New stage", i64::from(DEFAULT_STAGE_MINUTES));
        let id = stage.id.clone();
        dish.stages.push(stage);
        Some(id)
    }

    pub fn remove_stage(&mut self, dish_id: &str, stage_id: &str) -> bool {
        match self.dish_mut(dish_id) {
            Some(dish) => {
                let before = dish.stages.len();
                dish.stages.retain(|s| s.id != stage_id);
                dish.stages.len() != before
            }
            None => false,
        }
    }

    pub fn update_stage(&mut self, dish_id: &str, stage_id: &str, patch: &StagePatch) -> bool {
        match self.dish_mut(dish_id).and_then(|d| d.stage_mut(stage_id)) {
            Some(stage) => {
                patch.apply(stage);
                true
            }
            None => false,
        }
    }

    /// Move a stage one position within its dish
    pub fn move_stage(&mut self, dish_id: &str, stage_id: &str, direction: Direction) -> bool {
        let Some(dish) = self.dish_mut(dish_id) else {
            return false;
        };
        match dish.stages.iter().position(|s| s.id == stage_id) {
            Some(idx) => move_item(&mut dish.stages, idx, direction),
            None => false,
        }
    }

    /// Number of stages across all dishes
    pub fn stage_count(&self) -> usize {
        self.dishes.iter().map(|d| d.stages.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_meal() -> Meal {
        Meal::new("Sunday")
            .with_dish(
                Dish::new("Roast")
                    .with_stage(Stage::new("Temper", 45))
                    .with_stage(Stage::new("Roast", 40))
                    .with_stage(Stage::new("Rest", 20)),
            )
            .with_dish(Dish::new("Potatoes").with_stage(Stage::new("Parboil", 15)))
    }

    fn stage_names(meal: &Meal, dish_idx: usize) -> Vec<&str> {
        meal.dishes[dish_idx]
            .stages
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }

    #[test]
    fn test_stage_new_clamps_duration() {
        assert_eq!(Stage::new("a", -5).duration_min, 0);
        assert_eq!(Stage::new("b", 9999).duration_min, MAX_STAGE_MINUTES);
        assert_eq!(Stage::new("c", 30).duration_min, 30);
    }

    #[test]
    fn test_total_minutes() {
        let meal = sample_meal();
        assert_eq!(meal.dishes[0].total_minutes(), 105);
        assert_eq!(meal.dishes[1].total_minutes(), 15);
        assert_eq!(Dish::new("empty").total_minutes(), 0);
    }

    #[test]
    fn test_move_dish_swaps_and_stops_at_edges() {
        let mut meal = sample_meal();
        let roast = meal.dishes[0].id.clone();
        let potatoes = meal.dishes[1].id.clone();

        // Past the top edge: no-op
        assert!(!meal.move_dish(&roast, Direction::Up));
        assert_eq!(meal.dishes[0].id, roast);

        assert!(meal.move_dish(&roast, Direction::Down));
        assert_eq!(meal.dishes[0].id, potatoes);
        assert_eq!(meal.dishes[1].id, roast);

        // Past the bottom edge: no-op
        assert!(!meal.move_dish(&roast, Direction::Down));
        assert_eq!(meal.dishes[1].id, roast);

        assert!(!meal.move_dish("missing", Direction::Up));
    }

    #[test]
    fn test_move_stage_within_dish() {
        let mut meal = sample_meal();
        let dish_id = meal.dishes[0].id.clone();
        let rest = meal.dishes[0].stages[2].id.clone();

        assert!(meal.move_stage(&dish_id, &rest, Direction::Up));
        assert_eq!(stage_names(&meal, 0), vec!["Temper", "Rest", "Roast"]);

        assert!(meal.move_stage(&dish_id, &rest, Direction::Up));
        assert!(!meal.move_stage(&dish_id, &rest, Direction::Up));
        assert_eq!(stage_names(&meal, 0), vec!["Rest", "Temper", "Roast"]);

        assert!(!meal.move_stage("missing", &rest, Direction::Down));
    }

    #[test]
    fn test_add_and_remove_stage() {
        let mut meal = sample_meal();
        let dish_id = meal.dishes[1].id.clone();

        let stage_id = meal.add_stage(&dish_id).unwrap();
        let stage = meal.dishes[1].stage(&stage_id).unwrap();
        assert_eq!(stage.name, "New stage");
        assert_eq!(stage.duration_min, DEFAULT_STAGE_MINUTES);
        assert!(stage.alert_start && stage.alert_end);

        assert!(meal.remove_stage(&dish_id, &stage_id));
        assert!(!meal.remove_stage(&dish_id, &stage_id));
        assert!(meal.add_stage("missing").is_none());
    }

    #[test]
    fn test_update_stage_patch_clamps() {
        let mut meal = sample_meal();
        let dish_id = meal.dishes[0].id.clone();
        let stage_id = meal.dishes[0].stages[0].id.clone();

        let patch = StagePatch {
            duration_min: Some(json!(9999)),
            alert_end: Some(false),
            notes: Some("bring to room temp".to_string()),
            ..Default::default()
        };
        assert!(meal.update_stage(&dish_id, &stage_id, &patch));

        let stage = &meal.dishes[0].stages[0];
        assert_eq!(stage.duration_min, MAX_STAGE_MINUTES);
        assert!(stage.alert_start);
        assert!(!stage.alert_end);
        assert_eq!(stage.notes, "bring to room temp");
        assert_eq!(stage.name, "Temper");

        let garbage = StagePatch {
            duration_min: Some(json!("soon")),
            ..Default::default()
        };
        assert!(meal.update_stage(&dish_id, &stage_id, &garbage));
        assert_eq!(meal.dishes[0].stages[0].duration_min, 0);
    }

    #[test]
    fn test_duplicate_assigns_fresh_ids() {
        let meal = sample_meal();
        let copy = meal.duplicate("Sunday (Copy)");

        assert_ne!(copy.id, meal.id);
        assert_eq!(copy.name, "Sunday (Copy)");
        assert_eq!(copy.dishes.len(), meal.dishes.len());
        for (a, b) in copy.dishes.iter().zip(&meal.dishes) {
            assert_ne!(a.id, b.id);
            assert_eq!(a.name, b.name);
            for (sa, sb) in a.stages.iter().zip(&b.stages) {
                assert_ne!(sa.id, sb.id);
                assert_eq!(sa.duration_min, sb.duration_min);
            }
        }
    }

    #[test]
    fn test_serde_uses_document_field_names() {
        let mut meal = sample_meal();
        meal.set_serve(NaiveDate::from_ymd_opt(2026, 10, 17), NaiveTime::from_hms_opt(18, 30, 0));

        let value = serde_json::to_value(&meal).unwrap();
        assert_eq!(value["serveDate"], "2026-10-17");
        assert_eq!(value["serveTime"], "18:30");
        assert_eq!(value["dishes"][0]["stages"][0]["durationMin"], 45);
        assert_eq!(value["dishes"][0]["stages"][0]["alertStart"], true);

        let back: Meal = serde_json::from_value(value).unwrap();
        assert_eq!(back, meal);
    }

    #[test]
    fn test_ensure_serve_defaults() {
        let mut meal = sample_meal();
        meal.set_serve(None, None);
        assert!(meal.serve_naive().is_none());

        meal.ensure_serve_defaults();
        assert_eq!(meal.serve_time, NaiveTime::from_hms_opt(18, 30, 0));
        assert!(meal.serve_date.is_some());
    }
}
