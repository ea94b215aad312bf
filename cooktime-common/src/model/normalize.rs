//! Normalization of untyped meal documents
//!
//! Meals arrive as arbitrary JSON (stored catalog rows, user imports, API
//! bodies). This module turns such a value into a strongly-typed [`Meal`],
//! defaulting and clamping every field instead of trusting its shape.
//!
//! Rules:
//! - `durationMin`: missing/null → mode default; numbers truncate; numeric
//!   strings parse their leading integer; anything else → 0; then clamp to
//!   `0..=MAX_STAGE_MINUTES`
//! - `alertStart`/`alertEnd`: only an explicit `false` disables the alert
//! - strings default to empty (import mode names unnamed dishes/stages)
//! - ids are kept in stored mode (blank ids are minted) and always minted in
//!   import mode

use serde_json::{Map, Value};
use tracing::warn;

use super::{Dish, Meal, Stage};
use crate::time;
use crate::uuid_utils;
use crate::{Error, Result};

/// Upper bound for a single stage duration (minutes)
pub const MAX_STAGE_MINUTES: u32 = 2000;

/// Duration given to new stages and to imported stages without one
pub const DEFAULT_STAGE_MINUTES: u32 = 10;

/// Where a document is coming from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Read back from our own store: keep ids, tolerate a blank name
    Stored,
    /// User-supplied document: require a name, mint all ids, fill defaults
    Import,
}

/// Clamp a minute count into `0..=MAX_STAGE_MINUTES`
pub fn clamp_minutes(minutes: i64) -> u32 {
    minutes.clamp(0, i64::from(MAX_STAGE_MINUTES)) as u32
}

/// Leading-integer parse: optional whitespace and sign, then digits
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // Saturate absurdly long digit runs; clamping happens afterwards anyway
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Normalize an arbitrary JSON value into a clamped minute count.
///
/// Non-numeric input yields 0.
pub fn clamp_minutes_value(value: &Value) -> u32 {
    let raw = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => parse_leading_int(s).unwrap_or(0),
        _ => 0,
    };
    clamp_minutes(raw)
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn flag_field(obj: &Map<String, Value>, key: &str) -> bool {
    !matches!(obj.get(key), Some(Value::Bool(false)))
}

fn array_field<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    match obj.get(key) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

fn pick_id(obj: &Map<String, Value>, mode: NormalizeMode) -> String {
    match mode {
        NormalizeMode::Import => uuid_utils::new_id(),
        NormalizeMode::Stored => uuid_utils::ensure_id(&string_field(obj, "id").unwrap_or_default()),
    }
}

fn normalize_stage(value: &Value, mode: NormalizeMode) -> Option<Stage> {
    let obj = value.as_object()?;
    let duration_min = match obj.get("durationMin") {
        None | Some(Value::Null) => match mode {
            NormalizeMode::Import => DEFAULT_STAGE_MINUTES,
            NormalizeMode::Stored => 0,
        },
        Some(v) => clamp_minutes_value(v),
    };
    let name = string_field(obj, "name").filter(|n| mode == NormalizeMode::Stored || !n.is_empty());

    Some(Stage {
        id: pick_id(obj, mode),
        name: name.unwrap_or_else(|| match mode {
            NormalizeMode::Import => "Stage".to_string(),
            NormalizeMode::Stored => String::new(),
        }),
        duration_min,
        alert_start: flag_field(obj, "alertStart"),
        alert_end: flag_field(obj, "alertEnd"),
        notes: string_field(obj, "notes").unwrap_or_default(),
    })
}

fn normalize_dish(value: &Value, mode: NormalizeMode) -> Option<Dish> {
    let obj = value.as_object()?;
    let name = string_field(obj, "name").filter(|n| mode == NormalizeMode::Stored || !n.is_empty());

    Some(Dish {
        id: pick_id(obj, mode),
        name: name.unwrap_or_else(|| match mode {
            NormalizeMode::Import => "Dish".to_string(),
            NormalizeMode::Stored => String::new(),
        }),
        stages: array_field(obj, "stages")
            .iter()
            .filter_map(|s| normalize_stage(s, mode))
            .collect(),
    })
}

/// Normalize one untyped meal document.
///
/// # Errors
///
/// `MalformedInput` when the value is not an object, or (import mode) when it
/// has no non-empty `name`.
pub fn normalize_meal(value: &Value, mode: NormalizeMode) -> Result<Meal> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::MalformedInput("meal document must be a JSON object".to_string()))?;

    let name = string_field(obj, "name").unwrap_or_default();
    if mode == NormalizeMode::Import && name.trim().is_empty() {
        return Err(Error::MalformedInput(
            "JSON must look like a meal with at least a name".to_string(),
        ));
    }

    let serve_date = string_field(obj, "serveDate").and_then(|s| time::parse_serve_date(&s));
    let serve_time = string_field(obj, "serveTime").and_then(|s| time::parse_serve_time(&s));

    let mut meal = Meal {
        id: pick_id(obj, mode),
        name: name.trim().to_string(),
        serve_date,
        serve_time,
        dishes: array_field(obj, "dishes")
            .iter()
            .filter_map(|d| normalize_dish(d, mode))
            .collect(),
    };

    if mode == NormalizeMode::Import {
        meal.ensure_serve_defaults();
    }

    Ok(meal)
}

/// Parse and normalize a user-supplied meal JSON text (import mode)
pub fn parse_meal_json(text: &str) -> Result<Meal> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::MalformedInput(format!("That didn't parse as valid JSON: {}", e)))?;
    normalize_meal(&value, NormalizeMode::Import)
}

/// Normalize a stored catalog document.
///
/// Anything other than an array loads as an empty catalog; entries that are
/// not objects are skipped with a warning.
pub fn normalize_catalog(value: &Value) -> Vec<Meal> {
    let Some(items) = value.as_array() else {
        warn!("Stored meal catalog is not a list, starting empty");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match normalize_meal(item, NormalizeMode::Stored) {
            Ok(meal) => Some(meal),
            Err(e) => {
                warn!("Skipping unreadable stored meal: {}", e);
                None
            }
        })
        .collect()
}
