//! Meal catalog
//!
//! Ordered list of meals plus the active meal id. The in-memory copy is the
//! working state: every change is applied here first and then written
//! through the [`MealStore`]. A failed write is logged and broadcast as
//! `StorageDegraded`, but never rolls back the change.
//!
//! The catalog is never empty; an empty store is bootstrapped with the
//! Roast Beef Dinner template and deleting the last meal is refused. When the
//! store cannot be read at all the template is used in memory only, so the
//! stored catalog is not overwritten by the bootstrap.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{info, warn};

use cooktime_common::events::{CooktimeEvent, EventBus};
use cooktime_common::model::template::roast_beef_dinner;
use cooktime_common::model::{parse_meal_json, Direction, StagePatch};
use cooktime_common::time::Clock;
use cooktime_common::Meal;

use crate::error::{Error, Result};
use crate::store::MealStore;

/// Summary row for meal pickers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MealSummary {
    pub id: String,
    pub name: String,
}

pub struct Catalog {
    store: Arc<dyn MealStore>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    meals: Vec<Meal>,
    active_id: String,
    default_serve_time: NaiveTime,
}

impl Catalog {
    /// Load the catalog, bootstrapping and repairing as needed
    ///
    /// - unreadable store: template in memory only, nothing written back
    /// - empty catalog: add the Roast Beef Dinner template and persist it
    /// - missing/unknown active id: first meal
    pub async fn load(
        store: Arc<dyn MealStore>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        default_serve_time: NaiveTime,
    ) -> Self {
        let mut degraded = Vec::new();

        let (mut meals, readable) = match store.load().await {
            Ok(meals) => (meals, true),
            Err(e) => {
                degraded.push(("load_meals", e));
                (Vec::new(), false)
            }
        };
        let bootstrapped = meals.is_empty();
        if bootstrapped {
            info!("Meal catalog empty, adding the Roast Beef Dinner template");
            let mut template = roast_beef_dinner();
            template.serve_time = Some(default_serve_time);
            meals.push(template);
        }

        let stored_active = match store.get_active_id().await {
            Ok(id) => id,
            Err(e) => {
                degraded.push(("load_active_meal", e));
                None
            }
        };

        let (active_id, repaired) = match stored_active {
            Some(id) if meals.iter().any(|m| m.id == id) => (id, false),
            // Catalog never empty here
            _ => (meals[0].id.clone(), true),
        };

        let catalog = Self {
            store,
            bus,
            clock,
            meals,
            active_id,
            default_serve_time,
        };

        for (operation, e) in degraded {
            catalog.degraded(operation, &e);
        }
        if !readable {
            warn!("Meal catalog unreadable, working from an unsaved template");
        } else {
            if bootstrapped {
                catalog.persist_meals().await;
            }
            if repaired {
                catalog.persist_active().await;
            }
        }

        catalog
    }

    pub fn meals(&self) -> &[Meal] {
        &self.meals
    }

    pub fn summaries(&self) -> Vec<MealSummary> {
        self.meals
            .iter()
            .map(|m| MealSummary {
                id: m.id.clone(),
                name: m.name.clone(),
            })
            .collect()
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> &Meal {
        self.meals
            .iter()
            .find(|m| m.id == self.active_id)
            .unwrap_or(&self.meals[0])
    }

    pub fn get(&self, id: &str) -> Result<&Meal> {
        self.meals
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(format!("meal {}", id)))
    }

    /// New empty meal served today at the default time; becomes active
    pub async fn create(&mut self, name: &str) -> Result<&Meal> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Meal name is required".to_string()));
        }

        let mut meal = Meal::new(name);
        meal.serve_time = Some(self.default_serve_time);
        info!("Created meal '{}'", meal.name);
        self.add_and_select(meal).await
    }

    /// Deep copy of a meal with fresh ids; becomes active
    ///
    /// Without a name the copy is called `"{name} (Copy)"`.
    pub async fn copy(&mut self, id: &str, name: Option<&str>) -> Result<&Meal> {
        let source = self.get(id)?;
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("{} (Copy)", source.name),
        };
        let copy = source.duplicate(name);
        info!("Copied meal '{}' to '{}'", source.name, copy.name);
        self.add_and_select(copy).await
    }

    /// Delete a meal; the last remaining meal cannot be deleted
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        self.get(id)?;
        if self.meals.len() == 1 {
            return Err(Error::Validation("You need at least one meal".to_string()));
        }

        self.meals.retain(|m| m.id != id);
        info!("Deleted meal {}", id);
        self.persist_meals().await;

        if self.active_id == id {
            self.active_id = self.meals[0].id.clone();
            self.persist_active().await;
        }
        self.changed();
        Ok(())
    }

    pub async fn select(&mut self, id: &str) -> Result<&Meal> {
        self.get(id)?;
        self.active_id = id.to_string();
        self.persist_active().await;
        self.changed();
        Ok(self.active())
    }

    /// Import a meal from JSON text; becomes active
    ///
    /// Malformed input is rejected before anything is merged.
    pub async fn import_json(&mut self, text: &str) -> Result<&Meal> {
        let meal = parse_meal_json(text)?;
        info!(
            "Imported meal '{}' ({} dishes, {} stages)",
            meal.name,
            meal.dishes.len(),
            meal.stage_count()
        );
        self.add_and_select(meal).await
    }

    /// Pretty-printed JSON document of a meal
    pub fn export_json(&self, id: &str) -> Result<String> {
        Ok(serde_json::to_string_pretty(self.get(id)?)?)
    }

    pub async fn set_serve(&mut self, date: Option<NaiveDate>, time: Option<NaiveTime>) -> Meal {
        self.edit_active(|meal| meal.set_serve(date, time)).await;
        self.active().clone()
    }

    /// Append a dish to the active meal, returning its id
    pub async fn add_dish(&mut self, name: &str) -> String {
        let name = match name.trim() {
            "" => "New dish",
            trimmed => trimmed,
        };
        self.edit_active(|meal| meal.add_dish(name)).await
    }

    pub async fn rename_dish(&mut self, dish_id: &str, name: &str) -> Result<()> {
        self.require_dish(dish_id)?;
        self.edit_active(|meal| meal.rename_dish(dish_id, name)).await;
        Ok(())
    }

    pub async fn remove_dish(&mut self, dish_id: &str) -> Result<()> {
        self.require_dish(dish_id)?;
        self.edit_active(|meal| meal.remove_dish(dish_id)).await;
        Ok(())
    }

    /// Returns false when the dish is already at that edge
    pub async fn move_dish(&mut self, dish_id: &str, direction: Direction) -> Result<bool> {
        self.require_dish(dish_id)?;
        Ok(self.edit_active(|meal| meal.move_dish(dish_id, direction)).await)
    }

    /// Append a default stage, returning its id
    pub async fn add_stage(&mut self, dish_id: &str) -> Result<String> {
        self.require_dish(dish_id)?;
        self.edit_active(|meal| meal.add_stage(dish_id))
            .await
            .ok_or_else(|| Error::NotFound(format!("dish {}", dish_id)))
    }

    pub async fn update_stage(&mut self, dish_id: &str, stage_id: &str, patch: &StagePatch) -> Result<()> {
        self.require_stage(dish_id, stage_id)?;
        self.edit_active(|meal| meal.update_stage(dish_id, stage_id, patch)).await;
        Ok(())
    }

    pub async fn remove_stage(&mut self, dish_id: &str, stage_id: &str) -> Result<()> {
        self.require_stage(dish_id, stage_id)?;
        self.edit_active(|meal| meal.remove_stage(dish_id, stage_id)).await;
        Ok(())
    }

    pub async fn move_stage(&mut self, dish_id: &str, stage_id: &str, direction: Direction) -> Result<bool> {
        self.require_stage(dish_id, stage_id)?;
        Ok(self
            .edit_active(|meal| meal.move_stage(dish_id, stage_id, direction))
            .await)
    }

    fn require_dish(&self, dish_id: &str) -> Result<()> {
        self.active()
            .dish(dish_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("dish {}", dish_id)))
    }

    fn require_stage(&self, dish_id: &str, stage_id: &str) -> Result<()> {
        self.active()
            .dish(dish_id)
            .ok_or_else(|| Error::NotFound(format!("dish {}", dish_id)))?
            .stage(stage_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("stage {}", stage_id)))
    }

    async fn edit_active<R>(&mut self, edit: impl FnOnce(&mut Meal) -> R) -> R {
        let active_id = self.active_id.clone();
        let idx = self
            .meals
            .iter()
            .position(|m| m.id == active_id)
            .unwrap_or(0);
        let result = edit(&mut self.meals[idx]);
        self.persist_meals().await;
        self.changed();
        result
    }

    async fn add_and_select(&mut self, meal: Meal) -> Result<&Meal> {
        self.active_id = meal.id.clone();
        self.meals.push(meal);
        self.persist_meals().await;
        self.persist_active().await;
        self.changed();
        Ok(self.active())
    }

    async fn persist_meals(&self) {
        if let Err(e) = self.store.save(&self.meals).await {
            self.degraded("save_meals", &e);
        }
    }

    async fn persist_active(&self) {
        if let Err(e) = self.store.set_active_id(&self.active_id).await {
            self.degraded("save_active_meal", &e);
        }
    }

    fn degraded(&self, operation: &str, e: &Error) {
        warn!("Storage degraded during {}: {}", operation, e);
        self.bus.emit_lossy(CooktimeEvent::storage_degraded(
            operation,
            e.to_string(),
            self.clock.now(),
        ));
    }

    fn changed(&self) {
        self.bus.emit_lossy(CooktimeEvent::CatalogChanged {
            active_meal_id: Some(self.active_id.clone()),
            meal_count: self.meals.len(),
            timestamp: self.clock.now(),
        });
    }
}
