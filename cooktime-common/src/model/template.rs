//! Built-in meal templates
//!
//! An empty catalog is bootstrapped with [`roast_beef_dinner`].

use super::{Dish, Meal, Stage};

/// Name of the bootstrap meal
pub const ROAST_BEEF_DINNER: &str = "Roast Beef Dinner";

fn dish(name: &str, stages: &[(&str, i64, &str)]) -> Dish {
    stages
        .iter()
        .fold(Dish::new(name), |dish, &(stage, minutes, notes)| {
            dish.with_stage(Stage::new(stage, minutes).with_notes(notes))
        })
}

/// Sunday roast with four parallel dishes, served today at the default time
pub fn roast_beef_dinner() -> Meal {
    Meal::new(ROAST_BEEF_DINNER)
        .with_dish(dish(
            "Roast Beef",
            &[
                ("Take out of fridge (temper)", 45, ""),
                ("Preheat oven", 20, ""),
                ("Roast (hot start)", 20, "e.g. 220°C (adjust)"),
                ("Roast (lower heat)", 45, "adjust for weight/doneness"),
                ("Rest joint", 20, ""),
            ],
        ))
        .with_dish(dish(
            "Roast Potatoes",
            &[
                ("Parboil", 15, ""),
                ("Steam-dry & rough up", 10, ""),
                ("Roast", 50, "turn halfway"),
            ],
        ))
        .with_dish(dish(
            "Yorkshire Puddings",
            &[
                ("Batter prep", 10, ""),
                ("Batter rest", 30, ""),
                ("Heat tin + fat", 10, ""),
                ("Bake", 20, "no peeking"),
            ],
        ))
        .with_dish(dish(
            "Veg + Gravy",
            &[("Prep veg", 15, ""), ("Cook veg", 12, ""), ("Make gravy", 10, "")],
        ))
}
