//! Shared data models for worlds, bunkers and the objects inside them.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// --- Worlds ---

/// A persistent simulated game instance with its own calendar epoch and
/// time-acceleration rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct World {
    pub id: i32,
    pub name: String,
    pub players: i64,
    pub open: bool,
    pub joined: bool,
    /// Real instant the world was created; the simulated clock is anchored here.
    pub created: DateTime<Utc>,
    pub start_year: i32,
    /// Simulated seconds per real second.
    pub time_acceleration: i32,
    /// Constant simulated seconds added on top of the accelerated elapsed time.
    pub time_offset: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewWorld {
    pub name: String,
    pub open: bool,
    pub start_year: i32,
    pub time_acceleration: i32,
    pub time_offset: i32,
}

// --- Bunkers ---

/// Cached bunker snapshot.
///
/// Only the identity and the broadcast identifier are interpreted by the
/// client core. Subsystem state (reactor, water treatment, ...) is kept as
/// opaque JSON for the UI layer to read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bunker {
    pub id: i32,
    pub number: i32,
    pub x: i32,
    pub y: i32,
    /// Opaque identifier scoping the push channel to this bunker.
    pub broadcast_id: String,
    #[serde(flatten)]
    pub subsystems: serde_json::Map<String, serde_json::Value>,
}

impl Bunker {
    /// Look up one subsystem by its wire name, e.g. `"reactor"`.
    pub fn subsystem(&self, name: &str) -> Option<&serde_json::Value> {
        self.subsystems.get(name)
    }
}

// --- Inhabitants ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub skill_type: String,
    pub xp: i32,
    pub level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Inhabitant {
    pub id: i32,
    pub expedition_id: Option<i32>,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub skills: Vec<Skill>,
    pub assignment: Option<String>,
    pub team: Option<String>,
    pub weapon_type: Option<String>,
    #[serde(default)]
    pub ammo: i32,
    #[serde(default)]
    pub bleeding: bool,
    #[serde(default)]
    pub wounded: bool,
    #[serde(default)]
    pub sick: bool,
    #[serde(default)]
    pub infection: bool,
    #[serde(default)]
    pub recovering: bool,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub starving: bool,
    #[serde(default)]
    pub health: i32,
}

// --- Items ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CraftingRecipe {
    pub min_level: i32,
    pub time: i32,
    pub ingredients: HashMap<String, i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemType {
    pub id: String,
    pub name: String,
    pub name_plural: String,
    pub weapon: bool,
    pub damage: i32,
    pub range: i32,
    pub ammo_type: Option<String>,
    pub reactivity: i32,
    pub seed: bool,
    pub growth_time: i32,
    pub produce: Option<String>,
    pub recipe: Option<CraftingRecipe>,
    pub food: bool,
}

impl ItemType {
    /// Display name for `quantity` units of this type.
    pub fn name_for(&self, quantity: i32) -> &str {
        if quantity == 1 {
            &self.name
        } else {
            &self.name_plural
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i32,
    pub item_type: ItemType,
    pub quantity: i32,
}

// --- Map ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i32,
    pub world_id: i32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub location_type: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Sector {
    pub x: i32,
    pub y: i32,
}

// --- Messages ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i32,
    pub receiver_bunker_id: i32,
    pub sender_bunker_id: Option<i32>,
    pub sender_name: String,
    pub subject: String,
    pub body: String,
    pub created: DateTime<Utc>,
    pub unread: bool,
}

// --- Expeditions ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expedition {
    pub id: i32,
    pub bunker_id: i32,
    pub location_id: Option<i32>,
    pub zone_x: i32,
    pub zone_y: i32,
    pub eta: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub distance: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub inhabitant_id: i32,
    pub weapon_type: Option<String>,
    pub ammo: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpeditionRequest {
    pub zone_x: i32,
    pub zone_y: i32,
    pub location_id: Option<i32>,
    pub team: Vec<TeamMember>,
}
