//! Typed game commands for the selected world.

use std::collections::HashMap;
use std::sync::Arc;

use bunker_shared::{
    world_path, Expedition, ExpeditionRequest, Inhabitant, Item, ItemType, Location, Message, Sector,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::{set_if_changed, WorldSession};
use crate::api_client::{call, no_args};
use crate::error::SessionError;

impl WorldSession {
    async fn world_call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: impl Serialize,
    ) -> Result<T, SessionError> {
        let world_id = self.world_id()?;
        Ok(call(self.rpc(), &world_path(world_id, method), body).await?)
    }

    // --- Item types ---

    /// Item type catalogue keyed by id. Fetched once per world; a failed fetch
    /// is not cached.
    pub async fn get_item_types(&self) -> Result<Arc<HashMap<String, ItemType>>, SessionError> {
        let epoch = {
            let active = self.inner.active();
            if let Some(cached) = &active.item_types {
                return Ok(cached.clone());
            }
            active.epoch
        };

        let types: Vec<ItemType> = self.world_call("get_item_types", no_args()).await?;
        let catalogue = Arc::new(
            types
                .into_iter()
                .map(|item_type| (item_type.id.clone(), item_type))
                .collect::<HashMap<_, _>>(),
        );

        let mut active = self.inner.active();
        if active.epoch == epoch {
            active.item_types = Some(catalogue.clone());
        }
        Ok(catalogue)
    }

    pub async fn item_type(&self, id: &str) -> Result<Option<ItemType>, SessionError> {
        Ok(self.get_item_types().await?.get(id).cloned())
    }

    /// Display name of `quantity` units of `id`, or the id itself when the
    /// type is unknown.
    pub async fn item_type_name(&self, id: &str, quantity: i32) -> Result<String, SessionError> {
        let types = self.get_item_types().await?;
        Ok(types
            .get(id)
            .map(|item_type| item_type.name_for(quantity).to_string())
            .unwrap_or_else(|| id.to_string()))
    }

    /// Item types that can be crafted, sorted by id.
    pub async fn recipes(&self) -> Result<Vec<ItemType>, SessionError> {
        let mut recipes: Vec<ItemType> = self
            .get_item_types()
            .await?
            .values()
            .filter(|item_type| item_type.recipe.is_some())
            .cloned()
            .collect();
        recipes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(recipes)
    }

    // --- Inhabitants ---

    pub async fn get_inhabitants(&self) -> Result<Vec<Inhabitant>, SessionError> {
        self.world_call("get_inhabitants", no_args()).await
    }

    pub async fn set_team(&self, inhabitant_id: i32, team: Option<&str>) -> Result<(), SessionError> {
        self.world_call("set_team", json!({ "inhabitantId": inhabitant_id, "team": team }))
            .await
    }

    pub async fn set_assignment(
        &self,
        inhabitant_id: i32,
        assignment: Option<&str>,
    ) -> Result<(), SessionError> {
        self.world_call(
            "set_assignment",
            json!({ "inhabitantId": inhabitant_id, "assignment": assignment }),
        )
        .await
    }

    // --- Items and map ---

    pub async fn get_items(&self) -> Result<Vec<Item>, SessionError> {
        self.world_call("get_items", no_args()).await
    }

    pub async fn get_locations(&self) -> Result<Vec<Location>, SessionError> {
        self.world_call("get_locations", no_args()).await
    }

    pub async fn get_sectors(&self) -> Result<Vec<Sector>, SessionError> {
        self.world_call("get_sectors", no_args()).await
    }

    // --- Messages ---

    /// One page of messages, newest first. Pass the `created` of the oldest
    /// message already shown to get the next page.
    pub async fn get_messages(
        &self,
        older_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, SessionError> {
        let method = match older_than {
            Some(instant) => format!(
                "get_messages?older_than={}",
                urlencoding::encode(&instant.to_rfc3339_opts(SecondsFormat::Secs, true))
            ),
            None => "get_messages".to_string(),
        };
        self.world_call(&method, no_args()).await
    }

    pub async fn set_message_read(&self, message_id: i32) -> Result<(), SessionError> {
        self.world_call("set_message_read", message_id).await
    }

    /// Mark every message read and clear the message notification.
    pub async fn set_all_messages_read(&self) -> Result<(), SessionError> {
        self.world_call::<()>("set_all_messages_read", no_args()).await?;
        set_if_changed(&self.inner.message_notification, false);
        Ok(())
    }

    /// Timestamp of the newest unread message, if any.
    pub async fn has_unread_messages(&self) -> Result<Option<String>, SessionError> {
        self.world_call("has_unread_messages", no_args()).await
    }

    // --- Expeditions ---

    pub async fn get_expeditions(&self) -> Result<Vec<Expedition>, SessionError> {
        self.world_call("get_expeditions", no_args()).await
    }

    pub async fn create_expedition(&self, request: &ExpeditionRequest) -> Result<(), SessionError> {
        self.world_call("create_expedition", request).await
    }

    // --- Bunker subsystems ---

    pub async fn refuel_reactor(&self, item_type: &str) -> Result<(), SessionError> {
        self.world_call("refuel_reactor", json!({ "itemType": item_type }))
            .await
    }

    pub async fn update_infirmary_inventory(&self, medicine: i32) -> Result<(), SessionError> {
        self.world_call("update_infirmary_inventory", json!({ "medicine": medicine }))
            .await
    }

    pub async fn add_crop(&self, seed_type: &str, amount: i32) -> Result<(), SessionError> {
        self.world_call("add_crop", json!({ "seedType": seed_type, "amount": amount }))
            .await
    }

    pub async fn remove_crop(&self, index: usize) -> Result<(), SessionError> {
        self.world_call("remove_crop", json!({ "index": index })).await
    }

    pub async fn add_project(&self, item_type: &str, quantity: i32) -> Result<(), SessionError> {
        self.world_call("add_project", json!({ "itemType": item_type, "quantity": quantity }))
            .await
    }

    pub async fn remove_project(&self, index: usize) -> Result<(), SessionError> {
        self.world_call("remove_project", json!({ "index": index })).await
    }

    pub async fn prioritize_project(&self, index: usize) -> Result<(), SessionError> {
        self.world_call("prioritize_project", json!({ "index": index }))
            .await
    }

    // --- Radio ---

    /// Send a radio message to every bunker in the world.
    pub async fn broadcast(&self, message: &str) -> Result<(), SessionError> {
        self.world_call("broadcast", message).await
    }
}
