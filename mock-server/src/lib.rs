use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Every route lives under this prefix so clients exercise base-path joining.
pub const BASE_PATH: &str = "/service/api";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub quantity: Option<u32>,
}

#[derive(Deserialize)]
pub struct SlowParams {
    #[serde(default)]
    pub ms: u64,
}

/// In-memory item store shared by the handlers.
#[derive(Clone, Default)]
pub struct Inventory {
    items: Arc<RwLock<HashMap<Uuid, Item>>>,
}

impl Inventory {
    /// Items ordered by name, then id, so listings are stable.
    pub async fn list(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        items
    }

    pub async fn add(&self, input: CreateItem) -> Item {
        let item = Item {
            id: Uuid::new_v4(),
            name: input.name,
            quantity: input.quantity,
        };
        self.items.write().await.insert(item.id, item.clone());
        item
    }

    pub async fn find(&self, id: Uuid) -> Option<Item> {
        self.items.read().await.get(&id).cloned()
    }

    /// Apply the fields present in `patch`; `None` when `id` is unknown.
    pub async fn patch(&self, id: Uuid, patch: UpdateItem) -> Option<Item> {
        let mut items = self.items.write().await;
        let item = items.get_mut(&id)?;
        if let Some(name) = patch.name {
            item.name = name;
        }
        item.quantity = patch.quantity.unwrap_or(item.quantity);
        Some(item.clone())
    }

    pub async fn take(&self, id: Uuid) -> Option<Item> {
        self.items.write().await.remove(&id)
    }
}

pub fn app() -> Router {
    let api = Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/headers", get(echo_headers))
        .route("/slow", get(slow))
        .with_state(Inventory::default());
    Router::new().nest(BASE_PATH, api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_items(State(inventory): State<Inventory>) -> Json<Vec<Item>> {
    Json(inventory.list().await)
}

async fn create_item(
    State(inventory): State<Inventory>,
    Json(input): Json<CreateItem>,
) -> (StatusCode, Json<Item>) {
    (StatusCode::CREATED, Json(inventory.add(input).await))
}

async fn get_item(
    State(inventory): State<Inventory>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, StatusCode> {
    inventory.find(id).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_item(
    State(inventory): State<Inventory>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateItem>,
) -> Result<Json<Item>, StatusCode> {
    inventory.patch(id, patch).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_item(State(inventory): State<Inventory>, Path(id): Path<Uuid>) -> StatusCode {
    match inventory.take(id).await {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// Reflect request headers back as a JSON object, lower-cased names.
async fn echo_headers(headers: HeaderMap) -> Json<HashMap<String, String>> {
    Json(
        headers
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect(),
    )
}

async fn slow(Query(params): Query<SlowParams>) -> StatusCode {
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    StatusCode::NO_CONTENT
}
