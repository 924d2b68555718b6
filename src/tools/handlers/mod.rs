//! Concrete tool implementations.
//!
//! Each handler is a thin adapter over one portal call or one
//! coordinator query: validate arguments, call the collaborator, shape
//! the JSON the model sees. Navigation and calendar tools are only
//! registered when their capability is present.


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::llm::ToolSpec;
use crate::portal::{
    EquipmentBookingRequest, FacilityBookingRequest, Navigator, NewDormCheck, NewDormStorageItem,
    NewWikiArticle, PortalApi, WikiArticleUpdate,
};
use crate::rag::RagCoordinator;
use crate::store::SearchResult;
use crate::tools::{ToolError, ToolHandler, ToolRegistry};

/// Name of the knowledge-base search tool; the orchestrator watches
/// its results for the navigation suggestion.
pub const SEARCH_WIKI: &str = "search_wiki";

const DEFAULT_SEARCH_RESULTS: usize = 5;
const EXCERPT_CHARS: usize = 200;

/// Everything tool construction can depend on.
pub struct ToolDeps {
    pub portal: Arc<dyn PortalApi>,
    pub rag: Arc<RagCoordinator>,
    pub navigator: Option<Arc<dyn Navigator>>,
    pub calendar_ready: bool,
}

/// Build and validate the full registry for the given capabilities.
#[inline]
pub fn build_registry(deps: ToolDeps) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    let portal = &deps.portal;

    registry.register(
        SearchWikiHandler::spec(),
        SearchWikiHandler {
            rag: Arc::clone(&deps.rag),
        },
    )?;
    registry.register(
        GetWikiArticleHandler::spec(),
        GetWikiArticleHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        CreateWikiArticleHandler::spec(),
        CreateWikiArticleHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        UpdateWikiArticleHandler::spec(),
        UpdateWikiArticleHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        DeleteWikiArticleHandler::spec(),
        DeleteWikiArticleHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        ListFacilitiesHandler::spec(),
        ListFacilitiesHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        BookFacilityHandler::spec(),
        BookFacilityHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        ListEquipmentHandler::spec(),
        ListEquipmentHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        BookEquipmentHandler::spec(),
        BookEquipmentHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        ListDormChecksHandler::spec(),
        ListDormChecksHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        CreateDormCheckHandler::spec(),
        CreateDormCheckHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        ListDormStorageHandler::spec(),
        ListDormStorageHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        CreateDormStorageHandler::spec(),
        CreateDormStorageHandler {
            portal: Arc::clone(portal),
        },
    )?;
    registry.register(
        GetUserProfileHandler::spec(),
        GetUserProfileHandler {
            portal: Arc::clone(portal),
        },
    )?;

    if let Some(navigator) = deps.navigator {
        registry.register(NavigateHandler::spec(), NavigateHandler { navigator })?;
    }

    if deps.calendar_ready {
        registry.register(
            ListCalendarEventsHandler::spec(),
            ListCalendarEventsHandler {
                portal: Arc::clone(portal),
            },
        )?;
    }

    registry.validate()?;
    Ok(registry)
}

/// Portal link to a wiki article.
fn wiki_link(article_id: i64) -> String {
    format!("/wiki/{article_id}")
}

fn excerpt(content: &str) -> String {
    if content.chars().count() <= EXCERPT_CHARS {
        content.to_string()
    } else {
        let cut: String = content.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    }
}

fn search_result_json(result: &SearchResult) -> Value {
    json!({
        "article_id": result.document.metadata.source_id,
        "title": result.document.metadata.title,
        "school": result.document.metadata.group,
        "excerpt": excerpt(&result.document.content),
        "score": result.score,
    })
}

// ── search_wiki ──

pub struct SearchWikiHandler {
    rag: Arc<RagCoordinator>,
}

#[derive(Deserialize)]
struct SearchWikiArgs {
    query: String,
    school: Option<String>,
    max_results: Option<usize>,
}

impl SearchWikiHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: SEARCH_WIKI.to_string(),
            description: "Search the campus knowledge base for relevant articles".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "What to look for" },
                    "school": { "type": "string", "description": "Optional: restrict results to one school" },
                    "max_results": { "type": "integer", "description": "Maximum number of results (default: 5)" }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for SearchWikiHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: SearchWikiArgs = serde_json::from_value(args)?;
        let max_results = args.max_results.unwrap_or(DEFAULT_SEARCH_RESULTS).max(1);

        let results = self
            .rag
            .search_documents(&args.query, args.school.as_deref(), max_results)
            .await;

        let top_match = results.first().map(|best| {
            json!({
                "article_id": best.document.metadata.source_id,
                "title": best.document.metadata.title,
                "link": wiki_link(best.document.metadata.source_id),
            })
        });

        Ok(json!({
            "results": results.iter().map(search_result_json).collect::<Vec<_>>(),
            "top_match": top_match,
        }))
    }
}

// ── wiki CRUD ──

pub struct GetWikiArticleHandler {
    portal: Arc<dyn PortalApi>,
}

#[derive(Deserialize)]
struct ArticleIdArgs {
    article_id: i64,
}

impl GetWikiArticleHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "get_wiki_article".to_string(),
            description: "Fetch the full text of one knowledge-base article".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "article_id": { "type": "integer", "description": "Article id" }
                },
                "required": ["article_id"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for GetWikiArticleHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: ArticleIdArgs = serde_json::from_value(args)?;
        let article = self.portal.get_wiki_article(args.article_id).await?;
        Ok(serde_json::to_value(article)?)
    }
}

pub struct CreateWikiArticleHandler {
    portal: Arc<dyn PortalApi>,
}

impl CreateWikiArticleHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "create_wiki_article".to_string(),
            description: "Create a new knowledge-base article".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "content": { "type": "string" },
                    "school": { "type": "string" }
                },
                "required": ["title", "content", "school"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for CreateWikiArticleHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let article: NewWikiArticle = serde_json::from_value(args)?;
        let created = self.portal.create_wiki_article(article).await?;
        Ok(serde_json::to_value(created)?)
    }
}

pub struct UpdateWikiArticleHandler {
    portal: Arc<dyn PortalApi>,
}

#[derive(Deserialize)]
struct UpdateWikiArgs {
    article_id: i64,
    title: Option<String>,
    content: Option<String>,
}

impl UpdateWikiArticleHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "update_wiki_article".to_string(),
            description: "Update the title or content of a knowledge-base article".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "article_id": { "type": "integer" },
                    "title": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["article_id"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for UpdateWikiArticleHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: UpdateWikiArgs = serde_json::from_value(args)?;
        let updated = self
            .portal
            .update_wiki_article(
                args.article_id,
                WikiArticleUpdate {
                    title: args.title,
                    content: args.content,
                },
            )
            .await?;
        Ok(serde_json::to_value(updated)?)
    }
}

pub struct DeleteWikiArticleHandler {
    portal: Arc<dyn PortalApi>,
}

impl DeleteWikiArticleHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "delete_wiki_article".to_string(),
            description: "Delete a knowledge-base article".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "article_id": { "type": "integer" }
                },
                "required": ["article_id"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for DeleteWikiArticleHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: ArticleIdArgs = serde_json::from_value(args)?;
        self.portal.delete_wiki_article(args.article_id).await?;
        Ok(json!({ "deleted": args.article_id }))
    }
}

// ── facilities ──

pub struct ListFacilitiesHandler {
    portal: Arc<dyn PortalApi>,
}

impl ListFacilitiesHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "list_facilities".to_string(),
            description: "List bookable campus facilities".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListFacilitiesHandler {
    async fn handle(&self, _args: Value) -> anyhow::Result<Value> {
        let facilities = self.portal.list_facilities().await?;
        Ok(json!({ "facilities": facilities }))
    }
}

pub struct BookFacilityHandler {
    portal: Arc<dyn PortalApi>,
}

#[derive(Deserialize)]
struct BookFacilityArgs {
    facility_id: i64,
    purpose: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl BookFacilityHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "book_facility".to_string(),
            description: "Book a campus facility for a time slot".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "facility_id": { "type": "integer" },
                    "purpose": { "type": "string" },
                    "starts_at": { "type": "string", "description": "RFC 3339 timestamp" },
                    "ends_at": { "type": "string", "description": "RFC 3339 timestamp" }
                },
                "required": ["facility_id", "purpose", "starts_at", "ends_at"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for BookFacilityHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: BookFacilityArgs = serde_json::from_value(args)?;
        let booking = self
            .portal
            .book_facility(FacilityBookingRequest {
                facility_id: args.facility_id,
                purpose: args.purpose,
                starts_at: args.starts_at,
                ends_at: args.ends_at,
            })
            .await?;
        Ok(serde_json::to_value(booking)?)
    }
}

// ── equipment ──

pub struct ListEquipmentHandler {
    portal: Arc<dyn PortalApi>,
}

impl ListEquipmentHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "list_equipment".to_string(),
            description: "List borrowable equipment".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListEquipmentHandler {
    async fn handle(&self, _args: Value) -> anyhow::Result<Value> {
        let equipment = self.portal.list_equipment().await?;
        Ok(json!({ "equipment": equipment }))
    }
}

pub struct BookEquipmentHandler {
    portal: Arc<dyn PortalApi>,
}

#[derive(Deserialize)]
struct BookEquipmentArgs {
    equipment_id: i64,
    quantity: u32,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl BookEquipmentHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "book_equipment".to_string(),
            description: "Reserve equipment for a time slot".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "equipment_id": { "type": "integer" },
                    "quantity": { "type": "integer" },
                    "starts_at": { "type": "string", "description": "RFC 3339 timestamp" },
                    "ends_at": { "type": "string", "description": "RFC 3339 timestamp" }
                },
                "required": ["equipment_id", "quantity", "starts_at", "ends_at"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for BookEquipmentHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: BookEquipmentArgs = serde_json::from_value(args)?;
        let booking = self
            .portal
            .book_equipment(EquipmentBookingRequest {
                equipment_id: args.equipment_id,
                quantity: args.quantity,
                starts_at: args.starts_at,
                ends_at: args.ends_at,
            })
            .await?;
        Ok(serde_json::to_value(booking)?)
    }
}

// ── dorm checks and storage ──

pub struct ListDormChecksHandler {
    portal: Arc<dyn PortalApi>,
}

#[derive(Deserialize)]
struct RoomFilterArgs {
    room: Option<String>,
}

impl ListDormChecksHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "list_dorm_checks".to_string(),
            description: "List dormitory inspection appointments".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "room": { "type": "string", "description": "Optional: filter by room" }
                },
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListDormChecksHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: RoomFilterArgs = serde_json::from_value(args)?;
        let checks = self.portal.list_dorm_checks(args.room.as_deref()).await?;
        Ok(json!({ "checks": checks }))
    }
}

pub struct CreateDormCheckHandler {
    portal: Arc<dyn PortalApi>,
}

#[derive(Deserialize)]
struct CreateDormCheckArgs {
    room: String,
    scheduled_for: DateTime<Utc>,
    notes: Option<String>,
}

impl CreateDormCheckHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "create_dorm_check".to_string(),
            description: "Schedule a dormitory inspection".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "room": { "type": "string" },
                    "scheduled_for": { "type": "string", "description": "RFC 3339 timestamp" },
                    "notes": { "type": "string" }
                },
                "required": ["room", "scheduled_for"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for CreateDormCheckHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: CreateDormCheckArgs = serde_json::from_value(args)?;
        let check = self
            .portal
            .create_dorm_check(NewDormCheck {
                room: args.room,
                scheduled_for: args.scheduled_for,
                notes: args.notes,
            })
            .await?;
        Ok(serde_json::to_value(check)?)
    }
}

pub struct ListDormStorageHandler {
    portal: Arc<dyn PortalApi>,
}

impl ListDormStorageHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "list_dorm_storage".to_string(),
            description: "List items in dormitory storage".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "room": { "type": "string", "description": "Optional: filter by room" }
                },
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListDormStorageHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: RoomFilterArgs = serde_json::from_value(args)?;
        let items = self.portal.list_dorm_storage(args.room.as_deref()).await?;
        Ok(json!({ "items": items }))
    }
}

pub struct CreateDormStorageHandler {
    portal: Arc<dyn PortalApi>,
}

impl CreateDormStorageHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "create_dorm_storage".to_string(),
            description: "Register an item for dormitory storage".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "room": { "type": "string" },
                    "description": { "type": "string" }
                },
                "required": ["room", "description"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for CreateDormStorageHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let item: NewDormStorageItem = serde_json::from_value(args)?;
        let stored = self.portal.create_dorm_storage(item).await?;
        Ok(serde_json::to_value(stored)?)
    }
}

// ── users ──

pub struct GetUserProfileHandler {
    portal: Arc<dyn PortalApi>,
}

#[derive(Deserialize)]
struct UserIdArgs {
    user_id: i64,
}

impl GetUserProfileHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "get_user_profile".to_string(),
            description: "Look up a portal user's profile".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "user_id": { "type": "integer" }
                },
                "required": ["user_id"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for GetUserProfileHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: UserIdArgs = serde_json::from_value(args)?;
        let profile = self.portal.get_user_profile(args.user_id).await?;
        Ok(serde_json::to_value(profile)?)
    }
}

// ── navigation (conditional) ──

pub struct NavigateHandler {
    navigator: Arc<dyn Navigator>,
}

#[derive(Deserialize)]
struct NavigateArgs {
    page: String,
    params: Option<Value>,
}

impl NavigateHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "navigate_to".to_string(),
            description: "Navigate the user to a portal page".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "page": { "type": "string", "description": "Page key, e.g. 'wiki' or 'facilities'" },
                    "params": { "type": "object", "description": "Optional page parameters" }
                },
                "required": ["page"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for NavigateHandler {
    async fn handle(&self, args: Value) -> anyhow::Result<Value> {
        let args: NavigateArgs = serde_json::from_value(args)?;
        let result = self.navigator.navigate_to(&args.page, args.params).await?;
        Ok(serde_json::to_value(result)?)
    }
}

// ── calendar (conditional) ──

pub struct ListCalendarEventsHandler {
    portal: Arc<dyn PortalApi>,
}

impl ListCalendarEventsHandler {
    #[inline]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "list_calendar_events".to_string(),
            description: "List upcoming calendar events".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListCalendarEventsHandler {
    async fn handle(&self, _args: Value) -> anyhow::Result<Value> {
        let events = self.portal.list_calendar_events().await?;
        Ok(json!({ "events": events }))
    }
}
