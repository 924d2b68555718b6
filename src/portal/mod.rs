// Portal collaborator interfaces
// Typed access to the campus portal REST API, the wiki corpus, and the
// client-side navigator; tools and the RAG coordinator depend on these
// traits, not on concrete HTTP


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::rag::DocumentCorpus;
use crate::store::SourceDocument;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("portal API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("portal request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("portal response was not understood: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiArticle {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub school: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWikiArticle {
    pub title: String,
    pub content: String,
    pub school: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WikiArticleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub capacity: u32,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityBookingRequest {
    pub facility_id: i64,
    pub purpose: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityBooking {
    pub id: i64,
    pub facility_id: i64,
    pub purpose: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub available_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentBookingRequest {
    pub equipment_id: i64,
    pub quantity: u32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentBooking {
    pub id: i64,
    pub equipment_id: i64,
    pub quantity: u32,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DormCheck {
    pub id: i64,
    pub room: String,
    pub status: String,
    pub scheduled_for: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDormCheck {
    pub room: String,
    pub scheduled_for: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DormStorageItem {
    pub id: i64,
    pub room: String,
    pub description: String,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDormStorageItem {
    pub room: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigated_to: Option<String>,
}

/// REST CRUD collaborator. Every assistant tool maps onto exactly one
/// of these calls.
#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn list_wiki_articles(&self) -> Result<Vec<WikiArticle>, PortalError>;
    async fn get_wiki_article(&self, id: i64) -> Result<WikiArticle, PortalError>;
    async fn create_wiki_article(&self, article: NewWikiArticle)
    -> Result<WikiArticle, PortalError>;
    async fn update_wiki_article(
        &self,
        id: i64,
        update: WikiArticleUpdate,
    ) -> Result<WikiArticle, PortalError>;
    async fn delete_wiki_article(&self, id: i64) -> Result<(), PortalError>;

    async fn list_facilities(&self) -> Result<Vec<Facility>, PortalError>;
    async fn book_facility(
        &self,
        request: FacilityBookingRequest,
    ) -> Result<FacilityBooking, PortalError>;

    async fn list_equipment(&self) -> Result<Vec<EquipmentItem>, PortalError>;
    async fn book_equipment(
        &self,
        request: EquipmentBookingRequest,
    ) -> Result<EquipmentBooking, PortalError>;

    async fn list_dorm_checks(&self, room: Option<&str>) -> Result<Vec<DormCheck>, PortalError>;
    async fn create_dorm_check(&self, check: NewDormCheck) -> Result<DormCheck, PortalError>;

    async fn list_dorm_storage(&self, room: Option<&str>)
    -> Result<Vec<DormStorageItem>, PortalError>;
    async fn create_dorm_storage(
        &self,
        item: NewDormStorageItem,
    ) -> Result<DormStorageItem, PortalError>;

    async fn get_user_profile(&self, id: i64) -> Result<UserProfile, PortalError>;

    async fn list_calendar_events(&self) -> Result<Vec<CalendarEvent>, PortalError>;
}

/// Client-side navigation collaborator. Present only when the hosting
/// surface can actually move the user somewhere.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate_to(
        &self,
        page: &str,
        params: Option<Value>,
    ) -> Result<NavigationResult, PortalError>;
}

/// HTTP implementation of [`PortalApi`] against the portal backend.
#[derive(Debug, Clone)]
pub struct RestPortalApi {
    http: reqwest::Client,
    base_url: Url,
}

impl RestPortalApi {
    #[inline]
    pub fn new(base_url: Url) -> Result<Self, PortalError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PortalError> {
        self.base_url
            .join(path)
            .map_err(|e| PortalError::InvalidResponse(format!("invalid endpoint {path}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PortalError> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PortalError> {
        let url = self.endpoint(path)?;
        debug!("GET {} {:?}", url, query);
        let response = self.http.get(url).query(query).send().await?;
        decode(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, PortalError> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        let response = self.http.post(url).json(body).send().await?;
        decode(response).await
    }

    async fn put_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, PortalError> {
        let url = self.endpoint(path)?;
        debug!("PUT {}", url);
        let response = self.http.put(url).json(body).send().await?;
        decode(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), PortalError> {
        let url = self.endpoint(path)?;
        debug!("DELETE {}", url);
        let response = self.http.delete(url).send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PortalError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PortalError> {
    let status = response.status();
    if !status.is_success() {
        return Err(PortalError::Http {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }

    response
        .json()
        .await
        .map_err(|e| PortalError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl PortalApi for RestPortalApi {
    async fn list_wiki_articles(&self) -> Result<Vec<WikiArticle>, PortalError> {
        self.get_json("api/wiki").await
    }

    async fn get_wiki_article(&self, id: i64) -> Result<WikiArticle, PortalError> {
        self.get_json(&format!("api/wiki/{id}")).await
    }

    async fn create_wiki_article(
        &self,
        article: NewWikiArticle,
    ) -> Result<WikiArticle, PortalError> {
        self.post_json("api/wiki", &article).await
    }

    async fn update_wiki_article(
        &self,
        id: i64,
        update: WikiArticleUpdate,
    ) -> Result<WikiArticle, PortalError> {
        self.put_json(&format!("api/wiki/{id}"), &update).await
    }

    async fn delete_wiki_article(&self, id: i64) -> Result<(), PortalError> {
        self.delete(&format!("api/wiki/{id}")).await
    }

    async fn list_facilities(&self) -> Result<Vec<Facility>, PortalError> {
        self.get_json("api/facilities").await
    }

    async fn book_facility(
        &self,
        request: FacilityBookingRequest,
    ) -> Result<FacilityBooking, PortalError> {
        self.post_json("api/facilities/bookings", &request).await
    }

    async fn list_equipment(&self) -> Result<Vec<EquipmentItem>, PortalError> {
        self.get_json("api/equipment").await
    }

    async fn book_equipment(
        &self,
        request: EquipmentBookingRequest,
    ) -> Result<EquipmentBooking, PortalError> {
        self.post_json("api/equipment/bookings", &request).await
    }

    async fn list_dorm_checks(&self, room: Option<&str>) -> Result<Vec<DormCheck>, PortalError> {
        match room {
            Some(room) => {
                self.get_json_with_query("api/dorm/checks", &[("room", room)])
                    .await
            }
            None => self.get_json("api/dorm/checks").await,
        }
    }

    async fn create_dorm_check(&self, check: NewDormCheck) -> Result<DormCheck, PortalError> {
        self.post_json("api/dorm/checks", &check).await
    }

    async fn list_dorm_storage(
        &self,
        room: Option<&str>,
    ) -> Result<Vec<DormStorageItem>, PortalError> {
        match room {
            Some(room) => {
                self.get_json_with_query("api/dorm/storage", &[("room", room)])
                    .await
            }
            None => self.get_json("api/dorm/storage").await,
        }
    }

    async fn create_dorm_storage(
        &self,
        item: NewDormStorageItem,
    ) -> Result<DormStorageItem, PortalError> {
        self.post_json("api/dorm/storage", &item).await
    }

    async fn get_user_profile(&self, id: i64) -> Result<UserProfile, PortalError> {
        self.get_json(&format!("api/users/{id}")).await
    }

    async fn list_calendar_events(&self) -> Result<Vec<CalendarEvent>, PortalError> {
        self.get_json("api/calendar/events").await
    }
}

/// The wiki listing doubles as the RAG corpus.
#[async_trait]
impl DocumentCorpus for RestPortalApi {
    async fn list_all(&self) -> anyhow::Result<Vec<SourceDocument>> {
        let articles = self.list_wiki_articles().await?;
        Ok(articles.into_iter().map(source_from_article).collect())
    }
}

/// Map a wiki article into the store's source-document shape.
#[inline]
pub fn source_from_article(article: WikiArticle) -> SourceDocument {
    SourceDocument {
        id: article.id,
        title: article.title,
        content: article.content,
        group: article.school,
        author: article.author,
        created_at: article.created_at,
    }
}
