//! CRUD access to the user's data records.

use crate::{ApiClient, ApiError, Id};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded;

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_CATEGORY: &str = "analytics";

/// Fetch a single page of records.
pub async fn list(
    client: &ApiClient,
    query: &DataQuery,
) -> Result<Page<Record>, ApiError> {
    let path = format!("{}?{}", super::DATA, query.to_query_string());
    client.get(&path).await
}

pub async fn create(
    client: &ApiClient,
    record: &RecordInput,
) -> Result<Record, ApiError> {
    client.post(super::DATA, record).await
}

pub async fn update(
    client: &ApiClient,
    id: &Id,
    record: &RecordInput,
) -> Result<Record, ApiError> {
    client.put(&super::data_record(id), record).await
}

pub async fn delete(client: &ApiClient, id: &Id) -> Result<(), ApiError> {
    client.delete(&super::data_record(id)).await
}

/// Aggregate statistics across all records, as used by the dashboard.
pub async fn summary(client: &ApiClient) -> Result<Value, ApiError> {
    let response: SummaryResponse = client.get(super::DATA_SUMMARY).await?;
    Ok(response.summary)
}

/// Search, filter and pagination parameters for [`list()`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

impl DataQuery {
    pub fn page(page: u32) -> Self {
        DataQuery {
            page,
            ..DataQuery::default()
        }
    }

    /// Encode the query, leaving out anything unset or empty.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer
            .append_pair("page", &self.page.to_string())
            .append_pair("limit", &self.limit.to_string());

        let optional = [
            ("search", &self.search),
            ("category", &self.category),
            ("status", &self.status),
        ];

        for (key, value) in optional.iter() {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                serializer.append_pair(key, value);
            }
        }

        serializer.finish()
    }
}

impl Default for DataQuery {
    fn default() -> Self {
        DataQuery {
            page: 1,
            limit: DEFAULT_LIMIT,
            search: None,
            category: None,
            status: None,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
}

/// A stored data record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Record {
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// The editable fields of a [`Record`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub value: f64,
    pub unit: String,
    pub tags: Vec<String>,
    pub is_public: bool,
}

impl RecordInput {
    pub fn new<S: Into<String>>(title: S, value: f64) -> Self {
        RecordInput {
            title: title.into(),
            description: String::new(),
            category: String::from(DEFAULT_CATEGORY),
            value,
            unit: String::new(),
            tags: Vec::new(),
            is_public: false,
        }
    }
}

impl From<&Record> for RecordInput {
    fn from(record: &Record) -> RecordInput {
        RecordInput {
            title: record.title.clone(),
            description: record.description.clone(),
            category: record.category.clone(),
            value: record.value,
            unit: record.unit.clone(),
            tags: record.tags.clone(),
            is_public: record.is_public,
        }
    }
}

/// Split a comma-separated list of tags, dropping blanks.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    summary: Value,
}
