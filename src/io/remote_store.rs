use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::io::store::{Store, StoreError, StoreResult};
use crate::model::category::{Category, Priority};
use crate::model::config::RemoteConfig;
use crate::model::task::Task;
use crate::model::time_entry::TimeEntry;
use crate::ops::catalog_ops::{CategoryPatch, PriorityPatch};
use crate::ops::task_ops::TaskPatch;
use crate::ops::time_ops::StopPatch;

const TASKS: &str = "tasks";
const CATEGORIES: &str = "categories";
const PRIORITIES: &str = "priorities";
const TIME_ENTRIES: &str = "task_time_entries";

/// Client for the hosted backend's REST table API
pub struct RemoteStore {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: String,
}

impl RemoteStore {
    pub fn new(config: &RemoteConfig, access_token: String) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(RemoteStore {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token,
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
    }

    fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        user_id: &str,
        order: Option<&str>,
    ) -> StoreResult<Vec<T>> {
        let mut query = scope_query(user_id, None);
        query.push(("select", "*".to_string()));
        if let Some(order) = order {
            query.push(("order", order.to_string()));
        }
        tracing::debug!(table, "select");
        let resp = self
            .authed(self.client.get(table_url(&self.base_url, table)))
            .query(&query)
            .send()?;
        decode(check(resp)?)
    }

    fn insert<T: Serialize + DeserializeOwned>(&self, table: &str, record: &T) -> StoreResult<T> {
        let body = insert_body(record)?;
        tracing::debug!(table, "insert");
        let resp = self
            .authed(self.client.post(table_url(&self.base_url, table)))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()?;
        let rows: Vec<T> = decode(check(resp)?)?;
        rows.into_iter().next().ok_or_else(|| StoreError::Remote {
            status: 200,
            message: format!("insert into {} returned no row", table),
        })
    }

    fn patch<T: DeserializeOwned>(
        &self,
        table: &'static str,
        user_id: &str,
        id: i64,
        body: &Map<String, Value>,
    ) -> StoreResult<T> {
        tracing::debug!(table, id, "update");
        let resp = self
            .authed(self.client.patch(table_url(&self.base_url, table)))
            .header("Prefer", "return=representation")
            .query(&scope_query(user_id, Some(id)))
            .json(body)
            .send()?;
        let rows: Vec<T> = decode(check(resp)?)?;
        rows.into_iter()
            .next()
            .ok_or(StoreError::NotFound { table, id })
    }

    fn delete(&self, table: &'static str, user_id: &str, id: i64) -> StoreResult<()> {
        tracing::debug!(table, id, "delete");
        let resp = self
            .authed(self.client.delete(table_url(&self.base_url, table)))
            .header("Prefer", "return=representation")
            .query(&scope_query(user_id, Some(id)))
            .send()?;
        let rows: Vec<Value> = decode(check(resp)?)?;
        if rows.is_empty() {
            return Err(StoreError::NotFound { table, id });
        }
        Ok(())
    }
}

/// `<base>/rest/v1/<table>`
pub fn table_url(base: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base.trim_end_matches('/'), table)
}

/// Row filters: always the owner, optionally one id
pub fn scope_query(user_id: &str, id: Option<i64>) -> Vec<(&'static str, String)> {
    let mut query = vec![("user_id", format!("eq.{}", user_id))];
    if let Some(id) = id {
        query.push(("id", format!("eq.{}", id)));
    }
    query
}

/// Serialized record without `id`; the server assigns it.
pub fn insert_body<T: Serialize>(record: &T) -> StoreResult<Value> {
    let mut value = serde_json::to_value(record).map_err(StoreError::Decode)?;
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    Ok(value)
}

/// Message from an error body, falling back to the raw text
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn check(resp: Response) -> StoreResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    let message = error_message(&body);
    tracing::warn!(status = status.as_u16(), %message, "table API call failed");
    Err(StoreError::Remote {
        status: status.as_u16(),
        message,
    })
}

fn decode<T: DeserializeOwned>(resp: Response) -> StoreResult<T> {
    let text = resp.text()?;
    serde_json::from_str(&text).map_err(StoreError::Decode)
}

impl Store for RemoteStore {
    fn kind(&self) -> &'static str {
        "remote"
    }

    fn list_tasks(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        self.select(TASKS, user_id, Some("position.asc,created_at.desc"))
    }

    fn insert_task(&self, task: Task) -> StoreResult<Task> {
        self.insert(TASKS, &task)
    }

    fn update_task(
        &self,
        user_id: &str,
        id: i64,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Task> {
        self.patch(TASKS, user_id, id, &patch.to_json(now))
    }

    fn delete_task(&self, user_id: &str, id: i64) -> StoreResult<()> {
        self.delete(TASKS, user_id, id)
    }

    fn list_categories(&self, user_id: &str) -> StoreResult<Vec<Category>> {
        self.select(CATEGORIES, user_id, Some("name.asc"))
    }

    fn insert_category(&self, category: Category) -> StoreResult<Category> {
        self.insert(CATEGORIES, &category)
    }

    fn update_category(
        &self,
        user_id: &str,
        id: i64,
        patch: &CategoryPatch,
    ) -> StoreResult<Category> {
        self.patch(CATEGORIES, user_id, id, &patch.to_json())
    }

    fn delete_category(&self, user_id: &str, id: i64) -> StoreResult<()> {
        self.delete(CATEGORIES, user_id, id)
    }

    fn list_priorities(&self, user_id: &str) -> StoreResult<Vec<Priority>> {
        self.select(PRIORITIES, user_id, Some("level.asc"))
    }

    fn insert_priority(&self, priority: Priority) -> StoreResult<Priority> {
        self.insert(PRIORITIES, &priority)
    }

    fn update_priority(
        &self,
        user_id: &str,
        id: i64,
        patch: &PriorityPatch,
    ) -> StoreResult<Priority> {
        self.patch(PRIORITIES, user_id, id, &patch.to_json())
    }

    fn delete_priority(&self, user_id: &str, id: i64) -> StoreResult<()> {
        self.delete(PRIORITIES, user_id, id)
    }

    fn list_time_entries(&self, user_id: &str) -> StoreResult<Vec<TimeEntry>> {
        self.select(TIME_ENTRIES, user_id, Some("start_time.desc"))
    }

    fn insert_time_entry(&self, entry: TimeEntry) -> StoreResult<TimeEntry> {
        self.insert(TIME_ENTRIES, &entry)
    }

    fn stop_time_entry(
        &self,
        user_id: &str,
        id: i64,
        patch: &StopPatch,
    ) -> StoreResult<TimeEntry> {
        self.patch(TIME_ENTRIES, user_id, id, &patch.to_json())
    }

    fn delete_time_entry(&self, user_id: &str, id: i64) -> StoreResult<()> {
        self.delete(TIME_ENTRIES, user_id, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::task_ops::{NewTask, build_task};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_url() {
        assert_eq!(
            table_url("https://xyz.supabase.co/", "tasks"),
            "https://xyz.supabase.co/rest/v1/tasks"
        );
    }

    #[test]
    fn test_scope_query() {
        assert_eq!(
            scope_query("abc", Some(7)),
            vec![("user_id", "eq.abc".to_string()), ("id", "eq.7".to_string())]
        );
        assert_eq!(scope_query("abc", None).len(), 1);
    }

    #[test]
    fn test_insert_body_omits_id() {
        let task = build_task(NewTask::titled("Ship it"), 42, "u1", 3, Utc::now()).unwrap();
        let body = insert_body(&task).unwrap();
        assert!(body.get("id").is_none());
        assert_eq!(body["title"], "Ship it");
        assert_eq!(body["user_id"], "u1");
        assert_eq!(body["position"], 3);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"code":"42501","message":"permission denied"}"#),
            "permission denied"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_new_trims_base_url() {
        let store = RemoteStore::new(
            &RemoteConfig {
                url: "https://xyz.supabase.co/".into(),
                api_key: "anon".into(),
                timeout_secs: 5,
            },
            "token".into(),
        )
        .unwrap();
        assert_eq!(store.base_url, "https://xyz.supabase.co");
        assert_eq!(store.kind(), "remote");
    }
}
