use core_types::{Page, RawRecord};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

// Using `#[serde(rename_all = "camelCase")]` to automatically map from JSON camelCase to Rust snake_case.

/// The wrapper every v5 endpoint returns. `result` is kept untyped until
/// `retCode` has been checked, since error responses carry an empty object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: Value,
}

/// The `result` of a paginated history endpoint.
///
/// Trading and transfer endpoints name the array `list`; deposit and
/// withdrawal records use `rows`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    #[serde(default, alias = "rows")]
    pub list: Vec<RawRecord>,
    #[serde(default)]
    pub next_page_cursor: Option<String>,
}

impl From<PageResult> for Page {
    fn from(result: PageResult) -> Self {
        Page {
            records: result.list,
            next_cursor: result.next_page_cursor.filter(|c| !c.is_empty()),
        }
    }
}

/// Metadata about the key used to sign the request (`GET /v5/user/query-api`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub api_key: String,
    /// 0 = read and write, 1 = read only.
    #[serde(default)]
    pub read_only: i64,
    #[serde(default)]
    pub uid: Value,
    #[serde(default)]
    pub permissions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub expired_at: String,
}

impl ApiKeyInfo {
    pub fn is_read_only(&self) -> bool {
        self.read_only == 1
    }

    pub fn uid(&self) -> String {
        match &self.uid {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        }
    }
}
