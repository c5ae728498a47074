//! Mirror-side adapter: Notion-flavoured pages API.
//!
//! Every record is one page in a single database. Record fields map to
//! page properties by name; the tracker coordinates (`Organization`,
//! `Repo`, `Github Issue Number`) identify the page, and the page id is
//! carried back on the record as `mirror_page_id` for the write path.

use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use tracing::{debug, warn};

use tether_core::adapter::{Side, SideAdapter, SideError, TrackedScope};
use tether_core::model::patch::FieldPatch;
use tether_core::model::record::{Record, RecordId};

use super::classify;

const API_BASE: &str = "https://api.notion.com/v1";
const API_VERSION: &str = "2021-08-16";
const PAGE_SIZE: u64 = 100;

pub struct MirrorAdapter {
    agent: ureq::Agent,
    token: String,
    database_id: String,
}

impl MirrorAdapter {
    pub fn new(
        agent: ureq::Agent,
        token: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            token: token.into(),
            database_id: database_id.into(),
        }
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Notion-Version", API_VERSION)
    }

    fn send(&self, method: &str, url: &str, body: Value) -> Result<Value, SideError> {
        let response = self
            .request(method, url)
            .send_json(body)
            .map_err(|e| classify(Side::Mirror, e))?;
        response
            .into_json::<Value>()
            .map_err(|e| super::decode_error(Side::Mirror, &e))
    }
}

impl SideAdapter for MirrorAdapter {
    fn side(&self) -> Side {
        Side::Mirror
    }

    fn fetch_all(&self, _scope: &TrackedScope) -> Result<Vec<Record>, SideError> {
        let url = format!("{API_BASE}/databases/{}/query", self.database_id);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }
            let batch = self.send("POST", &url, body)?;

            let results = batch["results"].as_array().ok_or_else(|| {
                SideError::permanent(Side::Mirror, "database query returned no results array")
            })?;
            for page in results {
                match page_to_record(page) {
                    Ok(record) => records.push(record),
                    // Pages added by hand without tracker coordinates
                    // cannot be reconciled; leave them alone.
                    Err(e) => warn!(error = %e, "skipping unmappable mirror page"),
                }
            }

            if !batch["has_more"].as_bool().unwrap_or(false) {
                break;
            }
            cursor = batch["next_cursor"].as_str().map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }

        debug!(count = records.len(), "fetched mirror pages");
        Ok(records)
    }

    fn apply_patch(&self, record: &Record, patch: &FieldPatch) -> Result<(), SideError> {
        if record.mirror_page_id.is_empty() {
            return Err(SideError::permanent(
                Side::Mirror,
                format!("{} has no mirror page", record.id),
            ));
        }

        let url = format!("{API_BASE}/pages/{}", record.mirror_page_id);
        let body = json!({ "properties": patch_properties(patch) });
        self.send("PATCH", &url, body)?;
        Ok(())
    }

    fn create(&self, record: &Record) -> Result<Record, SideError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": record_properties(record),
        });
        let page = self.send("POST", &format!("{API_BASE}/pages"), body)?;

        let page_id = page["id"].as_str().ok_or_else(|| {
            SideError::permanent(Side::Mirror, "created page response has no id")
        })?;

        let mut created = record.clone();
        created.mirror_page_id = page_id.to_string();
        Ok(created)
    }
}

fn plain_text(property: &Value, kind: &str) -> String {
    property[kind][0]["plain_text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

fn select_name(property: &Value) -> Option<&str> {
    property["select"]["name"].as_str()
}

/// Map one database page to the canonical record shape.
///
/// Fails only when the tracker coordinates are absent, which means the
/// page was not produced by this tool.
fn page_to_record(page: &Value) -> Result<Record> {
    let page_id = page["id"]
        .as_str()
        .ok_or_else(|| anyhow!("page has no id"))?;
    let props = &page["properties"];

    let org = plain_text(&props["Organization"], "rich_text");
    let repo = plain_text(&props["Repo"], "rich_text");
    let number = props["Github Issue Number"]["number"]
        .as_u64()
        .ok_or_else(|| anyhow!("page {page_id} has no issue number"))?;
    if org.is_empty() || repo.is_empty() {
        return Err(anyhow!("page {page_id} has no org/repo coordinates"));
    }
    let id = RecordId::new(org, repo, number);

    let state = select_name(&props["State"])
        .unwrap_or("open")
        .parse()
        .map_err(|e| anyhow!("{id}: {e}"))?;
    let labels = plain_text(&props["Labels"], "rich_text");
    let labels = if labels.is_empty() {
        Vec::new()
    } else {
        labels.split(',').map(|l| l.trim().to_string()).collect()
    };

    let record = Record {
        id,
        title: plain_text(&props["Title"], "title"),
        body: plain_text(&props["Body"], "rich_text"),
        state,
        labels,
        source_url: props["URL"]["url"].as_str().unwrap_or_default().to_string(),
        api_url: plain_text(&props["Github API URL"], "rich_text"),
        mirror_page_id: page_id.to_string(),
    };
    Ok(record.normalized())
}

fn rich_text_value(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

/// Property payload for an update: only the fields that changed.
fn patch_properties(patch: &FieldPatch) -> Value {
    let mut props = serde_json::Map::new();
    if let Some(title) = &patch.title {
        props.insert(
            "Title".to_string(),
            json!({ "title": [{ "text": { "content": title } }] }),
        );
    }
    if let Some(body) = &patch.body {
        props.insert("Body".to_string(), rich_text_value(body));
    }
    if let Some(state) = patch.state {
        props.insert(
            "State".to_string(),
            json!({ "select": { "name": state.to_string() } }),
        );
    }
    if let Some(labels) = &patch.labels {
        props.insert("Labels".to_string(), rich_text_value(&labels.join(", ")));
    }
    Value::Object(props)
}

/// Full property payload for a freshly created page.
fn record_properties(record: &Record) -> Value {
    json!({
        "Title": { "title": [{ "text": { "content": record.title } }] },
        "State": { "select": { "name": record.state.to_string() } },
        "Body": rich_text_value(&record.body),
        "Organization": rich_text_value(&record.id.org),
        "Repo": rich_text_value(&record.id.repo),
        "Labels": rich_text_value(&record.labels.join(", ")),
        "URL": { "url": record.source_url },
        "Github Issue Number": { "number": record.id.number },
        "Github API URL": rich_text_value(&record.api_url),
        "Type": { "multi_select": [{ "name": "github" }] },
    })
}

#[cfg(test)]
mod tests {
    use super::{page_to_record, patch_properties, record_properties};
    use serde_json::json;
    use tether_core::model::patch::FieldPatch;
    use tether_core::model::record::{Record, RecordId, RecordState};

    fn page_fixture() -> serde_json::Value {
        json!({
            "id": "page-aaaa-bbbb",
            "properties": {
                "Title": { "title": [{ "plain_text": "Login times out" }] },
                "State": { "select": { "name": "closed" } },
                "Body": { "rich_text": [{ "plain_text": "Steps to reproduce…" }] },
                "Organization": { "rich_text": [{ "plain_text": "acme" }] },
                "Repo": { "rich_text": [{ "plain_text": "widgets" }] },
                "Labels": { "rich_text": [{ "plain_text": "bug, auth" }] },
                "URL": { "url": "https://tracker.example/acme/widgets/issues/12" },
                "Github Issue Number": { "number": 12 },
                "Github API URL": {
                    "rich_text": [{ "plain_text": "https://api.tracker.example/repos/acme/widgets/issues/12" }]
                }
            }
        })
    }

    #[test]
    fn maps_page_properties() {
        let record = page_to_record(&page_fixture()).unwrap();
        assert_eq!(record.id.to_string(), "acme/widgets#12");
        assert_eq!(record.title, "Login times out");
        assert_eq!(record.state, RecordState::Closed);
        assert_eq!(record.labels, ["auth", "bug"]);
        assert_eq!(record.mirror_page_id, "page-aaaa-bbbb");
    }

    #[test]
    fn page_without_issue_number_is_rejected() {
        let mut page = page_fixture();
        page["properties"]
            .as_object_mut()
            .unwrap()
            .remove("Github Issue Number");
        assert!(page_to_record(&page).is_err());
    }

    #[test]
    fn empty_rich_text_reads_as_empty_string() {
        let mut page = page_fixture();
        page["properties"]["Body"] = json!({ "rich_text": [] });
        let record = page_to_record(&page).unwrap();
        assert_eq!(record.body, "");
    }

    #[test]
    fn patch_properties_carry_only_set_fields() {
        let patch = FieldPatch {
            state: Some(RecordState::Closed),
            labels: Some(vec!["auth".to_string(), "bug".to_string()]),
            ..FieldPatch::default()
        };
        let props = patch_properties(&patch);
        assert_eq!(props["State"]["select"]["name"], "closed");
        assert_eq!(
            props["Labels"]["rich_text"][0]["text"]["content"],
            "auth, bug"
        );
        assert!(props.get("Title").is_none());
        assert!(props.get("Body").is_none());
    }

    #[test]
    fn create_payload_covers_every_column() {
        let record = Record {
            id: RecordId::new("acme", "widgets", 12),
            title: "Login times out".to_string(),
            state: RecordState::Open,
            ..Record::default()
        };
        let props = record_properties(&record);
        for key in [
            "Title",
            "State",
            "Body",
            "Organization",
            "Repo",
            "Labels",
            "URL",
            "Github Issue Number",
            "Github API URL",
            "Type",
        ] {
            assert!(props.get(key).is_some(), "missing {key}");
        }
        assert_eq!(props["Github Issue Number"]["number"], 12);
        assert_eq!(props["Type"]["multi_select"][0]["name"], "github");
    }
}
