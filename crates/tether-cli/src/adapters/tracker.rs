//! Tracker-side adapter: GitHub-flavoured REST API.
//!
//! Read path: repositories for each tracked org plus the tracked user,
//! then the issues of each repository (`state=all`, 100 per page).
//! Write path: `PATCH` on the issue's `api_url` with only the changed
//! fields. Creating tracker issues from the mirror is not supported.

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tracing::debug;

use tether_core::adapter::{Side, SideAdapter, SideError, TrackedScope};
use tether_core::model::patch::FieldPatch;
use tether_core::model::record::{Record, RecordId};

use super::classify;

const API_BASE: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

pub struct TrackerAdapter {
    agent: ureq::Agent,
    token: String,
}

impl TrackerAdapter {
    pub fn new(agent: ureq::Agent, token: impl Into<String>) -> Self {
        Self {
            agent,
            token: token.into(),
        }
    }

    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, SideError> {
        let mut request = self
            .agent
            .get(url)
            .set("Authorization", &format!("token {}", self.token))
            .set("Accept", "application/vnd.github.v3+json");
        for (key, value) in query {
            request = request.query(key, value);
        }

        let response = request.call().map_err(|e| classify(Side::Tracker, e))?;
        response
            .into_json::<Value>()
            .map_err(|e| super::decode_error(Side::Tracker, &e))
    }

    /// `(owner, name)` pairs for every repository under `owner_url`,
    /// following pagination to the last page.
    fn list_repos(&self, url: &str) -> Result<Vec<(String, String)>, SideError> {
        let mut repos = Vec::new();
        let mut page = 1usize;

        loop {
            let per_page = PER_PAGE.to_string();
            let page_str = page.to_string();
            let listing =
                self.get_json(url, &[("per_page", &per_page), ("page", &page_str)])?;
            let batch = repo_names(&listing)?;
            let count = batch.len();
            repos.extend(batch);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(repos)
    }

    fn repo_issues(&self, owner: &str, name: &str) -> Result<Vec<Record>, SideError> {
        let url = format!("{API_BASE}/repos/{owner}/{name}/issues");
        let mut records = Vec::new();
        let mut page = 1usize;

        loop {
            let per_page = PER_PAGE.to_string();
            let page_str = page.to_string();
            let issues = self.get_json(
                &url,
                &[
                    ("state", "all"),
                    ("per_page", &per_page),
                    ("page", &page_str),
                ],
            )?;
            let issues = issues.as_array().ok_or_else(|| {
                SideError::permanent(Side::Tracker, "issue listing is not an array")
            })?;

            for issue in issues {
                // The issues endpoint also returns pull requests.
                if issue.get("pull_request").is_some() {
                    continue;
                }
                let record = issue_to_record(issue, owner, name)
                    .map_err(|e| SideError::permanent(Side::Tracker, e.to_string()))?;
                records.push(record);
            }

            if issues.len() < PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(repo = %format!("{owner}/{name}"), count = records.len(), "fetched issues");
        Ok(records)
    }
}

impl SideAdapter for TrackerAdapter {
    fn side(&self) -> Side {
        Side::Tracker
    }

    fn fetch_all(&self, scope: &TrackedScope) -> Result<Vec<Record>, SideError> {
        let mut repos = Vec::new();
        for org in &scope.orgs {
            repos.extend(self.list_repos(&format!("{API_BASE}/orgs/{org}/repos"))?);
        }
        if !scope.user.is_empty() {
            repos.extend(self.list_repos(&format!("{API_BASE}/users/{}/repos", scope.user))?);
        }

        let mut records = Vec::new();
        for (owner, name) in repos {
            records.extend(self.repo_issues(&owner, &name)?);
        }
        Ok(records)
    }

    fn apply_patch(&self, record: &Record, patch: &FieldPatch) -> Result<(), SideError> {
        if record.api_url.is_empty() {
            return Err(SideError::permanent(
                Side::Tracker,
                format!("{} has no api_url", record.id),
            ));
        }

        let body = patch_body(patch);
        self.agent
            .request("PATCH", &record.api_url)
            .set("Authorization", &format!("token {}", self.token))
            .set("Accept", "application/vnd.github.v3+json")
            .send_json(body)
            .map_err(|e| classify(Side::Tracker, e))?;
        Ok(())
    }

    fn create(&self, record: &Record) -> Result<Record, SideError> {
        // The mirror has no authority to open tracker issues; new mirror
        // rows surface as first-seen until triaged by hand.
        Err(SideError::permanent(
            Side::Tracker,
            format!("creating tracker issues is not supported ({})", record.id),
        ))
    }
}

/// `(owner, name)` pairs from one page of a repository listing.
fn repo_names(listing: &Value) -> Result<Vec<(String, String)>, SideError> {
    let repos = listing
        .as_array()
        .ok_or_else(|| SideError::permanent(Side::Tracker, "repo listing is not an array"))?;

    repos
        .iter()
        .map(|repo| {
            let owner = repo["owner"]["login"]
                .as_str()
                .ok_or_else(|| {
                    SideError::permanent(Side::Tracker, "repo entry missing owner.login")
                })?
                .to_string();
            let name = repo["name"]
                .as_str()
                .ok_or_else(|| SideError::permanent(Side::Tracker, "repo entry missing name"))?
                .to_string();
            Ok((owner, name))
        })
        .collect()
}

/// Map one issue object to the canonical record shape.
fn issue_to_record(issue: &Value, owner: &str, name: &str) -> Result<Record> {
    let number = issue["number"]
        .as_u64()
        .ok_or_else(|| anyhow!("issue in {owner}/{name} missing number"))?;
    let id = RecordId::new(owner, name, number);

    let title = issue["title"]
        .as_str()
        .ok_or_else(|| anyhow!("{id} missing title"))?
        .to_string();
    // Never propagate a null body; normalize to empty.
    let body = issue["body"].as_str().unwrap_or_default().to_string();
    let state = issue["state"]
        .as_str()
        .ok_or_else(|| anyhow!("{id} missing state"))?
        .parse()
        .with_context(|| format!("{id} state"))?;
    let labels = issue["labels"]
        .as_array()
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| label["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let record = Record {
        id,
        title,
        body,
        state,
        labels,
        source_url: issue["html_url"].as_str().unwrap_or_default().to_string(),
        api_url: issue["url"].as_str().unwrap_or_default().to_string(),
        mirror_page_id: String::new(),
    };
    Ok(record.normalized())
}

/// Native patch shape: only the fields that changed.
fn patch_body(patch: &FieldPatch) -> Value {
    let mut body = serde_json::Map::new();
    if let Some(title) = &patch.title {
        body.insert("title".to_string(), json!(title));
    }
    if let Some(text) = &patch.body {
        body.insert("body".to_string(), json!(text));
    }
    if let Some(state) = patch.state {
        body.insert("state".to_string(), json!(state.to_string()));
    }
    if let Some(labels) = &patch.labels {
        body.insert("labels".to_string(), json!(labels));
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::{PER_PAGE, issue_to_record, patch_body, repo_names};
    use serde_json::json;
    use tether_core::model::patch::FieldPatch;
    use tether_core::model::record::{BODY_LIMIT, RecordState};

    fn issue_fixture() -> serde_json::Value {
        json!({
            "number": 12,
            "title": "Login times out",
            "body": "Steps to reproduce…",
            "state": "open",
            "labels": [{"name": "bug"}, {"name": "auth"}],
            "html_url": "https://tracker.example/acme/widgets/issues/12",
            "url": "https://api.tracker.example/repos/acme/widgets/issues/12"
        })
    }

    #[test]
    fn maps_issue_fields() {
        let record = issue_to_record(&issue_fixture(), "acme", "widgets").unwrap();
        assert_eq!(record.id.to_string(), "acme/widgets#12");
        assert_eq!(record.title, "Login times out");
        assert_eq!(record.state, RecordState::Open);
        assert_eq!(record.labels, ["auth", "bug"], "labels normalized");
        assert_eq!(record.mirror_page_id, "");
        assert!(record.api_url.contains("/issues/12"));
    }

    #[test]
    fn null_body_becomes_empty_string() {
        let mut issue = issue_fixture();
        issue["body"] = serde_json::Value::Null;
        let record = issue_to_record(&issue, "acme", "widgets").unwrap();
        assert_eq!(record.body, "");
    }

    #[test]
    fn oversized_body_is_truncated_on_fetch() {
        let mut issue = issue_fixture();
        issue["body"] = json!("b".repeat(5000));
        let record = issue_to_record(&issue, "acme", "widgets").unwrap();
        assert_eq!(record.body.chars().count(), BODY_LIMIT);
    }

    #[test]
    fn unknown_state_is_an_error() {
        let mut issue = issue_fixture();
        issue["state"] = json!("merged");
        assert!(issue_to_record(&issue, "acme", "widgets").is_err());
    }

    #[test]
    fn repo_names_maps_owner_and_name() {
        let listing = json!([
            {"owner": {"login": "acme"}, "name": "widgets"},
            {"owner": {"login": "acme"}, "name": "gadgets"}
        ]);
        let repos = repo_names(&listing).unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0], ("acme".to_string(), "widgets".to_string()));
        assert!(repo_names(&json!({"message": "rate limited"})).is_err());
    }

    #[test]
    fn full_repo_page_keeps_the_listing_loop_going() {
        let page: Vec<_> = (0..PER_PAGE)
            .map(|i| json!({"owner": {"login": "acme"}, "name": format!("repo-{i}")}))
            .collect();
        let batch = repo_names(&json!(page)).unwrap();
        // A batch of exactly PER_PAGE entries means another page must be
        // fetched, same as the issue listing.
        assert_eq!(batch.len(), PER_PAGE);
    }

    #[test]
    fn patch_body_carries_only_set_fields() {
        let patch = FieldPatch {
            state: Some(RecordState::Closed),
            labels: Some(vec!["bug".to_string()]),
            ..FieldPatch::default()
        };
        let body = patch_body(&patch);
        assert_eq!(body["state"], "closed");
        assert_eq!(body["labels"], json!(["bug"]));
        assert!(body.get("title").is_none());
        assert!(body.get("body").is_none());
    }
}
