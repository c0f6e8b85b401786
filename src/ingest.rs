//! Batch Ingestion
//!
//! Turns raw JSON records from the data source into merge directives. This is
//! the only place that knows about the two parent-reference kinds
//! (`parentOrganizationKey`, `parentSiteKey`); everything downstream sees a
//! single normalized parent key.

use crate::error::IngestError;
use crate::merge::{Batch, Directive, RejectReason};
use crate::store::Node;
use crate::types::{Attributes, NodeKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Which parent reference wins when a record carries both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentPreference {
    #[default]
    OrganizationFirst,
    SiteFirst,
}

/// Record-level action marker (`"_action": "delete"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Delete,
}

/// A flat organization or site record as delivered by the data source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub parent_organization_key: Option<String>,
    #[serde(default)]
    pub parent_site_key: Option<String>,
    #[serde(default)]
    pub is_placeholder: bool,
    #[serde(default, rename = "_action", skip_serializing_if = "Option::is_none")]
    pub action: Option<RecordAction>,
    /// Everything else: names, contact fields, location, ...
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl RawRecord {
    /// The single parent key after applying `preference`.
    ///
    /// Empty strings count as absent.
    pub fn parent_key(&self, preference: ParentPreference) -> Option<NodeKey> {
        let organization = non_empty(&self.parent_organization_key);
        let site = non_empty(&self.parent_site_key);
        match preference {
            ParentPreference::OrganizationFirst => organization.or(site),
            ParentPreference::SiteFirst => site.or(organization),
        }
    }

    /// Convert into a merge directive
    pub fn into_directive(self, preference: ParentPreference) -> Directive {
        let parent = self.parent_key(preference);
        let Some(key) = non_empty(&self.key) else {
            return Directive::Invalid(RejectReason::MissingKey);
        };
        if self.action == Some(RecordAction::Delete) {
            return Directive::Delete(key);
        }
        Directive::Upsert(Node {
            key,
            parent,
            attributes: self.attributes,
            is_placeholder: self.is_placeholder,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.trim().is_empty()).map(str::to_string)
}

/// Nested hierarchy document: one organization with its child organizations
/// and child sites
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyPayload {
    #[serde(default)]
    pub organization: Option<Value>,
    #[serde(default)]
    pub child_organizations: Vec<Value>,
    #[serde(default)]
    pub child_sites: Vec<Value>,
}

impl HierarchyPayload {
    /// Flatten into record order: organization, child organizations, child sites
    pub fn into_records(self) -> Vec<Value> {
        self.organization
            .into_iter()
            .chain(self.child_organizations)
            .chain(self.child_sites)
            .collect()
    }

    fn looks_like(object: &serde_json::Map<String, Value>) -> bool {
        ["organization", "childOrganizations", "childSites"]
            .iter()
            .any(|field| object.contains_key(*field))
    }
}

/// Normalize already-decoded records into a batch.
///
/// Records that cannot be decoded become rejected directives; they never
/// abort the batch.
pub fn batch_from_values(records: Vec<Value>, preference: ParentPreference) -> Batch {
    let directives: Vec<Directive> = records
        .into_iter()
        .map(|value| match serde_json::from_value::<RawRecord>(value) {
            Ok(record) => record.into_directive(preference),
            Err(err) => Directive::Invalid(RejectReason::Malformed {
                detail: err.to_string(),
            }),
        })
        .collect();
    debug!(directives = directives.len(), "Normalized batch");
    Batch::from(directives)
}

/// Normalize typed records into a batch
pub fn batch_from_records(records: Vec<RawRecord>, preference: ParentPreference) -> Batch {
    records
        .into_iter()
        .map(|record| record.into_directive(preference))
        .collect::<Vec<_>>()
        .into()
}

/// Parse a batch document.
///
/// Accepts a JSON array of records, a hierarchy payload object
/// (`organization` / `childOrganizations` / `childSites`), or a single record.
pub fn parse_batch(json: &str, preference: ParentPreference) -> Result<Batch, IngestError> {
    let document: Value = serde_json::from_str(json)?;
    let records = match document {
        Value::Array(records) => records,
        Value::Object(object) if HierarchyPayload::looks_like(&object) => {
            let payload: HierarchyPayload = serde_json::from_value(Value::Object(object))?;
            payload.into_records()
        }
        other => vec![other],
    };
    Ok(batch_from_values(records, preference))
}
