//! Statement model and ingestion-boundary validation
//!
//! A producer submits loosely structured JSON. [`parse_statement`] is the only
//! place that shape is inspected: everything downstream works with the typed
//! [`Statement`], whose optional parts are explicit `Option`s.

use chrono::{DateTime, Utc};
use lrs_common::{hash, time, uuid_utils, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One immutable learning-activity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: String,
    /// Stable learner identity derived from the agent identifier
    pub actor_key: String,
    pub verb_id: String,
    /// Course-level or sub-unit activity identifier
    pub activity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StatementResult>,
    /// Groups statements into one course attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// When the store received it
    pub stored: DateTime<Utc>,
}

/// Structured outcome of a statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
}

/// Score as reported by the producer
///
/// `scaled` is a pre-scaled fraction; `raw`/`max` is a ratio; a bare `raw`
/// is taken as a percentage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaled: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A validated statement plus what the store keeps alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRecord {
    pub statement: Statement,
    /// Fingerprint of the producer-supplied content (without `id`/`stored`)
    pub content_hash: String,
    /// Full statement JSON including assigned `id`, `timestamp` and `stored`
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
struct RawStatement {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    actor: Option<RawAgent>,
    #[serde(default)]
    verb: Option<RawVerb>,
    #[serde(default)]
    object: Option<RawObject>,
    #[serde(default)]
    result: Option<StatementResult>,
    #[serde(default)]
    context: Option<RawContext>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAgent {
    #[serde(default)]
    mbox: Option<String>,
    #[serde(default)]
    mbox_sha1sum: Option<String>,
    #[serde(default)]
    openid: Option<String>,
    #[serde(default)]
    account: Option<RawAccount>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    #[serde(default, rename = "homePage")]
    home_page: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVerb {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContext {
    #[serde(default)]
    registration: Option<String>,
}

/// Validate one submitted statement and prepare it for storage
///
/// Assigns an id when the producer did not, and uses `stored` as the event
/// timestamp when none was given. Missing actor identity, verb id or object
/// id is [`Error::InvalidInput`].
pub fn parse_statement(submitted: Value, stored: DateTime<Utc>) -> Result<StatementRecord> {
    let Value::Object(mut object) = submitted else {
        return Err(Error::InvalidInput("statement must be a JSON object".to_string()));
    };

    let raw: RawStatement = serde_json::from_value(Value::Object(object.clone()))
        .map_err(|e| Error::InvalidInput(format!("malformed statement: {}", e)))?;

    let actor = raw
        .actor
        .as_ref()
        .ok_or_else(|| Error::InvalidInput("statement has no actor".to_string()))?;
    let actor_key = actor_key(actor)?;

    let verb_id = non_empty(raw.verb.and_then(|v| v.id))
        .ok_or_else(|| Error::InvalidInput("statement has no verb.id".to_string()))?;
    let activity_id = non_empty(raw.object.and_then(|o| o.id))
        .ok_or_else(|| Error::InvalidInput("statement has no object.id".to_string()))?;

    let timestamp = match raw.timestamp.as_deref() {
        Some(value) => time::parse_rfc3339(value)?,
        None => stored,
    };

    let id = match non_empty(raw.id) {
        Some(id) => id,
        None => uuid_utils::generate().to_string(),
    };

    // Fingerprint covers exactly what the producer sent, minus what we assign
    object.remove("id");
    object.remove("stored");
    let content_hash = hash::sha256_hex(Value::Object(object.clone()).to_string().as_bytes());

    object.insert("id".to_string(), Value::String(id.clone()));
    object
        .entry("timestamp".to_string())
        .or_insert_with(|| Value::String(time::to_storage_string(&timestamp)));
    object.insert("stored".to_string(), Value::String(time::to_storage_string(&stored)));

    Ok(StatementRecord {
        statement: Statement {
            id,
            actor_key,
            verb_id,
            activity_id,
            result: raw.result,
            registration: non_empty(raw.context.and_then(|c| c.registration)),
            timestamp,
            stored,
        },
        content_hash,
        payload: Value::Object(object),
    })
}

/// Derive the stable actor key from an agent's identifier
///
/// First present wins: `mbox`, `mbox_sha1sum`, `openid`, `account`.
fn actor_key(agent: &RawAgent) -> Result<String> {
    if let Some(mbox) = non_empty(agent.mbox.clone()) {
        let address = mbox
            .strip_prefix("mailto:")
            .unwrap_or(&mbox)
            .trim()
            .to_lowercase();
        if !address.is_empty() {
            return Ok(address);
        }
    }
    if let Some(sha1) = non_empty(agent.mbox_sha1sum.clone()) {
        return Ok(format!("sha1:{}", sha1.to_lowercase()));
    }
    if let Some(openid) = non_empty(agent.openid.clone()) {
        return Ok(openid);
    }
    if let Some(account) = &agent.account {
        if let (Some(home_page), Some(name)) = (
            non_empty(account.home_page.clone()),
            non_empty(account.name.clone()),
        ) {
            return Ok(format!("{}|{}", home_page, name));
        }
    }
    Err(Error::InvalidInput(
        "actor has no identifier (mbox, mbox_sha1sum, openid or account)".to_string(),
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
