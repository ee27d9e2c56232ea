// src/resources/normalize.rs
//! Canonical field names for backend records.
//!
//! The backend is not consistent about naming (`_id` vs `id`, `fullName` vs
//! `name`, ...). Each canonical field is filled from the first alias that
//! holds a usable value; original fields are left in place.

use serde_json::{Map, Value};

const CREATOR_ID: &[&str] = &["id", "_id", "creatorId", "userId"];
const CREATOR_NAME: &[&str] = &["name", "fullName", "displayName", "username"];
const CREATOR_AVATAR: &[&str] = &["avatar", "avatarUrl", "profileImage"];

const CAMPAIGN_ID: &[&str] = &["id", "_id", "campaignId"];
const CAMPAIGN_TITLE: &[&str] = &["title", "name", "campaignName"];
const CAMPAIGN_BRAND: &[&str] = &["brandName", "brand.name", "company"];

/// Keys a list endpoint may wrap its array in, besides the plural noun
const COLLECTION_KEYS: &[&str] = &["data", "items"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Campaign,
    Creator,
    Raw,
}

impl Shape {
    pub fn apply(self, body: Value) -> Value {
        match self {
            Shape::Campaign => normalize_collection(body, "campaigns", normalize_campaign),
            Shape::Creator => normalize_collection(body, "creators", normalize_creator),
            Shape::Raw => body,
        }
    }
}

/// Dotted lookup: `brand.name` walks into nested objects
fn lookup<'a>(record: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn as_id(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) if !s.is_empty() => Some(Value::String(s.clone())),
        Value::Number(n) => Some(Value::String(n.to_string())),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(Value::String(s.clone())),
        _ => None,
    }
}

fn fill(
    record: &mut Map<String, Value>,
    field: &str,
    aliases: &[&str],
    convert: fn(&Value) -> Option<Value>,
) {
    let view: &Map<String, Value> = record;
    let resolved = aliases
        .iter()
        .filter_map(|alias| lookup(view, alias))
        .find_map(convert);
    if let Some(value) = resolved {
        record.insert(field.to_string(), value);
    }
}

pub fn normalize_creator(value: Value) -> Value {
    match value {
        Value::Object(mut record) => {
            fill(&mut record, "id", CREATOR_ID, as_id);
            fill(&mut record, "name", CREATOR_NAME, as_text);
            fill(&mut record, "avatar", CREATOR_AVATAR, as_text);
            Value::Object(record)
        }
        other => other,
    }
}

pub fn normalize_campaign(value: Value) -> Value {
    match value {
        Value::Object(mut record) => {
            fill(&mut record, "id", CAMPAIGN_ID, as_id);
            fill(&mut record, "title", CAMPAIGN_TITLE, as_text);
            fill(&mut record, "brandName", CAMPAIGN_BRAND, as_text);
            Value::Object(record)
        }
        other => other,
    }
}

/// Accepts a bare array, an object wrapping the array under `data`, `items`
/// or the plural noun, or a single record (possibly wrapped in `data`).
pub fn normalize_collection(body: Value, plural: &str, item: fn(Value) -> Value) -> Value {
    match body {
        Value::Array(items) => Value::Array(items.into_iter().map(item).collect()),
        Value::Object(mut wrapper) => {
            let key = COLLECTION_KEYS
                .iter()
                .copied()
                .chain(std::iter::once(plural))
                .find(|key| matches!(wrapper.get(*key), Some(Value::Array(_))));

            if let Some(key) = key {
                if let Some(Value::Array(items)) = wrapper.remove(key) {
                    let items = items.into_iter().map(item).collect();
                    wrapper.insert(key.to_string(), Value::Array(items));
                }
                return Value::Object(wrapper);
            }

            if let Some(Value::Object(_)) = wrapper.get("data") {
                if let Some(inner) = wrapper.remove("data") {
                    wrapper.insert("data".to_string(), item(inner));
                }
                return Value::Object(wrapper);
            }

            item(Value::Object(wrapper))
        }
        other => other,
    }
}
