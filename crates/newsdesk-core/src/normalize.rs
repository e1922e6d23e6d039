//! Raw payload normalization.
//!
//! Search and timeline responses from the social platform are deeply nested
//! and change shape without notice. This module walks them and yields one
//! [`ParsedEntry`] per tweet slot: either a [`CandidateRecord`] or an
//! explicit [`ParsedEntry::Unrecognized`] marker carrying the reason.
//!
//! # Shape
//!
//! ```text
//! result.timeline.instructions[]      first instruction with `entries`
//!   entries[].content.itemContent     single-item slot
//!     .tweet_results.result
//!   entries[].content.items[]         multi-item slot (conversations, modules)
//!     .item.itemContent.tweet_results.result
//! ```
//!
//! A missing instruction or entry container yields an empty sequence, never
//! an error. A malformed entry only affects itself. Pagination cursors
//! (`cursor-top-*`, `cursor-bottom-*`) are not posts and yield nothing.

use serde_json::Value;
use thiserror::Error;

use crate::models::CandidateRecord;

/// Why a timeline slot did not produce a candidate record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("entry carries no tweet result")]
    NoTweetResult,
    #[error("tweet result has no legacy body")]
    MissingLegacy,
    #[error("tweet is missing id_str")]
    MissingId,
    #[error("tweet is missing full_text")]
    MissingText,
}

/// Outcome of parsing one tweet slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEntry {
    Candidate(CandidateRecord),
    Unrecognized {
        entry_id: Option<String>,
        error: ShapeError,
    },
}

/// Returns the entry list of the first instruction that has one.
pub fn timeline_entries(payload: &Value) -> &[Value] {
    payload
        .pointer("/result/timeline/instructions")
        .and_then(Value::as_array)
        .and_then(|instructions| {
            instructions
                .iter()
                .find_map(|i| i.get("entries").and_then(Value::as_array))
        })
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Lazily parses every tweet slot in `payload`.
pub fn normalize(payload: &Value) -> impl Iterator<Item = ParsedEntry> + '_ {
    timeline_entries(payload).iter().flat_map(parse_entry)
}

/// Like [`normalize`], but drops unrecognized slots after logging them.
pub fn candidates(payload: &Value) -> impl Iterator<Item = CandidateRecord> + '_ {
    normalize(payload).filter_map(|parsed| match parsed {
        ParsedEntry::Candidate(record) => Some(record),
        ParsedEntry::Unrecognized { entry_id, error } => {
            tracing::debug!(entry_id = ?entry_id, reason = %error, "Skipping timeline entry");
            None
        }
    })
}

/// Extracts the platform user id from a profile lookup response.
pub fn profile_user_id(profile: &Value) -> Option<String> {
    match profile.pointer("/result/data/user/result/rest_id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

const CURSOR_PREFIX: &str = "cursor-";

fn parse_entry(entry: &Value) -> Vec<ParsedEntry> {
    let entry_id = entry
        .get("entryId")
        .and_then(Value::as_str)
        .map(str::to_string);

    if entry_id
        .as_deref()
        .is_some_and(|id| id.starts_with(CURSOR_PREFIX))
    {
        return Vec::new();
    }

    if let Some(items) = entry.pointer("/content/items").and_then(Value::as_array) {
        return items
            .iter()
            .map(|item| {
                match item.pointer("/item/itemContent/tweet_results/result") {
                    Some(result) => parse_tweet_result(result),
                    None => Err(ShapeError::NoTweetResult),
                }
                .map_or_else(
                    |error| ParsedEntry::Unrecognized {
                        entry_id: entry_id.clone(),
                        error,
                    },
                    ParsedEntry::Candidate,
                )
            })
            .collect();
    }

    let parsed = match entry.pointer("/content/itemContent/tweet_results/result") {
        Some(result) => parse_tweet_result(result),
        None => Err(ShapeError::NoTweetResult),
    };

    vec![match parsed {
        Ok(record) => ParsedEntry::Candidate(record),
        Err(error) => ParsedEntry::Unrecognized { entry_id, error },
    }]
}

fn parse_tweet_result(result: &Value) -> Result<CandidateRecord, ShapeError> {
    // Visibility-limited tweets wrap the real result one level down.
    let result = match (result.get("legacy"), result.get("tweet")) {
        (None, Some(inner)) => inner,
        _ => result,
    };

    let legacy = result.get("legacy").ok_or(ShapeError::MissingLegacy)?;
    let external_id = non_empty_str(legacy, "id_str").ok_or(ShapeError::MissingId)?;
    let full_text = non_empty_str(legacy, "full_text").ok_or(ShapeError::MissingText)?;

    let user = result.pointer("/core/user_results/result/legacy");
    let user_field = |key: &str| user.and_then(|u| non_empty_str(u, key));

    let media_url = legacy
        .pointer("/entities/media")
        .and_then(Value::as_array)
        .and_then(|media| media.first())
        .and_then(|m| non_empty_str(m, "media_url_https"));

    Ok(CandidateRecord {
        external_id,
        full_text,
        author_handle: user_field("screen_name"),
        author_name: user_field("name"),
        author_bio: user_field("description"),
        created_at: non_empty_str(legacy, "created_at"),
        media_url,
    })
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{search_payload, tweet};
    use serde_json::json;

    #[test]
    fn test_missing_instructions_yields_nothing() {
        assert_eq!(normalize(&json!({})).count(), 0);
        assert_eq!(normalize(&json!({ "result": { "timeline": {} } })).count(), 0);
        assert_eq!(normalize(&Value::Null).count(), 0);
    }

    #[test]
    fn test_instruction_without_entries_is_skipped() {
        let payload = json!({
            "result": { "timeline": { "instructions": [
                { "type": "TimelineClearCache" },
                { "type": "TimelineAddEntries", "entries": [
                    { "entryId": "tweet-1", "content": { "itemContent": { "tweet_results": { "result": tweet("1", "hello", "alice") } } } }
                ] }
            ] } }
        });
        let records: Vec<_> = candidates(&payload).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_id, "1");
    }

    #[test]
    fn test_single_item_entry_extracts_all_fields() {
        let payload = search_payload(vec![tweet("42", "New LLM paper out", "researcher")]);
        let records: Vec<_> = candidates(&payload).collect();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.external_id, "42");
        assert_eq!(r.full_text, "New LLM paper out");
        assert_eq!(r.author_handle.as_deref(), Some("researcher"));
        assert_eq!(r.author_name.as_deref(), Some("researcher display"));
        assert_eq!(r.author_bio.as_deref(), Some("bio of researcher"));
        assert_eq!(
            r.created_at.as_deref(),
            Some("Wed Oct 10 20:19:24 +0000 2018")
        );
        assert_eq!(r.media_url, None);
    }

    #[test]
    fn test_multi_item_entry_is_unwrapped() {
        let payload = json!({
            "result": { "timeline": { "instructions": [ { "entries": [
                { "entryId": "conversation-1", "content": { "items": [
                    { "item": { "itemContent": { "tweet_results": { "result": tweet("1", "first", "a") } } } },
                    { "item": { "itemContent": { "tweet_results": { "result": tweet("2", "second", "b") } } } }
                ] } }
            ] } ] } }
        });
        let ids: Vec<_> = candidates(&payload).map(|r| r.external_id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_cursor_entries_are_skipped_silently() {
        let mut payload = search_payload(vec![tweet("1", "hello", "alice")]);
        let entries = payload["result"]["timeline"]["instructions"][0]["entries"]
            .as_array_mut()
            .unwrap();
        entries.insert(0, json!({ "entryId": "cursor-top-0", "content": { "value": "abc" } }));
        entries.push(json!({ "entryId": "cursor-bottom-0", "content": { "value": "def" } }));

        let parsed: Vec<_> = normalize(&payload).collect();
        assert_eq!(parsed.len(), 1);
        assert!(matches!(parsed[0], ParsedEntry::Candidate(_)));
    }

    #[test]
    fn test_non_cursor_entry_without_tweet_is_unrecognized() {
        let mut payload = search_payload(vec![tweet("1", "hello", "alice")]);
        payload["result"]["timeline"]["instructions"][0]["entries"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "entryId": "promoted-7", "content": { "value": "ad" } }));

        let parsed: Vec<_> = normalize(&payload).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed[1],
            ParsedEntry::Unrecognized {
                entry_id: Some("promoted-7".to_string()),
                error: ShapeError::NoTweetResult,
            }
        );
    }

    #[test]
    fn test_missing_id_or_text_is_dropped() {
        let mut no_id = tweet("1", "text", "a");
        no_id["legacy"].as_object_mut().unwrap().remove("id_str");
        let mut no_text = tweet("2", "text", "a");
        no_text["legacy"]["full_text"] = json!("");
        let no_legacy = json!({ "rest_id": "3" });

        let payload = search_payload(vec![no_id, no_text, no_legacy, tweet("4", "ok", "b")]);
        let errors: Vec<_> = normalize(&payload)
            .filter_map(|p| match p {
                ParsedEntry::Unrecognized { error, .. } => Some(error),
                ParsedEntry::Candidate(_) => None,
            })
            .collect();
        assert_eq!(
            errors,
            vec![
                ShapeError::MissingId,
                ShapeError::MissingText,
                ShapeError::MissingLegacy
            ]
        );
        assert_eq!(candidates(&payload).count(), 1);
    }

    #[test]
    fn test_visibility_wrapper_is_unwrapped() {
        let wrapped = json!({
            "__typename": "TweetWithVisibilityResults",
            "tweet": tweet("9", "limited visibility", "c")
        });
        let payload = search_payload(vec![wrapped]);
        let records: Vec<_> = candidates(&payload).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_id, "9");
    }

    #[test]
    fn test_first_media_url_is_taken() {
        let mut t = tweet("5", "with picture", "d");
        t["legacy"]["entities"] = json!({ "media": [
            { "media_url_https": "https://pbs.example/1.jpg" },
            { "media_url_https": "https://pbs.example/2.jpg" }
        ] });
        let records: Vec<_> = candidates(&search_payload(vec![t])).collect();
        assert_eq!(
            records[0].media_url.as_deref(),
            Some("https://pbs.example/1.jpg")
        );
    }

    #[test]
    fn test_missing_user_leaves_author_empty() {
        let mut t = tweet("6", "anonymous", "e");
        t.as_object_mut().unwrap().remove("core");
        let records: Vec<_> = candidates(&search_payload(vec![t])).collect();
        assert_eq!(records[0].author_handle, None);
        assert_eq!(records[0].author_name, None);
    }

    #[test]
    fn test_profile_user_id() {
        let profile = json!({ "result": { "data": { "user": { "result": { "rest_id": "4398626122" } } } } });
        assert_eq!(profile_user_id(&profile).as_deref(), Some("4398626122"));
        assert_eq!(profile_user_id(&json!({ "result": { "data": {} } })), None);
        let empty = json!({ "result": { "data": { "user": { "result": { "rest_id": "" } } } } });
        assert_eq!(profile_user_id(&empty), None);
    }
}
