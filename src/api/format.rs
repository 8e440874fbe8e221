//! Field projection for serialized resources.
//!
//! Related entities are projected as shallow reference shells - a
//! `{"username"}` for users, `{"name"}` for teams, `{"hash"}` for dragables -
//! never as full nested objects. A team's `password` never leaves the server,
//! regardless of who is asking.

use serde_json::{json, Map, Value};

use crate::auth::Principal;
use crate::database::models::{Annotation, AnnotationBody, Dragable, Team};

fn user_ref(username: &str) -> Value {
    json!({ "username": username })
}

fn team_ref(name: &str) -> Value {
    json!({ "name": name })
}

fn dragable_ref(hash: &str) -> Value {
    json!({ "hash": hash })
}

/// Serialize a team for the given viewer. Anonymous viewers get the reduced
/// field set (no timestamps); authenticated viewers additionally see
/// `created`. The password is excluded for everyone.
pub fn team_to_api_value(team: &Team, viewer: &Principal) -> Value {
    let mut obj = Map::new();
    obj.insert("name".into(), Value::String(team.name.clone()));
    obj.insert(
        "description".into(),
        Value::String(team.description.clone()),
    );
    obj.insert("public".into(), Value::Bool(team.public));
    obj.insert("created_by".into(), user_ref(&team.created_by));
    obj.insert(
        "members".into(),
        Value::Array(team.members.iter().map(|m| user_ref(m)).collect()),
    );
    if !viewer.is_anonymous() {
        obj.insert("created".into(), json!(team.created.to_rfc3339()));
    }
    Value::Object(obj)
}

pub fn teams_to_api_values(teams: &[Team], viewer: &Principal) -> Vec<Value> {
    teams
        .iter()
        .map(|team| team_to_api_value(team, viewer))
        .collect()
}

pub fn dragable_to_api_value(dragable: &Dragable) -> Value {
    json!({
        "hash": dragable.hash,
        "created_by": user_ref(&dragable.created_by),
        "team": team_ref(&dragable.team),
        "created": dragable.created.to_rfc3339(),
        "updated": dragable.updated.to_rfc3339(),
        "url": dragable.url,
        "title": dragable.title,
        "text": dragable.text,
        "xpath": dragable.xpath,
        "connected_to": dragable.connected_to.as_deref().map(dragable_ref),
    })
}

pub fn annotation_to_api_value(annotation: &Annotation) -> Value {
    let mut obj = Map::new();
    obj.insert("hash".into(), Value::String(annotation.hash.clone()));
    obj.insert(
        "type".into(),
        Value::String(annotation.body.kind().as_str().to_string()),
    );
    obj.insert("dragable".into(), dragable_ref(&annotation.dragable));
    obj.insert("created_by".into(), user_ref(&annotation.created_by));
    obj.insert("created".into(), json!(annotation.created.to_rfc3339()));
    obj.insert("updated".into(), json!(annotation.updated.to_rfc3339()));

    match &annotation.body {
        AnnotationBody::Note { note } => {
            obj.insert("note".into(), Value::String(note.clone()));
        }
        AnnotationBody::Url { url, description }
        | AnnotationBody::Image { url, description }
        | AnnotationBody::Video { url, description } => {
            obj.insert("url".into(), Value::String(url.clone()));
            if let Some(description) = description {
                obj.insert("description".into(), Value::String(description.clone()));
            }
        }
        AnnotationBody::File {
            filename,
            url,
            description,
        } => {
            if let Some(filename) = filename {
                obj.insert("filename".into(), Value::String(filename.clone()));
            }
            obj.insert("url".into(), Value::String(url.clone()));
            if let Some(description) = description {
                obj.insert("description".into(), Value::String(description.clone()));
            }
        }
        AnnotationBody::Connection { connected_to } => {
            obj.insert("connected_to".into(), dragable_ref(connected_to));
        }
    }

    Value::Object(obj)
}
