use http_client_instrumented::prelude::Method;
use serde_json::json;

use crate::config::{BodyDefaults, TargetConfig};

/// How the request body is produced for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStrategy {
    /// No body at all.
    None,
    /// The configured body, sent verbatim.
    Static(String),
    /// A task creation payload.
    Task,
    /// A search payload.
    Search,
    /// `{}`
    EmptyObject,
}

impl BodyStrategy {
    /// Pick the strategy for a method and path.
    ///
    /// `GET` and `DELETE` never send a body. `POST` prefers the static body, then picks a payload
    /// by path prefix. `PUT` sends the static body or `{}`. Other verbs send the static body if
    /// there is one.
    pub fn select(method: &Method, path: &str, static_body: Option<&str>) -> Self {
        let static_body = static_body.filter(|b| !b.is_empty()).map(str::to_string);

        if *method == Method::GET || *method == Method::DELETE {
            BodyStrategy::None
        } else if *method == Method::POST {
            match static_body {
                Some(body) => BodyStrategy::Static(body),
                None => Self::for_path(path),
            }
        } else if *method == Method::PUT {
            static_body
                .map(BodyStrategy::Static)
                .unwrap_or(BodyStrategy::EmptyObject)
        } else {
            static_body
                .map(BodyStrategy::Static)
                .unwrap_or(BodyStrategy::None)
        }
    }

    pub fn for_target(target: &TargetConfig) -> Self {
        Self::select(&target.method, &target.path, target.body.as_deref())
    }

    fn for_path(path: &str) -> Self {
        let path = path.to_ascii_lowercase();
        if path.starts_with("/tasks") {
            BodyStrategy::Task
        } else if path.starts_with("/search") {
            BodyStrategy::Search
        } else {
            BodyStrategy::EmptyObject
        }
    }

    pub fn render(&self, defaults: &BodyDefaults) -> Option<String> {
        match self {
            BodyStrategy::None => None,
            BodyStrategy::Static(body) => Some(body.clone()),
            BodyStrategy::Task => Some(task_body(defaults).to_string()),
            BodyStrategy::Search => Some(search_body(defaults, &defaults.query).to_string()),
            BodyStrategy::EmptyObject => Some("{}".to_string()),
        }
    }
}

pub fn task_body(defaults: &BodyDefaults) -> serde_json::Value {
    json!({
        "title": defaults.title,
        "description": defaults.description,
        "priority": defaults.priority,
        "tag_ids": defaults.tag_ids,
    })
}

/// A search payload for `query`, which may differ from the configured query.
pub fn search_body(defaults: &BodyDefaults, query: &str) -> serde_json::Value {
    json!({
        "query": query,
        "user_id": defaults.user_id,
        "limit": defaults.limit,
        "skip": defaults.skip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn defaults() -> BodyDefaults {
        BodyDefaults {
            title: "Perf Task".to_string(),
            description: "gust load".to_string(),
            priority: "medium".to_string(),
            tag_ids: vec!["1".to_string(), "2".to_string()],
            query: "meeting".to_string(),
            user_id: 1,
            limit: 20,
            skip: 0,
        }
    }

    fn rendered(method: Method, path: &str, static_body: Option<&str>) -> Option<serde_json::Value> {
        BodyStrategy::select(&method, path, static_body)
            .render(&defaults())
            .map(|b| serde_json::from_str(&b).unwrap())
    }

    #[test]
    fn post_picks_payload_by_path() {
        assert_eq!(
            Some(json!({"query": "meeting", "user_id": 1, "limit": 20, "skip": 0})),
            rendered(Method::POST, "/search", None)
        );
        assert_eq!(
            Some(json!({
                "title": "Perf Task",
                "description": "gust load",
                "priority": "medium",
                "tag_ids": ["1", "2"],
            })),
            rendered(Method::POST, "/Tasks/new", None)
        );
        assert_eq!(Some(json!({})), rendered(Method::POST, "/notes", None));
    }

    #[test]
    fn static_body_wins_for_post() {
        assert_eq!(
            BodyStrategy::Static(r#"{"a":1}"#.to_string()),
            BodyStrategy::select(&Method::POST, "/search", Some(r#"{"a":1}"#))
        );
    }

    #[test]
    fn verbs_without_body() {
        assert_eq!(
            BodyStrategy::None,
            BodyStrategy::select(&Method::GET, "/search", Some("ignored"))
        );
        assert_eq!(
            BodyStrategy::None,
            BodyStrategy::select(&Method::DELETE, "/tasks/1", None)
        );
        assert_eq!(
            BodyStrategy::None,
            BodyStrategy::select(&Method::PATCH, "/tasks/1", None)
        );
    }

    #[test]
    fn put_defaults_to_empty_object() {
        assert_eq!(Some(json!({})), rendered(Method::PUT, "/tasks/1", None));
        assert_eq!(
            Some(json!({"done": true})),
            rendered(Method::PUT, "/tasks/1", Some(r#"{"done":true}"#))
        );
    }

    #[test]
    fn search_body_uses_given_query() {
        assert_eq!("meeting-7", search_body(&defaults(), "meeting-7")["query"]);
    }
}
