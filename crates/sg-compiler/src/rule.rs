//! Declarative rule model
//!
//! Mirrors the browser's declarative network request rule schema closely
//! enough to be serialized straight into ruleset files.

use serde::{Deserialize, Serialize};
use sg_core::RequestType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Allow,
    Block,
    Redirect,
    ModifyHeaders,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub extension_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderOperation {
    pub header: String,
    pub operation: String,
}

impl HeaderOperation {
    pub fn remove(header: &str) -> Self {
        Self {
            header: header.to_string(),
            operation: "remove".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<Vec<HeaderOperation>>,
}

impl RuleAction {
    pub fn allow() -> Self {
        Self::of(ActionType::Allow)
    }

    pub fn block() -> Self {
        Self::of(ActionType::Block)
    }

    /// Redirect to a path inside the bundle (leading `/` added if missing).
    pub fn redirect(path: &str) -> Self {
        let extension_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Self {
            redirect: Some(Redirect { extension_path }),
            ..Self::of(ActionType::Redirect)
        }
    }

    pub fn remove_request_headers(headers: &[&str]) -> Self {
        Self {
            request_headers: Some(headers.iter().map(|h| HeaderOperation::remove(h)).collect()),
            ..Self::of(ActionType::ModifyHeaders)
        }
    }

    fn of(action_type: ActionType) -> Self {
        Self {
            action_type,
            redirect: None,
            request_headers: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_initiator_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<String>,
}

impl RuleCondition {
    pub fn for_types(types: RequestType) -> Self {
        Self {
            resource_types: types.names().into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn url_filter(mut self, filter: impl Into<String>) -> Self {
        self.url_filter = Some(filter.into());
        self
    }

    pub fn request_domains(mut self, domains: Vec<String>) -> Self {
        self.request_domains = Some(domains);
        self
    }

    pub fn initiator_domains(mut self, domains: Vec<String>) -> Self {
        self.initiator_domains = Some(domains);
        self
    }

    pub fn excluded_initiator_domains(mut self, domains: Vec<String>) -> Self {
        self.excluded_initiator_domains = Some(domains);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl Rule {
    pub fn new(id: u32, priority: u32, action: RuleAction, condition: RuleCondition) -> Self {
        Self {
            id,
            priority,
            action,
            condition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redirect_rule_json() {
        let rule = Rule::new(
            1,
            2,
            RuleAction::redirect("resources/jquery/3.6.4/jquery.min.jsm"),
            RuleCondition::for_types(RequestType::SCRIPT)
                .url_filter("||ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery."),
        );

        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({
                "id": 1,
                "priority": 2,
                "action": {
                    "type": "redirect",
                    "redirect": {"extensionPath": "/resources/jquery/3.6.4/jquery.min.jsm"}
                },
                "condition": {
                    "urlFilter": "||ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery.",
                    "resourceTypes": ["script"]
                }
            })
        );
    }

    #[test]
    fn test_modify_headers_json() {
        let action = RuleAction::remove_request_headers(&["Cookie"]);
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "type": "modifyHeaders",
                "requestHeaders": [{"header": "Cookie", "operation": "remove"}]
            })
        );
    }

    #[test]
    fn test_rule_round_trips_from_browser_json() {
        let json = json!({
            "id": 5000,
            "priority": 3,
            "action": {"type": "allow"},
            "condition": {"initiatorDomains": ["a.test"], "resourceTypes": ["script"]}
        });
        let rule: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(rule.action.action_type, ActionType::Allow);
        assert_eq!(rule.condition.initiator_domains, Some(vec!["a.test".to_string()]));
    }
}
