//! Replay a script of browser events through the runtime.
//!
//! A script is a JSON array of events tagged by `event`:
//!
//! ```json
//! [
//!   {"event": "tabCreated", "tabId": 1, "url": "https://news.test/"},
//!   {"event": "beforeRequest", "requestId": "r1", "url": "https://ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery.min.js",
//!    "method": "GET", "tabId": 1, "type": "script"},
//!   {"event": "requestCompleted", "requestId": "r1"}
//! ]
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use sg_core::{Candidacy, Promotion, RequestDetails, StatisticKey};
use sg_runtime::{Coordinator, LogView, MemoryRuleEngine, RuntimeConfig};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    TabCreated { tab_id: i32, url: Option<String> },
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_id: i32 },
    BeforeRequest(RequestDetails),
    #[serde(rename_all = "camelCase")]
    RequestCompleted { request_id: String },
    #[serde(rename_all = "camelCase")]
    RequestError { request_id: String },
    BeforeSendHeaders(RequestDetails),
    #[serde(rename_all = "camelCase")]
    Navigation {
        tab_id: i32,
        #[serde(default)]
        frame_id: i32,
        url: String,
    },
    UpdateSetting { key: String, value: Value },
    ClearSetting { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub events: usize,
    pub injected: u64,
    pub sanitized: u64,
    pub blocked: u64,
}

pub fn load_script(path: &Path) -> Result<Vec<Event>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;

    serde_json::from_str(&content).map_err(|e| format!("Invalid event script '{}': {}", path.display(), e))
}

pub fn run_simulation(config: &RuntimeConfig, events: Vec<Event>) -> Result<Summary, String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(run_simulation_async(config, events))
}

async fn run_simulation_async(config: &RuntimeConfig, events: Vec<Event>) -> Result<Summary, String> {
    let coordinator = Coordinator::from_config(config, Arc::new(MemoryRuleEngine::new()), Arc::new(LogView))
        .map_err(|e| e.to_string())?;
    coordinator.start(Vec::new()).await.map_err(|e| e.to_string())?;

    let count = events.len();
    for (index, event) in events.into_iter().enumerate() {
        let line = apply_event(&coordinator, event)
            .await
            .map_err(|e| format!("Event {}: {}", index, e))?;
        println!("[{index}] {line}");
    }

    coordinator.flush_statistics().await.map_err(|e| e.to_string())?;
    let statistics = coordinator.get_statistics().await.map_err(|e| e.to_string())?;

    Ok(Summary {
        events: count,
        injected: statistics.value(StatisticKey::AmountInjected),
        sanitized: statistics.value(StatisticKey::AmountSanitized),
        blocked: statistics.value(StatisticKey::AmountBlocked),
    })
}

async fn apply_event(coordinator: &Coordinator, event: Event) -> Result<String, sg_runtime::RuntimeError> {
    let line = match event {
        Event::TabCreated { tab_id, url } => {
            coordinator.on_tab_created(tab_id, url).await?;
            format!("tab {tab_id} created")
        }
        Event::TabRemoved { tab_id } => {
            coordinator.on_tab_removed(tab_id).await?;
            format!("tab {tab_id} removed")
        }
        Event::BeforeRequest(request) => match coordinator.on_before_request(&request).await? {
            Candidacy::Candidate { target, is_silent } => format!(
                "{} -> {}{}",
                request.request_id,
                target.path,
                if is_silent { " (silent)" } else { "" }
            ),
            Candidacy::Missing(reason) => format!("{} missing ({reason:?})", request.request_id),
            Candidacy::Ineligible => format!("{} ignored", request.request_id),
        },
        Event::RequestCompleted { request_id } => match coordinator.on_request_completed(&request_id).await? {
            Promotion::Injected {
                tab_identifier,
                injection_count,
                ..
            } => match injection_count {
                Some(count) => format!("{request_id} injected into tab {tab_identifier} ({count} total)"),
                None => format!("{request_id} injected outside any tab"),
            },
            Promotion::Silent => format!("{request_id} completed silently"),
            Promotion::Untracked => format!("{request_id} completed (untracked)"),
        },
        Event::RequestError { request_id } => {
            let tracked = coordinator.on_request_error(&request_id);
            format!("{request_id} failed{}", if tracked { ", context discarded" } else { "" })
        }
        Event::BeforeSendHeaders(request) => {
            let sanitized = coordinator.on_before_send_headers(&request).await?;
            format!("{} {}", request.request_id, if sanitized { "sanitized" } else { "untouched" })
        }
        Event::Navigation { tab_id, frame_id, url } => {
            coordinator.on_navigation(tab_id, frame_id, &url).await?;
            format!("tab {tab_id} frame {frame_id} navigated to {url}")
        }
        Event::UpdateSetting { key, value } => {
            coordinator.update_setting(&key, value.clone()).await?;
            format!("{key} = {value}")
        }
        Event::ClearSetting { key } => {
            coordinator.clear_setting(&key).await?;
            format!("{key} cleared")
        }
    };

    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"[
        {"event": "tabCreated", "tabId": 1, "url": "https://news.test/"},
        {"event": "beforeSendHeaders", "requestId": "r1", "url": "https://ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery.min.js",
         "method": "GET", "tabId": 1, "type": "script"},
        {"event": "beforeRequest", "requestId": "r1", "url": "https://ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery.min.js",
         "method": "GET", "tabId": 1, "type": "script"},
        {"event": "requestCompleted", "requestId": "r1"},
        {"event": "navigation", "tabId": 1, "url": "https://news.test/next"},
        {"event": "updateSetting", "key": "blockMissing", "value": true},
        {"event": "beforeRequest", "requestId": "r2", "url": "https://ajax.googleapis.com/ajax/libs/jquery/0.9.1/jquery.min.js",
         "method": "GET", "tabId": 1, "type": "script"}
    ]"#;

    #[test]
    fn test_simulation_summary() {
        let events: Vec<Event> = serde_json::from_str(SCRIPT).unwrap();
        let summary = run_simulation(&RuntimeConfig::default(), events).unwrap();

        assert_eq!(
            summary,
            Summary {
                events: 7,
                injected: 1,
                sanitized: 1,
                blocked: 1,
            }
        );
    }

    #[test]
    fn test_unknown_setting_fails() {
        let events = vec![Event::UpdateSetting {
            key: "colorScheme".to_string(),
            value: Value::Bool(true),
        }];
        let err = run_simulation(&RuntimeConfig::default(), events).unwrap_err();
        assert_eq!(err, "Event 0: Setting \"colorScheme\" does not exist.");
    }
}
