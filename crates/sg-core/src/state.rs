//! Per-request and per-tab state
//!
//! A request accepted for substitution gets a pending context keyed by its
//! request identifier. When the request completes the context is promoted
//! into the owning tab's injection record; when it errors the context is
//! simply dropped. Tab contexts live for the lifetime of the tab and lose
//! their injections whenever the top-level frame navigates.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LocalTarget, TAB_ID_NONE};

// =============================================================================
// Contexts
// =============================================================================

/// Pending resolution context for an in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub tab_identifier: i32,
    pub target_details: LocalTarget,
    /// XHR self-test requests are tracked but never counted
    pub is_silent: bool,
}

/// A resource substituted into a tab, with the time it was last served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Injection {
    #[serde(flatten)]
    pub target: LocalTarget,
    pub last_injected_at: DateTime<Utc>,
}

/// Everything recorded about one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabContext {
    pub identifier: i32,
    #[serde(default)]
    pub injections: BTreeMap<String, Injection>,
    #[serde(default)]
    pub url: Option<String>,
}

impl TabContext {
    pub fn new(identifier: i32, url: Option<String>) -> Self {
        Self {
            identifier,
            injections: BTreeMap::new(),
            url,
        }
    }

    /// Number of distinct resources injected since the last navigation.
    pub fn injection_count(&self) -> usize {
        self.injections.len()
    }

    /// Record an injection. Returns true if the resource was not yet
    /// recorded for this navigation.
    pub fn record_injection(&mut self, target: LocalTarget, now: DateTime<Utc>) -> bool {
        let key = target.injection_key();
        self.injections
            .insert(
                key,
                Injection {
                    target,
                    last_injected_at: now,
                },
            )
            .is_none()
    }

    pub fn clear_injections(&mut self) {
        self.injections.clear();
    }
}

/// Result of promoting a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// No pending context existed for the request
    Untracked,
    /// Self-test request, discarded without counting
    Silent,
    /// Counted injection; `injection_count` is absent when the request
    /// belongs to no tab
    Injected {
        tab_identifier: i32,
        target: LocalTarget,
        injection_count: Option<usize>,
    },
}

// =============================================================================
// Tracker
// =============================================================================

/// Owner of all request and tab state.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    requests: HashMap<String, RequestContext>,
    tabs: BTreeMap<i32, TabContext>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Register a pending context, replacing any stale one for the same id.
    pub fn create_request_context(&mut self, request_id: &str, context: RequestContext) -> Option<RequestContext> {
        self.requests.insert(request_id.to_string(), context)
    }

    pub fn delete_request_context(&mut self, request_id: &str) -> Option<RequestContext> {
        self.requests.remove(request_id)
    }

    pub fn request_context(&self, request_id: &str) -> Option<&RequestContext> {
        self.requests.get(request_id)
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Promote a completed request into its tab's injection record.
    ///
    /// The pending context is always discarded. Tabs that were opened before
    /// tracking started get a context on first injection.
    pub fn register_injection(&mut self, request_id: &str, now: DateTime<Utc>) -> Promotion {
        let Some(context) = self.requests.remove(request_id) else {
            return Promotion::Untracked;
        };

        if context.is_silent {
            return Promotion::Silent;
        }

        let tab_identifier = context.tab_identifier;
        let injection_count = (tab_identifier != TAB_ID_NONE).then(|| {
            let tab = self
                .tabs
                .entry(tab_identifier)
                .or_insert_with(|| TabContext::new(tab_identifier, None));
            tab.record_injection(context.target_details.clone(), now);
            tab.injection_count()
        });

        Promotion::Injected {
            tab_identifier,
            target: context.target_details,
            injection_count,
        }
    }

    // -------------------------------------------------------------------------
    // Tabs
    // -------------------------------------------------------------------------

    /// Create contexts for `tabs`. Existing contexts are kept unless
    /// `replace_existing` is set.
    pub fn create_tab_contexts<I>(&mut self, tabs: I, replace_existing: bool)
    where
        I: IntoIterator<Item = (i32, Option<String>)>,
    {
        for (identifier, url) in tabs {
            if replace_existing || !self.tabs.contains_key(&identifier) {
                self.tabs.insert(identifier, TabContext::new(identifier, url));
            }
        }
    }

    pub fn tab_context(&self, tab_identifier: i32) -> Option<&TabContext> {
        self.tabs.get(&tab_identifier)
    }

    pub fn tab_contexts(&self) -> &BTreeMap<i32, TabContext> {
        &self.tabs
    }

    /// Replace every tab context, e.g. after reloading them from storage.
    pub fn replace_tab_contexts(&mut self, tabs: BTreeMap<i32, TabContext>) {
        self.tabs = tabs;
    }

    /// Record the document URL of a tab. Returns false for unknown tabs.
    pub fn update_tab_url(&mut self, tab_identifier: i32, url: &str) -> bool {
        match self.tabs.get_mut(&tab_identifier) {
            Some(tab) if tab_identifier != TAB_ID_NONE => {
                tab.url = Some(url.to_string());
                true
            }
            _ => false,
        }
    }

    /// Forget a tab's injections. Returns false for unknown tabs.
    pub fn clear_injections(&mut self, tab_identifier: i32) -> bool {
        match self.tabs.get_mut(&tab_identifier) {
            Some(tab) => {
                tab.clear_injections();
                true
            }
            None => false,
        }
    }

    pub fn remove_tab_context(&mut self, tab_identifier: i32) -> Option<TabContext> {
        self.tabs.remove(&tab_identifier)
    }
}
