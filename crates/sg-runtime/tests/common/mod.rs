#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sg_core::RequestDetails;
use sg_runtime::{Coordinator, MemoryArea, MemoryRuleEngine, Storage, StorageArea, StorageError, View};

pub const JQUERY_364: &str = "https://ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery.min.js";
pub const JQUERY_214: &str = "https://ajax.googleapis.com/ajax/libs/jquery/2.1.4/jquery.min.js";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    WhitelistState { tab: i32, whitelisted: bool, injection_count: usize },
    InjectionCount { tab: i32, injection_count: usize, show_badge: bool },
    ClearBadge { tab: i32 },
}

/// View remembering every render call.
#[derive(Debug, Default)]
pub struct RecordingView {
    rendered: Mutex<Vec<Rendered>>,
}

impl RecordingView {
    pub fn take(&self) -> Vec<Rendered> {
        std::mem::take(&mut *self.rendered.lock().unwrap())
    }

    fn push(&self, rendered: Rendered) {
        self.rendered.lock().unwrap().push(rendered);
    }
}

impl View for RecordingView {
    fn render_whitelist_state(&self, tab: i32, whitelisted: bool, injection_count: usize) {
        self.push(Rendered::WhitelistState {
            tab,
            whitelisted,
            injection_count,
        });
    }

    fn render_injection_count(&self, tab: i32, injection_count: usize, show_badge: bool) {
        self.push(Rendered::InjectionCount {
            tab,
            injection_count,
            show_badge,
        });
    }

    fn clear_badge(&self, tab: i32) {
        self.push(Rendered::ClearBadge { tab });
    }
}

/// Memory area counting writes.
#[derive(Debug, Default)]
pub struct CountingArea {
    inner: MemoryArea,
    writes: AtomicUsize,
}

impl CountingArea {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageArea for CountingArea {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.inner.get(key).await
    }

    async fn get_all(&self) -> Result<Map<String, Value>, StorageError> {
        self.inner.get_all().await
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(items).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key).await
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub struct Harness {
    pub coordinator: Coordinator,
    pub engine: Arc<MemoryRuleEngine>,
    pub view: Arc<RecordingView>,
    pub local: Arc<CountingArea>,
}

pub fn harness_with(local: Value, managed: Value) -> Harness {
    let local_area = Arc::new(CountingArea {
        inner: MemoryArea::with_items(object(local)),
        writes: AtomicUsize::new(0),
    });
    let storage = Storage::new(
        local_area.clone(),
        Arc::new(MemoryArea::read_only("managed", object(managed))),
        Arc::new(MemoryArea::new()),
    );

    let engine = Arc::new(MemoryRuleEngine::new());
    let view = Arc::new(RecordingView::default());

    Harness {
        coordinator: Coordinator::new(storage, engine.clone(), view.clone()),
        engine,
        view,
        local: local_area,
    }
}

pub fn harness() -> Harness {
    harness_with(Value::Object(Map::new()), Value::Object(Map::new()))
}

pub fn request(request_id: &str, url: &str, resource_type: &str, tab_id: i32) -> RequestDetails {
    RequestDetails {
        request_id: request_id.to_string(),
        url: url.to_string(),
        method: "GET".to_string(),
        tab_id,
        frame_id: 0,
        resource_type: resource_type.to_string(),
    }
}
