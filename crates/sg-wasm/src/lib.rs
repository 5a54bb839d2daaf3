//! WebAssembly bindings for Surrogate

use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;

use sg_compiler::dynamic::RuleUpdate;
use sg_compiler::dynamic::{DOMAIN_EXCEPTIONS_RULE_ID, WHITELIST_RULE_ID, XHR_TEST_RULE_ID};
use sg_compiler::{domain_exceptions_rule, whitelist_rule, xhr_test_rule};
use sg_core::resource::DomainExceptions;
use sg_core::{
    extract_domain_from_url, normalize_domain, Analyzer, Candidacy, Environment, LocalTarget, RequestDetails,
    Resolver, ResourceMappings, Settings, Whitelist,
};

fn target_object(target: &LocalTarget) -> js_sys::Object {
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"source".into(), &JsValue::from_str(&target.source));
    let _ = js_sys::Reflect::set(&result, &"version".into(), &JsValue::from_str(&target.version));
    let _ = js_sys::Reflect::set(&result, &"path".into(), &JsValue::from_str(&target.path));
    result
}

/// Parse a settings object as read from local storage. Unreadable input
/// falls back to the defaults.
fn parse_settings(settings_json: Option<&str>) -> Settings {
    let local = match settings_json.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(_) => {
            warn("Ignoring unreadable settings, using defaults");
            Map::new()
        }
        None => Map::new(),
    };

    Settings::resolve(&local, &Map::new())
}

fn warn(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&JsValue::from_str(message));
    #[cfg(not(target_arch = "wasm32"))]
    let _ = message;
}

/// Short name and missing reason of a candidacy.
fn candidacy_kind(candidacy: &Candidacy) -> (&'static str, Option<&'static str>) {
    match candidacy {
        Candidacy::Ineligible => ("ineligible", None),
        Candidacy::Missing(reason) => (
            "missing",
            Some(match reason {
                sg_core::MissingReason::Xhr => "xhr",
                sg_core::MissingReason::DomainException => "domainException",
                sg_core::MissingReason::NoTarget => "noTarget",
                sg_core::MissingReason::NotInEnvironment => "notInEnvironment",
            }),
        ),
        Candidacy::Candidate { .. } => ("candidate", None),
    }
}

fn whitelist_from(domains: &JsValue) -> Whitelist {
    let domains = js_sys::Array::from(domains);
    Whitelist::from_domains(domains.iter().filter_map(|value| value.as_string()))
}

fn dynamic_updates(settings: &Settings) -> Vec<RuleUpdate> {
    let whitelist = settings.whitelist();

    vec![
        RuleUpdate::replace(WHITELIST_RULE_ID, whitelist_rule(&whitelist)),
        RuleUpdate::replace(
            DOMAIN_EXCEPTIONS_RULE_ID,
            domain_exceptions_rule(DomainExceptions::bundled()),
        ),
        RuleUpdate::replace(XHR_TEST_RULE_ID, xhr_test_rule(&whitelist, settings.xhr_test_domain())),
    ]
}

// =============================================================================
// Exports
// =============================================================================

/// Resolve a request URL to its local substitute, or `null`.
#[wasm_bindgen]
pub fn resolve(url: &str) -> JsValue {
    match Resolver::bundled().resolve(url) {
        Some(target) => target_object(&target).into(),
        None => JsValue::NULL,
    }
}

#[wasm_bindgen]
pub fn normalize_domain_js(domain: &str) -> String {
    normalize_domain(domain)
}

#[wasm_bindgen]
pub fn extract_domain_js(url: &str) -> Option<String> {
    extract_domain_from_url(url)
}

/// True iff `domain` is covered by one of `whitelisted_domains` (an array).
#[wasm_bindgen]
pub fn is_whitelisted(domain: &str, whitelisted_domains: JsValue) -> bool {
    whitelist_from(&whitelisted_domains).is_whitelisted(&normalize_domain(domain))
}

/// Match patterns for every intercepted host.
#[wasm_bindgen]
pub fn valid_host_patterns() -> js_sys::Array {
    ResourceMappings::bundled()
        .valid_host_patterns()
        .iter()
        .map(|pattern| JsValue::from_str(pattern))
        .collect()
}

/// True iff `path` is bundled in `environment` (`stable` or `staging`).
#[wasm_bindgen]
pub fn is_bundled(path: &str, environment: &str) -> Result<bool, JsValue> {
    let environment: Environment = environment.parse().map_err(|e: String| JsValue::from_str(&e))?;
    Ok(environment.manifest().contains(path))
}

/// Gatekeeper decision for a request.
///
/// `request_json` holds the browser's request details; `settings_json` the
/// stored settings object.
#[wasm_bindgen]
pub fn analyze_request(request_json: &str, tab_url: Option<String>, settings_json: Option<String>) -> Result<JsValue, JsValue> {
    let request: RequestDetails = serde_json::from_str(request_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid request details: {}", e)))?;
    let settings = parse_settings(settings_json.as_deref());

    let candidacy = Analyzer::bundled().analyze(&request, tab_url.as_deref(), &settings);
    let (kind, reason) = candidacy_kind(&candidacy);

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"candidacy".into(), &JsValue::from_str(kind));
    if let Some(reason) = reason {
        let _ = js_sys::Reflect::set(&result, &"reason".into(), &JsValue::from_str(reason));
    }
    if let Candidacy::Candidate { target, is_silent } = &candidacy {
        let _ = js_sys::Reflect::set(&result, &"target".into(), &target_object(target));
        let _ = js_sys::Reflect::set(&result, &"isSilent".into(), &JsValue::from(*is_silent));
    }

    Ok(result.into())
}

/// Dynamic rule updates for the stored settings, as JSON.
#[wasm_bindgen]
pub fn dynamic_rule_updates(settings_json: Option<String>) -> Result<String, JsValue> {
    let settings = parse_settings(settings_json.as_deref());
    serde_json::to_string(&dynamic_updates(&settings))
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize rules: {}", e)))
}
