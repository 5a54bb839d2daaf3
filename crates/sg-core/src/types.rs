//! Core type definitions for Surrogate
//!
//! These types describe the requests observed by the agent and the local
//! targets they resolve to.

use serde::{Deserialize, Serialize};

// =============================================================================
// Well-known Values
// =============================================================================

/// Frame identifier of a tab's top-level document.
pub const MAIN_FRAME_ID: i32 = 0;

/// Tab identifier used by the browser for requests not tied to a tab.
pub const TAB_ID_NONE: i32 = -1;

/// Domain substituted when an initiating tab has no parseable domain.
pub const PLACEHOLDER_DOMAIN: &str = "example.org";

/// The only request method eligible for substitution.
pub const METHOD_GET: &str = "GET";

// =============================================================================
// Request Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Request type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUB_FRAME = 1 << 5;
        const MAIN_FRAME = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;
        const CSP_REPORT = 1 << 12;

        /// Types covered by the dynamic allow and redirect rules
        const RULE_TYPES = Self::MAIN_FRAME.bits() | Self::SCRIPT.bits() | Self::XMLHTTPREQUEST.bits();
    }
}

impl RequestType {
    /// Parse from browser request type string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "main_frame" => Self::MAIN_FRAME,
            "sub_frame" => Self::SUB_FRAME,
            "stylesheet" => Self::STYLESHEET,
            "script" => Self::SCRIPT,
            "image" => Self::IMAGE,
            "font" => Self::FONT,
            "object" => Self::OBJECT,
            "xmlhttprequest" => Self::XMLHTTPREQUEST,
            "ping" => Self::PING,
            "csp_report" => Self::CSP_REPORT,
            "media" => Self::MEDIA,
            "websocket" => Self::WEBSOCKET,
            _ => Self::OTHER,
        }
    }

    /// Browser names of every single type contained in this mask.
    pub fn names(&self) -> Vec<&'static str> {
        const NAMES: &[(RequestType, &str)] = &[
            (RequestType::MAIN_FRAME, "main_frame"),
            (RequestType::SUB_FRAME, "sub_frame"),
            (RequestType::STYLESHEET, "stylesheet"),
            (RequestType::SCRIPT, "script"),
            (RequestType::IMAGE, "image"),
            (RequestType::FONT, "font"),
            (RequestType::OBJECT, "object"),
            (RequestType::XMLHTTPREQUEST, "xmlhttprequest"),
            (RequestType::PING, "ping"),
            (RequestType::CSP_REPORT, "csp_report"),
            (RequestType::MEDIA, "media"),
            (RequestType::WEBSOCKET, "websocket"),
            (RequestType::OTHER, "other"),
        ];

        NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

// =============================================================================
// Request Details
// =============================================================================

/// An outbound request as reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub tab_id: i32,
    #[serde(default)]
    pub frame_id: i32,
    /// Browser request type string (e.g. `script`, `xmlhttprequest`)
    #[serde(rename = "type")]
    pub resource_type: String,
}

impl RequestDetails {
    /// Parsed request type.
    pub fn request_type(&self) -> RequestType {
        RequestType::from_str(&self.resource_type)
    }

    pub fn is_get(&self) -> bool {
        self.method == METHOD_GET
    }
}

// =============================================================================
// Local Target
// =============================================================================

/// A bundled resource a request resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalTarget {
    /// CDN host the request was addressed to
    pub source: String,
    /// Concrete library version served
    pub version: String,
    /// Bundle-relative path of the substitute
    pub path: String,
}

impl LocalTarget {
    /// Key identifying one distinct resource within a tab.
    pub fn injection_key(&self) -> String {
        format!("{}{}{}", self.source, self.path, self.version)
    }
}
