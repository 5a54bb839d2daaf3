//! Resource mapping table
//!
//! `host -> base path -> mold -> target`. Both levels below the host are
//! ordered lists evaluated first-match-wins, so overlapping prefixes resolve
//! by declaration order. The order below is curated and must be preserved.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

use super::sets::{self, ResourceSet, JAVASCRIPT};

// =============================================================================
// Table Types
// =============================================================================

/// What a mold resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceTarget {
    /// Bundle path, usually containing the version placeholder
    pub path: &'static str,
    #[serde(rename = "type")]
    pub mime_type: &'static str,
    /// Owning resource set, absent for pinned shorthand targets
    #[serde(skip)]
    pub set: Option<&'static str>,
}

impl From<ResourceSet> for ResourceTarget {
    fn from(set: ResourceSet) -> Self {
        Self {
            path: set.path,
            mime_type: set.mime_type,
            set: Some(set.name),
        }
    }
}

/// A path pattern with a version placeholder and the target it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mold {
    pub pattern: &'static str,
    pub target: ResourceTarget,
}

/// Molds registered under one base path of a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasePath {
    pub path: &'static str,
    pub molds: Vec<Mold>,
}

impl BasePath {
    /// First mold whose pattern is a prefix of `pattern`.
    pub fn find_mold(&self, pattern: &str) -> Option<&Mold> {
        self.molds.iter().find(|mold| pattern.starts_with(mold.pattern))
    }
}

/// Every base path registered for a CDN host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostMapping {
    pub host: &'static str,
    pub base_paths: Vec<BasePath>,
}

impl HostMapping {
    /// First declared base path that prefixes `path` (not the longest).
    pub fn match_base_path(&self, path: &str) -> Option<&BasePath> {
        self.base_paths.iter().find(|base| path.starts_with(base.path))
    }
}

/// The full mapping table with a host index.
#[derive(Debug, Clone)]
pub struct ResourceMappings {
    hosts: Vec<HostMapping>,
    index: HashMap<&'static str, usize>,
}

impl ResourceMappings {
    pub fn new(hosts: Vec<HostMapping>) -> Self {
        let index = hosts
            .iter()
            .enumerate()
            .map(|(i, mapping)| (mapping.host, i))
            .collect();
        Self { hosts, index }
    }

    /// The table shipped with the agent.
    pub fn bundled() -> &'static ResourceMappings {
        static MAPPINGS: OnceLock<ResourceMappings> = OnceLock::new();
        MAPPINGS.get_or_init(|| ResourceMappings::new(bundled_hosts()))
    }

    pub fn host(&self, host: &str) -> Option<&HostMapping> {
        self.index.get(host).map(|&i| &self.hosts[i])
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostMapping> {
        self.hosts.iter()
    }

    pub fn host_names(&self) -> Vec<&'static str> {
        self.hosts.iter().map(|mapping| mapping.host).collect()
    }

    /// Match patterns (`*://host/*`) covering every mapped host.
    pub fn valid_host_patterns(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|mapping| format!("*://{}/*", mapping.host))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

// =============================================================================
// Bundled Table
// =============================================================================

fn versioned(pattern: &'static str, set: ResourceSet) -> Mold {
    Mold {
        pattern,
        target: set.into(),
    }
}

fn pinned(pattern: &'static str, path: &'static str) -> Mold {
    Mold {
        pattern,
        target: ResourceTarget {
            path,
            mime_type: JAVASCRIPT,
            set: None,
        },
    }
}

fn host(host: &'static str, base_paths: Vec<BasePath>) -> HostMapping {
    HostMapping { host, base_paths }
}

fn base(path: &'static str, molds: Vec<Mold>) -> BasePath {
    BasePath { path, molds }
}

fn google_hosted_libraries() -> Vec<Mold> {
    vec![
        versioned("angularjs/{version}/angular.", sets::ANGULAR),
        versioned("dojo/{version}/dojo/dojo.", sets::DOJO),
        versioned("ext-core/{version}/ext-core.", sets::EXT_CORE),
        versioned("ext-core/{version}/ext-core-debug.", sets::EXT_CORE),
        versioned("jquery/{version}/jquery.", sets::JQUERY),
        versioned("jqueryui/{version}/jquery-ui.js", sets::JQUERY_UI),
        versioned("jqueryui/{version}/jquery-ui.min.js", sets::JQUERY_UI),
        versioned("mootools/{version}/mootools-yui-compressed.", sets::MOOTOOLS),
        versioned("prototype/{version}/prototype.", sets::PROTOTYPE_JS),
        versioned("scriptaculous/{version}/scriptaculous.", sets::SCRIPTACULOUS),
        versioned("swfobject/{version}/swfobject.", sets::SWFOBJECT),
        versioned("webfont/{version}/webfont.", sets::WEBFONT),
        // Basic shorthand notations [deprecated]
        pinned("dojo/1/dojo/dojo.", "resources/dojo/1.6.1/dojo/dojo.jsm"),
        pinned("jquery/1/jquery.", "resources/jquery/1.11.1/jquery.min.jsm"),
        pinned("jqueryui/1/jquery-ui.js", "resources/jqueryui/1.10.4/jquery-ui.min.jsm"),
        pinned("jqueryui/1/jquery-ui.min.js", "resources/jqueryui/1.10.4/jquery-ui.min.jsm"),
        pinned("mootools/1/mootools-yui-compressed.", "resources/mootools/1.1.2/mootools-yui-compressed.jsm"),
        pinned("prototype/1/prototype.", "resources/prototype/1.7.1.0/prototype.jsm"),
        pinned("scriptaculous/1/scriptaculous.", "resources/scriptaculous/1.9.0/scriptaculous.jsm"),
        pinned("swfobject/2/swfobject.", "resources/swfobject/2.2/swfobject.jsm"),
        pinned("webfont/1/webfont.", "resources/webfont/1.5.18/webfont.jsm"),
    ]
}

fn microsoft_ajax() -> Vec<Mold> {
    vec![
        versioned("jQuery/jquery-{version}.", sets::JQUERY),
        versioned("jquery/jquery-{version}.", sets::JQUERY),
        versioned("modernizr/modernizr-{version}.", sets::MODERNIZR),
    ]
}

fn yandex() -> Vec<Mold> {
    vec![
        versioned("angularjs/{version}/angular.", sets::ANGULAR),
        versioned("backbone/{version}/backbone.", sets::BACKBONE),
        versioned("backbone/{version}/backbone-min.", sets::BACKBONE),
        versioned("dojo/{version}/dojo/dojo.", sets::DOJO),
        versioned("ext-core/{version}/ext-core.", sets::EXT_CORE),
        versioned("jquery/{version}/jquery.", sets::JQUERY),
        versioned("jquery-ui/{version}/jquery-ui.js", sets::JQUERY_UI),
        versioned("jquery-ui/{version}/jquery-ui.min.js", sets::JQUERY_UI),
        versioned("modernizr/{version}/modernizr.", sets::MODERNIZR),
        versioned("momentjs/{version}/moment.", sets::MOMENT),
        versioned("prototype/{version}/prototype.", sets::PROTOTYPE_JS),
        versioned("scriptaculous/{version}/scriptaculous.", sets::SCRIPTACULOUS),
        versioned("swfobject/{version}/swfobject.", sets::SWFOBJECT),
        versioned("underscore/{version}/underscore.", sets::UNDERSCORE),
        versioned("underscore/{version}/underscore-min.", sets::UNDERSCORE),
    ]
}

fn bundled_hosts() -> Vec<HostMapping> {
    vec![
        // Google Hosted Libraries
        host("ajax.googleapis.com", vec![base("/ajax/libs/", google_hosted_libraries())]),
        // Microsoft Ajax CDN
        host("ajax.aspnetcdn.com", vec![base("/ajax/", microsoft_ajax())]),
        // Microsoft Ajax CDN [deprecated]
        host("ajax.microsoft.com", vec![base("/ajax/", microsoft_ajax())]),
        // CDNJS (Cloudflare)
        host("cdnjs.cloudflare.com", vec![base("/ajax/libs/", vec![
            versioned("angular.js/{version}/angular.", sets::ANGULAR),
            versioned("backbone.js/{version}/backbone.", sets::BACKBONE),
            versioned("backbone.js/{version}/backbone-min.", sets::BACKBONE),
            versioned("dojo/{version}/dojo.", sets::DOJO),
            versioned("ember.js/{version}/ember.", sets::EMBER),
            versioned("ext-core/{version}/ext-core.", sets::EXT_CORE),
            versioned("jquery/{version}/jquery.", sets::JQUERY),
            versioned("jqueryui/{version}/jquery-ui.js", sets::JQUERY_UI),
            versioned("jqueryui/{version}/jquery-ui.min.js", sets::JQUERY_UI),
            versioned("modernizr/{version}/modernizr.", sets::MODERNIZR),
            versioned("moment.js/{version}/moment.", sets::MOMENT),
            versioned("mootools/{version}/mootools-core", sets::MOOTOOLS),
            versioned("scriptaculous/{version}/scriptaculous.", sets::SCRIPTACULOUS),
            versioned("swfobject/{version}/swfobject.", sets::SWFOBJECT),
            versioned("underscore.js/{version}/underscore.", sets::UNDERSCORE),
            versioned("underscore.js/{version}/underscore-min.", sets::UNDERSCORE),
            versioned("webfont/{version}/webfont", sets::WEBFONT),
        ])]),
        // jQuery CDN
        host("code.jquery.com", vec![base("/", vec![
            versioned("jquery-{version}.", sets::JQUERY),
            versioned("ui/{version}/jquery-ui.js", sets::JQUERY_UI),
            versioned("ui/{version}/jquery-ui.min.js", sets::JQUERY_UI),
            // Basic shorthand notations [deprecated]
            pinned("jquery-latest.", "resources/jquery/1.11.1/jquery.min.jsm"),
            pinned("jquery.", "resources/jquery/1.11.1/jquery.min.jsm"),
        ])]),
        // jsDelivr
        host("cdn.jsdelivr.net", vec![base("/", vec![
            versioned("angularjs/{version}/angular.", sets::ANGULAR),
            versioned("backbonejs/{version}/backbone.", sets::BACKBONE),
            versioned("backbonejs/{version}/backbone-min.", sets::BACKBONE),
            versioned("dojo/{version}/dojo.", sets::DOJO),
            versioned("emberjs/{version}/ember.", sets::EMBER),
            versioned("jquery/{version}/jquery.", sets::JQUERY),
            versioned("jquery.ui/{version}/jquery-ui.js", sets::JQUERY_UI),
            versioned("jquery.ui/{version}/jquery-ui.min.js", sets::JQUERY_UI),
            versioned("momentjs/{version}/moment.", sets::MOMENT),
            versioned("mootools/{version}/mootools-", sets::MOOTOOLS),
            versioned("swfobject/{version}/swfobject.", sets::SWFOBJECT),
            versioned("underscorejs/{version}/underscore.", sets::UNDERSCORE),
            versioned("underscorejs/{version}/underscore-min.", sets::UNDERSCORE),
            versioned("webfontloader/{version}/webfont", sets::WEBFONT),
        ])]),
        // Yandex CDN
        host("yastatic.net", vec![base("/", yandex())]),
        // Yandex CDN [deprecated]
        host("yandex.st", vec![base("/", yandex())]),
        // Baidu CDN
        host("apps.bdimg.com", vec![base("/libs/", vec![
            versioned("angular.js/{version}/angular.", sets::ANGULAR),
            versioned("backbone.js/{version}/backbone.", sets::BACKBONE),
            versioned("backbone.js/{version}/backbone-min.", sets::BACKBONE),
            versioned("dojo/{version}/dojo.", sets::DOJO),
            versioned("ember.js/{version}/ember.", sets::EMBER),
            versioned("ext-core/{version}/ext-core.", sets::EXT_CORE),
            versioned("jquery/{version}/jquery.", sets::JQUERY),
            versioned("jqueryui/{version}/jquery-ui.js", sets::JQUERY_UI),
            versioned("jqueryui/{version}/jquery-ui.min.js", sets::JQUERY_UI),
            versioned("moment/{version}/moment.", sets::MOMENT),
            versioned("mootools/{version}/mootools-yui-compressed.", sets::MOOTOOLS),
            versioned("prototype/{version}/prototype.", sets::PROTOTYPE_JS),
            versioned("scriptaculous/{version}/scriptaculous.", sets::SCRIPTACULOUS),
            versioned("swfobject/{version}/swfobject.", sets::SWFOBJECT),
            versioned("swfobject/{version}/swfobject_src.", sets::SWFOBJECT),
            versioned("underscore.js/{version}/underscore.", sets::UNDERSCORE),
            versioned("underscore.js/{version}/underscore-min.", sets::UNDERSCORE),
            versioned("webfont/{version}/webfont.", sets::WEBFONT),
            versioned("webfont/{version}/webfont_debug.", sets::WEBFONT),
        ])]),
        // Baidu CDN [deprecated]
        host("libs.baidu.com", vec![base("/", vec![
            versioned("backbone/{version}/backbone.", sets::BACKBONE),
            versioned("backbone/{version}/backbone-min.", sets::BACKBONE),
            versioned("dojo/{version}/dojo.", sets::DOJO),
            versioned("ext-core/{version}/ext-core.", sets::EXT_CORE),
            versioned("jquery/{version}/jquery.", sets::JQUERY),
            versioned("jqueryui/{version}/jquery-ui.js", sets::JQUERY_UI),
            versioned("jqueryui/{version}/jquery-ui.min.js", sets::JQUERY_UI),
            versioned("moment/{version}/moment.", sets::MOMENT),
            versioned("mootools/{version}/mootools-yui-compressed.", sets::MOOTOOLS),
            versioned("prototype/{version}/prototype.", sets::PROTOTYPE_JS),
            versioned("scriptaculous/{version}/scriptaculous.", sets::SCRIPTACULOUS),
            versioned("swfobject/{version}/swfobject.", sets::SWFOBJECT),
            versioned("underscore/{version}/underscore.", sets::UNDERSCORE),
            versioned("underscore/{version}/underscore-min.", sets::UNDERSCORE),
            versioned("webfont/{version}/webfont.", sets::WEBFONT),
            versioned("webfont/{version}/webfont_debug.", sets::WEBFONT),
        ])]),
        // Sina Public Resources
        host("lib.sinaapp.com", vec![base("/js/", vec![
            versioned("angular.js/angular-{version}/angular.", sets::ANGULAR),
            versioned("backbone/{version}/backbone.", sets::BACKBONE),
            versioned("dojo/{version}/dojo.", sets::DOJO),
            versioned("ext-core/{version}/ext-core.", sets::EXT_CORE),
            versioned("ext-core/{version}/ext-core-debug.", sets::EXT_CORE),
            versioned("jquery/{version}/jquery.", sets::JQUERY),
            versioned("jquery-ui/{version}/jquery-ui.js", sets::JQUERY_UI),
            versioned("jquery-ui/{version}/jquery-ui.min.js", sets::JQUERY_UI),
            versioned("mootools/{version}/mootools.", sets::MOOTOOLS),
            versioned("prototype/{version}/prototype.", sets::PROTOTYPE_JS),
            versioned("scriptaculous/{version}/scriptaculous.", sets::SCRIPTACULOUS),
            versioned("swfobject/{version}/swfobject.", sets::SWFOBJECT),
            versioned("underscore/{version}/underscore.", sets::UNDERSCORE),
            versioned("underscore/{version}/underscore-min.", sets::UNDERSCORE),
            versioned("webfont/{version}/webfont.", sets::WEBFONT),
            versioned("webfont/{version}/webfont_debug.", sets::WEBFONT),
        ])]),
        // UpYun Library
        host("upcdn.b0.upaiyun.com", vec![base("/libs/", vec![
            versioned("dojo/dojo-{version}.", sets::DOJO),
            versioned("emberjs/emberjs-{version}.", sets::EMBER),
            versioned("jquery/jquery-{version}.", sets::JQUERY),
            versioned("jqueryui/jquery.ui-{version}.js", sets::JQUERY_UI),
            versioned("jqueryui/jquery.ui-{version}.min.js", sets::JQUERY_UI),
            versioned("modernizr/modernizr-{version}.", sets::MODERNIZR),
            versioned("mootoolscore/mootools.core-{version}.", sets::MOOTOOLS),
        ])]),
        // BootCDN
        host("cdn.bootcss.com", vec![base("/", vec![
            versioned("angular.js/{version}/angular.", sets::ANGULAR),
            versioned("backbone.js/{version}/backbone.", sets::BACKBONE),
            versioned("backbone.js/{version}/backbone-min.", sets::BACKBONE),
            versioned("dojo/{version}/dojo.", sets::DOJO),
            versioned("ember.js/{version}/ember.", sets::EMBER),
            versioned("ext-core/{version}/ext-core.", sets::EXT_CORE),
            versioned("jquery/{version}/jquery.", sets::JQUERY),
            versioned("jqueryui/{version}/jquery-ui.js", sets::JQUERY_UI),
            versioned("jqueryui/{version}/jquery-ui.min.js", sets::JQUERY_UI),
            versioned("modernizr/{version}/modernizr.", sets::MODERNIZR),
            versioned("moment.js/{version}/moment.", sets::MOMENT),
            versioned("mootools/{version}/mootools-yui-compressed.", sets::MOOTOOLS),
            versioned("prototype/{version}/prototype.", sets::PROTOTYPE_JS),
            versioned("scriptaculous/{version}/scriptaculous.", sets::SCRIPTACULOUS),
            versioned("swfobject/{version}/swfobject.", sets::SWFOBJECT),
            versioned("underscore.js/{version}/underscore.", sets::UNDERSCORE),
            versioned("underscore.js/{version}/underscore-min.", sets::UNDERSCORE),
            versioned("webfont/{version}/webfontloader.", sets::WEBFONT),
        ])]),
        // Geekzu Public Service [mirror]
        host("sdn.geekzu.org", vec![base("/ajax/ajax/libs/", google_hosted_libraries())]),
        // USTC Linux User Group [mirror]
        host("ajax.proxy.ustclug.org", vec![base("/ajax/libs/", google_hosted_libraries())]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_lookup() {
        let mappings = ResourceMappings::bundled();
        assert!(mappings.host("ajax.googleapis.com").is_some());
        assert!(mappings.host("sdn.geekzu.org").is_some());
        assert!(mappings.host("example.com").is_none());
        assert_eq!(mappings.len(), 15);
    }

    #[test]
    fn test_match_base_path_is_first_declared() {
        let mapping = host("cdn.test", vec![
            base("/libs/", vec![pinned("a.", "resources/a.jsm")]),
            base("/libs/extra/", vec![pinned("b.", "resources/b.jsm")]),
        ]);
        let matched = mapping.match_base_path("/libs/extra/b.js").unwrap();
        assert_eq!(matched.path, "/libs/");
        assert!(mapping.match_base_path("/other/").is_none());
    }

    #[test]
    fn test_find_mold_is_first_declared() {
        let mappings = ResourceMappings::bundled();
        let code = mappings.host("code.jquery.com").unwrap();
        let base = code.match_base_path("/jquery.min.js").unwrap();

        let mold = base.find_mold("jquery-latest.min.js").unwrap();
        assert_eq!(mold.pattern, "jquery-latest.");

        let mold = base.find_mold("jquery-{version}.min.js").unwrap();
        assert_eq!(mold.pattern, "jquery-{version}.");
        assert_eq!(mold.target.set, Some("jQuery"));
    }

    #[test]
    fn test_valid_host_patterns() {
        let patterns = ResourceMappings::bundled().valid_host_patterns();
        assert!(patterns.contains(&"*://cdnjs.cloudflare.com/*".to_string()));
        assert_eq!(patterns.len(), 15);
    }
}
