//! Resource sets
//!
//! A resource set is one bundled library: where its versions live inside the
//! bundle and what mime type they are served as. Molds in the mapping table
//! point at a set; the version found in the request is substituted into the
//! set's path template.

use serde::Serialize;

pub const JAVASCRIPT: &str = "application/javascript";

/// A bundled library with a version placeholder in its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceSet {
    pub name: &'static str,
    pub path: &'static str,
    #[serde(rename = "type")]
    pub mime_type: &'static str,
}

const fn set(name: &'static str, path: &'static str) -> ResourceSet {
    ResourceSet {
        name,
        path,
        mime_type: JAVASCRIPT,
    }
}

pub const ANGULAR: ResourceSet = set("angular", "resources/angularjs/{version}/angular.min.jsm");
pub const BACKBONE: ResourceSet = set("backbone", "resources/backbone.js/{version}/backbone-min.jsm");
pub const DOJO: ResourceSet = set("dojo", "resources/dojo/{version}/dojo/dojo.jsm");
pub const EMBER: ResourceSet = set("ember", "resources/ember.js/{version}/ember.min.jsm");
pub const EXT_CORE: ResourceSet = set("extCore", "resources/ext-core/{version}/ext-core.jsm");
pub const JQUERY: ResourceSet = set("jQuery", "resources/jquery/{version}/jquery.min.jsm");
pub const JQUERY_UI: ResourceSet = set("jQueryUI", "resources/jqueryui/{version}/jquery-ui.min.jsm");
pub const MODERNIZR: ResourceSet = set("modernizr", "resources/modernizr/{version}/modernizr.min.jsm");
pub const MOMENT: ResourceSet = set("moment", "resources/moment.js/{version}/moment.min.jsm");
pub const MOOTOOLS: ResourceSet = set("mootools", "resources/mootools/{version}/mootools-yui-compressed.jsm");
pub const PROTOTYPE_JS: ResourceSet = set("prototypeJS", "resources/prototype/{version}/prototype.jsm");
pub const SCRIPTACULOUS: ResourceSet = set("scriptaculous", "resources/scriptaculous/{version}/scriptaculous.jsm");
pub const SWFOBJECT: ResourceSet = set("swfobject", "resources/swfobject/{version}/swfobject.jsm");
pub const UNDERSCORE: ResourceSet = set("underscore", "resources/underscore.js/{version}/underscore-min.jsm");
pub const WEBFONT: ResourceSet = set("webfont", "resources/webfont/{version}/webfont.jsm");

/// Every bundled set.
pub const ALL: &[ResourceSet] = &[
    ANGULAR,
    BACKBONE,
    DOJO,
    EMBER,
    EXT_CORE,
    JQUERY,
    JQUERY_UI,
    MODERNIZR,
    MOMENT,
    MOOTOOLS,
    PROTOTYPE_JS,
    SCRIPTACULOUS,
    SWFOBJECT,
    UNDERSCORE,
    WEBFONT,
];

/// Look a set up by name.
pub fn by_name(name: &str) -> Option<&'static ResourceSet> {
    ALL.iter().find(|set| set.name == name)
}
