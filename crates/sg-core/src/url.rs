//! Allocation-free URL slicing
//!
//! Request URLs arrive already canonicalized by the browser, so the helpers
//! here only split them into borrowed parts and never validate beyond that.

/// URL schemes the agent distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
    /// Browser-internal pages (`chrome:`), never a web initiator
    Browser,
}

impl Scheme {
    fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("https") {
            Some(Scheme::Https)
        } else if name.eq_ignore_ascii_case("http") {
            Some(Scheme::Http)
        } else if name.eq_ignore_ascii_case("chrome") {
            Some(Scheme::Browser)
        } else {
            None
        }
    }
}

/// Borrowed pieces of a hierarchical URL (`scheme://authority/path?query`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlParts<'a> {
    pub scheme: &'a str,
    /// Authority without userinfo; may carry a port
    pub authority: &'a str,
    /// Path without query or fragment, `/` when empty
    pub path: &'a str,
}

impl<'a> UrlParts<'a> {
    /// Split `url`, or `None` if it has no `scheme://` prefix.
    pub fn split(url: &'a str) -> Option<Self> {
        let (scheme, rest) = url.split_once("://")?;
        let scheme_ok = !scheme.is_empty()
            && scheme
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'));
        if !scheme_ok {
            return None;
        }

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

        let path = match tail.strip_prefix('/') {
            Some(_) => &tail[..tail.find(['?', '#']).unwrap_or(tail.len())],
            None => "/",
        };

        Some(Self { scheme, authority, path })
    }

    /// Authority with the scheme's default port dropped.
    pub fn host_with_port(&self) -> &'a str {
        let default_port = match Scheme::from_name(self.scheme) {
            Some(Scheme::Https) => ":443",
            Some(Scheme::Http) => ":80",
            _ => return self.authority,
        };

        self.authority.strip_suffix(default_port).unwrap_or(self.authority)
    }

    /// Host name without port.
    pub fn host(&self) -> &'a str {
        match self.authority.rfind(':') {
            Some(colon) if !self.authority.ends_with(']') => &self.authority[..colon],
            _ => self.authority,
        }
    }
}

pub fn extract_scheme(url: &str) -> Option<Scheme> {
    let (name, _) = url.split_once(':')?;
    Scheme::from_name(name)
}

pub fn extract_host(url: &str) -> Option<&str> {
    UrlParts::split(url).map(|parts| parts.host())
}

/// Host with port, if any and not the default one.
///
/// Mapping table lookups are keyed on this form, so a CDN reached through a
/// non-default port is not treated as the same host.
pub fn extract_host_with_port(url: &str) -> Option<&str> {
    UrlParts::split(url).map(|parts| parts.host_with_port())
}

pub fn extract_path(url: &str) -> &str {
    UrlParts::split(url).map_or("/", |parts| parts.path)
}

/// Source maps are never bundled.
pub fn is_source_map(path: &str) -> bool {
    path.len() >= 4
        && path.is_char_boundary(path.len() - 4)
        && path[path.len() - 4..].eq_ignore_ascii_case(".map")
}
