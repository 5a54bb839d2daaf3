//! View collaborator
//!
//! Renders per-tab presentation (icon, title and badge). The runtime decides
//! what to show; implementations only draw it.

pub const PRODUCT_NAME: &str = "Surrogate";

/// Toolbar icon variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Default,
    /// Shown on whitelisted sites
    Disabled,
}

impl Icon {
    pub fn for_whitelisted(whitelisted: bool) -> Self {
        if whitelisted {
            Icon::Disabled
        } else {
            Icon::Default
        }
    }
}

/// Tab title: a dash on whitelisted sites without injections, the count
/// otherwise.
pub fn tab_title(whitelisted: bool, injection_count: usize) -> String {
    if whitelisted && injection_count == 0 {
        format!("{PRODUCT_NAME} (\u{2013})")
    } else {
        format!("{PRODUCT_NAME} ({injection_count})")
    }
}

pub trait View: Send + Sync {
    /// Render icon and title for the tab's whitelist state.
    fn render_whitelist_state(&self, tab: i32, whitelisted: bool, injection_count: usize);

    /// Render a tab that just navigated to `url`.
    fn render_initial_tab_state(&self, tab: i32, url: &str, whitelisted: bool, clear_badge: bool) {
        log::trace!("Initial state for tab {tab} at {url}");
        self.render_whitelist_state(tab, whitelisted, 0);
        if clear_badge {
            self.clear_badge(tab);
        }
    }

    fn render_injection_count(&self, tab: i32, injection_count: usize, show_badge: bool);

    fn clear_badge(&self, tab: i32);
}

/// View writing every update to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogView;

impl View for LogView {
    fn render_whitelist_state(&self, tab: i32, whitelisted: bool, injection_count: usize) {
        log::info!(
            "Tab {tab}: icon {:?}, title \"{}\"",
            Icon::for_whitelisted(whitelisted),
            tab_title(whitelisted, injection_count)
        );
    }

    fn render_injection_count(&self, tab: i32, injection_count: usize, show_badge: bool) {
        if injection_count == 0 {
            return;
        }

        log::info!("Tab {tab}: title \"{}\"", tab_title(false, injection_count));
        if show_badge {
            log::info!("Tab {tab}: badge \"{injection_count}\"");
        }
    }

    fn clear_badge(&self, tab: i32) {
        log::info!("Tab {tab}: badge cleared");
    }
}
