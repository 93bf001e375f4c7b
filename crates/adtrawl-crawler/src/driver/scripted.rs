//! An in-memory site served through the [`Driver`] trait.
//!
//! The site is a paginated listing whose items may lead to detail pages with
//! sub-page links. It behaves like the real single-page app where it matters
//! to a crawl:
//! - the listing URL does not change when paginating;
//! - back navigation restores the exact listing page it left;
//! - loading the listing URL directly starts again from page 1;
//! - every navigation or re-render invalidates previously returned handles.
//!
//! Faults can be injected to exercise recovery paths, and a [`ScriptedProbe`]
//! lets callers inspect what the crawl did after the driver has been moved
//! into it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Driver, ItemHandle, Selector};
use crate::error::DriverError;
use crate::site::SiteProfile;

const BLANK_URL: &str = "about:blank";

#[derive(Debug, Clone)]
pub struct ScriptedDetail {
    pub url: String,
    /// Raw `href` values; may be relative.
    pub sub_links: Vec<String>,
    /// Where each clickable sub-page candidate leads, in document order.
    pub probe_targets: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScriptedItem {
    pub text: String,
    pub verified: bool,
    pub detail: Option<ScriptedDetail>,
    pub click_fails: bool,
}

impl ScriptedItem {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            verified: false,
            detail: None,
            click_fails: false,
        }
    }

    #[must_use]
    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, url: &str, sub_links: &[&str]) -> Self {
        self.detail = Some(ScriptedDetail {
            url: url.to_owned(),
            sub_links: sub_links.iter().map(|s| (*s).to_owned()).collect(),
            probe_targets: Vec::new(),
        });
        self
    }

    /// Adds clickable candidates to the detail page. Has no effect without
    /// a detail page.
    #[must_use]
    pub fn with_probe_targets(mut self, targets: &[&str]) -> Self {
        if let Some(detail) = self.detail.as_mut() {
            detail.probe_targets = targets.iter().map(|s| (*s).to_owned()).collect();
        }
        self
    }

    #[must_use]
    pub fn failing_click(mut self) -> Self {
        self.click_fails = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedNext {
    Absent,
    Disabled,
    Enabled,
}

#[derive(Debug, Clone)]
pub struct ScriptedPage {
    pub items: Vec<ScriptedItem>,
    pub next: ScriptedNext,
}

impl ScriptedPage {
    #[must_use]
    pub fn new(items: Vec<ScriptedItem>, next: ScriptedNext) -> Self {
        Self { items, next }
    }

    /// A page whose next control is rendered but disabled.
    #[must_use]
    pub fn last(items: Vec<ScriptedItem>) -> Self {
        Self::new(items, ScriptedNext::Disabled)
    }

    #[must_use]
    pub fn with_next(items: Vec<ScriptedItem>) -> Self {
        Self::new(items, ScriptedNext::Enabled)
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedSite {
    pub listing_url: String,
    pub pages: Vec<ScriptedPage>,
}

impl ScriptedSite {
    #[must_use]
    pub fn new(listing_url: &str, pages: Vec<ScriptedPage>) -> Self {
        Self {
            listing_url: listing_url.to_owned(),
            pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Blank,
    Listing { page: usize },
    Detail { page: usize, item: usize },
    External(String),
}

#[derive(Debug, Default)]
struct Faults {
    failing_loads: u32,
    fail_reloads: bool,
    failing_backs: u32,
    stray_backs: u32,
    stall_pagination: bool,
    cancel_after_visits: Option<(usize, CancellationToken)>,
}

#[derive(Debug)]
struct ScriptedState {
    site: ScriptedSite,
    location: Location,
    history: Vec<Location>,
    generation: u64,
    faults: Faults,
    successful_loads: usize,
    loads: usize,
    back_calls: usize,
    next_clicks: usize,
    detail_visits: Vec<String>,
    item_click_urls: Vec<String>,
    shut_down: bool,
}

impl ScriptedState {
    fn url_of(&self, location: &Location) -> String {
        match location {
            Location::Blank => BLANK_URL.to_owned(),
            Location::Listing { .. } => self.site.listing_url.clone(),
            Location::Detail { page, item } => self.site.pages[*page].items[*item]
                .detail
                .as_ref()
                .map_or_else(|| BLANK_URL.to_owned(), |d| d.url.clone()),
            Location::External(url) => url.clone(),
        }
    }

    fn navigate(&mut self, to: Location) {
        let from = std::mem::replace(&mut self.location, to);
        self.history.push(from);
        self.generation += 1;
    }

    fn locate(&self, url: &str) -> Location {
        if url == self.site.listing_url {
            return Location::Listing { page: 0 };
        }
        for (page_idx, page) in self.site.pages.iter().enumerate() {
            for (item_idx, item) in page.items.iter().enumerate() {
                if item.detail.as_ref().is_some_and(|d| d.url == url) {
                    return Location::Detail {
                        page: page_idx,
                        item: item_idx,
                    };
                }
            }
        }
        Location::External(url.to_owned())
    }
}

#[derive(Debug, Clone)]
enum Target {
    Container,
    Item {
        page: usize,
        index: usize,
        text: String,
        verified_marker: Option<Selector>,
    },
    SubLink {
        href: String,
    },
    Next {
        page: usize,
        disabled: bool,
    },
}

/// Element handle returned by [`ScriptedDriver`].
#[derive(Debug, Clone)]
pub struct ScriptedHandle {
    generation: u64,
    target: Target,
}

#[async_trait]
impl ItemHandle for ScriptedHandle {
    async fn text(&self) -> Result<String, DriverError> {
        Ok(match &self.target {
            Target::Container => String::new(),
            Target::Item { text, .. } => text.clone(),
            Target::SubLink { href } => href.clone(),
            Target::Next { .. } => "Next".to_owned(),
        })
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(match (&self.target, name) {
            (Target::Next { disabled, .. }, "aria-disabled") => Some(disabled.to_string()),
            (Target::SubLink { href }, "href") => Some(href.clone()),
            _ => None,
        })
    }

    async fn has_descendant(&self, selector: &Selector) -> Result<bool, DriverError> {
        Ok(matches!(
            &self.target,
            Target::Item { verified_marker: Some(marker), .. } if marker == selector
        ))
    }
}

/// Read-only view of a [`ScriptedDriver`]'s activity.
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedProbe {
    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn loads(&self) -> usize {
        self.state().loads
    }

    #[must_use]
    pub fn back_calls(&self) -> usize {
        self.state().back_calls
    }

    #[must_use]
    pub fn next_clicks(&self) -> usize {
        self.state().next_clicks
    }

    /// Detail page URLs reached by clicking a listing item, in order.
    #[must_use]
    pub fn detail_visits(&self) -> Vec<String> {
        self.state().detail_visits.clone()
    }

    /// The URL the driver was on each time a listing item was clicked.
    #[must_use]
    pub fn item_click_urls(&self) -> Vec<String> {
        self.state().item_click_urls.clone()
    }

    #[must_use]
    pub fn current_url(&self) -> String {
        let state = self.state();
        state.url_of(&state.location)
    }

    /// Zero-based listing page currently shown, if on the listing.
    #[must_use]
    pub fn listing_page(&self) -> Option<usize> {
        match self.state().location {
            Location::Listing { page } => Some(page),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.state().shut_down
    }
}

/// In-memory [`Driver`] over a [`ScriptedSite`].
pub struct ScriptedDriver {
    state: Arc<Mutex<ScriptedState>>,
    profile: SiteProfile,
}

impl ScriptedDriver {
    #[must_use]
    pub fn new(site: ScriptedSite, profile: SiteProfile) -> Self {
        let state = ScriptedState {
            site,
            location: Location::Blank,
            history: Vec::new(),
            generation: 0,
            faults: Faults::default(),
            successful_loads: 0,
            loads: 0,
            back_calls: 0,
            next_clicks: 0,
            detail_visits: Vec::new(),
            item_click_urls: Vec::new(),
            shut_down: false,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            profile,
        }
    }

    /// The first `count` loads fail with a navigation error.
    #[must_use]
    pub fn failing_loads(self, count: u32) -> Self {
        self.state().faults.failing_loads = count;
        self
    }

    /// Every load after the first successful one fails.
    #[must_use]
    pub fn failing_reloads(self) -> Self {
        self.state().faults.fail_reloads = true;
        self
    }

    /// The next `count` back navigations fail with an error.
    #[must_use]
    pub fn failing_backs(self, count: u32) -> Self {
        self.state().faults.failing_backs = count;
        self
    }

    /// The next `count` back navigations succeed but land on a blank page.
    #[must_use]
    pub fn stray_backs(self, count: u32) -> Self {
        self.state().faults.stray_backs = count;
        self
    }

    /// Enabled next controls accept clicks but the listing never changes.
    #[must_use]
    pub fn stalled_pagination(self) -> Self {
        self.state().faults.stall_pagination = true;
        self
    }

    /// Cancels `token` as soon as `visits` detail pages have been reached.
    #[must_use]
    pub fn cancel_after_visits(self, visits: usize, token: CancellationToken) -> Self {
        self.state().faults.cancel_after_visits = Some((visits, token));
        self
    }

    #[must_use]
    pub fn probe(&self) -> ScriptedProbe {
        ScriptedProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_fresh(state: &ScriptedState, handle: &ScriptedHandle) -> Result<(), DriverError> {
        if handle.generation == state.generation {
            Ok(())
        } else {
            Err(DriverError::StaleElement)
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    type Handle = ScriptedHandle;

    async fn load(&mut self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        state.loads += 1;
        if state.faults.failing_loads > 0 {
            state.faults.failing_loads -= 1;
            return Err(DriverError::Navigation {
                url: url.to_owned(),
                reason: "net::ERR_CONNECTION_RESET".to_owned(),
            });
        }
        if state.faults.fail_reloads && state.successful_loads > 0 {
            return Err(DriverError::Navigation {
                url: url.to_owned(),
                reason: "net::ERR_INTERNET_DISCONNECTED".to_owned(),
            });
        }
        let to = state.locate(url);
        state.navigate(to);
        state.successful_loads += 1;
        Ok(())
    }

    async fn query_all(&mut self, selector: &Selector) -> Result<Vec<Self::Handle>, DriverError> {
        let state = self.state();
        let generation = state.generation;
        let handle = |target| ScriptedHandle { generation, target };

        let found = match state.location {
            Location::Listing { .. } if *selector == self.profile.listing_container => {
                vec![handle(Target::Container)]
            }
            Location::Listing { page } if *selector == self.profile.listing_item => state
                .site
                .pages[page]
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    handle(Target::Item {
                        page,
                        index,
                        text: item.text.clone(),
                        verified_marker: item
                            .verified
                            .then(|| self.profile.verified_marker.clone()),
                    })
                })
                .collect(),
            Location::Listing { page } if *selector == self.profile.next_control => {
                match state.site.pages[page].next {
                    ScriptedNext::Absent => Vec::new(),
                    ScriptedNext::Disabled => vec![handle(Target::Next {
                        page,
                        disabled: true,
                    })],
                    ScriptedNext::Enabled => vec![handle(Target::Next {
                        page,
                        disabled: false,
                    })],
                }
            }
            Location::Detail { page, item } if *selector == self.profile.sub_link => state
                .site
                .pages[page]
                .items[item]
                .detail
                .as_ref()
                .map(|d| {
                    d.sub_links
                        .iter()
                        .map(|href| handle(Target::SubLink { href: href.clone() }))
                        .collect()
                })
                .unwrap_or_default(),
            Location::Detail { page, item } if *selector == self.profile.sub_page_candidate => state
                .site
                .pages[page]
                .items[item]
                .detail
                .as_ref()
                .map(|d| {
                    d.probe_targets
                        .iter()
                        .map(|href| handle(Target::SubLink { href: href.clone() }))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        Ok(found)
    }

    async fn click(&mut self, handle: &Self::Handle) -> Result<(), DriverError> {
        let mut state = self.state();
        Self::check_fresh(&state, handle)?;

        match &handle.target {
            Target::Container => {}
            Target::Item { page, index, .. } => {
                let (page, index) = (*page, *index);
                let item = &state.site.pages[page].items[index];
                let click_fails = item.click_fails;
                let detail_url = item.detail.as_ref().map(|d| d.url.clone());
                if click_fails {
                    return Err(DriverError::Command(
                        "element click intercepted".to_owned(),
                    ));
                }
                let current = state.url_of(&state.location);
                state.item_click_urls.push(current);
                if let Some(detail_url) = detail_url {
                    state.navigate(Location::Detail { page, item: index });
                    state.detail_visits.push(detail_url);
                    let visits = state.detail_visits.len();
                    if let Some((after, token)) = &state.faults.cancel_after_visits {
                        if visits >= *after {
                            token.cancel();
                        }
                    }
                }
            }
            Target::SubLink { href } => {
                let url = self
                    .profile
                    .absolute_url(href)
                    .unwrap_or_else(|| href.clone());
                state.navigate(Location::External(url));
            }
            Target::Next { page, disabled } => {
                let next_page = page + 1;
                if !*disabled
                    && !state.faults.stall_pagination
                    && next_page < state.site.pages.len()
                {
                    // In-place re-render: no history entry, URL unchanged.
                    state.location = Location::Listing { page: next_page };
                    state.generation += 1;
                    state.next_clicks += 1;
                }
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&mut self, handle: &Self::Handle) -> Result<(), DriverError> {
        let state = self.state();
        Self::check_fresh(&state, handle)
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        let state = self.state();
        Ok(state.url_of(&state.location))
    }

    async fn go_back(&mut self) -> Result<(), DriverError> {
        let mut state = self.state();
        state.back_calls += 1;
        if state.faults.failing_backs > 0 {
            state.faults.failing_backs -= 1;
            return Err(DriverError::Command("history navigation failed".to_owned()));
        }
        if state.faults.stray_backs > 0 {
            state.faults.stray_backs -= 1;
            state.history.pop();
            state.location = Location::Blank;
        } else {
            state.location = state.history.pop().unwrap_or(Location::Blank);
        }
        state.generation += 1;
        Ok(())
    }

    async fn shutdown(self) -> Result<(), DriverError>
    where
        Self: Sized,
    {
        self.state().shut_down = true;
        Ok(())
    }
}
