//! Page Store
//!
//! Shared, lock-free map of generated pages for one run, plus the per-page
//! in-flight set that keeps two tasks from generating the same page.

use dashmap::{DashMap, DashSet};
use tracing::warn;

use crate::constants::generation::{LOADING_PLACEHOLDER, PAGE_ERROR_PREFIX};
use crate::types::{GeneratedPage, PageMap, PageStatus, StructurePlan};

#[derive(Debug, Default)]
pub struct PageStore {
    pages: DashMap<String, GeneratedPage>,
    in_flight: DashSet<String>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace contents with one pending page per planned page
    pub fn load_plan(&self, plan: &StructurePlan) {
        self.load(
            plan.pages
                .iter()
                .map(|page| (page.id.clone(), GeneratedPage::pending(page.clone())))
                .collect(),
        );
    }

    /// Replace contents with pages loaded from a cache
    pub fn load(&self, pages: PageMap) {
        self.pages.clear();
        for (id, page) in pages {
            self.pages.insert(id, page);
        }
    }

    pub fn get(&self, id: &str) -> Option<GeneratedPage> {
        self.pages.get(id).map(|p| p.clone())
    }

    pub fn has_content(&self, id: &str) -> bool {
        self.pages.get(id).is_some_and(|p| p.has_content())
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Claim a page for generation.
    ///
    /// Returns `None` when another task already holds it. The claim is
    /// released when the guard drops.
    pub fn try_begin(&self, id: &str) -> Option<InFlightGuard<'_>> {
        self.in_flight.insert(id.to_string()).then(|| InFlightGuard {
            store: self,
            id: id.to_string(),
        })
    }

    /// pending → in-progress, showing the loading placeholder
    pub fn start(&self, id: &str) -> bool {
        self.transition(id, PageStatus::InProgress, LOADING_PLACEHOLDER.to_string())
    }

    /// Append streamed text to an in-progress page
    pub fn append(&self, id: &str, chunk: &str) {
        if let Some(mut page) = self.pages.get_mut(id)
            && page.status == PageStatus::InProgress
        {
            if page.content == LOADING_PLACEHOLDER {
                page.content.clear();
            }
            page.content.push_str(chunk);
        }
    }

    /// Drop streamed text of an in-progress page and show the placeholder again
    pub fn restart(&self, id: &str) {
        if let Some(mut page) = self.pages.get_mut(id)
            && page.status == PageStatus::InProgress
        {
            page.content = LOADING_PLACEHOLDER.to_string();
        }
    }

    /// in-progress → done with the final content
    pub fn complete(&self, id: &str, content: String) -> bool {
        self.transition(id, PageStatus::Done, content)
    }

    /// in-progress → error, recording the failure as the page content
    pub fn fail(&self, id: &str, message: &str) -> bool {
        self.transition(
            id,
            PageStatus::Error,
            format!("{}{}", PAGE_ERROR_PREFIX, message),
        )
    }

    fn transition(&self, id: &str, next: PageStatus, content: String) -> bool {
        let Some(mut page) = self.pages.get_mut(id) else {
            warn!("Unknown page {}", id);
            return false;
        };
        if !page.status.can_transition_to(next) {
            warn!(
                "Ignoring page {} transition {:?} -> {:?}",
                id, page.status, next
            );
            return false;
        }
        page.status = next;
        page.content = content;
        true
    }

    /// Every page finished without error
    pub fn all_clean(&self) -> bool {
        !self.pages.is_empty()
            && self
                .pages
                .iter()
                .all(|p| p.status == PageStatus::Done && p.has_content())
    }

    pub fn failed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .pages
            .iter()
            .filter(|p| p.status == PageStatus::Error)
            .map(|p| p.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self) -> PageMap {
        self.pages
            .iter()
            .map(|p| (p.key().clone(), p.value().clone()))
            .collect()
    }
}

/// Releases an in-flight claim on drop
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    store: &'a PageStore,
    id: String,
}

impl InFlightGuard<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Importance, PagePlan};

    fn plan(ids: &[&str]) -> StructurePlan {
        StructurePlan {
            pages: ids
                .iter()
                .map(|id| PagePlan {
                    id: id.to_string(),
                    title: id.to_uppercase(),
                    importance: Importance::Medium,
                    file_paths: vec![],
                    related_pages: vec![],
                })
                .collect(),
            ..Default::default()
        }
    }

    fn new_store(ids: &[&str]) -> PageStore {
        let store = PageStore::new();
        store.load_plan(&plan(ids));
        store
    }

    #[test]
    fn test_in_flight_guard_released_on_drop() {
        let store = new_store(&["a"]);
        let guard = store.try_begin("a").unwrap();
        assert_eq!(guard.id(), "a");
        assert!(store.try_begin("a").is_none());
        assert!(store.is_in_flight("a"));
        drop(guard);
        assert!(!store.is_in_flight("a"));
        assert!(store.try_begin("a").is_some());
    }

    #[test]
    fn test_streaming_replaces_placeholder() {
        let store = new_store(&["a"]);
        assert!(store.start("a"));
        assert_eq!(store.get("a").unwrap().content, "Loading...");
        store.append("a", "# A");
        store.append("a", "\nbody");
        assert_eq!(store.get("a").unwrap().content, "# A\nbody");
        assert!(store.complete("a", "# A\nfinal".into()));
        let page = store.get("a").unwrap();
        assert_eq!(page.status, PageStatus::Done);
        assert_eq!(page.content, "# A\nfinal");
    }

    #[test]
    fn test_restart_clears_streamed_text() {
        let store = new_store(&["a"]);
        assert!(store.start("a"));
        store.append("a", "partial ");
        store.restart("a");
        assert_eq!(store.get("a").unwrap().content, "Loading...");
        store.append("a", "fresh");
        assert_eq!(store.get("a").unwrap().content, "fresh");
    }

    #[test]
    fn test_illegal_transitions_ignored() {
        let store = new_store(&["a"]);
        assert!(!store.complete("a", "x".into()));
        assert!(store.start("a"));
        assert!(store.fail("a", "boom"));
        assert!(!store.start("a"));
        assert_eq!(
            store.get("a").unwrap().content,
            "Error generating content: boom"
        );
        store.append("a", "late");
        assert_eq!(
            store.get("a").unwrap().content,
            "Error generating content: boom"
        );
    }

    #[test]
    fn test_all_clean_and_failed_ids() {
        let store = new_store(&["a", "b"]);
        assert!(!store.all_clean());
        store.start("a");
        store.complete("a", "A".into());
        store.start("b");
        store.fail("b", "timeout");
        assert!(!store.all_clean());
        assert_eq!(store.failed_ids(), vec!["b"]);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.values().all(|p| p.status.is_terminal()));
    }
}
