// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::{Duration, Instant};

use crate::Remedy;

pub const PAGE_SIZE: usize = 30;
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(350);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Loading,
    Loaded,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Search,
    Refresh,
    NextPage,
}

/// One ranged query the view wants executed. `ticket` identifies the request
/// when its result is handed back through [`RemediesView::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub ticket: u64,
    pub kind: LoadKind,
    pub search: String,
    pub page: usize,
    pub from: usize,
    pub to: usize,
}

impl PageRequest {
    pub fn term(&self) -> Option<&str> {
        if self.search.is_empty() {
            None
        } else {
            Some(&self.search)
        }
    }

    pub const fn limit(&self) -> usize {
        self.to - self.from + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemedyPage {
    pub rows: Vec<Remedy>,
    pub total: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

/// Searchable, incrementally loaded view over the remedies table.
///
/// The view never performs I/O. Callers drain requests from [`poll`],
/// [`refresh`] and [`fetch_more`], run them, and report results through
/// [`complete`]. Only the most recently issued request may change visible
/// state; completions carrying an older ticket are reported as
/// [`Completion::Stale`] and dropped.
///
/// [`poll`]: RemediesView::poll
/// [`refresh`]: RemediesView::refresh
/// [`fetch_more`]: RemediesView::fetch_more
/// [`complete`]: RemediesView::complete
#[derive(Debug, Clone)]
pub struct RemediesView {
    items: Vec<Remedy>,
    search: String,
    phase: FeedPhase,
    refreshing: bool,
    error: Option<String>,
    has_more: bool,
    page: usize,
    page_size: usize,
    debounce: Duration,
    search_due: Option<Instant>,
    last_ticket: u64,
    in_flight: Option<PageRequest>,
}

impl RemediesView {
    /// Schedules the initial load one debounce interval after `now`.
    pub fn new(initial_search: &str, now: Instant) -> Self {
        Self::with_settings(initial_search, now, PAGE_SIZE, SEARCH_DEBOUNCE)
    }

    pub fn with_settings(
        initial_search: &str,
        now: Instant,
        page_size: usize,
        debounce: Duration,
    ) -> Self {
        Self {
            items: Vec::new(),
            search: initial_search.to_owned(),
            phase: FeedPhase::Idle,
            refreshing: false,
            error: None,
            has_more: true,
            page: 0,
            page_size: page_size.max(1),
            debounce,
            search_due: Some(now + debounce),
            last_ticket: 0,
            in_flight: None,
        }
    }

    pub fn items(&self) -> &[Remedy] {
        &self.items
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub const fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub const fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub const fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub const fn has_more(&self) -> bool {
        self.has_more
    }

    pub const fn page(&self) -> usize {
        self.page
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn in_flight(&self) -> Option<&PageRequest> {
        self.in_flight.as_ref()
    }

    /// When the pending debounced search becomes due, if any.
    pub const fn search_due(&self) -> Option<Instant> {
        self.search_due
    }

    /// Records a new search term and restarts the debounce timer.
    pub fn set_search(&mut self, term: &str, now: Instant) {
        self.search = term.to_owned();
        self.page = 0;
        self.search_due = Some(now + self.debounce);
    }

    /// Issues the debounced search once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<PageRequest> {
        let due = self.search_due?;
        if now < due {
            return None;
        }
        self.search_due = None;
        Some(self.issue(LoadKind::Search, 0))
    }

    pub fn refresh(&mut self) -> PageRequest {
        self.refreshing = true;
        self.search_due = None;
        self.issue(LoadKind::Refresh, 0)
    }

    /// Next page, or `None` while a load is in flight, while a new search is
    /// waiting out its debounce, before the first load, or once the last
    /// observed total says nothing is left.
    pub fn fetch_more(&mut self) -> Option<PageRequest> {
        if self.in_flight.is_some() || self.search_due.is_some() || !self.has_more {
            return None;
        }
        if matches!(self.phase, FeedPhase::Idle) {
            return None;
        }
        Some(self.issue(LoadKind::NextPage, self.page + 1))
    }

    pub fn complete(
        &mut self,
        ticket: u64,
        result: anyhow::Result<RemedyPage>,
    ) -> Completion {
        let request = match self.in_flight.take() {
            Some(request) if request.ticket == ticket => request,
            other => {
                self.in_flight = other;
                tracing::debug!(ticket, "dropping stale remedies response");
                return Completion::Stale;
            }
        };

        self.refreshing = false;
        match result {
            Ok(page) => {
                let fetched = page.rows.len();
                if request.from == 0 {
                    self.items = page.rows;
                } else {
                    self.items.extend(page.rows);
                }
                self.has_more = match page.total {
                    Some(total) => request.to + 1 < total,
                    None => fetched == request.limit(),
                };
                self.page = request.page;
                self.phase = FeedPhase::Loaded;
            }
            Err(error) => {
                self.error = Some(format!("{error:#}"));
                self.phase = FeedPhase::Errored;
            }
        }
        Completion::Applied
    }

    fn issue(&mut self, kind: LoadKind, page: usize) -> PageRequest {
        self.last_ticket += 1;
        let from = page * self.page_size;
        let request = PageRequest {
            ticket: self.last_ticket,
            kind,
            search: self.search.trim().to_owned(),
            page,
            from,
            to: from + self.page_size - 1,
        };
        self.in_flight = Some(request.clone());
        self.phase = FeedPhase::Loading;
        self.error = None;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Completion, FeedPhase, LoadKind, PAGE_SIZE, RemediesView, RemedyPage, SEARCH_DEBOUNCE,
    };
    use crate::{Remedy, RemedyId};
    use anyhow::anyhow;
    use std::time::{Duration, Instant};

    fn remedy(id: i64, name: &str) -> Remedy {
        Remedy {
            id: RemedyId::Number(id),
            name: name.to_owned(),
            description: None,
            image: None,
            uses: Vec::new(),
            preparation: None,
            dosage: None,
            warnings: None,
        }
    }

    fn page_of(start: i64, count: i64, total: usize) -> RemedyPage {
        RemedyPage {
            rows: (start..start + count)
                .map(|id| remedy(id, &format!("Remedy {id:03}")))
                .collect(),
            total: Some(total),
        }
    }

    fn loaded_view(total: usize) -> (RemediesView, Instant) {
        let start = Instant::now();
        let mut view = RemediesView::new("", start);
        let request = view
            .poll(start + SEARCH_DEBOUNCE)
            .expect("initial load should be due");
        let count = total.min(PAGE_SIZE) as i64;
        view.complete(request.ticket, Ok(page_of(0, count, total)));
        (view, start)
    }

    #[test]
    fn initial_load_waits_for_debounce() {
        let start = Instant::now();
        let mut view = RemediesView::new("", start);
        assert_eq!(view.phase(), FeedPhase::Idle);
        assert!(view.poll(start + Duration::from_millis(349)).is_none());

        let request = view
            .poll(start + SEARCH_DEBOUNCE)
            .expect("load due after debounce");
        assert_eq!(request.kind, LoadKind::Search);
        assert_eq!((request.from, request.to), (0, PAGE_SIZE - 1));
        assert!(view.is_loading());
        assert_eq!(view.phase(), FeedPhase::Loading);
        assert!(view.poll(start + SEARCH_DEBOUNCE * 2).is_none());
    }

    #[test]
    fn typing_restarts_the_debounce_timer() {
        let start = Instant::now();
        let mut view = RemediesView::new("", start);
        view.set_search("g", start + Duration::from_millis(100));
        view.set_search("gi", start + Duration::from_millis(300));
        view.set_search("gin", start + Duration::from_millis(500));

        assert!(view.poll(start + Duration::from_millis(700)).is_none());
        let request = view
            .poll(start + Duration::from_millis(850))
            .expect("search due 350ms after last keystroke");
        assert_eq!(request.term(), Some("gin"));
        assert_eq!(request.page, 0);
    }

    #[test]
    fn whitespace_search_is_unfiltered() {
        let start = Instant::now();
        let mut view = RemediesView::new("   ", start);
        let request = view.poll(start + SEARCH_DEBOUNCE).expect("due");
        assert_eq!(request.term(), None);
        assert_eq!(view.search(), "   ");
    }

    #[test]
    fn exact_page_total_has_no_more_rows() {
        let (mut view, _) = loaded_view(30);
        assert_eq!(view.items().len(), 30);
        assert!(!view.has_more());
        assert!(view.fetch_more().is_none());
        assert!(!view.is_loading());
    }

    #[test]
    fn fetch_more_appends_in_order() {
        let (mut view, _) = loaded_view(45);
        assert!(view.has_more());

        let next = view.fetch_more().expect("second page available");
        assert_eq!(next.kind, LoadKind::NextPage);
        assert_eq!((next.from, next.to), (30, 59));
        assert!(view.fetch_more().is_none(), "busy while in flight");

        let outcome = view.complete(next.ticket, Ok(page_of(30, 15, 45)));
        assert_eq!(outcome, Completion::Applied);
        assert_eq!(view.items().len(), 45);
        assert_eq!(view.items()[30].name, "Remedy 030");
        assert_eq!(view.page(), 1);
        assert!(!view.has_more());
    }

    #[test]
    fn fetch_more_before_first_load_is_noop() {
        let start = Instant::now();
        let mut view = RemediesView::new("", start);
        assert!(view.fetch_more().is_none());
    }

    #[test]
    fn pending_search_blocks_fetch_more_until_it_runs() {
        let (mut view, start) = loaded_view(90);
        let typed_at = start + SEARCH_DEBOUNCE * 2;
        view.set_search("gin", typed_at);
        assert!(view.fetch_more().is_none());
        assert_eq!(view.items().len(), 30);

        let search = view.poll(typed_at + SEARCH_DEBOUNCE).expect("search due");
        assert_eq!((search.from, search.term()), (0, Some("gin")));
        view.complete(search.ticket, Ok(page_of(0, 30, 60)));

        let next = view.fetch_more().expect("second page of the new search");
        assert_eq!(next.term(), Some("gin"));
        assert_eq!((next.from, next.to), (30, 59));
    }

    #[test]
    fn failed_page_keeps_page_counter_and_records_error() {
        let (mut view, _) = loaded_view(90);
        let next = view.fetch_more().expect("more rows");
        view.complete(next.ticket, Err(anyhow!("connection reset")));

        assert_eq!(view.phase(), FeedPhase::Errored);
        assert_eq!(view.error(), Some("connection reset"));
        assert_eq!(view.page(), 0);
        assert_eq!(view.items().len(), 30);

        let retry = view.fetch_more().expect("retry same page");
        assert_eq!(retry.page, 1);
        assert!(view.error().is_none());
    }

    #[test]
    fn stale_search_response_is_discarded() {
        let start = Instant::now();
        let mut view = RemediesView::new("", start);
        view.set_search("cham", start);
        let slow = view.poll(start + SEARCH_DEBOUNCE).expect("first search");

        view.set_search("gin", start + SEARCH_DEBOUNCE);
        let fast = view
            .poll(start + SEARCH_DEBOUNCE * 2)
            .expect("second search");
        assert!(fast.ticket > slow.ticket);

        let ginger = RemedyPage {
            rows: vec![remedy(1, "Ginger")],
            total: Some(1),
        };
        assert_eq!(view.complete(fast.ticket, Ok(ginger)), Completion::Applied);

        let chamomile = RemedyPage {
            rows: vec![remedy(2, "Chamomile")],
            total: Some(1),
        };
        assert_eq!(view.complete(slow.ticket, Ok(chamomile)), Completion::Stale);
        assert_eq!(view.items().len(), 1);
        assert_eq!(view.items()[0].name, "Ginger");
        assert_eq!(view.search(), "gin");
    }

    #[test]
    fn refresh_replaces_results_and_clears_refreshing() {
        let (mut view, _) = loaded_view(45);
        let more = view.fetch_more().expect("more");
        view.complete(more.ticket, Ok(page_of(30, 15, 45)));

        let request = view.refresh();
        assert!(view.is_refreshing());
        assert_eq!(request.kind, LoadKind::Refresh);
        assert_eq!(request.from, 0);

        view.complete(request.ticket, Ok(page_of(0, 30, 45)));
        assert!(!view.is_refreshing());
        assert_eq!(view.items().len(), 30);
        assert_eq!(view.page(), 0);
        assert!(view.has_more());
    }

    #[test]
    fn unknown_total_falls_back_to_full_page_heuristic() {
        let start = Instant::now();
        let mut view = RemediesView::with_settings("", start, 2, Duration::ZERO);
        let request = view.poll(start).expect("due immediately");
        view.complete(
            request.ticket,
            Ok(RemedyPage {
                rows: vec![remedy(1, "A"), remedy(2, "B")],
                total: None,
            }),
        );
        assert!(view.has_more());

        let next = view.fetch_more().expect("next page");
        view.complete(
            next.ticket,
            Ok(RemedyPage {
                rows: vec![remedy(3, "C")],
                total: None,
            }),
        );
        assert!(!view.has_more());
    }
}
