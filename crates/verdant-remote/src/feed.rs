// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::Instant;

use verdant_app::{Completion, PageRequest, RemediesView};

use crate::{Backend, fetch_remedy_page};

/// Runs the requests a [`RemediesView`] issues against a backend, one
/// blocking round trip at a time.
pub struct RemediesFeed<'a> {
    backend: &'a dyn Backend,
    view: RemediesView,
}

impl<'a> RemediesFeed<'a> {
    pub fn new(backend: &'a dyn Backend, initial_search: &str, now: Instant) -> Self {
        Self::with_view(backend, RemediesView::new(initial_search, now))
    }

    pub fn with_view(backend: &'a dyn Backend, view: RemediesView) -> Self {
        Self { backend, view }
    }

    pub fn view(&self) -> &RemediesView {
        &self.view
    }

    pub fn set_search(&mut self, term: &str, now: Instant) {
        self.view.set_search(term, now);
    }

    /// Runs the debounced search if it is due at `now`.
    pub fn tick(&mut self, now: Instant) -> Option<Completion> {
        let request = self.view.poll(now)?;
        Some(self.execute(request))
    }

    /// Runs the pending search immediately, skipping the rest of the debounce.
    pub fn flush(&mut self) -> Option<Completion> {
        let due = self.view.search_due()?;
        self.tick(due)
    }

    pub fn refresh(&mut self) -> Completion {
        let request = self.view.refresh();
        self.execute(request)
    }

    pub fn fetch_more(&mut self) -> Option<Completion> {
        let request = self.view.fetch_more()?;
        Some(self.execute(request))
    }

    /// Executes a request and hands its result back to the view. Requests
    /// superseded while this one ran come back as [`Completion::Stale`].
    pub fn execute(&mut self, request: PageRequest) -> Completion {
        let result = fetch_remedy_page(self.backend, &request);
        if let Err(error) = &result {
            tracing::debug!(ticket = request.ticket, "remedies load failed: {error:#}");
        }
        self.view.complete(request.ticket, result)
    }
}
