// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AcceptanceRecord, Subject, TermsVersion};

/// Client-side state of the "accept the latest terms for a scope" gate.
///
/// The version is captured when terms are loaded. Accepting after a newer
/// version went live records the older one, and the next load asks again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermsGateState {
    scope: String,
    loading: bool,
    subject: Option<Subject>,
    terms: Option<TermsVersion>,
    accepted: bool,
    error: Option<String>,
}

impl TermsGateState {
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_owned(),
            loading: true,
            subject: None,
            terms: None,
            accepted: false,
            error: None,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn terms(&self) -> Option<&TermsVersion> {
        self.terms.as_ref()
    }

    pub fn latest_version(&self) -> Option<i64> {
        self.terms.as_ref().map(|terms| terms.version)
    }

    pub const fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub const fn needs_acceptance(&self) -> bool {
        self.terms.is_some() && !self.accepted
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn set_subject(&mut self, subject: Subject) {
        self.subject = Some(subject);
    }

    /// No active terms for the scope means nothing to accept.
    pub fn set_terms(&mut self, terms: Option<TermsVersion>) {
        self.accepted = terms.is_none();
        self.terms = terms;
    }

    pub fn set_accepted(&mut self, accepted: bool) {
        self.accepted = accepted;
    }

    pub fn fail(&mut self, error: &anyhow::Error) {
        self.error = Some(format!("{error:#}"));
        self.loading = false;
    }

    pub fn finish_load(&mut self) {
        self.loading = false;
    }

    /// The record an accept action would insert, if both the subject and the
    /// terms are known.
    pub fn pending_acceptance(&self) -> Option<AcceptanceRecord> {
        let subject = self.subject.as_ref()?;
        let terms = self.terms.as_ref()?;
        Some(AcceptanceRecord {
            subject_id: subject.id().to_owned(),
            scope: self.scope.clone(),
            version: terms.version,
        })
    }
}
