// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use verdant_app::{
    IdentityProvider, KeyValueStore, SettingKey, SettingValue, TermsGateState, resolve_subject,
};

use crate::{Backend, has_accepted, latest_terms, record_acceptance};

/// Loads the latest terms for a scope and records acceptance for the
/// resolved subject.
pub struct TermsGate<'a> {
    backend: &'a dyn Backend,
    identity: &'a dyn IdentityProvider,
    store: &'a dyn KeyValueStore,
    state: TermsGateState,
}

impl<'a> TermsGate<'a> {
    pub fn new(
        backend: &'a dyn Backend,
        identity: &'a dyn IdentityProvider,
        store: &'a dyn KeyValueStore,
        scope: &str,
    ) -> Self {
        Self {
            backend,
            identity,
            store,
            state: TermsGateState::new(scope),
        }
    }

    pub fn state(&self) -> &TermsGateState {
        &self.state
    }

    /// Resolves the subject and checks it against the latest active terms.
    /// A failure is kept in the state as well as returned.
    pub fn load(&mut self) -> Result<()> {
        self.state.begin_load();
        match self.check() {
            Ok(()) => {
                self.state.finish_load();
                Ok(())
            }
            Err(error) => {
                self.state.fail(&error);
                Err(error)
            }
        }
    }

    fn check(&mut self) -> Result<()> {
        let subject = resolve_subject(self.identity, self.store)?;
        tracing::debug!(subject = subject.kind(), scope = self.state.scope(), "checking terms");
        self.state.set_subject(subject);

        let terms = latest_terms(self.backend, self.state.scope())?;
        self.state.set_terms(terms);
        if let Some(record) = self.state.pending_acceptance() {
            let accepted = has_accepted(self.backend, &record)?;
            self.state.set_accepted(accepted);
        }
        Ok(())
    }

    /// Records acceptance of the loaded version. Returns `false` without
    /// touching the backend when there is nothing to accept.
    pub fn accept(&mut self) -> Result<bool> {
        if !self.state.needs_acceptance() {
            return Ok(false);
        }
        let Some(record) = self.state.pending_acceptance() else {
            return Ok(false);
        };

        if let Err(error) = record_acceptance(self.backend, &record) {
            self.state.fail(&error);
            return Err(error);
        }
        self.state.set_accepted(true);
        self.store
            .put_value(SettingKey::TermsAccepted, SettingValue::Bool(true))?;
        tracing::info!(
            scope = %record.scope,
            version = record.version,
            subject = %record.subject_id,
            "terms accepted"
        );
        Ok(true)
    }
}
