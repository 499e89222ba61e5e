// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use uuid::Uuid;

use crate::{SettingKey, SettingValue, Subject};

/// On-device key-value storage for small persisted flags.
pub trait KeyValueStore {
    fn get_value(&self, key: SettingKey) -> Result<Option<SettingValue>>;
    fn put_value(&self, key: SettingKey, value: SettingValue) -> Result<()>;
}

/// Source of the signed-in user, if any.
pub trait IdentityProvider {
    fn authenticated_user_id(&self) -> Result<Option<String>>;
}

/// Identity provider for runs without an auth session.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn authenticated_user_id(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

pub fn new_device_id() -> String {
    Uuid::new_v4().to_string()
}

/// Reads the persisted device id, generating and storing one on first use.
pub fn device_id(store: &dyn KeyValueStore) -> Result<String> {
    match store.get_value(SettingKey::DeviceId)? {
        Some(SettingValue::Text(existing)) if !existing.trim().is_empty() => {
            Ok(existing.trim().to_owned())
        }
        Some(SettingValue::Bool(_)) => bail!(
            "setting `{}` must be text; clear it and a new device id will be generated",
            SettingKey::DeviceId.as_str()
        ),
        _ => {
            let generated = new_device_id();
            store.put_value(SettingKey::DeviceId, SettingValue::Text(generated.clone()))?;
            tracing::debug!(device_id = %generated, "generated device id");
            Ok(generated)
        }
    }
}

/// The signed-in user wins; an auth lookup failure falls back to the device
/// identity the same way a signed-out session does.
pub fn resolve_subject(
    identity: &dyn IdentityProvider,
    store: &dyn KeyValueStore,
) -> Result<Subject> {
    match identity.authenticated_user_id() {
        Ok(Some(user_id)) if !user_id.trim().is_empty() => {
            return Ok(Subject::Authenticated(user_id));
        }
        Ok(_) => {}
        Err(error) => {
            tracing::warn!("auth lookup failed, using device identity: {error:#}");
        }
    }
    Ok(Subject::Device(device_id(store)?))
}

#[cfg(test)]
mod tests {
    use super::{
        Anonymous, IdentityProvider, KeyValueStore, device_id, new_device_id, resolve_subject,
    };
    use crate::{SettingKey, SettingValue, Subject};
    use anyhow::{Result, anyhow};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore {
        values: RefCell<HashMap<&'static str, SettingValue>>,
    }

    impl KeyValueStore for MapStore {
        fn get_value(&self, key: SettingKey) -> Result<Option<SettingValue>> {
            Ok(self.values.borrow().get(key.as_str()).cloned())
        }

        fn put_value(&self, key: SettingKey, value: SettingValue) -> Result<()> {
            self.values.borrow_mut().insert(key.as_str(), value);
            Ok(())
        }
    }

    struct SignedIn(&'static str);

    impl IdentityProvider for SignedIn {
        fn authenticated_user_id(&self) -> Result<Option<String>> {
            Ok(Some(self.0.to_owned()))
        }
    }

    struct Broken;

    impl IdentityProvider for Broken {
        fn authenticated_user_id(&self) -> Result<Option<String>> {
            Err(anyhow!("auth endpoint unavailable"))
        }
    }

    fn is_uuid_v4_shaped(value: &str) -> bool {
        let parts: Vec<&str> = value.split('-').collect();
        let lengths: Vec<usize> = parts.iter().map(|part| part.len()).collect();
        lengths == [8, 4, 4, 4, 12]
            && parts[2].starts_with('4')
            && value.chars().all(|ch| ch == '-' || ch.is_ascii_hexdigit())
    }

    #[test]
    fn new_device_ids_are_uuid_v4_shaped() {
        let id = new_device_id();
        assert!(is_uuid_v4_shaped(&id), "unexpected device id {id}");
        assert_ne!(id, new_device_id());
    }

    #[test]
    fn device_id_is_created_once_and_reused() -> Result<()> {
        let store = MapStore::default();
        let first = device_id(&store)?;
        let second = device_id(&store)?;
        assert_eq!(first, second);
        assert_eq!(
            store.get_value(SettingKey::DeviceId)?,
            Some(SettingValue::Text(first))
        );
        Ok(())
    }

    #[test]
    fn blank_device_id_is_regenerated() -> Result<()> {
        let store = MapStore::default();
        store.put_value(SettingKey::DeviceId, SettingValue::Text("  ".to_owned()))?;
        let id = device_id(&store)?;
        assert!(is_uuid_v4_shaped(&id));
        Ok(())
    }

    #[test]
    fn authenticated_user_takes_precedence() -> Result<()> {
        let store = MapStore::default();
        let subject = resolve_subject(&SignedIn("user-42"), &store)?;
        assert_eq!(subject, Subject::Authenticated("user-42".to_owned()));
        assert!(store.get_value(SettingKey::DeviceId)?.is_none());
        Ok(())
    }

    #[test]
    fn anonymous_and_failed_auth_fall_back_to_device() -> Result<()> {
        let store = MapStore::default();
        let anonymous = resolve_subject(&Anonymous, &store)?;
        let broken = resolve_subject(&Broken, &store)?;
        assert!(matches!(anonymous, Subject::Device(_)));
        assert_eq!(anonymous, broken);
        assert_eq!(anonymous.kind(), "device");
        Ok(())
    }
}
