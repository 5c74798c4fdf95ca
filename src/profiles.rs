//! Active profile resolution.
//!
//! A signed-in user acts either for themself or for one of their stored
//! dependents. The self profile is synthesized from the user record and is
//! always listed first; the selected id survives restarts through a
//! preference store.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use thiserror::Error;

use crate::db::{self, Database, DatabaseError};
use crate::models::{FamilyProfile, User, SELF_RELATIONSHIP};

/// Preference key holding the selected profile id.
pub const ACTIVE_PROFILE_KEY: &str = "activeProfileId";

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("No user is signed in")]
    NotSignedIn,
    #[error("Preference storage error: {0}")]
    Storage(#[from] DatabaseError),
    #[error("Internal lock error")]
    LockPoisoned,
}

/// Durable key/value storage for client preferences.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ProfileError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ProfileError>;
}

pub struct SqlitePreferenceStore {
    db: Database,
}

impl SqlitePreferenceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, ProfileError> {
        Ok(self.db.with_conn(|conn| db::get_user_preference(conn, key))?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ProfileError> {
        Ok(self
            .db
            .with_conn(|conn| db::set_user_preference(conn, key, value))?)
    }
}

/// Process-local store, for callers without durable storage.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, ProfileError> {
        let values = self.values.lock().map_err(|_| ProfileError::LockPoisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ProfileError> {
        let mut values = self.values.lock().map_err(|_| ProfileError::LockPoisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct ResolverState {
    /// `None` when signed out.
    profiles: Option<Vec<FamilyProfile>>,
    active_id: Option<String>,
}

impl ResolverState {
    fn contains(&self, id: &str) -> bool {
        self.profiles
            .as_ref()
            .is_some_and(|profiles| profiles.iter().any(|p| p.id == id))
    }
}

/// Merges the user's own identity with their dependents and tracks which
/// one is active.
pub struct ActiveProfileResolver<S: PreferenceStore> {
    store: S,
    state: RwLock<ResolverState>,
}

impl<S: PreferenceStore> ActiveProfileResolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: RwLock::new(ResolverState::default()),
        }
    }

    /// Load the profile list for `user` and restore the persisted selection.
    /// Returns the active profile.
    pub fn sign_in(
        &self,
        user: &User,
        dependents: Vec<FamilyProfile>,
    ) -> Result<FamilyProfile, ProfileError> {
        let persisted = self.store.get(ACTIVE_PROFILE_KEY)?;
        let mut state = self.state.write().map_err(|_| ProfileError::LockPoisoned)?;
        state.profiles = Some(compose(user, dependents));
        let restored = persisted.filter(|id| state.contains(id));
        state.active_id = restored;
        resolve_active(&state).ok_or(ProfileError::NotSignedIn)
    }

    /// Convenience for callers holding the database: reads dependents first.
    pub fn sign_in_from_db(&self, database: &Database, user: &User) -> Result<FamilyProfile, ProfileError> {
        let dependents = database.with_conn(|conn| db::list_family_profiles(conn, &user.id))?;
        self.sign_in(user, dependents)
    }

    /// Forget the in-memory list. The persisted selection is kept for the
    /// next sign-in.
    pub fn sign_out(&self) -> Result<(), ProfileError> {
        let mut state = self.state.write().map_err(|_| ProfileError::LockPoisoned)?;
        *state = ResolverState::default();
        Ok(())
    }

    /// Self first, then dependents. Empty when signed out.
    pub fn list(&self) -> Result<Vec<FamilyProfile>, ProfileError> {
        let state = self.state.read().map_err(|_| ProfileError::LockPoisoned)?;
        Ok(state.profiles.clone().unwrap_or_default())
    }

    /// The selected profile if it is still listed, else self. `None` only
    /// when signed out.
    pub fn get_active(&self) -> Result<Option<FamilyProfile>, ProfileError> {
        let state = self.state.read().map_err(|_| ProfileError::LockPoisoned)?;
        Ok(resolve_active(&state))
    }

    /// Select `id`. Unknown ids leave the selection unchanged and return
    /// false. The preference is written before memory changes, so a failed
    /// write leaves both untouched.
    pub fn set_active(&self, id: &str) -> Result<bool, ProfileError> {
        let mut state = self.state.write().map_err(|_| ProfileError::LockPoisoned)?;
        if state.profiles.is_none() {
            return Err(ProfileError::NotSignedIn);
        }
        if !state.contains(id) {
            tracing::debug!(profile_id = %id, "Ignoring selection of unknown profile");
            return Ok(false);
        }
        if state.active_id.as_deref() == Some(id) {
            return Ok(true);
        }

        self.store.set(ACTIVE_PROFILE_KEY, id)?;
        state.active_id = Some(id.to_string());
        Ok(true)
    }

    /// Replace the dependents after an edit. A selection that disappeared
    /// falls back to self, in memory and in the persisted preference, so
    /// re-adding the profile later does not silently reselect it.
    pub fn set_dependents(&self, dependents: Vec<FamilyProfile>) -> Result<(), ProfileError> {
        let mut state = self.state.write().map_err(|_| ProfileError::LockPoisoned)?;
        let Some(profiles) = state.profiles.as_ref() else {
            return Err(ProfileError::NotSignedIn);
        };
        let Some(own) = profiles.iter().find(|p| p.is_self).cloned() else {
            return Err(ProfileError::NotSignedIn);
        };

        let mut updated = vec![own.clone()];
        updated.extend(
            dependents
                .into_iter()
                .filter(|p| !p.is_self && p.id != own.id),
        );

        let selection_removed = state
            .active_id
            .as_deref()
            .is_some_and(|id| !updated.iter().any(|p| p.id == id));
        if selection_removed {
            self.store.set(ACTIVE_PROFILE_KEY, &own.id)?;
            tracing::debug!("Active profile was removed; falling back to self");
            state.active_id = None;
        }

        state.profiles = Some(updated);
        Ok(())
    }
}

fn self_profile(user: &User) -> FamilyProfile {
    FamilyProfile {
        id: user.id.clone(),
        display_name: user.greeting_name().to_string(),
        relationship: SELF_RELATIONSHIP.to_string(),
        is_self: true,
    }
}

/// Exactly one self profile, first; dependents never shadow it.
fn compose(user: &User, dependents: Vec<FamilyProfile>) -> Vec<FamilyProfile> {
    let mut profiles = vec![self_profile(user)];
    profiles.extend(
        dependents
            .into_iter()
            .filter(|p| !p.is_self && p.id != user.id),
    );
    profiles
}

fn resolve_active(state: &ResolverState) -> Option<FamilyProfile> {
    let profiles = state.profiles.as_ref()?;
    state
        .active_id
        .as_deref()
        .and_then(|id| profiles.iter().find(|p| p.id == id))
        .or_else(|| profiles.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{seed_user, user};

    fn dependents() -> Vec<FamilyProfile> {
        vec![
            FamilyProfile::dependent("kid-1", "Lina", "daughter"),
            FamilyProfile::dependent("dad-1", "Omar", "father"),
        ]
    }

    fn signed_in() -> ActiveProfileResolver<MemoryPreferenceStore> {
        let resolver = ActiveProfileResolver::new(MemoryPreferenceStore::new());
        resolver.sign_in(&user("u-1", &[]), dependents()).unwrap();
        resolver
    }

    struct FailingStore;

    impl PreferenceStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, ProfileError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), ProfileError> {
            Err(ProfileError::Storage(DatabaseError::LockPoisoned))
        }
    }

    #[test]
    fn list_puts_exactly_one_self_profile_first() {
        let resolver = ActiveProfileResolver::new(MemoryPreferenceStore::new());
        let mut deps = dependents();
        deps.push(FamilyProfile::dependent("u-1", "Impostor", "other"));
        resolver.sign_in(&user("u-1", &[]), deps).unwrap();

        let list = resolver.list().unwrap();
        assert_eq!(list.len(), 3);
        assert!(list[0].is_self);
        assert_eq!(list[0].display_name, "User u-1");
        assert_eq!(list.iter().filter(|p| p.is_self).count(), 1);
    }

    #[test]
    fn defaults_to_self() {
        let resolver = signed_in();
        assert_eq!(resolver.get_active().unwrap().unwrap().id, "u-1");
    }

    #[test]
    fn set_active_switches_and_persists() {
        let resolver = signed_in();
        assert!(resolver.set_active("kid-1").unwrap());
        assert_eq!(resolver.get_active().unwrap().unwrap().display_name, "Lina");
        assert_eq!(
            resolver.store.get(ACTIVE_PROFILE_KEY).unwrap().as_deref(),
            Some("kid-1")
        );
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let resolver = signed_in();
        resolver.set_active("dad-1").unwrap();
        assert!(!resolver.set_active("ghost").unwrap());
        assert_eq!(resolver.get_active().unwrap().unwrap().id, "dad-1");
    }

    #[test]
    fn selection_survives_sign_out_and_in() {
        let resolver = signed_in();
        resolver.set_active("dad-1").unwrap();
        resolver.sign_out().unwrap();

        assert!(resolver.list().unwrap().is_empty());
        assert!(resolver.get_active().unwrap().is_none());

        let active = resolver.sign_in(&user("u-1", &[]), dependents()).unwrap();
        assert_eq!(active.id, "dad-1");
    }

    #[test]
    fn stale_persisted_id_falls_back_to_self() {
        let store = MemoryPreferenceStore::new();
        store.set(ACTIVE_PROFILE_KEY, "removed-profile").unwrap();
        let resolver = ActiveProfileResolver::new(store);

        let active = resolver.sign_in(&user("u-1", &[]), dependents()).unwrap();
        assert!(active.is_self);
    }

    #[test]
    fn removed_dependent_falls_back_to_self() {
        let resolver = signed_in();
        resolver.set_active("kid-1").unwrap();
        resolver
            .set_dependents(vec![FamilyProfile::dependent("dad-1", "Omar", "father")])
            .unwrap();

        assert_eq!(resolver.list().unwrap().len(), 2);
        assert!(resolver.get_active().unwrap().unwrap().is_self);
    }

    #[test]
    fn re_added_dependent_is_not_reselected() {
        let resolver = signed_in();
        resolver.set_active("kid-1").unwrap();
        resolver
            .set_dependents(vec![FamilyProfile::dependent("dad-1", "Omar", "father")])
            .unwrap();
        resolver.set_dependents(dependents()).unwrap();

        assert!(resolver.get_active().unwrap().unwrap().is_self);
        assert_eq!(
            resolver.store.get(ACTIVE_PROFILE_KEY).unwrap().as_deref(),
            Some("u-1")
        );

        resolver.sign_out().unwrap();
        let active = resolver.sign_in(&user("u-1", &[]), dependents()).unwrap();
        assert!(active.is_self);
    }

    #[test]
    fn stale_persisted_id_is_not_revived_by_later_edits() {
        let store = MemoryPreferenceStore::new();
        store.set(ACTIVE_PROFILE_KEY, "kid-2").unwrap();
        let resolver = ActiveProfileResolver::new(store);
        resolver.sign_in(&user("u-1", &[]), dependents()).unwrap();

        let mut deps = dependents();
        deps.push(FamilyProfile::dependent("kid-2", "Sami", "son"));
        resolver.set_dependents(deps).unwrap();

        assert!(resolver.get_active().unwrap().unwrap().is_self);
    }

    #[test]
    fn failed_persist_leaves_selection_unchanged() {
        let resolver = ActiveProfileResolver::new(FailingStore);
        resolver.sign_in(&user("u-1", &[]), dependents()).unwrap();

        assert!(resolver.set_active("kid-1").is_err());
        assert!(resolver.get_active().unwrap().unwrap().is_self);
    }

    #[test]
    fn signed_out_selection_is_an_error() {
        let resolver = ActiveProfileResolver::new(MemoryPreferenceStore::new());
        assert!(matches!(resolver.set_active("u-1"), Err(ProfileError::NotSignedIn)));
    }

    #[test]
    fn sqlite_store_restores_selection_from_database() {
        let database = Database::open_in_memory().unwrap();
        let owner = database
            .with_conn(|conn| {
                let owner = seed_user(conn, "u-1", &[]);
                db::insert_family_profile(conn, "u-1", &FamilyProfile::dependent("kid-1", "Lina", "daughter"))?;
                Ok(owner)
            })
            .unwrap();

        let first = ActiveProfileResolver::new(SqlitePreferenceStore::new(database.clone()));
        first.sign_in_from_db(&database, &owner).unwrap();
        first.set_active("kid-1").unwrap();

        let second = ActiveProfileResolver::new(SqlitePreferenceStore::new(database.clone()));
        assert_eq!(second.sign_in_from_db(&database, &owner).unwrap().id, "kid-1");
    }
}
