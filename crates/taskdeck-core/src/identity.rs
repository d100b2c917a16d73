use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Subscriber;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredential,
}

/// A locally registered identity, keyed by normalized email. Immutable after
/// creation: a later login against the same email authenticates against the
/// stored secret instead of rewriting the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Durable layout of the identity store, written whole under its storage key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub active_account_id: Option<Uuid>,
    #[serde(default)]
    pub is_authenticated: bool,
}

/// Owns the known accounts and the active session. Leaf store: knows nothing
/// about tasks.
pub struct IdentityStore {
    accounts: Vec<Account>,
    active_account_id: Option<Uuid>,
    is_authenticated: bool,
    subscribers: Vec<Subscriber<IdentityRecord>>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::from_record(IdentityRecord::default())
    }
}

impl IdentityStore {
    /// Builds the store from a loaded (possibly defaulted) record. A stale
    /// `activeAccountId` that no longer resolves degrades to logged out
    /// rather than failing startup.
    pub fn from_record(record: IdentityRecord) -> Self {
        let mut store = Self {
            accounts: record.accounts,
            active_account_id: record.active_account_id,
            is_authenticated: record.is_authenticated,
            subscribers: Vec::new(),
        };

        if let Some(id) = store.active_account_id
            && !store.accounts.iter().any(|a| a.id == id)
        {
            warn!(%id, "persisted active account not found; starting logged out");
            store.active_account_id = None;
            store.is_authenticated = false;
        }
        if store.active_account_id.is_none() {
            store.is_authenticated = false;
        }

        debug!(
            accounts = store.accounts.len(),
            authenticated = store.is_authenticated,
            "identity store initialized"
        );
        store
    }

    pub fn record(&self) -> IdentityRecord {
        IdentityRecord {
            accounts: self.accounts.clone(),
            active_account_id: self.active_account_id,
            is_authenticated: self.is_authenticated,
        }
    }

    /// Registers a callback invoked synchronously with the fresh record after
    /// each successful mutation.
    pub fn subscribe(&mut self, subscriber: Subscriber<IdentityRecord>) {
        self.subscribers.push(subscriber);
    }

    fn notify(&self) {
        let record = self.record();
        for subscriber in &self.subscribers {
            subscriber(&record);
        }
    }

    /// Authenticates by email, registering a new account on first sight.
    ///
    /// The caller is expected to have validated email plausibility and the
    /// minimum secret length; this store only applies the identity check.
    /// On a known email the stored username is retained and the supplied one
    /// discarded, even when they differ.
    #[tracing::instrument(skip(self, password))]
    pub fn login(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<&Account, IdentityError> {
        let email = normalize_email(email);

        match self.accounts.iter().position(|a| a.email == email) {
            Some(idx) => {
                if self.accounts[idx].password != password {
                    debug!(%email, "credential mismatch; session unchanged");
                    return Err(IdentityError::InvalidCredential);
                }
                self.active_account_id = Some(self.accounts[idx].id);
                self.is_authenticated = true;
                info!(%email, "logged in to existing account");
                self.notify();
                Ok(&self.accounts[idx])
            }
            None => {
                let account = Account {
                    id: Uuid::new_v4(),
                    username: username.to_string(),
                    email,
                    password: password.to_string(),
                };
                info!(email = %account.email, "registered new account");
                self.active_account_id = Some(account.id);
                self.is_authenticated = true;
                let idx = self.accounts.len();
                self.accounts.push(account);
                self.notify();
                Ok(&self.accounts[idx])
            }
        }
    }

    /// Clears the session. Account records are kept.
    #[tracing::instrument(skip(self))]
    pub fn logout(&mut self) {
        self.active_account_id = None;
        self.is_authenticated = false;
        info!("logged out");
        self.notify();
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn active_account(&self) -> Option<&Account> {
        let id = self.active_account_id?;
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn first_login_registers_and_authenticates() {
        let mut store = IdentityStore::default();
        let account = store
            .login("alice", "A@x.com", "secret1")
            .expect("first login");
        assert_eq!(account.username, "alice");
        assert_eq!(account.email, "a@x.com", "email is normalized");
        let id = account.id;
        assert!(store.is_authenticated());
        assert_eq!(
            store.active_account().map(|a| a.id),
            Some(id),
            "returned account is the active one"
        );
    }

    #[test]
    fn wrong_secret_fails_and_leaves_session_unchanged() {
        let mut store = IdentityStore::default();
        store
            .login("alice", "a@x.com", "secret1")
            .expect("register");

        let err = store
            .login("bob", "a@x.com", "wrong")
            .expect_err("mismatched secret");
        assert_eq!(err, IdentityError::InvalidCredential);
        assert!(store.is_authenticated(), "existing session is untouched");
        assert_eq!(
            store.active_account().map(|a| a.username.as_str()),
            Some("alice")
        );
    }

    #[test]
    fn relogin_keeps_original_username_and_ignores_email_case() {
        let mut store = IdentityStore::default();
        store
            .login("alice", "A@x.com", "secret1")
            .expect("register");
        store.logout();

        let account = store
            .login("bob", "a@x.com", "secret1")
            .expect("re-login");
        assert_eq!(account.username, "alice");
        assert_eq!(store.accounts().len(), 1);
    }

    #[test]
    fn logout_clears_session_but_keeps_accounts() {
        let mut store = IdentityStore::default();
        store.login("alice", "a@x.com", "secret1").expect("login");
        store.logout();

        assert!(!store.is_authenticated());
        assert!(store.active_account().is_none());
        assert_eq!(store.accounts().len(), 1);
    }

    #[test]
    fn subscribers_fire_on_success_but_not_on_failure() {
        let mut store = IdentityStore::default();
        let seen: Rc<RefCell<Vec<bool>>> = Rc::default();
        let sink = Rc::clone(&seen);
        store.subscribe(Box::new(move |record| {
            sink.borrow_mut().push(record.is_authenticated);
        }));

        store.login("alice", "a@x.com", "secret1").expect("login");
        let _ = store.login("mallory", "a@x.com", "wrong");
        store.logout();

        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn stale_active_account_degrades_to_logged_out() {
        let record = IdentityRecord {
            accounts: Vec::new(),
            active_account_id: Some(Uuid::new_v4()),
            is_authenticated: true,
        };
        let store = IdentityStore::from_record(record);
        assert!(!store.is_authenticated());
        assert!(store.active_account().is_none());
    }
}
