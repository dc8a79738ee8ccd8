//! Token store and auth session manager.
//!
//! The token store is the only holder of durable local state: the bearer
//! credential and the cached user profile. The session manager owns
//! sign-in, sign-out and refresh against the identity broker, and is the
//! single component allowed to write the store.

use std::sync::Arc;
use std::time::Duration;

use keyring::Entry;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::identity::{AcquireMode, IdentityBroker};
use crate::models::{Credential, UserProfile};

const SERVICE_NAME: &str = "mailsweep";
const CREDENTIAL_KEY: &str = "credential";
const PROFILE_KEY: &str = "user";

/// Persistent key/value holder for the credential and profile.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn credential(&self) -> Result<Option<Credential>>;
    async fn set_credential(&self, credential: &Credential) -> Result<()>;
    async fn profile(&self) -> Result<Option<UserProfile>>;
    async fn set_profile(&self, profile: &UserProfile) -> Result<()>;
    /// Remove credential and profile. Absent entries are not an error.
    async fn clear(&self) -> Result<()>;
}

/// Store backed by the platform keychain, one entry per key with a JSON
/// payload.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let entry = Entry::new(&self.service, key)?;
        match entry.get_password() {
            Ok(serialized) => Ok(Some(serde_json::from_str(&serialized)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let entry = Entry::new(&self.service, key)?;
        let serialized = serde_json::to_string(value)?;
        entry.set_password(&serialized)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let entry = Entry::new(&self.service, key)?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TokenStore for KeyringStore {
    async fn credential(&self) -> Result<Option<Credential>> {
        self.read(CREDENTIAL_KEY)
    }

    async fn set_credential(&self, credential: &Credential) -> Result<()> {
        self.write(CREDENTIAL_KEY, credential)
    }

    async fn profile(&self) -> Result<Option<UserProfile>> {
        self.read(PROFILE_KEY)
    }

    async fn set_profile(&self, profile: &UserProfile) -> Result<()> {
        self.write(PROFILE_KEY, profile)
    }

    async fn clear(&self) -> Result<()> {
        self.remove(CREDENTIAL_KEY)?;
        self.remove(PROFILE_KEY)
    }
}

/// In-memory store for tests and hosts that manage their own persistence.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<(Option<Credential>, Option<UserProfile>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryStore {
    async fn credential(&self) -> Result<Option<Credential>> {
        Ok(self.inner.lock().await.0.clone())
    }

    async fn set_credential(&self, credential: &Credential) -> Result<()> {
        self.inner.lock().await.0 = Some(credential.clone());
        Ok(())
    }

    async fn profile(&self) -> Result<Option<UserProfile>> {
        Ok(self.inner.lock().await.1.clone())
    }

    async fn set_profile(&self, profile: &UserProfile) -> Result<()> {
        self.inner.lock().await.1 = Some(profile.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.lock().await = (None, None);
        Ok(())
    }
}

/// Owns the signed-in/signed-out lifecycle.
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    broker: Arc<dyn IdentityBroker>,
    status_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        broker: Arc<dyn IdentityBroker>,
        status_timeout: Duration,
    ) -> Self {
        Self {
            store,
            broker,
            status_timeout,
        }
    }

    /// True iff the store holds both a credential and a profile.
    ///
    /// Bounded: a slow or faulty store resolves `false` within the status
    /// timeout instead of hanging or failing the caller.
    pub async fn is_authenticated(&self) -> bool {
        let check = async {
            let credential = self.store.credential().await?;
            let profile = self.store.profile().await?;
            Ok::<bool, Error>(credential.is_some() && profile.is_some())
        };
        match tokio::time::timeout(self.status_timeout, check).await {
            Ok(Ok(authenticated)) => authenticated,
            Ok(Err(e)) => {
                warn!("auth status check failed, assuming signed out: {e}");
                false
            }
            Err(_) => {
                warn!("auth status check timed out, assuming signed out");
                false
            }
        }
    }

    /// The cached profile, with the same bounded-timeout contract as
    /// [`is_authenticated`](Self::is_authenticated).
    pub async fn current_user(&self) -> Option<UserProfile> {
        match tokio::time::timeout(self.status_timeout, self.store.profile()).await {
            Ok(Ok(profile)) => profile,
            Ok(Err(e)) => {
                warn!("profile read failed: {e}");
                None
            }
            Err(_) => {
                warn!("profile read timed out");
                None
            }
        }
    }

    /// Interactive sign-in: acquire a fresh token, store it, then fetch and
    /// store the profile.
    ///
    /// A failed userinfo fetch does not fail the sign-in; the token is
    /// already valid, so a synthesized minimal profile is stored instead.
    pub async fn sign_in(&self) -> Result<UserProfile> {
        let credential = self.broker.acquire(AcquireMode::Interactive).await?;
        self.store.set_credential(&credential).await?;

        let profile = match self.broker.fetch_userinfo(&credential.access_token).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("userinfo fetch failed, storing minimal profile: {e}");
                UserProfile {
                    email: "unknown".to_string(),
                    name: "User".to_string(),
                    picture: None,
                }
            }
        };
        self.store.set_profile(&profile).await?;

        info!("signed in as {}", profile.email);
        Ok(profile)
    }

    /// Renew the token, silently first, interactively as a fallback.
    ///
    /// If both attempts fail the stored credential is cleared (the session
    /// is effectively signed out) and `AuthExpired` is returned.
    pub async fn refresh_token(&self) -> Result<Credential> {
        let credential = match self.broker.acquire(AcquireMode::Silent).await {
            Ok(credential) => credential,
            Err(e) => {
                warn!("silent token refresh failed, trying interactive: {e}");
                match self.broker.acquire(AcquireMode::Interactive).await {
                    Ok(credential) => credential,
                    Err(e) => {
                        warn!("interactive token refresh also failed: {e}");
                        self.store.clear().await.ok();
                        return Err(Error::AuthExpired);
                    }
                }
            }
        };

        self.store.set_credential(&credential).await?;
        Ok(credential)
    }

    /// Revoke the stored token with the provider, then clear all local
    /// state. Never fails the caller: revocation and storage faults are
    /// logged and swallowed.
    pub async fn sign_out(&self) {
        if let Ok(Some(credential)) = self.store.credential().await {
            if let Err(e) = self.broker.revoke(&credential.access_token).await {
                warn!("token revocation failed, clearing local state anyway: {e}");
            }
        }
        if let Err(e) = self.store.clear().await {
            warn!("failed to clear token store on sign-out: {e}");
        }
        info!("signed out");
    }

    /// Current bearer token, if any. Used by the mail client on every call.
    pub async fn access_token(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .credential()
            .await?
            .map(|credential| credential.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;

    fn credential(token: &str) -> Credential {
        Credential {
            access_token: token.to_string(),
            issued_via: Provider::Google,
        }
    }

    fn profile(email: &str) -> UserProfile {
        UserProfile {
            email: email.to_string(),
            name: "Test User".to_string(),
            picture: None,
        }
    }

    /// Broker with scripted outcomes.
    #[derive(Default)]
    struct FakeBroker {
        silent_ok: bool,
        interactive_ok: bool,
        userinfo_ok: bool,
        revoke_ok: bool,
    }

    #[async_trait::async_trait]
    impl IdentityBroker for FakeBroker {
        async fn acquire(&self, mode: AcquireMode) -> Result<Credential> {
            match mode {
                AcquireMode::Silent => {
                    if self.silent_ok {
                        Ok(credential("silent-token"))
                    } else {
                        Err(Error::Identity("no refresh token".into()))
                    }
                }
                AcquireMode::Interactive => {
                    if self.interactive_ok {
                        Ok(credential("interactive-token"))
                    } else {
                        Err(Error::Identity("user closed the window".into()))
                    }
                }
            }
        }

        async fn fetch_userinfo(&self, _token: &str) -> Result<UserProfile> {
            if self.userinfo_ok {
                Ok(profile("user@example.com"))
            } else {
                Err(Error::Identity("userinfo endpoint down".into()))
            }
        }

        async fn revoke(&self, _token: &str) -> Result<()> {
            if self.revoke_ok {
                Ok(())
            } else {
                Err(Error::Identity("revocation endpoint down".into()))
            }
        }
    }

    /// Store whose reads never complete, for the timeout contract.
    struct HangingStore;

    #[async_trait::async_trait]
    impl TokenStore for HangingStore {
        async fn credential(&self) -> Result<Option<Credential>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
        async fn set_credential(&self, _: &Credential) -> Result<()> {
            Ok(())
        }
        async fn profile(&self) -> Result<Option<UserProfile>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
        async fn set_profile(&self, _: &UserProfile) -> Result<()> {
            Ok(())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    fn session(store: Arc<dyn TokenStore>, broker: FakeBroker) -> SessionManager {
        SessionManager::new(store, Arc::new(broker), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn authenticated_only_with_credential_and_profile() {
        let store = Arc::new(MemoryStore::new());
        let manager = session(store.clone(), FakeBroker::default());
        assert!(!manager.is_authenticated().await);

        store.set_credential(&credential("t")).await.unwrap();
        assert!(!manager.is_authenticated().await);

        store.set_profile(&profile("a@b.c")).await.unwrap();
        assert!(manager.is_authenticated().await);
    }

    #[tokio::test(start_paused = true)]
    async fn status_check_times_out_to_false() {
        let manager = session(Arc::new(HangingStore), FakeBroker::default());
        assert!(!manager.is_authenticated().await);
        assert_eq!(manager.current_user().await, None);
    }

    #[tokio::test]
    async fn sign_in_stores_credential_and_profile() {
        let store = Arc::new(MemoryStore::new());
        let broker = FakeBroker {
            interactive_ok: true,
            userinfo_ok: true,
            ..Default::default()
        };
        let manager = session(store.clone(), broker);

        let profile = manager.sign_in().await.unwrap();
        assert_eq!(profile.email, "user@example.com");
        assert!(store.credential().await.unwrap().is_some());
        assert_eq!(store.profile().await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn sign_in_degrades_to_minimal_profile_on_userinfo_failure() {
        let store = Arc::new(MemoryStore::new());
        let broker = FakeBroker {
            interactive_ok: true,
            userinfo_ok: false,
            ..Default::default()
        };
        let manager = session(store.clone(), broker);

        let profile = manager.sign_in().await.unwrap();
        assert_eq!(profile.email, "unknown");
        assert_eq!(profile.name, "User");
        // Token is kept: the grant itself succeeded.
        assert!(store.credential().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refresh_prefers_silent_renewal() {
        let store = Arc::new(MemoryStore::new());
        let broker = FakeBroker {
            silent_ok: true,
            interactive_ok: true,
            ..Default::default()
        };
        let manager = session(store.clone(), broker);

        let credential = manager.refresh_token().await.unwrap();
        assert_eq!(credential.access_token, "silent-token");
    }

    #[tokio::test]
    async fn refresh_falls_back_to_interactive() {
        let store = Arc::new(MemoryStore::new());
        let broker = FakeBroker {
            silent_ok: false,
            interactive_ok: true,
            ..Default::default()
        };
        let manager = session(store.clone(), broker);

        let credential = manager.refresh_token().await.unwrap();
        assert_eq!(credential.access_token, "interactive-token");
    }

    #[tokio::test]
    async fn refresh_exhaustion_clears_store_and_expires() {
        let store = Arc::new(MemoryStore::new());
        store.set_credential(&credential("stale")).await.unwrap();
        store.set_profile(&profile("a@b.c")).await.unwrap();
        let manager = session(store.clone(), FakeBroker::default());

        let err = manager.refresh_token().await.unwrap_err();
        assert!(matches!(err, Error::AuthExpired));
        assert!(store.credential().await.unwrap().is_none());
        assert!(store.profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_out_clears_state_even_when_revocation_fails() {
        let store = Arc::new(MemoryStore::new());
        store.set_credential(&credential("t")).await.unwrap();
        store.set_profile(&profile("a@b.c")).await.unwrap();
        let broker = FakeBroker {
            revoke_ok: false,
            ..Default::default()
        };
        let manager = session(store.clone(), broker);

        manager.sign_out().await;
        assert!(store.credential().await.unwrap().is_none());
        assert!(store.profile().await.unwrap().is_none());
    }
}
