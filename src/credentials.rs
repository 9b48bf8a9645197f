//! 凭据解析：按提供方解析并缓存 API 密钥。
//!
//! Per-provider credential resolution.
//!
//! Lookup order on first use: a key the user supplied this session, the OS keyring
//! (feature `keyring-store`), then environment variables. The resolved credential is
//! cached for the life of the resolver; a newly supplied key atomically replaces it.
//! Values that are blank or contain `placeholder` count as absent. With the keyring
//! enabled, [`CredentialResolver::persist_supplied`] saves a key entered by the user
//! so later sessions find it.

use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::types::Provider;

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    Keyring,
    UserSupplied,
}

/// A resolved API key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    source: CredentialSource,
}

impl Credential {
    pub fn new(token: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            token: token.into(),
            source,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

fn is_usable(token: &str) -> bool {
    let t = token.trim();
    !t.is_empty() && !t.to_ascii_lowercase().contains("placeholder")
}

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Resolves and caches one credential per provider.
pub struct CredentialResolver {
    gemini: ArcSwapOption<Credential>,
    groq: ArcSwapOption<Credential>,
    env: Box<EnvLookup>,
    use_keyring: bool,
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("gemini", &self.gemini.load().is_some())
            .field("groq", &self.groq.load().is_some())
            .field("use_keyring", &self.use_keyring)
            .finish()
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CredentialResolver {
    /// Resolver backed by the process environment.
    pub fn from_env() -> Self {
        Self::with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Resolver with no ambient source; only supplied keys are usable.
    pub fn empty() -> Self {
        Self::with_env_lookup(|_| None)
    }

    /// Resolver with a custom environment lookup (tests, embedded hosts).
    pub fn with_env_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            gemini: ArcSwapOption::empty(),
            groq: ArcSwapOption::empty(),
            env: Box::new(lookup),
            use_keyring: false,
        }
    }

    /// Also consult the OS keyring (service `quillforge`, user = provider id).
    #[cfg(feature = "keyring-store")]
    pub fn with_keyring(mut self) -> Self {
        self.use_keyring = true;
        self
    }

    fn slot(&self, provider: Provider) -> &ArcSwapOption<Credential> {
        match provider {
            Provider::Gemini => &self.gemini,
            Provider::Groq => &self.groq,
        }
    }

    /// Resolve the credential for `provider`, caching the first hit.
    pub fn resolve(&self, provider: Provider) -> Option<Arc<Credential>> {
        let slot = self.slot(provider);
        if let Some(cached) = slot.load_full() {
            return Some(cached);
        }

        let found = self
            .from_keyring(provider)
            .or_else(|| self.from_environment(provider))?;
        let found = Arc::new(found);
        // Keep a key supplied concurrently rather than overwriting it.
        let prev = slot.compare_and_swap(&None::<Arc<Credential>>, Some(found.clone()));
        match &*prev {
            Some(existing) => Some(existing.clone()),
            None => {
                debug!(provider = provider.id(), source = ?found.source(), "credential resolved");
                Some(found)
            }
        }
    }

    /// Whether a usable credential exists for `provider`.
    pub fn has_usable(&self, provider: Provider) -> bool {
        self.resolve(provider).is_some()
    }

    /// Install a key the user just entered. Returns `false` if the value is unusable.
    pub fn supply(&self, provider: Provider, token: impl Into<String>) -> bool {
        let token = token.into();
        if !is_usable(&token) {
            return false;
        }
        self.slot(provider).store(Some(Arc::new(Credential::new(
            token.trim(),
            CredentialSource::UserSupplied,
        ))));
        info!(provider = provider.id(), "credential supplied");
        true
    }

    /// Drop the cached credential after the provider rejected it.
    pub fn invalidate(&self, provider: Provider) {
        self.slot(provider).store(None);
        info!(provider = provider.id(), "credential invalidated");
    }

    fn from_environment(&self, provider: Provider) -> Option<Credential> {
        provider
            .env_vars()
            .iter()
            .filter_map(|key| (self.env)(key))
            .find(|v| is_usable(v))
            .map(|v| Credential::new(v.trim(), CredentialSource::Environment))
    }

    #[cfg(feature = "keyring-store")]
    fn from_keyring(&self, provider: Provider) -> Option<Credential> {
        if !self.use_keyring {
            return None;
        }
        let entry = keyring::Entry::new("quillforge", provider.id()).ok()?;
        let token = entry.get_password().ok()?;
        is_usable(&token).then(|| Credential::new(token.trim(), CredentialSource::Keyring))
    }

    #[cfg(not(feature = "keyring-store"))]
    fn from_keyring(&self, _provider: Provider) -> Option<Credential> {
        None
    }

    /// Save the key the user supplied for `provider` in the OS keyring.
    ///
    /// Returns `Ok(false)` without touching the keyring when it is not enabled or the
    /// cached credential did not come from the user.
    pub fn persist_supplied(&self, provider: Provider) -> crate::Result<bool> {
        if !self.use_keyring {
            return Ok(false);
        }
        let Some(credential) = self.slot(provider).load_full() else {
            return Ok(false);
        };
        if credential.source() != CredentialSource::UserSupplied {
            return Ok(false);
        }
        write_keyring(provider, credential.token())?;
        info!(provider = provider.id(), "credential saved to keyring");
        Ok(true)
    }
}

#[cfg(feature = "keyring-store")]
fn write_keyring(provider: Provider, token: &str) -> crate::Result<()> {
    let keyring_error = |e: keyring::Error| {
        crate::Error::configuration_with_context(
            e.to_string(),
            crate::ErrorContext::new()
                .with_field_path(provider.id())
                .with_source("keyring"),
        )
    };
    let entry = keyring::Entry::new("quillforge", provider.id()).map_err(keyring_error)?;
    entry.set_password(token).map_err(keyring_error)
}

#[cfg(not(feature = "keyring-store"))]
fn write_keyring(_provider: Provider, _token: &str) -> crate::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> CredentialResolver {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CredentialResolver::with_env_lookup(move |k| map.get(k).cloned())
    }

    #[test]
    fn test_environment_resolution_and_alias() {
        let r = env(&[("API_KEY", "g-key")]);
        let c = r.resolve(Provider::Gemini).unwrap();
        assert_eq!(c.token(), "g-key");
        assert_eq!(c.source(), CredentialSource::Environment);
        assert!(!r.has_usable(Provider::Groq));
    }

    #[test]
    fn test_placeholder_is_absent() {
        let r = env(&[("GROQ_API_KEY", "PLACEHOLDER_API_KEY")]);
        assert!(r.resolve(Provider::Groq).is_none());
    }

    #[test]
    fn test_supply_replaces_cached() {
        let r = env(&[("GROQ_API_KEY", "old")]);
        assert_eq!(r.resolve(Provider::Groq).unwrap().token(), "old");
        assert!(r.supply(Provider::Groq, " new "));
        let c = r.resolve(Provider::Groq).unwrap();
        assert_eq!(c.token(), "new");
        assert_eq!(c.source(), CredentialSource::UserSupplied);
        assert!(!r.supply(Provider::Groq, "  "));
    }

    #[test]
    fn test_invalidate_clears_user_key() {
        let r = CredentialResolver::empty();
        r.supply(Provider::Gemini, "k");
        assert!(r.has_usable(Provider::Gemini));
        r.invalidate(Provider::Gemini);
        assert!(!r.has_usable(Provider::Gemini));
    }

    #[test]
    fn test_persist_supplied_is_noop_without_keyring() {
        let r = env(&[("GEMINI_API_KEY", "g-key")]);
        assert!(r.has_usable(Provider::Gemini));
        assert!(!r.persist_supplied(Provider::Gemini).unwrap());

        assert!(r.supply(Provider::Groq, "typed-in"));
        assert!(!r.persist_supplied(Provider::Groq).unwrap());
    }

    #[cfg(feature = "keyring-store")]
    #[test]
    fn test_persist_supplied_skips_environment_keys() {
        let r = env(&[("GEMINI_API_KEY", "g-key")]).with_keyring();
        assert!(r.has_usable(Provider::Gemini));
        assert!(!r.persist_supplied(Provider::Gemini).unwrap());
        assert!(!r.persist_supplied(Provider::Groq).unwrap());
    }

    #[test]
    fn test_debug_redacts_token() {
        let c = Credential::new("secret", CredentialSource::Environment);
        assert!(!format!("{:?}", c).contains("secret"));
    }
}
