// Caller-owned provider credentials
use super::provider::Provider;
use std::collections::HashMap;

/// Opaque credential handle. Never persisted and never printed.
#[derive(Clone)]
pub struct ProviderCredential {
    secret: String,
}

impl ProviderCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Raw credential material, for handing to a vendor SDK only.
    pub fn expose(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProviderCredential(<redacted>)")
    }
}

/// Credentials for the providers a caller intends to reach.
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
    credentials: HashMap<Provider, ProviderCredential>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Provider, credential: ProviderCredential) -> Self {
        self.credentials.insert(provider, credential);
        self
    }

    pub fn get(&self, provider: Provider) -> Option<&ProviderCredential> {
        self.credentials.get(&provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let creds =
            CredentialSet::new().with(Provider::Aws, ProviderCredential::new("AKIA-secret"));
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("AKIA-secret"));
        assert!(printed.contains("<redacted>"));
        assert_eq!(creds.get(Provider::Aws).unwrap().expose(), "AKIA-secret");
        assert!(creds.get(Provider::Gcp).is_none());
    }
}
