// Cloud provider identity and selection
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Gcp, Provider::Azure];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target of a façade call: one provider, or every configured provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSelector {
    One(Provider),
    All,
}

impl From<Provider> for ProviderSelector {
    fn from(provider: Provider) -> Self {
        ProviderSelector::One(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_from_provider() {
        assert_eq!(ProviderSelector::from(Provider::Gcp), ProviderSelector::One(Provider::Gcp));
        assert_eq!(Provider::ALL.map(Provider::as_str), ["aws", "gcp", "azure"]);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Provider::Azure).unwrap();
        assert_eq!(json, "\"azure\"");
        let back: Provider = serde_json::from_str("\"aws\"").unwrap();
        assert_eq!(back, Provider::Aws);
    }
}
