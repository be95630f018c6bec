use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::DEFAULT_COMBINATION_LIMIT;
use crate::{
    ArpTable, ClassifyOptions, ExemptPrefixes, GroupingOptions, Ipv4Net, LivenessOptions, ParseOptions,
    Parser, PortResolution, ServiceTable,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read configuration file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings, loaded from JSON. Every key is optional.
///
/// ```json
/// {
///   "sites": { "east": ["10.1.0.0/16"], "west": ["10.2.0.0/16"] },
///   "special": { "monitoring": ["172.16.0.0/16"] },
///   "exempt_prefixes": ["198.51."],
///   "services": { "corp-app": 8443 },
///   "port_resolution": "strict"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Address space per site.
    pub sites: BTreeMap<String, Vec<Ipv4Net>>,
    /// Named special/shared ranges.
    pub special: BTreeMap<String, Vec<Ipv4Net>>,
    pub exempt_prefixes: Vec<String>,
    /// Extra service names, shadowing built-in ones.
    pub services: BTreeMap<String, u16>,
    pub port_resolution: PortResolution,
    pub reject_any: bool,
    pub combination_limit: usize,
    /// Leave same-site and blanket core/out-of-band rules out of
    /// classification.
    pub exclude_local_noise: bool,
    pub link_mirrors: bool,
    pub arp_ignore_third_octet: Vec<u8>,
    pub liveness_scope: Option<Vec<Ipv4Net>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sites: BTreeMap::new(),
            special: BTreeMap::new(),
            exempt_prefixes: Vec::new(),
            services: BTreeMap::new(),
            port_resolution: PortResolution::default(),
            reject_any: false,
            combination_limit: DEFAULT_COMBINATION_LIMIT,
            exclude_local_noise: false,
            link_mirrors: true,
            arp_ignore_third_octet: Vec::new(),
            liveness_scope: None,
        }
    }
}

impl EngineConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed JSON, malformed CIDR strings or
    /// a zero combination limit.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        tracing::debug!(
            path = %path.display(),
            sites = config.sites.len(),
            special = config.special.len(),
            "loaded engine configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.combination_limit == 0 {
            return Err(ConfigError::Invalid(
                "combination_limit must be greater than zero".into(),
            ));
        }
        if let Some((name, _)) = self.sites.iter().find(|(_, space)| space.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "site '{name}' has an empty address space"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            port_resolution: self.port_resolution,
            reject_any: self.reject_any,
        }
    }

    /// A parser with the configured options and service names.
    #[must_use]
    pub fn parser(&self) -> Parser {
        Parser::new(self.parse_options())
            .with_services(ServiceTable::new().with_extra(&self.services))
    }

    #[must_use]
    pub fn grouping_options(&self) -> GroupingOptions {
        GroupingOptions {
            link_mirrors: self.link_mirrors,
        }
    }

    /// Special ranges are flattened across names.
    #[must_use]
    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            sites: self.sites.clone(),
            special: self.special.values().flatten().copied().collect(),
            combination_limit: self.combination_limit,
            exclude_local_noise: self.exclude_local_noise,
        }
    }

    #[must_use]
    pub fn liveness_options(&self) -> LivenessOptions {
        LivenessOptions {
            exempt: ExemptPrefixes::new(self.exempt_prefixes.iter().cloned()),
            scope: self.liveness_scope.clone(),
        }
    }

    /// Parse `show ip arp` output with the configured ignored octets.
    #[must_use]
    pub fn arp_table(&self, text: &str) -> ArpTable {
        ArpTable::parse_with(text, &self.arp_ignore_third_octet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.link_mirrors);
        assert_eq!(config.combination_limit, DEFAULT_COMBINATION_LIMIT);
    }

    #[test]
    fn full_config() {
        let config = EngineConfig::from_json(
            r#"{
                "sites": { "east": ["10.1.0.0/16"], "west": ["10.2.0.0/16", "10.3.0.0/16"] },
                "special": { "monitoring": ["172.16.0.0/16"], "shared": ["172.17.0.0/16"] },
                "exempt_prefixes": ["198.51."],
                "services": { "corp-app": 8443 },
                "port_resolution": "strict",
                "reject_any": true,
                "combination_limit": 500,
                "exclude_local_noise": true,
                "link_mirrors": false,
                "arp_ignore_third_octet": [108],
                "liveness_scope": ["10.0.0.0/8"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.sites["west"].len(), 2);
        assert_eq!(config.classify_options().special.len(), 2);
        assert_eq!(config.classify_options().combination_limit, 500);
        assert!(config.classify_options().exclude_local_noise);
        assert!(!config.grouping_options().link_mirrors);
        assert_eq!(config.parse_options().port_resolution, PortResolution::Strict);
        assert!(config.liveness_options().scope.is_some());
        let arp = config.arp_table(
            "Internet  10.1.108.5  3  0050.56a1.0001  ARPA  Vlan108\n\
             Internet  10.1.7.5  3  0050.56a1.0002  ARPA  Vlan7\n",
        );
        assert_eq!(arp.addresses().len(), 1);
        assert_eq!(arp.ignored(), 1);

        let rule = config.parser().parse("permit tcp 10.1.0.0/16 10.2.0.0/16 eq corp-app").unwrap();
        assert_eq!(rule.dst_port(), Some(8443));
    }

    #[test]
    fn rejects_bad_cidr() {
        let err = EngineConfig::from_json(r#"{ "sites": { "east": ["10.1.0.0/33"] } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn rejects_zero_limit_and_empty_site() {
        let err = EngineConfig::from_json(r#"{ "combination_limit": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = EngineConfig::from_json(r#"{ "sites": { "east": [] } }"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: site 'east' has an empty address space"
        );
    }

    #[test]
    fn missing_file() {
        let err = EngineConfig::from_file("/nonexistent/aclrel.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
