use serde::{Deserialize, Serialize};

use crate::{Ipv4Net, NetError, PortSpec, Rule};

use super::error::{ParseError, ParseErrorKind};
use super::grammar::{self, Endpoint, PortClause, RawRule};
use super::services::ServiceTable;

/// What to do with a port token that is neither a number nor a known service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortResolution {
    /// Drop the token and record it on the rule. A side whose tokens are
    /// all dropped has no port constraint.
    #[default]
    Lenient,
    /// Fail with [`ParseErrorKind::UnresolvedService`].
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub port_resolution: PortResolution,
    /// Reject rules with an `any` endpoint.
    pub reject_any: bool,
}

/// Turns ACL text lines into [`Rule`]s.
///
/// Grammars are tried in a fixed order (NX-OS CIDR, IOS-XE wildcard, IOS-XE
/// host, IOS-XE mixed, IOS-XE any, ASA) and the first full match wins.
///
/// # Example
///
/// ```
/// use aclrel::{ParseOptions, Parser, PortResolution};
///
/// let parser = Parser::new(ParseOptions {
///     port_resolution: PortResolution::Strict,
///     ..ParseOptions::default()
/// });
/// assert!(parser.parse("permit tcp any any eq www").is_ok());
/// assert!(parser.parse("permit tcp any any eq corp-app").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParseOptions,
    services: ServiceTable,
}

impl Parser {
    #[must_use]
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            services: ServiceTable::new(),
        }
    }

    #[must_use]
    pub fn with_services(mut self, services: ServiceTable) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse one line.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the line matches no grammar or its
    /// addresses or services cannot be resolved.
    pub fn parse(&self, line: &str) -> Result<Rule, ParseError> {
        let text = line.trim();
        if text.is_empty() {
            return Err(ParseError::new(ParseErrorKind::Empty, ""));
        }
        let lowered = text.to_ascii_lowercase();
        let raw = grammar::parse_raw(&lowered)
            .ok_or_else(|| ParseError::new(ParseErrorKind::NoPatternMatch, text))?;
        self.lower(raw, text)
            .map_err(|kind| ParseError::new(kind, text))
    }

    fn lower(&self, raw: RawRule<'_>, text: &str) -> Result<Rule, ParseErrorKind> {
        if self.options.reject_any
            && (raw.source == Endpoint::Any || raw.destination == Endpoint::Any)
        {
            return Err(ParseErrorKind::ContainsAny);
        }
        let source = endpoint_net(raw.source)?;
        let destination = endpoint_net(raw.destination)?;

        let mut unresolved = Vec::new();
        let src_service = self.resolve_clause(raw.src_ports.as_ref(), &mut unresolved)?;
        let dst_service = self.resolve_clause(raw.dst_ports.as_ref(), &mut unresolved)?;
        if !unresolved.is_empty() {
            tracing::debug!(line = text, names = ?unresolved, "dropped unresolved service names");
        }

        Ok(Rule::new(raw.action, raw.protocol, source, destination)
            .with_source_ports(src_service)
            .with_destination_ports(dst_service)
            .with_dialect(raw.dialect)
            .with_raw(text)
            .with_unresolved_services(unresolved))
    }

    fn resolve_clause(
        &self,
        clause: Option<&PortClause<'_>>,
        unresolved: &mut Vec<String>,
    ) -> Result<PortSpec, ParseErrorKind> {
        match clause {
            None => Ok(PortSpec::Any),
            Some(PortClause::Eq(tokens)) => {
                let mut ports = Vec::with_capacity(tokens.len());
                for token in tokens {
                    if let Some(port) = self.resolve_token(token, unresolved)? {
                        ports.push(port);
                    }
                }
                Ok(PortSpec::from_ports(ports))
            }
            Some(PortClause::Range(start, end)) => {
                let start = self.resolve_token(start, unresolved)?;
                let end = self.resolve_token(end, unresolved)?;
                let (Some(start), Some(end)) = (start, end) else {
                    return Ok(PortSpec::Any);
                };
                if start > end {
                    return Err(ParseErrorKind::InvalidPortRange { start, end });
                }
                Ok(PortSpec::range(start, end))
            }
        }
    }

    fn resolve_token(
        &self,
        token: &str,
        unresolved: &mut Vec<String>,
    ) -> Result<Option<u16>, ParseErrorKind> {
        if let Some(port) = self.services.resolve(token) {
            return Ok(Some(port));
        }
        match self.options.port_resolution {
            PortResolution::Strict => Err(ParseErrorKind::UnresolvedService {
                name: token.to_owned(),
            }),
            PortResolution::Lenient => {
                unresolved.push(token.to_owned());
                Ok(None)
            }
        }
    }
}

fn endpoint_net(endpoint: Endpoint) -> Result<Ipv4Net, ParseErrorKind> {
    let net = match endpoint {
        Endpoint::Any => Ok(Ipv4Net::ANY),
        Endpoint::Host(addr) | Endpoint::Bare(addr) => Ok(Ipv4Net::host(addr)),
        Endpoint::Cidr(addr, prefix) => Ipv4Net::new(addr, prefix),
        Endpoint::Mask(addr, mask) => Ipv4Net::from_mask_pair(addr, mask),
    };
    net.map_err(|e: NetError| ParseErrorKind::InvalidNetwork {
        detail: e.to_string(),
    })
}
