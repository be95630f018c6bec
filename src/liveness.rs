//! Cross-reference of rule endpoints against observed live addresses.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::block::is_acl_rule;
use crate::{Ipv4Net, LivenessVerdict, Parser, Rule, RuleId, SourceLine};

/// Anything that can tell whether a network holds at least one live host.
pub trait LivenessSource {
    fn is_live_within(&self, net: &Ipv4Net) -> bool;
}

impl<T: LivenessSource + ?Sized> LivenessSource for &T {
    fn is_live_within(&self, net: &Ipv4Net) -> bool {
        (**self).is_live_within(net)
    }
}

// -- Live addresses ---------------------------------------------------------

/// Ordered set of live host addresses, queried by range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveAddressSet {
    addrs: BTreeSet<Ipv4Addr>,
}

impl LiveAddressSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: Ipv4Addr) -> bool {
        self.addrs.insert(addr)
    }

    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.addrs.contains(&addr)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

impl LivenessSource for LiveAddressSet {
    fn is_live_within(&self, net: &Ipv4Net) -> bool {
        self.addrs.range(net.network()..=net.last()).next().is_some()
    }
}

impl FromIterator<Ipv4Addr> for LiveAddressSet {
    fn from_iter<I: IntoIterator<Item = Ipv4Addr>>(iter: I) -> Self {
        Self {
            addrs: iter.into_iter().collect(),
        }
    }
}

impl Extend<Ipv4Addr> for LiveAddressSet {
    fn extend<I: IntoIterator<Item = Ipv4Addr>>(&mut self, iter: I) {
        self.addrs.extend(iter);
    }
}

impl From<ArpTable> for LiveAddressSet {
    fn from(table: ArpTable) -> Self {
        table.addresses.into_iter().collect()
    }
}

/// Resolved entries of a device ARP table dump.
///
/// Accepts both the NX-OS layout (`ADDRESS AGE MAC INTERFACE`) and the IOS
/// layout (`Internet ADDRESS AGE MAC TYPE INTERFACE`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArpTable {
    addresses: Vec<Ipv4Addr>,
    incomplete: usize,
    ignored: usize,
}

impl ArpTable {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::parse_with(text, &[])
    }

    /// Like [`parse`](Self::parse), dropping addresses whose third octet is
    /// listed in `ignored_third_octets`.
    #[must_use]
    pub fn parse_with(text: &str, ignored_third_octets: &[u8]) -> Self {
        let mut table = Self::default();
        for line in text.lines() {
            let mut fields: Vec<&str> = line.split_whitespace().collect();
            if fields.first().is_some_and(|f| f.eq_ignore_ascii_case("internet")) {
                fields.remove(0);
            }
            if fields.len() < 3 {
                continue;
            }
            let Ok(addr) = fields[0].parse::<Ipv4Addr>() else {
                continue;
            };
            if fields.iter().any(|f| f.eq_ignore_ascii_case("incomplete")) {
                table.incomplete += 1;
                continue;
            }
            if ignored_third_octets.contains(&addr.octets()[2]) {
                table.ignored += 1;
                continue;
            }
            table.addresses.push(addr);
        }
        tracing::debug!(
            resolved = table.addresses.len(),
            incomplete = table.incomplete,
            ignored = table.ignored,
            "parsed ARP table"
        );
        table
    }

    #[must_use]
    pub fn addresses(&self) -> &[Ipv4Addr] {
        &self.addresses
    }

    /// Entries skipped because they never resolved.
    #[must_use]
    pub fn incomplete(&self) -> usize {
        self.incomplete
    }

    /// Entries dropped by the third-octet filter.
    #[must_use]
    pub fn ignored(&self) -> usize {
        self.ignored
    }
}

// -- Options ----------------------------------------------------------------

/// Address-text prefixes (e.g. `198.51.`) whose networks are never checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptPrefixes {
    prefixes: Vec<String>,
}

impl ExemptPrefixes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .map(|p: String| p.trim().to_owned())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Matches on the dotted network address text.
    #[must_use]
    pub fn is_exempt(&self, net: &Ipv4Net) -> bool {
        if self.prefixes.is_empty() {
            return false;
        }
        let text = net.network().to_string();
        self.prefixes.iter().any(|p| text.starts_with(p.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessOptions {
    pub exempt: ExemptPrefixes,
    /// Only check sides overlapping these networks; others count as
    /// unconstrained.
    pub scope: Option<Vec<Ipv4Net>>,
}

// -- Checker ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Unconstrained,
    Exempt,
    Live,
    Stale,
}

/// Computes [`LivenessVerdict`]s against a [`LivenessSource`].
///
/// # Example
///
/// ```
/// use aclrel::{LiveAddressSet, LivenessChecker, LivenessOptions, LivenessVerdict, Rule};
///
/// let live: LiveAddressSet = ["10.0.0.7".parse::<std::net::Ipv4Addr>().unwrap()]
///     .into_iter()
///     .collect();
/// let checker = LivenessChecker::new(live, LivenessOptions::default());
///
/// let rule: Rule = "permit ip 10.0.0.0/24 198.51.100.0/24".parse().unwrap();
/// assert!(matches!(checker.check(&rule), LivenessVerdict::StaleDestination { .. }));
/// ```
#[derive(Debug, Clone)]
pub struct LivenessChecker<S> {
    source: S,
    options: LivenessOptions,
}

impl<S: LivenessSource> LivenessChecker<S> {
    pub fn new(source: S, options: LivenessOptions) -> Self {
        Self { source, options }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn side(&self, net: &Ipv4Net) -> Side {
        if net.is_any() {
            return Side::Unconstrained;
        }
        if let Some(scope) = &self.options.scope {
            if !net.within_any(scope) {
                return Side::Unconstrained;
            }
        }
        if self.options.exempt.is_exempt(net) {
            Side::Exempt
        } else if self.source.is_live_within(net) {
            Side::Live
        } else {
            Side::Stale
        }
    }

    #[must_use]
    pub fn check(&self, rule: &Rule) -> LivenessVerdict {
        let src = self.side(rule.source());
        let dst = self.side(rule.destination());
        match (src, dst) {
            (Side::Stale, Side::Stale) => LivenessVerdict::StaleBoth {
                source: *rule.source(),
                destination: *rule.destination(),
            },
            (Side::Stale, _) => LivenessVerdict::StaleSource {
                address: *rule.source(),
            },
            (_, Side::Stale) => LivenessVerdict::StaleDestination {
                address: *rule.destination(),
            },
            (Side::Live, _) | (_, Side::Live) => LivenessVerdict::Confirmed,
            (Side::Exempt, _) | (_, Side::Exempt) => LivenessVerdict::Exempt,
            (Side::Unconstrained, Side::Unconstrained) => LivenessVerdict::Confirmed,
        }
    }

    pub fn check_entries(&self, entries: &[(RuleId, Rule)]) -> LivenessReport {
        let verdicts = entries
            .iter()
            .map(|(id, rule)| (id.clone(), self.check(rule)))
            .collect();
        LivenessReport {
            verdicts,
            skipped: 0,
        }
    }

    /// Parse and check raw lines. Non-ACL lines are ignored; ACL-looking
    /// lines the parser rejects are counted as skipped.
    pub fn check_lines(&self, lines: &[SourceLine], parser: &Parser) -> LivenessReport {
        let mut verdicts = BTreeMap::new();
        let mut skipped = 0;
        for line in lines.iter().filter(|l| is_acl_rule(&l.text)) {
            match parser.parse(&line.text) {
                Ok(rule) => {
                    verdicts.insert(line.id.clone(), self.check(&rule));
                }
                Err(err) => {
                    tracing::trace!(id = %line.id, %err, "skipping unparsable line");
                    skipped += 1;
                }
            }
        }
        let report = LivenessReport { verdicts, skipped };
        tracing::debug!(%report, "liveness check done");
        report
    }
}

/// Verdicts of one liveness run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct LivenessReport {
    verdicts: BTreeMap<RuleId, LivenessVerdict>,
    skipped: usize,
}

impl LivenessReport {
    #[must_use]
    pub fn verdicts(&self) -> &BTreeMap<RuleId, LivenessVerdict> {
        &self.verdicts
    }

    #[must_use]
    pub fn get(&self, id: &RuleId) -> Option<&LivenessVerdict> {
        self.verdicts.get(id)
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    #[must_use]
    pub fn stale_count(&self) -> usize {
        self.verdicts.values().filter(|v| v.is_stale()).count()
    }

    #[must_use]
    pub fn confirmed_count(&self) -> usize {
        self.verdicts
            .values()
            .filter(|v| matches!(v, LivenessVerdict::Confirmed))
            .count()
    }

    #[must_use]
    pub fn exempt_count(&self) -> usize {
        self.verdicts
            .values()
            .filter(|v| matches!(v, LivenessVerdict::Exempt))
            .count()
    }

    /// Rows of one device column with a stale verdict, ascending.
    #[must_use]
    pub fn stale_rows(&self, site: &str, column: u32) -> Vec<u32> {
        self.verdicts
            .iter()
            .filter(|(id, verdict)| id.site == site && id.column == column && verdict.is_stale())
            .map(|(id, _)| id.row)
            .collect()
    }

    /// `row -> verdict` per `(site, column)`.
    #[must_use]
    pub fn verdicts_by_row(&self) -> BTreeMap<(String, u32), BTreeMap<u32, LivenessVerdict>> {
        let mut out: BTreeMap<(String, u32), BTreeMap<u32, LivenessVerdict>> = BTreeMap::new();
        for (id, verdict) in &self.verdicts {
            out.entry((id.site.clone(), id.column))
                .or_default()
                .insert(id.row, *verdict);
        }
        out
    }
}

impl fmt::Display for LivenessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checked: {}, confirmed: {}, stale: {}, exempt: {}",
            self.verdicts.len(),
            self.confirmed_count(),
            self.stale_count(),
            self.exempt_count()
        )?;
        if self.skipped > 0 {
            write!(f, ", skipped: {}", self.skipped)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_line, DeviceRole};

    fn live(addrs: &[&str]) -> LiveAddressSet {
        addrs.iter().map(|a| a.parse::<Ipv4Addr>().unwrap()).collect()
    }

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn range_query_hits_network_bounds() {
        let set = live(&["10.0.0.0", "10.0.1.255"]);
        assert!(set.is_live_within(&net("10.0.0.0/24")));
        assert!(set.is_live_within(&net("10.0.1.0/24")));
        assert!(!set.is_live_within(&net("10.0.2.0/24")));
        assert!(set.is_live_within(&Ipv4Net::ANY));
    }

    #[test]
    fn arp_table_formats() {
        let text = "\
Internet  10.1.1.1    5   aabb.cc00.0100  ARPA   Vlan10
10.2.2.2    00:01:12  0050.56aa.0001  Vlan20
10.3.3.3    00:00:09  INCOMPLETE      Vlan30
Internet  10.4.4.4    -   Incomplete      ARPA
garbage line here
10.5.108.7  00:00:01  0050.56aa.0002  Vlan108
short 1";
        let table = ArpTable::parse_with(text, &[108]);
        assert_eq!(
            table.addresses(),
            &["10.1.1.1".parse::<Ipv4Addr>().unwrap(), "10.2.2.2".parse().unwrap()]
        );
        assert_eq!(table.incomplete(), 2);
        assert_eq!(table.ignored(), 1);
        assert_eq!(ArpTable::parse(text).addresses().len(), 3);
    }

    #[test]
    fn exempt_prefix_matches_address_text() {
        let exempt = ExemptPrefixes::new(["198.51.", " "]);
        assert!(exempt.is_exempt(&net("198.51.100.0/24")));
        assert!(!exempt.is_exempt(&net("10.198.51.0/24")));
        assert!(!ExemptPrefixes::default().is_exempt(&net("198.51.100.0/24")));
    }

    #[test]
    fn stale_destination() {
        let checker = LivenessChecker::new(live(&["10.0.0.7"]), LivenessOptions::default());
        let rule = parse_line("permit ip 10.0.0.0/24 198.51.100.0/24").unwrap();
        assert_eq!(
            checker.check(&rule),
            LivenessVerdict::StaleDestination {
                address: net("198.51.100.0/24")
            }
        );
    }

    #[test]
    fn exempt_side_is_never_stale() {
        let options = LivenessOptions {
            exempt: ExemptPrefixes::new(["198.51.100."]),
            scope: None,
        };
        let checker = LivenessChecker::new(live(&["10.0.0.7"]), options);
        let rule = parse_line("permit ip 10.0.0.0/24 198.51.100.0/24").unwrap();
        assert_eq!(checker.check(&rule), LivenessVerdict::Confirmed);

        let rule = parse_line("permit ip any 198.51.100.0/24").unwrap();
        assert_eq!(checker.check(&rule), LivenessVerdict::Exempt);
    }

    #[test]
    fn any_is_never_stale() {
        let checker = LivenessChecker::new(LiveAddressSet::new(), LivenessOptions::default());
        let rule = parse_line("permit ip any any").unwrap();
        assert_eq!(checker.check(&rule), LivenessVerdict::Confirmed);
        let rule = parse_line("permit ip any 10.9.0.0/16").unwrap();
        assert!(checker.check(&rule).is_stale());
    }

    #[test]
    fn both_sides_stale() {
        let checker = LivenessChecker::new(LiveAddressSet::new(), LivenessOptions::default());
        let rule = parse_line("permit tcp host 10.0.0.1 host 10.0.0.2 eq 22").unwrap();
        assert_eq!(
            checker.check(&rule),
            LivenessVerdict::StaleBoth {
                source: net("10.0.0.1/32"),
                destination: net("10.0.0.2/32"),
            }
        );
    }

    #[test]
    fn out_of_scope_sides_are_not_checked() {
        let options = LivenessOptions {
            scope: Some(vec![net("10.0.0.0/8")]),
            ..LivenessOptions::default()
        };
        let checker = LivenessChecker::new(live(&["10.0.0.7"]), options);
        let rule = parse_line("permit ip 10.0.0.0/24 198.51.100.0/24").unwrap();
        assert_eq!(checker.check(&rule), LivenessVerdict::Confirmed);
    }

    #[test]
    fn report_over_lines() {
        let checker = LivenessChecker::new(live(&["10.0.0.7"]), LivenessOptions::default());
        let lines = vec![
            SourceLine::new("east", DeviceRole::Access, 2, 1, "ip access-list WEB"),
            SourceLine::new("east", DeviceRole::Access, 2, 2, "permit ip 10.0.0.0/24 any"),
            SourceLine::new("east", DeviceRole::Access, 2, 3, "permit ip 10.0.0.0/24 10.7.0.0/16"),
            SourceLine::new("east", DeviceRole::Access, 2, 4, "permit tcp any lt 1024 any"),
        ];
        let report = checker.check_lines(&lines, &Parser::default());
        assert_eq!(report.verdicts().len(), 2);
        assert_eq!(report.confirmed_count(), 1);
        assert_eq!(report.stale_count(), 1);
        assert_eq!(report.skipped(), 1);
        let rows = &report.verdicts_by_row()[&("east".to_owned(), 2)];
        assert!(rows[&3].is_stale());
        assert_eq!(
            report.to_string(),
            "checked: 2, confirmed: 1, stale: 1, exempt: 0, skipped: 1"
        );
    }
}
