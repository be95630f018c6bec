//! Cross-platform classification of rules across sites and device roles.
//!
//! Rules come from several sites, each with core, access and out-of-band
//! devices. A fixed sequence of [`Pass`]es labels rules whose relationships
//! close across two sites (or fall into special address ranges). Labels are
//! monotonic and every pass reads indices built once per run.

mod index;
mod labels;
mod passes;
mod report;

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use labels::LabelMap;
pub use passes::Pass;
pub use report::{ClassificationReport, CombinatorialLimitExceeded, PassOutcome};

use index::{Buckets, PairIndex};
use passes::{run_pair, run_site, Run, Site};

use crate::block::is_acl_rule;
use crate::{DeviceRole, Ipv4Net, Parser, Rule, RuleId, SourceLine};

/// Default ceiling on combinations one pass may examine per site (pair).
pub const DEFAULT_COMBINATION_LIMIT: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyOptions {
    /// Address space per site. Sites without an entry have no space and
    /// take part in no cross-site pass.
    pub sites: BTreeMap<String, Vec<Ipv4Net>>,
    /// Special/shared ranges, e.g. monitoring or shared-services networks.
    pub special: Vec<Ipv4Net>,
    pub combination_limit: usize,
    /// Leave out core and out-of-band rules that only describe a site's own
    /// traffic or blanket reachability; see [`is_local_noise`].
    #[serde(default)]
    pub exclude_local_noise: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            sites: BTreeMap::new(),
            special: Vec::new(),
            combination_limit: DEFAULT_COMBINATION_LIMIT,
            exclude_local_noise: false,
        }
    }
}

/// Parse and classify raw lines.
///
/// Lines that do not look like ACL entries are ignored; ACL-looking lines
/// that fail to parse are counted in [`ClassificationReport::skipped`].
pub fn classify_lines(
    lines: &[SourceLine],
    parser: &Parser,
    options: &ClassifyOptions,
) -> ClassificationReport {
    let mut entries = Vec::with_capacity(lines.len());
    let mut skipped = 0;
    for line in lines.iter().filter(|l| is_acl_rule(&l.text)) {
        match parser.parse(&line.text) {
            Ok(rule) => entries.push((line.id.clone(), rule)),
            Err(err) => {
                tracing::trace!(id = %line.id, %err, "skipping unparsable line");
                skipped += 1;
            }
        }
    }
    run(&entries, options, LabelMap::new(), skipped)
}

/// Classify already-parsed rules.
pub fn classify_entries(entries: &[(RuleId, Rule)], options: &ClassifyOptions) -> ClassificationReport {
    run(entries, options, LabelMap::new(), 0)
}

/// Classify on top of an existing label map.
///
/// Applying this to the labels of a previous run over the same input
/// changes nothing.
pub fn classify_onto(
    entries: &[(RuleId, Rule)],
    options: &ClassifyOptions,
    labels: LabelMap,
) -> ClassificationReport {
    run(entries, options, labels, 0)
}

fn run(
    entries: &[(RuleId, Rule)],
    options: &ClassifyOptions,
    labels: LabelMap,
    skipped: usize,
) -> ClassificationReport {
    let (entries, excluded) = exclude_noise(entries, options);
    let entries = entries.as_ref();
    let sites = build_sites(entries, options);
    let pairs = build_pairs(&sites);
    let mirrors = MirrorColumns::build(entries);

    let mut state = Run {
        labels,
        touched: BTreeSet::new(),
        truncations: Vec::new(),
        special: &options.special,
        known: options.sites.values().flatten().copied().collect(),
        limit: options.combination_limit,
    };

    let mut outcomes = Vec::with_capacity(Pass::ALL.len());
    for pass in Pass::ALL {
        if pass.is_cross_site() {
            for (a, b, forward, backward) in &pairs {
                run_pair(pass, &sites[*a], &sites[*b], forward, &mut state);
                run_pair(pass, &sites[*b], &sites[*a], backward, &mut state);
            }
        } else {
            for site in &sites {
                run_site(pass, site, &mut state);
            }
        }
        mirrors.propagate(&mut state);
        let newly_labeled = std::mem::take(&mut state.touched).len();
        tracing::debug!(pass = pass.name(), newly_labeled, "classification pass done");
        outcomes.push(PassOutcome {
            pass,
            newly_labeled,
        });
    }

    let service_warnings = entries
        .iter()
        .filter(|(_, rule)| !rule.unresolved_services().is_empty())
        .map(|(id, rule)| {
            tracing::warn!(%id, names = ?rule.unresolved_services(), "unresolved service names dropped");
            (id.clone(), rule.unresolved_services().to_vec())
        })
        .collect();

    ClassificationReport::new(state.labels, outcomes, state.truncations, service_warnings, skipped)
        .with_excluded(excluded)
}

/// Whether a core or out-of-band rule of a site with address `space` is
/// left out of classification:
///
/// - both endpoints inside the site's own space,
/// - `any` to `any`,
/// - `any` to a `/8`,
/// - `icmp` from `any` to the `.252/30` point-to-point link.
///
/// Sites without space exclude nothing.
#[must_use]
pub fn is_local_noise(rule: &Rule, space: &[Ipv4Net]) -> bool {
    if space.is_empty() {
        return false;
    }
    let (src, dst) = (rule.source(), rule.destination());
    if src.within_any(space) && dst.within_any(space) {
        return true;
    }
    if !src.is_any() {
        return false;
    }
    dst.is_any()
        || dst.prefix_len() == 8
        || (rule.protocol().as_str() == "icmp" && dst.prefix_len() == 30 && dst.network().octets()[3] == 252)
}

/// Entries left after [`is_local_noise`] filtering, and how many were left out.
fn exclude_noise<'e>(
    entries: &'e [(RuleId, Rule)],
    options: &ClassifyOptions,
) -> (Cow<'e, [(RuleId, Rule)]>, usize) {
    if !options.exclude_local_noise {
        return (Cow::Borrowed(entries), 0);
    }
    let (kept, dropped): (Vec<_>, Vec<_>) = entries.iter().cloned().partition(|(id, rule)| {
        id.role == DeviceRole::Access
            || !is_local_noise(rule, options.sites.get(&id.site).map_or(&[][..], Vec::as_slice))
    });
    for (id, _) in &dropped {
        tracing::trace!(%id, "excluding local rule");
    }
    tracing::debug!(excluded = dropped.len(), "local rules left out of classification");
    (Cow::Owned(kept), dropped.len())
}

fn build_sites<'r>(entries: &'r [(RuleId, Rule)], options: &'r ClassifyOptions) -> Vec<Site<'r>> {
    let mut grouped: BTreeMap<&'r str, (Buckets<&'r RuleId>, Buckets<&'r Rule>)> = BTreeMap::new();
    for (id, rule) in entries {
        let (ids, rules) = grouped.entry(id.site.as_str()).or_default();
        let (id_list, rule_list) = match id.role {
            DeviceRole::Core => (&mut ids.core, &mut rules.core),
            DeviceRole::Access => (&mut ids.access, &mut rules.access),
            DeviceRole::OutOfBand => (&mut ids.oob, &mut rules.oob),
        };
        id_list.push(id);
        rule_list.push(rule);
    }
    grouped
        .into_iter()
        .map(|(name, (ids, rules))| {
            let space = options.sites.get(name).map_or(&[][..], Vec::as_slice);
            Site::new(name, space, ids, rules)
        })
        .collect()
}

/// Site pairs with distinct, non-empty address spaces, with indices for
/// both directions.
fn build_pairs(sites: &[Site<'_>]) -> Vec<(usize, usize, PairIndex, PairIndex)> {
    let mut pairs = Vec::new();
    for a in 0..sites.len() {
        for b in (a + 1)..sites.len() {
            let (x, y) = (&sites[a], &sites[b]);
            if x.space.is_empty() || y.space.is_empty() || x.space == y.space {
                continue;
            }
            let (forward, backward) = PairIndex::build_both(&x.rules, &y.rules);
            pairs.push((a, b, forward, backward));
        }
    }
    pairs
}

/// Rules of the same site and role that appear with identical text in
/// several device columns.
struct MirrorColumns {
    by_text: BTreeMap<(String, DeviceRole, String), Vec<RuleId>>,
    key_of: BTreeMap<RuleId, (String, DeviceRole, String)>,
}

impl MirrorColumns {
    fn build(entries: &[(RuleId, Rule)]) -> Self {
        let mut by_text: BTreeMap<_, Vec<RuleId>> = BTreeMap::new();
        let mut key_of = BTreeMap::new();
        for (id, rule) in entries {
            let text = match rule.raw().trim() {
                "" => rule.to_string(),
                raw => raw.to_owned(),
            };
            let key = (id.site.clone(), id.role, text);
            by_text.entry(key.clone()).or_default().push(id.clone());
            key_of.insert(id.clone(), key);
        }
        by_text.retain(|_, ids| ids.len() > 1);
        key_of.retain(|_, key| by_text.contains_key(key));
        Self { by_text, key_of }
    }

    /// Copy every label touched by the current pass to its mirrors in other
    /// columns.
    fn propagate(&self, run: &mut Run<'_>) {
        let touched: Vec<RuleId> = run.touched.iter().cloned().collect();
        for id in touched {
            let (Some(key), Some(label)) = (self.key_of.get(&id), run.labels.get(&id)) else {
                continue;
            };
            for other in &self.by_text[key] {
                if other.column != id.column && run.labels.assign(other, label) {
                    run.touched.insert(other.clone());
                }
            }
        }
    }
}
