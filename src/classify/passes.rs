use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::index::{Buckets, PairIndex, Relation, SiteIndex, TierIndex};
use super::labels::LabelMap;
use super::report::CombinatorialLimitExceeded;
use crate::predicate::{contributes_to, covers_mirror, joint_cover};
use crate::{ClassificationLabel, Ipv4Net, Rule, RuleId};

/// Classification passes, in execution order.
///
/// Earlier passes never lose a label to later ones; see
/// [`LabelMap`](super::LabelMap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pass {
    /// Core and access pairs of two sites reverse-match each other, and each
    /// site's core rule equals its access rule.
    CompleteMatch,
    CoreCoversAccess,
    AccessCoversCore,
    /// Several core rules jointly cover a multi-port access rule.
    JointCoreCover,
    PlatformSpecialDestination,
    AccessIpCoversCoreTcp,
    CrossSiteReverseCover,
    SpecialDestinationAccessCover,
    OobCompleteMatch,
    OobCoversAccess,
    AccessCoversOob,
    /// Out-of-band covers access locally and relates to the other site's core.
    OobContainment,
    PlatformExternalExposure,
    SpecialDestinationRule,
    SpecialAddressPair,
    SpecialSourceExternal,
}

impl Pass {
    pub const ALL: [Self; 16] = [
        Self::CompleteMatch,
        Self::CoreCoversAccess,
        Self::AccessCoversCore,
        Self::JointCoreCover,
        Self::PlatformSpecialDestination,
        Self::AccessIpCoversCoreTcp,
        Self::CrossSiteReverseCover,
        Self::SpecialDestinationAccessCover,
        Self::OobCompleteMatch,
        Self::OobCoversAccess,
        Self::AccessCoversOob,
        Self::OobContainment,
        Self::PlatformExternalExposure,
        Self::SpecialDestinationRule,
        Self::SpecialAddressPair,
        Self::SpecialSourceExternal,
    ];

    /// The label this pass assigns.
    #[must_use]
    pub fn label(self) -> ClassificationLabel {
        use ClassificationLabel as L;
        match self {
            Self::CompleteMatch => L::CompleteMatch,
            Self::CoreCoversAccess
            | Self::AccessCoversCore
            | Self::JointCoreCover
            | Self::CrossSiteReverseCover => L::CoveringMatch,
            Self::PlatformSpecialDestination
            | Self::AccessIpCoversCoreTcp
            | Self::SpecialDestinationAccessCover
            | Self::SpecialDestinationRule => L::SpecialDestination,
            Self::OobCompleteMatch
            | Self::OobCoversAccess
            | Self::AccessCoversOob
            | Self::OobContainment => L::OutOfBandMatch,
            Self::PlatformExternalExposure => L::PlatformExternalExposure,
            Self::SpecialAddressPair => L::SpecialAddressPair,
            Self::SpecialSourceExternal => L::SpecialSourceExternal,
        }
    }

    /// Whether the pass compares two sites (otherwise it looks at one site).
    #[must_use]
    pub fn is_cross_site(self) -> bool {
        !matches!(
            self,
            Self::PlatformExternalExposure
                | Self::SpecialDestinationRule
                | Self::SpecialAddressPair
                | Self::SpecialSourceExternal
        )
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CompleteMatch => "complete-match",
            Self::CoreCoversAccess => "core-covers-access",
            Self::AccessCoversCore => "access-covers-core",
            Self::JointCoreCover => "joint-core-cover",
            Self::PlatformSpecialDestination => "platform-special-destination",
            Self::AccessIpCoversCoreTcp => "access-ip-covers-core-tcp",
            Self::CrossSiteReverseCover => "cross-site-reverse-cover",
            Self::SpecialDestinationAccessCover => "special-destination-access-cover",
            Self::OobCompleteMatch => "oob-complete-match",
            Self::OobCoversAccess => "oob-covers-access",
            Self::AccessCoversOob => "access-covers-oob",
            Self::OobContainment => "oob-containment",
            Self::PlatformExternalExposure => "platform-external-exposure",
            Self::SpecialDestinationRule => "special-destination-rule",
            Self::SpecialAddressPair => "special-address-pair",
            Self::SpecialSourceExternal => "special-source-external",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// -- Run state --------------------------------------------------------------

/// One site's rules, split by role, with its local indices.
pub(super) struct Site<'r> {
    pub name: &'r str,
    pub space: &'r [Ipv4Net],
    pub ids: Buckets<&'r RuleId>,
    pub rules: Buckets<&'r Rule>,
    pub index: SiteIndex,
}

impl<'r> Site<'r> {
    pub(super) fn new(
        name: &'r str,
        space: &'r [Ipv4Net],
        ids: Buckets<&'r RuleId>,
        rules: Buckets<&'r Rule>,
    ) -> Self {
        let index = SiteIndex::build(&rules.core, &rules.access, &rules.oob);
        Self {
            name,
            space,
            ids,
            rules,
            index,
        }
    }
}

/// Label state shared by all passes of one run.
pub(super) struct Run<'r> {
    pub labels: LabelMap,
    pub touched: BTreeSet<RuleId>,
    pub truncations: Vec<CombinatorialLimitExceeded>,
    pub special: &'r [Ipv4Net],
    /// Union of every site's address space.
    pub known: Vec<Ipv4Net>,
    pub limit: usize,
}

impl Run<'_> {
    fn mark(&mut self, id: &RuleId, label: ClassificationLabel) {
        if self.labels.assign(id, label) {
            self.touched.insert(id.clone());
        }
    }

    fn mark_all(&mut self, ids: &[&RuleId], label: ClassificationLabel) {
        for id in ids {
            self.mark(id, label);
        }
    }

    fn is_special(&self, net: &Ipv4Net) -> bool {
        net.within_any(self.special)
    }

    fn is_external(&self, net: &Ipv4Net) -> bool {
        !net.within_any(&self.known)
    }
}

/// Ceiling on combinations examined by one pass for one site (pair).
///
/// Outer candidates are admitted in order until the next one would exceed
/// the limit; from then on every candidate is skipped, so
/// `examined + skipped` is always the full count.
#[derive(Debug, Clone, Copy)]
pub(super) struct Budget {
    limit: usize,
    examined: usize,
    skipped: usize,
}

impl Budget {
    pub(super) fn new(limit: usize) -> Self {
        Self {
            limit,
            examined: 0,
            skipped: 0,
        }
    }

    pub(super) fn admit(&mut self, cost: usize) -> bool {
        let cost = cost.max(1);
        if self.skipped == 0 && self.examined.saturating_add(cost) <= self.limit {
            self.examined += cost;
            true
        } else {
            self.skipped += cost;
            false
        }
    }

    fn finish(self, pass: Pass, site_a: &str, site_b: Option<&str>, run: &mut Run<'_>) {
        if self.skipped == 0 {
            return;
        }
        let warning = CombinatorialLimitExceeded {
            pass,
            site_a: site_a.to_owned(),
            site_b: site_b.map(str::to_owned),
            limit: self.limit,
            examined: self.examined,
            skipped: self.skipped,
        };
        tracing::warn!(
            pass = pass.name(),
            site_a,
            site_b,
            limit = self.limit,
            examined = self.examined,
            skipped = self.skipped,
            "combination limit reached, pass truncated"
        );
        run.truncations.push(warning);
    }
}

// -- Dispatch ---------------------------------------------------------------

/// Run a cross-site pass for the ordered pair `(x, y)`.
pub(super) fn run_pair(pass: Pass, x: &Site<'_>, y: &Site<'_>, pair: &PairIndex, run: &mut Run<'_>) {
    if !pass.is_cross_site() {
        return;
    }
    let mut budget = Budget::new(run.limit);
    let cross = Cross {
        x,
        y,
        pair,
        label: pass.label(),
    };
    match pass {
        Pass::CompleteMatch => cross.four_way(Tier::Core, Internal::Equals, run, &mut budget),
        Pass::CoreCoversAccess => cross.four_way(Tier::Core, Internal::TierCovers, run, &mut budget),
        Pass::AccessCoversCore => cross.four_way(Tier::Core, Internal::AccessCovers, run, &mut budget),
        Pass::JointCoreCover => cross.joint_core_cover(run, &mut budget),
        Pass::PlatformSpecialDestination => cross.platform_special_destination(run, &mut budget),
        Pass::AccessIpCoversCoreTcp => cross.access_ip_covers_core(run, &mut budget),
        Pass::CrossSiteReverseCover => cross.reverse_cover(run, &mut budget),
        Pass::SpecialDestinationAccessCover => cross.special_destination_access_cover(run, &mut budget),
        Pass::OobCompleteMatch => cross.four_way(Tier::Oob, Internal::Equals, run, &mut budget),
        Pass::OobCoversAccess => cross.four_way(Tier::Oob, Internal::TierCovers, run, &mut budget),
        Pass::AccessCoversOob => cross.four_way(Tier::Oob, Internal::AccessCovers, run, &mut budget),
        Pass::OobContainment => cross.oob_containment(run, &mut budget),
        Pass::PlatformExternalExposure
        | Pass::SpecialDestinationRule
        | Pass::SpecialAddressPair
        | Pass::SpecialSourceExternal => {}
    }
    budget.finish(pass, x.name, Some(y.name), run);
}

/// Run a single-site pass.
pub(super) fn run_site(pass: Pass, x: &Site<'_>, run: &mut Run<'_>) {
    if pass.is_cross_site() {
        return;
    }
    let mut budget = Budget::new(run.limit);
    let label = pass.label();
    match pass {
        Pass::PlatformExternalExposure => platform_external_exposure(x, label, run, &mut budget),
        Pass::SpecialDestinationRule => special_destination_rule(x, label, run, &mut budget),
        Pass::SpecialAddressPair => special_access(x, label, run, &mut budget, |run, rule| {
            run.is_special(rule.source()) && run.is_special(rule.destination())
        }),
        Pass::SpecialSourceExternal => special_access(x, label, run, &mut budget, |run, rule| {
            run.is_special(rule.source()) && run.is_external(rule.destination())
        }),
        _ => {}
    }
    budget.finish(pass, x.name, None, run);
}

// -- Cross-site passes ------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Tier {
    Core,
    Oob,
}

/// How a tier rule must relate to the access rule of its own site.
#[derive(Debug, Clone, Copy)]
enum Internal {
    Equals,
    TierCovers,
    AccessCovers,
}

fn tier_index<'s>(site: &'s Site<'_>, tier: Tier) -> &'s TierIndex {
    match tier {
        Tier::Core => &site.index.core,
        Tier::Oob => &site.index.oob,
    }
}

fn tier_ids<'s, 'r>(site: &'s Site<'r>, tier: Tier) -> &'s [&'r RuleId] {
    match tier {
        Tier::Core => &site.ids.core,
        Tier::Oob => &site.ids.oob,
    }
}

fn local_relation(index: &TierIndex, internal: Internal) -> &Relation {
    match internal {
        Internal::Equals => &index.equals,
        Internal::TierCovers => &index.covers,
        Internal::AccessCovers => &index.covered_by,
    }
}

/// Site `x` looked at against site `y`.
struct Cross<'a, 'r> {
    x: &'a Site<'r>,
    y: &'a Site<'r>,
    pair: &'a PairIndex,
    label: ClassificationLabel,
}

impl<'r> Cross<'_, 'r> {
    /// First access rule of `y` that reverse-matches access rule `ax` of `x`.
    fn mirror_access(&self, ax: usize) -> Option<&'r RuleId> {
        self.pair
            .access_rev
            .related(ax)
            .first()
            .map(|&ay| self.y.ids.access[ay])
    }

    /// Tier rules of both sites reverse-match, access rules of both sites
    /// reverse-match, and on each site the tier rule relates to the access
    /// rule.
    fn four_way(&self, tier: Tier, internal: Internal, run: &mut Run<'_>, budget: &mut Budget) {
        let (x, y, pair) = (self.x, self.y, self.pair);
        let local_x = local_relation(tier_index(x, tier), internal);
        let local_y = local_relation(tier_index(y, tier), internal);
        let tier_rev = match tier {
            Tier::Core => &pair.core_rev,
            Tier::Oob => &pair.oob_rev,
        };

        for (tx, &tx_id) in tier_ids(x, tier).iter().enumerate() {
            let partners = local_x.related(tx);
            let remote = tier_rev.related(tx);
            if !budget.admit(partners.len() * remote.len()) {
                continue;
            }
            for &ax in partners {
                let access_y = pair.access_rev.related(ax);
                let found = remote.iter().find_map(|&ty| {
                    access_y
                        .iter()
                        .find(|&&ay| local_y.contains(ty, ay))
                        .map(|&ay| (ty, ay))
                });
                if let Some((ty, ay)) = found {
                    run.mark_all(
                        &[tx_id, x.ids.access[ax], tier_ids(y, tier)[ty], y.ids.access[ay]],
                        self.label,
                    );
                }
            }
        }
    }

    /// Several core rules of `x` jointly cover a multi-port access rule of
    /// `x`. Every one of them has a return path among `y`'s cores, the access
    /// rule has one among `y`'s access rules, and those `y` cores jointly
    /// cover that return path.
    fn joint_core_cover(&self, run: &mut Run<'_>, budget: &mut Budget) {
        let (x, y, pair) = (self.x, self.y, self.pair);
        for (ax, &access) in x.rules.access.iter().enumerate() {
            if !budget.admit(x.rules.core.len()) {
                continue;
            }
            let Some(used_x) = core_joint_cover(x, access) else {
                continue;
            };
            let mut pool = BTreeSet::new();
            for &cx in &used_x {
                let remote = pair.core_rev.related(cx);
                if remote.is_empty() {
                    pool.clear();
                    break;
                }
                pool.extend(remote.iter().copied());
            }
            if pool.is_empty() {
                continue;
            }
            let found = pair.access_rev.related(ax).iter().find_map(|&ay| {
                cores_jointly_covering(y, pool.iter().copied(), y.rules.access[ay]).map(|used_y| (ay, used_y))
            });
            let Some((ay, used_y)) = found else {
                continue;
            };
            for cx in used_x {
                run.mark(x.ids.core[cx], self.label);
            }
            for cy in used_y {
                run.mark(y.ids.core[cy], self.label);
            }
            run.mark_all(&[x.ids.access[ax], y.ids.access[ay]], self.label);
        }
    }

    /// Core rule from the local space to a special destination covers an
    /// access rule that has a return path on `y`.
    fn platform_special_destination(&self, run: &mut Run<'_>, budget: &mut Budget) {
        let x = self.x;
        for (cx, &core) in x.rules.core.iter().enumerate() {
            let covered = x.index.core.covers.related(cx);
            if !budget.admit(covered.len()) {
                continue;
            }
            if !core.source().within_any(x.space) || !run.is_special(core.destination()) {
                continue;
            }
            for &ax in covered {
                if let Some(remote) = self.mirror_access(ax) {
                    run.mark_all(&[x.ids.core[cx], x.ids.access[ax], remote], self.label);
                }
            }
        }
    }

    /// An `ip` access rule covers a protocol-specific core rule from the
    /// local space to a special destination.
    fn access_ip_covers_core(&self, run: &mut Run<'_>, budget: &mut Budget) {
        let x = self.x;
        for (ax, &access) in x.rules.access.iter().enumerate() {
            let covered = x.index.core.access_covers.related(ax);
            if !budget.admit(covered.len()) {
                continue;
            }
            if !access.protocol().is_ip() {
                continue;
            }
            let Some(remote) = self.mirror_access(ax) else {
                continue;
            };
            for &cx in covered {
                let core = x.rules.core[cx];
                if !core.protocol().is_ip()
                    && core.source().within_any(x.space)
                    && run.is_special(core.destination())
                {
                    run.mark_all(&[x.ids.core[cx], x.ids.access[ax], remote], self.label);
                }
            }
        }
    }

    /// Core of `x` covers its access rule; an access rule of `y` is the
    /// return path of that access rule and covers its mirror image; the core
    /// rule has a return path among `y`'s cores.
    fn reverse_cover(&self, run: &mut Run<'_>, budget: &mut Budget) {
        let (x, y, pair) = (self.x, self.y, self.pair);
        for (cx, &cx_id) in x.ids.core.iter().enumerate() {
            let covered = x.index.core.covers.related(cx);
            if !budget.admit(covered.len()) {
                continue;
            }
            let Some(&cy) = pair.core_rev.related(cx).first() else {
                continue;
            };
            for &ax in covered {
                let access = x.rules.access[ax];
                let found = pair
                    .access_rev
                    .related(ax)
                    .iter()
                    .copied()
                    .find(|&ay| covers_mirror(y.rules.access[ay], access));
                if let Some(ay) = found {
                    run.mark_all(
                        &[cx_id, x.ids.access[ax], y.ids.access[ay], y.ids.core[cy]],
                        self.label,
                    );
                }
            }
        }
    }

    /// Access rule covers a core rule whose destination is special.
    fn special_destination_access_cover(&self, run: &mut Run<'_>, budget: &mut Budget) {
        let x = self.x;
        for (cx, &core) in x.rules.core.iter().enumerate() {
            let coverers = x.index.core.covered_by.related(cx);
            if !budget.admit(coverers.len()) {
                continue;
            }
            if !run.is_special(core.destination()) {
                continue;
            }
            for &ax in coverers {
                if let Some(remote) = self.mirror_access(ax) {
                    run.mark_all(&[x.ids.core[cx], x.ids.access[ax], remote], self.label);
                }
            }
        }
    }

    /// Out-of-band of `x` covers its access rule and relates to a core rule
    /// of `y` that covers the access rule of `y` mirroring `x`'s.
    fn oob_containment(&self, run: &mut Run<'_>, budget: &mut Budget) {
        let (x, y, pair) = (self.x, self.y, self.pair);
        for (ox, &ox_id) in x.ids.oob.iter().enumerate() {
            let covered = x.index.oob.covers.related(ox);
            let cores = pair.oob_core.related(ox);
            if !budget.admit(covered.len() * cores.len()) {
                continue;
            }
            for &ax in covered {
                let access_y = pair.access_rev.related(ax);
                let found = cores.iter().find_map(|&cy| {
                    access_y
                        .iter()
                        .find(|&&ay| y.index.core.covers.contains(cy, ay))
                        .map(|&ay| (cy, ay))
                });
                if let Some((cy, ay)) = found {
                    run.mark_all(
                        &[ox_id, x.ids.access[ax], y.ids.core[cy], y.ids.access[ay]],
                        self.label,
                    );
                }
            }
        }
    }
}

/// Core rules of `x` whose ports together cover `access`.
fn core_joint_cover(x: &Site<'_>, access: &Rule) -> Option<Vec<usize>> {
    cores_jointly_covering(x, 0..x.rules.core.len(), access)
}

/// Like [`core_joint_cover`], drawing only from the cores in `pool`.
fn cores_jointly_covering(
    x: &Site<'_>,
    pool: impl IntoIterator<Item = usize>,
    access: &Rule,
) -> Option<Vec<usize>> {
    let candidates: Vec<usize> = pool
        .into_iter()
        .filter(|&c| contributes_to(x.rules.core[c], access))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let rules: Vec<&Rule> = candidates.iter().map(|&c| x.rules.core[c]).collect();
    let used = joint_cover(&rules, access)?;
    Some(used.into_iter().map(|i| candidates[i]).collect())
}

// -- Single-site passes -----------------------------------------------------

/// Access rule from the local space to outside every site, covered by a
/// core rule of the same site (alone or jointly).
fn platform_external_exposure(x: &Site<'_>, label: ClassificationLabel, run: &mut Run<'_>, budget: &mut Budget) {
    for (ax, &access) in x.rules.access.iter().enumerate() {
        if !budget.admit(x.rules.core.len()) {
            continue;
        }
        if !access.source().within_any(x.space) || !run.is_external(access.destination()) {
            continue;
        }
        let coverers: Vec<usize> = match x.index.core.access_covered_by.related(ax).first() {
            Some(&cx) => vec![cx],
            None => match core_joint_cover(x, access) {
                Some(used) => used,
                None => continue,
            },
        };
        for cx in coverers {
            run.mark(x.ids.core[cx], label);
        }
        run.mark(x.ids.access[ax], label);
    }
}

/// Core rule from the local space to a special destination covering an
/// access rule, with no cross-site counterpart required.
fn special_destination_rule(x: &Site<'_>, label: ClassificationLabel, run: &mut Run<'_>, budget: &mut Budget) {
    for (cx, &core) in x.rules.core.iter().enumerate() {
        let covered = x.index.core.covers.related(cx);
        if !budget.admit(covered.len()) {
            continue;
        }
        if !core.source().within_any(x.space) || !run.is_special(core.destination()) {
            continue;
        }
        for &ax in covered {
            run.mark_all(&[x.ids.core[cx], x.ids.access[ax]], label);
        }
    }
}

fn special_access(
    x: &Site<'_>,
    label: ClassificationLabel,
    run: &mut Run<'_>,
    budget: &mut Budget,
    matches: impl Fn(&Run<'_>, &Rule) -> bool,
) {
    for (ax, &access) in x.rules.access.iter().enumerate() {
        if !budget.admit(1) {
            continue;
        }
        if matches(run, access) {
            run.mark(x.ids.access[ax], label);
        }
    }
}
