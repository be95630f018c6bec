//! Lookup tables built once per classification run.
//!
//! Every pass reads these instead of re-scanning rule pairs. Rules are
//! referred to by their position inside a site's role bucket.

use crate::predicate::{covers, equals, reverse_matches};
use crate::Rule;

/// A binary relation `from -> [to]`, with every target list ascending.
#[derive(Debug, Clone, Default)]
pub(super) struct Relation {
    edges: Vec<Vec<usize>>,
}

impl Relation {
    pub(super) fn build(from: &[&Rule], to: &[&Rule], pred: impl Fn(&Rule, &Rule) -> bool) -> Self {
        let edges = from
            .iter()
            .map(|a| {
                to.iter()
                    .enumerate()
                    .filter(|(_, b)| pred(a, b))
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();
        Self { edges }
    }

    pub(super) fn related(&self, i: usize) -> &[usize] {
        match self.edges.get(i) {
            Some(targets) => targets,
            None => &[],
        }
    }

    pub(super) fn contains(&self, i: usize, j: usize) -> bool {
        self.related(i).binary_search(&j).is_ok()
    }

    /// The inverse relation over a target side of `to_len` elements.
    pub(super) fn transpose(&self, to_len: usize) -> Self {
        let mut edges = vec![Vec::new(); to_len];
        for (i, targets) in self.edges.iter().enumerate() {
            for &j in targets {
                if let Some(list) = edges.get_mut(j) {
                    list.push(i);
                }
            }
        }
        Self { edges }
    }
}

/// Relations between one upper tier (core or out-of-band) and the access
/// tier of the same site.
#[derive(Debug, Clone, Default)]
pub(super) struct TierIndex {
    /// tier -> access, `equals`.
    pub equals: Relation,
    /// tier -> access, tier rule covers access rule.
    pub covers: Relation,
    /// tier -> access, access rule covers tier rule.
    pub covered_by: Relation,
    /// access -> tier, tier rule covers access rule.
    pub access_covered_by: Relation,
    /// access -> tier, access rule covers tier rule.
    pub access_covers: Relation,
}

impl TierIndex {
    fn build(tier: &[&Rule], access: &[&Rule]) -> Self {
        let covers_rel = Relation::build(tier, access, covers);
        let covered_by = Relation::build(tier, access, |t, a| covers(a, t));
        Self {
            equals: Relation::build(tier, access, equals),
            access_covered_by: covers_rel.transpose(access.len()),
            access_covers: covered_by.transpose(access.len()),
            covers: covers_rel,
            covered_by,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct SiteIndex {
    pub core: TierIndex,
    pub oob: TierIndex,
}

impl SiteIndex {
    pub(super) fn build(core: &[&Rule], access: &[&Rule], oob: &[&Rule]) -> Self {
        Self {
            core: TierIndex::build(core, access),
            oob: TierIndex::build(oob, access),
        }
    }
}

/// Cross-site relations for an ordered site pair `(x, y)`.
#[derive(Debug, Clone, Default)]
pub(super) struct PairIndex {
    /// core_x -> core_y, `reverse_matches`.
    pub core_rev: Relation,
    /// access_x -> access_y, `reverse_matches`.
    pub access_rev: Relation,
    /// oob_x -> oob_y, `reverse_matches`.
    pub oob_rev: Relation,
    /// oob_x -> core_y: covers, is covered by, or reverse-matches.
    pub oob_core: Relation,
}

/// Per-role lists of one site, aligned by position.
#[derive(Debug, Clone)]
pub(super) struct Buckets<T> {
    pub core: Vec<T>,
    pub access: Vec<T>,
    pub oob: Vec<T>,
}

impl<T> Default for Buckets<T> {
    fn default() -> Self {
        Self {
            core: Vec::new(),
            access: Vec::new(),
            oob: Vec::new(),
        }
    }
}

impl PairIndex {
    /// Both directions of a site pair. `reverse_matches` is symmetric, so
    /// the backward relations are transposes.
    pub(super) fn build_both(x: &Buckets<&Rule>, y: &Buckets<&Rule>) -> (Self, Self) {
        let core_rev = Relation::build(&x.core, &y.core, reverse_matches);
        let access_rev = Relation::build(&x.access, &y.access, reverse_matches);
        let oob_rev = Relation::build(&x.oob, &y.oob, reverse_matches);
        let relates = |o: &Rule, c: &Rule| covers(o, c) || covers(c, o) || reverse_matches(o, c);

        let backward = Self {
            core_rev: core_rev.transpose(y.core.len()),
            access_rev: access_rev.transpose(y.access.len()),
            oob_rev: oob_rev.transpose(y.oob.len()),
            oob_core: Relation::build(&y.oob, &x.core, relates),
        };
        let forward = Self {
            core_rev,
            access_rev,
            oob_rev,
            oob_core: Relation::build(&x.oob, &y.core, relates),
        };
        (forward, backward)
    }
}
