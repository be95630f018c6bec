use std::collections::VecDeque;

use crate::predicate::{covers, reverse_matches};
use crate::{
    AclBlock, AmbiguousGroupingWarning, GroupReport, Parser, Rule, RuleGroup, ServiceWarning,
};

/// Knobs for [`group_rules`] and [`group_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingOptions {
    /// Link request/response pairs (rules that reverse-match each other)
    /// into the same group.
    pub link_mirrors: bool,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self { link_mirrors: true }
    }
}

/// Parse and group the candidate lines of one extracted block.
///
/// Lines that fail to parse are counted in [`GroupReport::skipped`].
pub fn group_block(block: &AclBlock, parser: &Parser, options: &GroupingOptions) -> GroupReport {
    let mut rules = Vec::with_capacity(block.lines.len());
    let mut skipped = 0;
    for (row, text) in &block.lines {
        match parser.parse(text) {
            Ok(rule) => rules.push((*row, rule)),
            Err(err) => {
                tracing::trace!(block = %block.name, row, %err, "skipping unparsable line");
                skipped += 1;
            }
        }
    }
    build(Some(block.name.clone()), &rules, options, skipped)
}

/// Group already-parsed `(row, rule)` pairs by the `covers` relation.
///
/// Each group has exactly one keep rule: the lowest-row rule that nothing
/// else in the group covers. Rules that take part in no relation are not
/// reported. Fewer than two rules yield an empty report.
pub fn group_rules(rules: &[(u32, Rule)], options: &GroupingOptions) -> GroupReport {
    build(None, rules, options, 0)
}

fn build(
    block: Option<String>,
    rules: &[(u32, Rule)],
    options: &GroupingOptions,
    skipped: usize,
) -> GroupReport {
    let service_warnings: Vec<ServiceWarning> = rules
        .iter()
        .filter(|(_, rule)| !rule.unresolved_services().is_empty())
        .map(|(row, rule)| ServiceWarning {
            row: *row,
            names: rule.unresolved_services().to_vec(),
        })
        .collect();
    for warning in &service_warnings {
        tracing::warn!(row = warning.row, names = ?warning.names, "unresolved service names dropped");
    }

    if rules.len() < 2 {
        return GroupReport::new(block, Vec::new(), Vec::new(), service_warnings, skipped);
    }

    let mut sorted: Vec<&(u32, Rule)> = rules.iter().collect();
    sorted.sort_by_key(|(row, _)| *row);
    let graph = CoverGraph::build(&sorted, options);

    let mut warnings = Vec::new();
    for (node, coverers) in graph.coverers.iter().enumerate() {
        if coverers.len() > 1 {
            let warning = AmbiguousGroupingWarning {
                row: sorted[node].0,
                coverers: coverers.iter().map(|&c| sorted[c].0).collect(),
                chosen: sorted[coverers[0]].0,
            };
            tracing::warn!(%warning, "ambiguous grouping");
            warnings.push(warning);
        }
    }

    let mut groups: Vec<RuleGroup> = graph
        .components()
        .into_iter()
        .map(|component| graph.group(&component, &sorted))
        .collect();
    groups.sort_by_key(|g| g.keep);

    tracing::debug!(
        block = block.as_deref().unwrap_or("-"),
        rules = rules.len(),
        groups = groups.len(),
        ambiguous = warnings.len(),
        "grouped block"
    );
    GroupReport::new(block, groups, warnings, service_warnings, skipped)
}

// -- Graph ------------------------------------------------------------------

/// Nodes are indices into the row-sorted rule list.
struct CoverGraph {
    /// `coverers[y]`: every `x != y` with `covers(x, y)`, ascending.
    coverers: Vec<Vec<usize>>,
    /// Undirected adjacency used for grouping, ascending.
    adjacency: Vec<Vec<usize>>,
}

impl CoverGraph {
    fn build(sorted: &[&(u32, Rule)], options: &GroupingOptions) -> Self {
        let n = sorted.len();
        let mut coverers = vec![Vec::new(); n];
        for (x, (_, a)) in sorted.iter().enumerate() {
            for (y, (_, b)) in sorted.iter().enumerate() {
                if x != y && covers(a, b) {
                    coverers[y].push(x);
                }
            }
        }

        // An edge x -> y is kept when y has a single coverer or x is the
        // lowest-row one.
        let justified = |x: usize, y: usize| {
            coverers[y].binary_search(&x).is_ok() && (coverers[y].len() <= 1 || coverers[y][0] == x)
        };

        let mut adjacency = vec![Vec::new(); n];
        for x in 0..n {
            for y in (x + 1)..n {
                let linked = justified(x, y)
                    || justified(y, x)
                    || (options.link_mirrors && reverse_matches(&sorted[x].1, &sorted[y].1));
                if linked {
                    adjacency[x].push(y);
                    adjacency[y].push(x);
                }
            }
        }
        for list in &mut adjacency {
            list.sort_unstable();
        }
        Self {
            coverers,
            adjacency,
        }
    }

    /// Connected components of two or more nodes, found breadth-first in
    /// row order.
    fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.adjacency.len()];
        let mut out = Vec::new();
        for start in 0..self.adjacency.len() {
            if seen[start] || self.adjacency[start].is_empty() {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            seen[start] = true;
            while let Some(node) = queue.pop_front() {
                component.push(node);
                for &next in &self.adjacency[node] {
                    if !seen[next] {
                        seen[next] = true;
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            out.push(component);
        }
        out
    }

    fn group(&self, component: &[usize], sorted: &[&(u32, Rule)]) -> RuleGroup {
        let in_component = |n: &usize| component.binary_search(n).is_ok();
        let keep = component
            .iter()
            .copied()
            .find(|&node| !self.coverers[node].iter().any(in_component))
            .unwrap_or(component[0]);
        RuleGroup {
            keep: sorted[keep].0,
            recyclable: component
                .iter()
                .filter(|&&n| n != keep)
                .map(|&n| sorted[n].0)
                .collect(),
        }
    }
}
