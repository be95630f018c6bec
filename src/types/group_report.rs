use std::fmt;

use serde::{Deserialize, Serialize};

/// One connected component of mutually redundant rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    /// Row of the rule to keep.
    pub keep: u32,
    /// Rows that are redundant with `keep`, ascending.
    pub recyclable: Vec<u32>,
}

impl RuleGroup {
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.recyclable.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// All rows of the group, keep first.
    pub fn rows(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::once(self.keep).chain(self.recyclable.iter().copied())
    }
}

/// A rule was covered by more than one other rule; it was attached to the
/// lowest-row coverer only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousGroupingWarning {
    pub row: u32,
    pub coverers: Vec<u32>,
    pub chosen: u32,
}

impl fmt::Display for AmbiguousGroupingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self.coverers.iter().map(u32::to_string).collect();
        write!(
            f,
            "row {} is covered by rows [{}]; grouped with row {}",
            self.row,
            rows.join(", "),
            self.chosen
        )
    }
}

/// Service names that were dropped while parsing one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceWarning {
    pub row: u32,
    pub names: Vec<String>,
}

/// Redundancy grouping result for one ACL block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct GroupReport {
    block: Option<String>,
    groups: Vec<RuleGroup>,
    warnings: Vec<AmbiguousGroupingWarning>,
    service_warnings: Vec<ServiceWarning>,
    skipped: usize,
}

impl GroupReport {
    pub(crate) fn new(
        block: Option<String>,
        groups: Vec<RuleGroup>,
        warnings: Vec<AmbiguousGroupingWarning>,
        service_warnings: Vec<ServiceWarning>,
        skipped: usize,
    ) -> Self {
        Self {
            block,
            groups,
            warnings,
            service_warnings,
            skipped,
        }
    }

    /// Name of the ACL block, when grouped from an extracted block.
    #[must_use]
    pub fn block(&self) -> Option<&str> {
        self.block.as_deref()
    }

    /// Components ordered by keep row.
    #[must_use]
    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Equal to [`group_count`](Self::group_count): one keep per component.
    #[must_use]
    pub fn keep_count(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn recycle_count(&self) -> usize {
        self.groups.iter().map(|g| g.recyclable.len()).sum()
    }

    #[must_use]
    pub fn rules_in_groups(&self) -> usize {
        self.groups.iter().map(RuleGroup::len).sum()
    }

    #[must_use]
    pub fn keep_rows(&self) -> Vec<u32> {
        self.groups.iter().map(|g| g.keep).collect()
    }

    /// All recyclable rows, ascending.
    #[must_use]
    pub fn recycle_rows(&self) -> Vec<u32> {
        let mut rows: Vec<u32> = self
            .groups
            .iter()
            .flat_map(|g| g.recyclable.iter().copied())
            .collect();
        rows.sort_unstable();
        rows
    }

    #[must_use]
    pub fn warnings(&self) -> &[AmbiguousGroupingWarning] {
        &self.warnings
    }

    #[must_use]
    pub fn service_warnings(&self) -> &[ServiceWarning] {
        &self.service_warnings
    }

    /// Lines of the block that failed to parse.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl fmt::Display for GroupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.block {
            write!(f, "{name}: ")?;
        }
        write!(
            f,
            "groups: {}, keep: {}, recycle: {}, in groups: {}",
            self.group_count(),
            self.keep_count(),
            self.recycle_count(),
            self.rules_in_groups()
        )?;
        if !self.warnings.is_empty() {
            write!(f, ", ambiguous: {}", self.warnings.len())?;
        }
        if self.skipped > 0 {
            write!(f, ", skipped: {}", self.skipped)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> GroupReport {
        GroupReport::new(
            Some("WEB-IN".into()),
            vec![
                RuleGroup {
                    keep: 3,
                    recyclable: vec![7, 4],
                },
                RuleGroup {
                    keep: 10,
                    recyclable: vec![12],
                },
            ],
            vec![AmbiguousGroupingWarning {
                row: 12,
                coverers: vec![10, 11],
                chosen: 10,
            }],
            Vec::new(),
            2,
        )
    }

    #[test]
    fn report_counts() {
        let r = report();
        assert_eq!(r.group_count(), 2);
        assert_eq!(r.keep_count(), 2);
        assert_eq!(r.recycle_count(), 3);
        assert_eq!(r.rules_in_groups(), 5);
        assert_eq!(r.keep_rows(), vec![3, 10]);
        assert_eq!(r.recycle_rows(), vec![4, 7, 12]);
        assert_eq!(r.skipped(), 2);
    }

    #[test]
    fn report_display() {
        let s = report().to_string();
        assert!(s.starts_with("WEB-IN: groups: 2"));
        assert!(s.contains("ambiguous: 1"));
        assert!(s.contains("skipped: 2"));
    }

    #[test]
    fn empty_report() {
        let r = GroupReport::default();
        assert_eq!(r.group_count(), 0);
        assert_eq!(r.rules_in_groups(), 0);
        assert_eq!(r.to_string(), "groups: 0, keep: 0, recycle: 0, in groups: 0");
    }

    #[test]
    fn warning_display() {
        let w = AmbiguousGroupingWarning {
            row: 5,
            coverers: vec![1, 2],
            chosen: 1,
        };
        assert_eq!(
            w.to_string(),
            "row 5 is covered by rows [1, 2]; grouped with row 1"
        );
    }

    #[test]
    fn group_rows_keep_first() {
        let g = RuleGroup {
            keep: 2,
            recyclable: vec![5, 9],
        };
        assert_eq!(g.rows().collect::<Vec<_>>(), vec![2, 5, 9]);
        assert_eq!(g.len(), 3);
    }
}
