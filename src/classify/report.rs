use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::labels::LabelMap;
use super::passes::Pass;
use crate::{ClassificationLabel, RuleId};

/// A pass stopped exploring combinations for one site (pair) after hitting
/// the configured ceiling. Labels found before the cut are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinatorialLimitExceeded {
    pub pass: Pass,
    pub site_a: String,
    /// Second site for cross-site passes.
    pub site_b: Option<String>,
    pub limit: usize,
    pub examined: usize,
    pub skipped: usize,
}

impl fmt::Display for CombinatorialLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pass, self.site_a)?;
        if let Some(site_b) = &self.site_b {
            write!(f, " -> {site_b}")?;
        }
        write!(
            f,
            " truncated at {} combinations ({} examined, {} skipped)",
            self.limit, self.examined, self.skipped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassOutcome {
    pub pass: Pass,
    /// Rules whose label was set or upgraded by this pass, propagation
    /// included.
    pub newly_labeled: usize,
}

/// Result of one classification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct ClassificationReport {
    labels: LabelMap,
    pass_outcomes: Vec<PassOutcome>,
    truncations: Vec<CombinatorialLimitExceeded>,
    service_warnings: BTreeMap<RuleId, Vec<String>>,
    skipped: usize,
    #[serde(default)]
    excluded: usize,
}

impl ClassificationReport {
    pub(crate) fn new(
        labels: LabelMap,
        pass_outcomes: Vec<PassOutcome>,
        truncations: Vec<CombinatorialLimitExceeded>,
        service_warnings: BTreeMap<RuleId, Vec<String>>,
        skipped: usize,
    ) -> Self {
        Self {
            labels,
            pass_outcomes,
            truncations,
            service_warnings,
            skipped,
            excluded: 0,
        }
    }

    pub(crate) fn with_excluded(mut self, excluded: usize) -> Self {
        self.excluded = excluded;
        self
    }

    #[must_use]
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Hand the label map back, e.g. to classify again on top of it.
    #[must_use]
    pub fn into_labels(self) -> LabelMap {
        self.labels
    }

    #[must_use]
    pub fn label(&self, id: &RuleId) -> Option<ClassificationLabel> {
        self.labels.get(id)
    }

    /// One entry per pass, in execution order.
    #[must_use]
    pub fn pass_outcomes(&self) -> &[PassOutcome] {
        &self.pass_outcomes
    }

    #[must_use]
    pub fn truncations(&self) -> &[CombinatorialLimitExceeded] {
        &self.truncations
    }

    /// Service names dropped while parsing, by rule.
    #[must_use]
    pub fn service_warnings(&self) -> &BTreeMap<RuleId, Vec<String>> {
        &self.service_warnings
    }

    /// Lines that did not parse as ACL rules.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Core and out-of-band rules left out as local noise.
    #[must_use]
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    #[must_use]
    pub fn count(&self, label: ClassificationLabel) -> usize {
        self.labels.iter().filter(|(_, l)| *l == label).count()
    }

    /// `row -> label` for one device column.
    #[must_use]
    pub fn labels_for_column(&self, site: &str, column: u32) -> BTreeMap<u32, ClassificationLabel> {
        self.labels
            .iter()
            .filter(|(id, _)| id.site == site && id.column == column)
            .map(|(id, label)| (id.row, label))
            .collect()
    }

    /// `row -> label` per `(site, column)`.
    #[must_use]
    pub fn labels_by_row(&self) -> BTreeMap<(String, u32), BTreeMap<u32, ClassificationLabel>> {
        let mut out: BTreeMap<(String, u32), BTreeMap<u32, ClassificationLabel>> = BTreeMap::new();
        for (id, label) in self.labels.iter() {
            out.entry((id.site.clone(), id.column))
                .or_default()
                .insert(id.row, label);
        }
        out
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "labeled: {}", self.labels.len())?;
        for label in ClassificationLabel::ALL {
            let n = self.count(label);
            if n > 0 {
                write!(f, ", {label}: {n}")?;
            }
        }
        if !self.truncations.is_empty() {
            write!(f, ", truncated: {}", self.truncations.len())?;
        }
        if self.skipped > 0 {
            write!(f, ", skipped: {}", self.skipped)?;
        }
        if self.excluded > 0 {
            write!(f, ", excluded: {}", self.excluded)?;
        }
        Ok(())
    }
}
