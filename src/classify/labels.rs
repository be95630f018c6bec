use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ClassificationLabel, RuleId};

/// Labels accumulated across classification passes.
///
/// Monotonic: a rule's label can only be replaced by one that outranks it,
/// and is never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMap {
    labels: BTreeMap<RuleId, ClassificationLabel>,
}

impl LabelMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Label `id` unless it already carries an equal or stronger label.
    /// Returns `true` when the map changed.
    pub fn assign(&mut self, id: &RuleId, label: ClassificationLabel) -> bool {
        match self.labels.get_mut(id) {
            Some(current) if !label.outranks(*current) => false,
            Some(current) => {
                *current = label;
                true
            }
            None => {
                self.labels.insert(id.clone(), label);
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: &RuleId) -> Option<ClassificationLabel> {
        self.labels.get(id).copied()
    }

    /// Whether `id` already holds `label` or something stronger.
    #[must_use]
    pub fn settled(&self, id: &RuleId, label: ClassificationLabel) -> bool {
        self.get(id).is_some_and(|current| !label.outranks(current))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RuleId, ClassificationLabel)> {
        self.labels.iter().map(|(id, label)| (id, *label))
    }
}

impl<'a> IntoIterator for &'a LabelMap {
    type Item = (&'a RuleId, &'a ClassificationLabel);
    type IntoIter = std::collections::btree_map::Iter<'a, RuleId, ClassificationLabel>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}
