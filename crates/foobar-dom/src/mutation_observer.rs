//! Mutation Observer
//!
//! Filters the document's mutation log down to the records one observer
//! asked for.

use crate::{Document, NodeId};
use std::collections::HashMap;

/// Mutation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Attributes,
    ChildList,
}

/// Mutation record
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

impl MutationRecord {
    pub fn attribute(target: NodeId, name: &str, old_value: Option<String>) -> Self {
        Self {
            mutation_type: MutationType::Attributes,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: Some(name.to_string()),
            old_value,
        }
    }

    pub fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            mutation_type: MutationType::ChildList,
            target,
            added_nodes: added,
            removed_nodes: removed,
            attribute_name: None,
            old_value: None,
        }
    }
}

/// Mutation observer options
#[derive(Debug, Clone, Default)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
    pub attribute_old_value: bool,
    pub attribute_filter: Option<Vec<String>>,
}

impl MutationObserverInit {
    /// Watch only the `class` attribute of the target
    pub fn class_attribute() -> Self {
        Self {
            attributes: true,
            attribute_old_value: true,
            attribute_filter: Some(vec!["class".to_string()]),
            ..Self::default()
        }
    }
}

/// Mutation observer
#[derive(Debug, Default)]
pub struct MutationObserver {
    observations: HashMap<NodeId, MutationObserverInit>,
    pending_records: Vec<MutationRecord>,
}

impl MutationObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a target
    pub fn observe(&mut self, target: NodeId, options: MutationObserverInit) {
        self.observations.insert(target, options);
    }

    /// Stop observing everything and drop queued records
    pub fn disconnect(&mut self) {
        self.observations.clear();
        self.pending_records.clear();
    }

    pub fn is_observing(&self, node: NodeId) -> bool {
        self.observations.contains_key(&node)
    }

    /// Offer a record from the document's log
    pub fn record(&mut self, doc: &Document, mutation: &MutationRecord) {
        let wanted = self.observations.iter().any(|(&target, options)| {
            let matches_target = target == mutation.target
                || (options.subtree && doc.contains(target, mutation.target));
            let matches_type = match mutation.mutation_type {
                MutationType::Attributes => options.attributes,
                MutationType::ChildList => options.child_list,
            };
            let passes_filter = match (&options.attribute_filter, &mutation.attribute_name) {
                (Some(filter), Some(attr)) => filter.contains(attr),
                _ => true,
            };
            matches_target && matches_type && passes_filter
        });

        if wanted {
            let mut mutation = mutation.clone();
            let keep_old = self
                .observations
                .values()
                .any(|o| o.attribute_old_value);
            if !keep_old {
                mutation.old_value = None;
            }
            self.pending_records.push(mutation);
        }
    }

    /// Take pending records
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending_records)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_records.is_empty()
    }
}
