//! Data models for Endfield recipes and resolved production trees

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A recipe as written in a recipe source file or stored in the database.
///
/// Every numeric field is optional here; defaults are applied once, when the
/// spec is turned into a [`Recipe`] at catalog-load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<InputSpec>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub item: String,
    pub count: f64,
}

/// A validated recipe. `output_count` and `time` are always strictly positive.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub output_count: f64,
    pub time: f64, // seconds per cycle
    pub machine: Option<String>,
    pub inputs: Vec<RecipeInput>,
}

impl Recipe {
    /// Raw materials have nothing to expand into.
    pub fn is_raw(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Throughput of a single machine, in items per `unit_seconds`.
    pub fn machine_rate(&self, unit_seconds: f64) -> f64 {
        (unit_seconds / self.time) * self.output_count
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeInput {
    pub item_id: String,
    pub count: f64, // consumed per cycle of the parent recipe
}

/// One occurrence of an item in a resolved production tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNode {
    pub item_id: String,
    pub name: String,
    pub demand: NodeDemand,
    /// Machines running this node's recipe. `None` for raw materials.
    pub production: Option<Production>,
    /// What flows across the edge from this node into its parent.
    pub edge: Option<EdgeMeta>,
    pub children: Vec<ResolvedNode>,
}

impl ResolvedNode {
    pub fn is_raw(&self) -> bool {
        self.production.is_none()
    }

    /// Machine count, 0 for raw materials
    pub fn machine_count(&self) -> u64 {
        self.production.as_ref().map_or(0, |p| p.machines)
    }

    pub fn machine_name(&self) -> Option<&str> {
        self.production.as_ref().and_then(|p| p.machine_name.as_deref())
    }

    /// The number a presentation layer shows for this node: the rate in rate
    /// mode, the needed quantity in absolute mode.
    pub fn demand_value(&self) -> f64 {
        match self.demand {
            NodeDemand::Rate { rate } => rate,
            NodeDemand::Quantity { needed, .. } => needed,
        }
    }

    /// Depth-first iterator over this node and all of its descendants
    pub fn walk(&self) -> impl Iterator<Item = &ResolvedNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NodeDemand {
    /// Sustained throughput reaching this node, in the resolution's rate unit.
    Rate { rate: f64 },
    /// Absolute quantity within the factory time window. Raw materials carry
    /// `produced == needed`, `excess == 0` and no rate.
    Quantity {
        needed: f64,
        produced: f64,
        excess: f64,
        rate: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Production {
    pub machines: u64,
    pub machines_exact: f64,
    pub machine_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EdgeMeta {
    Rate {
        rate: f64,
    },
    Cycle {
        parent_cycle_time: f64,
        qty_per_cycle: f64,
    },
}

/// Aggregated raw-material draw, keyed by display name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResourceTotals(BTreeMap<String, f64>);

impl ResourceTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the running total for `name`, starting from zero.
    pub fn add(&mut self, name: &str, amount: f64) {
        *self.0.entry(name.to_string()).or_default() += amount;
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_deserializes_camel_case_and_missing_fields() {
        let spec: RecipeSpec = serde_json::from_str(
            r#"{ "name": "Xiranite", "outputCount": 2, "time": 4,
                 "inputs": [{ "item": "clean_water", "count": 1 }] }"#,
        )
        .unwrap();
        assert_eq!(spec.output_count, Some(2.0));
        assert_eq!(spec.time, Some(4.0));
        assert_eq!(spec.machine, None);
        assert_eq!(spec.inputs.unwrap()[0].item, "clean_water");

        let bare: RecipeSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(bare, RecipeSpec::default());
    }

    #[test]
    fn totals_sum_repeated_names() {
        let mut totals = ResourceTotals::new();
        totals.add("Sandleaf", 60.0);
        totals.add("Sandleaf", 90.0);
        totals.add("Clean Water", 30.0);
        assert_eq!(totals.get("Sandleaf"), Some(150.0));
        assert_eq!(totals.len(), 2);
        let names: Vec<_> = totals.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Clean Water", "Sandleaf"]);
    }

    #[test]
    fn walk_visits_depth_first_in_child_order() {
        let leaf = |id: &str| ResolvedNode {
            item_id: id.to_string(),
            name: id.to_string(),
            demand: NodeDemand::Rate { rate: 1.0 },
            production: None,
            edge: None,
            children: Vec::new(),
        };
        let mut mid = leaf("mid");
        mid.children = vec![leaf("a"), leaf("b")];
        let mut root = leaf("root");
        root.children = vec![mid, leaf("c")];

        let order: Vec<_> = root.walk().map(|n| n.item_id.as_str()).collect();
        assert_eq!(order, ["root", "mid", "a", "b", "c"]);
    }
}
