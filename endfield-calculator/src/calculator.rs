//! Production chain calculator logic

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::models::{EdgeMeta, NodeDemand, Production, Recipe, ResolvedNode, ResourceTotals};

/// Tolerance subtracted before rounding machine counts up in rate mode
pub const RATE_TOLERANCE: f64 = 0.001;

/// Relative distance from a whole machine count treated as division noise in absolute mode
pub const QUANTITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, thiserror::Error)]
pub enum CalcError {
    #[error("demand must be a positive finite number, got {0}")]
    InvalidDemand(f64),

    #[error("recipe cycle at '{item}': {}", .path.join(" -> "))]
    Cycle { item: String, path: Vec<String> },
}

/// Time unit rates are expressed in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    #[value(name = "second")]
    PerSecond,
    #[default]
    #[value(name = "minute")]
    PerMinute,
    #[value(name = "hour")]
    PerHour,
}

impl RateUnit {
    pub fn seconds(self) -> f64 {
        match self {
            RateUnit::PerSecond => 1.0,
            RateUnit::PerMinute => 60.0,
            RateUnit::PerHour => 3600.0,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            RateUnit::PerSecond => "s",
            RateUnit::PerMinute => "min",
            RateUnit::PerHour => "h",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub unit: RateUnit,
}

/// What the root item is asked to supply
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Demand {
    /// Sustained throughput, in items per [`RateUnit`]
    Rate(f64),
    /// Total quantity within one cycle of the root recipe
    Quantity(f64),
}

impl Demand {
    /// Output of exactly one full-speed machine running the root recipe.
    /// Roots without a recipe fall back to one item per second.
    pub fn one_machine(catalog: &Catalog, root: &str, unit: RateUnit) -> Demand {
        let rate = match catalog.lookup(root) {
            Some(recipe) => recipe.machine_rate(unit.seconds()),
            None => unit.seconds(),
        };
        Demand::Rate(rate)
    }

    fn value(self) -> f64 {
        match self {
            Demand::Rate(v) | Demand::Quantity(v) => v,
        }
    }
}

/// Result of resolving a root item
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub root: ResolvedNode,
    pub unit: RateUnit,
    /// Raw-material draw across the whole tree (rate mode only)
    pub resources: Option<ResourceTotals>,
    /// Factory time window in seconds (absolute mode only)
    pub window: Option<f64>,
}

/// Round a machine count up, ignoring overshoot smaller than `tolerance`
pub fn ceil_machines(exact: f64, tolerance: f64) -> u64 {
    (exact - tolerance).ceil().max(0.0) as u64
}

/// Round a machine count up, snapping to a whole count only when `exact` is
/// within `rel_tolerance` of it. Returns the count and whether it snapped.
pub fn snap_ceil_machines(exact: f64, rel_tolerance: f64) -> (u64, bool) {
    let nearest = exact.round();
    if nearest >= 1.0 && (exact - nearest).abs() <= rel_tolerance * nearest {
        (nearest as u64, true)
    } else {
        (exact.ceil().max(0.0) as u64, false)
    }
}

enum Mode<'a> {
    Rate { resources: &'a mut ResourceTotals },
    Quantity { window: f64 },
}

struct Resolver<'a> {
    catalog: &'a Catalog,
    unit_seconds: f64,
    mode: Mode<'a>,
    // Ids of the recipe nodes above the one being expanded
    path: Vec<String>,
}

impl Resolver<'_> {
    fn expand(&mut self, item: &str, demand: f64) -> Result<ResolvedNode, CalcError> {
        if self.path.iter().any(|ancestor| ancestor == item) {
            let mut path = self.path.clone();
            path.push(item.to_string());
            return Err(CalcError::Cycle {
                item: item.to_string(),
                path,
            });
        }

        let catalog = self.catalog;
        let recipe = match catalog.lookup(item) {
            Some(recipe) if !recipe.is_raw() => recipe,
            _ => return Ok(self.raw_node(item, demand)),
        };

        let (node_demand, machines_exact, machines, per_input) = match &self.mode {
            Mode::Rate { .. } => {
                let machines_exact = demand / recipe.machine_rate(self.unit_seconds);
                let machines = ceil_machines(machines_exact, RATE_TOLERANCE);
                let per_input = demand / recipe.output_count;
                (NodeDemand::Rate { rate: demand }, machines_exact, machines, per_input)
            }
            Mode::Quantity { window } => {
                let window = *window;
                let cycles_per_machine = window / recipe.time;
                let items_per_machine = cycles_per_machine * recipe.output_count;
                let machines_exact = demand / items_per_machine;
                let (machines, snapped) = snap_ceil_machines(machines_exact, QUANTITY_TOLERANCE);
                let mut produced = machines as f64 * items_per_machine;
                if snapped {
                    // A fit within float noise counts as exact
                    produced = produced.max(demand);
                }
                let node_demand = NodeDemand::Quantity {
                    needed: demand,
                    produced,
                    excess: (produced - demand).max(0.0),
                    rate: Some(produced / window * self.unit_seconds),
                };
                let cycles_run = machines as f64 * cycles_per_machine;
                (node_demand, machines_exact, machines, cycles_run)
            }
        };

        debug!(
            item,
            demand,
            machines,
            machine = recipe.machine.as_deref().unwrap_or("-"),
            "resolved recipe node"
        );

        self.path.push(item.to_string());
        let children = self.expand_inputs(recipe, per_input);
        self.path.pop();
        let children = children?;

        Ok(ResolvedNode {
            item_id: item.to_string(),
            name: recipe.name.clone(),
            demand: node_demand,
            production: Some(Production {
                machines,
                machines_exact,
                machine_name: recipe.machine.clone(),
            }),
            edge: None,
            children,
        })
    }

    /// `per_input` is the child demand per unit of input `count`: the rate per
    /// output item in rate mode, total cycles run in absolute mode.
    fn expand_inputs(
        &mut self,
        recipe: &Recipe,
        per_input: f64,
    ) -> Result<Vec<ResolvedNode>, CalcError> {
        let mut children = Vec::with_capacity(recipe.inputs.len());
        for input in &recipe.inputs {
            let child_demand = per_input * input.count;
            let mut child = self.expand(&input.item_id, child_demand)?;
            child.edge = Some(match self.mode {
                Mode::Rate { .. } => EdgeMeta::Rate { rate: child_demand },
                Mode::Quantity { .. } => EdgeMeta::Cycle {
                    parent_cycle_time: recipe.time,
                    qty_per_cycle: input.count,
                },
            });
            children.push(child);
        }
        Ok(children)
    }

    fn raw_node(&mut self, item: &str, demand: f64) -> ResolvedNode {
        let name = self.catalog.display_name(item);
        trace!(item, demand, "raw material");

        let node_demand = match &mut self.mode {
            Mode::Rate { resources } => {
                resources.add(&name, demand);
                NodeDemand::Rate { rate: demand }
            }
            Mode::Quantity { .. } => NodeDemand::Quantity {
                needed: demand,
                produced: demand,
                excess: 0.0,
                rate: None,
            },
        };

        ResolvedNode {
            item_id: item.to_string(),
            name,
            demand: node_demand,
            production: None,
            edge: None,
            children: Vec::new(),
        }
    }
}

/// Resolve the production tree for `root` under the given demand.
///
/// Rate mode threads a fresh [`ResourceTotals`] through the expansion. In
/// absolute mode the factory time window is the root recipe's cycle time.
pub fn resolve(
    catalog: &Catalog,
    root: &str,
    demand: Demand,
    options: &ResolveOptions,
) -> Result<Resolution, CalcError> {
    let value = demand.value();
    if !value.is_finite() || value <= 0.0 {
        return Err(CalcError::InvalidDemand(value));
    }

    let unit_seconds = options.unit.seconds();
    match demand {
        Demand::Rate(rate) => {
            let mut resources = ResourceTotals::new();
            let mut resolver = Resolver {
                catalog,
                unit_seconds,
                mode: Mode::Rate {
                    resources: &mut resources,
                },
                path: Vec::new(),
            };
            let root = resolver.expand(root, rate)?;
            Ok(Resolution {
                root,
                unit: options.unit,
                resources: Some(resources),
                window: None,
            })
        }
        Demand::Quantity(amount) => {
            let window = catalog.lookup(root).map_or(1.0, |recipe| recipe.time);
            let mut resolver = Resolver {
                catalog,
                unit_seconds,
                mode: Mode::Quantity { window },
                path: Vec::new(),
            };
            let root = resolver.expand(root, amount)?;
            Ok(Resolution {
                root,
                unit: options.unit,
                resources: None,
                window: Some(window),
            })
        }
    }
}

/// Format a production chain as a readable string
pub fn format_production_chain(node: &ResolvedNode, unit: RateUnit, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    let edge = match node.edge {
        Some(EdgeMeta::Rate { rate }) => format!(" <- {:.1}/{}", rate, unit.suffix()),
        Some(EdgeMeta::Cycle {
            parent_cycle_time,
            qty_per_cycle,
        }) => format!(" <- {} per {}s cycle", qty_per_cycle, parent_cycle_time),
        None => String::new(),
    };

    let demand = match node.demand {
        NodeDemand::Rate { rate } => format!("{:.1}/{}", rate, unit.suffix()),
        NodeDemand::Quantity {
            needed, produced, ..
        } if produced > needed => format!("{:.1} needed, {:.1} produced", needed, produced),
        NodeDemand::Quantity { needed, .. } => format!("{:.1} needed", needed),
    };

    match &node.production {
        Some(production) => output.push_str(&format!(
            "{}{}x {} -> {} @ {}{}\n",
            prefix,
            production.machines,
            production.machine_name.as_deref().unwrap_or("(unknown machine)"),
            node.name,
            demand,
            edge
        )),
        None => output.push_str(&format!("{}{} @ {} (raw input){}\n", prefix, node.name, demand, edge)),
    }

    for child in &node.children {
        output.push_str(&format_production_chain(child, unit, indent + 1));
    }

    output
}

/// Summary of a production chain calculation
#[derive(Debug, Serialize)]
pub struct ChainSummary {
    pub target: String,
    pub demand: f64,
    pub unit: RateUnit,
    pub window: Option<f64>,
    pub machine_counts: Vec<(String, u64)>,
    pub raw_inputs: Vec<(String, f64)>,
}

/// Generate a summary of the production chain
pub fn summarize(resolution: &Resolution) -> ChainSummary {
    let mut machines: BTreeMap<String, u64> = BTreeMap::new();
    let mut raw_inputs: BTreeMap<String, f64> = BTreeMap::new();

    for node in resolution.root.walk() {
        match &node.production {
            Some(production) => {
                let label = production
                    .machine_name
                    .clone()
                    .unwrap_or_else(|| "(unknown machine)".to_string());
                *machines.entry(label).or_default() += production.machines;
            }
            None if resolution.resources.is_none() => {
                *raw_inputs.entry(node.name.clone()).or_default() += node.demand_value();
            }
            None => {}
        }
    }

    let raw_inputs = match &resolution.resources {
        Some(resources) => resources.iter().map(|(name, rate)| (name.to_string(), rate)).collect(),
        None => raw_inputs.into_iter().collect(),
    };

    ChainSummary {
        target: resolution.root.name.clone(),
        demand: resolution.root.demand_value(),
        unit: resolution.unit,
        window: resolution.window,
        machine_counts: machines.into_iter().collect(),
        raw_inputs,
    }
}

impl fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Production Summary ===")?;
        match self.window {
            Some(window) => writeln!(f, "Target: {:.1}x {} within {}s", self.demand, self.target, window)?,
            None => writeln!(f, "Target: {} @ {:.1}/{}", self.target, self.demand, self.unit.suffix())?,
        }
        writeln!(f)?;

        writeln!(f, "Machines required:")?;
        for (name, count) in &self.machine_counts {
            writeln!(f, "  {}x {}", count, name)?;
        }
        writeln!(f)?;

        writeln!(f, "Raw inputs required:")?;
        for (name, amount) in &self.raw_inputs {
            match self.window {
                Some(_) => writeln!(f, "  {} x{:.1}", name, amount)?,
                None => writeln!(f, "  {} @ {:.1}/{}", name, amount, self.unit.suffix())?,
            }
        }

        Ok(())
    }
}
