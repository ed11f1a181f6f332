//! End-to-end resolution against the built-in Endfield recipe table.

use endfield_calculator::calculator::{self, summarize};
use endfield_calculator::{Catalog, Demand, EdgeMeta, NodeDemand, RateUnit, ResolveOptions, ResolvedNode, resolve};

fn builtin() -> Catalog {
    Catalog::builtin().expect("built-in recipes are valid")
}

fn per_minute() -> ResolveOptions {
    ResolveOptions {
        unit: RateUnit::PerMinute,
    }
}

fn child<'a>(node: &'a ResolvedNode, item: &str) -> &'a ResolvedNode {
    node.children
        .iter()
        .find(|c| c.item_id == item)
        .unwrap_or_else(|| panic!("{} has no child {}", node.item_id, item))
}

#[test]
fn battery_line_at_one_machine() {
    let catalog = builtin();
    let demand = Demand::one_machine(&catalog, "lc_wuling_battery", RateUnit::PerMinute);
    assert_eq!(demand, Demand::Rate(6.0));

    let resolution = resolve(&catalog, "lc_wuling_battery", demand, &per_minute()).unwrap();
    let root = &resolution.root;
    assert_eq!(root.name, "LC Wuling Battery");
    assert_eq!(root.machine_count(), 1);
    assert_eq!(root.machine_name(), Some("Forge of the Sky"));

    let xiranite = child(root, "xiranite");
    assert_eq!(xiranite.demand_value(), 30.0);
    assert_eq!(xiranite.machine_count(), 1);

    let carbon_chain = child(child(child(xiranite, "stabilized_carbon"), "dense_carbon_powder"), "carbon_powder");
    // Two powder per cycle halves the carbon draw
    assert_eq!(carbon_chain.demand_value(), 120.0);
    assert_eq!(carbon_chain.machine_count(), 2);
    assert_eq!(child(carbon_chain, "carbon").demand_value(), 60.0);

    let originium = child(child(root, "dense_originium_powder"), "originium_powder");
    assert_eq!(originium.demand_value(), 180.0);
    assert_eq!(originium.machine_count(), 6);
    assert_eq!(child(originium, "originium_ore").edge, Some(EdgeMeta::Rate { rate: 180.0 }));
}

#[test]
fn battery_raw_materials_aggregate() {
    let catalog = builtin();
    let resolution = resolve(&catalog, "lc_wuling_battery", Demand::Rate(6.0), &per_minute()).unwrap();
    let resources = resolution.resources.as_ref().unwrap();

    assert_eq!(resources.len(), 4);
    assert_eq!(resources.get("Buckflower"), Some(60.0));
    assert_eq!(resources.get("Clean Water"), Some(30.0));
    assert_eq!(resources.get("Originium Ore"), Some(180.0));
    // Reached through both dense powders: 60 + 90
    assert_eq!(resources.get("Sandleaf"), Some(150.0));

    let summary = summarize(&resolution);
    let machines: Vec<_> = summary
        .machine_counts
        .iter()
        .map(|(name, count)| (name.as_str(), *count))
        .collect();
    assert_eq!(
        machines,
        [
            ("Forge of the Sky", 2),
            ("Grinding Unit", 11),
            ("Refining Unit", 4),
            ("Shredding Unit", 7)
        ]
    );
}

#[test]
fn sandleaf_powder_appears_twice_with_own_demand() {
    let catalog = builtin();
    let resolution = resolve(&catalog, "lc_wuling_battery", Demand::Rate(6.0), &per_minute()).unwrap();

    let powders: Vec<_> = resolution
        .root
        .walk()
        .filter(|n| n.item_id == "sandleaf_powder")
        .map(|n| (n.demand_value(), n.machine_count()))
        .collect();
    assert_eq!(powders, [(60.0, 2), (90.0, 3)]);
}

#[test]
fn battery_quantity_mode() {
    let catalog = builtin();
    let resolution = resolve(&catalog, "lc_wuling_battery", Demand::Quantity(25.0), &per_minute()).unwrap();
    assert_eq!(resolution.window, Some(10.0));

    let root = &resolution.root;
    assert_eq!(root.machine_count(), 25);
    assert!(matches!(
        root.demand,
        NodeDemand::Quantity { produced, excess, .. } if produced == 25.0 && excess == 0.0
    ));

    let xiranite = child(root, "xiranite");
    assert_eq!(xiranite.demand_value(), 125.0);
    assert_eq!(xiranite.machine_count(), 25);

    let water = child(xiranite, "clean_water");
    assert!(water.is_raw());
    assert_eq!(water.demand_value(), 125.0);
    assert_eq!(
        water.edge,
        Some(EdgeMeta::Cycle {
            parent_cycle_time: 2.0,
            qty_per_cycle: 1.0
        })
    );
}

#[test]
fn unknown_item_resolves_to_named_leaf() {
    let catalog = builtin();
    let resolution = resolve(&catalog, "raw_ferrite_chunk", Demand::Rate(10.0), &per_minute()).unwrap();
    assert_eq!(resolution.root.name, "Raw Ferrite Chunk");
    assert!(resolution.root.children.is_empty());
    assert_eq!(resolution.resources.unwrap().get("Raw Ferrite Chunk"), Some(10.0));
}

#[test]
fn resolution_serializes_for_presentation() {
    let catalog = builtin();
    let resolution = resolve(&catalog, "xiranite", Demand::Rate(30.0), &per_minute()).unwrap();
    let json = serde_json::to_value(&resolution).unwrap();

    assert_eq!(json["root"]["name"], "Xiranite");
    assert_eq!(json["root"]["demand"]["mode"], "rate");
    assert_eq!(json["root"]["production"]["machines"], 1);
    assert_eq!(json["root"]["children"][1]["edge"]["rate"], 30.0);
    assert_eq!(json["resources"]["Clean Water"], 30.0);
}

#[test]
fn verbose_tree_renders_every_node() {
    let catalog = builtin();
    let resolution = resolve(&catalog, "stabilized_carbon", Demand::Rate(30.0), &per_minute()).unwrap();
    let text = calculator::format_production_chain(&resolution.root, RateUnit::PerMinute, 0);
    assert_eq!(text.lines().count(), resolution.root.walk().count());
    assert!(text.starts_with("1x Refining Unit -> Stabilized Carbon @ 30.0/min"));
    assert!(text.contains("Buckflower @ 30.0/min (raw input)"));
}
