//! Endfield Production Calculator
//!
//! A production chain calculator for Arknights: Endfield factories.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use endfield_calculator::calculator::{self, Demand, RateUnit, ResolveOptions};
use endfield_calculator::catalog::Catalog;
use endfield_calculator::{db, extract};

#[derive(Parser)]
#[command(name = "endfield-calculator")]
#[command(about = "Production chain calculator for Arknights: Endfield")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "endfield_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract recipe tables from a directory of .js/.json sources
    Extract {
        /// Directory to scan
        source_dir: PathBuf,

        /// Clear existing recipes before extraction
        #[arg(long)]
        clear: bool,
    },

    /// Calculate the production chain for an item
    Calc {
        /// Item id to produce (e.g., "lc_wuling_battery")
        item: String,

        /// Target output rate; defaults to one machine of the item's recipe
        #[arg(short, long, conflicts_with = "quantity")]
        rate: Option<f64>,

        /// Absolute quantity to produce within one cycle of the item's recipe
        #[arg(short, long)]
        quantity: Option<f64>,

        /// Time unit for rates
        #[arg(long, value_enum, default_value_t = RateUnit::PerMinute)]
        per: RateUnit,

        /// Show detailed production tree
        #[arg(short, long)]
        verbose: bool,

        /// Print the resolved tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// List craftable items, sorted by name
    ListItems,

    /// Show the recipe for a specific item
    Item {
        /// Item id
        id: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load the built-in recipe table
    LoadSample,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Extract { source_dir, clear } => {
            if clear {
                println!("Clearing existing recipes...");
                db::clear_recipes(&conn)?;
            }

            let stats = extract::extract_to_database(&mut conn, &source_dir)?;
            println!("{}", stats);
        }

        Commands::Calc {
            item,
            rate,
            quantity,
            per,
            verbose,
            json,
        } => {
            let catalog = load_catalog(&conn)?;
            if !catalog.contains(&item) {
                warn!(item = %item, "item not in recipe table, treating it as a raw material");
            }

            let demand = match (rate, quantity) {
                (_, Some(quantity)) => Demand::Quantity(quantity),
                (Some(rate), None) => Demand::Rate(rate),
                (None, None) => Demand::one_machine(&catalog, &item, per),
            };
            let resolution = calculator::resolve(&catalog, &item, demand, &ResolveOptions { unit: per })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&resolution)?);
                return Ok(());
            }

            if verbose {
                println!("Production chain:\n");
                println!("{}", calculator::format_production_chain(&resolution.root, per, 0));
            }

            println!("{}", calculator::summarize(&resolution));
        }

        Commands::ListItems => {
            let catalog = load_catalog(&conn)?;
            let items = catalog.producible();
            if items.is_empty() {
                println!("No craftable items in database. Run 'extract' or 'load-sample' first.");
            } else {
                println!("{:<30} {:<28} {:>8}", "Item", "Id", "Time (s)");
                println!("{}", "-".repeat(68));
                for recipe in items {
                    println!("{:<30} {:<28} {:>8}", recipe.name, recipe.id, recipe.time);
                }
            }
        }

        Commands::Item { id } => match db::get_recipe(&conn, &id)? {
            Some(spec) => {
                let catalog = load_catalog(&conn)?;
                println!("Item: {}", catalog.display_name(&id));
                println!("  ID: {}", id);
                if let Some(recipe) = catalog.lookup(&id) {
                    println!("  Machine: {}", recipe.machine.as_deref().unwrap_or("-"));
                    println!("  Cycle: {}s, {} per cycle", recipe.time, recipe.output_count);
                }

                let inputs = spec.inputs.unwrap_or_default();
                if inputs.is_empty() {
                    println!("  Raw material");
                } else {
                    println!("  Inputs:");
                    for input in inputs {
                        println!("    {} x{}", catalog.display_name(&input.item), input.count);
                    }
                }

                let consumers = db::get_consumers(&conn, &id)?;
                if !consumers.is_empty() {
                    println!("  Used by:");
                    for (consumer, count) in consumers {
                        println!("    {} (x{} per cycle)", catalog.display_name(&consumer), count);
                    }
                }
            }
            None => println!("Item '{}' not found", id),
        },

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let specs = Catalog::builtin_specs()?;
            db::clear_recipes(&conn)?;
            let written = db::upsert_recipes(&mut conn, specs.iter().map(|(id, spec)| (id.as_str(), spec)))?;
            println!("Loaded {} sample recipes", written);
        }
    }

    Ok(())
}

fn load_catalog(conn: &Connection) -> Result<Catalog> {
    if db::count_items(conn)? == 0 {
        bail!("No recipes in database. Run 'extract' or 'load-sample' first.");
    }
    db::load_catalog(conn)
}
