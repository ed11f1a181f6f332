//! Database schema and operations

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::catalog::Catalog;
use crate::models::{InputSpec, RecipeSpec};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per item; NULL numeric fields take catalog defaults on load
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            name TEXT,
            output_count REAL,
            time REAL,
            machine TEXT
        );

        -- Ordered recipe inputs (empty for raw materials)
        CREATE TABLE IF NOT EXISTS item_inputs (
            item_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            input_id TEXT NOT NULL,
            count REAL NOT NULL,
            PRIMARY KEY (item_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_item_inputs_input ON item_inputs(input_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a recipe and its inputs
pub fn upsert_recipe(conn: &Connection, id: &str, spec: &RecipeSpec) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (id, name, output_count, time, machine)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (id, &spec.name, spec.output_count, spec.time, &spec.machine),
    )?;
    conn.execute("DELETE FROM item_inputs WHERE item_id = ?1", [id])?;

    for (position, input) in spec.inputs.iter().flatten().enumerate() {
        conn.execute(
            "INSERT INTO item_inputs (item_id, position, input_id, count)
             VALUES (?1, ?2, ?3, ?4)",
            (id, position as i64, &input.item, input.count),
        )?;
    }
    Ok(())
}

/// Write many recipes in one transaction
pub fn upsert_recipes<'a, I>(conn: &mut Connection, specs: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, &'a RecipeSpec)>,
{
    let tx: Transaction<'_> = conn.transaction()?;
    let mut written = 0;
    for (id, spec) in specs {
        upsert_recipe(&tx, id, spec).with_context(|| format!("failed to store recipe '{}'", id))?;
        written += 1;
    }
    tx.commit()?;
    Ok(written)
}

/// Clear all recipe data (for re-extraction)
pub fn clear_recipes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM item_inputs;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

pub fn count_items(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Read every stored recipe back as unvalidated specs
pub fn load_specs(conn: &Connection) -> Result<BTreeMap<String, RecipeSpec>> {
    let mut stmt = conn.prepare("SELECT id, name, output_count, time, machine FROM items")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            RecipeSpec {
                name: row.get(1)?,
                output_count: row.get(2)?,
                time: row.get(3)?,
                machine: row.get(4)?,
                inputs: None,
            },
        ))
    })?;

    let mut specs = BTreeMap::new();
    for row in rows {
        let (id, spec) = row?;
        specs.insert(id, spec);
    }

    let mut stmt = conn.prepare(
        "SELECT item_id, input_id, count FROM item_inputs ORDER BY item_id, position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            InputSpec {
                item: row.get(1)?,
                count: row.get(2)?,
            },
        ))
    })?;

    for row in rows {
        let (item_id, input) = row?;
        if let Some(spec) = specs.get_mut(&item_id) {
            spec.inputs.get_or_insert_with(Vec::new).push(input);
        }
    }

    Ok(specs)
}

/// Load and validate the stored recipes into a catalog
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let specs = load_specs(conn)?;
    let catalog = Catalog::from_specs(specs).context("stored recipe table is invalid")?;
    tracing::info!(items = catalog.len(), "loaded recipe catalog");
    Ok(catalog)
}

/// Get a single stored recipe
pub fn get_recipe(conn: &Connection, id: &str) -> Result<Option<RecipeSpec>> {
    let spec = conn
        .query_row(
            "SELECT name, output_count, time, machine FROM items WHERE id = ?1",
            [id],
            |row| {
                Ok(RecipeSpec {
                    name: row.get(0)?,
                    output_count: row.get(1)?,
                    time: row.get(2)?,
                    machine: row.get(3)?,
                    inputs: None,
                })
            },
        )
        .optional()?;

    let Some(mut spec) = spec else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT input_id, count FROM item_inputs WHERE item_id = ?1 ORDER BY position")?;
    let rows = stmt.query_map([id], |row| {
        Ok(InputSpec {
            item: row.get(0)?,
            count: row.get(1)?,
        })
    })?;

    let mut inputs = Vec::new();
    for row in rows {
        inputs.push(row?);
    }
    spec.inputs = Some(inputs);
    Ok(Some(spec))
}

/// Items that consume the given item as an input
pub fn get_consumers(conn: &Connection, input_id: &str) -> Result<Vec<(String, f64)>> {
    let mut stmt = conn.prepare(
        "SELECT item_id, count FROM item_inputs WHERE input_id = ?1 ORDER BY item_id",
    )?;
    let rows = stmt.query_map([input_id], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn spec(inputs: &[(&str, f64)]) -> RecipeSpec {
        RecipeSpec {
            name: Some("Xiranite".to_string()),
            output_count: None,
            time: Some(2.0),
            machine: Some("Forge of the Sky".to_string()),
            inputs: Some(
                inputs
                    .iter()
                    .map(|(item, count)| InputSpec {
                        item: item.to_string(),
                        count: *count,
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn stored_recipe_keeps_input_order_and_nulls() {
        let conn = memory_db();
        upsert_recipe(&conn, "xiranite", &spec(&[("stabilized_carbon", 2.0), ("clean_water", 1.0)]))
            .unwrap();

        let stored = get_recipe(&conn, "xiranite").unwrap().unwrap();
        assert_eq!(stored.output_count, None);
        let inputs = stored.inputs.unwrap();
        assert_eq!(inputs[0].item, "stabilized_carbon");
        assert_eq!(inputs[1].item, "clean_water");
        assert!(get_recipe(&conn, "nothing").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_previous_inputs() {
        let conn = memory_db();
        upsert_recipe(&conn, "xiranite", &spec(&[("a", 1.0), ("b", 1.0)])).unwrap();
        upsert_recipe(&conn, "xiranite", &spec(&[("c", 3.0)])).unwrap();

        let inputs = get_recipe(&conn, "xiranite").unwrap().unwrap().inputs.unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].count, 3.0);
        assert_eq!(count_items(&conn).unwrap(), 1);
    }

    #[test]
    fn builtin_catalog_round_trips_through_database() {
        let mut conn = memory_db();
        let specs = Catalog::builtin_specs().unwrap();
        let written = upsert_recipes(&mut conn, specs.iter().map(|(k, v)| (k.as_str(), v))).unwrap();
        assert_eq!(written, specs.len());

        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog.len(), specs.len());
        let battery = catalog.lookup("lc_wuling_battery").unwrap();
        assert_eq!(battery.inputs[1].item_id, "dense_originium_powder");
        assert_eq!(battery.inputs[1].count, 15.0);
        assert!(catalog.is_raw("sandleaf"));

        let consumers = get_consumers(&conn, "sandleaf_powder").unwrap();
        let names: Vec<_> = consumers.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(names, ["dense_carbon_powder", "dense_originium_powder"]);

        clear_recipes(&conn).unwrap();
        assert_eq!(count_items(&conn).unwrap(), 0);
    }

    #[test]
    fn invalid_stored_recipe_fails_catalog_load() {
        let conn = memory_db();
        let mut bad = spec(&[("a", 1.0)]);
        bad.time = Some(0.0);
        upsert_recipe(&conn, "broken", &bad).unwrap();
        assert!(load_catalog(&conn).is_err());
    }
}
