//! Recipe catalog: validated, immutable item → recipe lookup

use std::collections::HashMap;

use crate::models::{Recipe, RecipeInput, RecipeSpec};

const BUILTIN_RECIPES: &str = include_str!("../data/recipes.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A numeric field that must be strictly positive was not.
    #[error("invalid recipe '{item}': {field} must be a positive number, got {value}")]
    InvalidRecipe {
        item: String,
        field: &'static str,
        value: f64,
    },

    /// An input entry with an empty item reference.
    #[error("invalid recipe '{item}': input #{position} has no item id")]
    EmptyInput { item: String, position: usize },

    #[error("failed to parse recipe table: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Turn an item identifier into a display name ("raw_ferrite_chunk" → "Raw Ferrite Chunk")
pub fn title_case(id: &str) -> String {
    id.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn positive(item: &str, field: &'static str, value: Option<f64>) -> Result<f64, CatalogError> {
    match value {
        None => Ok(1.0),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(CatalogError::InvalidRecipe {
            item: item.to_string(),
            field,
            value: v,
        }),
    }
}

impl Recipe {
    /// Validate a spec, applying the defaults for absent fields
    pub fn from_spec(id: &str, spec: &RecipeSpec) -> Result<Recipe, CatalogError> {
        let output_count = positive(id, "outputCount", spec.output_count)?;
        let time = positive(id, "time", spec.time)?;

        let mut inputs = Vec::new();
        for (position, input) in spec.inputs.iter().flatten().enumerate() {
            if input.item.is_empty() {
                return Err(CatalogError::EmptyInput {
                    item: id.to_string(),
                    position,
                });
            }
            let count = positive(id, "input count", Some(input.count))?;
            inputs.push(RecipeInput {
                item_id: input.item.clone(),
                count,
            });
        }

        Ok(Recipe {
            id: id.to_string(),
            name: spec.name.clone().unwrap_or_else(|| title_case(id)),
            output_count,
            time,
            machine: spec.machine.clone(),
            inputs,
        })
    }
}

/// Immutable mapping from item id to recipe
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    recipes: HashMap<String, Recipe>,
}

impl Catalog {
    /// Build a catalog, rejecting the first invalid recipe encountered
    pub fn from_specs<I, K>(specs: I) -> Result<Catalog, CatalogError>
    where
        I: IntoIterator<Item = (K, RecipeSpec)>,
        K: Into<String>,
    {
        let mut recipes = HashMap::new();
        for (id, spec) in specs {
            let id = id.into();
            let recipe = Recipe::from_spec(&id, &spec)?;
            recipes.insert(id, recipe);
        }
        Ok(Catalog { recipes })
    }

    /// Parse a JSON object of `{ item_id: recipe }`
    pub fn from_json(json: &str) -> Result<Catalog, CatalogError> {
        let specs: HashMap<String, RecipeSpec> = serde_json::from_str(json)?;
        Catalog::from_specs(specs)
    }

    /// The recipe table shipped with the calculator
    pub fn builtin() -> Result<Catalog, CatalogError> {
        Catalog::from_json(BUILTIN_RECIPES)
    }

    pub fn builtin_specs() -> Result<HashMap<String, RecipeSpec>, CatalogError> {
        Ok(serde_json::from_str(BUILTIN_RECIPES)?)
    }

    pub fn lookup(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.recipes.contains_key(id)
    }

    /// Explicit name if the catalog has one, otherwise the title-cased id
    pub fn display_name(&self, id: &str) -> String {
        match self.lookup(id) {
            Some(recipe) => recipe.name.clone(),
            None => title_case(id),
        }
    }

    /// Missing entries count as raw materials too.
    pub fn is_raw(&self, id: &str) -> bool {
        self.lookup(id).is_none_or(Recipe::is_raw)
    }

    /// Items that can be crafted, ordered by display name
    pub fn producible(&self) -> Vec<&Recipe> {
        let mut items: Vec<_> = self.iter().filter(|r| !r.is_raw()).collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        items
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }
}
