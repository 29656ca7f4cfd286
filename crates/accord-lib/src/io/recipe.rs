use crate::pipeline::CompareConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Comparison mode selected by a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecipeMode {
    WindowedMatch,
    RateAgreement,
}

/// One comparison run: which pipeline, at what sample rate, with which
/// parameter overrides. Omitted parameters keep their defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Recipe {
    pub mode: RecipeMode,
    pub fs: f64,
    #[serde(default)]
    pub params: CompareConfig,
}

pub fn read_recipe(path: &Path) -> Result<Recipe> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read recipe {}", path.display()))?;
    let recipe: Recipe =
        toml::from_str(&contents).with_context(|| format!("parsing recipe {}", path.display()))?;
    Ok(recipe)
}
