//! Output formatting for search results.
//!
//! Supports both human-readable terminal output and JSON for scripting.

use std::collections::BTreeMap;
use std::path::Path;

use flagsearch_core::{Identity, ModelSummary, SearchMethod, SearchResult};
use serde::Serialize;

/// Search response shared by `--json` output and the stdio server
#[derive(Debug, Serialize)]
pub struct SearchResponse<'a> {
    pub territory: &'a str,
    pub method: SearchMethod,
    pub k: usize,
    pub results: &'a BTreeMap<String, SearchResult>,
}

/// Formats search results as JSON.
pub fn format_json(response: &SearchResponse<'_>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(response)
}

/// Formats search results for the terminal, one block per model.
///
/// With an image directory, each hit also shows the asset path it resolves to.
pub fn format_human(response: &SearchResponse<'_>, images: Option<&Path>) -> String {
    let mut output = format!(
        "Top {} matches for \"{}\" ({}):\n",
        response.k, response.territory, response.method
    );

    for (model, hits) in response.results {
        output.push_str(&format!("\n{}\n", model));
        for (rank, hit) in hits.iter().enumerate() {
            // Same caption as the demo cards: name [score]
            output.push_str(&format!(
                "{:>3}. {} [{:.3}]",
                rank + 1,
                hit.territory_name,
                hit.score
            ));
            match images {
                Some(dir) => {
                    output.push_str(&format!("  {}\n", dir.join(&hit.filename).display()))
                }
                None => output.push_str(&format!("  {}\n", hit.filename)),
            }
        }
    }

    output
}

/// Territory catalogue, one `name<TAB>filename` per line
pub fn format_territories(territories: &[Identity]) -> String {
    territories
        .iter()
        .map(|id| format!("{}\t{}\n", id.territory_name, id.filename))
        .collect()
}

/// Loaded models, one per line
pub fn format_models(models: &[ModelSummary]) -> String {
    models
        .iter()
        .map(|m| format!("{}\t{} rows\t{}d\n", m.name, m.rows, m.dimension))
        .collect()
}
