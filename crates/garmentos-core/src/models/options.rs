use serde::{Deserialize, Serialize};

/// Reference lists offered by the article forms, from `GET /options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsCatalog {
    #[serde(default)]
    pub seasons: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
}

impl OptionsCatalog {
    pub fn unique_seasons(&self) -> Vec<&str> {
        unique(&self.seasons)
    }

    pub fn unique_categories(&self) -> Vec<&str> {
        unique(&self.categories)
    }

    pub fn unique_sizes(&self) -> Vec<&str> {
        unique(&self.sizes)
    }

    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty() && self.categories.is_empty() && self.sizes.is_empty()
    }
}

/// De-duplicate while keeping first-seen order.
fn unique(values: &[String]) -> Vec<&str> {
    let mut seen = Vec::with_capacity(values.len());
    for value in values {
        if !seen.contains(&value.as_str()) {
            seen.push(value.as_str());
        }
    }
    seen
}
