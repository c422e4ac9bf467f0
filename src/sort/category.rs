use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::fmt;

use super::classes::ClassTable;

pub const DEFAULT_BIODEGRADABLE: [&str; 3] = ["apple", "banana", "orange"];
pub const DEFAULT_NONBIODEGRADABLE: [&str; 4] = ["bottle", "cup", "fork", "spoon"];

/// Disposal category of a recognised item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Biodegradable,
    NonBiodegradable,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Biodegradable => "biodegradable",
            Category::NonBiodegradable => "nonbiodegradable",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two fixed membership lists. Disjoint by construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryLists {
    biodegradable: BTreeSet<String>,
    nonbiodegradable: BTreeSet<String>,
}

impl CategoryLists {
    pub fn new(biodegradable: Vec<String>, nonbiodegradable: Vec<String>) -> Result<Self> {
        let biodegradable = normalize_list("biodegradable", biodegradable)?;
        let nonbiodegradable = normalize_list("nonbiodegradable", nonbiodegradable)?;

        let overlap: Vec<&str> = biodegradable
            .intersection(&nonbiodegradable)
            .map(String::as_str)
            .collect();
        if !overlap.is_empty() {
            return Err(anyhow!(
                "category lists must be disjoint; listed in both: {}",
                overlap.join(", ")
            ));
        }

        Ok(Self {
            biodegradable,
            nonbiodegradable,
        })
    }

    /// Category for a class name, or `None` when the name is in neither list.
    pub fn classify(&self, name: &str) -> Option<Category> {
        if self.biodegradable.contains(name) {
            Some(Category::Biodegradable)
        } else if self.nonbiodegradable.contains(name) {
            Some(Category::NonBiodegradable)
        } else {
            None
        }
    }

    pub fn biodegradable(&self) -> impl Iterator<Item = &str> {
        self.biodegradable.iter().map(String::as_str)
    }

    pub fn nonbiodegradable(&self) -> impl Iterator<Item = &str> {
        self.nonbiodegradable.iter().map(String::as_str)
    }

    /// Listed names the class table can never produce.
    pub fn unreachable_names<'a>(&'a self, table: &ClassTable) -> Vec<&'a str> {
        self.biodegradable()
            .chain(self.nonbiodegradable())
            .filter(|name| !table.contains(name))
            .collect()
    }
}

impl Default for CategoryLists {
    fn default() -> Self {
        Self {
            biodegradable: DEFAULT_BIODEGRADABLE.iter().map(|s| s.to_string()).collect(),
            nonbiodegradable: DEFAULT_NONBIODEGRADABLE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn normalize_list(label: &str, names: Vec<String>) -> Result<BTreeSet<String>> {
    let set: BTreeSet<String> = names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if set.is_empty() {
        return Err(anyhow!("{} list must name at least one class", label));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_lists_classify_known_items() {
        let lists = CategoryLists::default();
        for name in DEFAULT_BIODEGRADABLE {
            assert_eq!(lists.classify(name), Some(Category::Biodegradable));
        }
        for name in DEFAULT_NONBIODEGRADABLE {
            assert_eq!(lists.classify(name), Some(Category::NonBiodegradable));
        }
    }

    #[test]
    fn unlisted_names_are_ignored() {
        let lists = CategoryLists::default();
        let table = ClassTable::coco();
        for id in 0..table.len() {
            let name = table.resolve(id).unwrap();
            let listed = DEFAULT_BIODEGRADABLE.contains(&name)
                || DEFAULT_NONBIODEGRADABLE.contains(&name);
            assert_eq!(lists.classify(name).is_some(), listed, "{}", name);
        }
    }

    #[test]
    fn default_lists_are_disjoint() {
        let lists = CategoryLists::default();
        assert!(lists
            .biodegradable()
            .all(|name| lists.nonbiodegradable().all(|other| other != name)));
    }

    #[test]
    fn overlapping_lists_are_rejected() {
        let err = CategoryLists::new(names(&["apple", "cup"]), names(&["cup"])).unwrap_err();
        assert!(err.to_string().contains("cup"));
    }

    #[test]
    fn empty_lists_are_rejected() {
        assert!(CategoryLists::new(names(&[" "]), names(&["cup"])).is_err());
        assert!(CategoryLists::new(names(&["apple"]), vec![]).is_err());
    }

    #[test]
    fn names_are_trimmed() {
        let lists = CategoryLists::new(names(&[" apple "]), names(&["cup"])).unwrap();
        assert_eq!(lists.classify("apple"), Some(Category::Biodegradable));
    }

    #[test]
    fn unreachable_names_are_reported() {
        let lists = CategoryLists::new(names(&["apple", "peel"]), names(&["cup"])).unwrap();
        assert_eq!(lists.unreachable_names(&ClassTable::coco()), vec!["peel"]);
    }
}
