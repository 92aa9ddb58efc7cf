use std::collections::HashMap;

use anyhow::Result;
use serde::Deserialize;

use crate::{BudgetModel, FeatureMatrix, ModelLoadError};

/// Node in the JSON tree dump produced by gradient-boosting libraries.
#[derive(Debug, Clone, Deserialize)]
struct DumpNode {
    nodeid: u32,
    #[serde(default)]
    split: Option<String>,
    #[serde(default)]
    split_condition: Option<f64>,
    #[serde(default)]
    yes: Option<u32>,
    #[serde(default)]
    no: Option<u32>,
    #[serde(default)]
    children: Vec<DumpNode>,
    #[serde(default)]
    leaf: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeEnsembleSpec {
    feature_names: Vec<String>,
    #[serde(default)]
    base_score: f64,
    trees: Vec<DumpNode>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct CompiledTree {
    nodes: Vec<Node>,
}

impl CompiledTree {
    fn score(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                } => {
                    idx = if row[feature] < threshold { yes } else { no };
                }
            }
        }
    }
}

/// Additive ensemble of regression trees: `base_score + Σ leaf`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "TreeEnsembleSpec")]
pub struct TreeEnsembleModel {
    feature_names: Vec<String>,
    base_score: f64,
    trees: Vec<CompiledTree>,
}

impl TreeEnsembleModel {
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl TryFrom<TreeEnsembleSpec> for TreeEnsembleModel {
    type Error = ModelLoadError;

    fn try_from(spec: TreeEnsembleSpec) -> Result<Self, Self::Error> {
        if spec.trees.is_empty() {
            return Err(ModelLoadError::Invalid(
                "tree ensemble has no trees".to_string(),
            ));
        }

        let trees = spec
            .trees
            .iter()
            .map(|root| compile_tree(root, &spec.feature_names))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            feature_names: spec.feature_names,
            base_score: spec.base_score,
            trees,
        })
    }
}

impl BudgetModel for TreeEnsembleModel {
    fn model_name(&self) -> &'static str {
        "tree-ensemble"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_batch(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        Ok(matrix
            .rows()
            .map(|row| {
                self.base_score + self.trees.iter().map(|tree| tree.score(row)).sum::<f64>()
            })
            .collect())
    }
}

fn compile_tree(root: &DumpNode, feature_names: &[String]) -> Result<CompiledTree, ModelLoadError> {
    let mut flat = HashMap::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if flat.insert(node.nodeid, node).is_some() {
            return Err(ModelLoadError::Invalid(format!(
                "duplicate tree node id {}",
                node.nodeid
            )));
        }
        stack.extend(node.children.iter());
    }

    // Root first, the rest in id order, so the walk always starts at index 0.
    let mut ids = flat.keys().copied().collect::<Vec<_>>();
    ids.sort_unstable_by_key(|id| (*id != root.nodeid, *id));
    let position = ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, idx))
        .collect::<HashMap<_, _>>();

    let resolve = |id: Option<u32>, parent: u32| {
        id.and_then(|id| position.get(&id).copied()).ok_or_else(|| {
            ModelLoadError::Invalid(format!("node {} points at a missing child", parent))
        })
    };

    let mut nodes = Vec::with_capacity(ids.len());
    for (current, id) in ids.iter().enumerate() {
        let node = flat[id];
        if let Some(value) = node.leaf {
            nodes.push(Node::Leaf(value));
            continue;
        }

        let split = node.split.as_deref().ok_or_else(|| {
            ModelLoadError::Invalid(format!("node {} has neither leaf nor split", node.nodeid))
        })?;
        let threshold = node.split_condition.ok_or_else(|| {
            ModelLoadError::Invalid(format!("node {} has no split_condition", node.nodeid))
        })?;

        let yes = resolve(node.yes, node.nodeid)?;
        let no = resolve(node.no, node.nodeid)?;
        // Children must come after their parent or the walk could cycle.
        if yes <= current || no <= current {
            return Err(ModelLoadError::Invalid(format!(
                "node {} points back up the tree",
                node.nodeid
            )));
        }

        nodes.push(Node::Split {
            feature: feature_index(split, feature_names)?,
            threshold,
            yes,
            no,
        });
    }

    Ok(CompiledTree { nodes })
}

/// Accepts a declared feature name or a positional `f<idx>` reference.
fn feature_index(split: &str, feature_names: &[String]) -> Result<usize, ModelLoadError> {
    if let Some(idx) = feature_names.iter().position(|name| name == split) {
        return Ok(idx);
    }

    split
        .strip_prefix('f')
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|idx| *idx < feature_names.len())
        .ok_or_else(|| ModelLoadError::Invalid(format!("split on unknown feature `{}`", split)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use trip_core::FeatureRow;

    use super::*;

    fn model() -> TreeEnsembleModel {
        serde_json::from_value(json!({
            "feature_names": ["Days", "Package_Type", "Hiking"],
            "base_score": 100.0,
            "trees": [
                {
                    "nodeid": 0, "depth": 0, "split": "Days", "split_condition": 2.5,
                    "yes": 1, "no": 2, "missing": 1,
                    "children": [
                        { "nodeid": 1, "leaf": 1000.0 },
                        { "nodeid": 2, "leaf": 3000.0 }
                    ]
                },
                {
                    "nodeid": 0, "split": "f2", "split_condition": 0.5,
                    "yes": 1, "no": 2,
                    "children": [
                        { "nodeid": 1, "leaf": 0.0 },
                        { "nodeid": 2, "leaf": 250.5 }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn sums_leaves_over_trees() {
        let model = model();
        assert_eq!(model.tree_count(), 2);

        let mut short = FeatureRow::new();
        short.set("Days", 2.0);
        let mut long_with_hiking = FeatureRow::new();
        long_with_hiking.set("Days", 4.0);
        long_with_hiking.set("Hiking", 1.0);

        let matrix = FeatureMatrix::align(&[short, long_with_hiking], model.feature_names());
        let scores = model.predict_batch(&matrix).unwrap();
        assert_eq!(scores, vec![1100.0, 3350.5]);
    }

    #[test]
    fn rejects_unknown_split_feature() {
        let result = serde_json::from_value::<TreeEnsembleModel>(json!({
            "feature_names": ["Days"],
            "trees": [
                {
                    "nodeid": 0, "split": "Budget", "split_condition": 1.0,
                    "yes": 1, "no": 2,
                    "children": [{ "nodeid": 1, "leaf": 1.0 }, { "nodeid": 2, "leaf": 2.0 }]
                }
            ]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_dangling_children() {
        let result = serde_json::from_value::<TreeEnsembleModel>(json!({
            "feature_names": ["Days"],
            "trees": [
                {
                    "nodeid": 0, "split": "Days", "split_condition": 1.0,
                    "yes": 1, "no": 7,
                    "children": [{ "nodeid": 1, "leaf": 1.0 }]
                }
            ]
        }));
        assert!(result.is_err());
    }
}
