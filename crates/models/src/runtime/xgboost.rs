//! Native evaluator for gradient-boosted trees exported as XGBoost JSON

use ndarray::ArrayView2;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use super::{FeatureFrame, Regressor};
use crate::error::{ModelError, Result};

#[derive(Deserialize)]
struct ModelFile {
    learner: Learner,
}

#[derive(Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    learner_model_param: LearnerModelParam,
    gradient_booster: GradientBooster,
    #[serde(default)]
    objective: Option<Objective>,
}

#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
}

#[derive(Deserialize)]
struct Objective {
    name: String,
}

#[derive(Deserialize)]
struct GradientBooster {
    #[serde(default)]
    name: Option<String>,
    model: TreeEnsemble,
}

#[derive(Deserialize)]
struct TreeEnsemble {
    trees: Vec<TreeJson>,
}

#[derive(Deserialize)]
struct TreeJson {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f64>,
    default_left: Vec<Value>,
}

const LEAF: usize = usize::MAX;

#[derive(Debug, Clone)]
struct Node {
    left: usize,
    right: usize,
    feature: usize,
    /// Split threshold, or the leaf value on a leaf
    value: f32,
    default_left: bool,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_json(t: TreeJson, index: usize) -> Result<Self> {
        let n = t.left_children.len();
        if [
            t.right_children.len(),
            t.split_indices.len(),
            t.split_conditions.len(),
            t.default_left.len(),
        ]
        .iter()
        .any(|&len| len != n)
            || n == 0
        {
            return Err(ModelError::InvalidModel(format!(
                "tree {} has inconsistent node arrays",
                index
            )));
        }

        // children come after their parent in the node array
        let child = |parent: usize, c: i64| -> Result<usize> {
            match c {
                -1 => Ok(LEAF),
                c if c > parent as i64 && (c as usize) < n => Ok(c as usize),
                c => Err(ModelError::InvalidModel(format!(
                    "tree {} references node {}",
                    index, c
                ))),
            }
        };

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let left = child(i, t.left_children[i])?;
            let right = child(i, t.right_children[i])?;
            if (left == LEAF) != (right == LEAF) {
                return Err(ModelError::InvalidModel(format!(
                    "tree {} node {} has a single child",
                    index, i
                )));
            }
            let feature = usize::try_from(t.split_indices[i]).map_err(|_| {
                ModelError::InvalidModel(format!("tree {} node {} has a negative split index", index, i))
            })?;
            let default_left = match &t.default_left[i] {
                Value::Bool(b) => *b,
                Value::Number(v) => v.as_i64().unwrap_or(0) != 0,
                _ => false,
            };
            nodes.push(Node {
                left,
                right,
                feature,
                value: t.split_conditions[i] as f32,
                default_left,
            });
        }
        Ok(Self { nodes })
    }

    fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|n| n.left != LEAF)
            .map(|n| n.feature)
            .max()
    }

    fn predict(&self, row: &[f64]) -> f32 {
        let mut node = &self.nodes[0];
        while node.left != LEAF {
            let x = row[node.feature];
            let go_left = if x.is_nan() {
                node.default_left
            } else {
                (x as f32) < node.value
            };
            node = &self.nodes[if go_left { node.left } else { node.right }];
        }
        node.value
    }
}

/// Gradient-boosted regression trees read from an XGBoost JSON model.
///
/// Splits compare in single precision like XGBoost does. The output is
/// `base_score` plus the sum of the reached leaves (identity link).
#[derive(Debug, Clone)]
pub struct GradientBoostedModel {
    base_score: f32,
    feature_names: Option<Vec<String>>,
    trees: Vec<Tree>,
    n_features: usize,
}

impl GradientBoostedModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let model = Self::from_json_str(&text)?;
        debug!(
            "Loaded {} tree(s) from {}",
            model.trees.len(),
            path.as_ref().display()
        );
        Ok(model)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(text)?;
        let learner = file.learner;

        if let Some(name) = &learner.gradient_booster.name
            && name != "gbtree"
        {
            return Err(ModelError::InvalidModel(format!(
                "booster '{}' is not supported",
                name
            )));
        }
        if let Some(objective) = &learner.objective
            && !objective.name.starts_with("reg:")
        {
            warn!(
                "Objective '{}' evaluated with an identity link",
                objective.name
            );
        }

        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        let trees = learner
            .gradient_booster
            .model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| Tree::from_json(t, i))
            .collect::<Result<Vec<_>>>()?;

        let max_feature = trees.iter().filter_map(Tree::max_feature).max();
        let feature_names = (!learner.feature_names.is_empty()).then_some(learner.feature_names);
        let n_features = feature_names
            .as_ref()
            .map(Vec::len)
            .unwrap_or(0)
            .max(max_feature.map_or(0, |m| m + 1));

        Ok(Self {
            base_score,
            feature_names,
            trees,
            n_features,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// `"5E-1"` or, in newer exports, `"[5E-1]"`
fn parse_base_score(s: &str) -> Result<f32> {
    let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
    let first = trimmed.split(',').next().unwrap_or("").trim();
    first
        .parse::<f32>()
        .map_err(|_| ModelError::InvalidModel(format!("unreadable base_score '{}'", s)))
}

impl Regressor for GradientBoostedModel {
    fn predict_frame(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        if let Some(names) = &self.feature_names
            && names.as_slice() != frame.names()
        {
            return Err(ModelError::InputRejected(
                "feature names differ from the ones recorded in the model".into(),
            ));
        }
        self.predict_matrix(frame.values())
    }

    fn predict_matrix(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if x.ncols() < self.n_features {
            return Err(ModelError::InvalidModel(format!(
                "model expects {} features, input has {}",
                self.n_features,
                x.ncols()
            )));
        }

        let mut row = vec![0.0; x.ncols()];
        let predictions = x
            .rows()
            .into_iter()
            .map(|r| {
                for (slot, v) in row.iter_mut().zip(r.iter()) {
                    *slot = *v;
                }
                let sum = self
                    .trees
                    .iter()
                    .fold(self.base_score, |acc, t| acc + t.predict(&row));
                f64::from(sum)
            })
            .collect();
        Ok(predictions)
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    const FIXTURE: &str = r#"{
        "learner": {
            "feature_names": ["rhow_B2", "rhow_B3"],
            "learner_model_param": {"base_score": "[5E-1]", "num_feature": "2"},
            "gradient_booster": {
                "name": "gbtree",
                "model": {"trees": [
                    {"left_children": [1, -1, -1], "right_children": [2, -1, -1],
                     "split_indices": [0, 0, 0], "split_conditions": [0.05, -0.4, 0.3],
                     "default_left": [1, 0, 0]},
                    {"left_children": [1, -1, -1], "right_children": [2, -1, -1],
                     "split_indices": [1, 0, 0], "split_conditions": [0.1, 0.1, 0.2],
                     "default_left": [false, false, false]}
                ]}
            },
            "objective": {"name": "reg:squarederror"}
        },
        "version": [2, 0, 3]
    }"#;

    #[test]
    fn test_parse_fixture() {
        let model = GradientBoostedModel::from_json_str(FIXTURE).unwrap();
        assert_eq!(model.n_trees(), 2);
        assert_eq!(
            model.feature_names().unwrap(),
            &["rhow_B2".to_string(), "rhow_B3".to_string()]
        );
    }

    #[test]
    fn test_predict_matrix() {
        let model = GradientBoostedModel::from_json_str(FIXTURE).unwrap();
        let x = array![[0.02, 0.05], [0.08, 0.2], [f64::NAN, 0.2]];
        let y = model.predict_matrix(x.view()).unwrap();
        assert_relative_eq!(y[0], 0.2, epsilon = 1e-6);
        assert_relative_eq!(y[1], 1.0, epsilon = 1e-6);
        // missing B2 follows default_left to -0.4
        assert_relative_eq!(y[2], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_labeled_input_checked() {
        let model = GradientBoostedModel::from_json_str(FIXTURE).unwrap();
        let frame = FeatureFrame::new(
            vec!["rhow_B3".into(), "rhow_B2".into()],
            array![[0.05, 0.02]],
        )
        .unwrap();
        assert!(matches!(
            model.predict_frame(&frame),
            Err(ModelError::InputRejected(_))
        ));
    }

    #[test]
    fn test_too_few_columns() {
        let model = GradientBoostedModel::from_json_str(FIXTURE).unwrap();
        assert!(model.predict_matrix(array![[0.1]].view()).is_err());
    }

    #[test]
    fn test_base_score_forms() {
        assert_relative_eq!(parse_base_score("5E-1").unwrap(), 0.5);
        assert_relative_eq!(parse_base_score("[1.25E0]").unwrap(), 1.25);
        assert!(parse_base_score("abc").is_err());
    }

    #[test]
    fn test_rejects_broken_tree() {
        let broken = FIXTURE.replace(
            r#""right_children": [2, -1, -1]"#,
            r#""right_children": [-1, -1, -1]"#,
        );
        assert!(GradientBoostedModel::from_json_str(&broken).is_err());
    }
}
