//! Decision tree adapter: Implementation of `Classifier` over an exported tree.
//!
//! The artifact is a JSON export of a fitted CART classification tree in
//! struct-of-arrays form (`children_left`, `children_right`, `feature`,
//! `threshold`, `value`), one entry per node in depth-first pre-order.
//!
//! # Traversal
//!
//! Starting at node 0, go left when `x[feature] <= threshold`, right
//! otherwise, until reaching a leaf (`children_left == -1`). The leaf's
//! `value` row, normalised, is the class distribution.
//!
//! # Validation
//!
//! Structure is checked once at load: array lengths, child indices (a child
//! always sits after its parent, which rules out cycles, and every node but
//! the root has exactly one parent), feature indices, thresholds and value
//! rows. The feature count itself is not compared with
//! the 14-field vector here; a mismatch surfaces on the first query.

use serde::{Deserialize, Serialize};

use crate::ports::{Classifier, ModelError};

/// Supported artifact format version.
pub const FORMAT_VERSION: u32 = 1;

/// Child index marking a leaf.
const TREE_LEAF: i64 = -1;

/// Node arrays of a fitted tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArrays {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights (counts or fractions), aligned to `classes`
    pub value: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impurity: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_n_node_samples: Option<Vec<f64>>,
}

/// Model file produced by the export step of the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedDecisionTree {
    pub format_version: u32,
    pub model_type: String,
    pub classes: Vec<i64>,
    pub n_features: usize,
    #[serde(default)]
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<f64>>,
    pub tree: TreeArrays,
}

/// A validated, immutable decision tree classifier.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    export: ExportedDecisionTree,
    importances: Vec<f64>,
    /// Height of the subtree below each node, in edges
    heights: Vec<usize>,
}

impl DecisionTree {
    /// Validate an export and build the classifier.
    ///
    /// # Errors
    /// Returns `ModelError::Malformed` if the tree structure is inconsistent.
    pub fn from_export(export: ExportedDecisionTree) -> Result<Self, ModelError> {
        validate(&export)?;

        let importances = match &export.feature_importances {
            Some(given) => given.clone(),
            None => impurity_importances(&export),
        };
        let heights = subtree_heights(&export.tree);

        Ok(Self {
            export,
            importances,
            heights,
        })
    }

    /// Parse and validate a JSON export.
    ///
    /// # Errors
    /// Returns `ModelError::Malformed` on invalid JSON or structure.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let export: ExportedDecisionTree = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::Malformed(format!("invalid model JSON: {e}")))?;
        Self::from_export(export)
    }

    #[must_use]
    pub fn export(&self) -> &ExportedDecisionTree {
        &self.export
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.export.tree.children_left.len()
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.export
            .tree
            .children_left
            .iter()
            .filter(|&&c| c == TREE_LEAF)
            .count()
    }

    /// Longest root-to-leaf path, in edges.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.heights[0]
    }

    /// Index of the leaf `features` lands in.
    fn leaf_for(&self, features: &[f64]) -> usize {
        let tree = &self.export.tree;
        let mut node = 0usize;
        while tree.children_left[node] != TREE_LEAF {
            let f = tree.feature[node] as usize;
            node = if features[f] <= tree.threshold[node] {
                tree.children_left[node] as usize
            } else {
                tree.children_right[node] as usize
            };
        }
        node
    }

    fn check_input(&self, features: &[f64]) -> Result<(), ModelError> {
        if features.len() != self.export.n_features {
            return Err(ModelError::FeatureCount {
                expected: self.export.n_features,
                actual: features.len(),
            });
        }
        if let Some(index) = features.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite { index });
        }
        Ok(())
    }

    fn render(&self, names: &RenderNames<'_>, max_depth: Option<usize>) -> String {
        let tree = &self.export.tree;
        let mut out = String::new();
        let mut stack = vec![RenderStep::Node { node: 0, depth: 0 }];

        while let Some(step) = stack.pop() {
            let (node, depth) = match step {
                RenderStep::Line(line) => {
                    out.push_str(&line);
                    continue;
                }
                RenderStep::Node { node, depth } => (node, depth),
            };
            let indent = "|   ".repeat(depth);

            if tree.children_left[node] == TREE_LEAF {
                let proba = normalise(&tree.value[node]);
                let class = crate::ports::argmax(&proba).unwrap_or(0);
                out.push_str(&format!("{indent}|--- class: {}\n", names.class(class)));
                continue;
            }

            if max_depth.is_some_and(|m| depth >= m) {
                out.push_str(&format!(
                    "{indent}|--- truncated branch of depth {}\n",
                    self.heights[node]
                ));
                continue;
            }

            let feature = names.feature(tree.feature[node] as usize);
            let threshold = tree.threshold[node];
            out.push_str(&format!("{indent}|--- {feature} <= {threshold:.2}\n"));

            // Pushed in reverse: left subtree, then the `>` line, then right subtree.
            stack.push(RenderStep::Node {
                node: tree.children_right[node] as usize,
                depth: depth + 1,
            });
            stack.push(RenderStep::Line(format!(
                "{indent}|--- {feature} >  {threshold:.2}\n"
            )));
            stack.push(RenderStep::Node {
                node: tree.children_left[node] as usize,
                depth: depth + 1,
            });
        }
        out
    }
}

enum RenderStep {
    Node { node: usize, depth: usize },
    Line(String),
}

impl Classifier for DecisionTree {
    fn classes(&self) -> &[i64] {
        &self.export.classes
    }

    fn n_features(&self) -> usize {
        self.export.n_features
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.check_input(features)?;
        let leaf = self.leaf_for(features);
        Ok(normalise(&self.export.tree.value[leaf]))
    }

    fn feature_importances(&self) -> Vec<f64> {
        self.importances.clone()
    }

    fn params(&self) -> Vec<(String, serde_json::Value)> {
        self.export
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn feature_names(&self) -> Vec<String> {
        if self.export.feature_names.is_empty() {
            crate::ports::default_feature_names(self.export.n_features)
        } else {
            self.export.feature_names.clone()
        }
    }

    fn render_text(
        &self,
        feature_names: &[String],
        class_names: &[String],
        max_depth: Option<usize>,
    ) -> Option<String> {
        let names = RenderNames {
            features: feature_names,
            classes: class_names,
        };
        Some(self.render(&names, max_depth))
    }

    fn name(&self) -> &str {
        "decision_tree"
    }
}

struct RenderNames<'a> {
    features: &'a [String],
    classes: &'a [String],
}

impl RenderNames<'_> {
    fn feature(&self, index: usize) -> String {
        self.features
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("feature_{index}"))
    }

    fn class(&self, index: usize) -> String {
        self.classes
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{index}"))
    }
}

/// Scale a non-negative row so it sums to 1.
fn normalise(row: &[f64]) -> Vec<f64> {
    let total: f64 = row.iter().sum();
    if total > 0.0 {
        row.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; row.len()]
    }
}

fn gini(row: &[f64]) -> f64 {
    1.0 - normalise(row).iter().map(|p| p * p).sum::<f64>()
}

/// Subtree height per node in one reverse pass.
///
/// Children always sit after their parent, so walking indices backwards
/// sees both children before the parent.
fn subtree_heights(tree: &TreeArrays) -> Vec<usize> {
    let n = tree.children_left.len();
    let mut heights = vec![0usize; n];
    for node in (0..n).rev() {
        if tree.children_left[node] == TREE_LEAF {
            continue;
        }
        let left = heights[tree.children_left[node] as usize];
        let right = heights[tree.children_right[node] as usize];
        heights[node] = 1 + left.max(right);
    }
    heights
}

/// Mean decrease in impurity per feature, normalised to sum to 1.
///
/// Falls back to Gini impurity of `value` and row sums as node weights when
/// the export omits `impurity` / `weighted_n_node_samples`.
fn impurity_importances(export: &ExportedDecisionTree) -> Vec<f64> {
    let tree = &export.tree;
    let n = tree.children_left.len();

    let impurity: Vec<f64> = match &tree.impurity {
        Some(v) => v.clone(),
        None => tree.value.iter().map(|row| gini(row)).collect(),
    };
    let weight: Vec<f64> = match &tree.weighted_n_node_samples {
        Some(v) => v.clone(),
        None => tree.value.iter().map(|row| row.iter().sum()).collect(),
    };

    let mut importances = vec![0.0; export.n_features];
    for node in 0..n {
        if tree.children_left[node] == TREE_LEAF {
            continue;
        }
        let l = tree.children_left[node] as usize;
        let r = tree.children_right[node] as usize;
        let decrease = weight[node] * impurity[node]
            - weight[l] * impurity[l]
            - weight[r] * impurity[r];
        importances[tree.feature[node] as usize] += decrease;
    }

    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        importances.iter_mut().for_each(|v| *v /= total);
    }
    importances
}

fn validate(export: &ExportedDecisionTree) -> Result<(), ModelError> {
    let malformed = |msg: String| Err(ModelError::Malformed(msg));

    if export.format_version != FORMAT_VERSION {
        return malformed(format!(
            "unsupported format_version {} (expected {FORMAT_VERSION})",
            export.format_version
        ));
    }
    if !matches!(
        export.model_type.as_str(),
        "decision_tree" | "DecisionTreeClassifier"
    ) {
        return malformed(format!("unsupported model_type `{}`", export.model_type));
    }
    if export.classes.is_empty() {
        return malformed("classes must not be empty".into());
    }
    let mut sorted = export.classes.clone();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != export.classes.len() {
        return malformed("classes must be distinct".into());
    }
    if export.n_features == 0 {
        return malformed("n_features must be positive".into());
    }
    if !export.feature_names.is_empty() && export.feature_names.len() != export.n_features {
        return malformed(format!(
            "feature_names has {} entries, n_features is {}",
            export.feature_names.len(),
            export.n_features
        ));
    }
    if let Some(imp) = &export.feature_importances {
        if imp.len() != export.n_features {
            return malformed(format!(
                "feature_importances has {} entries, n_features is {}",
                imp.len(),
                export.n_features
            ));
        }
        if imp.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return malformed("feature_importances must be finite and non-negative".into());
        }
    }

    let tree = &export.tree;
    let n = tree.children_left.len();
    if n == 0 {
        return malformed("tree has no nodes".into());
    }
    let lengths = [
        ("children_right", tree.children_right.len()),
        ("feature", tree.feature.len()),
        ("threshold", tree.threshold.len()),
        ("value", tree.value.len()),
        ("impurity", tree.impurity.as_ref().map_or(n, Vec::len)),
        (
            "weighted_n_node_samples",
            tree.weighted_n_node_samples.as_ref().map_or(n, Vec::len),
        ),
    ];
    for (name, len) in lengths {
        if len != n {
            return malformed(format!("{name} has {len} entries, expected {n}"));
        }
    }

    let mut parents = vec![0u8; n];
    for node in 0..n {
        let row = &tree.value[node];
        if row.len() != export.classes.len() {
            return malformed(format!(
                "node {node}: value row has {} entries, expected {}",
                row.len(),
                export.classes.len()
            ));
        }
        if row.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return malformed(format!("node {node}: value row must be finite and non-negative"));
        }

        let (left, right) = (tree.children_left[node], tree.children_right[node]);
        if left == TREE_LEAF || right == TREE_LEAF {
            if left != right {
                return malformed(format!("node {node}: only one child is a leaf marker"));
            }
            if row.iter().sum::<f64>() <= 0.0 {
                return malformed(format!("node {node}: leaf has an empty value row"));
            }
            continue;
        }

        for child in [left, right] {
            if child <= node as i64 || child >= n as i64 {
                return malformed(format!("node {node}: child index {child} out of order"));
            }
            let slot = &mut parents[child as usize];
            if *slot > 0 {
                return malformed(format!("node {child} is referenced more than once"));
            }
            *slot = 1;
        }
        let f = tree.feature[node];
        if f < 0 || f as usize >= export.n_features {
            return malformed(format!("node {node}: feature index {f} out of range"));
        }
        if !tree.threshold[node].is_finite() {
            return malformed(format!("node {node}: threshold is not finite"));
        }
    }

    if let Some(orphan) = (1..n).find(|&node| parents[node] == 0) {
        return malformed(format!("node {orphan} is not reachable from the root"));
    }

    Ok(())
}
