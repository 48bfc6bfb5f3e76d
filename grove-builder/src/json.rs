// Copyright 2025 The Grove Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! JSON topology reader.
//!
//! ```json
//! { "kind": "TopologyTree",
//!   "metadata": { "name": "small" },
//!   "spec": {
//!     "resource-names": ["cpu", "mem"],
//!     "level-names": ["server", "rack", "root"],
//!     "tree": { "level": { "rack-0": { "level": { "server-0": {} } } } } } }
//! ```
//!
//! The document describes structure only; hosts are attached afterwards.
//! Node levels are assigned once the tree is built (root at the height,
//! 0 at the leaves).

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use grove_common::constants::TREE_KIND;
use grove_common::error::{GroveError, GroveResult};
use grove_topology::physical::{PhysData, PhysicalTree};
use grove_topology::tree::{NodeId, Tree};

/// A topology tree document.
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyTree {
    pub kind: String,
    pub metadata: Metadata,
    pub spec: TopologySpec,
}

/// Common metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub name: String,
}

/// Spec of a topology tree.
#[derive(Debug, Clone, Deserialize)]
pub struct TopologySpec {
    #[serde(rename = "resource-names")]
    pub resource_names: Vec<String>,
    #[serde(rename = "level-names")]
    pub level_names: Vec<String>,
    pub tree: TreeSpec,
}

/// Recursive spec of a (sub)tree; map keys are child ids.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeSpec {
    #[serde(default)]
    pub level: BTreeMap<String, TreeSpec>,
}

/// Build a physical tree from a topology tree JSON document.
pub fn tree_from_json(document: &str) -> GroveResult<PhysicalTree> {
    let topology: TopologyTree = serde_json::from_str(document)
        .map_err(|e| GroveError::BadInput(format!("topology parse error: {e}")))?;
    if topology.kind != TREE_KIND {
        return Err(GroveError::BadInput(format!(
            "unknown tree kind: {}",
            topology.kind
        )));
    }
    let num_resources = topology.spec.resource_names.len();
    debug!(
        name = %topology.metadata.name,
        num_resources,
        num_levels = topology.spec.level_names.len(),
        "reading topology tree"
    );

    let mut tree = Tree::new();
    let root = tree
        .insert_root("root", PhysData::new(0, num_resources))
        .ok_or_else(|| GroveError::BadInput("cannot create root".to_string()))?;
    add_subtree(&mut tree, root, &topology.spec.tree, num_resources)?;

    let mut ptree = PhysicalTree::new(tree);
    ptree.set_node_levels();
    Ok(ptree)
}

fn add_subtree(
    tree: &mut Tree<PhysData>,
    parent: NodeId,
    spec: &TreeSpec,
    num_resources: usize,
) -> GroveResult<()> {
    for (name, child_spec) in &spec.level {
        let child = tree
            .add_child(parent, name.clone(), PhysData::new(0, num_resources))
            .ok_or_else(|| GroveError::BadInput(format!("duplicate node id {name}")))?;
        add_subtree(tree, child, child_spec, num_resources)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "kind": "TopologyTree",
        "metadata": { "name": "small" },
        "spec": {
            "resource-names": ["cpu", "mem"],
            "level-names": ["server", "rack", "root"],
            "tree": {
                "level": {
                    "rack-0": { "level": { "server-0": {}, "server-1": {} } },
                    "rack-1": { "level": { "server-2": {} } }
                }
            }
        }
    }"#;

    #[test]
    fn test_reads_topology() {
        let ptree = tree_from_json(DOCUMENT).unwrap();
        let tree = ptree.tree();

        assert_eq!(tree.leaf_ids(), vec!["server-0", "server-1", "server-2"]);
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).data.level, 2);
        assert_eq!(tree.node(tree.find("rack-0").unwrap()).data.level, 1);
        assert_eq!(tree.node(tree.find("server-2").unwrap()).data.level, 0);
        assert_eq!(ptree.num_resources(), 2);
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let document = DOCUMENT.replace("TopologyTree", "SomethingElse");
        let err = tree_from_json(&document).unwrap_err();
        assert!(matches!(err, GroveError::BadInput(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(tree_from_json("{ not json").is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let document = r#"{
            "kind": "TopologyTree",
            "metadata": { "name": "dup" },
            "spec": {
                "resource-names": ["cpu"],
                "level-names": ["server", "root"],
                "tree": {
                    "level": {
                        "a": { "level": { "x": {} } },
                        "b": { "level": { "x": {} } }
                    }
                }
            }
        }"#;
        assert!(tree_from_json(document).is_err());
    }
}
