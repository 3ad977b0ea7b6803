//! Namespace tree and the structure-source adapter (C6, `spec.md` §3, §4).
//!
//! A [`StructureNode`] tree is produced by a Structure Source (the JSON
//! project-file loader in [`crate::project`], or the TCP control channel in
//! [`crate::control`]) and handed to the VCE, which only cares about the flat
//! list of leaves ([`extract_value_nodes`]); container structure is opaque
//! to the core, exactly as `spec.md` §3 describes.

use uuid::Uuid;

use crate::engine::ValueNode;
use crate::waveform::Waveform;

/// A container (folder) node: identity, label, and children.
#[derive(Debug, Clone)]
pub struct ContainerNode {
    pub id: Uuid,
    pub label: String,
    pub children: Vec<StructureNode>,
}

/// Either a container or a leaf value node.
#[derive(Debug, Clone)]
pub enum StructureNode {
    Container(ContainerNode),
    Value {
        id: Uuid,
        label: String,
        waveform: Waveform,
    },
}

/// The rooted namespace tree handed to the VCE by a Structure Source.
#[derive(Debug, Clone)]
pub struct StructureTree {
    pub root: ContainerNode,
}

/// Traverses the tree and extracts the flat set of value nodes the VCE
/// needs, discarding container structure (`spec.md` §3, C6).
pub fn extract_value_nodes(tree: &StructureTree) -> Vec<ValueNode> {
    let mut out = Vec::new();
    collect(&tree.root.children, &mut out);
    out
}

fn collect(children: &[StructureNode], out: &mut Vec<ValueNode>) {
    for child in children {
        match child {
            StructureNode::Container(c) => collect(&c.children, out),
            StructureNode::Value { id, label, waveform } => {
                out.push(ValueNode {
                    id: *id,
                    label: label.clone(),
                    waveform: waveform.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::{Smoothing, TransitionPoint, WaveformKind, WaveformPointValue};

    fn leaf(label: &str) -> StructureNode {
        StructureNode::Value {
            id: Uuid::new_v4(),
            label: label.into(),
            waveform: Waveform::new(
                1000,
                100,
                WaveformKind::NumericValues,
                vec![TransitionPoint {
                    tick: 0,
                    value: WaveformPointValue::Numeric(0.0),
                }],
                Some(Smoothing::Step),
            )
            .unwrap(),
        }
    }

    #[test]
    fn flattens_nested_containers() {
        let tree = StructureTree {
            root: ContainerNode {
                id: Uuid::new_v4(),
                label: "root".into(),
                children: vec![
                    leaf("a"),
                    StructureNode::Container(ContainerNode {
                        id: Uuid::new_v4(),
                        label: "sub".into(),
                        children: vec![leaf("b"), leaf("c")],
                    }),
                ],
            },
        };

        let nodes = extract_value_nodes(&tree);
        let labels: Vec<_> = nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }
}
