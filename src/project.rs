//! JSON project-file loader: a Structure Source (`spec.md` §6).
//!
//! Parses the on-disk project file into the wire model, then converts it
//! into a [`StructureTree`], warning and dropping any offending element
//! (unrecognized `type`, invalid UUID, malformed waveform) while keeping the
//! rest of the tree — ported field-for-field from
//! `original_source/src/node-engine/serialization/*.go`.

use serde::Deserialize;
use uuid::Uuid;

use crate::structure::{ContainerNode, StructureNode, StructureTree};
use crate::waveform::{Smoothing, TransitionPoint, Waveform, WaveformKind, WaveformPointValue};

/// Fatal parse errors: the file is not readable JSON, or the root node is
/// not itself a usable container. Element-level problems below the root are
/// not represented here — they are logged and the offending element is
/// dropped (`spec.md` §7, Configuration error).
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("failed to parse project file as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("root node must be a container with a valid id")]
    InvalidRoot,
}

#[derive(Debug, Deserialize)]
struct ProjectFileModel {
    root: StructureNodeModel,
}

#[derive(Debug, Deserialize)]
struct StructureNodeModel {
    id: String,
    label: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    children: Vec<StructureNodeModel>,
    waveform: Option<WaveformModel>,
}

#[derive(Debug, Deserialize)]
struct WaveformModel {
    duration: u64,
    #[serde(rename = "tickFrequency")]
    tick_frequency: u32,
    #[serde(rename = "type")]
    waveform_type: String,
    #[serde(rename = "transitionPoints")]
    transition_points: Vec<TransitionPointModel>,
    meta: Option<MetaModel>,
}

#[derive(Debug, Deserialize)]
struct TransitionPointModel {
    tick: u64,
    #[serde(default)]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct MetaModel {
    smoothing: Option<String>,
}

/// Parses the full project-file text into a [`StructureTree`], dropping and
/// logging any malformed element below the root.
pub fn parse_project(json: &str) -> Result<StructureTree, ProjectError> {
    let model: ProjectFileModel = serde_json::from_str(json)?;
    let root = convert_root(model.root)?;
    Ok(StructureTree { root })
}

fn convert_root(model: StructureNodeModel) -> Result<ContainerNode, ProjectError> {
    if model.node_type.to_lowercase() != "container" {
        tracing::error!(node_type = %model.node_type, "root node must be a container");
        return Err(ProjectError::InvalidRoot);
    }
    let id = Uuid::parse_str(&model.id).map_err(|_| {
        tracing::error!(id = %model.id, "root node has an invalid uuid");
        ProjectError::InvalidRoot
    })?;

    let children = model
        .children
        .into_iter()
        .filter_map(convert_node)
        .collect();

    Ok(ContainerNode {
        id,
        label: model.label,
        children,
    })
}

fn convert_node(model: StructureNodeModel) -> Option<StructureNode> {
    let id = match Uuid::parse_str(&model.id) {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!(id = %model.id, label = %model.label, "invalid uuid, dropping node");
            return None;
        }
    };

    match model.node_type.to_lowercase().as_str() {
        "container" => {
            let children = model
                .children
                .into_iter()
                .filter_map(convert_node)
                .collect();
            Some(StructureNode::Container(ContainerNode {
                id,
                label: model.label,
                children,
            }))
        }
        "value" => {
            let waveform_model = match model.waveform {
                Some(w) => w,
                None => {
                    tracing::warn!(label = %model.label, "value node missing waveform, dropping node");
                    return None;
                }
            };
            match convert_waveform(waveform_model) {
                Some(waveform) => Some(StructureNode::Value {
                    id,
                    label: model.label,
                    waveform,
                }),
                None => {
                    tracing::warn!(label = %model.label, "invalid waveform, dropping node");
                    None
                }
            }
        }
        other => {
            tracing::warn!(node_type = %other, label = %model.label, "unrecognized node type, dropping node");
            None
        }
    }
}

fn convert_waveform(model: WaveformModel) -> Option<Waveform> {
    let kind = match model.waveform_type.as_str() {
        "transitions" => WaveformKind::Transitions,
        "doubleValues" => WaveformKind::NumericValues,
        other => {
            tracing::warn!(waveform_type = %other, "unrecognized waveform type");
            return None;
        }
    };

    let transition_points: Vec<TransitionPoint> = model
        .transition_points
        .iter()
        .map(|tp| TransitionPoint {
            tick: tp.tick,
            value: match kind {
                // The value field is a placeholder for Transitions waveforms
                // (spec.md §3); the boolean level is derived by
                // TransitionComputer, not read from the JSON.
                WaveformKind::Transitions => WaveformPointValue::Boolean(false),
                WaveformKind::NumericValues => WaveformPointValue::Numeric(tp.value),
            },
        })
        .collect();

    let meta = match kind {
        WaveformKind::Transitions => None,
        WaveformKind::NumericValues => Some(resolve_smoothing(model.meta)),
    };

    match Waveform::new(
        model.duration,
        model.tick_frequency,
        kind,
        transition_points,
        meta,
    ) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "waveform failed validation");
            None
        }
    }
}

fn resolve_smoothing(meta: Option<MetaModel>) -> Smoothing {
    match meta {
        None => {
            tracing::warn!("numeric waveform missing meta, defaulting to step");
            Smoothing::Step
        }
        Some(MetaModel { smoothing: None }) => {
            // The source preserves a "null meta" here; our typed model
            // cannot express "meta present but smoothing absent" as
            // anything other than the same default, so — unlike the
            // Go original, where this later surfaces as a factory-time
            // rejection — we resolve it the same way as an unknown
            // smoothing string (see DESIGN.md Open Questions).
            tracing::warn!("meta present without smoothing, defaulting to step");
            Smoothing::Step
        }
        Some(MetaModel {
            smoothing: Some(s),
        }) => match s.as_str() {
            "step" => Smoothing::Step,
            "linear" => Smoothing::Linear,
            "cubic" => Smoothing::CubicSpline,
            other => {
                tracing::warn!(smoothing = %other, "unknown smoothing strategy, defaulting to step");
                Smoothing::Step
            }
        },
    }
}
