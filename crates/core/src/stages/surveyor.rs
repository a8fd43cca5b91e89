//! # Surveyor Stage
//!
//! Pixel measurement: turns one reference image into a [`VisualManifest`],
//! a canvas description plus a recursive DOM-like tree. Downstream stages
//! consume manifests read-only.

use crate::client::{InvokeOptions, ModelInvoker, PromptPart};
use crate::decode::{decode_json, Decoded};
use crate::pipeline::types::UploadedFile;
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalized extraction rectangle, each coordinate in 0..=1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One node of the measured DOM-like tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    pub node_type: String,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<DomNode>,
    /// True when the element's pixels must be extracted verbatim rather
    /// than redrawn (logos, photos, illustrations)
    #[serde(default)]
    pub has_custom_visual: bool,
    /// Logical asset slot name; extraction results land in the asset map
    /// under this key
    #[serde(default)]
    pub asset_name: Option<String>,
    #[serde(default)]
    pub extraction_bounds: Option<Bounds>,
}

/// Canvas size and background of the reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub background: String,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
            background: "#ffffff".to_string(),
        }
    }
}

/// Structural result for one visual input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualManifest {
    /// Index of the upload this manifest describes
    #[serde(default)]
    pub source_index: usize,
    #[serde(default)]
    pub canvas: Canvas,
    #[serde(default)]
    pub tree: Option<DomNode>,
}

impl VisualManifest {
    /// Flattened component names, used by the critic and the healing loop
    pub fn component_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(tree) = &self.tree {
            collect_names(tree, &mut names);
        }
        names
    }
}

fn collect_names(node: &DomNode, out: &mut Vec<String>) {
    out.push(node.node_type.clone());
    for child in &node.children {
        collect_names(child, out);
    }
}

pub struct SurveyorStage;

impl SurveyorStage {
    /// Measure one image. Malformed output yields a manifest with default
    /// canvas and no tree, never an error.
    pub async fn run(
        invoker: &dyn ModelInvoker,
        file: &UploadedFile,
        index: usize,
    ) -> anyhow::Result<VisualManifest> {
        let parts = vec![
            PromptPart::text("Measure this reference image."),
            PromptPart::inline(file.mime.clone(), &file.data),
        ];
        let opts = InvokeOptions::with_system(prompts::SURVEYOR_SYSTEM);
        let response = invoker.invoke(&parts, "", &opts).await?;

        let mut manifest = match decode_json::<VisualManifest>(&response) {
            Decoded::Parsed(m) => m,
            Decoded::Malformed(_) => {
                tracing::warn!(index, "surveyor output unparseable, returning empty manifest");
                VisualManifest {
                    source_index: index,
                    canvas: Canvas::default(),
                    tree: None,
                }
            }
        };
        manifest.source_index = index;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_names_flatten_depth_first() {
        let manifest = VisualManifest {
            source_index: 0,
            canvas: Canvas::default(),
            tree: Some(DomNode {
                node_type: "hero".into(),
                styles: BTreeMap::new(),
                text: None,
                children: vec![
                    DomNode {
                        node_type: "headline".into(),
                        styles: BTreeMap::new(),
                        text: Some("Hi".into()),
                        children: vec![],
                        has_custom_visual: false,
                        asset_name: None,
                        extraction_bounds: None,
                    },
                    DomNode {
                        node_type: "cta".into(),
                        styles: BTreeMap::new(),
                        text: None,
                        children: vec![],
                        has_custom_visual: false,
                        asset_name: None,
                        extraction_bounds: None,
                    },
                ],
                has_custom_visual: false,
                asset_name: None,
                extraction_bounds: None,
            }),
        };
        assert_eq!(manifest.component_names(), vec!["hero", "headline", "cta"]);
    }

    #[test]
    fn test_manifest_deserializes_with_defaults() {
        let manifest: VisualManifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.tree.is_none());
        assert_eq!(manifest.canvas.width, 1440);
    }
}
