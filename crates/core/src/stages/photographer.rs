//! # Photographer / Asset Extractor
//!
//! Two sources feed the asset map: the Photographer synthesizes assets the
//! plan asked for, and the Asset Extractor crops real pixels out of the
//! reference for elements flagged `has_custom_visual`. When both produce an
//! entry for the same name the extracted one wins - fidelity over
//! hallucination.

use crate::client::{InvokeOptions, ModelInvoker, PromptPart};
use crate::pipeline::types::UploadedFile;
use crate::prompts;
use crate::stages::router::AssetRequest;
use crate::stages::surveyor::{DomNode, VisualManifest};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;

/// Where an asset entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetOrigin {
    /// Cropped from the original reference
    Extracted,
    /// Synthesized by the image generator
    Generated,
}

/// One resolved asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    pub url: String,
    pub origin: AssetOrigin,
}

/// Logical asset name -> resolved URL.
pub type AssetMap = BTreeMap<String, AssetEntry>;

/// Merge `incoming` into `base`. Extracted entries always override
/// generated ones for the same name; generated entries never displace
/// extracted ones.
pub fn merge_assets(base: &mut AssetMap, incoming: AssetMap) {
    for (name, entry) in incoming {
        match base.get(&name) {
            Some(existing)
                if existing.origin == AssetOrigin::Extracted
                    && entry.origin == AssetOrigin::Generated => {}
            _ => {
                base.insert(name, entry);
            }
        }
    }
}

pub struct PhotographerStage;

impl PhotographerStage {
    /// Synthesize the requested assets. Environment maps are skipped up
    /// front; individual generation failures degrade to placeholder URLs.
    pub async fn run(
        invoker: &dyn ModelInvoker,
        requests: &[AssetRequest],
    ) -> anyhow::Result<AssetMap> {
        let mut assets = AssetMap::new();
        for request in requests {
            if request.is_environment_map() {
                tracing::warn!(name = %request.name, "skipping environment-map asset, not supported by the image generator");
                continue;
            }
            let prompt = format!(
                "Asset name: {}\nDescription: {}\nVibe: {}",
                request.name, request.description, request.vibe
            );
            let opts = InvokeOptions::with_system(prompts::PHOTOGRAPHER_SYSTEM);
            let url = match invoker.invoke(&[PromptPart::text(prompt)], "", &opts).await {
                Ok(text) => {
                    let trimmed = text.trim().to_string();
                    if trimmed.starts_with("http") || trimmed.starts_with("data:") {
                        trimmed
                    } else {
                        placeholder_url(&request.name)
                    }
                }
                Err(e) => {
                    tracing::warn!(name = %request.name, error = %e, "asset generation failed, using placeholder");
                    placeholder_url(&request.name)
                }
            };
            assets.insert(
                request.name.clone(),
                AssetEntry {
                    url,
                    origin: AssetOrigin::Generated,
                },
            );
        }
        Ok(assets)
    }
}

fn placeholder_url(name: &str) -> String {
    format!("https://placehold.co/512x512?text={}", name.replace(' ', "+"))
}

pub struct AssetExtractorStage;

impl AssetExtractorStage {
    /// Crop every `has_custom_visual` element out of its source image and
    /// return the extracted entries. Per-node failures are logged and
    /// skipped; the reference image stays untouched.
    pub fn extract(files: &[UploadedFile], manifests: &[VisualManifest]) -> AssetMap {
        let mut assets = AssetMap::new();
        for manifest in manifests {
            let Some(tree) = &manifest.tree else { continue };
            let Some(file) = files.get(manifest.source_index) else {
                continue;
            };
            if !file.is_image() {
                continue;
            }
            let image = match image::load_from_memory(&file.data) {
                Ok(img) => img,
                Err(e) => {
                    tracing::warn!(index = manifest.source_index, error = %e, "could not decode reference image for extraction");
                    continue;
                }
            };
            let mut counter = 0usize;
            extract_from_node(tree, &image, &mut counter, &mut assets);
        }
        assets
    }
}

fn extract_from_node(
    node: &DomNode,
    image: &image::DynamicImage,
    counter: &mut usize,
    assets: &mut AssetMap,
) {
    if node.has_custom_visual {
        if let Some(bounds) = node.extraction_bounds {
            let (w, h) = (image.width() as f32, image.height() as f32);
            let x = (bounds.x.clamp(0.0, 1.0) * w) as u32;
            let y = (bounds.y.clamp(0.0, 1.0) * h) as u32;
            let cw = ((bounds.width.clamp(0.0, 1.0) * w) as u32)
                .min(image.width().saturating_sub(x))
                .max(1);
            let ch = ((bounds.height.clamp(0.0, 1.0) * h) as u32)
                .min(image.height().saturating_sub(y))
                .max(1);

            let name = node
                .asset_name
                .clone()
                .unwrap_or_else(|| format!("{}-{}", node.node_type, counter));
            *counter += 1;

            let crop = image.crop_imm(x, y, cw, ch);
            let mut buf = Cursor::new(Vec::new());
            match crop.write_to(&mut buf, image::ImageFormat::Png) {
                Ok(()) => {
                    let url = format!("data:image/png;base64,{}", STANDARD.encode(buf.get_ref()));
                    assets.insert(
                        name,
                        AssetEntry {
                            url,
                            origin: AssetOrigin::Extracted,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(%name, error = %e, "failed to encode extracted asset");
                }
            }
        }
    }
    for child in &node.children {
        extract_from_node(child, image, counter, assets);
    }
}
