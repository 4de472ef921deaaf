//! Weight and config loading shared by every candle model in the workspace.

use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

/// Prefer `model.safetensors`, fall back to a PyTorch `pytorch_model.bin`.
pub fn load_var_builder(model_dir: &Path, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let tensors: HashMap<String, Tensor> = if safetensors.exists() {
        tracing::debug!(path = %safetensors.display(), "loading safetensors weights");
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let bin = model_dir.join("pytorch_model.bin");
        if !bin.exists() {
            return Err(anyhow!("No model weights found in {}", model_dir.display()));
        }
        tracing::debug!(path = %bin.display(), "loading pickle weights");
        candle_core::pickle::read_all(&bin)?.into_iter().collect()
    };
    Ok(VarBuilder::from_tensors(tensors, dtype, device))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))
}
