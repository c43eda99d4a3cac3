use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig};
use teppan::backend::candle::TensorForward;
use tracing::info;

/// A Llama checkpoint with its own key/value cache.
pub struct LlamaNetwork {
    llama: Llama,
    config: Config,
    cache: Cache,
    dtype: DType,
    device: Device,
}

impl LlamaNetwork {
    /// Load `config.json` and every `*.safetensors` shard from `ckpt_dir`.
    pub fn load(ckpt_dir: &Path, dtype: DType, device: &Device) -> Result<Self> {
        let config_path = ckpt_dir.join("config.json");
        let config: LlamaConfig = serde_json::from_slice(
            &std::fs::read(&config_path).with_context(|| format!("reading {}", config_path.display()))?
        ).context("parsing llama config")?;
        let config = config.into_config(false);

        let shards = safetensor_shards(ckpt_dir)?;
        info!(shards = shards.len(), ?dtype, "loading weights");
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&shards, dtype, device)? };
        let llama = Llama::load(vb, &config).context("building llama")?;
        let cache = Cache::new(true, dtype, &config, device)?;

        Ok(Self {
            llama,
            config,
            cache,
            dtype,
            device: device.clone(),
        })
    }
}

fn safetensor_shards(ckpt_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut shards = std::fs::read_dir(ckpt_dir)
        .with_context(|| format!("listing {}", ckpt_dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "safetensors"))
        .collect::<Vec<_>>();
    if shards.is_empty() {
        bail!("no .safetensors files in {}", ckpt_dir.display());
    }
    shards.sort();
    Ok(shards)
}

impl TensorForward for LlamaNetwork {
    fn device(&self) -> &Device {
        &self.device
    }

    fn forward(&mut self, input: &Tensor, start_pos: usize) -> candle_core::Result<Tensor> {
        if start_pos == 0 {
            self.cache = Cache::new(true, self.dtype, &self.config, &self.device)?;
        }
        self.llama.forward(input, start_pos, &mut self.cache)
    }
}
