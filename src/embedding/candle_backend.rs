//! Sentence embeddings on candle.
//!
//! Loads a sentence-transformers BERT checkpoint from the HuggingFace Hub and
//! turns batches of catalog text into unit vectors (mean pooling, then L2).

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{LayerNorm, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Longest token sequence fed to the encoder; catalog blurbs past this are cut.
const MAX_SEQUENCE_LENGTH: usize = 256;

/// Local paths of one checkpoint's files.
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Fetch (or reuse from cache) the files of `repo_id`.
    ///
    /// Blocking network and disk I/O; call from `spawn_blocking`.
    pub fn fetch(repo_id: &str, cache_dir: Option<&Path>) -> Result<Self> {
        let mut builder = hf_hub::api::sync::ApiBuilder::new().with_progress(false);
        if let Some(dir) = cache_dir {
            builder = builder.with_cache_dir(dir.to_path_buf());
        }
        let repo = builder
            .build()
            .context("HuggingFace Hub client unavailable")?
            .model(repo_id.to_string());

        let fetch = |name: &str| {
            repo.get(name)
                .with_context(|| format!("Fetching {name} from {repo_id}"))
        };
        Ok(Self {
            config: fetch("config.json")?,
            tokenizer: fetch("tokenizer.json")?,
            weights: fetch("model.safetensors")?,
        })
    }
}

/// Pick a GPU when one is compiled in and can run layer norm, else the CPU.
pub fn select_device() -> Device {
    #[allow(unused_mut)]
    let mut candidates: Vec<(&str, Device)> = Vec::new();
    #[cfg(target_os = "macos")]
    {
        if let Ok(device) = Device::new_metal(0) {
            candidates.push(("Metal", device));
        }
    }
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            candidates.push(("CUDA", device));
        }
    }

    for (name, device) in candidates {
        if supports_layer_norm(&device) {
            tracing::info!(device = name, "Embedding on GPU");
            return device;
        }
        tracing::warn!(device = name, "GPU lacks a layer-norm kernel; skipping");
    }
    tracing::info!("Embedding on CPU");
    Device::Cpu
}

fn supports_layer_norm(device: &Device) -> bool {
    let layer_norm = || -> candle_core::Result<Tensor> {
        let norm = LayerNorm::new(
            Tensor::ones(4, DType::F32, device)?,
            Tensor::zeros(4, DType::F32, device)?,
            1e-5,
        );
        norm.forward(&Tensor::randn(0f32, 1.0, (1, 4), device)?)
    };
    layer_norm().is_ok()
}

/// BERT encoder plus its tokenizer, pinned to one device.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertEmbedder {
    pub fn new(files: &ModelFiles, device: Device) -> Result<Self> {
        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&files.config).context("Reading model config")?,
        )
        .context("Parsing model config")?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Loading tokenizer: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Configuring truncation: {e}"))?;

        // SAFETY: the weights file is memory-mapped and must stay unmodified
        // for the lifetime of the model.
        let weights = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.weights], DType::F32, &device)
                .context("Mapping model weights")?
        };
        let model = BertModel::load(weights, &config).context("Building BERT model")?;

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    /// One unit vector per input text, in input order.
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encodings = self
            .tokenizer
            .encode_batch(texts.iter().map(String::as_str).collect::<Vec<_>>(), true)
            .map_err(|e| anyhow!("Tokenizing batch: {e}"))?;

        let ids = self.batch_tensor(&encodings, Encoding::get_ids)?;
        let type_ids = self.batch_tensor(&encodings, Encoding::get_type_ids)?;
        let mask = self.batch_tensor(&encodings, Encoding::get_attention_mask)?;

        let hidden = self.model.forward(&ids, &type_ids, Some(&mask))?;
        let pooled = mean_pool(&hidden, &mask)?;
        let unit = l2_normalize(&pooled)?;
        unit.to_vec2::<f32>().context("Reading embeddings back")
    }

    /// `[batch, seq_len]` tensor of one per-token field. Padding makes every
    /// encoding the same length.
    fn batch_tensor(
        &self,
        encodings: &[Encoding],
        field: fn(&Encoding) -> &[u32],
    ) -> Result<Tensor> {
        let seq_len = encodings.first().map_or(0, |e| field(e).len());
        let values: Vec<u32> = encodings
            .iter()
            .flat_map(|e| field(e).iter().copied())
            .collect();
        Ok(Tensor::from_vec(values, (encodings.len(), seq_len), &self.device)?)
    }
}

/// Average of token states, ignoring padding: `[batch, seq, hidden] -> [batch, hidden]`.
fn mean_pool(hidden: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
    let weights = mask.to_dtype(DType::F32)?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&weights)?.sum(1)?;
    summed.broadcast_div(&weights.sum(1)?)
}

fn l2_normalize(rows: &Tensor) -> candle_core::Result<Tensor> {
    rows.broadcast_div(&rows.sqr()?.sum_keepdim(1)?.sqrt()?)
}
