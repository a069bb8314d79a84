use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bookdb_core::config::{expand_path, EmbeddingConfig};
use bookdb_core::traits::Embedder;
use bookdb_core::{Error, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

const DEFAULT_MAX_LEN: usize = 512;

/// BERT-family sentence embedder (gte-base by default): mean pooling over
/// the attention mask, then L2 normalization.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dim: usize,
    max_len: usize,
}

impl SentenceEmbedder {
    /// Load `tokenizer.json`, `config.json` and the weights from `model_dir`.
    pub fn load(model_dir: &Path, model_id: &str) -> anyhow::Result<Self> {
        let device = device::select_device();
        info!("Loading embedding model {} from {}", model_id, model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))?;
        let config_json: serde_json::Value = serde_json::from_str(&raw)?;
        let dim = config_json
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;
        let max_len = config_json
            .get("max_position_embeddings")
            .and_then(serde_json::Value::as_u64)
            .map_or(DEFAULT_MAX_LEN, |n| (n as usize).min(DEFAULT_MAX_LEN));

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config)?;
        info!("Embedding model {} ready (dim={}, max_len={})", model_id, dim, max_len);

        Ok(Self { model, tokenizer, device, model_id: model_id.to_string(), dim, max_len })
    }

    fn forward(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(anyhow!("model produced {} dims, expected {}", v.len(), self.dim));
        }
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 500 {
            warn!("Slow embedding: {} texts in {:?}", texts.len(), elapsed);
        } else {
            debug!("Embedded {} texts in {:?}", texts.len(), elapsed);
        }
        Ok(vectors)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> anyhow::Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        return Ok(weights.into_iter().collect());
    }
    Err(anyhow!("no model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

impl Embedder for SentenceEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.forward(texts)?)
    }
}

/// Deterministic bag-of-hashed-words embedder for tests and offline dev.
///
/// Texts sharing words land close together; vectors are L2-normalized.
pub struct HashEmbedder {
    dim: usize,
    model_id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), model_id: format!("hash-{}", dim.max(1)) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        let tokens = lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty());
        for (i, token) in tokens.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Build the configured embedder. Any load failure is `ModelUnavailable`.
pub fn load_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.use_fake || fake_requested_by_env() {
        info!("Using HashEmbedder (dim={})", config.fake_dim);
        return Ok(Arc::new(HashEmbedder::new(config.fake_dim)));
    }
    let model_dir = resolve_model_dir(config).map_err(|e| Error::ModelUnavailable(e.to_string()))?;
    let model = SentenceEmbedder::load(&model_dir, &config.model)
        .map_err(|e| Error::ModelUnavailable(format!("{}: {:#}", config.model, e)))?;
    Ok(Arc::new(model))
}

fn fake_requested_by_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn resolve_model_dir(config: &EmbeddingConfig) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &config.model_dir {
        let p = expand_path(dir);
        if p.exists() {
            return Ok(p);
        }
        return Err(anyhow!("model_dir {} does not exist", p.display()));
    }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") {
        let p = expand_path(&dir);
        if p.exists() {
            info!("Using APP_MODEL_DIR: {}", p.display());
            return Ok(p);
        }
    }
    let short_name = config.model.rsplit('/').next().unwrap_or(&config.model);
    for candidate in [Path::new("models").join(short_name), Path::new("../models").join(short_name)] {
        if candidate.exists() {
            info!("Using model dir: {}", candidate.display());
            return Ok(candidate);
        }
    }
    Err(anyhow!("could not locate a model directory for {}", config.model))
}
