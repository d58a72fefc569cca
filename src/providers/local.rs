//! Local ONNX-based embedding provider
//!
//! Runs a sentence-transformers model (all-MiniLM-L6-v2 by default) through
//! ONNX Runtime. The model and tokenizer are fetched into a cache directory
//! on first use and loaded once at startup; inference is serialized behind a
//! mutex and executed on the blocking pool so the shared instance can be
//! called from any number of jobs.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;

/// Local embedding provider backed by an ONNX session
pub struct LocalEmbedder {
    model: Arc<Mutex<OnnxModel>>,
    dimensions: usize,
    model_name: String,
}

impl std::fmt::Debug for LocalEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbedder")
            .field("dimensions", &self.dimensions)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl LocalEmbedder {
    /// Load (downloading if necessary) the configured model.
    pub async fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config.model().to_string();
        tracing::info!(model = %model_name, "Initializing local ONNX embedder");

        std::fs::create_dir_all(&config.cache_dir)
            .map_err(|e| Error::ModelLoad(format!("failed to create cache directory: {e}")))?;

        let model_path = config.cache_dir.join("model.onnx");
        let tokenizer_path = config.cache_dir.join("tokenizer.json");

        if !model_path.exists() {
            download_artifact(&model_name, "onnx/model.onnx", &model_path).await?;
        }
        if !tokenizer_path.exists() {
            download_artifact(&model_name, "tokenizer.json", &tokenizer_path).await?;
        }

        let session = Session::builder()
            .map_err(|e| Error::ModelLoad(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::ModelLoad(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| Error::ModelLoad(format!("failed to set threads: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| Error::ModelLoad(format!("failed to load model: {e}")))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::ModelLoad(format!("failed to load tokenizer: {e}")))?;

        tracing::info!(model = %model_name, "Local embedder ready");

        Ok(Self {
            model: Arc::new(Mutex::new(OnnxModel {
                session,
                tokenizer,
                max_length: config.max_length,
                batch_size: config.batch_size.max(1),
            })),
            dimensions: config.dimensions(),
            model_name,
        })
    }

    /// Model identifier this embedder was loaded with
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.lock().embed_batch(&texts))
            .await
            .map_err(|e| Error::embedding(format!("embedding task failed: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// ONNX session plus tokenizer; all inference goes through here
struct OnnxModel {
    session: Session,
    tokenizer: Tokenizer,
    max_length: usize,
    batch_size: usize,
}

impl OnnxModel {
    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_batch_internal(batch)?);
        }
        Ok(embeddings)
    }

    fn embed_batch_internal(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::embedding(format!("tokenization failed: {e}")))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_length);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            let len = ids.len().min(max_len);
            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = types[j] as i64;
            }
        }

        let input_ids_tensor = Tensor::from_array((
            vec![batch_size, max_len],
            input_ids.into_boxed_slice(),
        ))
        .map_err(|e| Error::embedding(format!("input tensor creation failed: {e}")))?;

        let attention_mask_tensor = Tensor::from_array((
            vec![batch_size, max_len],
            attention_mask.clone().into_boxed_slice(),
        ))
        .map_err(|e| Error::embedding(format!("attention mask tensor creation failed: {e}")))?;

        let token_type_ids_tensor = Tensor::from_array((
            vec![batch_size, max_len],
            token_type_ids.into_boxed_slice(),
        ))
        .map_err(|e| Error::embedding(format!("token type tensor creation failed: {e}")))?;

        let inputs = vec![
            ("input_ids", input_ids_tensor.into_dyn()),
            ("attention_mask", attention_mask_tensor.into_dyn()),
            ("token_type_ids", token_type_ids_tensor.into_dyn()),
        ];

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| Error::embedding(format!("inference failed: {e}")))?;

        let output_iter: Vec<_> = outputs.iter().collect();
        let output = output_iter
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| output_iter.first())
            .map(|(_, value)| value)
            .ok_or_else(|| Error::embedding("model produced no output tensor"))?;

        let (tensor_shape, tensor_data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::embedding(format!("failed to extract tensor: {e}")))?;

        let dims: Vec<usize> = tensor_shape.iter().map(|&d| d as usize).collect();
        let hidden_size = dims.get(2).copied().unwrap_or(0);
        if hidden_size == 0 {
            return Err(Error::embedding("model output has no hidden dimension"));
        }

        // Mean pooling over the attention mask, then L2 normalization
        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_size];
            let mut count = 0.0f32;

            for j in 0..max_len {
                let mask_val = attention_mask[i * max_len + j] as f32;
                if mask_val > 0.0 {
                    for (k, slot) in sum.iter_mut().enumerate() {
                        let idx = i * max_len * hidden_size + j * hidden_size + k;
                        if idx < tensor_data.len() {
                            *slot += tensor_data[idx] * mask_val;
                        }
                    }
                    count += mask_val;
                }
            }

            if count > 0.0 {
                for val in &mut sum {
                    *val /= count;
                }
            }

            let norm: f32 = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for val in &mut sum {
                    *val /= norm;
                }
            }

            embeddings.push(sum);
        }

        Ok(embeddings)
    }
}

/// Fetch a model artifact from the HuggingFace hub into the cache
async fn download_artifact(model_name: &str, file: &str, target: &Path) -> Result<()> {
    let url = format!(
        "https://huggingface.co/sentence-transformers/{model_name}/resolve/main/{file}"
    );
    tracing::info!(%url, "Downloading model artifact");

    let response = reqwest::get(&url)
        .await
        .map_err(|e| Error::ModelLoad(format!("failed to download {file}: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::ModelLoad(format!(
            "download of {file} failed: HTTP {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::ModelLoad(format!("failed to read {file}: {e}")))?;

    write_atomically(target, &bytes)
        .map_err(|e| Error::ModelLoad(format!("failed to save {file}: {e}")))?;

    tracing::info!(file, bytes = bytes.len(), "Artifact downloaded");
    Ok(())
}

/// Write via a temp file so a crashed download never leaves a truncated
/// artifact behind in the cache.
fn write_atomically(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = target.with_extension("partial");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreadable_cache_dir_is_a_model_load_error() {
        let config = EmbeddingConfig {
            backend: crate::config::EmbeddingBackend::Local,
            cache_dir: std::path::PathBuf::from("/dev/null/doc-ingest-models"),
            ..Default::default()
        };
        let err = LocalEmbedder::new(&config).await.unwrap_err();
        assert!(matches!(err, Error::ModelLoad(_)), "got: {err:?}");
    }
}
