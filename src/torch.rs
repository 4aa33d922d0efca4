//! Loading and running the pretrained VQA model: the process-wide
//! `ModelContext` (weights, tokenizer, device, label table) plus the input
//! preparation and forward-pass stages of the pipeline.

use crate::config::{DevicePreference, Settings};
use crate::error::{Error, Result};
use crate::fetch::DecodedImage;
use crate::vocab::LabelVocabulary;
use anyhow::Context;
use image::imageops::{self, FilterType};
use std::sync::Mutex;
use tch::{no_grad, Device, Kind, Tensor};
use tokenizers::Tokenizer;
use tracing::info;

/// Side length the ViLT-style model was trained on.
pub const IMAGE_SIZE: u32 = 384;

// ViLT pixel normalization: (x/255 - mean) / std per channel.
const PIXEL_MEAN: f64 = 0.5;
const PIXEL_STD: f64 = 0.5;

/// The tensor bundle one forward pass consumes, already on the context's
/// device. Owned by a single request and dropped after inference.
pub struct PreparedInput {
    input_ids: Tensor,
    attention_mask: Tensor,
    token_type_ids: Tensor,
    pixel_values: Tensor,
    pixel_mask: Tensor,
}

/// Everything loaded once at startup and shared read-only by every request:
/// the TorchScript weights, the tokenizer shipped next to them, the compute
/// device, and the answer label table. Never mutated after construction.
pub struct ModelContext {
    model: tch::CModule,
    tokenizer: Tokenizer,
    device: Device,
    vocab: LabelVocabulary,
    /// The device execution path is not assumed safe for concurrent
    /// invocation, so forward passes take this lock; fetch and preparation
    /// for other requests keep running in parallel.
    forward_lock: Mutex<()>,
}

/// Resolve the configured preference to a concrete device. Called once at
/// startup; the result is recorded in the context for the process lifetime.
pub fn select_device(pref: DevicePreference) -> Device {
    match pref {
        DevicePreference::Auto => Device::cuda_if_available(),
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => Device::Cuda(0),
    }
}

impl ModelContext {
    /// Load `model.pt`, `tokenizer.json`, and `labels.json` from the model
    /// directory and place the weights on the selected device.
    pub fn load(settings: &Settings) -> anyhow::Result<Self> {
        let device = select_device(settings.device);

        let model_path = settings.model_dir.join("model.pt");
        let mut model = tch::CModule::load_on_device(&model_path, device)
            .with_context(|| format!("loading TorchScript model {}", model_path.display()))?;
        model.set_eval();

        let tokenizer_path = settings.model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("loading tokenizer {}: {e}", tokenizer_path.display()))?;

        let vocab = LabelVocabulary::load(&settings.model_dir.join("labels.json"))
            .context("loading label table")?;

        info!(
            device = %device_name(device),
            labels = vocab.len(),
            "model context loaded"
        );

        Ok(ModelContext {
            model,
            tokenizer,
            device,
            vocab,
            forward_lock: Mutex::new(()),
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn device_name(&self) -> String {
        device_name(self.device)
    }

    pub fn vocab(&self) -> &LabelVocabulary {
        &self.vocab
    }

    /// Combine the decoded image and the question into the tensor layout the
    /// model expects. Tokenization is delegated entirely to the tokenizer
    /// shipped with the weights; reimplementing it here would silently
    /// degrade answers rather than error.
    pub fn prepare(&self, image: DecodedImage, question: &str) -> Result<PreparedInput> {
        let question = normalized_question(question)?;

        let encoding = self
            .tokenizer
            .encode(question, true)
            .map_err(|e| Error::Preparation(format!("tokenization failed: {e}")))?;
        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> =
            encoding.get_type_ids().iter().map(|&t| t as i64).collect();

        let pixel_values = image_tensor(&image)?.unsqueeze(0).to_device(self.device);
        let side = IMAGE_SIZE as i64;
        let pixel_mask = Tensor::ones([1, side, side], (Kind::Int64, self.device));

        Ok(PreparedInput {
            input_ids: Tensor::from_slice(&input_ids)
                .unsqueeze(0)
                .to_device(self.device),
            attention_mask: Tensor::from_slice(&attention_mask)
                .unsqueeze(0)
                .to_device(self.device),
            token_type_ids: Tensor::from_slice(&token_type_ids)
                .unsqueeze(0)
                .to_device(self.device),
            pixel_values,
            pixel_mask,
        })
    }

    /// Run one forward pass and return a score per label. No gradients are
    /// computed and the weights are never touched; a device fault here fails
    /// this request only.
    pub fn forward(&self, input: PreparedInput) -> Result<Vec<f32>> {
        let _guard = self
            .forward_lock
            .lock()
            .map_err(|_| Error::Inference("forward lock poisoned".into()))?;

        let logits = no_grad(|| {
            self.model.forward_ts(&[
                &input.input_ids,
                &input.attention_mask,
                &input.token_type_ids,
                &input.pixel_values,
                &input.pixel_mask,
            ])
        })
        .map_err(|e| Error::Inference(e.to_string()))?;

        let flat = logits.squeeze().to_kind(Kind::Float).to_device(Device::Cpu);
        let scores = Vec::<f32>::try_from(&flat)
            .map_err(|e| Error::Inference(format!("logits are not a flat vector: {e}")))?;

        if scores.len() != self.vocab.len() {
            return Err(Error::Inference(format!(
                "model returned {} scores for a vocabulary of {}",
                scores.len(),
                self.vocab.len()
            )));
        }

        Ok(scores)
    }

    /// Prepare, infer, and decode in one synchronous call. This is the
    /// blocking portion of the pipeline; the handler runs it off the async
    /// executor.
    pub fn answer(&self, image: DecodedImage, question: &str) -> Result<String> {
        let prepared = self.prepare(image, question)?;
        let scores = self.forward(prepared)?;
        Ok(self.vocab.decode(&scores)?.to_string())
    }
}

fn device_name(device: Device) -> String {
    match device {
        Device::Cpu => "cpu".to_string(),
        Device::Cuda(n) => format!("cuda:{n}"),
        other => format!("{other:?}").to_lowercase(),
    }
}

pub(crate) fn normalized_question(question: &str) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        Err(Error::Preparation(
            "question is empty after normalization".into(),
        ))
    } else {
        Ok(question)
    }
}

/// Resize to the model's input resolution and normalize into a `[3, H, W]`
/// float tensor.
fn image_tensor(image: &DecodedImage) -> Result<Tensor> {
    let resized = imageops::resize(&image.pixels, IMAGE_SIZE, IMAGE_SIZE, FilterType::CatmullRom);
    let raw = resized.into_raw();
    let expected = (IMAGE_SIZE * IMAGE_SIZE * 3) as usize;
    if raw.len() != expected {
        return Err(Error::Preparation(format!(
            "pixel buffer holds {} bytes, expected {expected}",
            raw.len()
        )));
    }

    let side = IMAGE_SIZE as i64;
    let hwc = Tensor::from_slice(&raw).view([side, side, 3]);
    let chw = hwc.permute([2, 0, 1]).to_kind(Kind::Float) / 255.;
    Ok((chw - PIXEL_MEAN) / PIXEL_STD)
}
