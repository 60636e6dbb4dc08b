//! Pose-embedding sign model using ONNX Runtime via `ort`.
//!
//! A frozen PoseNet MobileNetV1 backbone turns one RGB frame into keypoint
//! heatmaps and offsets; a small dense head trained on those features maps
//! them to token probabilities.
use std::path::Path;
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use serde::Deserialize;

use crate::recognition::domain::frame_model::{rank_scores, ClassifierError, FrameModel, TokenScore};
use crate::shared::frame::Frame;
use crate::shared::model_resolver::PoseModelArtifacts;

/// PoseNet MobileNetV1 input resolution.
pub const INPUT_SIZE: u32 = 257;
/// Output grid at stride 16.
const GRID: usize = 17;
const HEATMAP_CHANNELS: usize = 17;
const OFFSET_CHANNELS: usize = 34;
/// Heatmaps and offsets concatenated per grid cell.
pub const EMBEDDING_LEN: usize = GRID * GRID * (HEATMAP_CHANNELS + OFFSET_CHANNELS);

/// Training labels whose spelling differs from the token.
const LABEL_TOKENS: &[(&str, &str)] = &[
    ("Thank You", "THANKS"),
    ("How", "HOW"),
    ("You", "YOU"),
    ("Can", "CAN"),
    ("Slow", "SLOW"),
    ("Repeat", "REPEAT"),
    ("Hello", "HELLO"),
    ("see you later", "SEE_YOU_LATER"),
    ("father", "FATHER"),
    ("Mother", "MOTHER"),
];

pub struct OnnxPoseModel {
    backbone: Mutex<ort::session::Session>,
    head: Mutex<ort::session::Session>,
    tokens: Vec<String>,
}

impl OnnxPoseModel {
    pub fn load(artifacts: &PoseModelArtifacts) -> Result<Self, ClassifierError> {
        let tokens = load_tokens(&artifacts.labels)?;
        let backbone = build_session(&artifacts.backbone).map_err(|e| ClassifierError::Load {
            path: artifacts.backbone.clone(),
            message: e.to_string(),
        })?;
        let head = build_session(&artifacts.head).map_err(|e| ClassifierError::Load {
            path: artifacts.head.clone(),
            message: e.to_string(),
        })?;
        log::info!(
            "Loaded pose model ({} labels) from {}",
            tokens.len(),
            artifacts.backbone.display()
        );
        Ok(Self {
            backbone: Mutex::new(backbone),
            head: Mutex::new(head),
            tokens,
        })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    fn embed(&self, frame: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input = ort::value::Tensor::from_array(preprocess(frame)?)?;
        let mut session = self
            .backbone
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input])?;

        let mut heatmaps = None;
        let mut offsets = None;
        for i in 0..outputs.len() {
            let tensor = outputs[i].try_extract_array::<f32>()?;
            match tensor.shape().last() {
                Some(&HEATMAP_CHANNELS) => heatmaps = Some(tensor.iter().copied().collect::<Vec<_>>()),
                Some(&OFFSET_CHANNELS) => offsets = Some(tensor.iter().copied().collect::<Vec<_>>()),
                _ => {}
            }
        }
        let heatmaps = heatmaps.ok_or("Backbone produced no heatmap output")?;
        let offsets = offsets.ok_or("Backbone produced no offset output")?;
        concat_channels(&heatmaps, &offsets)
    }

    fn classify_embedding(&self, embedding: Vec<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input = ort::value::Tensor::from_array(ndarray::Array2::from_shape_vec(
            (1, EMBEDDING_LEN),
            embedding,
        )?)?;
        let mut session = self
            .head
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input])?;
        if outputs.len() == 0 {
            return Err("Classifier head produced no outputs".into());
        }
        let probs = outputs[0].try_extract_array::<f32>()?;
        Ok(probs.iter().copied().collect())
    }
}

impl FrameModel for OnnxPoseModel {
    fn predict(&self, frame: &Frame) -> Result<Vec<TokenScore>, ClassifierError> {
        let probabilities = self
            .embed(frame)
            .and_then(|e| self.classify_embedding(e))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let ranked = rank_scores(&self.tokens, &probabilities)?;
        if log::log_enabled!(log::Level::Debug) {
            let top: Vec<String> = ranked
                .iter()
                .take(3)
                .map(|s| format!("{}={:.3}", s.token, s.probability))
                .collect();
            log::debug!("Pose model top3: {}", top.join("  "));
        }
        Ok(ranked)
    }
}

fn build_session(path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(path)?;
    Ok(session)
}

/// Platform-preferred execution providers; ONNX Runtime falls back to CPU.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

#[derive(Deserialize)]
struct LabelMetadata {
    labels: Vec<String>,
}

/// Reads `{"labels": [...]}` and maps each label to its token.
pub fn load_tokens(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let invalid = |message: String| ClassifierError::Labels {
        path: path.to_path_buf(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let meta: LabelMetadata = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    if meta.labels.len() < 2 {
        return Err(invalid(format!(
            "need at least 2 labels, found {}",
            meta.labels.len()
        )));
    }
    Ok(meta.labels.iter().map(|l| label_to_token(l)).collect())
}

pub fn label_to_token(label: &str) -> String {
    LABEL_TOKENS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, t)| t.to_string())
        .unwrap_or_else(|| label.trim().to_uppercase().replace(' ', "_"))
}

/// Pad to square with black borders (centered), bilinear-resize to the
/// model input, scale to [-1, 1]. Layout is NHWC.
fn preprocess(frame: &Frame) -> Result<ndarray::Array4<f32>, Box<dyn std::error::Error>> {
    let resized = pad_and_resize(frame, INPUT_SIZE)?;
    let size = INPUT_SIZE as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, size, size, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel.0[c] as f32 / 127.5 - 1.0;
        }
    }
    Ok(tensor)
}

fn pad_and_resize(frame: &Frame, target: u32) -> Result<RgbImage, Box<dyn std::error::Error>> {
    let (w, h) = (frame.width(), frame.height());
    let src = RgbImage::from_raw(w, h, frame.data().to_vec())
        .ok_or("Frame buffer does not match its dimensions")?;
    let side = w.max(h);
    let mut padded = RgbImage::from_pixel(side, side, Rgb([0, 0, 0]));
    let pad_x = ((side - w) as f64 / 2.0).round() as i64;
    let pad_y = ((side - h) as f64 / 2.0).round() as i64;
    imageops::replace(&mut padded, &src, pad_x, pad_y);
    Ok(imageops::resize(&padded, target, target, FilterType::Triangle))
}

/// Sigmoid-activates heatmaps, then interleaves them with offsets per grid
/// cell, matching a channel-axis concat of `[17,17,17]` and `[17,17,34]`.
fn concat_channels(heatmaps: &[f32], offsets: &[f32]) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let cells = GRID * GRID;
    if heatmaps.len() != cells * HEATMAP_CHANNELS || offsets.len() != cells * OFFSET_CHANNELS {
        return Err(format!(
            "Unexpected backbone output sizes: heatmaps {}, offsets {}",
            heatmaps.len(),
            offsets.len()
        )
        .into());
    }
    let mut out = Vec::with_capacity(EMBEDDING_LEN);
    for cell in 0..cells {
        let hm = &heatmaps[cell * HEATMAP_CHANNELS..(cell + 1) * HEATMAP_CHANNELS];
        out.extend(hm.iter().map(|v| 1.0 / (1.0 + (-v).exp())));
        out.extend_from_slice(&offsets[cell * OFFSET_CHANNELS..(cell + 1) * OFFSET_CHANNELS]);
    }
    Ok(out)
}
