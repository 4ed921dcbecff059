//! Encoder-decoder heatmap network that locates the puck in a frame.

use crate::config::PerceptionConfig;
use crate::models::layers::{relu, BatchNorm2d, Conv2d, ConvTranspose2d};
use crate::models::weights::{NamedTensor, PlannerWeights, TensorStore, WEIGHTS_FORMAT_VERSION};
use crate::processing::soft_argmax::{soft_argmax, to_pixel_coordinates};
use crate::utils::{ensure_rgb, image_from_hwc, normalize_channels, rgb_to_chw_tensor};
use image::{DynamicImage, RgbImage};
use ndarray::{Array1, Array2, Array3, Axis};
use rand::Rng;
use rinkpilot_core::{AimPoint, Error, Result};
use std::path::Path;
use tracing::{debug, info};

/// Per-channel input statistics the network was trained with.
pub const INPUT_MEAN: [f32; 3] = [0.4446, 0.5542, 0.6197];
pub const INPUT_STD: [f32; 3] = [0.0011, 0.0019, 0.0021];

const INPUT_CHANNELS: usize = 3;
const DOWN_KERNEL: usize = 7;
const DOWN_STRIDE: usize = 2;
const DOWN_PADDING: usize = 3;
const UP_KERNEL: usize = 4;
const UP_STRIDE: usize = 2;
const UP_PADDING: usize = 1;

/// Where parameter values come from while the network is assembled.
trait ParameterSource {
    fn tensor(&mut self, name: &str, shape: &[usize]) -> Result<Vec<f32>>;
}

impl ParameterSource for TensorStore {
    fn tensor(&mut self, name: &str, shape: &[usize]) -> Result<Vec<f32>> {
        self.take(name, shape)
    }
}

/// Fan-in scaled uniform kernels and identity batch norms.
struct RandomInit<'a, R: Rng> {
    rng: &'a mut R,
}

impl<R: Rng> ParameterSource for RandomInit<'_, R> {
    fn tensor(&mut self, name: &str, shape: &[usize]) -> Result<Vec<f32>> {
        let len: usize = shape.iter().product();
        let filled = |v: f32| Ok(vec![v; len]);
        match name.rsplit('.').next() {
            Some("running_var") => filled(1.0),
            Some("running_mean") => filled(0.0),
            Some("weight") if name.contains(".norm.") => filled(1.0),
            Some("bias") if name.contains(".norm.") => filled(0.0),
            _ => {
                let fan_in: usize = shape.iter().skip(1).product::<usize>().max(1);
                let bound = 1.0 / (fan_in as f32).sqrt();
                Ok((0..len).map(|_| self.rng.gen_range(-bound..bound)).collect())
            }
        }
    }
}

fn build_norm(source: &mut dyn ParameterSource, prefix: &str, channels: usize) -> Result<BatchNorm2d> {
    let mut param = |field: &str| -> Result<Array1<f32>> {
        Ok(Array1::from(source.tensor(&format!("{}.norm.{}", prefix, field), &[channels])?))
    };
    let weight = param("weight")?;
    let bias = param("bias")?;
    let running_mean = param("running_mean")?;
    let running_var = param("running_var")?;
    BatchNorm2d::new(weight, bias, running_mean, running_var)
}

fn norm_tensors(prefix: &str, norm: &BatchNorm2d, out: &mut Vec<NamedTensor>) {
    let fields = ["weight", "bias", "running_mean", "running_var"];
    for (field, values) in fields.iter().zip(norm.parameters()) {
        out.push(NamedTensor::new(
            format!("{}.norm.{}", prefix, field),
            vec![values.len()],
            values.to_vec(),
        ));
    }
}

fn kernel_tensors(prefix: &str, shape: [usize; 4], weight: &Array2<f32>, bias: &Array1<f32>, out: &mut Vec<NamedTensor>) {
    out.push(NamedTensor::new(
        format!("{}.conv.weight", prefix),
        shape.to_vec(),
        weight.iter().copied().collect(),
    ));
    out.push(NamedTensor::new(
        format!("{}.conv.bias", prefix),
        vec![bias.len()],
        bias.to_vec(),
    ));
}

/// Strided convolution stage: norm -> conv -> ReLU.
struct DownBlock {
    norm: BatchNorm2d,
    conv: Conv2d,
}

impl DownBlock {
    fn build(source: &mut dyn ParameterSource, prefix: &str, input: usize, output: usize) -> Result<Self> {
        let norm = build_norm(source, prefix, input)?;
        let weight = source.tensor(
            &format!("{}.conv.weight", prefix),
            &[output, input, DOWN_KERNEL, DOWN_KERNEL],
        )?;
        let bias = source.tensor(&format!("{}.conv.bias", prefix), &[output])?;
        let conv = Conv2d::new(weight, bias, input, output, DOWN_KERNEL, DOWN_STRIDE, DOWN_PADDING)?;
        Ok(Self { norm, conv })
    }

    fn forward(&self, mut x: Array3<f32>) -> Result<Array3<f32>> {
        self.norm.forward(&mut x)?;
        let mut y = self.conv.forward(x.view())?;
        relu(&mut y);
        Ok(y)
    }
}

/// Transposed convolution stage: norm -> up-conv -> ReLU.
struct UpBlock {
    norm: BatchNorm2d,
    conv: ConvTranspose2d,
}

impl UpBlock {
    fn build(source: &mut dyn ParameterSource, prefix: &str, input: usize, output: usize) -> Result<Self> {
        let norm = build_norm(source, prefix, input)?;
        let weight = source.tensor(
            &format!("{}.conv.weight", prefix),
            &[input, output, UP_KERNEL, UP_KERNEL],
        )?;
        let bias = source.tensor(&format!("{}.conv.bias", prefix), &[output])?;
        let conv = ConvTranspose2d::new(weight, bias, input, output, UP_KERNEL, UP_STRIDE, UP_PADDING)?;
        Ok(Self { norm, conv })
    }

    fn forward(&self, mut x: Array3<f32>) -> Result<Array3<f32>> {
        self.norm.forward(&mut x)?;
        let mut y = self.conv.forward(x.view())?;
        relu(&mut y);
        Ok(y)
    }
}

/// Final norm -> 1x1 conv down to a single response channel.
struct Head {
    norm: BatchNorm2d,
    conv: Conv2d,
}

impl Head {
    fn build(source: &mut dyn ParameterSource, input: usize) -> Result<Self> {
        let norm = build_norm(source, "head", input)?;
        let weight = source.tensor("head.conv.weight", &[1, input, 1, 1])?;
        let bias = source.tensor("head.conv.bias", &[1])?;
        let conv = Conv2d::new(weight, bias, input, 1, 1, 1, 0)?;
        Ok(Self { norm, conv })
    }

    fn forward(&self, mut x: Array3<f32>) -> Result<Array2<f32>> {
        self.norm.forward(&mut x)?;
        let y = self.conv.forward(x.view())?;
        Ok(y.index_axis_move(Axis(0), 0))
    }
}

/// Puck locator. Parameters are fixed once built, so a planner can be
/// shared read-only across frames.
pub struct Planner {
    config: PerceptionConfig,
    encoder: Vec<DownBlock>,
    decoder: Vec<UpBlock>,
    head: Head,
}

impl Planner {
    fn build(config: &PerceptionConfig, source: &mut dyn ParameterSource) -> Result<Self> {
        config.validate().map_err(Error::Configuration)?;

        let mut encoder = Vec::with_capacity(config.channels.len());
        let mut h = INPUT_CHANNELS;
        for (i, &c) in config.channels.iter().enumerate() {
            encoder.push(DownBlock::build(source, &format!("encoder.{}", i), h, c)?);
            h = c;
        }

        let mut decoder = Vec::with_capacity(config.decoder_depth);
        for (i, c) in config.decoder_channels().enumerate() {
            decoder.push(UpBlock::build(source, &format!("decoder.{}", i), h, c)?);
            h = c;
        }

        let head = Head::build(source, h)?;

        Ok(Self { config: config.clone(), encoder, decoder, head })
    }

    /// Randomly initialised network of the configured shape.
    pub fn random<R: Rng>(config: &PerceptionConfig, rng: &mut R) -> Result<Self> {
        Self::build(config, &mut RandomInit { rng })
    }

    /// Load the parameter blob at `config.model_path`.
    pub fn load(config: &PerceptionConfig) -> Result<Self> {
        let weights = PlannerWeights::load(&config.model_path)?;
        let planner = Self::from_weights(config, weights)?;
        info!("Planner loaded from {:?}", config.model_path);
        Ok(planner)
    }

    pub fn from_weights(config: &PerceptionConfig, weights: PlannerWeights) -> Result<Self> {
        if weights.format_version != WEIGHTS_FORMAT_VERSION {
            return Err(Error::ModelLoad(format!(
                "unsupported weights format version {}",
                weights.format_version
            )));
        }
        if weights.channels != config.channels || weights.decoder_depth != config.decoder_depth {
            return Err(Error::ModelLoad(format!(
                "weights were trained for channels {:?} / decoder depth {}, network declares {:?} / {}",
                weights.channels, weights.decoder_depth, config.channels, config.decoder_depth
            )));
        }

        let mut store = weights.into_store();
        let planner = Self::build(config, &mut store)?;
        store.finish()?;
        Ok(planner)
    }

    pub fn to_weights(&self) -> PlannerWeights {
        let mut tensors = Vec::new();
        for (i, block) in self.encoder.iter().enumerate() {
            let prefix = format!("encoder.{}", i);
            norm_tensors(&prefix, &block.norm, &mut tensors);
            let (shape, weight, bias) = block.conv.parameters();
            kernel_tensors(&prefix, shape, weight, bias, &mut tensors);
        }
        for (i, block) in self.decoder.iter().enumerate() {
            let prefix = format!("decoder.{}", i);
            norm_tensors(&prefix, &block.norm, &mut tensors);
            let (shape, weight, bias) = block.conv.parameters();
            kernel_tensors(&prefix, shape, weight, bias, &mut tensors);
        }
        norm_tensors("head", &self.head.norm, &mut tensors);
        let (shape, weight, bias) = self.head.conv.parameters();
        kernel_tensors("head", shape, weight, bias, &mut tensors);

        PlannerWeights {
            format_version: WEIGHTS_FORMAT_VERSION,
            channels: self.config.channels.clone(),
            decoder_depth: self.config.decoder_depth,
            tensors,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_weights().save(path)
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    /// Aim point in the pixel space of `image`.
    pub fn infer(&self, image: &DynamicImage) -> Result<AimPoint> {
        let rgb = ensure_rgb(image)?;
        self.infer_rgb(&rgb)
    }

    /// Aim point for a raw `height x width x channels` buffer.
    pub fn infer_hwc(&self, data: &[u8], height: u32, width: u32, channels: usize) -> Result<AimPoint> {
        let rgb = image_from_hwc(data, height, width, channels)?;
        self.infer_rgb(&rgb)
    }

    pub fn infer_rgb(&self, image: &RgbImage) -> Result<AimPoint> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::InputShape("Image dimensions cannot be zero".to_string()));
        }

        let mut input = rgb_to_chw_tensor(image, self.config.input_width, self.config.input_height);
        normalize_channels(&mut input, &INPUT_MEAN, &INPUT_STD);

        let surface = self.heatmap(input)?;
        let normalized = soft_argmax(surface.view())?;
        let aim = to_pixel_coordinates(normalized, width, height);
        debug!("Planner aim point {} for {}x{} frame", aim, width, height);
        Ok(aim)
    }

    /// Raw response surface for an already normalized `[3, H, W]` tensor.
    pub fn heatmap(&self, input: Array3<f32>) -> Result<Array2<f32>> {
        let mut x = input;
        for block in &self.encoder {
            x = block.forward(x)?;
        }
        for block in &self.decoder {
            x = block.forward(x)?;
        }
        self.head.forward(x)
    }
}
