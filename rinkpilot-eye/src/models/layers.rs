//! Inference-time layers over single `[channels, height, width]` tensors.
//!
//! Convolutions are lowered to a GEMM (`ndarray` dot) so one frame stays
//! well inside the per-frame budget on a plain CPU.

use ndarray::{Array1, Array2, Array3, ArrayView3, Axis};
use rinkpilot_core::{Error, Result};

const BATCH_NORM_EPS: f32 = 1e-5;

/// Batch normalization with frozen running statistics.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    weight: Array1<f32>,
    bias: Array1<f32>,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,
    scale: Array1<f32>,
    shift: Array1<f32>,
}

impl BatchNorm2d {
    pub fn new(
        weight: Array1<f32>,
        bias: Array1<f32>,
        running_mean: Array1<f32>,
        running_var: Array1<f32>,
    ) -> Result<Self> {
        let n = weight.len();
        if bias.len() != n || running_mean.len() != n || running_var.len() != n {
            return Err(Error::ModelLoad(format!(
                "batch norm parameter lengths disagree: {}/{}/{}/{}",
                n,
                bias.len(),
                running_mean.len(),
                running_var.len()
            )));
        }

        let scale: Array1<f32> = weight
            .iter()
            .zip(running_var.iter())
            .map(|(&w, &v)| w / (v + BATCH_NORM_EPS).sqrt())
            .collect();
        let shift: Array1<f32> = bias
            .iter()
            .zip(running_mean.iter())
            .zip(scale.iter())
            .map(|((&b, &m), &s)| b - m * s)
            .collect();

        Ok(Self { weight, bias, running_mean, running_var, scale, shift })
    }

    pub fn channels(&self) -> usize {
        self.weight.len()
    }

    pub fn forward(&self, x: &mut Array3<f32>) -> Result<()> {
        if x.len_of(Axis(0)) != self.channels() {
            return Err(Error::InputShape(format!(
                "batch norm expects {} channels, got {}",
                self.channels(),
                x.len_of(Axis(0))
            )));
        }
        for (c, mut plane) in x.axis_iter_mut(Axis(0)).enumerate() {
            let (s, b) = (self.scale[c], self.shift[c]);
            plane.mapv_inplace(|v| v * s + b);
        }
        Ok(())
    }

    /// `(weight, bias, running_mean, running_var)`
    pub fn parameters(&self) -> [&Array1<f32>; 4] {
        [&self.weight, &self.bias, &self.running_mean, &self.running_var]
    }
}

/// Square-kernel 2D convolution.
#[derive(Debug, Clone)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    /// `[out, in * k * k]`
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Conv2d {
    /// `weight` is laid out `[out, in, k, k]`, row-major.
    pub fn new(
        weight: Vec<f32>,
        bias: Vec<f32>,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        if stride == 0 || kernel == 0 {
            return Err(Error::ModelLoad("convolution stride and kernel must be non-zero".to_string()));
        }
        let weight = Array2::from_shape_vec((out_channels, in_channels * kernel * kernel), weight)
            .map_err(|e| Error::ModelLoad(format!("convolution weight: {}", e)))?;
        if bias.len() != out_channels {
            return Err(Error::ModelLoad(format!(
                "convolution bias has {} entries, expected {}",
                bias.len(),
                out_channels
            )));
        }
        Ok(Self {
            in_channels,
            out_channels,
            kernel,
            stride,
            padding,
            weight,
            bias: Array1::from(bias),
        })
    }

    pub fn output_size(&self, height: usize, width: usize) -> Option<(usize, usize)> {
        let span = |n: usize| {
            (n + 2 * self.padding)
                .checked_sub(self.kernel)
                .map(|d| d / self.stride + 1)
        };
        Some((span(height)?, span(width)?))
    }

    pub fn forward(&self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
        let (c, h, w) = input.dim();
        if c != self.in_channels {
            return Err(Error::InputShape(format!(
                "convolution expects {} channels, got {}",
                self.in_channels, c
            )));
        }
        let (out_h, out_w) = self.output_size(h, w).ok_or_else(|| {
            Error::InputShape(format!("{}x{} input is smaller than the {} kernel", h, w, self.kernel))
        })?;

        let cols = self.im2col(input, out_h, out_w);
        let mut out = self.weight.dot(&cols);
        out += &self.bias.view().insert_axis(Axis(1));

        out.into_shape((self.out_channels, out_h, out_w))
            .map_err(|e| Error::InputShape(format!("convolution output: {}", e)))
    }

    fn im2col(&self, input: ArrayView3<f32>, out_h: usize, out_w: usize) -> Array2<f32> {
        let (c_in, h, w) = input.dim();
        let k = self.kernel;
        let pad = self.padding as isize;
        let mut cols = Array2::<f32>::zeros((c_in * k * k, out_h * out_w));

        for c in 0..c_in {
            for ki in 0..k {
                for kj in 0..k {
                    let mut row = cols.row_mut((c * k + ki) * k + kj);
                    for oy in 0..out_h {
                        let iy = (oy * self.stride + ki) as isize - pad;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        for ox in 0..out_w {
                            let ix = (ox * self.stride + kj) as isize - pad;
                            if ix < 0 || ix >= w as isize {
                                continue;
                            }
                            row[oy * out_w + ox] = input[[c, iy as usize, ix as usize]];
                        }
                    }
                }
            }
        }
        cols
    }

    /// `(shape, weight, bias)` with the weight shape in `[out, in, k, k]` order.
    pub fn parameters(&self) -> ([usize; 4], &Array2<f32>, &Array1<f32>) {
        (
            [self.out_channels, self.in_channels, self.kernel, self.kernel],
            &self.weight,
            &self.bias,
        )
    }
}

/// Square-kernel transposed convolution (fractionally strided upsampling).
#[derive(Debug, Clone)]
pub struct ConvTranspose2d {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    /// `[in, out * k * k]`
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl ConvTranspose2d {
    /// `weight` is laid out `[in, out, k, k]`, row-major.
    pub fn new(
        weight: Vec<f32>,
        bias: Vec<f32>,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        if stride == 0 || kernel == 0 {
            return Err(Error::ModelLoad(
                "transposed convolution stride and kernel must be non-zero".to_string(),
            ));
        }
        let weight = Array2::from_shape_vec((in_channels, out_channels * kernel * kernel), weight)
            .map_err(|e| Error::ModelLoad(format!("transposed convolution weight: {}", e)))?;
        if bias.len() != out_channels {
            return Err(Error::ModelLoad(format!(
                "transposed convolution bias has {} entries, expected {}",
                bias.len(),
                out_channels
            )));
        }
        Ok(Self {
            in_channels,
            out_channels,
            kernel,
            stride,
            padding,
            weight,
            bias: Array1::from(bias),
        })
    }

    pub fn output_size(&self, height: usize, width: usize) -> Option<(usize, usize)> {
        let span = |n: usize| {
            n.checked_sub(1)
                .map(|d| d * self.stride + self.kernel)
                .and_then(|full| full.checked_sub(2 * self.padding))
                .filter(|&o| o > 0)
        };
        Some((span(height)?, span(width)?))
    }

    pub fn forward(&self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
        let (c, h, w) = input.dim();
        if c != self.in_channels {
            return Err(Error::InputShape(format!(
                "transposed convolution expects {} channels, got {}",
                self.in_channels, c
            )));
        }
        let (out_h, out_w) = self
            .output_size(h, w)
            .ok_or_else(|| Error::InputShape(format!("{}x{} input cannot be upsampled", h, w)))?;

        let flat = Array2::from_shape_vec((c, h * w), input.iter().copied().collect())
            .map_err(|e| Error::InputShape(format!("transposed convolution input: {}", e)))?;
        let cols = self.weight.t().dot(&flat);

        let mut out = Array3::<f32>::zeros((self.out_channels, out_h, out_w));
        for (co, mut plane) in out.axis_iter_mut(Axis(0)).enumerate() {
            plane.fill(self.bias[co]);
        }

        // col2im: scatter every input pixel's k x k contribution.
        let k = self.kernel;
        let pad = self.padding as isize;
        for co in 0..self.out_channels {
            for ki in 0..k {
                for kj in 0..k {
                    let row = cols.row((co * k + ki) * k + kj);
                    for iy in 0..h {
                        let oy = (iy * self.stride + ki) as isize - pad;
                        if oy < 0 || oy >= out_h as isize {
                            continue;
                        }
                        for ix in 0..w {
                            let ox = (ix * self.stride + kj) as isize - pad;
                            if ox < 0 || ox >= out_w as isize {
                                continue;
                            }
                            out[[co, oy as usize, ox as usize]] += row[iy * w + ix];
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// `(shape, weight, bias)` with the weight shape in `[in, out, k, k]` order.
    pub fn parameters(&self) -> ([usize; 4], &Array2<f32>, &Array1<f32>) {
        (
            [self.in_channels, self.out_channels, self.kernel, self.kernel],
            &self.weight,
            &self.bias,
        )
    }
}

pub fn relu(x: &mut Array3<f32>) {
    x.mapv_inplace(|v| v.max(0.0));
}
