//! Post-processing passes applied to a finished frame.
//!
//! A pass is anything implementing [`PostPass`]. Scenes name their passes by
//! kind, and the kind must be registered in a [`PassRegistry`] before the scene
//! is built. The one built-in pass is bloom:
//!
//! 1. luminosity high pass (`smoothstep(threshold, threshold + 0.01, luma)`)
//! 2. five-level mip chain, each level half the previous, blurred with a
//!    separable Gaussian of radius `3 + 2i`
//! 3. weighted sum of the levels, scaled by `strength`, added to the input
//!
//! The GPU backend runs the same chain with the shaders in `compile`.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Vec2, Vec3, Vec4};

use crate::error::RenderError;

pub const BLOOM_KIND: &str = "bloom";
pub const BLOOM_LEVELS: usize = 5;
pub const BLOOM_SMOOTH_WIDTH: f32 = 0.01;
pub const LUMA_WEIGHTS: Vec3 = Vec3::new(0.299, 0.587, 0.114);
pub const BLOOM_LEVEL_FACTORS: [f32; BLOOM_LEVELS] = [1.0, 0.8, 0.6, 0.4, 0.2];

/// Gaussian kernel radius of mip level `level`; sigma equals the radius.
pub fn bloom_kernel_radius(level: usize) -> u32 {
    3 + 2 * level as u32
}

/// Contribution of mip level `level` before `strength` is applied.
pub fn bloom_level_factor(level: usize, radius: f32) -> f32 {
    let factor = BLOOM_LEVEL_FACTORS[level];
    factor + (1.2 - factor - factor) * radius
}

/// Size of bloom mip level `level` for a `width` x `height` frame.
pub fn bloom_level_size(width: u32, height: u32, level: usize) -> (u32, u32) {
    let shift = level as u32 + 1;
    ((width >> shift).max(1), (height >> shift).max(1))
}

/// Bloom settings. Fixed once the scene is built and deliberately never
/// validated: a negative radius or strength is passed straight through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomParams {
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            strength: 0.7,
            radius: 0.3,
        }
    }
}

/// Parameters of any pass kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassParams {
    Bloom(BloomParams),
}

/// Scene-side reference to a pass: the registered kind plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub kind: String,
    pub params: PassParams,
}

impl PassDescriptor {
    pub fn bloom(params: BloomParams) -> Self {
        Self {
            kind: BLOOM_KIND.to_string(),
            params: PassParams::Bloom(params),
        }
    }
}

/// CPU RGBA frame, row-major from the top-left corner.
#[derive(Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Frame {
    /// Transparent black frame. Zero dimensions are bumped to one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Vec4::ZERO)
    }

    pub fn filled(width: u32, height: u32, value: Vec4) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, mut pixel: F) -> Self
    where
        F: FnMut(u32, u32) -> Vec4,
    {
        let mut frame = Self::new(width, height);
        for y in 0..frame.height {
            for x in 0..frame.width {
                let index = frame.index(x, y);
                frame.pixels[index] = pixel(x, y);
            }
        }
        frame
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[self.index(x.min(self.width - 1), y.min(self.height - 1))]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.pixels[index] = value;
        }
    }

    /// Bilinear sample at a normalised coordinate with clamp-to-edge addressing.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = x - x0;
        let ty = y - y0;

        let fetch = |px: f32, py: f32| {
            let cx = px.clamp(0.0, (self.width - 1) as f32) as u32;
            let cy = py.clamp(0.0, (self.height - 1) as f32) as u32;
            self.pixels[self.index(cx, cy)]
        };

        let top = fetch(x0, y0).lerp(fetch(x0 + 1.0, y0), tx);
        let bottom = fetch(x0, y0 + 1.0).lerp(fetch(x0 + 1.0, y0 + 1.0), tx);
        top.lerp(bottom, ty)
    }

    /// Quantises to 8-bit RGBA, clamping each channel to `[0, 1]`.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|pixel| {
                pixel
                    .clamp(Vec4::ZERO, Vec4::ONE)
                    .to_array()
                    .map(|channel| (channel * 255.0).round() as u8)
            })
            .collect()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn texel_centre(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }
}

/// A full-frame post-processing step.
pub trait PostPass: fmt::Debug + Send {
    fn kind(&self) -> &'static str;
    fn params(&self) -> PassParams;
    fn apply(&self, input: &Frame) -> Frame;
}

/// Builds a pass from its parameters; `None` if the parameters belong to
/// another kind.
pub type PassFactory = fn(&PassParams) -> Option<Box<dyn PostPass>>;

/// Pass kinds available to scene construction.
#[derive(Clone, Default)]
pub struct PassRegistry {
    factories: BTreeMap<String, PassFactory>,
}

impl fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl PassRegistry {
    /// Registry with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in bloom pass.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BLOOM_KIND, BloomPass::factory);
        registry
    }

    pub fn register(&mut self, kind: &str, factory: PassFactory) {
        if self.factories.insert(kind.to_string(), factory).is_some() {
            tracing::warn!(kind, "replacing registered post-processing pass");
        }
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn build(&self, descriptor: &PassDescriptor) -> Result<Box<dyn PostPass>, RenderError> {
        self.factories
            .get(&descriptor.kind)
            .and_then(|factory| factory(&descriptor.params))
            .ok_or_else(|| RenderError::UnregisteredPass(descriptor.kind.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomPass {
    params: BloomParams,
}

impl BloomPass {
    pub fn new(params: BloomParams) -> Self {
        Self { params }
    }

    pub fn bloom_params(&self) -> BloomParams {
        self.params
    }

    fn factory(params: &PassParams) -> Option<Box<dyn PostPass>> {
        match params {
            PassParams::Bloom(params) => Some(Box::new(Self::new(*params))),
        }
    }

    fn high_pass(&self, input: &Frame) -> Frame {
        let threshold = self.params.threshold;
        let mut output = input.clone();
        for pixel in &mut output.pixels {
            let luma = pixel.truncate().dot(LUMA_WEIGHTS);
            let weight = crate::shader::smoothstep(threshold, threshold + BLOOM_SMOOTH_WIDTH, luma);
            *pixel *= weight;
        }
        output
    }
}

impl PostPass for BloomPass {
    fn kind(&self) -> &'static str {
        BLOOM_KIND
    }

    fn params(&self) -> PassParams {
        PassParams::Bloom(self.params)
    }

    fn apply(&self, input: &Frame) -> Frame {
        let bright = self.high_pass(input);

        let mut levels: Vec<Frame> = Vec::with_capacity(BLOOM_LEVELS);
        for level in 0..BLOOM_LEVELS {
            let (width, height) = bloom_level_size(input.width, input.height, level);
            let source = levels.last().unwrap_or(&bright);
            let kernel = bloom_kernel_radius(level);
            let horizontal = gaussian_blur(source, width, height, Vec2::X, kernel);
            levels.push(gaussian_blur(&horizontal, width, height, Vec2::Y, kernel));
        }

        let factors: Vec<f32> = (0..BLOOM_LEVELS)
            .map(|level| bloom_level_factor(level, self.params.radius))
            .collect();

        let mut output = input.clone();
        for y in 0..output.height {
            for x in 0..output.width {
                let uv = output.texel_centre(x, y);
                let bloom = levels
                    .iter()
                    .zip(&factors)
                    .fold(Vec3::ZERO, |sum, (level, factor)| {
                        sum + *factor * level.sample(uv).truncate()
                    });
                let index = output.index(x, y);
                let pixel = output.pixels[index];
                output.pixels[index] =
                    (pixel.truncate() + self.params.strength * bloom).extend(pixel.w);
            }
        }
        output
    }
}

fn gaussian(x: f32, sigma: f32) -> f32 {
    0.39894 * (-0.5 * x * x / (sigma * sigma)).exp() / sigma
}

/// One direction of the separable blur, resampling `source` to `width` x `height`.
fn gaussian_blur(source: &Frame, width: u32, height: u32, direction: Vec2, kernel: u32) -> Frame {
    let sigma = kernel as f32;
    let texel = Vec2::new(1.0 / width as f32, 1.0 / height as f32);
    let weights: Vec<f32> = (0..kernel).map(|i| gaussian(i as f32, sigma)).collect();
    let weight_sum = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();

    let mut output = Frame::new(width, height);
    for y in 0..output.height {
        for x in 0..output.width {
            let uv = output.texel_centre(x, y);
            let mut sum = source.sample(uv).truncate() * weights[0];
            for (i, weight) in weights.iter().enumerate().skip(1) {
                let offset = direction * texel * i as f32;
                sum += (source.sample(uv + offset).truncate() + source.sample(uv - offset).truncate())
                    * *weight;
            }
            let index = output.index(x, y);
            output.pixels[index] = (sum / weight_sum).extend(1.0);
        }
    }
    output
}
