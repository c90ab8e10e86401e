use std::path::Path;

use common::labels::NUM_CLASSES;
use image::{imageops::FilterType, RgbImage};
use tract_onnx::prelude::*;

use crate::SignError;

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Side length of the square network input.
pub const INPUT_SIZE: usize = 64;

/// Color channels of the network input.
pub const CHANNELS: usize = 3;

/// A single normalized 64x64 RGB image, laid out as the `[1, 64, 64, 3]` (NHWC) network input.
///
/// Every value lies in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor(Box<[[[f32; CHANNELS]; INPUT_SIZE]; INPUT_SIZE]>);

impl InputTensor {
    pub const SHAPE: [usize; 4] = [1, INPUT_SIZE, INPUT_SIZE, CHANNELS];

    /// Normalized channel values at row `y`, column `x`.
    pub fn pixel(&self, y: usize, x: usize) -> &[f32; CHANNELS] {
        &self.0[y][x]
    }

    /// All values in row-major NHWC order.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.0.iter().flatten().flatten().copied()
    }

    fn to_tensor(&self) -> Tensor {
        tract_ndarray::Array4::from_shape_fn(
            (1, INPUT_SIZE, INPUT_SIZE, CHANNELS),
            |(_, y, x, c)| self.0[y][x][c],
        )
        .into()
    }
}

/// Stretch an image to the network input size and scale intensities to `[0, 1]`.
///
/// The aspect ratio is not preserved.
pub fn preprocess(image: &RgbImage) -> InputTensor {
    let size = INPUT_SIZE as u32;
    let resized;
    let image = if image.dimensions() == (size, size) {
        image
    } else {
        resized = image::imageops::resize(image, size, size, FilterType::CatmullRom);
        &resized
    };

    let mut data = Box::new([[[0.0_f32; CHANNELS]; INPUT_SIZE]; INPUT_SIZE]);
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..CHANNELS {
            data[y as usize][x as usize][c] = pixel[c] as f32 / 255.0;
        }
    }

    InputTensor(data)
}

/// Network output: one probability per traffic sign class.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassProbabilities([f32; NUM_CLASSES]);

impl ClassProbabilities {
    pub fn new(values: [f32; NUM_CLASSES]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Index and value of the most probable class.
    ///
    /// On ties the lowest index wins. NaN never wins against a number.
    pub fn argmax(&self) -> (usize, f32) {
        let mut best = (0, self.0[0]);
        for (index, &value) in self.0.iter().enumerate().skip(1) {
            if value > best.1 || (best.1.is_nan() && !value.is_nan()) {
                best = (index, value);
            }
        }

        best
    }
}

impl TryFrom<&[f32]> for ClassProbabilities {
    type Error = SignError;

    fn try_from(values: &[f32]) -> Result<Self, Self::Error> {
        let values: [f32; NUM_CLASSES] =
            values.try_into().map_err(|_| SignError::ClassCountMismatch {
                expected: NUM_CLASSES,
                actual: values.len(),
            })?;

        Ok(Self(values))
    }
}

pub trait InferModel: Send + Sync {
    fn run(&self, input: &InputTensor) -> Result<ClassProbabilities, SignError>;
}

/// Traffic sign classifier network.
pub struct TrafficSignModel {
    model: NnModel,
}

impl TrafficSignModel {
    /// Load and optimize the ONNX network at `filepath`.
    ///
    /// Fails if the file is not a network taking a `[1, 64, 64, 3]` input or if its output size
    /// does not match the label table.
    pub fn load(filepath: impl AsRef<Path>) -> Result<Self, SignError> {
        let model = get_model(filepath.as_ref()).map_err(load_error)?;

        let output_fact = model.model().output_fact(0).map_err(load_error)?;
        if let Some(shape) = output_fact.shape.as_concrete() {
            let num_outputs: usize = shape.iter().product();
            if num_outputs != NUM_CLASSES {
                return Err(SignError::ClassCountMismatch {
                    expected: NUM_CLASSES,
                    actual: num_outputs,
                });
            }
        }

        Ok(Self { model })
    }
}

impl InferModel for TrafficSignModel {
    fn run(&self, input: &InputTensor) -> Result<ClassProbabilities, SignError> {
        let raw_nn_out = self
            .model
            .run(tvec!(input.to_tensor().into()))
            .map_err(inference_error)?;

        let probabilities: Vec<f32> = raw_nn_out[0]
            .to_array_view::<f32>()
            .map_err(inference_error)?
            .iter()
            .copied()
            .collect();

        ClassProbabilities::try_from(probabilities.as_slice())
    }
}

fn get_model(filepath: &Path) -> TractResult<NnModel> {
    let input_fact = InferenceFact::dt_shape(
        f32::datum_type(),
        tvec!(1, INPUT_SIZE, INPUT_SIZE, CHANNELS),
    );
    let model = tract_onnx::onnx()
        .model_for_path(filepath)?
        .with_input_fact(0, input_fact)?
        .into_optimized()?
        .into_runnable()?;

    Ok(model)
}

fn load_error(err: TractError) -> SignError {
    SignError::Load(format!("{:#}", err))
}

fn inference_error(err: TractError) -> SignError {
    SignError::Inference(format!("{:#}", err))
}
