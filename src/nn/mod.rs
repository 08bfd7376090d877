//! Neural Network inference.
//!
//! Model files are ONNX graphs, loaded and executed on the CPU via [`tract_onnx`]. The wrapper
//! types in here hide tract behind a small API surface: [`NeuralNetwork`] runs tensors through a
//! loaded graph, and [`Cnn`] adds the image sampling and color mapping conventions of networks
//! that take a single image input.

pub mod tensor;

use crate::image::{AsImageView, Color, ImageView, Resolution};
use tensor::Tensor;
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, SimplePlan, TValue, TypedFact, TypedOp,
};

use std::{
    borrow::Cow,
    ops::{Index, Range, RangeInclusive},
    path::Path,
    sync::Arc,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) operating on image data.
///
/// Cheaply [`Clone`]able, like the [`NeuralNetwork`] it wraps.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    to_tensor: Arc<dyn Fn(ImageView<'_>) -> Tensor + Send + Sync>,
}

impl Cnn {
    /// Wraps a [`NeuralNetwork`] taking a single image input.
    ///
    /// The network's one input tensor must match the given [`CnnInputShape`].
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::input_res_of(&nn, shape)?;
        let (h, w) = (input_res.height() as usize, input_res.width() as usize);

        fn sample(view: &ImageView<'_>, u: f32, v: f32) -> Color {
            let x = (u * view.resolution().width() as f32).round() as u32;
            let y = (v * view.resolution().height() as f32).round() as u32;
            view.get(x, y)
        }

        // Box one closure per data order that samples the whole input image into a tensor, so
        // that the per-pixel path stays monomorphic.
        let to_tensor: Arc<dyn Fn(ImageView<'_>) -> _ + Send + Sync> = match shape {
            CnnInputShape::NCHW => Arc::new(move |view| {
                Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| {
                    color_mapper.map(sample(&view, x as f32 / w as f32, y as f32 / h as f32))[c]
                })
            }),
            CnnInputShape::NHWC => Arc::new(move |view| {
                Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| {
                    color_mapper.map(sample(&view, x as f32 / w as f32, y as f32 / h as f32))[c]
                })
            }),
        };

        Ok(Self {
            nn,
            input_res,
            to_tensor,
        })
    }

    fn input_res_of(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        if nn.num_inputs() != 1 {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let input_info = nn.inputs().next().unwrap();
        let tensor_shape = input_info.shape();

        let (w, h) = match (shape, tensor_shape) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            _ => {
                anyhow::bail!(
                    "invalid model input shape for {:?} CNN: {:?}",
                    shape,
                    tensor_shape,
                );
            }
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Resolution::new(w, h))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs inference on an input image.
    ///
    /// The image is resampled into the network's input tensor; if the aspect ratios don't match,
    /// it is stretched.
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        self.estimate_impl(image.as_view())
    }

    fn estimate_impl(&self, image: ImageView<'_>) -> anyhow::Result<Outputs> {
        let tensor = (self.to_tensor)(image);

        self.nn.estimate(&Inputs::from(tensor))
    }
}

/// Maps pixel colors to the value range a network expects its input in.
pub struct ColorMapper {
    offset: f32,
    scale: f32,
}

impl ColorMapper {
    /// Creates a color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range. The assumption is that sRGB is the color space most (all?) CNNs expect their inputs
    /// to be in, but in practice none of them document this.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let start = *target_range.start();
        let end = *target_range.end();
        assert!(end > start);

        Self {
            offset: start,
            scale: (end - start) / 255.0,
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        [color.r(), color.g(), color.b()].map(|ch| ch as f32 * self.scale + self.offset)
    }
}

/// The data order of a CNN's image input.
///
/// `N` is the number of images (fixed at 1 here), `C` the number of color channels (3 for RGB),
/// `H`/`W` the input height and width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// Neural network loader.
pub struct Loader<'a> {
    bytes: Cow<'a, [u8]>,
    outputs: Option<Vec<usize>>,
}

impl<'a> Loader<'a> {
    fn new(data: Cow<'a, [u8]>) -> Self {
        Self {
            bytes: data,
            outputs: None,
        }
    }

    /// Restricts inference to the outputs with the given indices.
    ///
    /// The [`Outputs`] returned from [`NeuralNetwork::estimate`] will then only contain the
    /// chosen tensors, and the graph is only evaluated as far as needed to compute them.
    pub fn with_output_selection<O>(mut self, outputs: O) -> Self
    where
        O: Into<Vec<usize>>,
    {
        self.outputs = Some(outputs.into());
        self
    }

    /// Loads and optimizes the network.
    ///
    /// Returns an error when the model data is malformed or truncated, or when the graph uses
    /// operations tract does not implement.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*self.bytes)?
            .into_optimized()?;
        let outputs = graph.output_outlets()?;
        let selected_outputs = match self.outputs {
            Some(indices) => indices.iter().map(|&i| outputs[i]).collect::<Vec<_>>(),
            None => outputs.to_vec(),
        };
        let model = SimplePlan::new_for_outputs(graph, &selected_outputs)?;

        Ok(NeuralNetwork(Arc::new(model)))
    }
}

/// A loaded neural network, ready for inference.
///
/// Cheaply [`Clone`]able handle to the underlying execution plan.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Starts loading a model from an ONNX file.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<'a, P: AsRef<Path>>(path: P) -> anyhow::Result<Loader<'a>> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl<'a>(path: &Path) -> anyhow::Result<Loader<'a>> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!("neural network file must have `.onnx` extension"),
        }

        let bytes = std::fs::read(path)?;
        Ok(Loader::new(bytes.into()))
    }

    /// Starts loading a model from an in-memory ONNX file.
    pub fn from_onnx(raw: &[u8]) -> anyhow::Result<Loader<'_>> {
        Ok(Loader::new(raw.into()))
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns an iterator over the input nodes of the network.
    ///
    /// Inference requires one matching tensor per input.
    pub fn inputs(&self) -> InputInfoIter<'_> {
        InputInfoIter {
            net: self,
            ids: 0..self.num_inputs(),
        }
    }

    /// Runs inference on a set of [`Inputs`], returning the computed [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let outputs = self.0.run(
            inputs
                .iter()
                .map(|t| TValue::from_const(Arc::new(t.to_tract())))
                .collect(),
        )?;
        let outputs = outputs
            .into_iter()
            .map(|tract| Tensor::from_tract(&tract))
            .collect();
        Ok(Outputs { inner: outputs })
    }
}

/// Iterator over a [`NeuralNetwork`]'s input nodes.
pub struct InputInfoIter<'a> {
    net: &'a NeuralNetwork,
    ids: Range<usize>,
}

impl<'a> Iterator for InputInfoIter<'a> {
    type Item = InputInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;

        let model = self.net.0.model();
        let fact = model.input_fact(id).expect("`input_fact` returned error");

        let node = model.input_outlets().unwrap()[id].node;

        Some(InputInfo {
            shape: fact
                .shape
                .as_concrete()
                .expect("symbolic network input shape"),
            name: &model.node(node).name,
        })
    }
}

/// Shape and name of a network input node.
#[derive(Debug)]
pub struct InputInfo<'a> {
    shape: &'a [usize],
    name: &'a str,
}

impl<'a> InputInfo<'a> {
    /// Returns the input's tensor shape.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.shape
    }

    /// Returns the input's node name.
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }
}

/// The tensors computed by one inference pass, one per (selected) output node.
#[derive(Debug)]
pub struct Outputs {
    inner: Vec<Tensor>,
}

impl Outputs {
    /// Returns the number of output tensors.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over the output tensors.
    pub fn iter(&self) -> OutputIter<'_> {
        OutputIter {
            inner: self.inner.iter(),
        }
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

impl<'a> IntoIterator for &'a Outputs {
    type Item = &'a Tensor;
    type IntoIter = OutputIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator yielded by [`Outputs::iter`].
pub struct OutputIter<'a> {
    inner: std::slice::Iter<'a, Tensor>,
}

impl<'a> Iterator for OutputIter<'a> {
    type Item = &'a Tensor;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// The input tensors for one inference pass.
#[derive(Debug)]
pub struct Inputs {
    inner: Vec<Tensor>,
}

impl Inputs {
    /// Returns the number of input tensors.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.inner.iter()
    }
}

impl From<Tensor> for Inputs {
    fn from(t: Tensor) -> Self {
        Self { inner: vec![t] }
    }
}

impl FromIterator<Tensor> for Inputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(1.0..=2.0);
        assert_eq!(mapper.map(Color::BLACK), [1.0, 1.0, 1.0]);
        assert_eq!(mapper.map(Color::WHITE), [2.0, 2.0, 2.0]);
    }
}
