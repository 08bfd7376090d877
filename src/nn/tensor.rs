//! Tensor API.
//!
//! Tensors are the inputs and outputs of neural networks. Since the networks used here only ever
//! consume image data and produce landmark/detection data, the element type is fixed to `f32`; a
//! tensor is then nothing more than an N-dimensional array with a known shape.

use std::fmt;

use tinyvec::TinyVec;

type Dims = TinyVec<[usize; 8]>;

/// Shape and row-major strides of a tensor.
#[derive(Clone)]
struct Layout {
    shape: Dims,
    strides: Dims,
}

impl Layout {
    fn from_shape(shape: &[usize]) -> Self {
        let mut strides: Dims = shape.iter().map(|_| 0).collect();
        let mut stride = 1;
        for (out, &size) in strides.iter_mut().zip(shape).rev() {
            *out = stride;
            stride *= size;
        }

        Self {
            shape: shape.iter().copied().collect(),
            strides,
        }
    }

    fn elements(&self) -> usize {
        self.shape.iter().product()
    }

    fn rank(&self) -> usize {
        self.shape.len()
    }

    fn suffix(&self, skip: usize) -> Layout {
        assert!(skip <= self.rank());
        Layout {
            shape: self.shape[skip..].iter().copied().collect(),
            strides: self.strides[skip..].iter().copied().collect(),
        }
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", &self.shape[..], &self.strides[..])
    }
}

/// Decomposes a row-major linear element index into per-dimension indices.
fn unravel(shape: &[usize], mut linear: usize, out: &mut [usize]) {
    for (out, &size) in out.iter_mut().zip(shape).rev() {
        *out = linear % size;
        linear /= size;
    }
}

/// A dynamically sized tensor with `f32` elements.
///
/// # Construction
///
/// A tensor can either be created via the provided `From` impls (from singular values and
/// 1-dimensional arrays), or by calling one of the `from_*` constructor methods.
///
/// # Data Access
///
/// [`Tensor::index`] produces a [`TensorView`] of the dimensions remaining after fixing a prefix
/// of them. The data in 1-dimensional tensors or views can be read with `as_slice`, a
/// 0-dimensional one holds a single value accessible with `as_singular`, and `iter` walks the
/// outermost dimension. Combined, this reaches any element.
#[derive(Clone)]
pub struct Tensor {
    layout: Layout,
    data: Box<[f32]>,
}

/// A borrowed view into a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    layout: Layout,
    data: &'a [f32],
}

impl Tensor {
    /// Creates an `N`-dimensional tensor of the given shape by calling `f` for each element.
    ///
    /// `f` is invoked with every index vector in row-major order, starting at `[0, ..., 0, 0]`,
    /// then `[0, ..., 0, 1]`, and so on. `f` can choose to use or ignore the index vector.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let layout = Layout::from_shape(&shape);
        let mut index = [0; N];
        let data = (0..layout.elements())
            .map(|linear| {
                unravel(&shape, linear, &mut index);
                f(index)
            })
            .collect();
        Self { layout, data }
    }

    /// Creates a tensor with a dynamic number of dimensions.
    pub fn from_dyn_shape_fn<F: FnMut(&[usize]) -> f32>(shape: &[usize], mut f: F) -> Self {
        let layout = Layout::from_shape(shape);
        let mut index = vec![0; shape.len()];
        let data = (0..layout.elements())
            .map(|linear| {
                unravel(shape, linear, &mut index);
                f(&index)
            })
            .collect();
        Self { layout, data }
    }

    /// Creates a tensor of the given shape by pulling elements from an iterator.
    ///
    /// # Panics
    ///
    /// `iter` must yield exactly as many elements as `shape` requires (the product of all of its
    /// entries), otherwise this method will panic.
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let layout = Layout::from_shape(shape);
        let data: Box<_> = iter.into_iter().collect();
        assert_eq!(data.len(), layout.elements());
        Self { layout, data }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> Self {
        let data = tract.as_slice::<f32>().unwrap();
        Self {
            layout: Layout::from_shape(tract.shape()),
            data: data.into(),
        }
    }

    pub(super) fn to_tract(&self) -> tract_onnx::prelude::Tensor {
        tract_onnx::prelude::Tensor::from_shape(self.shape(), &self.data).unwrap()
    }

    /// Returns the shape of this tensor.
    ///
    /// A tensor's shape is the number of entries in each dimension.
    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    /// Returns the number of dimensions of this tensor.
    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    /// Indexes a prefix of the tensor's dimensions with `indices`.
    ///
    /// For an example, consider a tensor of shape `[2, 3, 4, 5]`. Indexing it with 2 indices
    /// `[a, b]` will return a view of shape `[4, 5]`, while indexing it with 4 indices
    /// `[a, b, c, d]` will return a view of shape `[]` (aka a single value). Indexing with zero
    /// indices (`[]`) is also permitted and returns a view of the whole tensor.
    ///
    /// # Panics
    ///
    /// This method will panic if `indices` has more entries than `self` has dimensions, or if any
    /// index is out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        TensorView {
            layout: self.layout.suffix(N),
            data: index_impl(&self.layout, &self.data, &indices),
        }
    }

    /// Iterates over the outermost dimension of this tensor.
    ///
    /// For example, iterating over a tensor with shape `[3, 4, 5]` yields 3 [`TensorView`]s of
    /// shape `[4, 5]`.
    ///
    /// # Panics
    ///
    /// `self` must have at least one dimension, otherwise this method will panic.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        assert!(self.rank() > 0, "cannot iterate over 0-dimensional tensor");
        (0..self.shape()[0]).map(|index| self.index([index]))
    }

    /// Returns the values stored in a 1-dimensional tensor as a slice.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension, otherwise this method panics.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(
            self.rank(),
            1,
            "`as_slice` requires a 1-dimensional tensor (shape is {:?})",
            self.shape()
        );
        &self.data
    }

    /// Returns the value stored in a 0-dimensional tensor.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions, otherwise this method will panic.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "`as_singular` requires a 0-dimensional tensor (shape is {:?})",
            self.shape()
        );
        self.data[0]
    }
}

#[track_caller]
fn index_impl<'a>(layout: &Layout, mut data: &'a [f32], indices: &[usize]) -> &'a [f32] {
    assert!(
        indices.len() <= layout.rank(),
        "cannot index tensor of shape {:?} with {:?}",
        &layout.shape[..],
        indices
    );

    for ((&size, &stride), &index) in layout.shape.iter().zip(&layout.strides).zip(indices) {
        assert!(
            index < size,
            "index {:?} out of bounds for tensor of shape {:?}",
            indices,
            &layout.shape[..]
        );
        data = &data[index * stride..(index + 1) * stride];
    }
    data
}

impl From<f32> for Tensor {
    fn from(value: f32) -> Self {
        Tensor::from_iter(&[], [value])
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(arr: [f32; N]) -> Self {
        Tensor::from_iter(&[N], arr)
    }
}

impl<'d> TensorView<'d> {
    /// Returns the shape of this tensor view.
    ///
    /// The shape is the number of entries in each dimension.
    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    /// Returns the number of dimensions of this tensor view.
    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    /// Indexes a prefix of the tensor view's dimensions with `indices`.
    ///
    /// Behaves like [`Tensor::index`].
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'d> {
        TensorView {
            layout: self.layout.suffix(N),
            data: index_impl(&self.layout, self.data, &indices),
        }
    }

    /// Iterates over the outermost dimension of this tensor view.
    ///
    /// Behaves like [`Tensor::iter`].
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        assert!(self.rank() > 0, "cannot iterate over 0-dimensional view");
        (0..self.shape()[0]).map(|index| self.index([index]))
    }

    /// Returns the values stored in a 1-dimensional view as a slice.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension, otherwise this method panics.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(
            self.rank(),
            1,
            "`as_slice` requires a 1-dimensional view (shape is {:?})",
            self.shape()
        );
        self.data
    }

    /// Returns the value stored in a 0-dimensional view.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions, otherwise this method will panic.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "`as_singular` requires a 0-dimensional view (shape is {:?})",
            self.shape()
        );
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .finish()
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorView")
            .field("shape", &self.shape())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_order_is_row_major() {
        let mut expected = [
            [0, 0, 0],
            [0, 0, 1],
            [0, 1, 0],
            [0, 1, 1],
            [1, 0, 0],
            [1, 0, 1],
        ]
        .into_iter();

        let tensor = Tensor::from_array_shape_fn([2, 2, 2], |index| {
            assert_eq!(expected.next(), Some(index));
            0.0
        });
        assert_eq!(tensor.shape(), &[2, 2, 2]);
        assert!(expected.next().is_none());

        let mut count = 0;
        let tensor = Tensor::from_dyn_shape_fn(&[3, 2], |index| {
            assert_eq!(index.len(), 2);
            count += 1;
            0.0
        });
        assert_eq!(count, 6);
        assert_eq!(tensor.rank(), 2);
    }

    #[test]
    fn zero_sized_dimension() {
        let tensor = Tensor::from_array_shape_fn([2, 0, 4], |idx| unreachable!("{idx:?}"));
        assert_eq!(tensor.shape(), &[2, 0, 4]);
        assert_eq!(tensor.iter().count(), 2);
        assert_eq!(tensor.index([1]).iter().count(), 0);
    }

    #[test]
    fn singular_tensor() {
        let tensor = Tensor::from(7.5);
        assert_eq!(tensor.rank(), 0);
        assert_eq!(tensor.shape(), &[] as &[usize]);
        assert_eq!(tensor.as_singular(), 7.5);

        // indexing with `[]` is a no-op
        assert_eq!(tensor.index([]).as_singular(), 7.5);
    }

    #[test]
    fn indexing_peels_dimensions() {
        let tensor = Tensor::from_iter(&[2, 2, 2], (0..8).map(|i| i as f32));

        let half = tensor.index([1]);
        assert_eq!(half.shape(), &[2, 2]);

        let row = half.index([0]);
        assert_eq!(row.as_slice(), &[4.0, 5.0]);

        // multi-index straight from the tensor
        assert_eq!(tensor.index([0, 1]).as_slice(), &[2.0, 3.0]);
        assert_eq!(tensor.index([1, 1, 0]).as_singular(), 6.0);
    }

    #[test]
    fn one_dimensional_access() {
        let array = Tensor::from([4.0, 5.0, 6.0]);
        assert_eq!(array.shape(), &[3]);
        assert_eq!(array.as_slice(), &[4.0, 5.0, 6.0]);
        assert_eq!(array.index([2]).as_singular(), 6.0);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_index_panics() {
        let tensor = Tensor::from([1.0, 2.0]);
        tensor.index([2]);
    }
}
