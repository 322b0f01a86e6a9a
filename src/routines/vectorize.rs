use crate::error::NewtonError;
use ndarray::{s, Array, Array1, Dimension};

/// Flatten an ordered list of tensors into one vector
///
/// Each tensor is read in row-major order and the results are concatenated in
/// input order. [inverse_vectorize] with the same shapes undoes this.
pub fn vectorize<'a, D, I>(tensors: I) -> Array1<f64>
where
    D: Dimension + 'a,
    I: IntoIterator<Item = &'a Array<f64, D>>,
{
    let mut flat = Vec::new();
    for tensor in tensors {
        flat.extend(tensor.iter().copied());
    }
    Array1::from(flat)
}

/// Split a flat vector back into tensors of the given shapes
///
/// Fails with [NewtonError::ShapeMismatch] unless the shapes account for every
/// element of `vector` exactly.
pub fn inverse_vectorize<D: Dimension>(
    vector: &Array1<f64>,
    shapes: &[D],
) -> Result<Vec<Array<f64, D>>, NewtonError> {
    let expected: usize = shapes.iter().map(|shape| shape.size()).sum();
    if expected != vector.len() {
        return Err(NewtonError::ShapeMismatch {
            expected,
            found: vector.len(),
        });
    }

    let mut tensors = Vec::with_capacity(shapes.len());
    let mut offset = 0;
    for shape in shapes {
        let numel = shape.size();
        let values = vector.slice(s![offset..offset + numel]).to_vec();
        let tensor = Array::from_shape_vec(shape.clone(), values)
            .map_err(|e| NewtonError::dimension(e.to_string()))?;
        tensors.push(tensor);
        offset += numel;
    }

    if offset != vector.len() {
        return Err(NewtonError::ShapeMismatch {
            expected: offset,
            found: vector.len(),
        });
    }
    Ok(tensors)
}

/// Euclidean norm
pub fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}
