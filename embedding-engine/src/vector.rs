use trend_core::EmbeddingError;

/// Euclidean (L2) distance between two vectors of equal length.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Coordinate-wise mean of a non-empty set of equal-length vectors.
pub fn mean_vector(vectors: &[&[f32]]) -> Vec<f32> {
    if vectors.is_empty() {
        return Vec::new();
    }

    let dim = vectors[0].len();
    let count = vectors.len() as f32;
    let mut mean = vec![0.0f32; dim];

    for vector in vectors {
        for (slot, &value) in mean.iter_mut().zip(vector.iter()) {
            *slot += value;
        }
    }

    for slot in &mut mean {
        *slot /= count;
    }

    mean
}

/// Checks a provider's output: one finite vector per input, all of one dimension.
///
/// Returns the shared dimension.
pub fn check_embeddings(
    embeddings: &[Vec<f32>],
    expected_count: usize,
) -> Result<usize, EmbeddingError> {
    if embeddings.len() != expected_count {
        return Err(EmbeddingError::CountMismatch {
            expected: expected_count,
            actual: embeddings.len(),
        });
    }

    let dim = embeddings.first().map(Vec::len).unwrap_or(0);
    for (index, vector) in embeddings.iter().enumerate() {
        if vector.len() != dim || dim == 0 {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite { index });
        }
    }

    Ok(dim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.5, -2.0], &[1.5, -2.0]), 0.0);
    }

    #[test]
    fn test_mean_vector() {
        let a = [1.0, 2.0, 3.0];
        let b = [3.0, 2.0, 1.0];
        assert_eq!(mean_vector(&[&a, &b]), vec![2.0, 2.0, 2.0]);
        assert!(mean_vector(&[]).is_empty());
    }

    #[test]
    fn test_check_embeddings_rejects_bad_shapes() {
        let good = vec![vec![0.1, 0.2], vec![0.3, 0.4]];
        assert_eq!(check_embeddings(&good, 2).unwrap(), 2);

        assert!(matches!(
            check_embeddings(&good, 3),
            Err(EmbeddingError::CountMismatch {
                expected: 3,
                actual: 2
            })
        ));

        let ragged = vec![vec![0.1, 0.2], vec![0.3]];
        assert!(matches!(
            check_embeddings(&ragged, 2),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));

        let nan = vec![vec![0.1, f32::NAN]];
        assert!(matches!(
            check_embeddings(&nan, 1),
            Err(EmbeddingError::NonFinite { index: 0 })
        ));
    }
}
