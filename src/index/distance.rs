//! Vector distance kernels shared by the HNSW graph and citation scoring.

/// Euclidean norm of `v`.
pub fn magnitude(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0;
    let mut left = a.chunks_exact(4);
    let mut right = b.chunks_exact(4);

    for (x, y) in left.by_ref().zip(right.by_ref()) {
        let d0 = x[0] - y[0];
        let d1 = x[1] - y[1];
        let d2 = x[2] - y[2];
        let d3 = x[3] - y[3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
    }
    for (x, y) in left.remainder().iter().zip(right.remainder()) {
        let d = x - y;
        sum += d * d;
    }

    sum
}

/// Cosine similarity in `[-1, 1]`; zero when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let ma = magnitude(a);
    let mb = magnitude(b);
    if ma == 0.0 || mb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (ma * mb)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0;
    let mut left = a.chunks_exact(4);
    let mut right = b.chunks_exact(4);

    for (x, y) in left.by_ref().zip(right.by_ref()) {
        sum += x[0] * y[0] + x[1] * y[1] + x[2] * y[2] + x[3] * y[3];
    }
    for (x, y) in left.remainder().iter().zip(right.remainder()) {
        sum += x * y;
    }

    sum
}
