//! One-dimensional convolution with edge-replicated padding, and Gaussian
//! kernel construction.

/// Convolve `data` with `kernel`, producing an output of the same length.
///
/// The input is padded on both sides with its boundary samples by half the
/// kernel width, so a flat signal stays flat through the boundary. The
/// kernel is expected to be pre-normalized.
pub fn convolve_same(data: &[f64], kernel: &[f64]) -> Vec<f64> {
    if data.is_empty() || kernel.is_empty() {
        return data.to_vec();
    }
    let half = kernel.len() / 2;
    let n = data.len();

    let mut padded = Vec::with_capacity(n + 2 * half);
    padded.extend(std::iter::repeat(data[0]).take(half));
    padded.extend_from_slice(data);
    padded.extend(std::iter::repeat(data[n - 1]).take(half));

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| padded[i + k] * w)
                .sum()
        })
        .collect()
}

/// Unit-sum Gaussian kernel of width `sigma` sampled at spacing `de`.
///
/// Half-width is `ceil(5*sigma/de)`, giving better than 1e-6 of the mass
/// inside the window. A non-positive half-width (sigma much smaller than
/// the spacing) degenerates to the identity kernel `[1]`.
pub fn gaussian_kernel(sigma: f64, de: f64) -> Vec<f64> {
    let w = (5.0 * sigma / de).ceil() as i64;
    if w <= 0 {
        return vec![1.0];
    }
    let mut kernel: Vec<f64> = (-w..=w)
        .map(|i| {
            let x = i as f64 * de;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= total;
    }
    kernel
}
