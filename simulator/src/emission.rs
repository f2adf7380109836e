//! Emission model: the 2D intensity pattern the sample produces on the
//! detector entrance, before any instrumental distortion.

use ndarray::Array2;
use shared::algo::fermi::fermi_dirac_curve;
use shared::algo::interp::interp_with_fill;
use shared::algo::special::{elliptical_gaussian_2d, skew_gaussian};

use crate::grid::Grid;

/// 2D emission image on `grid`: each detector row sees the Fermi edge
/// shifted by the energy gradient across the spot, weighted by the spot's
/// spatial profile.
///
/// The interpolation fills are asymmetric on purpose: the left fill clamps
/// to the occupied plateau while the right fill is zero, so shifting never
/// invents occupation above the edge.
pub fn emission_image(grid: &Grid, temp: f64, alpha: f64, sigma_y: f64, gamma_y: f64) -> Array2<f64> {
    let e_axis = grid.e_axis.as_slice().expect("contiguous axis");
    let fd = fermi_dirac_curve(e_axis, temp, 0.0);
    let weights = skew_gaussian(grid.y_axis.as_slice().expect("contiguous axis"), sigma_y, gamma_y);

    let mut image = Array2::zeros((grid.y_steps(), grid.e_steps()));
    for (i, mut row) in image.outer_iter_mut().enumerate() {
        let shift = alpha * grid.y_axis[i];
        let query: Vec<f64> = e_axis.iter().map(|&e| e - shift).collect();
        let shifted = interp_with_fill(&query, e_axis, &fd, Some(fd[0]), Some(0.0))
            .expect("axis and curve lengths match by construction");
        for (j, v) in shifted.iter().enumerate() {
            row[j] = v * weights[i];
        }
    }
    image
}

/// Spot profile on `grid`: elliptical skew-Gaussian of the source in the
/// energy/position plane, unrotated, normalized to unit total intensity.
pub fn spot_profile(
    grid: &Grid,
    sigma_source_ev: f64,
    sigma_y: f64,
    gamma_x: f64,
    gamma_y: f64,
) -> Array2<f64> {
    let (e_mesh, y_mesh) = grid.meshgrid();
    elliptical_gaussian_2d(
        &e_mesh.view(),
        &y_mesh.view(),
        sigma_source_ev,
        sigma_y,
        gamma_x,
        gamma_y,
        0.0,
    )
}
