//! Gaussian impulse kernel shared by both backends.

/// Converts the configured splat radius into kernel units, widening it on
/// landscape surfaces so the blob keeps its on-screen size.
pub fn corrected_radius(splat_radius: f32, aspect: f32) -> f32 {
    let radius = splat_radius / 100.0;
    if aspect > 1.0 {
        radius * aspect
    } else {
        radius
    }
}

/// Kernel weight at texture coordinate `uv` for a splat centred on `point`.
///
/// The horizontal offset is scaled by `aspect` so that the footprint is
/// circular in surface pixels rather than in texture space.
pub fn splat_weight(uv: [f32; 2], point: [f32; 2], radius: f32, aspect: f32) -> f32 {
    let px = (uv[0] - point[0]) * aspect;
    let py = uv[1] - point[1];
    (-(px * px + py * py) / radius).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_is_widened_only_for_landscape() {
        assert!((corrected_radius(0.25, 1.0) - 0.0025).abs() < 1e-7);
        assert!((corrected_radius(0.25, 0.5) - 0.0025).abs() < 1e-7);
        assert!((corrected_radius(0.25, 2.0) - 0.005).abs() < 1e-7);
    }

    #[test]
    fn weight_is_one_at_centre_and_decays() {
        let point = [0.5, 0.5];
        assert_eq!(splat_weight(point, point, 0.01, 1.0), 1.0);
        let near = splat_weight([0.52, 0.5], point, 0.01, 1.0);
        let far = splat_weight([0.6, 0.5], point, 0.01, 1.0);
        assert!(near > far && far > 0.0);
    }

    #[test]
    fn square_surface_is_rotationally_symmetric() {
        let point = [0.4, 0.6];
        let r = 0.003;
        let d = 0.05;
        let right = splat_weight([point[0] + d, point[1]], point, r, 1.0);
        let up = splat_weight([point[0], point[1] - d], point, r, 1.0);
        let diagonal = splat_weight(
            [point[0] + d / 2f32.sqrt(), point[1] + d / 2f32.sqrt()],
            point,
            r,
            1.0,
        );
        assert!((right - up).abs() < 1e-6);
        assert!((right - diagonal).abs() < 1e-5);
    }

    #[test]
    fn landscape_footprint_is_circular_in_pixels() {
        let aspect = 2.0;
        let point = [0.5, 0.5];
        let r = corrected_radius(0.25, aspect);
        // One texture unit horizontally spans twice the pixels of one vertical unit.
        let horizontal = splat_weight([0.5 + 0.02, 0.5], point, r, aspect);
        let vertical = splat_weight([0.5, 0.5 + 0.04], point, r, aspect);
        assert!((horizontal - vertical).abs() < 1e-6);
    }
}
