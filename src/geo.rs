//! Distance and geometry primitives.

use thiserror::Error;

use crate::gpx_types::GpxPoint;
use crate::nullable::Nullable;

/// Polar radius of the WGS-84 ellipsoid in metres, used for the spherical
/// approximations.
pub const EARTH_RADIUS: f64 = 6_356_752.314245;

/// Metres per degree of latitude on the sphere above.
pub const ONE_DEGREE: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS / 360.0;

/// Beyond this many degrees of latitude or longitude the planar
/// approximation is replaced by Haversine.
const PLANAR_LIMIT_DEG: f64 = 0.2;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const WGS84_B: f64 = 6_356_752.314245;
const VINCENTY_MAX_ITERATIONS: usize = 130;
/// Change of λ, expressed in metres on the minor axis, below which the
/// iteration stops.
const VINCENTY_CONVERGENCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeoError {
    #[error("Vincenty formula failed to converge (nearly antipodal points)")]
    NoConvergence,
}

/// A speed (m/s) and the distance (m) it was measured over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedAndDistance {
    pub speed: f64,
    pub distance: f64,
}

/// Great-circle distance in metres.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat1 - lat2).to_radians();
    let d_lon = (lon1 - lon2).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + (d_lon / 2.0).sin().powi(2) * lat1.to_radians().cos() * lat2.to_radians().cos();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS * c
}

/// Distance in metres. Nearby points use a flat-earth approximation scaled
/// by the cosine of the first latitude; distant ones (or `haversine = true`)
/// use [`haversine_distance`].
pub fn distance_2d(lat1: f64, lon1: f64, lat2: f64, lon2: f64, haversine: bool) -> f64 {
    if haversine || (lat1 - lat2).abs() > PLANAR_LIMIT_DEG || (lon1 - lon2).abs() > PLANAR_LIMIT_DEG
    {
        return haversine_distance(lat1, lon1, lat2, lon2);
    }
    let coef = lat1.to_radians().cos();
    let x = lat1 - lat2;
    let y = (lon1 - lon2) * coef;
    (x * x + y * y).sqrt() * ONE_DEGREE
}

/// [`distance_2d`] plus the elevation delta when both elevations are known.
pub fn distance_3d(
    (lat1, lon1, ele1): (f64, f64, Nullable<f64>),
    (lat2, lon2, ele2): (f64, f64, Nullable<f64>),
    haversine: bool,
) -> f64 {
    let flat = distance_2d(lat1, lon1, lat2, lon2, haversine);
    match (ele1.value(), ele2.value()) {
        (Some(e1), Some(e2)) if e1 != e2 => (flat * flat + (e1 - e2).powi(2)).sqrt(),
        _ => flat,
    }
}

/// Ellipsoidal (WGS-84) distance in metres by Vincenty's inverse formula.
pub fn vincenty_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<f64, GeoError> {
    let l = (lon2 - lon1).to_radians();
    let u1 = ((1.0 - WGS84_F) * lat1.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * lat2.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = false;
    let (mut sin_sigma, mut cos_sigma, mut sigma) = (0.0, 0.0, 0.0);
    let (mut cos_sq_alpha, mut cos_2sigma_m) = (0.0, 0.0);

    for _ in 0..VINCENTY_MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            // coincident points
            return Ok(0.0);
        }
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            // equatorial line
            0.0
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));
        if (lambda - previous).abs() * WGS84_B < VINCENTY_CONVERGENCE {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(GeoError::NoConvergence);
    }

    let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
    let a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = b
        * sin_sigma
        * (cos_2sigma_m
            + b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                    - b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
    Ok(WGS84_B * a * (sigma - delta_sigma))
}

/// Sum of consecutive 2D distances.
pub fn length_2d(points: &[GpxPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| distance_2d(w[0].lat, w[0].lon, w[1].lat, w[1].lon, false))
        .sum()
}

/// Sum of consecutive 3D distances.
pub fn length_3d(points: &[GpxPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            distance_3d(
                (w[0].lat, w[0].lon, w[0].elevation),
                (w[1].lat, w[1].lon, w[1].elevation),
                false,
            )
        })
        .sum()
}

/// The 95th-percentile speed after discarding samples whose distance lies
/// more than 1.5 deviations from the mean distance. The deviation is the
/// root of the summed squares, not divided by the sample count.
pub fn calc_max_speed(samples: &[SpeedAndDistance]) -> f64 {
    if samples.len() < 3 {
        return 0.0;
    }
    let n = samples.len() as f64;
    let avg = samples.iter().map(|s| s.distance).sum::<f64>() / n;
    let deviation = samples
        .iter()
        .map(|s| (s.distance - avg).powi(2))
        .sum::<f64>()
        .sqrt();

    let mut speeds: Vec<f64> = samples
        .iter()
        .filter(|s| (s.distance - avg).abs() <= deviation * 1.5)
        .map(|s| s.speed)
        .collect();
    if speeds.is_empty() {
        return 0.0;
    }
    speeds.sort_by(f64::total_cmp);
    let idx = ((speeds.len() as f64 * 0.95) as usize).min(speeds.len() - 1);
    speeds[idx]
}

/// Total climb and descent in metres, after 0.3/0.4/0.3 smoothing of every
/// interior elevation whose neighbours are all known.
pub fn calc_uphill_downhill(elevations: &[Nullable<f64>]) -> (f64, f64) {
    let mut smoothed: Vec<Option<f64>> = elevations.iter().map(Nullable::value).collect();
    for i in 1..elevations.len().saturating_sub(1) {
        if let (Some(prev), Some(cur), Some(next)) = (
            elevations[i - 1].value(),
            elevations[i].value(),
            elevations[i + 1].value(),
        ) {
            smoothed[i] = Some(0.3 * prev + 0.4 * cur + 0.3 * next);
        }
    }

    let mut uphill = 0.0;
    let mut downhill = 0.0;
    for w in smoothed.windows(2) {
        if let (Some(a), Some(b)) = (w[0], w[1]) {
            let delta = b - a;
            if delta > 0.0 {
                uphill += delta;
            } else {
                downhill -= delta;
            }
        }
    }
    (uphill, downhill)
}

/// Distance in metres of `point` from the line through `a` and `b`, via
/// Heron's formula on the 2D distances.
pub fn distance_from_line(point: &GpxPoint, a: &GpxPoint, b: &GpxPoint) -> f64 {
    let base = distance_2d(a.lat, a.lon, b.lat, b.lon, false);
    let to_a = distance_2d(a.lat, a.lon, point.lat, point.lon, false);
    if base == 0.0 {
        return to_a;
    }
    let to_b = distance_2d(b.lat, b.lon, point.lat, point.lon, false);
    let s = (base + to_a + to_b) / 2.0;
    2.0 * (s * (s - base) * (s - to_a) * (s - to_b)).abs().sqrt() / base
}

/// `(a, b, c)` with `a·lat + b·lon + c = 0` for the line through both points.
fn line_coefficients(p1: &GpxPoint, p2: &GpxPoint) -> (f64, f64, f64) {
    if p1.lon == p2.lon {
        return (0.0, 1.0, -p1.lon);
    }
    let slope = (p1.lat - p2.lat) / (p1.lon - p2.lon);
    let intercept = p1.lat - p1.lon * slope;
    (1.0, -slope, -intercept)
}

/// Recursive perpendicular-distance simplification. Fewer than three points
/// are returned unchanged.
pub fn simplify_points(points: &[GpxPoint], max_distance: f64) -> Vec<GpxPoint> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let begin = &points[0];
    let end = &points[points.len() - 1];

    // The candidate is picked with a cheap degree-space line; only its real
    // distance is computed in metres.
    let (a, b, c) = line_coefficients(begin, end);
    let mut pivot = 0;
    let mut farthest = f64::NEG_INFINITY;
    for (i, p) in points.iter().enumerate() {
        let d = (a * p.lat + b * p.lon + c).abs();
        if d > farthest {
            farthest = d;
            pivot = i;
        }
    }

    if distance_from_line(&points[pivot], begin, end) <= max_distance {
        return vec![begin.clone(), end.clone()];
    }

    let mut out = simplify_points(&points[..pivot], max_distance);
    out.push(points[pivot].clone());
    out.extend(simplify_points(&points[pivot + 1..], max_distance));
    out
}

/// 0.4/0.2/0.4 weighted average of each interior point's position and its
/// neighbours'. Elevations are untouched.
pub fn smooth_horizontal(points: &[GpxPoint]) -> Vec<GpxPoint> {
    let mut out = points.to_vec();
    for i in 1..points.len().saturating_sub(1) {
        let (prev, cur, next) = (&points[i - 1], &points[i], &points[i + 1]);
        out[i].lat = prev.lat * 0.4 + cur.lat * 0.2 + next.lat * 0.4;
        out[i].lon = prev.lon * 0.4 + cur.lon * 0.2 + next.lon * 0.4;
    }
    out
}

/// Same weights as [`smooth_horizontal`], applied to elevation only.
pub fn smooth_vertical(points: &[GpxPoint]) -> Vec<GpxPoint> {
    let mut out = points.to_vec();
    for i in 1..points.len().saturating_sub(1) {
        if let (Some(prev), Some(cur), Some(next)) = (
            points[i - 1].elevation.value(),
            points[i].elevation.value(),
            points[i + 1].elevation.value(),
        ) {
            out[i].elevation.set(prev * 0.4 + cur * 0.2 + next * 0.4);
        }
    }
    out
}

/// Steepness from `p1` to `p2`, in degrees unless `radians`. Zero when an
/// elevation is missing or the points coincide.
pub fn elevation_angle(p1: &GpxPoint, p2: &GpxPoint, radians: bool) -> f64 {
    let (Some(e1), Some(e2)) = (p1.elevation.value(), p2.elevation.value()) else {
        return 0.0;
    };
    let run = distance_2d(p1.lat, p1.lon, p2.lat, p2.lon, false);
    if run == 0.0 {
        return 0.0;
    }
    let angle = ((e2 - e1) / run).atan();
    if radians { angle } else { angle.to_degrees() }
}

/// Bearing from `p1` to `p2` in `[0, 360)` degrees (or radians), clockwise
/// from north.
pub fn angle_from_north(p1: &GpxPoint, p2: &GpxPoint, radians: bool) -> f64 {
    let coef = p1.lat.to_radians().cos();
    let east = (p2.lon - p1.lon) * coef;
    let north = p2.lat - p1.lat;
    let mut angle = (east / north).atan();
    if north < 0.0 {
        angle += std::f64::consts::PI;
    }
    if angle < 0.0 {
        angle += 2.0 * std::f64::consts::PI;
    }
    if radians { angle } else { angle.to_degrees() }
}
