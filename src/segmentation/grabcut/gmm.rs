use ndarray::Array1;

use crate::error::SegmentError;
use crate::segmentation::types::{COMPONENTS, MODEL_LEN};

pub type Color = [f64; 3];
type Matrix = [[f64; 3]; 3];

const KMEANS_ITERATIONS: usize = 10;

// Added to the covariance diagonal when it is (nearly) singular.
const SINGULAR_FIX: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default)]
struct Component {
    weight: f64,
    mean: Color,
    cov: Matrix,
    inverse: Matrix,
    det: f64,
}

impl Component {
    fn density(&self, color: Color) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let d = [
            color[0] - self.mean[0],
            color[1] - self.mean[1],
            color[2] - self.mean[2],
        ];
        let mut mahalanobis = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                mahalanobis += d[i] * self.inverse[i][j] * d[j];
            }
        }
        (-0.5 * mahalanobis).exp() / self.det.sqrt()
    }

    fn invert(&mut self, singular_fix: f64) -> Result<(), SegmentError> {
        let mut det = determinant(&self.cov);
        if det <= 1e-6 && singular_fix > 0.0 {
            for i in 0..3 {
                self.cov[i][i] += singular_fix;
            }
            det = determinant(&self.cov);
        }
        if det <= f64::EPSILON {
            return Err(SegmentError::EngineFailure(format!(
                "singular colour covariance (det {:e})",
                det
            )));
        }

        let c = &self.cov;
        let inv = 1.0 / det;
        self.inverse = [
            [
                (c[1][1] * c[2][2] - c[1][2] * c[2][1]) * inv,
                -(c[0][1] * c[2][2] - c[0][2] * c[2][1]) * inv,
                (c[0][1] * c[1][2] - c[0][2] * c[1][1]) * inv,
            ],
            [
                -(c[1][0] * c[2][2] - c[1][2] * c[2][0]) * inv,
                (c[0][0] * c[2][2] - c[0][2] * c[2][0]) * inv,
                -(c[0][0] * c[1][2] - c[0][2] * c[1][0]) * inv,
            ],
            [
                (c[1][0] * c[2][1] - c[1][1] * c[2][0]) * inv,
                -(c[0][0] * c[2][1] - c[0][1] * c[2][0]) * inv,
                (c[0][0] * c[1][1] - c[0][1] * c[1][0]) * inv,
            ],
        ];
        self.det = det;
        Ok(())
    }
}

fn determinant(c: &Matrix) -> f64 {
    c[0][0] * (c[1][1] * c[2][2] - c[1][2] * c[2][1]) - c[0][1] * (c[1][0] * c[2][2] - c[1][2] * c[2][0])
        + c[0][2] * (c[1][0] * c[2][1] - c[1][1] * c[2][0])
}

/// Gaussian mixture colour model
#[derive(Debug, Clone)]
pub struct Gmm {
    components: [Component; COMPONENTS],
}

impl Gmm {
    /// True when `params` holds a model written by [`Gmm::store`].
    pub fn is_trained(params: &Array1<f64>) -> bool {
        params.len() == MODEL_LEN && (0..COMPONENTS).any(|ci| params[ci] > 0.0)
    }

    /// Rebuild a model from its flat parameter array.
    ///
    /// Layout: `COMPONENTS` weights, then `3 * COMPONENTS` means, then
    /// `9 * COMPONENTS` covariance entries.
    pub fn load(params: &Array1<f64>) -> Result<Self, SegmentError> {
        if params.len() != MODEL_LEN {
            return Err(SegmentError::EngineFailure(format!(
                "colour model has {} values, expected {}",
                params.len(),
                MODEL_LEN
            )));
        }

        let mut components = [Component::default(); COMPONENTS];
        for (ci, component) in components.iter_mut().enumerate() {
            component.weight = params[ci];
            let mean = COMPONENTS + 3 * ci;
            let cov = 4 * COMPONENTS + 9 * ci;
            for i in 0..3 {
                component.mean[i] = params[mean + i];
                for j in 0..3 {
                    component.cov[i][j] = params[cov + 3 * i + j];
                }
            }
            if component.weight > 0.0 {
                component.invert(0.0)?;
            }
        }
        Ok(Self { components })
    }

    pub fn store(&self, params: &mut Array1<f64>) {
        if params.len() != MODEL_LEN {
            *params = Array1::zeros(MODEL_LEN);
        }
        for (ci, component) in self.components.iter().enumerate() {
            params[ci] = component.weight;
            let mean = COMPONENTS + 3 * ci;
            let cov = 4 * COMPONENTS + 9 * ci;
            for i in 0..3 {
                params[mean + i] = component.mean[i];
                for j in 0..3 {
                    params[cov + 3 * i + j] = component.cov[i][j];
                }
            }
        }
    }

    /// Mixture density at `color`
    pub fn likelihood(&self, color: Color) -> f64 {
        self.components
            .iter()
            .map(|c| c.weight * c.density(color))
            .sum()
    }

    /// Index of the component most likely to have produced `color`
    pub fn which_component(&self, color: Color) -> usize {
        let mut best = 0;
        let mut max = 0.0;
        for (ci, component) in self.components.iter().enumerate() {
            let p = component.density(color);
            if p > max {
                best = ci;
                max = p;
            }
        }
        best
    }

    /// Cluster `samples` with k-means and fit one component per cluster.
    pub fn from_samples(samples: &[Color]) -> Result<Self, SegmentError> {
        let labels = kmeans(samples, COMPONENTS);
        let mut learner = Learner::default();
        for (&ci, &color) in labels.iter().zip(samples) {
            learner.add(ci, color);
        }
        learner.finish()
    }
}

/// Accumulates per-component sample statistics.
#[derive(Debug, Default)]
pub struct Learner {
    sums: [Color; COMPONENTS],
    prods: [Matrix; COMPONENTS],
    counts: [usize; COMPONENTS],
    total: usize,
}

impl Learner {
    pub fn add(&mut self, ci: usize, color: Color) {
        for i in 0..3 {
            self.sums[ci][i] += color[i];
            for j in 0..3 {
                self.prods[ci][i][j] += color[i] * color[j];
            }
        }
        self.counts[ci] += 1;
        self.total += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn finish(self) -> Result<Gmm, SegmentError> {
        if self.total == 0 {
            return Err(SegmentError::EngineFailure(
                "no samples to learn a colour model from".to_string(),
            ));
        }

        let mut components = [Component::default(); COMPONENTS];
        for (ci, component) in components.iter_mut().enumerate() {
            let n = self.counts[ci];
            if n == 0 {
                continue;
            }
            let n = n as f64;
            component.weight = n / self.total as f64;
            for i in 0..3 {
                component.mean[i] = self.sums[ci][i] / n;
            }
            for i in 0..3 {
                for j in 0..3 {
                    component.cov[i][j] =
                        self.prods[ci][i][j] / n - component.mean[i] * component.mean[j];
                }
            }
            component.invert(SINGULAR_FIX)?;
        }
        Ok(Gmm { components })
    }
}

fn distance2(a: Color, b: Color) -> f64 {
    (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
}

/// Deterministic k-means: farthest-point seeding followed by Lloyd iterations.
/// Returns the cluster index of every sample.
fn kmeans(samples: &[Color], k: usize) -> Vec<usize> {
    let mut labels = vec![0; samples.len()];
    if samples.is_empty() {
        return labels;
    }

    let mut centers = vec![samples[0]];
    let mut nearest: Vec<f64> = samples.iter().map(|&s| distance2(s, samples[0])).collect();
    while centers.len() < k {
        let (far, _) = nearest
            .iter()
            .enumerate()
            .fold((0, -1.0), |best, (i, &d)| if d > best.1 { (i, d) } else { best });
        let center = samples[far];
        centers.push(center);
        for (d, &s) in nearest.iter_mut().zip(samples) {
            *d = d.min(distance2(s, center));
        }
    }

    for _ in 0..KMEANS_ITERATIONS {
        let mut changed = false;
        for (label, &s) in labels.iter_mut().zip(samples) {
            let mut best = 0;
            let mut best_d = f64::INFINITY;
            for (ci, &c) in centers.iter().enumerate() {
                let d = distance2(s, c);
                if d < best_d {
                    best = ci;
                    best_d = d;
                }
            }
            if *label != best {
                *label = best;
                changed = true;
            }
        }

        let mut sums = vec![[0.0; 3]; k];
        let mut counts = vec![0usize; k];
        for (&ci, &s) in labels.iter().zip(samples) {
            for i in 0..3 {
                sums[ci][i] += s[i];
            }
            counts[ci] += 1;
        }
        for ci in 0..k {
            if counts[ci] > 0 {
                for i in 0..3 {
                    centers[ci][i] = sums[ci][i] / counts[ci] as f64;
                }
            }
        }

        if !changed {
            break;
        }
    }

    labels
}
