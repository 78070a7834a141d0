mod gmm;
mod graph;

use gmm::{Color, Gmm, Learner};
use graph::Graph;
use image::RgbImage;
use ndarray::Array2;

use super::types::{Label, LabelMask, ModelState, Seed, SegmentationEngine};
use crate::error::SegmentError;
use crate::geometry::BoundingBox;

/// Colour-model graph cut segmentation
///
/// Each iteration fits a Gaussian mixture to the current background and
/// foreground pixels, then relabels every probable pixel with a min-cut over
/// the 8-connected pixel grid.
pub struct GrabCut {
    // Smoothness weight on neighbour links
    gamma: f64,
}

impl GrabCut {
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }
}

impl Default for GrabCut {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl SegmentationEngine for GrabCut {
    fn segment(
        &mut self,
        image: &RgbImage,
        mask: &mut LabelMask,
        seed: Seed,
        model: &mut ModelState,
        iterations: u32,
    ) -> Result<(), SegmentError> {
        let _span = tracing::debug_span!("grabcut", ?seed, iterations).entered();

        if image.dimensions() != mask.dimensions() {
            return Err(SegmentError::EngineFailure(format!(
                "mask is {:?} but image is {:?}",
                mask.dimensions(),
                image.dimensions()
            )));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(SegmentError::EngineFailure("empty image".to_string()));
        }

        let colors = Array2::from_shape_fn(
            (image.height() as usize, image.width() as usize),
            |(y, x)| {
                let p = image.get_pixel(x as u32, y as u32);
                [p[0] as f64, p[1] as f64, p[2] as f64]
            },
        );

        let (mut background, mut foreground) = match seed {
            Seed::Rect(rect) => {
                init_mask_with_rect(mask, rect);
                init_gmms(&colors, mask)?
            }
            Seed::Mask if Gmm::is_trained(&model.background) && Gmm::is_trained(&model.foreground) => {
                tracing::debug!("Continuing from stored colour models");
                (Gmm::load(&model.background)?, Gmm::load(&model.foreground)?)
            }
            Seed::Mask => init_gmms(&colors, mask)?,
        };

        let beta = calc_beta(&colors);
        let weights = NeighborWeights::new(&colors, beta, self.gamma);
        let lambda = 9.0 * self.gamma;

        for i in 0..iterations {
            let components = assign_components(&colors, mask, &background, &foreground);
            learn_gmms(&colors, mask, &components, &mut background, &mut foreground)?;

            let mut graph = build_graph(&colors, mask, &background, &foreground, &weights, lambda);
            let flow = graph.max_flow();
            estimate_segmentation(&graph, mask);

            tracing::debug!(
                "Iteration {}: flow={:.1}, probable foreground={}",
                i,
                flow,
                mask.count(Label::ProbableForeground)
            );
        }

        background.store(&mut model.background);
        foreground.store(&mut model.foreground);
        Ok(())
    }
}

fn init_mask_with_rect(mask: &mut LabelMask, rect: BoundingBox) {
    mask.labels_mut().fill(Label::Background);
    mask.fill(rect, Label::ProbableForeground);
}

fn is_background(label: Label) -> bool {
    !label.is_foreground()
}

fn init_gmms(colors: &Array2<Color>, mask: &LabelMask) -> Result<(Gmm, Gmm), SegmentError> {
    let mut background = Vec::new();
    let mut foreground = Vec::new();
    for (&color, &label) in colors.iter().zip(mask.labels().iter()) {
        if is_background(label) {
            background.push(color);
        } else {
            foreground.push(color);
        }
    }

    if background.is_empty() || foreground.is_empty() {
        return Err(SegmentError::EngineFailure(format!(
            "need both background and foreground samples, got {} and {}",
            background.len(),
            foreground.len()
        )));
    }

    Ok((Gmm::from_samples(&background)?, Gmm::from_samples(&foreground)?))
}

fn assign_components(
    colors: &Array2<Color>,
    mask: &LabelMask,
    background: &Gmm,
    foreground: &Gmm,
) -> Array2<usize> {
    let mut components = Array2::zeros(colors.raw_dim());
    ndarray::Zip::from(&mut components)
        .and(colors)
        .and(mask.labels())
        .for_each(|ci, &color, &label| {
            *ci = if is_background(label) {
                background.which_component(color)
            } else {
                foreground.which_component(color)
            };
        });
    components
}

/// Refit both models to the current labelling.
///
/// A class the last cut left without pixels keeps its previous model.
fn learn_gmms(
    colors: &Array2<Color>,
    mask: &LabelMask,
    components: &Array2<usize>,
    background: &mut Gmm,
    foreground: &mut Gmm,
) -> Result<(), SegmentError> {
    let mut bg_learner = Learner::default();
    let mut fg_learner = Learner::default();
    ndarray::Zip::from(colors)
        .and(mask.labels())
        .and(components)
        .for_each(|&color, &label, &ci| {
            if is_background(label) {
                bg_learner.add(ci, color);
            } else {
                fg_learner.add(ci, color);
            }
        });

    refit(background, bg_learner, "background")?;
    refit(foreground, fg_learner, "foreground")
}

fn refit(gmm: &mut Gmm, learner: Learner, class: &str) -> Result<(), SegmentError> {
    if learner.is_empty() {
        tracing::debug!("No {} pixels left, keeping previous model", class);
        return Ok(());
    }
    *gmm = learner.finish()?;
    Ok(())
}

fn distance2(a: Color, b: Color) -> f64 {
    (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
}

/// `1 / (2 * mean squared colour difference between neighbours)`
fn calc_beta(colors: &Array2<Color>) -> f64 {
    let (rows, cols) = colors.dim();
    let mut sum = 0.0;
    for ((y, x), &color) in colors.indexed_iter() {
        if x > 0 {
            sum += distance2(color, colors[[y, x - 1]]);
        }
        if y > 0 && x > 0 {
            sum += distance2(color, colors[[y - 1, x - 1]]);
        }
        if y > 0 {
            sum += distance2(color, colors[[y - 1, x]]);
        }
        if y > 0 && x + 1 < cols {
            sum += distance2(color, colors[[y - 1, x + 1]]);
        }
    }

    let links = 4 * cols * rows + 2;
    let border = 3 * cols + 3 * rows;
    if sum <= f64::EPSILON || links <= border {
        return 0.0;
    }
    1.0 / (2.0 * sum / (links - border) as f64)
}

/// Smoothness weights linking each pixel to its already-visited neighbours.
struct NeighborWeights {
    left: Array2<f64>,
    up_left: Array2<f64>,
    up: Array2<f64>,
    up_right: Array2<f64>,
}

impl NeighborWeights {
    fn new(colors: &Array2<Color>, beta: f64, gamma: f64) -> Self {
        let (rows, cols) = colors.dim();
        let diagonal = gamma / 2.0_f64.sqrt();
        let weight = |g: f64, a: Color, b: Color| g * (-beta * distance2(a, b)).exp();

        let mut weights = Self {
            left: Array2::zeros((rows, cols)),
            up_left: Array2::zeros((rows, cols)),
            up: Array2::zeros((rows, cols)),
            up_right: Array2::zeros((rows, cols)),
        };
        for ((y, x), &color) in colors.indexed_iter() {
            if x > 0 {
                weights.left[[y, x]] = weight(gamma, color, colors[[y, x - 1]]);
            }
            if y > 0 && x > 0 {
                weights.up_left[[y, x]] = weight(diagonal, color, colors[[y - 1, x - 1]]);
            }
            if y > 0 {
                weights.up[[y, x]] = weight(gamma, color, colors[[y - 1, x]]);
            }
            if y > 0 && x + 1 < cols {
                weights.up_right[[y, x]] = weight(diagonal, color, colors[[y - 1, x + 1]]);
            }
        }
        weights
    }
}

fn neg_log(p: f64) -> f64 {
    -p.max(f64::MIN_POSITIVE).ln()
}

fn build_graph(
    colors: &Array2<Color>,
    mask: &LabelMask,
    background: &Gmm,
    foreground: &Gmm,
    weights: &NeighborWeights,
    lambda: f64,
) -> Graph {
    let (rows, cols) = colors.dim();
    let mut graph = Graph::new(rows * cols, 5 * rows * cols);

    for ((y, x), &color) in colors.indexed_iter() {
        let v = y * cols + x;

        let (from_source, to_sink) = match mask.labels()[[y, x]] {
            Label::ProbableBackground | Label::ProbableForeground => {
                (neg_log(background.likelihood(color)), neg_log(foreground.likelihood(color)))
            }
            Label::Background => (0.0, lambda),
            Label::Foreground => (lambda, 0.0),
        };
        graph.add_terminal_weights(v, from_source, to_sink);

        if x > 0 {
            let w = weights.left[[y, x]];
            graph.add_edge(v, v - 1, w, w);
        }
        if y > 0 && x > 0 {
            let w = weights.up_left[[y, x]];
            graph.add_edge(v, v - cols - 1, w, w);
        }
        if y > 0 {
            let w = weights.up[[y, x]];
            graph.add_edge(v, v - cols, w, w);
        }
        if y > 0 && x + 1 < cols {
            let w = weights.up_right[[y, x]];
            graph.add_edge(v, v - cols + 1, w, w);
        }
    }

    graph
}

fn estimate_segmentation(graph: &Graph, mask: &mut LabelMask) {
    let cols = mask.width() as usize;
    for ((y, x), label) in mask.labels_mut().indexed_iter_mut() {
        if !label.is_definite() {
            *label = if graph.in_source_segment(y * cols + x) {
                Label::ProbableForeground
            } else {
                Label::ProbableBackground
            };
        }
    }
}
