//! Condition evaluators gating `WaitFor*` actions.
//!
//! Provides:
//! - pure predicates over captured pixel buffers (pixel, area metric,
//!   template correlation, text matching)
//! - [`Probe`], one resolved condition that captures and evaluates itself

use crate::ports::{PixelBuffer, ScreenCapture, TextRecognizer};
use crate::{AbsRect, AreaMetric, Color, CompareOp, TextMatchMode};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// True when the first pixel of `image` is within `tolerance` of `target`
/// on every channel.
pub fn pixel_matches(image: &PixelBuffer, target: Color, tolerance: u8) -> bool {
    if image.width() == 0 || image.height() == 0 {
        return false;
    }
    let p = image.get_pixel(0, 0);
    Color::new(p[0], p[1], p[2]).within(&target, tolerance)
}

fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Region metric, `None` for an empty region.
pub fn area_metric(image: &PixelBuffer, metric: AreaMetric) -> Option<f64> {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return None;
    }

    let total: f64 = image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            match metric {
                AreaMetric::AvgBrightness => luma(r, g, b),
                AreaMetric::ChannelDiff => (r.max(g).max(b) - r.min(g).min(b)) as f64,
            }
        })
        .sum();

    Some(total / count as f64)
}

pub fn area_satisfied(image: &PixelBuffer, metric: AreaMetric, op: CompareOp, threshold: f64) -> bool {
    area_metric(image, metric)
        .map(|value| op.evaluate(value, threshold))
        .unwrap_or(false)
}

/// Best template location, relative to the searched image's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x: u32,
    pub y: u32,
    pub score: f64,
}

/// Largest downscale step of the coarse pass.
const MAX_PYRAMID_FACTOR: usize = 16;
/// Shortest template side left after downscaling.
const MIN_COARSE_SIDE: usize = 6;
/// Coarse peaks refined at full resolution.
const COARSE_CANDIDATES: usize = 4;
/// Per-pixel variance below which a patch counts as flat.
const FLAT_VARIANCE: f64 = 1e-4;

/// Luma plane, offset to be centered on zero.
struct Gray {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Gray {
    fn from_rgb(image: &PixelBuffer) -> Self {
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data: image.pixels().map(|p| luma(p[0], p[1], p[2]) - 128.0).collect(),
        }
    }

    /// Box-filtered copy, `factor` pixels per side per output pixel.
    fn downscale(&self, factor: usize) -> Self {
        let (width, height) = (self.width / factor, self.height / factor);
        let area = (factor * factor) as f64;
        let mut data = vec![0.0; width * height];
        for y in 0..height {
            for x in 0..width {
                let mut sum = 0.0;
                for row in 0..factor {
                    let start = (y * factor + row) * self.width + x * factor;
                    sum += self.data[start..start + factor].iter().sum::<f64>();
                }
                data[y * width + x] = sum / area;
            }
        }
        Self {
            width,
            height,
            data,
        }
    }
}

/// Summed-area tables of values and squared values, so the mean and
/// variance of any window cost four lookups each.
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl Integral {
    fn new(image: &Gray) -> Self {
        let stride = image.width + 1;
        let mut sum = vec![0.0; stride * (image.height + 1)];
        let mut sq = vec![0.0; stride * (image.height + 1)];
        for y in 0..image.height {
            let (mut row_sum, mut row_sq) = (0.0, 0.0);
            for x in 0..image.width {
                let v = image.data[y * image.width + x];
                row_sum += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row_sum;
                sq[i] = sq[i - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let at = |table: &[f64]| {
            let (a, b) = (y * self.stride + x, y * self.stride + x + w);
            let (c, d) = ((y + h) * self.stride + x, (y + h) * self.stride + x + w);
            table[d] - table[b] - table[c] + table[a]
        };
        (at(&self.sum), at(&self.sq))
    }
}

/// Template plane with its mean removed.
struct Reference {
    width: usize,
    height: usize,
    mean: f64,
    dev: Vec<f64>,
    norm: f64,
    flat: bool,
}

impl Reference {
    fn new(gray: Gray) -> Self {
        let n = gray.data.len() as f64;
        let mean = gray.data.iter().sum::<f64>() / n;
        let dev: Vec<f64> = gray.data.iter().map(|v| v - mean).collect();
        let sq: f64 = dev.iter().map(|d| d * d).sum();
        Self {
            width: gray.width,
            height: gray.height,
            mean,
            dev,
            norm: sq.sqrt(),
            flat: sq / n < FLAT_VARIANCE,
        }
    }
}

/// Zero-mean NCC of `tpl` against the window of `hay` at `(x, y)`.
fn score_at(hay: &Gray, sums: &Integral, tpl: &Reference, x: usize, y: usize) -> f64 {
    let n = (tpl.width * tpl.height) as f64;
    let (sum, sq) = sums.window(x, y, tpl.width, tpl.height);
    let w_mean = sum / n;
    let w_var = (sq - sum * sum / n).max(0.0);
    let w_flat = w_var / n < FLAT_VARIANCE;

    if tpl.flat || w_flat {
        // Flat patches only correlate with an equally flat, equally bright template.
        return if tpl.flat && w_flat && (tpl.mean - w_mean).abs() < 1.0 {
            1.0
        } else {
            0.0
        };
    }

    // The template deviations sum to zero, so the window mean drops out.
    let mut cross = 0.0;
    for row in 0..tpl.height {
        let start = (y + row) * hay.width + x;
        let window = &hay.data[start..start + tpl.width];
        let dev = &tpl.dev[row * tpl.width..(row + 1) * tpl.width];
        cross += window.iter().zip(dev).map(|(v, d)| v * d).sum::<f64>();
    }
    (cross / (tpl.norm * w_var.sqrt())).clamp(-1.0, 1.0)
}

/// Best match over the inclusive window `x0..=x1`, `y0..=y1`.
fn search(
    hay: &Gray,
    sums: &Integral,
    tpl: &Reference,
    (x0, x1): (usize, usize),
    (y0, y1): (usize, usize),
) -> Option<TemplateMatch> {
    let mut best: Option<TemplateMatch> = None;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let score = score_at(hay, sums, tpl, x, y);
            if best.map_or(true, |b| score > b.score) {
                best = Some(TemplateMatch {
                    x: x as u32,
                    y: y as u32,
                    score,
                });
            }
        }
    }
    best
}

/// Highest-scoring coarse positions, at most one per 3x3 neighbourhood.
fn coarse_peaks(hay: &Gray, sums: &Integral, tpl: &Reference, keep: usize) -> Vec<TemplateMatch> {
    let mut peaks: Vec<TemplateMatch> = Vec::with_capacity(keep + 1);
    for y in 0..=(hay.height - tpl.height) {
        for x in 0..=(hay.width - tpl.width) {
            let score = score_at(hay, sums, tpl, x, y);
            let candidate = TemplateMatch {
                x: x as u32,
                y: y as u32,
                score,
            };
            let near = peaks
                .iter()
                .position(|p| p.x.abs_diff(candidate.x) <= 1 && p.y.abs_diff(candidate.y) <= 1);
            match near {
                Some(i) if peaks[i].score < score => peaks[i] = candidate,
                Some(_) => {}
                None if peaks.len() < keep => peaks.push(candidate),
                None => {
                    let worst = peaks
                        .iter()
                        .enumerate()
                        .map(|(i, p)| (i, p.score))
                        .min_by(|a, b| a.1.total_cmp(&b.1));
                    if let Some((i, worst)) = worst {
                        if worst < score {
                            peaks[i] = candidate;
                        }
                    }
                }
            }
        }
    }
    peaks
}

fn pyramid_factor(tw: usize, th: usize) -> usize {
    let mut factor = 1;
    while factor < MAX_PYRAMID_FACTOR && tw.min(th) / (factor * 2) >= MIN_COARSE_SIDE {
        factor *= 2;
    }
    factor
}

/// Zero-mean normalized cross-correlation of `template` over `haystack`.
///
/// Larger templates are first ranked on a box-downscaled copy of both
/// images; the best few coarse peaks are then refined at full resolution
/// within one coarse step. Window means and variances come from summed-area
/// tables, so only the cross term scales with the template size.
///
/// Returns the best-scoring location, or `None` when the template does not
/// fit inside the haystack.
pub fn match_template(haystack: &PixelBuffer, template: &PixelBuffer) -> Option<TemplateMatch> {
    let (hw, hh) = (haystack.width() as usize, haystack.height() as usize);
    let (tw, th) = (template.width() as usize, template.height() as usize);
    if tw == 0 || th == 0 || tw > hw || th > hh {
        return None;
    }

    let hay = Gray::from_rgb(haystack);
    let tpl_gray = Gray::from_rgb(template);
    let sums = Integral::new(&hay);
    let factor = pyramid_factor(tw, th);

    if factor == 1 {
        let tpl = Reference::new(tpl_gray);
        return search(&hay, &sums, &tpl, (0, hw - tw), (0, hh - th));
    }

    let coarse_hay = hay.downscale(factor);
    let coarse_tpl = Reference::new(tpl_gray.downscale(factor));
    let coarse_sums = Integral::new(&coarse_hay);
    let peaks = coarse_peaks(&coarse_hay, &coarse_sums, &coarse_tpl, COARSE_CANDIDATES);

    let tpl = Reference::new(tpl_gray);
    let span = |coarse: u32, limit: usize| {
        let center = coarse as usize * factor;
        (center.saturating_sub(factor).min(limit), (center + factor).min(limit))
    };
    peaks
        .iter()
        .filter_map(|peak| {
            search(&hay, &sums, &tpl, span(peak.x, hw - tw), span(peak.y, hh - th))
        })
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

/// Compiled text pattern.
#[derive(Debug, Clone)]
pub struct TextMatcher {
    mode: TextMatchMode,
    needle: String,
    regex: Option<Regex>,
}

impl TextMatcher {
    pub fn new(pattern: &str, mode: TextMatchMode) -> Result<Self, regex::Error> {
        let regex = match mode {
            TextMatchMode::Regex => Some(
                RegexBuilder::new(pattern.trim())
                    .case_insensitive(true)
                    .build()?,
            ),
            _ => None,
        };
        Ok(Self {
            mode,
            needle: pattern.trim().to_lowercase(),
            regex,
        })
    }

    pub fn matches(&self, recognized: &str) -> bool {
        let text = recognized.trim();
        match (&self.mode, &self.regex) {
            (TextMatchMode::Contains, _) => text.to_lowercase().contains(&self.needle),
            (TextMatchMode::Exact, _) => text.to_lowercase() == self.needle,
            (TextMatchMode::Regex, Some(re)) => re.is_match(text),
            (TextMatchMode::Regex, None) => false,
        }
    }
}

/// A wait condition with every coordinate already resolved to absolute pixels.
#[derive(Debug, Clone)]
pub(crate) enum Probe<'a> {
    Pixel {
        monitor: u32,
        x: i32,
        y: i32,
        color: Color,
        tolerance: u8,
    },
    Area {
        monitor: u32,
        rect: AbsRect,
        metric: AreaMetric,
        op: CompareOp,
        threshold: f64,
    },
    Template {
        monitor: u32,
        rect: AbsRect,
        template: &'a PixelBuffer,
        threshold: f64,
    },
    Text {
        monitor: u32,
        rect: AbsRect,
        matcher: &'a TextMatcher,
    },
}

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProbeResult {
    /// Condition holds; templates report the absolute match center.
    Met(Option<(i32, i32)>),
    NotMet,
    /// Capture failed this poll; counts as not met.
    CaptureFailed(String),
}

impl Probe<'_> {
    pub(crate) fn evaluate(&self, capture: &dyn ScreenCapture, ocr: &dyn TextRecognizer) -> ProbeResult {
        let (monitor, rect) = match self {
            Probe::Pixel { monitor, x, y, .. } => (*monitor, AbsRect::new(*x, *y, 1, 1)),
            Probe::Area { monitor, rect, .. }
            | Probe::Template { monitor, rect, .. }
            | Probe::Text { monitor, rect, .. } => (*monitor, *rect),
        };

        let image = match capture.capture_region(monitor, rect) {
            Ok(image) => image,
            Err(e) => {
                debug!(error = %e, "capture failed, treating as not met");
                return ProbeResult::CaptureFailed(e.to_string());
            }
        };

        let met = match self {
            Probe::Pixel {
                color, tolerance, ..
            } => pixel_matches(&image, *color, *tolerance),
            Probe::Area {
                metric,
                op,
                threshold,
                ..
            } => area_satisfied(&image, *metric, *op, *threshold),
            Probe::Template {
                template,
                threshold,
                rect,
                ..
            } => {
                return match match_template(&image, template) {
                    Some(m) if m.score >= *threshold => {
                        let cx = rect.left + (m.x + template.width() / 2) as i32;
                        let cy = rect.top + (m.y + template.height() / 2) as i32;
                        debug!(score = m.score, cx, cy, "template matched");
                        ProbeResult::Met(Some((cx, cy)))
                    }
                    Some(m) => {
                        debug!(score = m.score, "template below threshold");
                        ProbeResult::NotMet
                    }
                    None => ProbeResult::NotMet,
                };
            }
            Probe::Text { matcher, .. } => match ocr.recognize(&image) {
                Ok(text) => {
                    debug!(%text, "recognized");
                    matcher.matches(&text)
                }
                Err(e) => {
                    debug!(error = %e, "recognition failed, treating as not met");
                    false
                }
            },
        };

        if met {
            ProbeResult::Met(None)
        } else {
            ProbeResult::NotMet
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortError;
    use image::{Rgb, RgbImage};

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> PixelBuffer {
        RgbImage::from_pixel(w, h, Rgb(rgb))
    }

    #[test]
    fn test_pixel_match_tolerance_per_channel() {
        let red = Color::new(255, 0, 0);
        assert!(pixel_matches(&solid(1, 1, [250, 5, 5]), red, 10));
        assert!(!pixel_matches(&solid(1, 1, [200, 0, 0]), red, 10));
        assert!(!pixel_matches(&solid(0, 0, [255, 0, 0]), red, 10));
    }

    #[test]
    fn test_area_brightness() {
        let black = solid(8, 8, [0, 0, 0]);
        assert_eq!(area_metric(&black, AreaMetric::AvgBrightness), Some(0.0));
        assert!(area_satisfied(&black, AreaMetric::AvgBrightness, CompareOp::Lt, 50.0));
        assert!(!area_satisfied(&black, AreaMetric::AvgBrightness, CompareOp::Gt, 10.0));

        let white = solid(4, 4, [255, 255, 255]);
        let v = area_metric(&white, AreaMetric::AvgBrightness).unwrap();
        assert!((v - 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_area_channel_diff() {
        let mut img = solid(2, 1, [10, 10, 10]);
        img.put_pixel(1, 0, Rgb([200, 50, 100]));
        // (0 + 150) / 2
        assert_eq!(area_metric(&img, AreaMetric::ChannelDiff), Some(75.0));
        assert!(area_satisfied(&img, AreaMetric::ChannelDiff, CompareOp::Eq, 75.0));
    }

    fn checker(w: u32, h: u32) -> PixelBuffer {
        RgbImage::from_fn(w, h, |x, y| {
            let v = ((x * x * 7 + y * 13 + x * y * 3) % 251) as u8;
            Rgb([v, v.wrapping_mul(3), 255 - v])
        })
    }

    #[test]
    fn test_template_found_at_exact_location() {
        let hay = checker(40, 30);
        let tpl = image::imageops::crop_imm(&hay, 12, 7, 8, 6).to_image();
        let m = match_template(&hay, &tpl).unwrap();
        assert_eq!((m.x, m.y), (12, 7));
        assert!(m.score > 0.999);
    }

    /// Full-HD gradient with one 64x64 block of 16px checker cells at
    /// `(1301, 677)`, off the coarse grid on both axes.
    fn desktop() -> (PixelBuffer, PixelBuffer) {
        let (ox, oy) = (1301u32, 677u32);
        let hay = RgbImage::from_fn(1920, 1080, |x, y| {
            if (ox..ox + 64).contains(&x) && (oy..oy + 64).contains(&y) {
                let cell = ((x - ox) / 16 + (y - oy) / 16) % 2;
                let v = if cell == 0 { 30 } else { 220 };
                Rgb([v, v / 2, 255 - v])
            } else {
                Rgb([(x * 255 / 1920) as u8, (y * 255 / 1080) as u8, 96])
            }
        });
        let tpl = image::imageops::crop_imm(&hay, ox, oy, 64, 64).to_image();
        (hay, tpl)
    }

    #[test]
    fn test_template_full_monitor_poll_is_fast() {
        let (hay, tpl) = desktop();
        let started = std::time::Instant::now();
        let m = match_template(&hay, &tpl).unwrap();
        let took = started.elapsed();

        assert_eq!((m.x, m.y), (1301, 677));
        assert!(m.score > 0.999);
        assert!(
            took < std::time::Duration::from_millis(500),
            "one full-monitor poll took {took:?}"
        );
    }

    #[test]
    fn test_template_near_edge_is_refined() {
        let hay = RgbImage::from_fn(300, 200, |x, y| {
            let (bx, by) = (x / 10, y / 10);
            let v = ((bx * bx * 7 + by * 13 + bx * by * 3) % 251) as u8;
            Rgb([v, 255 - v, v / 3])
        });
        let tpl = image::imageops::crop_imm(&hay, 267, 171, 33, 29).to_image();
        let m = match_template(&hay, &tpl).unwrap();
        assert_eq!((m.x, m.y), (267, 171));
        assert!(m.score > 0.999);
    }

    #[test]
    fn test_template_larger_than_region() {
        assert!(match_template(&checker(4, 4), &checker(8, 8)).is_none());
    }

    #[test]
    fn test_text_match_modes() {
        let matches = |text: &str, pattern: &str, mode| {
            TextMatcher::new(pattern, mode).unwrap().matches(text)
        };
        assert!(matches("  Loading Complete \n", "complete", TextMatchMode::Contains));
        assert!(matches("  Ready ", "READY", TextMatchMode::Exact));
        assert!(!matches("Ready now", "ready", TextMatchMode::Exact));
        assert!(matches("Score: 42", r"score:\s*\d+", TextMatchMode::Regex));
        assert!(!matches("Score: none", r"score:\s*\d+", TextMatchMode::Regex));
        assert!(TextMatcher::new("(", TextMatchMode::Regex).is_err());
    }

    struct FixedCapture(Result<PixelBuffer, PortError>);

    impl ScreenCapture for FixedCapture {
        fn capture_region(&self, _monitor: u32, _rect: AbsRect) -> Result<PixelBuffer, PortError> {
            self.0.clone()
        }
    }

    struct FailingOcr;

    impl TextRecognizer for FailingOcr {
        fn recognize(&self, _image: &PixelBuffer) -> Result<String, PortError> {
            Err(PortError::RecognitionFailed("service down".into()))
        }
    }

    #[test]
    fn test_probe_failures_are_not_met() {
        let capture = FixedCapture(Err(PortError::CaptureUnavailable("no display".into())));
        let probe = Probe::Pixel {
            monitor: 1,
            x: 0,
            y: 0,
            color: Color::default(),
            tolerance: 0,
        };
        assert!(matches!(
            probe.evaluate(&capture, &FailingOcr),
            ProbeResult::CaptureFailed(_)
        ));

        let capture = FixedCapture(Ok(solid(4, 4, [0, 0, 0])));
        let matcher = TextMatcher::new("ok", TextMatchMode::Contains).unwrap();
        let probe = Probe::Text {
            monitor: 1,
            rect: AbsRect::new(0, 0, 4, 4),
            matcher: &matcher,
        };
        assert_eq!(probe.evaluate(&capture, &FailingOcr), ProbeResult::NotMet);
    }

    #[test]
    fn test_probe_template_reports_absolute_center() {
        let hay = checker(40, 30);
        let tpl = image::imageops::crop_imm(&hay, 12, 7, 8, 6).to_image();
        let capture = FixedCapture(Ok(hay));
        let probe = Probe::Template {
            monitor: 1,
            rect: AbsRect::new(100, 200, 40, 30),
            template: &tpl,
            threshold: 0.9,
        };
        assert_eq!(
            probe.evaluate(&capture, &FailingOcr),
            ProbeResult::Met(Some((100 + 12 + 4, 200 + 7 + 3)))
        );
    }
}
