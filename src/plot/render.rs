use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use super::table::Spectrogram;
use super::PlotOptions;

/// Room left of and below the plot for the tick marks.
const MARGIN: u32 = 8;
const TICK: u32 = 5;
const BAR_GAP: u32 = 4;
const BAR_WIDTH: u32 = 12;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Jet colour map: dark blue at 0, through cyan, yellow, to dark red at 1.
/// NaN maps to the bottom of the scale.
pub fn jet(t: f64) -> Rgb<u8> {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let channel = |centre: f64| ((1.5 - (4.0 * t - centre).abs()).clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Draws one column per log row and `aspect_ratio` pixel rows per frequency,
/// lowest frequency at the bottom, coloured over `0..=max_db`.
///
/// Frequencies that are multiples of `freq_dist` get a tick on the left edge,
/// every new hour a tick below. A colour bar for the scale sits on the right.
pub fn render(spectrogram: &Spectrogram, opts: &PlotOptions) -> RgbImage {
    let columns = spectrogram.columns() as u32;
    let bins = spectrogram.frequencies.len();
    let plot_height = ((bins as f64 * opts.aspect_ratio).ceil() as u32).max(1);
    let bar_left = MARGIN + columns + BAR_GAP;
    let mut image = RgbImage::from_pixel(bar_left + BAR_WIDTH, plot_height + MARGIN, BACKGROUND);

    for y in 0..plot_height {
        let from_bottom = plot_height - 1 - y;
        let bin = ((from_bottom as f64 / opts.aspect_ratio) as usize).min(bins.saturating_sub(1));
        if let Some(series) = spectrogram.values.get(bin) {
            for (x, &v) in series.iter().enumerate() {
                image.put_pixel(MARGIN + x as u32, y, jet(v / opts.max_db));
            }
        }

        let level = from_bottom as f64 / (plot_height - 1).max(1) as f64;
        for x in bar_left..bar_left + BAR_WIDTH {
            image.put_pixel(x, y, jet(level));
        }
    }

    for (i, &freq) in spectrogram.frequencies.iter().enumerate() {
        if freq % opts.freq_dist != 0 {
            continue;
        }
        let offset = (((i as f64 + 0.5) * opts.aspect_ratio) as u32).min(plot_height - 1);
        let y = plot_height - 1 - offset;
        for x in MARGIN - TICK..MARGIN {
            image.put_pixel(x, y, INK);
        }
    }

    for mark in &spectrogram.hour_marks {
        let x = MARGIN + mark.column as u32;
        for y in plot_height + 1..plot_height + 1 + TICK {
            image.put_pixel(x, y, INK);
        }
    }

    image
}

/// Shrinks the image by `factor` when it lies strictly between 0 and 1.
pub fn downscale(image: RgbImage, factor: f64) -> RgbImage {
    if !(factor > 0.0 && factor < 1.0) {
        return image;
    }
    let width = ((image.width() as f64 * factor) as u32).max(1);
    let height = ((image.height() as f64 * factor) as u32).max(1);
    imageops::resize(&image, width, height, FilterType::Lanczos3)
}
