// src/display.rs
//
// Side channel for showing named vectors and matrices. Nothing in assembly,
// labeling or the sweep depends on what a sink does with the data.
//
//  - NullDisplay:    drop everything
//  - ConsoleDisplay: print (truncated) contents, root rank only
//  - PlotDisplay:    PNGs via plotters into a directory
//  - MultiDisplay:   fan out to several sinks

use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::error::{Result, SvmError};
use crate::partition::World;
use crate::sparse::CsrMatrix;
use crate::sweep::SweepRecord;

pub trait DisplaySink {
    fn vector(&mut self, name: &str, data: &[f64]) -> Result<()>;
    fn matrix(&mut self, name: &str, a: &CsrMatrix) -> Result<()>;
    fn scalar(&mut self, name: &str, value: f64) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn vector(&mut self, _name: &str, _data: &[f64]) -> Result<()> {
        Ok(())
    }
    fn matrix(&mut self, _name: &str, _a: &CsrMatrix) -> Result<()> {
        Ok(())
    }
    fn scalar(&mut self, _name: &str, _value: f64) -> Result<()> {
        Ok(())
    }
}

/// Prints to stdout from the root rank; long objects are truncated.
#[derive(Debug)]
pub struct ConsoleDisplay {
    pub world: World,
    /// Maximum vector entries / matrix rows printed.
    pub max_items: usize,
}

impl ConsoleDisplay {
    pub fn new(world: World) -> Self {
        Self {
            world,
            max_items: 16,
        }
    }
}

impl DisplaySink for ConsoleDisplay {
    fn vector(&mut self, name: &str, data: &[f64]) -> Result<()> {
        if !self.world.is_root() {
            return Ok(());
        }
        println!("{} ({} entries)", name, data.len());
        for (i, v) in data.iter().take(self.max_items).enumerate() {
            println!("  [{}] {:.6e}", i, v);
        }
        if data.len() > self.max_items {
            println!("  ... {} more", data.len() - self.max_items);
        }
        Ok(())
    }

    fn matrix(&mut self, name: &str, a: &CsrMatrix) -> Result<()> {
        if !self.world.is_root() {
            return Ok(());
        }
        println!("{} ({} x {}, nnz = {})", name, a.height, a.width, a.nnz());
        for i in 0..a.height.min(self.max_items) {
            let row: Vec<String> = a.row(i).map(|(j, v)| format!("{}:{}", j, v)).collect();
            println!("  row {}: {}", i, row.join(" "));
        }
        if a.height > self.max_items {
            println!("  ... {} more rows", a.height - self.max_items);
        }
        Ok(())
    }

    fn scalar(&mut self, name: &str, value: f64) -> Result<()> {
        if self.world.is_root() {
            println!("{} = {}", name, value);
        }
        Ok(())
    }
}

/// Writes one PNG per displayed object, numbered in display order.
#[derive(Debug)]
pub struct PlotDisplay {
    dir: PathBuf,
    counter: usize,
}

impl PlotDisplay {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, counter: 0 })
    }

    fn next_path(&mut self, name: &str) -> PathBuf {
        let p = self
            .dir
            .join(format!("{:03}_{}.png", self.counter, sanitize_name(name)));
        self.counter += 1;
        p
    }
}

impl DisplaySink for PlotDisplay {
    fn vector(&mut self, name: &str, data: &[f64]) -> Result<()> {
        let path = self.next_path(name);
        save_vector_plot(data, name, &path)
    }

    fn matrix(&mut self, name: &str, a: &CsrMatrix) -> Result<()> {
        let path = self.next_path(name);
        save_sparsity_plot(a, name, &path)
    }

    fn scalar(&mut self, _name: &str, _value: f64) -> Result<()> {
        Ok(())
    }
}

/// Forward every call to each inner sink in turn.
#[derive(Default)]
pub struct MultiDisplay {
    pub sinks: Vec<Box<dyn DisplaySink>>,
}

impl DisplaySink for MultiDisplay {
    fn vector(&mut self, name: &str, data: &[f64]) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.vector(name, data))
    }
    fn matrix(&mut self, name: &str, a: &CsrMatrix) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.matrix(name, a))
    }
    fn scalar(&mut self, name: &str, value: f64) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.scalar(name, value))
    }
}

fn sanitize_name(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn plot_err<E: std::fmt::Display>(e: E) -> SvmError {
    SvmError::Plot {
        reason: e.to_string(),
    }
}

/// Pad a data range so flat or empty data still gets a usable axis.
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    if (hi - lo).abs() < 1e-30 {
        let delta = if hi.abs() < 1e-30 { 1.0 } else { 0.1 * hi.abs() };
        return (lo - delta, hi + delta);
    }
    let margin = 0.1 * (hi - lo);
    (lo - margin, hi + margin)
}

/// Map a value to blue (negative) / white (zero) / red (positive).
fn signed_color(v: f64, max_abs: f64) -> RGBColor {
    let scale = if max_abs > 0.0 { max_abs } else { 1.0 };
    let x = (0.5 + 0.5 * v / scale).clamp(0.0, 1.0);
    let r = (255.0 * x) as u8;
    let b = (255.0 * (1.0 - x)) as u8;
    let g = (255.0 * (1.0 - (2.0 * (x - 0.5).abs()))).clamp(0.0, 255.0) as u8;
    RGBColor(r, g, b)
}

/// Entry value against index.
pub fn save_vector_plot(data: &[f64], title: &str, path: &Path) -> Result<()> {
    let n = data.len().max(1) as f64;
    let (y_min, y_max) = padded_range(data.iter().copied());

    let root = BitMapBackend::new(path, (1024, 512)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(title, ("sans-serif", 24))
        .set_left_and_bottom_label_area_size(60)
        .build_cartesian_2d(0.0..n, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("index")
        .y_desc("value")
        .label_style(("sans-serif", 14))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            data.iter().enumerate().map(|(i, &v)| (i as f64, v)),
            &BLUE,
        ))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// One coloured cell per stored entry; row 0 at the top.
pub fn save_sparsity_plot(a: &CsrMatrix, title: &str, path: &Path) -> Result<()> {
    let w = a.width as i32;
    let h = a.height as i32;
    let max_abs = a.values.iter().fold(0.0f64, |m, v| m.max(v.abs()));

    let root = BitMapBackend::new(path, (800, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(40)
        .caption(
            format!("{} ({} x {}, nnz = {})", title, a.height, a.width, a.nnz()),
            ("sans-serif", 20),
        )
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0..w.max(1), 0..h.max(1))
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("column")
        .y_desc("row (flipped)")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(a.triplets().into_iter().map(|(i, j, v)| {
            let (x, y) = (j as i32, h - 1 - i as i32);
            Rectangle::new([(x, y), (x + 1, y + 1)], signed_color(v, max_abs).filled())
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Solve time against lambda for the successful points of a sweep.
pub fn save_sweep_time_plot(records: &[SweepRecord], path: &Path) -> Result<()> {
    let pts: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| r.elapsed_s().map(|t| (r.lambda, t)))
        .collect();
    if pts.is_empty() {
        return Ok(());
    }
    let (x_min, x_max) = padded_range(pts.iter().map(|p| p.0));
    let (_, y_max) = padded_range(pts.iter().map(|p| p.1));

    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption("SVM solve time vs lambda", ("sans-serif", 30))
        .set_left_and_bottom_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max.max(1e-6))
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("lambda")
        .y_desc("time (s)")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(pts.iter().copied(), &RED))
        .map_err(plot_err)?;
    chart
        .draw_series(pts.iter().map(|&p| Circle::new(p, 4, RED.filled())))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_range_handles_flat_and_empty_data() {
        assert_eq!(padded_range(std::iter::empty()), (-1.0, 1.0));
        let (lo, hi) = padded_range([2.0, 2.0].into_iter());
        assert!(lo < 2.0 && hi > 2.0);
        let (lo, hi) = padded_range([0.0, 10.0].into_iter());
        assert_eq!((lo, hi), (-1.0, 11.0));
    }

    #[test]
    fn signed_color_is_white_at_zero() {
        assert_eq!(signed_color(0.0, 5.0), RGBColor(127, 255, 127));
        assert_eq!(signed_color(5.0, 5.0), RGBColor(255, 0, 0));
        assert_eq!(signed_color(-5.0, 5.0), RGBColor(0, 0, 255));
    }

    #[test]
    fn sanitize_keeps_safe_chars() {
        assert_eq!(sanitize_name("[w;beta;z]"), "_w_beta_z_");
        assert_eq!(sanitize_name("wGen"), "wGen");
    }

    #[test]
    fn null_display_accepts_everything() {
        let mut sink = NullDisplay;
        sink.vector("v", &[1.0]).unwrap();
        sink.matrix("A", &CsrMatrix::zeros(2, 2)).unwrap();
        sink.scalar("s", 1.0).unwrap();
    }
}
