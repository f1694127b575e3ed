//! Testing utilities for the sitediff workspace
//!
//! Shared fixtures: encoded screenshots, captured pages and variant sets.

#![allow(missing_docs)]

use image::{ImageFormat, Rgba, RgbaImage};
use sitediff_core::{CapturedPage, CompareConfig, PageVariantSet};
use std::io::Cursor;
use std::path::Path;

pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const BLACK: [u8; 4] = [0, 0, 0, 255];

fn encode(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("in-memory PNG encoding");
    bytes.into_inner()
}

/// PNG of a single colour
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode(&RgbaImage::from_pixel(width, height, Rgba(rgba)))
}

/// PNG whose left `split` columns are `left` and the rest `right`
pub fn split_png(width: u32, height: u32, split: u32, left: [u8; 4], right: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, _| {
        if x < split {
            Rgba(left)
        } else {
            Rgba(right)
        }
    });
    encode(&image)
}

/// PNG where the listed pixels are black on a white background
pub fn dotted_png(width: u32, height: u32, dots: &[(u32, u32)]) -> Vec<u8> {
    let mut image = RgbaImage::from_pixel(width, height, Rgba(WHITE));
    for &(x, y) in dots {
        image.put_pixel(x, y, Rgba(BLACK));
    }
    encode(&image)
}

pub fn page(markup: &str, raster: Vec<u8>) -> CapturedPage {
    CapturedPage::new(markup, raster)
}

/// Page with a 4x4 white screenshot
pub fn white_page(markup: &str) -> CapturedPage {
    page(markup, solid_png(4, 4, WHITE))
}

pub fn variant_set<'a>(pages: impl IntoIterator<Item = (&'a str, CapturedPage)>) -> PageVariantSet {
    pages.into_iter().collect()
}

/// Config writing report and artifacts under `dir`
pub fn config_in(dir: &Path) -> CompareConfig {
    CompareConfig::new().with_output_path(dir.join("report.html"))
}

/// Files currently in a directory, sorted by name
pub fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
