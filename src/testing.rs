//! Fixtures and hand-written fakes shared by unit tests.

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};

use crate::book::{ArtStyle, Difficulty, Edition, Order};
use crate::delivery::{Delivery, DeliveryError, DeliveryNotifier};
use crate::synthesis::{ImageSynthesizer, SynthesisError};

/// Small valid PNG with a diagonal stroke
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for i in 0..width.min(height) {
        image.put_pixel(i, i, Rgb([0, 0, 0]));
    }

    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

pub fn sample_order(reference: &str, total_pages: u32) -> Order {
    Order {
        reference: reference.to_string(),
        theme: vec!["Dinosaurs".to_string()],
        style: ArtStyle::Cartoon,
        difficulty: Difficulty::Easy,
        total_pages,
        edition: Edition::LineArtOnly,
        palette: vec![],
        recipient: "parent@example.com".to_string(),
    }
}

pub fn colored_order(reference: &str, total_pages: u32) -> Order {
    Order {
        edition: Edition::LineArtPlusColored,
        palette: vec!["red".to_string(), "teal".to_string()],
        ..sample_order(reference, total_pages)
    }
}

/// Synthesizer returning PNG fixtures, with per-call failure injection.
///
/// Call numbers are 1-based and counted separately for line art and recolor.
#[derive(Default)]
pub struct FakeSynthesizer {
    line_art_calls: AtomicUsize,
    recolor_calls: AtomicUsize,
    failing_line_art: HashSet<usize>,
    failing_recolor: HashSet<usize>,
    fail_everything: bool,
    /// Line-art bytes handed back, in call order, so recolor inputs can be checked
    pub produced: Mutex<Vec<Vec<u8>>>,
    pub recolor_inputs: Mutex<Vec<Vec<u8>>>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_line_art(mut self, calls: &[usize]) -> Self {
        self.failing_line_art.extend(calls);
        self
    }

    pub fn failing_recolor(mut self, calls: &[usize]) -> Self {
        self.failing_recolor.extend(calls);
        self
    }

    pub fn always_failing() -> Self {
        Self {
            fail_everything: true,
            ..Self::default()
        }
    }

    pub fn line_art_calls(&self) -> usize {
        self.line_art_calls.load(Ordering::SeqCst)
    }

    pub fn recolor_calls(&self) -> usize {
        self.recolor_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSynthesizer for FakeSynthesizer {
    async fn synthesize_line_art(&self, _prompt: &str) -> Result<Vec<u8>, SynthesisError> {
        let call = self.line_art_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_everything || self.failing_line_art.contains(&call) {
            return Err(SynthesisError::failed(format!("injected line art failure {}", call)));
        }
        // Width encodes the call number so pages can be told apart after rendering.
        let bytes = png_fixture(10 + call as u32, 20);
        self.produced.lock().unwrap().push(bytes.clone());
        Ok(bytes)
    }

    async fn recolor(&self, source: &[u8], _instruction: &str) -> Result<Vec<u8>, SynthesisError> {
        let call = self.recolor_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.recolor_inputs.lock().unwrap().push(source.to_vec());
        if self.fail_everything || self.failing_recolor.contains(&call) {
            return Err(SynthesisError::failed(format!("injected recolor failure {}", call)));
        }
        Ok(png_fixture(30, 40))
    }
}

/// Notifier that remembers every delivery, optionally rejecting them all
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Delivery>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Delivery> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryNotifier for RecordingNotifier {
    async fn send(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(delivery.clone());
        if self.fail {
            return Err(DeliveryError::Transport("injected delivery failure".to_string()));
        }
        Ok(())
    }
}
