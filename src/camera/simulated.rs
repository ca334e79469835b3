use super::{CameraDevice, CaptureQuality, CapturedImage, LightMeter, PoseDetector};
use crate::common::{Detection, Frame, Keypoint};
use crate::error::CaptureError;
use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Rgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

fn blank_image(width: u32, height: u32, shade: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(
        width,
        height,
        Rgb([shade, shade, shade]),
    ))
}

/// Feeds a detector with a fixed sequence of results, one per call.
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Option<Detection>>>,
    fallback: Option<Detection>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(script: impl IntoIterator<Item = Option<Detection>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Result returned once the script runs out.
    pub fn with_fallback(mut self, fallback: Option<Detection>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoseDetector for ScriptedDetector {
    async fn detect_pose(&self, _image: &DynamicImage) -> Option<Detection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or(self.fallback)
    }
}

/// A pet that wanders around the frame, then settles facing the camera with
/// small residual jitter.
pub fn settling_pet_script(
    frames: usize,
    settle_after: usize,
    seed: u64,
) -> Vec<Option<Detection>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (mut cx, mut cy) = (0.5_f32, 0.55_f32);

    (0..frames)
        .map(|i| {
            if i < settle_after {
                if rng.random_bool(0.15) {
                    return None;
                }
                cx = (cx + rng.random_range(-0.06..0.06)).clamp(0.2, 0.8);
                cy = (cy + rng.random_range(-0.06..0.06)).clamp(0.2, 0.8);
            } else {
                cx += rng.random_range(-0.002..0.002);
                cy += rng.random_range(-0.002..0.002);
            }
            let confidence = rng.random_range(0.65..0.95);
            Some(Detection::full(
                Keypoint::new(cx - 0.06, cy + 0.05, confidence),
                Keypoint::new(cx + 0.06, cy + 0.05, confidence),
                Keypoint::new(cx, cy, confidence),
            ))
        })
        .collect()
}

/// In-memory camera. Optionally fails its first `failures` captures.
pub struct SimulatedCamera {
    latency: Duration,
    failures: AtomicUsize,
    captures: AtomicUsize,
    speed_captures: AtomicUsize,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            failures: AtomicUsize::new(0),
            captures: AtomicUsize::new(0),
            speed_captures: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_failures(self, failures: usize) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }

    /// Total capture commands received.
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn speed_captures(&self) -> usize {
        self.speed_captures.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDevice for SimulatedCamera {
    async fn capture(&self, quality: CaptureQuality) -> Result<CapturedImage, CaptureError> {
        let sequence = self.captures.fetch_add(1, Ordering::SeqCst);
        if quality == CaptureQuality::Speed {
            self.speed_captures.fetch_add(1, Ordering::SeqCst);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            tracing::warn!("Simulated capture {} failing on purpose", sequence);
            return Err(CaptureError::Hardware(format!(
                "simulated failure on capture {}",
                sequence
            )));
        }

        Ok(CapturedImage::new(
            blank_image(64, 48, (sequence % 255) as u8),
            quality,
        ))
    }
}

/// Light meter reporting a settable ISO value.
pub struct FixedLightMeter {
    iso_bits: AtomicU32,
}

impl FixedLightMeter {
    pub fn new(iso: f32) -> Self {
        Self {
            iso_bits: AtomicU32::new(iso.to_bits()),
        }
    }

    pub fn set_iso(&self, iso: f32) {
        self.iso_bits.store(iso.to_bits(), Ordering::SeqCst);
    }
}

impl LightMeter for FixedLightMeter {
    fn current_light_proxy(&self) -> f32 {
        f32::from_bits(self.iso_bits.load(Ordering::SeqCst))
    }
}

/// Preview stream running on its own thread at a fixed cadence.
pub struct SyntheticFrameSource {
    cancel_token: CancellationToken,
    source_thread: Option<std::thread::JoinHandle<usize>>,
}

impl SyntheticFrameSource {
    pub fn start(frame_tx: Sender<Frame>, fps: u32, total_frames: usize) -> Self {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let interval = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));

        Self {
            cancel_token,
            source_thread: Some(std::thread::spawn(move || {
                Self::run(frame_tx, interval, total_frames, token)
            })),
        }
    }

    fn run(
        frame_tx: Sender<Frame>,
        interval: Duration,
        total_frames: usize,
        cancel_token: CancellationToken,
    ) -> usize {
        tracing::info!("Synthetic frame source starting at {:?} per frame", interval);
        let mut dropped = 0;

        for _ in 0..total_frames {
            if cancel_token.is_cancelled() {
                break;
            }
            match frame_tx.try_send(Frame::new(blank_image(32, 24, 128), Instant::now())) {
                Ok(_) => {}
                Err(TrySendError::Full(_)) => {
                    // Drop frame to keep real-time
                    dropped += 1;
                    tracing::debug!("Dropping preview frame: channel full");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!("Frame channel closed, stopping frame source");
                    break;
                }
            }
            std::thread::sleep(interval);
        }

        tracing::info!("Synthetic frame source stopped, {} frames dropped", dropped);
        dropped
    }

    /// Blocks until the source thread ends and returns the number of frames it
    /// had to drop.
    pub fn join(mut self) -> usize {
        self.source_thread
            .take()
            .and_then(|thread| thread.join().ok())
            .unwrap_or(0)
    }

    pub fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(thread) = self.source_thread.take() {
            if thread.join().is_err() {
                tracing::error!("Synthetic frame source thread panicked");
            }
        }
    }
}

impl Drop for SyntheticFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}
