use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// One preview frame from the camera stream.
#[derive(Clone)]
pub struct Frame {
    frame_id: Uuid,
    image: Arc<DynamicImage>,
    captured_at: Instant,
}

impl Frame {
    pub fn new(image: DynamicImage, captured_at: Instant) -> Self {
        Self {
            frame_id: Uuid::new_v4(),
            image: Arc::new(image),
            captured_at,
        }
    }

    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("frame_id", &self.frame_id)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}
