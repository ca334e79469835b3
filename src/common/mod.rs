pub mod frame;
pub mod keypoint;

pub use frame::Frame;
pub use keypoint::{Detection, Keypoint, PoseSample};
