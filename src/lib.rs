pub mod anonymize;
pub mod detection;
pub mod draw;
pub mod keypoints;
pub mod mask;
pub mod pipeline;
pub mod progress;
pub mod ranking;
pub mod shapes;
pub mod video;
