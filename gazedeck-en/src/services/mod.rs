//! Enhancement services

pub mod batch_driver;
pub mod parameter_merger;
pub mod set_processor;
pub mod vision_client;

pub use batch_driver::BatchDriver;
pub use set_processor::{SetProcessor, SetStatus};
pub use vision_client::{VisionClient, VisionMetrics, VisionOutcome};
