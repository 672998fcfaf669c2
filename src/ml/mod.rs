//! Trained-model internals: feature construction, the forecast and
//! segmentation models, and the hot-swappable registry that serves them.

pub mod encoder;
pub mod features;
pub mod forecast;
pub mod registry;
pub mod scaler;
pub mod segmentation;
