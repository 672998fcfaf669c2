pub mod forecasting;
pub mod reorder;
pub mod sales_history;
pub mod segmentation;
pub mod training;
