pub mod caption_pipeline;
pub mod event_handler;
pub mod infrastructure;
pub mod messages;
pub mod pipeline_logger;
