pub mod constants;
pub mod frame;
pub mod landmarks;
pub mod model_resolver;
pub mod session_store;
pub mod settings;
