pub mod caption_generator;
pub mod caption_style;
pub mod correction_profile;
pub mod templates;
pub mod translator;
pub mod ttl_cache;
