pub mod cached_caption_generator;
pub mod generator_factory;
pub mod openai_caption_generator;
