pub mod activity_gate;
pub mod feature_extractor;
pub mod frame_model;
pub mod landmark_buffer;
pub mod phrase_set;
pub mod prediction_smoother;
pub mod prototype_classifier;
pub mod sign_classifier;
