pub mod classifier_factory;
pub mod learned_model_classifier;
pub mod onnx_pose_model;
