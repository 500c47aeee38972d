pub mod domain;
pub mod extraction_logger;
pub mod infrastructure;
pub mod landmark_extractor;
