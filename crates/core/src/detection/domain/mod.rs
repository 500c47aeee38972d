pub mod face_detection;
pub mod face_detector;
pub mod face_landmarker;
pub mod face_landmarks;
pub mod face_mesh_landmarker;
pub mod face_roi;
pub mod landmark_model;
