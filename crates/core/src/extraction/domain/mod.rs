pub mod face_coordinates;
pub mod nose_pointer;
