pub mod camera_device;
pub mod ffmpeg_source;
pub mod image_file_reader;
