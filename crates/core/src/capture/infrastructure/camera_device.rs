//! Maps a user-facing device string onto the libavdevice input for the
//! current platform.

use crate::capture::domain::frame_source::CaptureError;

/// libavdevice demuxer used for live capture on this platform.
#[cfg(target_os = "linux")]
pub const INPUT_FORMAT: &str = "video4linux2";
#[cfg(target_os = "macos")]
pub const INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
pub const INPUT_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const INPUT_FORMAT: &str = "video4linux2";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraDevice {
    /// Zero-based camera index, as accepted by most capture APIs.
    Index(u32),
    /// Backend-specific name or path, passed through untouched.
    Named(String),
}

impl CameraDevice {
    /// Accepts `"0"`, `"/dev/video2"` or any other backend device name.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if let Some(index) = parse_device_index(spec) {
            return CameraDevice::Index(index);
        }
        CameraDevice::Named(spec.to_string())
    }

    /// The URL handed to the platform demuxer.
    pub fn url(&self) -> Result<String, CaptureError> {
        match self {
            CameraDevice::Index(index) => index_url(*index),
            CameraDevice::Named(name) => Ok(named_url(name)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CameraDevice::Index(index) => format!("camera #{index}"),
            CameraDevice::Named(name) => name.clone(),
        }
    }
}

fn parse_device_index(spec: &str) -> Option<u32> {
    if let Ok(index) = spec.parse::<u32>() {
        return Some(index);
    }
    let stripped = spec.strip_prefix("/dev/video")?;
    if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
        return stripped.parse::<u32>().ok();
    }
    None
}

#[cfg(target_os = "macos")]
fn index_url(index: u32) -> Result<String, CaptureError> {
    // "<video>:<audio>"; audio capture is never needed here
    Ok(format!("{index}:none"))
}

#[cfg(target_os = "windows")]
fn index_url(index: u32) -> Result<String, CaptureError> {
    Err(CaptureError::Open {
        source_name: format!("camera #{index}"),
        reason: "dshow needs a device name, e.g. --device \"Integrated Camera\"".into(),
    })
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn index_url(index: u32) -> Result<String, CaptureError> {
    Ok(format!("/dev/video{index}"))
}

#[cfg(target_os = "windows")]
fn named_url(name: &str) -> String {
    if name.starts_with("video=") {
        name.to_string()
    } else {
        format!("video={name}")
    }
}

#[cfg(not(target_os = "windows"))]
fn named_url(name: &str) -> String {
    name.to_string()
}
