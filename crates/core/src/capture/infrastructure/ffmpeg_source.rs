use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::capture::infrastructure::camera_device::{CameraDevice, INPUT_FORMAT};
use crate::shared::frame::{Frame, PixelFormat};

/// Wait before polling a device again after it reported no packet ready.
const RETRY_DELAY: Duration = Duration::from_millis(5);

/// Optional hints passed to the capture device. The driver may ignore them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureSettings {
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub frame_rate: Option<u32>,
}

/// Decodes frames via ffmpeg-next from a live camera (libavdevice) or a
/// recorded file (libavformat).
///
/// Every decoded frame is converted to packed BGR24, the order webcams
/// conventionally hand out; the extractor converts to RGB before inference.
pub struct FfmpegFrameSource {
    name: String,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    decoder: Option<ffmpeg_next::decoder::Video>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    video_stream_index: usize,
    width: u32,
    height: u32,
    frame_index: usize,
    flushing: bool,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    /// Opens a camera through the platform capture demuxer.
    pub fn open_device(
        device: &CameraDevice,
        settings: &CaptureSettings,
    ) -> Result<Self, CaptureError> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let name = device.describe();
        let url = device.url()?;
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name().split(',').any(|n| n == INPUT_FORMAT))
            .ok_or_else(|| CaptureError::Open {
                source_name: name.clone(),
                reason: format!("{INPUT_FORMAT} input is not available in this ffmpeg build"),
            })?;

        let mut options = ffmpeg_next::Dictionary::new();
        if let (Some(w), Some(h)) = (settings.frame_width, settings.frame_height) {
            options.set("video_size", &format!("{w}x{h}"));
        }
        if let Some(fps) = settings.frame_rate {
            options.set("framerate", &fps.to_string());
        }

        log::debug!("Opening {name} via {INPUT_FORMAT} at {url}");
        let ctx = ffmpeg_next::format::open_with(&url, &format, options).map_err(|e| {
            CaptureError::Open {
                source_name: name.clone(),
                reason: e.to_string(),
            }
        })?;

        match ctx {
            ffmpeg_next::format::context::Context::Input(ictx) => Self::from_input(name, ictx),
            ffmpeg_next::format::context::Context::Output(_) => Err(CaptureError::Open {
                source_name: name,
                reason: "device opened as an output".into(),
            }),
        }
    }

    /// Opens a recorded video or still image for replay.
    pub fn open_file(path: &Path) -> Result<Self, CaptureError> {
        ffmpeg_next::init()?;
        let name = path.display().to_string();
        let ictx = ffmpeg_next::format::input(path).map_err(|e| CaptureError::Open {
            source_name: name.clone(),
            reason: e.to_string(),
        })?;
        Self::from_input(name, ictx)
    }

    fn from_input(
        name: String,
        ictx: ffmpeg_next::format::context::Input,
    ) -> Result<Self, CaptureError> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::Open {
                source_name: name.clone(),
                reason: "no video stream found".into(),
            })?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::BGR24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!("Opened {name}: {width}x{height}");

        Ok(Self {
            name,
            input_ctx: Some(ictx),
            decoder: Some(decoder),
            scaler: Some(scaler),
            video_stream_index,
            width,
            height,
            frame_index: 0,
            flushing: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl FrameSource for FfmpegFrameSource {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        let (Some(ictx), Some(decoder), Some(scaler)) = (
            self.input_ctx.as_mut(),
            self.decoder.as_mut(),
            self.scaler.as_mut(),
        ) else {
            return Err(CaptureError::Closed);
        };

        loop {
            if let Some(frame) =
                try_receive(decoder, scaler, self.width, self.height, self.frame_index)?
            {
                self.frame_index += 1;
                return Ok(frame);
            }

            if self.flushing {
                return Err(CaptureError::EndOfStream(self.name.clone()));
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match next_packet(packet.read(ictx))? {
                PacketStatus::Ready => {
                    if packet.stream() != self.video_stream_index {
                        continue;
                    }
                    if let Err(e) = decoder.send_packet(&packet) {
                        log::debug!("Dropping undecodable packet from {}: {e}", self.name);
                    }
                }
                PacketStatus::Retry => thread::sleep(RETRY_DELAY),
                PacketStatus::Finished => {
                    let _ = decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }

    fn close(&mut self) {
        if self.input_ctx.is_some() {
            log::debug!("Closing {} after {} frames", self.name, self.frame_index);
        }
        self.scaler = None;
        self.decoder = None;
        self.input_ctx = None;
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PacketStatus {
    Ready,
    /// The device has no packet yet.
    Retry,
    Finished,
}

/// Classifies the outcome of one demuxer read. Anything other than end of
/// input or "try again" is a failed read, e.g. an unplugged camera.
fn next_packet(result: Result<(), ffmpeg_next::Error>) -> Result<PacketStatus, CaptureError> {
    match result {
        Ok(()) => Ok(PacketStatus::Ready),
        Err(ffmpeg_next::Error::Eof) => Ok(PacketStatus::Finished),
        Err(ffmpeg_next::Error::Other {
            errno: ffmpeg_next::util::error::EAGAIN,
        }) => Ok(PacketStatus::Retry),
        Err(e) => Err(CaptureError::Decode(e)),
    }
}

fn try_receive(
    decoder: &mut ffmpeg_next::decoder::Video,
    scaler: &mut ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    index: usize,
) -> Result<Option<Frame>, CaptureError> {
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    if decoder.receive_frame(&mut decoded).is_err() {
        return Ok(None);
    }
    let mut bgr_frame = ffmpeg_next::util::frame::video::Video::empty();
    scaler.run(&decoded, &mut bgr_frame)?;
    let pixels = extract_packed_pixels(&bgr_frame, width, height);
    Ok(Some(Frame::new(
        pixels,
        width,
        height,
        PixelFormat::Bgr24,
        index,
    )))
}

/// Copies the visible part of each row, dropping ffmpeg's line padding.
fn extract_packed_pixels(
    frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}
