pub mod device;
pub mod file;
pub mod segmenter;
pub mod tap;

pub use device::MicrophoneTap;
pub use file::FileTap;
pub use segmenter::{rms_dbfs, AudioSegment, SegmenterConfig, VoiceSegmenter};
pub use tap::{AudioFrame, AudioTap, AudioTapFactory, TapConfig, TapSource};
