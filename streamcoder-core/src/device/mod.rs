//! Capture backends and the factory selecting them by [`DeviceKind`].

pub mod context;
pub mod cpal_input;
pub mod file;
pub mod signal;

use crate::models::audio_models::DeviceKind;
use crate::processing::ring_buffer::RingWriter;
use crate::traits::audio_device::AudioDevice;

use self::cpal_input::CpalDevice;
use self::file::FileDevice;
use self::signal::SignalDevice;

/// Builds the backend for `kind`, writing `channels` channels into `writer`.
///
/// `samplerate` is the rate the device is asked for; backends that dictate
/// their own rate report it through `device_samplerate` once started.
pub fn create_device(kind: DeviceKind, channels: usize, samplerate: u32, writer: RingWriter) -> Box<dyn AudioDevice> {
    match kind {
        DeviceKind::File => Box::new(FileDevice::new(channels, samplerate, writer)),
        DeviceKind::Signal => Box::new(SignalDevice::new(channels, samplerate, writer)),
        DeviceKind::Cpal => Box::new(CpalDevice::new(channels, samplerate, writer)),
    }
}

/// Whether `kind` can be used in this build, without creating a device.
pub fn device_is_available(kind: DeviceKind) -> bool {
    match kind {
        DeviceKind::File => FileDevice::available(),
        DeviceKind::Signal => SignalDevice::available(),
        DeviceKind::Cpal => CpalDevice::available(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ring_buffer::RingBuffer;

    #[test]
    fn factory_builds_requested_kind() {
        for kind in DeviceKind::ALL {
            let (writer, _reader) = RingBuffer::new(4096, 2).split();
            let device = create_device(kind, 2, 48000, writer);
            assert_eq!(device.kind(), kind);
            assert_eq!(device.channels(), 2);
            assert_eq!(device.is_available(), device_is_available(kind));
        }
        assert!(device_is_available(DeviceKind::Signal));
    }
}
