//! Hardware capture through `cpal`.
//!
//! Only built with the `cpal` cargo feature. Without it the device still
//! exists so it can be listed, but reports itself unavailable.

use std::sync::Arc;

use crate::models::audio_models::DeviceKind;
use crate::models::error::StreamError;
use crate::processing::meter::MeterBank;
use crate::processing::ring_buffer::RingWriter;
use crate::traits::audio_device::{option_key, AudioDevice};
use crate::traits::device_delegate::DeviceDelegate;

#[cfg_attr(not(feature = "cpal"), allow(dead_code))]
pub struct CpalDevice {
    channels: usize,
    samplerate: u32,
    device_name: Option<String>,
    writer: Option<RingWriter>,
    meters: Arc<MeterBank>,
    delegate: Option<Arc<dyn DeviceDelegate>>,
    #[cfg(feature = "cpal")]
    stream: Option<cpal::Stream>,
}

impl CpalDevice {
    pub fn new(channels: usize, samplerate: u32, writer: RingWriter) -> Self {
        Self {
            channels,
            samplerate,
            device_name: None,
            writer: Some(writer),
            meters: Arc::new(MeterBank::new(channels)),
            delegate: None,
            #[cfg(feature = "cpal")]
            stream: None,
        }
    }

    #[cfg(feature = "cpal")]
    pub fn available() -> bool {
        use cpal::traits::HostTrait;
        cpal::default_host().default_input_device().is_some()
    }

    #[cfg(not(feature = "cpal"))]
    pub fn available() -> bool {
        false
    }

    #[cfg(feature = "cpal")]
    fn open(&mut self, writer: RingWriter) -> Result<(), StreamError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        use super::context::{CaptureContext, DEVICE_BLOCK_FRAMES};
        use crate::models::config::MAX_AUDIO_CHANNELS;
        use crate::processing::convert::i16_to_float;

        let host = cpal::default_host();
        let device = match self.device_name {
            Some(ref name) => host
                .input_devices()
                .map_err(|e| StreamError::DeviceNotAvailable(e.to_string()))?
                .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
                .ok_or_else(|| StreamError::DeviceNotAvailable(format!("no input device \"{}\"", name)))?,
            None => host
                .default_input_device()
                .ok_or_else(|| StreamError::DeviceNotAvailable("no default input device".into()))?,
        };
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = device
            .default_input_config()
            .map_err(|e| StreamError::DeviceNotAvailable(e.to_string()))?;
        log::info!("using input device {}: {:?}", device_name, config);

        let device_channels = config.channels() as usize;
        if device_channels == 0 || device_channels > MAX_AUDIO_CHANNELS as usize {
            return Err(StreamError::ConfigurationFailed(format!(
                "unsupported channel count: {}",
                device_channels
            )));
        }
        let mut context = CaptureContext::new(writer, device_channels, Arc::clone(&self.meters))?;
        let samplerate = config.sample_rate().0;

        let delegate = self.delegate.clone();
        let on_error = move |err: cpal::StreamError| {
            let err = StreamError::DeviceNotAvailable(err.to_string());
            log::error!("audio stream error: {}", err);
            if let Some(ref delegate) = delegate {
                delegate.on_device_error(&err);
            }
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    context.deliver(data);
                },
                on_error,
                None,
            ),
            cpal::SampleFormat::I16 => {
                let mut scratch = vec![0.0f32; DEVICE_BLOCK_FRAMES * device_channels];
                device.build_input_stream(
                    &config.into(),
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        for chunk in data.chunks(scratch.len()) {
                            i16_to_float(chunk, &mut scratch);
                            context.deliver(&scratch[..chunk.len()]);
                        }
                    },
                    on_error,
                    None,
                )
            }
            format => {
                return Err(StreamError::ConfigurationFailed(format!(
                    "unsupported sample format: {:?}",
                    format
                )))
            }
        }
        .map_err(|e| StreamError::DeviceNotAvailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| StreamError::DeviceNotAvailable(e.to_string()))?;

        self.samplerate = samplerate;
        self.stream = Some(stream);
        Ok(())
    }

    #[cfg(not(feature = "cpal"))]
    fn open(&mut self, _writer: RingWriter) -> Result<(), StreamError> {
        Err(StreamError::DeviceNotAvailable(
            "built without cpal support".into(),
        ))
    }

    #[cfg(feature = "cpal")]
    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::info!("capture stopped");
        }
    }

    #[cfg(not(feature = "cpal"))]
    fn close(&mut self) {}
}

impl AudioDevice for CpalDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Cpal
    }

    fn is_available(&self) -> bool {
        Self::available()
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn process_options(&mut self, options: &[(String, String)]) -> Result<(), StreamError> {
        for (key, value) in options {
            match option_key(key) {
                "cpal-device" => self.device_name = Some(value.clone()),
                _ => return Err(StreamError::UnsupportedOption(key.clone())),
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), StreamError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| StreamError::InvalidState("cpal device already started".into()))?;
        self.open(writer)
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.close();
        self.meters.silence();
        Ok(())
    }

    fn device_samplerate(&self) -> u32 {
        self.samplerate
    }

    fn meter_levels(&self) -> Vec<i32> {
        self.meters.levels()
    }

    fn set_delegate(&mut self, delegate: Arc<dyn DeviceDelegate>) {
        self.delegate = Some(delegate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ring_buffer::RingBuffer;

    #[test]
    fn accepts_only_its_own_option() {
        let (writer, _reader) = RingBuffer::new(4096, 2).split();
        let mut device = CpalDevice::new(2, 48000, writer);
        assert!(device
            .process_options(&[("--cpal-device".into(), "hw:0".into())])
            .is_ok());
        assert!(device
            .process_options(&[("alsa-device".into(), "hw:0".into())])
            .is_err());
    }

    #[cfg(not(feature = "cpal"))]
    #[test]
    fn unavailable_without_feature() {
        let (writer, _reader) = RingBuffer::new(4096, 2).split();
        let mut device = CpalDevice::new(2, 48000, writer);
        assert!(!device.is_available());
        assert!(matches!(device.start(), Err(StreamError::DeviceNotAvailable(_))));
    }
}
