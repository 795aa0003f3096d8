//! Sample format conversion.

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM, little-endian, appending
/// to `out`.
///
/// Clamps out-of-range values. Appends `samples.len() * 2` bytes.
pub fn float_to_i16_le(samples: &[f32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Convert signed integer samples holding `bits` significant bits to f32.
pub fn int_to_float(samples: &[i32], bits: u16, out: &mut [f32]) {
    let scale = 1.0 / (1u64 << (bits.clamp(1, 32) - 1)) as f32;
    for (o, &s) in out.iter_mut().zip(samples) {
        *o = s as f32 * scale;
    }
}

/// Convert 16-bit samples to f32.
pub fn i16_to_float(samples: &[i16], out: &mut [f32]) {
    let scale = 1.0 / 32768.0;
    for (o, &s) in out.iter_mut().zip(samples) {
        *o = s as f32 * scale;
    }
}
