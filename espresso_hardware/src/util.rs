//! Little-endian float packing shared by the telemetry and command codecs.

/// Append `values` to `out` as little-endian `f32`s.
pub fn put_f32s_le(out: &mut Vec<u8>, values: &[f32]) {
    out.reserve(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Read little-endian `f32`s from `bytes`. A trailing partial word is ignored;
/// callers check lengths before unpacking.
pub fn get_f32s_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|w| f32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_little_endian() {
        let mut out = Vec::new();
        put_f32s_le(&mut out, &[1.0, -2.5]);
        assert_eq!(&out[..4], &[0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(get_f32s_le(&out), vec![1.0, -2.5]);
    }
}
