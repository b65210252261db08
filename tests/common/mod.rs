#![allow(dead_code)]

use csq::marker::MARKER;

/// Calibration stored in the synthetic frames, in the units
/// of the FFF camera info record (kelvin, fraction).
pub struct Camera {
    pub emissivity: f32,
    pub distance: f32,
    pub reflected_k: f32,
    pub atmosphere_k: f32,
    pub window_k: f32,
    pub window_transmission: f32,
    pub humidity: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            emissivity: 0.95,
            distance: 1.0,
            reflected_k: 293.15,
            atmosphere_k: 293.15,
            window_k: 293.15,
            window_transmission: 1.0,
            humidity: 0.5,
        }
    }
}

struct Writer {
    buf: Vec<u8>,
    big_endian: bool,
}

impl Writer {
    fn u16(&mut self, at: usize, v: u16) {
        let b = if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf[at..at + 2].copy_from_slice(&b);
    }

    fn u32(&mut self, at: usize, v: u32) {
        let b = if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf[at..at + 4].copy_from_slice(&b);
    }

    fn f32(&mut self, at: usize, v: f32) {
        self.u32(at, v.to_bits());
    }
}

/// An FFF record with a camera info record (0x20) and an
/// uncompressed raw data record (0x01), in either byte order.
pub fn fff_record(
    camera: &Camera,
    width: u16,
    height: u16,
    pixels: &[u16],
    big_endian: bool,
) -> Vec<u8> {
    assert_eq!(pixels.len(), width as usize * height as usize);
    let dir = 0x40;
    let camera_at = dir + 0x40;
    let camera_len = 0x310;
    let raw_at = camera_at + camera_len;
    let raw_len = 0x20 + 2 * pixels.len();

    let mut w = Writer {
        buf: vec![0; raw_at + raw_len],
        big_endian,
    };
    w.buf[..MARKER.len()].copy_from_slice(MARKER);
    w.u32(0x14, 100);
    w.u32(0x18, dir as u32);
    w.u32(0x1c, 2);
    for (idx, &(ty, at, len)) in [(0x20u16, camera_at, camera_len), (0x01, raw_at, raw_len)]
        .iter()
        .enumerate()
    {
        let entry = dir + idx * 0x20;
        w.u16(entry, ty);
        w.u16(entry + 2, if big_endian { 1 } else { 2 });
        w.u32(entry + 0xc, at as u32);
        w.u32(entry + 0x10, len as u32);
    }

    w.u16(camera_at, 2);
    let t = camera_at + 0x20;
    w.f32(t, camera.emissivity);
    w.f32(t + 0x04, camera.distance);
    w.f32(t + 0x08, camera.reflected_k);
    w.f32(t + 0x0c, camera.atmosphere_k);
    w.f32(t + 0x10, camera.window_k);
    w.f32(t + 0x14, camera.window_transmission);
    w.f32(t + 0x1c, camera.humidity);
    w.f32(t + 0x38, 21106.77);
    w.f32(t + 0x3c, 1501.0);
    w.f32(t + 0x40, 1.0);
    w.f32(t + 0x50, 0.006569);
    w.f32(t + 0x54, 0.01262);
    w.f32(t + 0x58, -0.002276);
    w.f32(t + 0x5c, -0.00667);
    w.f32(t + 0x60, 1.9);
    w.u32(camera_at + 0x308, (-7340i32) as u32);
    w.f32(camera_at + 0x30c, 0.012545258);

    w.u16(raw_at, 2);
    w.u16(raw_at + 2, width);
    w.u16(raw_at + 4, height);
    for (idx, &px) in pixels.iter().enumerate() {
        w.u16(raw_at + 0x20 + 2 * idx, px);
    }
    w.buf
}

pub fn le_record(width: u16, height: u16, pixels: &[u16]) -> Vec<u8> {
    fff_record(&Camera::default(), width, height, pixels, false)
}

/// Frames with arbitrary payloads: a marker followed by
/// `len` bytes that never form a marker.
pub fn opaque_frames(lens: &[usize]) -> Vec<Vec<u8>> {
    lens.iter()
        .enumerate()
        .map(|(i, &len)| {
            let mut frame = MARKER.to_vec();
            frame.extend((0..len).map(|j| 0x80 | ((i * 31 + j) % 127) as u8));
            frame
        })
        .collect()
}
