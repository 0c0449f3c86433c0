//! CRSF wire format: trainer input parsing and the RC channels frame sent
//! to a Crossfire module.
//!
//! Frame layout: `[sync] [len] [type] [payload..] [crc]`, `len` covering
//! type, payload and crc. The crc is CRC-8/DVB-S2 over type and payload.

use heapless::Vec;

pub const CRSF_SYNC: u8 = 0xC8;
pub const CRSF_ADDRESS_CRSF_TRANSMITTER: u8 = 0xEE;
pub const CRSF_FRAMETYPE_RC_CHANNELS_PACKED: u8 = 0x16;

pub const CRSF_CHANNELS: usize = 16;
const CHANNELS_PAYLOAD_LEN: usize = 22;
/// Full RC channels frame on the wire.
pub const RC_FRAME_LEN: usize = CHANNELS_PAYLOAD_LEN + 4;
const MAX_FRAME_LEN: usize = 64;

pub const CRSF_CHANNEL_MIN: u16 = 172;
pub const CRSF_CHANNEL_CENTER: u16 = 992;
pub const CRSF_CHANNEL_MAX: u16 = 1811;
/// Full mixer deflection, +/- 100 %.
pub const MIX_FULL_SCALE: i32 = 1024;

/// Frame period of a Crossfire module in its default packet rate.
pub const CRSF_PERIOD_MS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcChannels {
    /// 11-bit values (0-2047).
    pub channels: [u16; CRSF_CHANNELS],
}

impl Default for RcChannels {
    fn default() -> Self {
        Self {
            channels: [CRSF_CHANNEL_CENTER; CRSF_CHANNELS],
        }
    }
}

impl RcChannels {
    /// Mixer scale (+/- `MIX_FULL_SCALE` around zero) to CRSF ticks.
    pub fn from_mix(mix: &[i16]) -> Self {
        let mut out = Self::default();
        for (slot, &v) in out.channels.iter_mut().zip(mix) {
            *slot = channel_from_mix(v);
        }
        out
    }

    pub fn to_mix(&self, mix: &mut [i16]) {
        for (slot, &v) in mix.iter_mut().zip(self.channels.iter()) {
            *slot = mix_from_channel(v);
        }
    }
}

/// CRSF ticks per full deflection on each side of center; the range is
/// one tick wider below center than above it.
const fn half_span(below_center: bool) -> i32 {
    if below_center {
        (CRSF_CHANNEL_CENTER - CRSF_CHANNEL_MIN) as i32
    } else {
        (CRSF_CHANNEL_MAX - CRSF_CHANNEL_CENTER) as i32
    }
}

pub fn channel_from_mix(v: i16) -> u16 {
    let v = (v as i32).clamp(-MIX_FULL_SCALE, MIX_FULL_SCALE);
    (CRSF_CHANNEL_CENTER as i32 + v * half_span(v < 0) / MIX_FULL_SCALE) as u16
}

pub fn mix_from_channel(ch: u16) -> i16 {
    let offset = ch.clamp(CRSF_CHANNEL_MIN, CRSF_CHANNEL_MAX) as i32 - CRSF_CHANNEL_CENTER as i32;
    (offset * MIX_FULL_SCALE / half_span(offset < 0)) as i16
}

pub struct CrsfParser {
    buffer: Vec<u8, MAX_FRAME_LEN>,
}

impl CrsfParser {
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn push_byte(&mut self, b: u8) -> Option<RcChannels> {
        if self.buffer.is_empty() {
            if b == CRSF_SYNC || b == CRSF_ADDRESS_CRSF_TRANSMITTER {
                let _ = self.buffer.push(b);
            }
            return None;
        }

        if self.buffer.len() == 1 {
            // Type + crc at least, and the whole frame must fit.
            if !(2..=(MAX_FRAME_LEN - 2) as u8).contains(&b) {
                self.buffer.clear();
                return self.push_byte(b);
            }
            let _ = self.buffer.push(b);
            return None;
        }

        let total = 2 + self.buffer[1] as usize;
        if self.buffer.len() < total {
            let _ = self.buffer.push(b);
        }
        if self.buffer.len() < total {
            return None;
        }

        let frame = self.buffer.as_slice();
        let mut parsed = None;
        if calc_crc8(&frame[2..total - 1]) == frame[total - 1] {
            let payload = &frame[3..total - 1];
            if frame[2] == CRSF_FRAMETYPE_RC_CHANNELS_PACKED && payload.len() == CHANNELS_PAYLOAD_LEN {
                parsed = Some(unpack_channels(payload));
            }
        } else {
            trace!("crsf crc mismatch");
        }
        self.buffer.clear();
        parsed
    }

    /// Feeds a chunk and returns the most recent complete frame in it.
    pub fn push_bytes(&mut self, data: &[u8]) -> Option<RcChannels> {
        data.iter().fold(None, |last, &b| self.push_byte(b).or(last))
    }
}

impl Default for CrsfParser {
    fn default() -> Self {
        Self::new()
    }
}

pub fn calc_crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0xD5 } else { crc << 1 };
        }
    }
    crc
}

/// 16 channels of 11 bits, little endian bit order.
pub fn unpack_channels(payload: &[u8]) -> RcChannels {
    let mut out = RcChannels {
        channels: [0; CRSF_CHANNELS],
    };
    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut ch = 0;
    for &byte in payload.iter().take(CHANNELS_PAYLOAD_LEN) {
        acc |= (byte as u32) << bits;
        bits += 8;
        while bits >= 11 && ch < CRSF_CHANNELS {
            out.channels[ch] = (acc & 0x07FF) as u16;
            acc >>= 11;
            bits -= 11;
            ch += 1;
        }
    }
    out
}

pub fn pack_channels(rc: &RcChannels) -> [u8; CHANNELS_PAYLOAD_LEN] {
    let mut out = [0u8; CHANNELS_PAYLOAD_LEN];
    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut i = 0;
    for &v in rc.channels.iter() {
        acc |= ((v & 0x07FF) as u32) << bits;
        bits += 11;
        while bits >= 8 {
            out[i] = acc as u8;
            acc >>= 8;
            bits -= 8;
            i += 1;
        }
    }
    out
}

/// Serializes one frame into `buf`, returning the bytes written (0 when
/// `buf` is too small).
pub fn build_frame(buf: &mut [u8], address: u8, frame_type: u8, payload: &[u8]) -> usize {
    let len = payload.len() + 2;
    if buf.len() < len + 2 {
        return 0;
    }
    buf[0] = address;
    buf[1] = len as u8;
    buf[2] = frame_type;
    buf[3..3 + payload.len()].copy_from_slice(payload);
    buf[3 + payload.len()] = calc_crc8(&buf[2..3 + payload.len()]);
    len + 2
}

/// RC channels frame addressed to the RF module.
pub fn rc_channels_frame(rc: &RcChannels) -> [u8; RC_FRAME_LEN] {
    let mut frame = [0u8; RC_FRAME_LEN];
    let _ = build_frame(
        &mut frame,
        CRSF_ADDRESS_CRSF_TRANSMITTER,
        CRSF_FRAMETYPE_RC_CHANNELS_PACKED,
        &pack_channels(rc),
    );
    frame
}
