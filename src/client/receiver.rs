// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transmission and timing based reception of RTU frames.
//!
//! RTU frames carry no delimiter. A frame ends when the line stays
//! silent for more than 1.5 character times, and the next frame may
//! only start after 3.5 character times of silence.

use super::{Clock, DirectionControl, Timing, Transport};
use crate::{
    codec::rtu::{MAX_FRAME_LEN, RequestAdu, client::encode_request},
    error::Error,
};

/// Bounds-checked buffer for a single RTU frame.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    buf: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl FrameBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_FRAME_LEN],
            len: 0,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len == MAX_FRAME_LEN
    }

    /// The valid bytes of the frame.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append a byte, returns `false` if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        let Some(slot) = self.buf.get_mut(self.len) else {
            return false;
        };
        *slot = byte;
        self.len += 1;
        true
    }

    /// Replace the contents with an encoded request.
    pub fn encode_request(&mut self, adu: RequestAdu<'_>) -> Result<usize, Error> {
        self.len = 0;
        self.len = encode_request(adu, &mut self.buf)?;
        Ok(self.len)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_micros<C: Clock>(clock: &mut C, since: u64) -> u64 {
    clock.now_micros().wrapping_sub(since)
}

fn spin_until<C: Clock>(clock: &mut C, since: u64, micros: u64) {
    while elapsed_micros(clock, since) < micros {
        clock.spin();
    }
}

/// Transmit a frame on a half-duplex line.
///
/// The transmitter stays enabled for T3.5 after the flush so that the
/// UART has drained and the far end sees the frame gap before the
/// line is released.
pub(crate) fn send<T, D>(transport: &mut T, direction: &mut D, timing: &Timing, frame: &[u8])
where
    T: Transport,
    D: DirectionControl,
{
    direction.set_transmit_enabled(true);
    transport.write(frame);
    transport.flush();
    let flushed = transport.now_micros();
    spin_until(transport, flushed, timing.frame_timeout_micros());
    direction.set_transmit_enabled(false);
}

/// Capture a response frame into `frame`.
///
/// Returns the number of captured bytes. On return T3.5 has passed since
/// the last captured byte, unless no byte arrived at all.
pub(crate) fn receive<T: Transport>(
    transport: &mut T,
    timing: &Timing,
    frame: &mut FrameBuffer,
) -> Result<usize, Error> {
    frame.clear();

    let started = transport.now_millis();
    while transport.bytes_available() == 0 {
        if transport.now_millis().wrapping_sub(started) >= timing.response_timeout_millis() {
            return Err(Error::Timeout);
        }
        transport.spin();
    }

    let mut last_byte = transport.now_micros();
    loop {
        if transport.bytes_available() > 0 {
            let byte = transport.read_byte();
            last_byte = transport.now_micros();
            frame.push(byte);
            if frame.is_full() {
                break;
            }
        } else if elapsed_micros(transport, last_byte) > timing.char_timeout_micros() {
            break;
        } else {
            transport.spin();
        }
    }

    let drained = settle(transport, timing, last_byte);
    if drained > 0 {
        #[cfg(feature = "log")]
        log::warn!("Discarded {drained} byte(s) received after the end of the frame");
    }

    if frame.is_empty() {
        return Err(Error::FrameSize(0));
    }
    Ok(frame.len())
}

/// Read and drop input until the line has been silent for T3.5.
///
/// A line that never falls silent is given up on after the response
/// timeout plus T3.5. Returns the number of discarded bytes.
pub(crate) fn discard_input<T: Transport>(transport: &mut T, timing: &Timing) -> usize {
    let started = transport.now_micros();
    let limit = timing
        .response_timeout_micros()
        .saturating_add(timing.frame_timeout_micros());
    let mut last_byte = started;
    let mut discarded = 0;
    while elapsed_micros(transport, last_byte) < timing.frame_timeout_micros()
        && elapsed_micros(transport, started) < limit
    {
        if transport.bytes_available() > 0 {
            transport.read_byte();
            last_byte = transport.now_micros();
            discarded += 1;
        } else {
            transport.spin();
        }
    }
    discarded
}

/// Wait until T3.5 has passed since `last_byte` and drop the input
/// received meanwhile.
///
/// The window is not extended by dropped bytes.
fn settle<T: Transport>(transport: &mut T, timing: &Timing, last_byte: u64) -> usize {
    let mut drained = 0;
    while elapsed_micros(transport, last_byte) < timing.frame_timeout_micros() {
        if transport.bytes_available() > 0 {
            transport.read_byte();
            drained += 1;
        } else {
            transport.spin();
        }
    }
    drained
}
