// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial line configuration and the derived RTU timing constants.

use core::time::Duration;

/// Above this baud rate the inter-character and inter-frame
/// timeouts are fixed.
pub const FIXED_TIMING_BAUD_RATE: u32 = 19_200;

const FIXED_CHAR_TIMEOUT: Duration = Duration::from_micros(750);
const FIXED_FRAME_TIMEOUT: Duration = Duration::from_micros(1_750);

/// Runtime configuration of a [`Client`](crate::Client).
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Baud rate of the serial line.
    pub baud_rate: u32,
    /// Maximum time to wait for the first byte of a response.
    pub response_timeout: Duration,
}

impl Config {
    pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(100);

    #[must_use]
    pub const fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            response_timeout: Self::DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(9_600)
    }
}

/// RTU timing constants, derived once from a [`Config`].
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Silence of 1.5 character times (T1.5), ends the capture of a frame.
    pub char_timeout: Duration,
    /// Silence of 3.5 character times (T3.5) that separates frames.
    pub frame_timeout: Duration,
    /// Maximum time to wait for the first byte of a response.
    pub response_timeout: Duration,
}

impl Timing {
    /// A baud rate of `0` is treated like `1`.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        let (char_timeout, frame_timeout) = if config.baud_rate > FIXED_TIMING_BAUD_RATE {
            (FIXED_CHAR_TIMEOUT, FIXED_FRAME_TIMEOUT)
        } else {
            let baud_rate = if config.baud_rate == 0 {
                1
            } else {
                config.baud_rate as u64
            };
            (
                Duration::from_micros(15_000_000 / baud_rate),
                Duration::from_micros(35_000_000 / baud_rate),
            )
        };
        Self {
            char_timeout,
            frame_timeout,
            response_timeout: config.response_timeout,
        }
    }

    pub(crate) fn char_timeout_micros(&self) -> u64 {
        saturating_u64(self.char_timeout.as_micros())
    }

    pub(crate) fn frame_timeout_micros(&self) -> u64 {
        saturating_u64(self.frame_timeout.as_micros())
    }

    pub(crate) fn response_timeout_micros(&self) -> u64 {
        saturating_u64(self.response_timeout.as_micros())
    }

    pub(crate) fn response_timeout_millis(&self) -> u64 {
        saturating_u64(self.response_timeout.as_millis())
    }
}

fn saturating_u64(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
