// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]
#![no_std]

#[cfg(test)]
extern crate std;

mod client;
mod codec;
mod error;
mod frame;
mod util;

pub use client::{
    Client, Clock, Config, DirectionControl, FIXED_TIMING_BAUD_RATE, FrameBuffer, RegisterStore,
    Timing, Transport,
};
pub use codec::rtu;
pub use error::*;
pub use frame::*;
