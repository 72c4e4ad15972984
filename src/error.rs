// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

use crate::frame::ExceptionResponse;

/// modbus-rtu-master Error
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No response within the response timeout
    Timeout,
    /// Received frame is too short to carry an address, a function code and a CRC
    FrameSize(usize),
    /// Invalid CRC
    Crc(u16, u16),
    /// The server rejected the request
    Exception(ExceptionResponse),
    /// Unexpected function code in the response
    FnCode(u8),
    /// Invalid byte count
    ByteCount(u8),
    /// Quantity is zero or the frame would exceed the maximum RTU frame size
    Quantity(u16),
    /// Invalid buffer size
    BufferSize,
    /// Invalid exception code
    ExceptionCode(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            Timeout => write!(f, "No response within the response timeout"),
            FrameSize(len) => write!(f, "Invalid frame size: {len} byte(s)"),
            Crc(expected, actual) => write!(
                f,
                "Invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}"
            ),
            Exception(rsp) => write!(
                f,
                "Exception response for function 0x{:0>2X}: code 0x{:0>2X}",
                rsp.function.value(),
                rsp.code
            ),
            FnCode(fn_code) => write!(f, "Unexpected function code: 0x{fn_code:0>2X}"),
            ByteCount(cnt) => write!(f, "Invalid byte count: {cnt}"),
            Quantity(quantity) => write!(f, "Invalid quantity: {quantity}"),
            BufferSize => write!(f, "Invalid buffer size"),
            ExceptionCode(code) => write!(f, "Invalid exception code: 0x{code:0>2X}"),
        }
    }
}

impl core::error::Error for Error {}
