// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU client (master) specific functions.
use super::*;

/// Encode an RTU request.
pub fn encode_request(adu: RequestAdu, buf: &mut [u8]) -> Result<usize> {
    let RequestAdu { hdr, pdu } = adu;
    if buf.len() < 2 {
        return Err(Error::BufferSize);
    }
    let len = pdu.0.encode(&mut buf[PDU_OFFSET..])?;
    if buf.len() < len + 1 + CRC_LEN {
        return Err(Error::BufferSize);
    }
    buf[UNIT_OFFSET] = hdr.slave;
    let crc = crc16_with_address(hdr.slave, &buf[PDU_OFFSET..=len]);
    BigEndian::write_u16(&mut buf[len + 1..], crc);
    Ok(len + 1 + CRC_LEN)
}

/// Decode a complete RTU response frame.
///
/// Exception responses are returned as `ResponsePdu(Err(_))`.
pub fn decode_response(buf: &[u8]) -> Result<ResponseAdu<'_>> {
    let DecodedFrame { slave, pdu } = extract_frame(buf)
        .inspect_err(|_err| {
            #[cfg(feature = "log")]
            log::warn!("Dropping RTU response frame {buf:02X?}: {_err}");
        })?;
    let hdr = Header { slave };
    let pdu = ResponsePdu::try_from(pdu)
        .inspect_err(|_err| {
            #[cfg(feature = "log")]
            log::warn!("Failed to decode response PDU: {_err}");
        })?;
    Ok(ResponseAdu { hdr, pdu })
}
