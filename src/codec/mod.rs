// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::*, frame::*, util::*};
use byteorder::{BigEndian, ByteOrder};
use core::convert::TryFrom;

pub mod rtu;

type Result<T> = core::result::Result<T, Error>;

/// Positions of the PDU fields.
mod field {
    pub(super) const FN_CODE: usize = 0;
    /// Exception code of exception responses.
    pub(super) const EXCEPTION_CODE: usize = 1;
    /// Start address of requests and write responses.
    pub(super) const ADDRESS: usize = 1;
    /// Quantity or value of requests and write responses.
    pub(super) const VALUE: usize = 3;
    /// Byte count of write multiple requests.
    pub(super) const WRITE_BYTE_COUNT: usize = 5;
    pub(super) const WRITE_PAYLOAD: usize = 6;
    /// Byte count of read responses.
    pub(super) const BYTE_COUNT: usize = 1;
    pub(super) const PAYLOAD: usize = 2;
}

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::BufferSize);
        }
        let fn_err_code = bytes[field::FN_CODE];
        if fn_err_code & EXCEPTION_FLAG == 0 {
            return Err(Error::FnCode(fn_err_code));
        }
        let function = FunctionCode::new(fn_err_code & !EXCEPTION_FLAG);
        Ok(ExceptionResponse {
            function,
            code: bytes[field::EXCEPTION_CODE],
        })
    }
}

impl Request<'_> {
    /// Serialize the request PDU into `buf`.
    ///
    /// It returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferSize);
        }
        buf[field::FN_CODE] = FunctionCode::from(*self).value();

        use crate::frame::Request::*;
        match *self {
            ReadCoils(address, quantity)
            | ReadDiscreteInputs(address, quantity)
            | ReadHoldingRegisters(address, quantity)
            | ReadInputRegisters(address, quantity) => {
                BigEndian::write_u16(&mut buf[field::ADDRESS..], address);
                BigEndian::write_u16(&mut buf[field::VALUE..], quantity);
            }
            WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[field::ADDRESS..], address);
                BigEndian::write_u16(&mut buf[field::VALUE..], bool_to_u16_coil(state));
            }
            WriteSingleRegister(address, word) => {
                BigEndian::write_u16(&mut buf[field::ADDRESS..], address);
                BigEndian::write_u16(&mut buf[field::VALUE..], word);
            }
            WriteMultipleCoils(address, coils) => {
                let quantity = quantity_field(coils.len())?;
                let byte_count = byte_count_field(coils.packed_len())?;
                BigEndian::write_u16(&mut buf[field::ADDRESS..], address);
                BigEndian::write_u16(&mut buf[field::VALUE..], quantity);
                buf[field::WRITE_BYTE_COUNT] = byte_count;
                buf[field::WRITE_PAYLOAD..len].copy_from_slice(coils.packed());
            }
            WriteMultipleRegisters(address, words) => {
                let quantity = quantity_field(words.len())?;
                let byte_count = byte_count_field(words.len() * 2)?;
                BigEndian::write_u16(&mut buf[field::ADDRESS..], address);
                BigEndian::write_u16(&mut buf[field::VALUE..], quantity);
                buf[field::WRITE_BYTE_COUNT] = byte_count;
                buf[field::WRITE_PAYLOAD..len].copy_from_slice(words.payload());
            }
        }
        Ok(len)
    }
}

fn quantity_field(quantity: usize) -> Result<Quantity> {
    Quantity::try_from(quantity).map_err(|_| Error::Quantity(Quantity::MAX))
}

fn byte_count_field(byte_count: usize) -> Result<u8> {
    u8::try_from(byte_count).map_err(|_| Error::Quantity(Quantity::MAX))
}

impl<'r> TryFrom<&'r [u8]> for Response<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        use crate::frame::Response::*;
        if bytes.is_empty() {
            return Err(Error::BufferSize);
        }
        let fn_code = bytes[field::FN_CODE];
        if bytes.len() < min_response_pdu_len(FunctionCode::new(fn_code)) {
            return Err(Error::BufferSize);
        }
        use FunctionCode as f;
        let rsp = match FunctionCode::new(fn_code) {
            f::ReadCoils | f::ReadDiscreteInputs => {
                let byte_count = usize::from(bytes[field::BYTE_COUNT]);
                if field::PAYLOAD + byte_count != bytes.len() {
                    return Err(Error::ByteCount(bytes[field::BYTE_COUNT]));
                }
                // The quantity is unknown until it is matched with the request.
                let coils = Coils::from_packed(&bytes[field::PAYLOAD..], byte_count * 8);

                match FunctionCode::new(fn_code) {
                    f::ReadCoils => ReadCoils(coils),
                    _ => ReadDiscreteInputs(coils),
                }
            }
            f::ReadHoldingRegisters | f::ReadInputRegisters => {
                let byte_count = usize::from(bytes[field::BYTE_COUNT]);
                if field::PAYLOAD + byte_count != bytes.len() {
                    return Err(Error::ByteCount(bytes[field::BYTE_COUNT]));
                }
                let data = Data::from_raw(&bytes[field::PAYLOAD..], byte_count / 2);

                match FunctionCode::new(fn_code) {
                    f::ReadHoldingRegisters => ReadHoldingRegisters(data),
                    _ => ReadInputRegisters(data),
                }
            }
            f::WriteSingleCoil
            | f::WriteSingleRegister
            | f::WriteMultipleCoils
            | f::WriteMultipleRegisters => {
                let addr = BigEndian::read_u16(&bytes[field::ADDRESS..]);
                let payload = BigEndian::read_u16(&bytes[field::VALUE..]);
                match FunctionCode::new(fn_code) {
                    f::WriteSingleCoil => WriteSingleCoil(addr, payload),
                    f::WriteSingleRegister => WriteSingleRegister(addr, payload),
                    f::WriteMultipleCoils => WriteMultipleCoils(addr, payload),
                    _ => WriteMultipleRegisters(addr, payload),
                }
            }
            f::Custom(code) => return Err(Error::FnCode(code)),
        };
        Ok(rsp)
    }
}

impl<'r> TryFrom<&'r [u8]> for ResponsePdu<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        match bytes.first() {
            None => Err(Error::BufferSize),
            Some(fn_code) if fn_code & EXCEPTION_FLAG != 0 => {
                ExceptionResponse::try_from(bytes).map(|ex| ResponsePdu(Err(ex)))
            }
            Some(_) => Response::try_from(bytes).map(|rsp| ResponsePdu(Ok(rsp))),
        }
    }
}

const fn min_response_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode::*;
    match fn_code {
        ReadCoils | ReadDiscreteInputs | ReadInputRegisters | ReadHoldingRegisters => 2,
        WriteSingleCoil | WriteMultipleCoils | WriteSingleRegister | WriteMultipleRegisters => 5,
        Custom(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_response_from_bytes() {
        let data: &[u8] = &[0x79, 0x02];
        assert_eq!(
            ExceptionResponse::try_from(data).err().unwrap(),
            Error::FnCode(0x79)
        );

        let bytes: &[u8] = &[0x83, 0x02];
        let rsp = ExceptionResponse::try_from(bytes).unwrap();
        assert_eq!(
            rsp,
            ExceptionResponse {
                function: FunctionCode::ReadHoldingRegisters,
                code: 0x02,
            }
        );

        let bytes: &[u8] = &[0x83];
        assert!(ExceptionResponse::try_from(bytes).is_err());
    }

    #[test]
    fn exception_from_code() {
        assert_eq!(Exception::try_from(0x04), Ok(Exception::ServerDeviceFailure));
        assert_eq!(
            Exception::try_from(0x07).err().unwrap(),
            Error::ExceptionCode(0x07)
        );
    }

    #[test]
    fn test_min_response_pdu_len() {
        use FunctionCode::*;

        assert_eq!(min_response_pdu_len(ReadCoils), 2);
        assert_eq!(min_response_pdu_len(ReadDiscreteInputs), 2);
        assert_eq!(min_response_pdu_len(ReadInputRegisters), 2);
        assert_eq!(min_response_pdu_len(ReadHoldingRegisters), 2);
        assert_eq!(min_response_pdu_len(WriteSingleCoil), 5);
        assert_eq!(min_response_pdu_len(WriteSingleRegister), 5);
        assert_eq!(min_response_pdu_len(WriteMultipleCoils), 5);
        assert_eq!(min_response_pdu_len(WriteMultipleRegisters), 5);
    }

    #[test]
    fn pdu_field_positions() {
        let packed = &mut [0; 4];
        let words = Data::from_words(&[0x000A, 0x0102], packed).unwrap();
        let buf = &mut [0; 10];
        Request::WriteMultipleRegisters(0x0001, words)
            .encode(buf)
            .unwrap();
        assert_eq!(buf[field::FN_CODE], 0x10);
        assert_eq!(BigEndian::read_u16(&buf[field::ADDRESS..]), 0x0001);
        assert_eq!(BigEndian::read_u16(&buf[field::VALUE..]), 2);
        assert_eq!(buf[field::WRITE_BYTE_COUNT], 4);
        assert_eq!(&buf[field::WRITE_PAYLOAD..], &[0x00, 0x0A, 0x01, 0x02]);

        let bytes: &[u8] = &[0x04, 0x02, 0x12, 0x34];
        assert_eq!(usize::from(bytes[field::BYTE_COUNT]), 2);
        let Response::ReadInputRegisters(data) = Response::try_from(bytes).unwrap() else {
            panic!("unexpected response");
        };
        assert_eq!(data.payload(), &bytes[field::PAYLOAD..]);
    }

    mod serialize_requests {
        use super::*;

        #[test]
        fn read_coils() {
            let buf = &mut [0; 5];
            assert_eq!(Request::ReadCoils(0x0013, 0x0025).encode(buf).unwrap(), 5);
            assert_eq!(buf, &[0x01, 0x00, 0x13, 0x00, 0x25]);
        }

        #[test]
        fn read_discrete_inputs() {
            let buf = &mut [0; 5];
            Request::ReadDiscreteInputs(0x00C4, 0x0016)
                .encode(buf)
                .unwrap();
            assert_eq!(buf, &[0x02, 0x00, 0xC4, 0x00, 0x16]);
        }

        #[test]
        fn read_holding_registers() {
            let buf = &mut [0; 5];
            Request::ReadHoldingRegisters(0x006B, 0x0003)
                .encode(buf)
                .unwrap();
            assert_eq!(buf, &[0x03, 0x00, 0x6B, 0x00, 0x03]);
        }

        #[test]
        fn read_input_registers() {
            let buf = &mut [0; 5];
            Request::ReadInputRegisters(0x0008, 0x0001)
                .encode(buf)
                .unwrap();
            assert_eq!(buf, &[0x04, 0x00, 0x08, 0x00, 0x01]);
        }

        #[test]
        fn write_single_coil() {
            let buf = &mut [0; 5];
            Request::WriteSingleCoil(0x00AC, true).encode(buf).unwrap();
            assert_eq!(buf, &[0x05, 0x00, 0xAC, 0xFF, 0x00]);
            Request::WriteSingleCoil(0x00AC, false).encode(buf).unwrap();
            assert_eq!(buf, &[0x05, 0x00, 0xAC, 0x00, 0x00]);
        }

        #[test]
        fn write_single_register() {
            let buf = &mut [0; 5];
            Request::WriteSingleRegister(0x0001, 0x0003)
                .encode(buf)
                .unwrap();
            assert_eq!(buf, &[0x06, 0x00, 0x01, 0x00, 0x03]);
        }

        #[test]
        fn write_multiple_coils() {
            let states = &[
                true, false, true, true, false, false, true, true, true, false,
            ];
            let packed = &mut [0xFF; 2];
            let coils = Coils::from_bools(states, packed).unwrap();
            let buf = &mut [0; 8];
            let len = Request::WriteMultipleCoils(0x0013, coils)
                .encode(buf)
                .unwrap();
            assert_eq!(len, 8);
            assert_eq!(buf, &[0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]);
        }

        #[test]
        fn write_multiple_registers() {
            let packed = &mut [0; 4];
            let words = Data::from_words(&[0x000A, 0x0102], packed).unwrap();
            let buf = &mut [0; 10];
            let len = Request::WriteMultipleRegisters(0x0001, words)
                .encode(buf)
                .unwrap();
            assert_eq!(len, 10);
            assert_eq!(
                buf,
                &[0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
            );
        }

        #[test]
        fn buffer_too_small() {
            let buf = &mut [0; 4];
            assert_eq!(
                Request::ReadCoils(0, 1).encode(buf).err().unwrap(),
                Error::BufferSize
            );
        }
    }

    mod deserialize_responses {
        use super::*;

        #[test]
        fn read_coils() {
            let bytes: &[u8] = &[1, 1, 0b_0000_1001];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadCoils(Coils::from_packed(&[0b_0000_1001], 8))
            );
        }

        #[test]
        fn read_coils_with_invalid_byte_count() {
            let bytes: &[u8] = &[1, 2, 0x6];
            assert_eq!(
                Response::try_from(bytes).err().unwrap(),
                Error::ByteCount(2)
            );
        }

        #[test]
        fn read_discrete_inputs() {
            let bytes: &[u8] = &[2, 1, 0b_0000_1001];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadDiscreteInputs(Coils::from_packed(&[0b_0000_1001], 8))
            );
        }

        #[test]
        fn read_input_registers() {
            let bytes: &[u8] = &[4, 0x06, 0xAA, 0x00, 0xCC, 0xBB, 0xEE, 0xDD];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadInputRegisters(Data::from_raw(
                    &[0xAA, 0x00, 0xCC, 0xBB, 0xEE, 0xDD],
                    3
                ))
            );
        }

        #[test]
        fn read_holding_registers() {
            let bytes: &[u8] = &[3, 0x04, 0xAA, 0x00, 0x11, 0x11];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadHoldingRegisters(Data::from_raw(
                    &[0xAA, 0x00, 0x11, 0x11],
                    2
                ))
            );
        }

        #[test]
        fn write_single_coil() {
            let bytes: &[u8] = &[5, 0x00, 0xAC, 0xFF, 0x00];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(rsp, Response::WriteSingleCoil(0xAC, 0xFF00));

            let broken_bytes: &[u8] = &[5, 0x00];
            assert!(Response::try_from(broken_bytes).is_err());
        }

        #[test]
        fn write_multiple_registers() {
            let bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(rsp, Response::WriteMultipleRegisters(0x06, 2));
            let broken_bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00];
            assert!(Response::try_from(broken_bytes).is_err());
        }

        #[test]
        fn unsupported_function() {
            let bytes: &[u8] = &[0x2B, 0x0E, 0x01];
            assert_eq!(
                Response::try_from(bytes).err().unwrap(),
                Error::FnCode(0x2B)
            );
        }

        #[test]
        fn exception_pdu() {
            let bytes: &[u8] = &[0x81, 0x02];
            let ResponsePdu(rsp) = ResponsePdu::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Err(ExceptionResponse {
                    function: FunctionCode::ReadCoils,
                    code: 0x02
                })
            );
        }
    }
}
