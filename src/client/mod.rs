// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU client (master) session.
//!
//! A [`Client`] owns one physical bus. Every public operation runs a
//! complete exchange: encode, transmit, receive, validate and either
//! forward the decoded values to the [`RegisterStore`] or report the
//! exception of the server.

mod receiver;
mod timing;

#[cfg(test)]
mod mock;

pub use self::{receiver::FrameBuffer, timing::*};

use crate::{
    codec::rtu::{
        CRC_LEN, Header, MAX_FRAME_LEN, RequestAdu, ResponseAdu, SlaveId, client::decode_response,
    },
    error::Error,
    frame::*,
    util::packed_coils_len,
};

type Result<T> = core::result::Result<T, Error>;

/// Monotonic time source used for all RTU timing.
pub trait Clock {
    /// Monotonic time in microseconds.
    fn now_micros(&mut self) -> u64;

    /// Monotonic time in milliseconds.
    fn now_millis(&mut self) -> u64 {
        self.now_micros() / 1_000
    }

    /// Called on every iteration of a polling loop.
    fn spin(&mut self) {
        core::hint::spin_loop();
    }
}

/// Byte-level access to the serial line.
pub trait Transport: Clock {
    fn write(&mut self, bytes: &[u8]);

    /// Block until all written bytes have been transmitted.
    fn flush(&mut self);

    /// Number of received bytes that can be read without blocking.
    fn bytes_available(&mut self) -> usize;

    /// Only called if [`Transport::bytes_available`] reported input.
    fn read_byte(&mut self) -> u8;
}

/// Transmit-enable line of a half-duplex (RS-485) transceiver.
pub trait DirectionControl {
    fn set_transmit_enabled(&mut self, enabled: bool);
}

/// Full-duplex lines have no direction to switch.
impl DirectionControl for () {
    fn set_transmit_enabled(&mut self, _enabled: bool) {}
}

/// Receiver of decoded values.
///
/// Values are recorded one by one in ascending address order.
pub trait RegisterStore {
    fn record_coil(&mut self, address: Address, state: Coil);

    /// Discrete inputs are also known as input coils.
    fn record_discrete_input(&mut self, address: Address, state: Coil);

    fn record_holding_register(&mut self, address: Address, value: Word);

    fn record_input_register(&mut self, address: Address, value: Word);
}

/// Discards all values, e.g. for write-only clients.
impl RegisterStore for () {
    fn record_coil(&mut self, _: Address, _: Coil) {}
    fn record_discrete_input(&mut self, _: Address, _: Coil) {}
    fn record_holding_register(&mut self, _: Address, _: Word) {}
    fn record_input_register(&mut self, _: Address, _: Word) {}
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now_micros(&mut self) -> u64 {
        (**self).now_micros()
    }

    fn now_millis(&mut self) -> u64 {
        (**self).now_millis()
    }

    fn spin(&mut self) {
        (**self).spin();
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) {
        (**self).write(bytes);
    }

    fn flush(&mut self) {
        (**self).flush();
    }

    fn bytes_available(&mut self) -> usize {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> u8 {
        (**self).read_byte()
    }
}

impl<D: DirectionControl + ?Sized> DirectionControl for &mut D {
    fn set_transmit_enabled(&mut self, enabled: bool) {
        (**self).set_transmit_enabled(enabled);
    }
}

impl<S: RegisterStore + ?Sized> RegisterStore for &mut S {
    fn record_coil(&mut self, address: Address, state: Coil) {
        (**self).record_coil(address, state);
    }

    fn record_discrete_input(&mut self, address: Address, state: Coil) {
        (**self).record_discrete_input(address, state);
    }

    fn record_holding_register(&mut self, address: Address, value: Word) {
        (**self).record_holding_register(address, value);
    }

    fn record_input_register(&mut self, address: Address, value: Word) {
        (**self).record_input_register(address, value);
    }
}

/// Modbus RTU client (master) session for one physical bus.
#[derive(Debug)]
pub struct Client<T, D, S> {
    transport: T,
    direction: D,
    store: S,
    frame: FrameBuffer,
    timing: Timing,
    last_exception: u8,
}

impl<T, D, S> Client<T, D, S>
where
    T: Transport,
    D: DirectionControl,
    S: RegisterStore,
{
    /// Create a session and wait until the bus is idle.
    ///
    /// Any stale input is discarded until the line has been silent for
    /// T3.5.
    pub fn new(transport: T, direction: D, store: S, config: Config) -> Self {
        let mut client = Self {
            transport,
            direction,
            store,
            frame: FrameBuffer::new(),
            timing: Timing::from_config(&config),
            last_exception: 0,
        };
        client.discard_input();
        client
    }

    /// Drop all input until the line has been silent for T3.5.
    ///
    /// Returns the number of discarded bytes.
    pub fn discard_input(&mut self) -> usize {
        let discarded = receiver::discard_input(&mut self.transport, &self.timing);
        if discarded > 0 {
            #[cfg(feature = "log")]
            log::debug!("Discarded {discarded} stale byte(s)");
        }
        discarded
    }

    /// Read coils (function code `0x01`).
    pub fn read_coils(&mut self, slave: SlaveId, address: Address, quantity: Quantity) -> Result<()> {
        self.call(slave, Request::ReadCoils(address, quantity))
    }

    /// Read discrete inputs, also known as input coils (function code `0x02`).
    pub fn read_discrete_inputs(
        &mut self,
        slave: SlaveId,
        address: Address,
        quantity: Quantity,
    ) -> Result<()> {
        self.call(slave, Request::ReadDiscreteInputs(address, quantity))
    }

    /// Read holding registers (function code `0x03`).
    pub fn read_holding_registers(
        &mut self,
        slave: SlaveId,
        address: Address,
        quantity: Quantity,
    ) -> Result<()> {
        self.call(slave, Request::ReadHoldingRegisters(address, quantity))
    }

    /// Read input registers (function code `0x04`).
    pub fn read_input_registers(
        &mut self,
        slave: SlaveId,
        address: Address,
        quantity: Quantity,
    ) -> Result<()> {
        self.call(slave, Request::ReadInputRegisters(address, quantity))
    }

    /// Write a single coil (function code `0x05`).
    pub fn write_single_coil(&mut self, slave: SlaveId, address: Address, state: Coil) -> Result<()> {
        self.call(slave, Request::WriteSingleCoil(address, state))
    }

    /// Write a single holding register (function code `0x06`).
    pub fn write_single_register(
        &mut self,
        slave: SlaveId,
        address: Address,
        value: Word,
    ) -> Result<()> {
        self.call(slave, Request::WriteSingleRegister(address, value))
    }

    /// Write multiple coils (function code `0x0F`).
    pub fn write_multiple_coils(
        &mut self,
        slave: SlaveId,
        address: Address,
        states: &[Coil],
    ) -> Result<()> {
        check_frame_len(states.len(), 6 + packed_coils_len(states.len()))?;
        let mut packed = [0; MAX_FRAME_LEN];
        let coils = Coils::from_bools(states, &mut packed)?;
        self.call(slave, Request::WriteMultipleCoils(address, coils))
    }

    /// Write multiple holding registers (function code `0x10`).
    pub fn write_multiple_registers(
        &mut self,
        slave: SlaveId,
        address: Address,
        values: &[Word],
    ) -> Result<()> {
        check_frame_len(values.len(), 6 + values.len() * 2)?;
        let mut packed = [0; MAX_FRAME_LEN];
        let words = Data::from_words(values, &mut packed)?;
        self.call(slave, Request::WriteMultipleRegisters(address, words))
    }

    /// Code of the most recent exception response, `0` if none was received.
    ///
    /// Successful exchanges do not reset the code.
    #[must_use]
    pub const fn last_exception_code(&self) -> u8 {
        self.last_exception
    }

    #[must_use]
    pub const fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Raw bytes of the last request or response.
    #[must_use]
    pub fn frame(&self) -> &[u8] {
        self.frame.as_slice()
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_parts(self) -> (T, D, S) {
        let Self {
            transport,
            direction,
            store,
            ..
        } = self;
        (transport, direction, store)
    }

    fn call(&mut self, slave: SlaveId, request: Request<'_>) -> Result<()> {
        check_frame_len(request.quantity(), request.pdu_len())?;
        check_frame_len(request.quantity(), request.response_pdu_len())?;

        let adu = RequestAdu {
            hdr: Header { slave },
            pdu: RequestPdu(request),
        };
        self.frame.encode_request(adu)?;
        #[cfg(feature = "log")]
        log::debug!("Sending request to slave {slave}: {:02X?}", self.frame.as_slice());

        receiver::send(
            &mut self.transport,
            &mut self.direction,
            &self.timing,
            self.frame.as_slice(),
        );
        receiver::receive(&mut self.transport, &self.timing, &mut self.frame).inspect_err(
            |_err| {
                #[cfg(feature = "log")]
                log::warn!("No response from slave {slave}: {_err}");
            },
        )?;
        #[cfg(feature = "log")]
        log::debug!("Received response: {:02X?}", self.frame.as_slice());

        let ResponseAdu {
            hdr: _,
            pdu: ResponsePdu(response),
        } = decode_response(self.frame.as_slice())?;

        let function = FunctionCode::from(request);
        match response {
            Err(exception) if exception.function == function => {
                #[cfg(feature = "log")]
                log::debug!(
                    "Slave {slave} rejected function {function}: exception code {}",
                    exception.code
                );
                self.last_exception = exception.code;
                Err(Error::Exception(exception))
            }
            Err(exception) => Err(Error::FnCode(exception.function.exception_value())),
            Ok(response) => dispatch(&mut self.store, request, response),
        }
    }
}

/// Reject zero quantities and frames beyond [`MAX_FRAME_LEN`].
fn check_frame_len(quantity: usize, pdu_len: usize) -> Result<()> {
    if quantity == 0 || 1 + pdu_len + CRC_LEN > MAX_FRAME_LEN {
        return Err(Error::Quantity(
            Quantity::try_from(quantity).unwrap_or(Quantity::MAX),
        ));
    }
    Ok(())
}

/// Forward the values of a read response to the store.
///
/// The payload is checked against the requested quantity before the
/// first value is recorded.
fn dispatch<S: RegisterStore>(store: &mut S, request: Request<'_>, response: Response<'_>) -> Result<()> {
    use Request as Req;
    use Response as Rsp;

    match (request, response) {
        (Req::ReadCoils(address, quantity), Rsp::ReadCoils(coils)) => {
            for (offset, state) in coils.limit(quantity.into())?.into_iter().enumerate() {
                store.record_coil(address.wrapping_add(offset as u16), state);
            }
        }
        (Req::ReadDiscreteInputs(address, quantity), Rsp::ReadDiscreteInputs(coils)) => {
            for (offset, state) in coils.limit(quantity.into())?.into_iter().enumerate() {
                store.record_discrete_input(address.wrapping_add(offset as u16), state);
            }
        }
        (Req::ReadHoldingRegisters(address, quantity), Rsp::ReadHoldingRegisters(words)) => {
            for (offset, value) in words.limit(quantity.into())?.into_iter().enumerate() {
                store.record_holding_register(address.wrapping_add(offset as u16), value);
            }
        }
        (Req::ReadInputRegisters(address, quantity), Rsp::ReadInputRegisters(words)) => {
            for (offset, value) in words.limit(quantity.into())?.into_iter().enumerate() {
                store.record_input_register(address.wrapping_add(offset as u16), value);
            }
        }
        (Req::WriteSingleCoil(_, _), Rsp::WriteSingleCoil(_, _))
        | (Req::WriteSingleRegister(_, _), Rsp::WriteSingleRegister(_, _))
        | (Req::WriteMultipleCoils(_, _), Rsp::WriteMultipleCoils(_, _))
        | (Req::WriteMultipleRegisters(_, _), Rsp::WriteMultipleRegisters(_, _)) => {}
        (_, rsp) => return Err(Error::FnCode(FunctionCode::from(rsp).value())),
    }
    Ok(())
}
