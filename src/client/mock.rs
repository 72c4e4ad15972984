// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Simulated serial bus with a virtual clock.

use std::{cell::RefCell, collections::VecDeque, rc::Rc, vec::Vec};

use super::{Clock, DirectionControl, RegisterStore, Transport};
use crate::frame::{Address, Coil, Word};

#[derive(Debug, Default)]
struct Bus {
    now: u64,
    tick: u64,
    rx: VecDeque<(u64, u8)>,
    replies: VecDeque<Vec<(u64, u8)>>,
    sent: Vec<Vec<u8>>,
    flushed_at: Vec<u64>,
    direction: Vec<(bool, u64)>,
}

impl Bus {
    fn enqueue(&mut self, bytes: impl IntoIterator<Item = (u64, u8)>) {
        self.rx.extend(bytes);
        self.rx.make_contiguous().sort_by_key(|(at, _)| *at);
    }
}

/// Shared handle, one clone serves as transport and another one as
/// direction control.
#[derive(Debug, Clone, Default)]
pub(crate) struct SimBus(Rc<RefCell<Bus>>);

impl SimBus {
    /// Every spin advances the clock by `tick` µs.
    pub(crate) fn new(tick: u64) -> Self {
        let bus = Bus {
            tick,
            ..Default::default()
        };
        Self(Rc::new(RefCell::new(bus)))
    }

    /// Bytes arriving at absolute times `start`, `start + gap`, ...
    pub(crate) fn schedule(&self, start: u64, gap: u64, bytes: &[u8]) {
        self.0.borrow_mut().enqueue(timed(start, gap, bytes));
    }

    /// Bytes arriving relative to the flush of the next request.
    pub(crate) fn reply(&self, delay: u64, gap: u64, bytes: &[u8]) {
        self.reply_with(timed(delay, gap, bytes).collect());
    }

    pub(crate) fn reply_with(&self, bytes: Vec<(u64, u8)>) {
        self.0.borrow_mut().replies.push_back(bytes);
    }

    pub(crate) fn now(&self) -> u64 {
        self.0.borrow().now
    }

    pub(crate) fn pending(&self) -> usize {
        self.0.borrow().rx.len()
    }

    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.0.borrow().sent.clone()
    }

    pub(crate) fn flushed_at(&self) -> Vec<u64> {
        self.0.borrow().flushed_at.clone()
    }

    pub(crate) fn direction_switches(&self) -> Vec<(bool, u64)> {
        self.0.borrow().direction.clone()
    }
}

pub(crate) fn timed(start: u64, gap: u64, bytes: &[u8]) -> impl Iterator<Item = (u64, u8)> + '_ {
    bytes
        .iter()
        .enumerate()
        .map(move |(i, byte)| (start + i as u64 * gap, *byte))
}

impl Clock for SimBus {
    fn now_micros(&mut self) -> u64 {
        self.0.borrow().now
    }

    fn spin(&mut self) {
        let mut bus = self.0.borrow_mut();
        let tick = bus.tick;
        bus.now += tick;
    }
}

impl Transport for SimBus {
    fn write(&mut self, bytes: &[u8]) {
        self.0.borrow_mut().sent.push(bytes.to_vec());
    }

    fn flush(&mut self) {
        let mut bus = self.0.borrow_mut();
        let now = bus.now;
        bus.flushed_at.push(now);
        if let Some(reply) = bus.replies.pop_front() {
            bus.enqueue(reply.into_iter().map(|(at, byte)| (now + at, byte)));
        }
    }

    fn bytes_available(&mut self) -> usize {
        let bus = self.0.borrow();
        bus.rx.iter().take_while(|(at, _)| *at <= bus.now).count()
    }

    fn read_byte(&mut self) -> u8 {
        let mut bus = self.0.borrow_mut();
        let now = bus.now;
        let ready = matches!(bus.rx.front(), Some((at, _)) if *at <= now);
        assert!(ready, "read_byte without available input at {now} µs");
        bus.rx.pop_front().map(|(_, byte)| byte).unwrap_or_default()
    }
}

impl DirectionControl for SimBus {
    fn set_transmit_enabled(&mut self, enabled: bool) {
        let mut bus = self.0.borrow_mut();
        let now = bus.now;
        bus.direction.push((enabled, now));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Record {
    Coil(Address, Coil),
    DiscreteInput(Address, Coil),
    HoldingRegister(Address, Word),
    InputRegister(Address, Word),
}

#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub(crate) records: Vec<Record>,
}

impl RegisterStore for Recorder {
    fn record_coil(&mut self, address: Address, state: Coil) {
        self.records.push(Record::Coil(address, state));
    }

    fn record_discrete_input(&mut self, address: Address, state: Coil) {
        self.records.push(Record::DiscreteInput(address, state));
    }

    fn record_holding_register(&mut self, address: Address, value: Word) {
        self.records.push(Record::HoldingRegister(address, value));
    }

    fn record_input_register(&mut self, address: Address, value: Word) {
        self.records.push(Record::InputRegister(address, value));
    }
}
