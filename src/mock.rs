//! A fake gauge on a fake bus, for tests.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use embedded_hal_async::delay::DelayNs;
use register_access::{TwiInterface, TwiSpeed};

use crate::{
    ll::{commands, registers},
    Bq27z561, Config,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Open(TwiSpeed),
    Write {
        device: u8,
        register: u8,
        data: Vec<u8>,
    },
    Read {
        device: u8,
        register: u8,
        len: usize,
    },
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FakeError {
    Nack,
}

#[derive(Default)]
struct State {
    events: Vec<BusEvent>,
    delays_us: Vec<u32>,
    delays_ms: Vec<u32>,
    registers: BTreeMap<(u8, u8), Vec<u8>>,
    mac_blocks: BTreeMap<u16, Vec<u8>>,
    manufacturing_status: u16,
    selected: Option<u16>,
    fail_open: bool,
    fail_writes: bool,
    fail_reads: bool,
    ignore_toggles: bool,
}

impl State {
    fn gauge_address(&self) -> u8 {
        Config::default().address
    }

    fn write(&mut self, device: u8, register: u8, data: &[u8]) {
        if device == self.gauge_address() && register == registers::ALT_MANUFACTURER_ACCESS {
            if let [low, high] = *data {
                let command = u16::from_le_bytes([low, high]);
                match command {
                    _ if self.ignore_toggles => {}
                    commands::IMPEDANCE_TRACKING => self.manufacturing_status ^= 1 << 3,
                    commands::LIFETIME_TRACKING => self.manufacturing_status ^= 1 << 5,
                    _ => {}
                }
                self.selected = Some(command);
                return;
            }
        }

        self.registers.insert((device, register), data.to_vec());
    }

    fn response(&self, device: u8, register: u8) -> Vec<u8> {
        if device == self.gauge_address() && register == registers::ALT_MANUFACTURER_ACCESS {
            if let Some(command) = self.selected {
                let mut response = command.to_le_bytes().to_vec();
                if command == commands::MANUFACTURING_STATUS {
                    response.extend_from_slice(&self.manufacturing_status.to_le_bytes());
                } else if let Some(block) = self.mac_blocks.get(&command) {
                    response.extend_from_slice(block);
                }
                return response;
            }
        }

        self.registers
            .get(&(device, register))
            .cloned()
            .unwrap_or_default()
    }
}

pub struct FakeTwi {
    state: Rc<RefCell<State>>,
}

impl TwiInterface for FakeTwi {
    type Error = FakeError;

    async fn open(&mut self, speed: TwiSpeed) -> Result<(), FakeError> {
        let mut state = self.state.borrow_mut();
        state.events.push(BusEvent::Open(speed));
        if state.fail_open {
            Err(FakeError::Nack)
        } else {
            Ok(())
        }
    }

    async fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), FakeError> {
        let mut state = self.state.borrow_mut();
        state.events.push(BusEvent::Write {
            device,
            register,
            data: data.to_vec(),
        });
        if state.fail_writes {
            return Err(FakeError::Nack);
        }
        state.write(device, register, data);
        Ok(())
    }

    async fn read(
        &mut self,
        device: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), FakeError> {
        let mut state = self.state.borrow_mut();
        state.events.push(BusEvent::Read {
            device,
            register,
            len: buffer.len(),
        });

        let response = state.response(device, register);
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = response.get(i).copied().unwrap_or(0);
        }

        if state.fail_reads {
            Err(FakeError::Nack)
        } else {
            Ok(())
        }
    }

    fn close(&mut self) {
        self.state.borrow_mut().events.push(BusEvent::Close);
    }
}

pub struct FakeDelay {
    state: Rc<RefCell<State>>,
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.state.borrow_mut().delays_us.push(ns / 1_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.state.borrow_mut().delays_us.push(us);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.state.borrow_mut().delays_ms.push(ms);
    }
}

/// Builder for a fake gauge.
#[derive(Default)]
pub struct FakeGauge {
    state: State,
}

impl FakeGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_register(mut self, device: u8, register: u8, data: &[u8]) -> Self {
        self.state.registers.insert((device, register), data.to_vec());
        self
    }

    pub fn with_mac_block(mut self, command: u16, data: &[u8]) -> Self {
        self.state.mac_blocks.insert(command, data.to_vec());
        self
    }

    pub fn with_manufacturing_status(mut self, status: u16) -> Self {
        self.state.manufacturing_status = status;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.state.fail_open = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.state.fail_writes = true;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.state.fail_reads = true;
        self
    }

    /// Accepts toggle commands without changing the manufacturing status.
    pub fn ignoring_toggles(mut self) -> Self {
        self.state.ignore_toggles = true;
        self
    }

    pub fn into_driver(self) -> (Bq27z561<FakeTwi, FakeDelay>, Probe) {
        let state = Rc::new(RefCell::new(self.state));
        let driver = Bq27z561::new(
            FakeTwi {
                state: state.clone(),
            },
            FakeDelay {
                state: state.clone(),
            },
            Config::default(),
        );

        (driver, Probe { state })
    }
}

/// Inspects what the driver did to the fake gauge.
pub struct Probe {
    state: Rc<RefCell<State>>,
}

impl Probe {
    pub fn events(&self) -> Vec<BusEvent> {
        self.state.borrow().events.clone()
    }

    /// Reads and writes, without the open and close events.
    pub fn transfers(&self) -> Vec<BusEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, BusEvent::Write { .. } | BusEvent::Read { .. }))
            .collect()
    }

    /// Writes carrying exactly `data`.
    pub fn writes_of(&self, data: &[u8]) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, BusEvent::Write { data: d, .. } if d == data))
            .count()
    }

    pub fn closes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == BusEvent::Close)
            .count()
    }

    pub fn delays_ms(&self) -> Vec<u32> {
        self.state.borrow().delays_ms.clone()
    }

    pub fn delays_us(&self) -> Vec<u32> {
        self.state.borrow().delays_us.clone()
    }

    pub fn manufacturing_status(&self) -> u16 {
        self.state.borrow().manufacturing_status
    }
}
