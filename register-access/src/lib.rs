#![cfg_attr(not(test), no_std)]

//! Transactional access to a two-wire bus.
//!
//! Every exchange happens inside a [`BusSession`], obtained from [`Bus::open`].
//! The session releases the bus when dropped, and waits the configured settle
//! time after every read or write it performs.

#[macro_use]
extern crate logger;

use embedded_hal_async::delay::DelayNs;

mod i2c;

pub use i2c::I2cTwi;

/// Bus clock requested when acquiring the bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiSpeed {
    /// 100 kHz
    #[default]
    Standard,
    /// 400 kHz
    Fast,
}

impl TwiSpeed {
    pub const fn hz(self) -> u32 {
        match self {
            TwiSpeed::Standard => 100_000,
            TwiSpeed::Fast => 400_000,
        }
    }
}

/// A two-wire transport with an explicit open/close lifecycle.
///
/// Register pointers are always a single byte wide.
#[allow(async_fn_in_trait)]
pub trait TwiInterface {
    type Error;

    async fn open(&mut self, speed: TwiSpeed) -> Result<(), Self::Error>;

    async fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), Self::Error>;

    async fn read(
        &mut self,
        device: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Self::Error>;

    fn close(&mut self);
}

pub struct Bus<T, D> {
    twi: T,
    delay: D,
    settle_time_us: u32,
}

impl<T, D> Bus<T, D> {
    pub const fn new(twi: T, delay: D, settle_time_us: u32) -> Self {
        Self {
            twi,
            delay,
            settle_time_us,
        }
    }

    pub fn interface(&mut self) -> &mut T {
        &mut self.twi
    }

    pub fn delay(&mut self) -> &mut D {
        &mut self.delay
    }

    pub fn into_inner(self) -> (T, D) {
        (self.twi, self.delay)
    }
}

impl<T, D> Bus<T, D>
where
    T: TwiInterface,
    D: DelayNs,
{
    /// Acquires the bus. Nothing is transferred if acquisition fails.
    pub async fn open(&mut self, speed: TwiSpeed) -> Result<BusSession<'_, T, D>, T::Error> {
        if let Err(e) = self.twi.open(speed).await {
            debug!("Failed to acquire bus at {} Hz", speed.hz());
            return Err(e);
        }

        Ok(BusSession { bus: self })
    }

    /// Performs a single write in its own session.
    pub async fn write(
        &mut self,
        speed: TwiSpeed,
        device: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), T::Error> {
        self.open(speed).await?.write(device, register, data).await
    }

    /// Performs a single read in its own session.
    pub async fn read(
        &mut self,
        speed: TwiSpeed,
        device: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), T::Error> {
        self.open(speed).await?.read(device, register, buffer).await
    }
}

/// An acquired bus. Dropping the session closes the bus.
pub struct BusSession<'a, T, D>
where
    T: TwiInterface,
{
    bus: &'a mut Bus<T, D>,
}

impl<T, D> BusSession<'_, T, D>
where
    T: TwiInterface,
    D: DelayNs,
{
    pub async fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), T::Error> {
        trace!(
            "write {:#x}:{:#x}, {} bytes",
            device,
            register,
            data.len()
        );
        let result = self.bus.twi.write(device, register, data).await;
        self.settle().await;
        result
    }

    pub async fn read(
        &mut self,
        device: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), T::Error> {
        trace!(
            "read {:#x}:{:#x}, {} bytes",
            device,
            register,
            buffer.len()
        );
        let result = self.bus.twi.read(device, register, buffer).await;
        self.settle().await;
        result
    }

    async fn settle(&mut self) {
        // The gauge needs time to process a command before it accepts the next one.
        if self.bus.settle_time_us > 0 {
            self.bus.delay.delay_us(self.bus.settle_time_us).await;
        }
    }
}

impl<T, D> Drop for BusSession<'_, T, D>
where
    T: TwiInterface,
{
    fn drop(&mut self) {
        self.bus.twi.close();
    }
}
