//! Register map and raw access primitives.

use embedded_hal_async::delay::DelayNs;
use register_access::{Bus, TwiInterface, TwiSpeed};

/// Standard command registers.
pub mod registers {
    pub const CONTROL_STATUS: u8 = 0x00;
    pub const VOLTAGE: u8 = 0x08;
    pub const BATTERY_STATUS: u8 = 0x0A;
    pub const CURRENT: u8 = 0x0C;
    pub const REMAINING_CAPACITY: u8 = 0x10;
    pub const FULL_CHARGE_CAPACITY: u8 = 0x12;
    pub const RELATIVE_SOC: u8 = 0x2C;
    pub const STATE_OF_HEALTH: u8 = 0x2E;
    pub const DESIGN_CAPACITY: u8 = 0x3C;
    /// Writing a 16-bit command here selects the block returned by the next read.
    pub const ALT_MANUFACTURER_ACCESS: u8 = 0x3E;
}

/// Manufacturer access subcommands, written little-endian to
/// [`registers::ALT_MANUFACTURER_ACCESS`].
pub mod commands {
    pub const CHEM_ID: u16 = 0x0006;
    pub const IMPEDANCE_TRACKING: u16 = 0x0021;
    pub const LIFETIME_TRACKING: u16 = 0x0023;
    pub const LIFETIME_DATA_RESET: u16 = 0x0028;
    pub const SEAL_DEVICE: u16 = 0x0030;
    pub const SECURITY_KEYS: u16 = 0x0035;
    pub const DEVICE_RESET: u16 = 0x0041;
    pub const OPERATION_STATUS: u16 = 0x0054;
    pub const CHARGING_STATUS: u16 = 0x0055;
    pub const GAUGING_STATUS: u16 = 0x0056;
    pub const MANUFACTURING_STATUS: u16 = 0x0057;
    /// Data flash address of the Update Status byte.
    pub const UPDATE_STATUS: u16 = 0x418C;
}

/// Sent to the ROM-mode address to start the gauge firmware.
pub(crate) const EXECUTE_FIRMWARE: u8 = 0x08;

/// The gauge's bus, bound to its address and normal operating speed.
pub struct Bq27z561Interface<T, D> {
    pub bus: Bus<T, D>,
    pub address: u8,
    pub speed: TwiSpeed,
}

impl<T, D> Bq27z561Interface<T, D>
where
    T: TwiInterface,
    D: DelayNs,
{
    /// Reads a 16-bit little-endian standard command.
    pub async fn read_register(&mut self, register: u8) -> Result<u16, T::Error> {
        let mut bytes = [0; 2];
        self.bus
            .read(self.speed, self.address, register, &mut bytes)
            .await?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Writes `command` to `register` and reads the selected block back, within one session.
    ///
    /// The read is performed even if the command write failed, and `buffer` holds whatever
    /// the gauge returned. The write error takes precedence in the result.
    pub async fn primed_read(
        &mut self,
        register: u8,
        command: u16,
        buffer: &mut [u8],
    ) -> Result<(), T::Error> {
        let mut session = self.bus.open(self.speed).await?;

        let selected = session
            .write(self.address, register, &command.to_le_bytes())
            .await;
        let read = session.read(self.address, register, buffer).await;

        selected.and(read)
    }

    /// Writes a block to any device on the bus, within one session.
    pub async fn flash_block_write(
        &mut self,
        device: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), T::Error> {
        self.bus.write(self.speed, device, register, data).await
    }

    /// Reads a block from any device on the bus, within one session.
    pub async fn read_block(
        &mut self,
        device: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), T::Error> {
        self.bus.read(self.speed, device, register, buffer).await
    }

    /// Sends a manufacturer access command that carries no data.
    pub async fn send_command(&mut self, command: u16) -> Result<(), T::Error> {
        self.flash_block_write(
            self.address,
            registers::ALT_MANUFACTURER_ACCESS,
            &command.to_le_bytes(),
        )
        .await
    }

    /// Sends a security key as two half-words within one session.
    pub async fn send_key(&mut self, key: [u8; 4]) -> Result<(), T::Error> {
        let mut session = self.bus.open(self.speed).await?;

        for word in key.chunks(2) {
            session
                .write(self.address, registers::ALT_MANUFACTURER_ACCESS, word)
                .await?;
        }

        Ok(())
    }
}
