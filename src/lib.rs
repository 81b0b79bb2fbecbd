#![cfg_attr(not(test), no_std)]

//! Driver for the TI BQ27Z561 single-cell fuel gauge.

#[macro_use]
extern crate logger;

use embedded_hal_async::delay::DelayNs;
use register_access::{Bus, TwiInterface};

pub mod golden_image;
pub mod ll;
mod status;

#[cfg(test)]
mod mock;

pub use golden_image::{ErrorCode, GoldenImage, GoldenImageError, ImageSummary};
pub use register_access::{I2cTwi, TwiSpeed};
pub use status::{BatteryStatus, ManufacturingStatus, SecurityKeys};

use ll::{commands, registers};

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError<E> {
    Transfer(E),
    Verify,
}

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// 7-bit bus address in normal operation.
    pub address: u8,

    /// 7-bit bus address while the gauge is in ROM mode.
    pub rom_address: u8,

    pub speed: TwiSpeed,

    /// Pause after every bus transfer. The gauge needs at least 66μs between transactions.
    pub settle_time_us: u32,

    pub unseal_key: [u8; 4],
    pub full_access_key: [u8; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: 0x55,
            rom_address: 0x0B,
            speed: TwiSpeed::Standard,
            settle_time_us: 1_000,
            unseal_key: [0x04, 0x14, 0x36, 0x72],
            full_access_key: [0xFF; 4],
        }
    }
}

pub struct Bq27z561<T, D> {
    driver: ll::Bq27z561Interface<T, D>,
    config: Config,
}

impl<T, D> Bq27z561<T, D> {
    pub const fn new(twi: T, delay: D, config: Config) -> Self {
        Self {
            driver: ll::Bq27z561Interface {
                bus: Bus::new(twi, delay, config.settle_time_us),
                address: config.address,
                speed: config.speed,
            },
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Raw register access, bypassing the typed accessors.
    pub fn interface_mut(&mut self) -> &mut ll::Bq27z561Interface<T, D> {
        &mut self.driver
    }

    pub fn into_inner(self) -> (T, D) {
        self.driver.bus.into_inner()
    }
}

impl<T, D> Bq27z561<T, D>
where
    T: TwiInterface,
    D: DelayNs,
{
    async fn read_mac<const N: usize>(&mut self, command: u16) -> Result<[u8; N], T::Error> {
        let mut block = [0xFF; N];
        self.driver
            .primed_read(registers::ALT_MANUFACTURER_ACCESS, command, &mut block)
            .await?;
        Ok(block)
    }

    pub async fn read_control_status(&mut self) -> Result<u16, T::Error> {
        self.driver.read_register(registers::CONTROL_STATUS).await
    }

    /// Returns the cell voltage in mV.
    pub async fn read_voltage(&mut self) -> Result<u16, T::Error> {
        self.driver.read_register(registers::VOLTAGE).await
    }

    pub async fn read_battery_status(&mut self) -> Result<BatteryStatus, T::Error> {
        let raw = self.driver.read_register(registers::BATTERY_STATUS).await?;
        Ok(BatteryStatus::from_bits_retain(raw))
    }

    /// Returns the battery current in mA. Negative values mean discharge.
    pub async fn read_current(&mut self) -> Result<i16, T::Error> {
        let raw = self.driver.read_register(registers::CURRENT).await?;
        Ok(raw as i16)
    }

    /// Returns the remaining capacity in mAh.
    pub async fn read_remaining_capacity(&mut self) -> Result<u16, T::Error> {
        self.driver.read_register(registers::REMAINING_CAPACITY).await
    }

    /// Returns the predicted full charge capacity in mAh.
    pub async fn read_full_charge_capacity(&mut self) -> Result<u16, T::Error> {
        self.driver
            .read_register(registers::FULL_CHARGE_CAPACITY)
            .await
    }

    /// Returns the relative state of charge in %.
    pub async fn read_relative_soc(&mut self) -> Result<u16, T::Error> {
        self.driver.read_register(registers::RELATIVE_SOC).await
    }

    /// Returns the state of health as % of the design capacity.
    pub async fn read_soh(&mut self) -> Result<u16, T::Error> {
        self.driver.read_register(registers::STATE_OF_HEALTH).await
    }

    /// Returns the design capacity in mAh.
    pub async fn read_design_capacity(&mut self) -> Result<u16, T::Error> {
        self.driver.read_register(registers::DESIGN_CAPACITY).await
    }

    pub async fn read_manufacturing_status(&mut self) -> Result<ManufacturingStatus, T::Error> {
        let [_, _, low, high] = self.read_mac::<4>(commands::MANUFACTURING_STATUS).await?;
        Ok(ManufacturingStatus::from_bits_retain(u16::from_le_bytes([
            low, high,
        ])))
    }

    pub async fn read_operation_status(&mut self) -> Result<u32, T::Error> {
        let [_, _, b2, b3, b4, b5] = self.read_mac::<6>(commands::OPERATION_STATUS).await?;
        Ok(u32::from_le_bytes([b4, b5, b2, b3]))
    }

    pub async fn read_gauging_status(&mut self) -> Result<u32, T::Error> {
        let [_, _, b2, b3, b4, b5] = self.read_mac::<6>(commands::GAUGING_STATUS).await?;
        Ok(u32::from_le_bytes([b4, b5, b2, b3]))
    }

    /// Returns the charging status flags in the low half-word and the temperature range
    /// in bits 23..16.
    pub async fn read_charging_status(&mut self) -> Result<u32, T::Error> {
        let [_, _, range, low, high] = self.read_mac::<5>(commands::CHARGING_STATUS).await?;
        Ok(u32::from_le_bytes([low, high, range, 0]))
    }

    pub async fn read_chem_id(&mut self) -> Result<u16, T::Error> {
        let [_, _, low, high] = self.read_mac::<4>(commands::CHEM_ID).await?;
        Ok(u16::from_le_bytes([low, high]))
    }

    pub async fn read_update_status(&mut self) -> Result<u8, T::Error> {
        let [_, _, status] = self.read_mac::<3>(commands::UPDATE_STATUS).await?;
        Ok(status)
    }

    /// Reads the keys stored in the gauge. The gauge only returns them when unsealed.
    pub async fn read_security_keys(&mut self) -> Result<SecurityKeys, T::Error> {
        let [_, _, u0, u1, u2, u3, f0, f1, f2, f3] =
            self.read_mac::<10>(commands::SECURITY_KEYS).await?;
        Ok(SecurityKeys {
            unseal: [u0, u1, u2, u3],
            full_access: [f0, f1, f2, f3],
        })
    }

    /// Sends the unseal key.
    ///
    /// Success only means the key was delivered. The gauge ignores a wrong key silently.
    pub async fn unseal(&mut self) -> Result<(), T::Error> {
        self.driver.send_key(self.config.unseal_key).await
    }

    /// Sends the full access key. The gauge must already be unsealed.
    pub async fn grant_full_access(&mut self) -> Result<(), T::Error> {
        self.driver.send_key(self.config.full_access_key).await
    }

    pub async fn seal(&mut self) -> Result<(), T::Error> {
        self.driver.send_command(commands::SEAL_DEVICE).await
    }

    /// Resets the gauge. Requires the gauge to be unsealed.
    pub async fn reset(&mut self) -> Result<(), T::Error> {
        self.driver.send_command(commands::DEVICE_RESET).await
    }

    /// Clears the lifetime data. Requires the gauge to be unsealed.
    pub async fn reset_lifetime_history(&mut self) -> Result<(), T::Error> {
        self.driver.send_command(commands::LIFETIME_DATA_RESET).await
    }

    /// Starts the gauge firmware if the gauge is stuck in ROM mode.
    pub async fn exit_rom_mode(&mut self) -> Result<(), T::Error> {
        self.driver
            .bus
            .write(
                TwiSpeed::Fast,
                self.config.rom_address,
                registers::ALT_MANUFACTURER_ACCESS,
                &[ll::EXECUTE_FIRMWARE],
            )
            .await
    }

    pub async fn is_impedance_tracking_enabled(&mut self) -> Result<bool, T::Error> {
        let status = self.read_manufacturing_status().await?;
        Ok(status.contains(ManufacturingStatus::GAUGE_EN))
    }

    pub async fn is_lifetime_tracking_enabled(&mut self) -> Result<bool, T::Error> {
        let status = self.read_manufacturing_status().await?;
        Ok(status.contains(ManufacturingStatus::LF_EN))
    }

    pub async fn set_impedance_tracking(
        &mut self,
        enabled: bool,
    ) -> Result<(), ConfigError<T::Error>> {
        self.set_capability(
            ManufacturingStatus::GAUGE_EN,
            commands::IMPEDANCE_TRACKING,
            enabled,
        )
        .await
    }

    pub async fn set_lifetime_tracking(
        &mut self,
        enabled: bool,
    ) -> Result<(), ConfigError<T::Error>> {
        self.set_capability(
            ManufacturingStatus::LF_EN,
            commands::LIFETIME_TRACKING,
            enabled,
        )
        .await
    }

    pub async fn enable_impedance_tracking(&mut self) -> Result<(), ConfigError<T::Error>> {
        self.set_impedance_tracking(true).await
    }

    pub async fn disable_impedance_tracking(&mut self) -> Result<(), ConfigError<T::Error>> {
        self.set_impedance_tracking(false).await
    }

    pub async fn enable_lifetime_tracking(&mut self) -> Result<(), ConfigError<T::Error>> {
        self.set_lifetime_tracking(true).await
    }

    pub async fn disable_lifetime_tracking(&mut self) -> Result<(), ConfigError<T::Error>> {
        self.set_lifetime_tracking(false).await
    }

    async fn set_capability(
        &mut self,
        flag: ManufacturingStatus,
        toggle: u16,
        enabled: bool,
    ) -> Result<(), ConfigError<T::Error>> {
        let status = self
            .read_manufacturing_status()
            .await
            .map_err(ConfigError::Transfer)?;

        // The command flips the flag, so it must only be sent when the flag differs.
        if status.contains(flag) == enabled {
            return Ok(());
        }

        self.driver
            .send_command(toggle)
            .await
            .map_err(ConfigError::Transfer)?;

        let status = self
            .read_manufacturing_status()
            .await
            .map_err(ConfigError::Transfer)?;

        if status.contains(flag) != enabled {
            warn!("Manufacturing status {:#x} after toggling {:#x}", status.bits(), toggle);
            return Err(ConfigError::Verify);
        }

        Ok(())
    }
}
