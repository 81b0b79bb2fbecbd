use embedded_hal_async::i2c::{I2c as AsyncI2c, Operation};

use crate::{TwiInterface, TwiSpeed};

/// Adapts an `embedded-hal-async` I2C bus to [`TwiInterface`].
///
/// The bus clock is configured by the HAL when the peripheral is created, so
/// `open` only remembers the requested speed.
pub struct I2cTwi<I> {
    pub i2c: I,
    speed: TwiSpeed,
}

impl<I> I2cTwi<I> {
    pub const fn new(i2c: I) -> Self {
        Self {
            i2c,
            speed: TwiSpeed::Standard,
        }
    }

    /// The speed requested by the most recent `open`.
    pub fn speed(&self) -> TwiSpeed {
        self.speed
    }

    pub fn into_inner(self) -> I {
        self.i2c
    }
}

impl<I> TwiInterface for I2cTwi<I>
where
    I: AsyncI2c,
{
    type Error = I::Error;

    async fn open(&mut self, speed: TwiSpeed) -> Result<(), Self::Error> {
        self.speed = speed;
        Ok(())
    }

    async fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.i2c
            .transaction(
                device,
                &mut [Operation::Write(&[register]), Operation::Write(data)],
            )
            .await
    }

    async fn read(
        &mut self,
        device: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.i2c.write_read(device, &[register], buffer).await
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod test {
    use core::convert::Infallible;

    use embedded_hal_async::i2c::ErrorType;

    use super::*;

    #[derive(Default)]
    struct ScriptedI2c {
        transactions: Vec<(u8, Vec<String>)>,
    }

    impl ErrorType for ScriptedI2c {
        type Error = Infallible;
    }

    impl AsyncI2c for ScriptedI2c {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            let mut log = Vec::new();
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => log.push(format!("W{bytes:02X?}")),
                    Operation::Read(buffer) => {
                        for (i, byte) in buffer.iter_mut().enumerate() {
                            *byte = i as u8 + 1;
                        }
                        log.push(format!("R{}", buffer.len()));
                    }
                }
            }
            self.transactions.push((address, log));
            Ok(())
        }
    }

    #[async_std::test]
    async fn write_sends_register_then_data_in_one_transaction() {
        let mut twi = I2cTwi::new(ScriptedI2c::default());

        twi.write(0x55, 0x3E, &[0x21, 0x00]).await.unwrap();

        assert_eq!(
            twi.i2c.transactions,
            [(0x55, vec!["W[3E]".to_string(), "W[21, 00]".to_string()])]
        );
    }

    #[async_std::test]
    async fn read_selects_register_then_reads() {
        let mut twi = I2cTwi::new(ScriptedI2c::default());
        let mut buffer = [0; 2];

        twi.read(0x55, 0x08, &mut buffer).await.unwrap();

        assert_eq!(buffer, [1, 2]);
        assert_eq!(
            twi.i2c.transactions,
            [(0x55, vec!["W[08]".to_string(), "R2".to_string()])]
        );
    }

    #[async_std::test]
    async fn open_records_requested_speed() {
        let mut twi = I2cTwi::new(ScriptedI2c::default());
        assert_eq!(twi.speed(), TwiSpeed::Standard);

        twi.open(TwiSpeed::Fast).await.unwrap();

        assert_eq!(twi.speed(), TwiSpeed::Fast);
        assert!(twi.into_inner().transactions.is_empty());
    }
}
