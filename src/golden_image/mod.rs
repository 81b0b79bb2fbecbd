//! Golden image (flash stream) interpreter.
//!
//! A golden image is a line-oriented script produced by the vendor's tooling:
//!
//! ```text
//! W:AA3E0200      write 02 00 to register 0x3E of device 0xAA >> 1
//! C:AA400F00      read back two bytes from register 0x40 and expect 0F 00
//! X:100           wait 100 ms
//! ```
//!
//! Lines are executed in order and execution stops at the first error. Writes that were
//! already applied are not rolled back.

use embedded_hal_async::delay::DelayNs;
use register_access::TwiInterface;

use crate::Bq27z561;

mod parser;

pub use parser::{
    decode_hex_pair, encode_hex_pair, Directive, Directives, ParseError, ParseErrorKind,
    Payload, MAX_PAYLOAD,
};

/// An unparsed golden image.
#[derive(Clone, Copy, Debug)]
pub struct GoldenImage<'a> {
    script: &'a [u8],
}

impl<'a> GoldenImage<'a> {
    pub const fn new(script: &'a [u8]) -> Self {
        Self { script }
    }

    pub fn directives(&self) -> Directives<'a> {
        Directives::new(self.script)
    }

    /// Parses the whole image without touching the bus.
    pub fn validate(&self) -> Result<ImageSummary, ParseError> {
        let mut summary = ImageSummary::default();
        for directive in self.directives() {
            let (_, directive) = directive?;
            summary.record(&directive);
        }
        Ok(summary)
    }
}

impl<'a> From<&'a str> for GoldenImage<'a> {
    fn from(script: &'a str) -> Self {
        Self::new(script.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for GoldenImage<'a> {
    fn from(script: &'a [u8]) -> Self {
        Self::new(script)
    }
}

/// Number of directives of each kind executed or found in an image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImageSummary {
    pub writes: usize,
    pub compares: usize,
    pub delays: usize,
    pub total_delay_ms: u32,
}

impl ImageSummary {
    fn record(&mut self, directive: &Directive) {
        match directive {
            Directive::Write { .. } => self.writes += 1,
            Directive::Compare { .. } => self.compares += 1,
            Directive::Delay { ms } => {
                self.delays += 1;
                self.total_delay_ms = self.total_delay_ms.saturating_add(*ms);
            }
        }
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GoldenImageError<E> {
    /// The script is malformed. Nothing past the offending line was executed.
    Parse(ParseError),
    /// A Compare line did not match the data read from the device.
    VerificationMismatch { line: usize },
    /// The bus transfer of a Write or Compare line failed.
    Transfer { line: usize, error: E },
}

impl<E> GoldenImageError<E> {
    /// 1-based number of the line that stopped execution.
    pub fn line(&self) -> usize {
        match self {
            GoldenImageError::Parse(error) => error.line,
            GoldenImageError::VerificationMismatch { line }
            | GoldenImageError::Transfer { line, .. } => *line,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            GoldenImageError::Parse(error) => match error.kind {
                ParseErrorKind::ColonExpected => ErrorCode::ColonExpected,
                ParseErrorKind::Conversion => ErrorCode::ConversionError,
                ParseErrorKind::InsufficientBytes => ErrorCode::InsufficientBytes,
                ParseErrorKind::PayloadTooLong => ErrorCode::PayloadTooLong,
                ParseErrorKind::UnrecognizedOpcode(_) => ErrorCode::UnrecognizedOpcode,
            },
            GoldenImageError::VerificationMismatch { .. } => ErrorCode::VerificationMismatch,
            GoldenImageError::Transfer { .. } => ErrorCode::Transfer,
        }
    }
}

impl<E> From<ParseError> for GoldenImageError<E> {
    fn from(error: ParseError) -> Self {
        GoldenImageError::Parse(error)
    }
}

/// Flat status code of an image run, for reporting to a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorCode {
    None = 0,
    ColonExpected = 1,
    ConversionError = 2,
    InsufficientBytes = 3,
    VerificationMismatch = 4,
    UnrecognizedOpcode = 5,
    PayloadTooLong = 6,
    Transfer = 7,
}

impl<E> From<&Result<ImageSummary, GoldenImageError<E>>> for ErrorCode {
    fn from(result: &Result<ImageSummary, GoldenImageError<E>>) -> Self {
        match result {
            Ok(_) => ErrorCode::None,
            Err(error) => error.code(),
        }
    }
}

impl<T, D> Bq27z561<T, D>
where
    T: TwiInterface,
    D: DelayNs,
{
    /// Executes a golden image line by line.
    pub async fn execute_golden_image(
        &mut self,
        image: GoldenImage<'_>,
    ) -> Result<ImageSummary, GoldenImageError<T::Error>> {
        let mut summary = ImageSummary::default();

        for directive in image.directives() {
            let (line, directive) = directive?;

            match &directive {
                Directive::Write {
                    device,
                    register,
                    payload,
                } => {
                    debug!(
                        "Line {}: writing {} bytes to {:#x}:{:#x}",
                        line,
                        payload.len(),
                        device,
                        register
                    );
                    self.driver
                        .flash_block_write(*device, *register, payload)
                        .await
                        .map_err(|error| GoldenImageError::Transfer { line, error })?;
                }
                Directive::Compare {
                    device,
                    register,
                    payload,
                } => {
                    debug!(
                        "Line {}: comparing {} bytes at {:#x}:{:#x}",
                        line,
                        payload.len(),
                        device,
                        register
                    );
                    let mut buffer = [0; MAX_PAYLOAD];
                    let readback = &mut buffer[..payload.len()];

                    self.driver
                        .read_block(*device, *register, readback)
                        .await
                        .map_err(|error| GoldenImageError::Transfer { line, error })?;

                    if readback[..] != payload[..] {
                        warn!("Line {}: readback does not match golden image", line);
                        return Err(GoldenImageError::VerificationMismatch { line });
                    }
                }
                Directive::Delay { ms } => {
                    debug!("Line {}: waiting {} ms", line, ms);
                    self.driver.bus.delay().delay_ms(*ms).await;
                }
            }

            summary.record(&directive);
        }

        info!(
            "Golden image applied: {} writes, {} compares, {} delays",
            summary.writes,
            summary.compares,
            summary.delays
        );

        Ok(summary)
    }
}
