use heapless::Vec;

/// Maximum number of data bytes carried by a single Write or Compare line.
pub const MAX_PAYLOAD: usize = 31;

/// Device address and register precede the payload on every Write or Compare line.
const MAX_LINE_BYTES: usize = MAX_PAYLOAD + 2;

pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// A single line of a golden image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Write `payload` starting at `register`.
    Write {
        /// 7-bit bus address. Scripts carry it left-shifted by one.
        device: u8,
        register: u8,
        payload: Payload,
    },
    /// Read back `payload.len()` bytes from `register` and require them to equal `payload`.
    Compare {
        /// 7-bit bus address. Scripts carry it left-shifted by one.
        device: u8,
        register: u8,
        payload: Payload,
    },
    /// Wait before processing the next line.
    Delay { ms: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseErrorKind {
    /// The opcode is not followed by `:`.
    ColonExpected,
    /// A byte is not a pair of hex digits, or a delay does not fit in 32 bits.
    Conversion,
    /// A Write or Compare line lacks an address, a register or data.
    InsufficientBytes,
    /// A Write or Compare line carries more than [`MAX_PAYLOAD`] data bytes.
    PayloadTooLong,
    /// The line starts with something other than `W`, `C` or `X`. An empty line reports `\n`.
    UnrecognizedOpcode(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub kind: ParseErrorKind,
}

/// Decodes two ASCII hex digits into a byte.
pub fn decode_hex_pair(high: u8, low: u8) -> Option<u8> {
    let high = char::from(high).to_digit(16)?;
    let low = char::from(low).to_digit(16)?;

    Some(((high << 4) | low) as u8)
}

/// Encodes a byte as two uppercase ASCII hex digits.
pub fn encode_hex_pair(byte: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

    [DIGITS[(byte >> 4) as usize], DIGITS[(byte & 0x0F) as usize]]
}

/// Iterator over the directives of a script, paired with their line numbers.
///
/// Every line must start with an opcode. The iterator stops after the first error.
pub struct Directives<'a> {
    rest: &'a [u8],
    line: usize,
}

impl<'a> Directives<'a> {
    pub(crate) fn new(script: &'a [u8]) -> Self {
        Self {
            rest: script,
            line: 0,
        }
    }
}

impl Iterator for Directives<'_> {
    type Item = Result<(usize, Directive), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let end = self
            .rest
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(self.rest.len());
        let raw = &self.rest[..end];
        self.rest = self.rest.get(end + 1..).unwrap_or(&[]);
        self.line += 1;

        let line = raw.strip_suffix(b"\r").unwrap_or(raw);
        let result = parse_line(line).map_err(|kind| ParseError {
            line: self.line,
            kind,
        });

        if result.is_err() {
            self.rest = &[];
        }

        Some(result.map(|directive| (self.line, directive)))
    }
}

fn parse_line(line: &[u8]) -> Result<Directive, ParseErrorKind> {
    let Some((&opcode, rest)) = line.split_first() else {
        return Err(ParseErrorKind::UnrecognizedOpcode(b'\n'));
    };

    match opcode {
        b'W' | b'C' => {
            let (device, register, payload) = parse_block(expect_colon(rest)?)?;

            Ok(if opcode == b'W' {
                Directive::Write {
                    device,
                    register,
                    payload,
                }
            } else {
                Directive::Compare {
                    device,
                    register,
                    payload,
                }
            })
        }
        b'X' => Ok(Directive::Delay {
            ms: parse_decimal(expect_colon(rest)?)?,
        }),
        other => Err(ParseErrorKind::UnrecognizedOpcode(other)),
    }
}

fn expect_colon(rest: &[u8]) -> Result<&[u8], ParseErrorKind> {
    rest.strip_prefix(b":")
        .ok_or(ParseErrorKind::ColonExpected)
}

fn trim_start(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', tail @ ..] = bytes {
        bytes = tail;
    }
    bytes
}

fn parse_block(mut rest: &[u8]) -> Result<(u8, u8, Payload), ParseErrorKind> {
    let mut bytes = Vec::<u8, MAX_LINE_BYTES>::new();

    loop {
        rest = trim_start(rest);
        match rest {
            [] => break,
            [high, low, tail @ ..] => {
                let byte = decode_hex_pair(*high, *low).ok_or(ParseErrorKind::Conversion)?;
                bytes
                    .push(byte)
                    .map_err(|_| ParseErrorKind::PayloadTooLong)?;
                rest = tail;
            }
            [_] => return Err(ParseErrorKind::Conversion),
        }
    }

    let [address, register, data @ ..] = bytes.as_slice() else {
        return Err(ParseErrorKind::InsufficientBytes);
    };
    if data.is_empty() {
        return Err(ParseErrorKind::InsufficientBytes);
    }

    let payload = Payload::from_slice(data).map_err(|_| ParseErrorKind::PayloadTooLong)?;

    Ok((address >> 1, *register, payload))
}

/// Parses the leading decimal digits. Text after the digits is ignored, and no digits
/// at all read as 0.
fn parse_decimal(rest: &[u8]) -> Result<u32, ParseErrorKind> {
    let rest = trim_start(rest);
    let len = rest
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());

    rest[..len].iter().try_fold(0u32, |acc, &digit| {
        acc.checked_mul(10)
            .and_then(|acc| acc.checked_add(u32::from(digit - b'0')))
            .ok_or(ParseErrorKind::Conversion)
    })
}
