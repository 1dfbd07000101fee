//! Serial port opening
//!
//! Line settings are kept as plain values so they can live in the settings
//! file and come from the command line; they are only turned into
//! `tokio_serial` types when the port is opened.
//!
//! The port is opened in async mode, where reads wait for readiness instead
//! of timing out; the receive loop's select keeps shutdown responsive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_serial::{DataBits, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::info;

/// Parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            "mark" | "space" => Err(format!("{} parity is not supported on this platform", s)),
            _ => Err(format!("unknown parity '{}' (expected none, odd or even)", s)),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Parity::None => "none",
            Parity::Odd => "odd",
            Parity::Even => "even",
        })
    }
}

impl From<Parity> for tokio_serial::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Everything needed to open a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl fmt::Display for LineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        write!(
            f,
            "{} @ {} {}{}{}",
            self.port, self.baud_rate, self.data_bits, parity, self.stop_bits
        )
    }
}

/// Parse a data-bits value (5 to 8)
pub fn parse_data_bits(s: &str) -> Result<u8, String> {
    let bits: u8 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    data_bits(bits).map(|_| bits)
}

/// Parse a stop-bits value (1 or 2)
pub fn parse_stop_bits(s: &str) -> Result<u8, String> {
    let bits: u8 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    stop_bits(bits).map(|_| bits)
}

fn data_bits(bits: u8) -> Result<DataBits, String> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(format!("data bits must be 5 to 8, got {}", bits)),
    }
}

fn stop_bits(bits: u8) -> Result<StopBits, String> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(format!("stop bits must be 1 or 2, got {}", bits)),
    }
}

/// Open the device described by `config`
pub fn open(config: &LineConfig) -> Result<SerialStream, tokio_serial::Error> {
    let invalid = |msg: String| tokio_serial::Error::new(tokio_serial::ErrorKind::InvalidInput, msg);

    let stream = tokio_serial::new(&config.port, config.baud_rate)
        .data_bits(data_bits(config.data_bits).map_err(invalid)?)
        .stop_bits(stop_bits(config.stop_bits).map_err(invalid)?)
        .parity(config.parity.into())
        .open_native_async()?;

    info!("Opened serial port {}", config);
    Ok(stream)
}
