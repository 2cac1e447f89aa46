//! Address types for the virtual layers of the stack. Carrier endpoints
//! are plain `std::net::SocketAddr`; everything above them is virtual.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// A 6-byte MAC address, canonical form `XX:XX:XX:XX:XX:XX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mac([u8; 6]);

impl Mac {
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Mac {
        Mac([a, b, c, d, e, f])
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let o = self.0;
        write!(
            fmt,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Error returned when a string is not a valid MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMac(pub String);

impl fmt::Display for InvalidMac {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Invalid MAC address: {}", self.0)
    }
}

impl Error for InvalidMac {}

impl FromStr for Mac {
    type Err = InvalidMac;

    /// Parses a MAC address. Lowercase hex digits and `-` separators are
    /// accepted and normalized to the canonical form.
    fn from_str(s: &str) -> Result<Mac, InvalidMac> {
        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in s.split(|c| c == ':' || c == '-') {
            if count == 6 || part.len() != 2 {
                return Err(InvalidMac(s.to_owned()));
            }
            octets[count] =
                u8::from_str_radix(part, 16).map_err(|_| InvalidMac(s.to_owned()))?;
            count += 1;
        }
        if count != 6 {
            return Err(InvalidMac(s.to_owned()));
        }
        Ok(Mac(octets))
    }
}

impl Serialize for Mac {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Mac {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Mac, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A virtual IP: the symbolic identifier of a host at the network layer,
/// independent of the carrier endpoint it is reached on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Vip(String);

impl Vip {
    pub fn new<S: Into<String>>(name: S) -> Vip {
        Vip(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Vip {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

impl From<&str> for Vip {
    fn from(name: &str) -> Vip {
        Vip(name.to_owned())
    }
}

/// A transport-layer endpoint: a VIP plus a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VAddr {
    pub vip: Vip,
    pub port: u16,
}

impl VAddr {
    pub fn new(vip: Vip, port: u16) -> VAddr {
        VAddr { vip, port }
    }
}

impl fmt::Display for VAddr {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}:{}", self.vip, self.port)
    }
}
