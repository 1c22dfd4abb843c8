//! Hardware address parsing for `--mac-address`.

use std::fmt;
use std::str::FromStr;

use bock_common::{BockError, BockResult};

/// A parsed IEEE 802 MAC-48, EUI-48, EUI-64 or 20-octet IPoIB address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacAddress(Vec<u8>);

impl MacAddress {
    /// Raw octets.
    #[must_use]
    pub fn octets(&self) -> &[u8] {
        &self.0
    }

    /// Parse the optional flag value; an empty string means "not set".
    ///
    /// # Errors
    ///
    /// Returns [`BockError::InvalidMacAddress`] if a non-empty value does not parse.
    pub fn parse_flag(value: Option<&str>) -> BockResult<Option<Self>> {
        match value {
            None | Some("") => Ok(None),
            Some(v) => v.parse().map(Some),
        }
    }
}

fn valid_octet_count(n: usize) -> bool {
    matches!(n, 6 | 8 | 20)
}

impl FromStr for MacAddress {
    type Err = BockError;

    /// Accepts `00:00:5e:00:53:01`, `00-00-5e-00-53-01` and `0000.5e00.5301`
    /// layouts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BockError::InvalidMacAddress {
            value: s.to_string(),
        };

        let octets = if s.contains('.') {
            let mut octets = Vec::new();
            for group in s.split('.') {
                if group.len() != 4 || !group.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid());
                }
                let word = u16::from_str_radix(group, 16).map_err(|_| invalid())?;
                octets.extend_from_slice(&word.to_be_bytes());
            }
            octets
        } else {
            let sep = if s.contains(':') { ':' } else { '-' };
            s.split(sep)
                .map(|group| {
                    if group.len() == 2 && group.chars().all(|c| c.is_ascii_hexdigit()) {
                        u8::from_str_radix(group, 16).map_err(|_| invalid())
                    } else {
                        Err(invalid())
                    }
                })
                .collect::<BockResult<Vec<u8>>>()?
        };

        if !valid_octet_count(octets.len()) {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: Vec<String> = self.0.iter().map(|b| format!("{b:02x}")).collect();
        write!(f, "{}", text.join(":"))
    }
}
