use serde::{Deserialize, Serialize};

/// Capacity of every name field handed to callers, in code units
pub const MAX_PATH: usize = 260;

/// Character width a caller was built against.
///
/// Both interface flavours share one implementation; the only difference
/// between them is how names are encoded on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// Single-byte code units. Characters outside ASCII become `?`.
    Ansi,
    /// UTF-16LE code units
    #[default]
    Wide,
}

impl Charset {
    pub fn unit_width(self) -> usize {
        match self {
            Charset::Ansi => 1,
            Charset::Wide => 2,
        }
    }

    /// Encode `text` into a NUL terminated buffer of at most `capacity`
    /// code units, truncating if needed.
    pub fn encode(self, text: &str, capacity: usize) -> EncodedName {
        let limit = capacity.saturating_sub(1);
        let mut bytes = Vec::with_capacity((limit + 1) * self.unit_width());
        match self {
            Charset::Ansi => {
                bytes.extend(
                    text.chars()
                        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                        .take(limit),
                );
                if capacity > 0 {
                    bytes.push(0);
                }
            }
            Charset::Wide => {
                let mut units: Vec<u16> = text.encode_utf16().take(limit).collect();
                // never split a surrogate pair
                if units.last().is_some_and(|u| (0xD800..0xDC00).contains(u)) {
                    units.pop();
                }
                if capacity > 0 {
                    units.push(0);
                }
                for unit in units {
                    bytes.extend_from_slice(&unit.to_le_bytes());
                }
            }
        }
        EncodedName {
            charset: self,
            bytes,
        }
    }
}

/// A name encoded for one [`Charset`], NUL terminator included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedName {
    pub charset: Charset,
    pub bytes: Vec<u8>,
}

impl EncodedName {
    /// Number of code units before the terminator
    pub fn len(&self) -> usize {
        self.bytes.len() / self.charset.unit_width() - usize::from(!self.bytes.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn decode(&self) -> String {
        match self.charset {
            Charset::Ansi => self
                .bytes
                .iter()
                .take_while(|b| **b != 0)
                .map(|b| *b as char)
                .collect(),
            Charset::Wide => {
                let units: Vec<u16> = self
                    .bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .take_while(|u| *u != 0)
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }
}

impl std::fmt::Display for EncodedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.decode())
    }
}
