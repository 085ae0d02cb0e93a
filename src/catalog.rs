//! DAB channel plan
//!
//! Band III (5A..13F) and L-band (LA..LP) channel identifiers with their
//! centre frequencies, walked in order by the scanner.

/// Band III channels, centre frequency in kHz
const BAND_III: [(&str, u32); 38] = [
    ("5A", 174_928), ("5B", 176_640), ("5C", 178_352), ("5D", 180_064),
    ("6A", 181_936), ("6B", 183_648), ("6C", 185_360), ("6D", 187_072),
    ("7A", 188_928), ("7B", 190_640), ("7C", 192_352), ("7D", 194_064),
    ("8A", 195_936), ("8B", 197_648), ("8C", 199_360), ("8D", 201_072),
    ("9A", 202_928), ("9B", 204_640), ("9C", 206_352), ("9D", 208_064),
    ("10A", 209_936), ("10B", 211_648), ("10C", 213_360), ("10D", 215_072),
    ("11A", 216_928), ("11B", 218_640), ("11C", 220_352), ("11D", 222_064),
    ("12A", 223_936), ("12B", 225_648), ("12C", 227_360), ("12D", 229_072),
    ("13A", 230_784), ("13B", 232_496), ("13C", 234_208), ("13D", 235_776),
    ("13E", 237_488), ("13F", 239_200),
];

/// L-band channels, centre frequency in kHz
const L_BAND: [(&str, u32); 16] = [
    ("LA", 1_452_960), ("LB", 1_454_672), ("LC", 1_456_384), ("LD", 1_458_096),
    ("LE", 1_459_808), ("LF", 1_461_520), ("LG", 1_463_232), ("LH", 1_464_944),
    ("LI", 1_466_656), ("LJ", 1_468_368), ("LK", 1_470_080), ("LL", 1_471_792),
    ("LM", 1_473_504), ("LN", 1_475_216), ("LO", 1_476_928), ("LP", 1_478_640),
];

/// Portion of the channel plan to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    All,
    BandIii,
    LBand,
}

impl Band {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "band3" | "band-iii" | "iii" => Some(Self::BandIii),
            "lband" | "l-band" | "l" => Some(Self::LBand),
            _ => None,
        }
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub frequency_hz: u32,
}

impl Channel {
    pub fn new(id: impl Into<String>, frequency_hz: u32) -> Self {
        Self {
            id: id.into(),
            frequency_hz,
        }
    }
}

/// Ordered channel catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    channels: Vec<Channel>,
}

impl Catalog {
    #[cfg(test)]
    pub fn from_channels(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn band_iii() -> Self {
        Self::from_table(&BAND_III)
    }

    pub fn l_band() -> Self {
        Self::from_table(&L_BAND)
    }

    /// Band III followed by L-band
    pub fn all() -> Self {
        let mut catalog = Self::band_iii();
        catalog.channels.extend(Self::l_band().channels);
        catalog
    }

    pub fn for_band(band: Band) -> Self {
        match band {
            Band::All => Self::all(),
            Band::BandIii => Self::band_iii(),
            Band::LBand => Self::l_band(),
        }
    }

    fn from_table(table: &[(&str, u32)]) -> Self {
        Self {
            channels: table
                .iter()
                .map(|(id, khz)| Channel::new(*id, khz * 1000))
                .collect(),
        }
    }

    /// Cursor at the first channel, `None` for an empty catalog
    pub fn first(&self) -> Option<(usize, &Channel)> {
        self.channels.first().map(|c| (0, c))
    }

    /// Cursor following position `pos`, `None` at the end of the catalog.
    /// Moves by position, so repeated ids are each visited once.
    pub fn next(&self, pos: usize) -> Option<(usize, &Channel)> {
        self.channels.get(pos + 1).map(|c| (pos + 1, c))
    }

    #[cfg(test)]
    pub fn frequency(&self, id: &str) -> Option<u32> {
        self.channels
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.frequency_hz)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }
}
