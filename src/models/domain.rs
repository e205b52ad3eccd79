//! Town and flat-type domains.
//!
//! Both are closed sets baked into the trained price model, so they are
//! represented as enums and parsed once at the boundary.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// HDB towns covered by the transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Town {
    /// Ang Mo Kio.
    AngMoKio,
    /// Bedok.
    Bedok,
    /// Bishan.
    Bishan,
    /// Bukit Batok.
    BukitBatok,
    /// Bukit Merah.
    BukitMerah,
    /// Bukit Panjang.
    BukitPanjang,
    /// Bukit Timah.
    BukitTimah,
    /// Central Area.
    CentralArea,
    /// Choa Chu Kang.
    ChoaChuKang,
    /// Clementi.
    Clementi,
    /// Geylang.
    Geylang,
    /// Hougang.
    Hougang,
    /// Jurong East.
    JurongEast,
    /// Jurong West.
    JurongWest,
    /// Kallang/Whampoa.
    KallangWhampoa,
    /// Marine Parade.
    MarineParade,
    /// Pasir Ris.
    PasirRis,
    /// Punggol.
    Punggol,
    /// Queenstown.
    Queenstown,
    /// Sembawang.
    Sembawang,
    /// Sengkang.
    Sengkang,
    /// Serangoon.
    Serangoon,
    /// Tampines.
    Tampines,
    /// Toa Payoh.
    ToaPayoh,
    /// Woodlands.
    Woodlands,
    /// Yishun.
    Yishun,
}

impl Town {
    /// Returns all towns in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::AngMoKio,
            Self::Bedok,
            Self::Bishan,
            Self::BukitBatok,
            Self::BukitMerah,
            Self::BukitPanjang,
            Self::BukitTimah,
            Self::CentralArea,
            Self::ChoaChuKang,
            Self::Clementi,
            Self::Geylang,
            Self::Hougang,
            Self::JurongEast,
            Self::JurongWest,
            Self::KallangWhampoa,
            Self::MarineParade,
            Self::PasirRis,
            Self::Punggol,
            Self::Queenstown,
            Self::Sembawang,
            Self::Sengkang,
            Self::Serangoon,
            Self::Tampines,
            Self::ToaPayoh,
            Self::Woodlands,
            Self::Yishun,
        ]
    }

    /// Returns the canonical (data.gov.sg) name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AngMoKio => "ANG MO KIO",
            Self::Bedok => "BEDOK",
            Self::Bishan => "BISHAN",
            Self::BukitBatok => "BUKIT BATOK",
            Self::BukitMerah => "BUKIT MERAH",
            Self::BukitPanjang => "BUKIT PANJANG",
            Self::BukitTimah => "BUKIT TIMAH",
            Self::CentralArea => "CENTRAL AREA",
            Self::ChoaChuKang => "CHOA CHU KANG",
            Self::Clementi => "CLEMENTI",
            Self::Geylang => "GEYLANG",
            Self::Hougang => "HOUGANG",
            Self::JurongEast => "JURONG EAST",
            Self::JurongWest => "JURONG WEST",
            Self::KallangWhampoa => "KALLANG/WHAMPOA",
            Self::MarineParade => "MARINE PARADE",
            Self::PasirRis => "PASIR RIS",
            Self::Punggol => "PUNGGOL",
            Self::Queenstown => "QUEENSTOWN",
            Self::Sembawang => "SEMBAWANG",
            Self::Sengkang => "SENGKANG",
            Self::Serangoon => "SERANGOON",
            Self::Tampines => "TAMPINES",
            Self::ToaPayoh => "TOA PAYOH",
            Self::Woodlands => "WOODLANDS",
            Self::Yishun => "YISHUN",
        }
    }

    /// Parses a town name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|town| town.as_str() == normalized)
    }
}

impl fmt::Display for Town {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat types sold on the resale market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlatType {
    /// 1-room flat.
    OneRoom,
    /// 2-room flat.
    TwoRoom,
    /// 3-room flat.
    ThreeRoom,
    /// 4-room flat.
    FourRoom,
    /// 5-room flat.
    FiveRoom,
    /// Executive flat.
    Executive,
    /// Multi-generation flat.
    MultiGeneration,
}

impl FlatType {
    /// Returns all flat types, smallest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::OneRoom,
            Self::TwoRoom,
            Self::ThreeRoom,
            Self::FourRoom,
            Self::FiveRoom,
            Self::Executive,
            Self::MultiGeneration,
        ]
    }

    /// Returns the canonical (data.gov.sg) label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneRoom => "1 ROOM",
            Self::TwoRoom => "2 ROOM",
            Self::ThreeRoom => "3 ROOM",
            Self::FourRoom => "4 ROOM",
            Self::FiveRoom => "5 ROOM",
            Self::Executive => "EXECUTIVE",
            Self::MultiGeneration => "MULTI-GENERATION",
        }
    }

    /// Parses a flat type label, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "1 ROOM" | "1-ROOM" => Some(Self::OneRoom),
            "2 ROOM" | "2-ROOM" => Some(Self::TwoRoom),
            "3 ROOM" | "3-ROOM" => Some(Self::ThreeRoom),
            "4 ROOM" | "4-ROOM" => Some(Self::FourRoom),
            "5 ROOM" | "5-ROOM" => Some(Self::FiveRoom),
            "EXECUTIVE" => Some(Self::Executive),
            "MULTI-GENERATION" | "MULTI GENERATION" => Some(Self::MultiGeneration),
            _ => None,
        }
    }
}

impl fmt::Display for FlatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Both domains serialize as their canonical labels so JSON map keys read
// "4 ROOM" rather than "FourRoom".

impl Serialize for Town {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Town {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown town '{raw}'")))
    }
}

impl Serialize for FlatType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FlatType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown flat type '{raw}'")))
    }
}
