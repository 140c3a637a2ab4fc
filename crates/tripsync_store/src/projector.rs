//! Projection of raw documents into typed view records.
//!
//! Projection is total: a missing or mistyped field falls back to the
//! field's default rather than failing the whole record.

use crate::types::Document;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

const UNKNOWN: &str = "Unknown";
const DEFAULT_TIER: &str = "Blue";
const DEFAULT_COLOR: &str = "Blue";
const DEFAULT_SIZE: i64 = 24;

/// Loyalty membership summary for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipInfo {
    /// Membership number.
    pub membership_number: String,
    /// Tier name (e.g. "Blue", "Silver", "Gold").
    pub tier_status: String,
    /// Redeemable miles balance.
    pub miles: i64,
    /// Miles counted towards the next tier.
    pub tier_miles: i64,
}

impl MembershipInfo {
    /// Record shown before any membership document has synced.
    pub fn fallback() -> Self {
        Self {
            membership_number: "EK-000000000".into(),
            tier_status: DEFAULT_TIER.into(),
            miles: 0,
            tier_miles: 0,
        }
    }
}

/// A message shared with every user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedMessage {
    /// Message text.
    pub message: String,
    /// Colour name; see [`NamedColor::from_name`].
    pub color: String,
    /// Font size in points.
    pub size: i64,
}

impl SharedMessage {
    /// Record shown before the shared message has synced.
    pub fn fallback() -> Self {
        Self {
            message: "Welcome to the app!".into(),
            color: "green".into(),
            size: 18,
        }
    }

    /// Resolves the colour name, if it is one of the known names.
    pub fn named_color(&self) -> Option<NamedColor> {
        NamedColor::from_name(&self.color)
    }
}

/// An upcoming trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    /// Origin city.
    pub departure_city: String,
    /// Destination city.
    pub destination_city: String,
    /// Local departure time as entered by the backend.
    pub departure_time: String,
    /// Local arrival time as entered by the backend.
    pub arrival_time: String,
    /// Human-readable flight duration.
    pub duration: String,
    /// Operating airline.
    pub airline: String,
    /// Flight number.
    pub flight_number: String,
}

/// Projects a user document into membership info.
pub fn project_membership(doc: &Document) -> MembershipInfo {
    MembershipInfo {
        membership_number: string_field(doc, "membershipNumber", UNKNOWN),
        tier_status: string_field(doc, "tierStatus", DEFAULT_TIER),
        miles: int_field(doc, "miles", 0),
        tier_miles: int_field(doc, "tierMiles", 0),
    }
}

/// Projects a user document into trip details.
pub fn project_trip(doc: &Document) -> Trip {
    Trip {
        departure_city: string_field(doc, "departureCity", UNKNOWN),
        destination_city: string_field(doc, "destinationCity", UNKNOWN),
        departure_time: string_field(doc, "departureTime", UNKNOWN),
        arrival_time: string_field(doc, "arrivalTime", UNKNOWN),
        duration: string_field(doc, "duration", UNKNOWN),
        airline: string_field(doc, "airline", UNKNOWN),
        flight_number: string_field(doc, "flightNumber", UNKNOWN),
    }
}

/// Projects the shared content document into a message.
pub fn project_shared_message(doc: &Document) -> SharedMessage {
    SharedMessage {
        message: string_field(doc, "message", UNKNOWN),
        color: string_field(doc, "color", DEFAULT_COLOR),
        size: int_field(doc, "size", DEFAULT_SIZE),
    }
}

fn string_field(doc: &Document, key: &str, default: &str) -> String {
    doc.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

// Floats are truncated; anything else non-numeric falls back.
fn int_field(doc: &Document, key: &str, default: i64) -> i64 {
    match doc.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        _ => default,
    }
}

/// Colour names understood by the welcome screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedColor {
    /// Red.
    Red,
    /// Blue.
    Blue,
    /// Green.
    Green,
    /// Yellow.
    Yellow,
    /// Orange.
    Orange,
    /// Purple.
    Purple,
    /// Black.
    Black,
    /// White.
    White,
    /// Gray.
    Gray,
    /// Cyan.
    Cyan,
}

impl NamedColor {
    /// All known colours.
    pub const ALL: [NamedColor; 10] = [
        NamedColor::Red,
        NamedColor::Blue,
        NamedColor::Green,
        NamedColor::Yellow,
        NamedColor::Orange,
        NamedColor::Purple,
        NamedColor::Black,
        NamedColor::White,
        NamedColor::Gray,
        NamedColor::Cyan,
    ];

    /// Looks up a colour by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(name))
    }

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NamedColor::Red => "red",
            NamedColor::Blue => "blue",
            NamedColor::Green => "green",
            NamedColor::Yellow => "yellow",
            NamedColor::Orange => "orange",
            NamedColor::Purple => "purple",
            NamedColor::Black => "black",
            NamedColor::White => "white",
            NamedColor::Gray => "gray",
            NamedColor::Cyan => "cyan",
        }
    }
}

impl fmt::Display for NamedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
