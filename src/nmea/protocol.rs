//! # NMEA Protocol Constants and Types
//!
//! Wire-level definitions for the GPRMC (recommended minimum position/velocity)
//! sentence emitted to the LiDAR.

use chrono::{DateTime, Utc};
use std::fmt;

use super::checksum::{format_checksum, xor_checksum};

/// Sentence start sentinel
pub const NMEA_START: char = '$';

/// Separator between the sentence body and its checksum
pub const NMEA_CHECKSUM_SEPARATOR: char = '*';

/// Field separator
pub const NMEA_FIELD_SEPARATOR: &str = ",";

/// Sentence type tag for recommended minimum position/velocity
pub const GPRMC_TAG: &str = "GPRMC";

/// Fixed suffix after the magnetic variation field
pub const MAGNETIC_VARIATION_SUFFIX: &str = "E";

/// Number of comma-separated fields in a GPRMC body (tag included)
pub const GPRMC_FIELD_COUNT: usize = 12;

/// Width of the speed/course/variation fields, decimal point included
pub const NUMERIC_FIELD_WIDTH: usize = 6;

/// Largest value that fits a `NUMERIC_FIELD_WIDTH` field with two decimals
pub const NUMERIC_FIELD_MAX: f64 = 999.99;

/// Latitude domain in decimal degrees
pub const LATITUDE_LIMIT: f64 = 90.0;

/// Longitude domain in decimal degrees
pub const LONGITUDE_LIMIT: f64 = 180.0;

/// Metres-per-second to knots factor used by the LiDAR feed
pub const MPS_TO_KNOTS: f64 = 1.944;

/// Which coordinate a decimal-degree value describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    /// Largest absolute value allowed on this axis
    pub fn limit(self) -> f64 {
        match self {
            Axis::Latitude => LATITUDE_LIMIT,
            Axis::Longitude => LONGITUDE_LIMIT,
        }
    }

    /// Digits used for whole degrees in the wire field (`ddmm.mm` / `dddmm.mm`)
    pub fn degree_digits(self) -> usize {
        match self {
            Axis::Latitude => 2,
            Axis::Longitude => 3,
        }
    }
}

/// Hemisphere letter carried next to a coordinate field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// Hemisphere for a signed value; zero counts as positive
    pub fn for_value(value: f64, axis: Axis) -> Self {
        let negative = value < 0.0;
        match (axis, negative) {
            (Axis::Latitude, false) => Hemisphere::North,
            (Axis::Latitude, true) => Hemisphere::South,
            (Axis::Longitude, false) => Hemisphere::East,
            (Axis::Longitude, true) => Hemisphere::West,
        }
    }

    /// Wire letter
    pub fn as_char(self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
            Hemisphere::East => 'E',
            Hemisphere::West => 'W',
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Receiver status: a valid fix or a navigation warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixValidity {
    /// `A` - data valid
    Valid,
    /// `V` - navigation receiver warning
    #[default]
    Invalid,
}

impl FixValidity {
    /// Wire letter
    pub fn as_char(self) -> char {
        match self {
            FixValidity::Valid => 'A',
            FixValidity::Invalid => 'V',
        }
    }
}

impl From<bool> for FixValidity {
    fn from(ok: bool) -> Self {
        if ok {
            FixValidity::Valid
        } else {
            FixValidity::Invalid
        }
    }
}

impl fmt::Display for FixValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A coordinate split into whole degrees and decimal minutes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreesMinutes {
    /// Whole degrees, always positive
    pub degrees: u16,

    /// Minutes rounded to two decimals, in `[0, 60)`
    pub minutes: f64,

    /// Hemisphere letter carrying the sign
    pub hemisphere: Hemisphere,
}

impl DegreesMinutes {
    /// Render the `ddmm.mm` / `dddmm.mm` field for the given axis
    pub fn wire_field(&self, axis: Axis) -> String {
        format!(
            "{:0width$}{:05.2}",
            self.degrees,
            self.minutes,
            width = axis.degree_digits()
        )
    }
}

/// One immutable GPRMC sentence
///
/// Built by [`crate::nmea::encoder::build_sentence`] from a state snapshot;
/// every numeric field has been range-checked, so rendering cannot fail.
///
/// ```text
/// $GPRMC,225446,A,4916.45,N,12311.12,W,000.50,054.70,191194,020.30,E*<checksum>
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GprmcSentence {
    pub(crate) fix_time: DateTime<Utc>,
    pub(crate) validity: FixValidity,
    pub(crate) latitude: DegreesMinutes,
    pub(crate) longitude: DegreesMinutes,
    pub(crate) speed_knots: f64,
    pub(crate) course_made_good: f64,
    pub(crate) magnetic_variation: f64,
}

impl GprmcSentence {
    /// UTC instant the sentence describes
    pub fn fix_time(&self) -> DateTime<Utc> {
        self.fix_time
    }

    /// Receiver status field
    pub fn validity(&self) -> FixValidity {
        self.validity
    }

    /// Latitude field
    pub fn latitude(&self) -> DegreesMinutes {
        self.latitude
    }

    /// Longitude field
    pub fn longitude(&self) -> DegreesMinutes {
        self.longitude
    }

    /// Speed over ground in knots
    pub fn speed_knots(&self) -> f64 {
        self.speed_knots
    }

    /// Field text between `$` and `*`
    pub fn body(&self) -> String {
        let fields: [String; GPRMC_FIELD_COUNT] = [
            GPRMC_TAG.to_string(),
            self.fix_time.format("%H%M%S").to_string(),
            self.validity.to_string(),
            self.latitude.wire_field(Axis::Latitude),
            self.latitude.hemisphere.to_string(),
            self.longitude.wire_field(Axis::Longitude),
            self.longitude.hemisphere.to_string(),
            numeric_field(self.speed_knots),
            numeric_field(self.course_made_good),
            self.fix_time.format("%d%m%y").to_string(),
            numeric_field(self.magnetic_variation),
            MAGNETIC_VARIATION_SUFFIX.to_string(),
        ];
        fields.join(NMEA_FIELD_SEPARATOR)
    }

    /// XOR-fold of the body
    pub fn checksum(&self) -> u8 {
        xor_checksum(&self.body())
    }

    /// Sentence bytes ready for one datagram
    pub fn to_datagram(&self) -> bytes::Bytes {
        bytes::Bytes::from(self.to_string())
    }
}

impl fmt::Display for GprmcSentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.body();
        let checksum = format_checksum(xor_checksum(&body));
        write!(f, "{}{}{}{}", NMEA_START, body, NMEA_CHECKSUM_SEPARATOR, checksum)
    }
}

/// Fixed-width, two-decimal, zero-padded numeric field (`009.72`)
pub fn numeric_field(value: f64) -> String {
    format!("{:0width$.2}", value, width = NUMERIC_FIELD_WIDTH)
}
