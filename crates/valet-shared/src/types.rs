use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{COLOR_BRIGHTNESS_RANGE, COLOR_SATURATION_RANGE};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Opaque identifier of a shift. Never reused.
    ShiftId
);
uuid_id!(
    /// Opaque identifier of a car within its shift.
    CarId
);
uuid_id!(
    /// Opaque identifier of an employee. Local to the device that created it.
    EmployeeId
);
uuid_id!(
    /// Identifier handed out by the identity provider for the current participant.
    ParticipantId
);

/// Opaque display color assigned to an employee.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DisplayColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl DisplayColor {
    /// Draw a random, saturated color using the thread RNG.
    pub fn random() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }

    /// Hue is uniform over the wheel; saturation and brightness stay in the
    /// bounded ranges so neighbouring employees remain distinguishable.
    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let hue = rng.gen_range(0.0..360.0);
        let saturation = rng.gen_range(COLOR_SATURATION_RANGE.0..=COLOR_SATURATION_RANGE.1);
        let brightness = rng.gen_range(COLOR_BRIGHTNESS_RANGE.0..=COLOR_BRIGHTNESS_RANGE.1);
        Self::from_hsb(hue, saturation, brightness)
    }

    pub fn from_hsb(hue: f64, saturation: f64, brightness: f64) -> Self {
        let c = brightness * saturation;
        let h = (hue.rem_euclid(360.0)) / 60.0;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r1, g1, b1) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = brightness - c;
        let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self {
            r: to_u8(r1),
            g: to_u8(g1),
            b: to_u8(b1),
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{}", hex::encode([self.r, self.g, self.b]))
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut rgb = [0u8; 3];
        hex::decode_to_slice(s.trim_start_matches('#'), &mut rgb)?;
        Ok(Self {
            r: rgb[0],
            g: rgb[1],
            b: rgb[2],
        })
    }
}

impl std::fmt::Display for DisplayColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Geographic position of a parked car. Never validated or projected here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Reference (URL) to a photo held by the photo store. The bytes are never
/// interpreted by the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PhotoRef(pub String);

impl PhotoRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
