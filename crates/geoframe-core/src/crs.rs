//! Coordinate reference system identifiers.
//!
//! A [`Crs`] is an opaque, comparable tag. Parsing normalises the common
//! authority spellings (`epsg:4326`, `EPSG:4326`, OGC URNs) to a single
//! canonical `AUTHORITY:CODE` form so equality is identity of the reference
//! system; any other definition (PROJ strings, WKT) is kept verbatim.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Errors raised while interpreting user CRS input.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
pub enum CrsError {
    /// The CRS definition was empty or whitespace.
    #[snafu(display("CRS definition is empty"))]
    Empty,

    /// An `EPSG:` definition whose code is not a positive integer.
    #[snafu(display("Invalid EPSG code in CRS definition {input:?}"))]
    InvalidEpsgCode {
        /// The offending input.
        input: String,
    },
}

/// Authorities whose codes can be expressed as an OGC URN.
pub const URN_AUTHORITIES: [&str; 5] = ["EDCS", "EPSG", "OGC", "SI", "UCUM"];

/// An opaque coordinate reference system identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs(String);

impl Crs {
    /// Parse user input into a normalised CRS.
    pub fn parse(input: &str) -> Result<Self, CrsError> {
        let trimmed = input.trim();
        ensure!(!trimmed.is_empty(), EmptySnafu);

        if let Some(rest) = strip_prefix_ignore_case(trimmed, "urn:ogc:def:crs:") {
            // urn:ogc:def:crs:EPSG::3857 / urn:ogc:def:crs:OGC:1.3:CRS84
            let mut parts = rest.split(':');
            let authority = parts.next().unwrap_or_default();
            let code = parts.last().unwrap_or_default();
            if !authority.is_empty() && !code.is_empty() {
                return Self::from_authority(authority, code, trimmed);
            }
        }

        if let Some((authority, code)) = trimmed.split_once(':') {
            let is_authority = !authority.is_empty()
                && authority.chars().all(|c| c.is_ascii_alphabetic());
            let is_code = !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric());
            if is_authority && is_code {
                return Self::from_authority(authority, code, trimmed);
            }
        }

        Ok(Crs(trimmed.to_string()))
    }

    fn from_authority(authority: &str, code: &str, input: &str) -> Result<Self, CrsError> {
        let authority = authority.to_ascii_uppercase();
        if authority == "EPSG" {
            let parsed: u32 = code.parse().map_err(|_| CrsError::InvalidEpsgCode {
                input: input.to_string(),
            })?;
            ensure!(
                parsed > 0,
                InvalidEpsgCodeSnafu {
                    input: input.to_string()
                }
            );
            return Ok(Crs::from_epsg(parsed));
        }
        Ok(Crs(format!("{authority}:{}", code.to_ascii_uppercase())))
    }

    /// Build an `EPSG:<code>` CRS.
    pub fn from_epsg(code: u32) -> Self {
        Crs(format!("EPSG:{code}"))
    }

    /// WGS84 geographic coordinates (`EPSG:4326`).
    pub fn wgs84() -> Self {
        Crs::from_epsg(4326)
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `(authority, code)` when the CRS is an authority reference.
    pub fn to_authority(&self) -> Option<(&str, &str)> {
        let (authority, code) = self.0.split_once(':')?;
        let is_authority =
            !authority.is_empty() && authority.chars().all(|c| c.is_ascii_uppercase());
        let is_code = !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric());
        (is_authority && is_code).then_some((authority, code))
    }

    /// EPSG code, if this is an EPSG reference.
    pub fn epsg(&self) -> Option<u32> {
        match self.to_authority()? {
            ("EPSG", code) => code.parse().ok(),
            _ => None,
        }
    }

    /// Whether the CRS is WGS84 longitude/latitude.
    pub fn is_wgs84(&self) -> bool {
        self.epsg() == Some(4326) || self.0 == "OGC:CRS84"
    }

    /// OGC URN form (`urn:ogc:def:crs:EPSG::3857`), when the authority is one
    /// the URN scheme can express.
    pub fn to_ogc_urn(&self) -> Option<String> {
        let (authority, code) = self.to_authority()?;
        URN_AUTHORITIES
            .contains(&authority)
            .then(|| format!("urn:ogc:def:crs:{authority}::{code}"))
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

impl FromStr for Crs {
    type Err = CrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Crs::parse(s)
    }
}

impl TryFrom<String> for Crs {
    type Error = CrsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Crs::parse(&value)
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.0
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render an optional CRS for messages.
pub(crate) fn display_opt(crs: Option<&Crs>) -> String {
    crs.map_or_else(|| "None".to_string(), |c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_spellings_normalise() -> Result<(), CrsError> {
        assert_eq!(Crs::parse("epsg:4326")?, Crs::from_epsg(4326));
        assert_eq!(Crs::parse(" EPSG:3857 ")?, Crs::from_epsg(3857));
        assert_eq!(Crs::parse("urn:ogc:def:crs:EPSG::3857")?, Crs::from_epsg(3857));
        assert_eq!(Crs::parse("ogc:crs84")?.as_str(), "OGC:CRS84");
        Ok(())
    }

    #[test]
    fn other_definitions_are_kept_verbatim() -> Result<(), CrsError> {
        let crs = Crs::parse("+proj=longlat +datum=WGS84 +no_defs")?;
        assert_eq!(crs.as_str(), "+proj=longlat +datum=WGS84 +no_defs");
        assert_eq!(crs.to_authority(), None);
        assert_eq!(crs.to_ogc_urn(), None);
        Ok(())
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert_eq!(Crs::parse("  "), Err(CrsError::Empty));
        assert!(matches!(
            Crs::parse("EPSG:abc"),
            Err(CrsError::InvalidEpsgCode { .. })
        ));
    }

    #[test]
    fn urn_rendering() {
        assert_eq!(
            Crs::from_epsg(3857).to_ogc_urn().as_deref(),
            Some("urn:ogc:def:crs:EPSG::3857")
        );
        assert!(Crs::wgs84().is_wgs84());
        assert!(!Crs::from_epsg(3857).is_wgs84());
    }
}
