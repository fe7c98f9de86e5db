//! # Survey Vocabulary
//!
//! Domain types shared by the ingestion pipeline, the repository and the
//! aggregation layer: the closed sets of sexes, capture methods and
//! measured attributes, and the two tidy observation records.

pub mod normalize;
pub mod raw;

use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// Sex of a captured individual. Only these two codes are ever stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Gender {
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "M")]
    Male,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Female, Gender::Male];

    /// Matches the exact codes `M` and `F`; anything else (including `m` or
    /// `M ` with trailing space) is not a gender.
    pub fn from_code(code: &str) -> Option<Gender> {
        match code {
            "F" => Some(Gender::Female),
            "M" => Some(Gender::Male),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Gender::Female => "F",
            Gender::Male => "M",
        }
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Capture technique of the by-method survey.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Method {
    Drawdown,
    Handsearch,
    Trapping,
}

impl Method {
    /// All methods in the order fragments are emitted during normalization.
    pub const ALL: [Method; 3] = [Method::Drawdown, Method::Handsearch, Method::Trapping];

    pub fn from_name(name: &str) -> Option<Method> {
        Method::ALL.into_iter().find(|method| method.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::Drawdown => "Drawdown",
            Method::Handsearch => "Handsearch",
            Method::Trapping => "Trapping",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Leaf level of the source header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Info {
    Gender,
    CarapaceLength,
    Weight,
}

impl Info {
    pub const ALL: [Info; 3] = [Info::Gender, Info::CarapaceLength, Info::Weight];

    /// Parses a header label, treating any run of whitespace as one space.
    pub fn from_label(label: &str) -> Option<Info> {
        let collapsed = label.split_whitespace().collect::<Vec<_>>().join(" ");
        Info::ALL.into_iter().find(|info| info.label() == collapsed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Info::Gender => "Gender",
            Info::CarapaceLength => "Carapace length (mm)",
            Info::Weight => "Weight (g)",
        }
    }
}

/// A measured quantity that can be bounded, averaged and sampled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Carapace length in millimetres
    Length,
    /// Weight in grams
    Weight,
}

impl Attribute {
    /// Column name used by the repository.
    pub fn column(&self) -> &'static str {
        match self {
            Attribute::Length => "length",
            Attribute::Weight => "weight",
        }
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "length" | "length_mm" | "carapace length (mm)" => Ok(Attribute::Length),
            "weight" | "weight_g" | "weight (g)" => Ok(Attribute::Weight),
            other => Err(format!("unknown attribute '{}'", other)),
        }
    }
}

/// One individual from the by-method survey.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservationByMethod {
    pub site: String,
    pub method: Method,
    pub gender: Gender,
    /// Carapace length (mm), strictly positive
    pub length: f64,
}

/// One individual from the by-site survey.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservationBySite {
    pub site: String,
    pub gender: Gender,
    /// Carapace length (mm), strictly positive
    pub length: f64,
    /// Weight (g), strictly positive
    pub weight: f64,
}

impl ObservationBySite {
    pub fn value(&self, attribute: Attribute) -> f64 {
        match attribute {
            Attribute::Length => self.length,
            Attribute::Weight => self.weight,
        }
    }
}

/// A row of either table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Observation {
    ByMethod(ObservationByMethod),
    BySite(ObservationBySite),
}

impl From<ObservationByMethod> for Observation {
    fn from(observation: ObservationByMethod) -> Self {
        Observation::ByMethod(observation)
    }
}

impl From<ObservationBySite> for Observation {
    fn from(observation: ObservationBySite) -> Self {
        Observation::BySite(observation)
    }
}

/// A stored observation with its surrogate key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub id: i64,
    #[serde(flatten)]
    pub observation: Observation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_codes_are_exact() {
        assert_eq!(Gender::from_code("M"), Some(Gender::Male));
        assert_eq!(Gender::from_code("F"), Some(Gender::Female));
        assert_eq!(Gender::from_code("m"), None);
        assert_eq!(Gender::from_code("M "), None);
        assert_eq!(Gender::from_code("X"), None);
        assert_eq!(Gender::from_code(""), None);
    }

    #[test]
    fn info_labels_collapse_whitespace() {
        assert_eq!(Info::from_label("Carapace length  (mm)"), Some(Info::CarapaceLength));
        assert_eq!(Info::from_label(" Weight (g) "), Some(Info::Weight));
        assert_eq!(Info::from_label("Gender"), Some(Info::Gender));
        assert_eq!(Info::from_label("Colour"), None);
    }

    #[test]
    fn methods_round_trip_names() {
        for method in Method::ALL {
            assert_eq!(Method::from_name(method.name()), Some(method));
        }
        assert_eq!(Method::from_name("trapping"), None);
    }

    #[test]
    fn attributes_parse_aliases() {
        assert_eq!("length_mm".parse::<Attribute>(), Ok(Attribute::Length));
        assert_eq!("Weight (g)".parse::<Attribute>(), Ok(Attribute::Weight));
        assert!("depth".parse::<Attribute>().is_err());
    }
}
