//! Canonical listing schema
//!
//! Column order and vocabulary order are part of every fitted state: the
//! categorical code of a value is its index in the vocabulary. Any change to
//! either requires bumping [`SCHEMA_VERSION`].

use serde::{Deserialize, Serialize};

/// Version tag persisted with every fitted encoder state
pub const SCHEMA_VERSION: u32 = 1;

/// How a feature is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// Value substituted when a raw field is absent or unparseable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureDefault {
    Number(f64),
    Text(&'static str),
    Flag(bool),
}

/// A single schema column
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: FeatureKind,
    pub default: FeatureDefault,
    /// Rank-ordered categories (empty for numeric columns)
    pub vocabulary: &'static [&'static str],
}

const PROPERTY_TYPES: &[&str] = &[
    "Apartment",
    "House",
    "Condominium",
    "Townhouse",
    "Loft",
    "Other",
    "Guesthouse",
    "Bed & Breakfast",
    "Bungalow",
    "Villa",
    "Dorm",
    "Guest suite",
    "Camper/RV",
    "Timeshare",
    "Cabin",
    "In-law",
    "Hostel",
    "Boutique hotel",
    "Boat",
    "Serviced apartment",
    "Tent",
    "Castle",
    "Vacation home",
    "Yurt",
    "Hut",
    "Treehouse",
    "Chalet",
    "Earth House",
    "Tipi",
    "Train",
    "Cave",
    "Casa particular",
    "Parking Space",
    "Lighthouse",
    "Island",
];

const ROOM_TYPES: &[&str] = &["Entire home/apt", "Private room", "Shared room"];

const BED_TYPES: &[&str] = &["Real Bed", "Futon", "Pull-out Sofa", "Airbed", "Couch"];

const CANCELLATION_POLICIES: &[&str] = &[
    "strict",
    "moderate",
    "flexible",
    "super_strict_30",
    "super_strict_60",
];

const CITIES: &[&str] = &["NYC", "SF", "DC", "LA", "Chicago", "Boston"];

/// Tokens for `cleaning_fee` (true first)
const FEE_FLAGS: &[&str] = &["True", "False"];

/// Tokens for host and booking flags (true first)
const HOST_FLAGS: &[&str] = &["t", "f"];

const fn numeric(name: &'static str, default: f64) -> FeatureSpec {
    FeatureSpec {
        name,
        kind: FeatureKind::Numeric,
        default: FeatureDefault::Number(default),
        vocabulary: &[],
    }
}

const fn categorical(
    name: &'static str,
    default: &'static str,
    vocabulary: &'static [&'static str],
) -> FeatureSpec {
    FeatureSpec {
        name,
        kind: FeatureKind::Categorical,
        default: FeatureDefault::Text(default),
        vocabulary,
    }
}

const fn flag(name: &'static str, default: bool, tokens: &'static [&'static str]) -> FeatureSpec {
    FeatureSpec {
        name,
        kind: FeatureKind::Categorical,
        default: FeatureDefault::Flag(default),
        vocabulary: tokens,
    }
}

/// Feature order fed to the encoder: numeric columns first, then categorical
const FEATURES: &[FeatureSpec] = &[
    numeric("amenities", 0.0),
    numeric("accommodates", 1.0),
    numeric("bathrooms", 1.0),
    numeric("latitude", 0.0),
    numeric("longitude", 0.0),
    numeric("host_response_rate", 100.0),
    numeric("number_of_reviews", 0.0),
    numeric("review_scores_rating", 90.0),
    numeric("bedrooms", 0.0),
    numeric("beds", 1.0),
    categorical("property_type", "Apartment", PROPERTY_TYPES),
    categorical("room_type", "Entire home/apt", ROOM_TYPES),
    categorical("bed_type", "Real Bed", BED_TYPES),
    categorical("cancellation_policy", "flexible", CANCELLATION_POLICIES),
    flag("cleaning_fee", true, FEE_FLAGS),
    categorical("city", "NYC", CITIES),
    flag("host_has_profile_pic", true, HOST_FLAGS),
    flag("host_identity_verified", true, HOST_FLAGS),
    flag("instant_bookable", false, HOST_FLAGS),
];

/// Read-only view over the canonical feature list
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    version: u32,
    features: &'static [FeatureSpec],
}

impl Default for Schema {
    fn default() -> Self {
        Self::current()
    }
}

impl Schema {
    /// The schema this build encodes against
    pub fn current() -> Self {
        Schema {
            version: SCHEMA_VERSION,
            features: FEATURES,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Ordered `(name, kind)` pairs
    pub fn feature_order(&self) -> Vec<(&'static str, FeatureKind)> {
        self.features.iter().map(|f| (f.name, f.kind)).collect()
    }

    /// Rank-ordered vocabulary of a categorical feature
    pub fn vocabulary(&self, name: &str) -> Option<&'static [&'static str]> {
        self.spec(name)
            .filter(|f| f.kind == FeatureKind::Categorical)
            .map(|f| f.vocabulary)
    }

    pub fn spec(&self, name: &str) -> Option<&'static FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn features(&self) -> &'static [FeatureSpec] {
        self.features
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &'static FeatureSpec> {
        self.features
            .iter()
            .filter(|f| f.kind == FeatureKind::Numeric)
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &'static FeatureSpec> {
        self.features
            .iter()
            .filter(|f| f.kind == FeatureKind::Categorical)
    }

    /// Number of columns, which is also the feature vector length
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Vocabulary token for a boolean-like feature
    pub fn flag_token(&self, name: &str, value: bool) -> Option<&'static str> {
        let spec = self.spec(name)?;
        match spec.default {
            FeatureDefault::Flag(_) => spec.vocabulary.get(if value { 0 } else { 1 }).copied(),
            _ => None,
        }
    }
}
