//! Raw request normalization
//!
//! Absorbs spelling variants, boolean-like tokens, percentage strings and
//! free-text amenity lists. Nothing here fails: every malformed field degrades
//! to its documented default (or, under [`MissingPolicy::Impute`], to an empty
//! slot that the fitted encoder imputes).

use serde_json::{Map, Value};

use super::record::CanonicalRecord;
use super::schema::{FeatureDefault, Schema};
use crate::NormalizerConfig;

/// Raw listing as supplied by a caller or a training row
pub type RawRecord = Map<String, Value>;

/// Surface forms seen upstream for `city`
const CITY_ALIASES: &[(&str, &str)] = &[
    ("Boston", "Boston"),
    ("Chicago", "Chicago"),
    ("Washington, D.C.", "DC"),
    ("DC", "DC"),
    ("Los Angeles", "LA"),
    ("LA", "LA"),
    ("New York", "NYC"),
    ("NYC", "NYC"),
    ("San Francisco", "SF"),
    ("SF", "SF"),
];

const ROOM_TYPE_ALIASES: &[(&str, &str)] = &[
    ("Shared Room", "Shared room"),
    ("Private Room", "Private room"),
    ("Entire Home/Apt", "Entire home/apt"),
    ("Shared room", "Shared room"),
    ("Private room", "Private room"),
    ("Entire home/apt", "Entire home/apt"),
];

const CANCELLATION_ALIASES: &[(&str, &str)] = &[
    ("Flexible", "flexible"),
    ("Moderate", "moderate"),
    ("Strict", "strict"),
    ("Super strict", "super_strict_30"),
    ("Advanced Super Strict", "super_strict_60"),
    ("flexible", "flexible"),
    ("moderate", "moderate"),
    ("strict", "strict"),
    ("super_strict_30", "super_strict_30"),
    ("super_strict_60", "super_strict_60"),
];

/// What to do with an absent or unparseable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    /// Substitute the documented default (request path)
    #[default]
    Defaults,
    /// Leave the slot empty for the fitted imputer (training path)
    Impute,
}

/// Maps raw records onto the canonical schema
#[derive(Debug, Clone)]
pub struct Normalizer {
    schema: Schema,
    policy: MissingPolicy,
    review_scores_rating_default: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(MissingPolicy::Defaults)
    }
}

impl Normalizer {
    pub fn new(policy: MissingPolicy) -> Self {
        let schema = Schema::current();
        let review_scores_rating_default = match schema.spec("review_scores_rating") {
            Some(spec) => match spec.default {
                FeatureDefault::Number(n) => n,
                _ => 0.0,
            },
            None => 0.0,
        };
        Normalizer {
            schema,
            policy,
            review_scores_rating_default,
        }
    }

    pub fn from_config(config: &NormalizerConfig, policy: MissingPolicy) -> Self {
        Normalizer {
            review_scores_rating_default: config.review_scores_rating_default,
            ..Self::new(policy)
        }
    }

    /// Normalize a raw record into canonical form
    pub fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        let get = |name: &str| present(raw.get(name));

        CanonicalRecord {
            amenities: self.or_count(get("amenities").and_then(parse_amenities), "amenities"),
            accommodates: self.or_number(get("accommodates").and_then(parse_number), "accommodates"),
            bathrooms: self.or_number(get("bathrooms").and_then(parse_number), "bathrooms"),
            latitude: self.or_number(get("latitude").and_then(parse_number), "latitude"),
            longitude: self.or_number(get("longitude").and_then(parse_number), "longitude"),
            host_response_rate: self.or_rate(get("host_response_rate").and_then(parse_percentage)),
            number_of_reviews: self.or_number(
                get("number_of_reviews").and_then(parse_number),
                "number_of_reviews",
            ),
            review_scores_rating: match get("review_scores_rating").and_then(parse_number) {
                Some(v) => Some(v),
                None => self.fallback(self.review_scores_rating_default),
            },
            bedrooms: self.or_number(get("bedrooms").and_then(parse_number), "bedrooms"),
            beds: self.or_number(get("beds").and_then(parse_number), "beds"),
            property_type: self.or_text(get("property_type").and_then(as_text), "property_type"),
            room_type: self.or_text(
                get("room_type")
                    .and_then(as_text)
                    .map(|s| resolve_alias(ROOM_TYPE_ALIASES, s)),
                "room_type",
            ),
            bed_type: self.or_text(get("bed_type").and_then(as_text), "bed_type"),
            cancellation_policy: self.or_text(
                get("cancellation_policy")
                    .and_then(as_text)
                    .map(|s| resolve_alias(CANCELLATION_ALIASES, s)),
                "cancellation_policy",
            ),
            cleaning_fee: self.or_flag(get("cleaning_fee").and_then(parse_flag), "cleaning_fee"),
            city: self.or_text(
                get("city")
                    .and_then(as_text)
                    .map(|s| resolve_alias(CITY_ALIASES, s)),
                "city",
            ),
            host_has_profile_pic: self.or_flag(
                get("host_has_profile_pic").and_then(parse_flag),
                "host_has_profile_pic",
            ),
            host_identity_verified: self.or_flag(
                get("host_identity_verified").and_then(parse_flag),
                "host_identity_verified",
            ),
            instant_bookable: self.or_flag(
                get("instant_bookable").and_then(parse_flag),
                "instant_bookable",
            ),
        }
    }

    fn fallback<T>(&self, default: T) -> Option<T> {
        match self.policy {
            MissingPolicy::Defaults => Some(default),
            MissingPolicy::Impute => None,
        }
    }

    fn default_of(&self, name: &str) -> Option<FeatureDefault> {
        self.schema.spec(name).map(|spec| spec.default)
    }

    fn or_number(&self, value: Option<f64>, name: &str) -> Option<f64> {
        value.or_else(|| match self.default_of(name) {
            Some(FeatureDefault::Number(n)) => self.fallback(n),
            _ => None,
        })
    }

    fn or_count(&self, value: Option<u32>, name: &str) -> Option<u32> {
        value.or_else(|| match self.default_of(name) {
            Some(FeatureDefault::Number(n)) => self.fallback(n as u32),
            _ => None,
        })
    }

    fn or_rate(&self, value: Option<i64>) -> Option<i64> {
        value.or_else(|| match self.default_of("host_response_rate") {
            Some(FeatureDefault::Number(n)) => self.fallback(n as i64),
            _ => None,
        })
    }

    fn or_text(&self, value: Option<String>, name: &str) -> Option<String> {
        value.or_else(|| match self.default_of(name) {
            Some(FeatureDefault::Text(t)) => self.fallback(t.to_string()),
            _ => None,
        })
    }

    fn or_flag(&self, value: Option<bool>, name: &str) -> Option<bool> {
        value.or_else(|| match self.default_of(name) {
            Some(FeatureDefault::Flag(b)) => self.fallback(b),
            _ => None,
        })
    }
}

/// Treat JSON null and blank strings as absent
fn present(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(v) => Some(v),
    }
}

/// Finite number from a JSON number or numeric string
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Boolean from a native bool, 0/1, or a `1/0/t/f/true/false` token
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => Some(true),
            "0" | "f" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Integer percentage from `85`, `"85"` or `"85%"`
pub fn parse_percentage(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            let v = n.as_f64()?;
            v.is_finite().then_some(v.trunc() as i64)
        }
        Value::String(s) => {
            let s = s.trim();
            let s = s.strip_suffix('%').unwrap_or(s).trim();
            s.parse::<i64>().ok()
        }
        _ => None,
    }
}

/// Amenity count from a count or a delimited list such as `{TV,Wifi}`
pub fn parse_amenities(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            let v = n.as_f64()?;
            (v.is_finite() && v >= 0.0).then_some(v.trunc().min(u32::MAX as f64) as u32)
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(count) = s.parse::<i64>() {
                return u32::try_from(count).ok();
            }
            let inner = s.trim_start_matches('{').trim_end_matches('}');
            let count = inner
                .split(',')
                .filter(|item| !item.trim().trim_matches('"').is_empty())
                .count();
            Some(count as u32)
        }
        _ => None,
    }
}

/// String form of a categorical field (numbers are stringified)
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Exact-match alias lookup; unmapped input passes through unchanged
fn resolve_alias(table: &[(&str, &str)], value: String) -> String {
    table
        .iter()
        .find(|(from, _)| *from == value)
        .map(|(_, to)| to.to_string())
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_request_with_aliases_and_tokens() {
        let record = Normalizer::default().normalize(&raw(json!({
            "property_type": "Apartment",
            "room_type": "Entire home/apt",
            "amenities": "wifi,tv,kitchen",
            "accommodates": 4,
            "bathrooms": 2.0,
            "city": "New York",
            "cleaning_fee": "1",
            "host_response_rate": "100%"
        })));

        assert_eq!(record.amenities, Some(3));
        assert_eq!(record.city.as_deref(), Some("NYC"));
        assert_eq!(record.cleaning_fee, Some(true));
        assert_eq!(record.host_response_rate, Some(100));
        assert_eq!(record.accommodates, Some(4.0));
        assert_eq!(record.bathrooms, Some(2.0));
    }

    #[test]
    fn test_missing_response_rate_defaults_to_100() {
        let record = Normalizer::default().normalize(&raw(json!({ "city": "SF" })));
        assert_eq!(record.host_response_rate, Some(100));
    }

    #[test]
    fn test_unparseable_bathrooms_defaults() {
        let record =
            Normalizer::default().normalize(&raw(json!({ "bathrooms": "not-a-number" })));
        assert_eq!(record.bathrooms, Some(1.0));
    }

    #[test]
    fn test_empty_record_uses_default_table() {
        let record = Normalizer::default().normalize(&RawRecord::new());
        assert_eq!(record.property_type.as_deref(), Some("Apartment"));
        assert_eq!(record.room_type.as_deref(), Some("Entire home/apt"));
        assert_eq!(record.amenities, Some(0));
        assert_eq!(record.accommodates, Some(1.0));
        assert_eq!(record.bed_type.as_deref(), Some("Real Bed"));
        assert_eq!(record.cancellation_policy.as_deref(), Some("flexible"));
        assert_eq!(record.cleaning_fee, Some(true));
        assert_eq!(record.city.as_deref(), Some("NYC"));
        assert_eq!(record.host_has_profile_pic, Some(true));
        assert_eq!(record.host_identity_verified, Some(true));
        assert_eq!(record.instant_bookable, Some(false));
        assert_eq!(record.latitude, Some(0.0));
        assert_eq!(record.longitude, Some(0.0));
        assert_eq!(record.number_of_reviews, Some(0.0));
        assert_eq!(record.review_scores_rating, Some(90.0));
        assert_eq!(record.bedrooms, Some(0.0));
        assert_eq!(record.beds, Some(1.0));
    }

    #[test]
    fn test_review_score_default_from_config() {
        let config = NormalizerConfig {
            review_scores_rating_default: 0.0,
        };
        let record = Normalizer::from_config(&config, MissingPolicy::Defaults)
            .normalize(&RawRecord::new());
        assert_eq!(record.review_scores_rating, Some(0.0));
    }

    #[test]
    fn test_flag_tokens() {
        for (input, expected) in [
            (json!(true), Some(true)),
            (json!("TRUE"), Some(true)),
            (json!(" t "), Some(true)),
            (json!(0), Some(false)),
            (json!("False"), Some(false)),
            (json!("f"), Some(false)),
            (json!("yes"), None),
            (json!(2), None),
        ] {
            assert_eq!(parse_flag(&input), expected, "{:?}", input);
        }

        // Unrecognised token falls back to the per-field default
        let record = Normalizer::default().normalize(&raw(json!({
            "instant_bookable": "maybe",
            "host_has_profile_pic": "maybe"
        })));
        assert_eq!(record.instant_bookable, Some(false));
        assert_eq!(record.host_has_profile_pic, Some(true));
    }

    #[test]
    fn test_percentage_parsing() {
        assert_eq!(parse_percentage(&json!("87%")), Some(87));
        assert_eq!(parse_percentage(&json!(" 50 % ")), Some(50));
        assert_eq!(parse_percentage(&json!(92.7)), Some(92));
        assert_eq!(parse_percentage(&json!("85.5%")), None);
        assert_eq!(parse_percentage(&json!("n/a")), None);

        let record =
            Normalizer::default().normalize(&raw(json!({ "host_response_rate": "n/a" })));
        assert_eq!(record.host_response_rate, Some(100));
    }

    #[test]
    fn test_amenity_representations() {
        assert_eq!(parse_amenities(&json!(12)), Some(12));
        assert_eq!(parse_amenities(&json!("12")), Some(12));
        assert_eq!(parse_amenities(&json!("{TV,Wifi,\"Air conditioning\"}")), Some(3));
        assert_eq!(parse_amenities(&json!("wifi,,tv, ")), Some(2));
        assert_eq!(parse_amenities(&json!("{}")), Some(0));
        assert_eq!(parse_amenities(&json!(-4)), None);
        assert_eq!(parse_amenities(&json!("-3")), None);
        assert_eq!(parse_amenities(&json!(" +5 ")), Some(5));

        let record = Normalizer::default().normalize(&raw(json!({ "amenities": "-3" })));
        assert_eq!(record.amenities, Some(0));

        let record = Normalizer::default().normalize(&raw(json!({ "amenities": "" })));
        assert_eq!(record.amenities, Some(0));
    }

    #[test]
    fn test_every_alias_resolves() {
        let tables = [
            ("city", CITY_ALIASES),
            ("room_type", ROOM_TYPE_ALIASES),
            ("cancellation_policy", CANCELLATION_ALIASES),
        ];
        let schema = Schema::current();
        for (field, table) in tables {
            let vocabulary = schema.vocabulary(field).unwrap();
            for (from, to) in table {
                let record = Normalizer::default().normalize(&raw(json!({ field: from })));
                let resolved = match field {
                    "city" => record.city,
                    "room_type" => record.room_type,
                    _ => record.cancellation_policy,
                };
                assert_eq!(resolved.as_deref(), Some(*to), "{} {:?}", field, from);
                assert!(vocabulary.contains(to), "{} not in {} vocabulary", to, field);
            }
        }

        let record = Normalizer::default().normalize(&raw(json!({
            "city": "Washington, D.C.",
            "room_type": "Private Room",
            "cancellation_policy": "Advanced Super Strict"
        })));
        assert_eq!(record.city.as_deref(), Some("DC"));
        assert_eq!(record.room_type.as_deref(), Some("Private room"));
        assert_eq!(record.cancellation_policy.as_deref(), Some("super_strict_60"));
    }

    #[test]
    fn test_unmapped_category_passes_through() {
        let record = Normalizer::default().normalize(&raw(json!({
            "city": "Atlantis",
            "room_type": "Shared Room",
            "cancellation_policy": "Super strict"
        })));
        assert_eq!(record.city.as_deref(), Some("Atlantis"));
        assert_eq!(record.room_type.as_deref(), Some("Shared room"));
        assert_eq!(record.cancellation_policy.as_deref(), Some("super_strict_30"));
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        assert_eq!(parse_number(&json!("NaN")), None);
        assert_eq!(parse_number(&json!("inf")), None);
        assert_eq!(parse_number(&json!(" 3.5 ")), Some(3.5));
        assert_eq!(parse_number(&json!([1])), None);
    }

    #[test]
    fn test_impute_policy_leaves_gaps() {
        let record = Normalizer::new(MissingPolicy::Impute).normalize(&raw(json!({
            "bathrooms": "oops",
            "city": "DC"
        })));
        assert_eq!(record.bathrooms, None);
        assert_eq!(record.host_response_rate, None);
        assert_eq!(record.cleaning_fee, None);
        assert_eq!(record.city.as_deref(), Some("DC"));
    }
}
