//! Canonical listing record
//!
//! One typed slot per schema column. `None` means "no usable value" and is
//! filled by the fitted imputation value at transform time.

use serde::Serialize;

use super::schema::Schema;

/// Listing attributes after normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub amenities: Option<u32>,
    pub accommodates: Option<f64>,
    pub bathrooms: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub host_response_rate: Option<i64>,
    pub number_of_reviews: Option<f64>,
    pub review_scores_rating: Option<f64>,
    pub bedrooms: Option<f64>,
    pub beds: Option<f64>,
    pub property_type: Option<String>,
    pub room_type: Option<String>,
    pub bed_type: Option<String>,
    pub cancellation_policy: Option<String>,
    pub cleaning_fee: Option<bool>,
    pub city: Option<String>,
    pub host_has_profile_pic: Option<bool>,
    pub host_identity_verified: Option<bool>,
    pub instant_bookable: Option<bool>,
}

/// A single column value as seen by the encoder
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Numeric(Option<f64>),
    Category(Option<&'a str>),
}

impl CanonicalRecord {
    /// Look up a column by schema name; `None` if the record has no such column
    pub fn value(&self, name: &str) -> Option<FeatureValue<'_>> {
        let schema = Schema::current();
        let flag = |v: Option<bool>| {
            FeatureValue::Category(v.and_then(|b| schema.flag_token(name, b)))
        };

        let value = match name {
            "amenities" => FeatureValue::Numeric(self.amenities.map(f64::from)),
            "accommodates" => FeatureValue::Numeric(self.accommodates),
            "bathrooms" => FeatureValue::Numeric(self.bathrooms),
            "latitude" => FeatureValue::Numeric(self.latitude),
            "longitude" => FeatureValue::Numeric(self.longitude),
            "host_response_rate" => {
                FeatureValue::Numeric(self.host_response_rate.map(|r| r as f64))
            }
            "number_of_reviews" => FeatureValue::Numeric(self.number_of_reviews),
            "review_scores_rating" => FeatureValue::Numeric(self.review_scores_rating),
            "bedrooms" => FeatureValue::Numeric(self.bedrooms),
            "beds" => FeatureValue::Numeric(self.beds),
            "property_type" => text(&self.property_type),
            "room_type" => text(&self.room_type),
            "bed_type" => text(&self.bed_type),
            "cancellation_policy" => text(&self.cancellation_policy),
            "cleaning_fee" => flag(self.cleaning_fee),
            "city" => text(&self.city),
            "host_has_profile_pic" => flag(self.host_has_profile_pic),
            "host_identity_verified" => flag(self.host_identity_verified),
            "instant_bookable" => flag(self.instant_bookable),
            _ => return None,
        };
        Some(value)
    }
}

fn text(value: &Option<String>) -> FeatureValue<'_> {
    FeatureValue::Category(value.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_schema_column_is_addressable() {
        let record = CanonicalRecord::default();
        for spec in Schema::current().features() {
            assert!(record.value(spec.name).is_some(), "{}", spec.name);
        }
        assert!(record.value("neighbourhood").is_none());
    }

    #[test]
    fn test_flags_map_to_vocabulary_tokens() {
        let record = CanonicalRecord {
            cleaning_fee: Some(false),
            instant_bookable: Some(true),
            ..Default::default()
        };
        assert_eq!(
            record.value("cleaning_fee"),
            Some(FeatureValue::Category(Some("False")))
        );
        assert_eq!(
            record.value("instant_bookable"),
            Some(FeatureValue::Category(Some("t")))
        );
        assert_eq!(
            record.value("host_has_profile_pic"),
            Some(FeatureValue::Category(None))
        );
    }
}
