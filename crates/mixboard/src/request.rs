//! Mix request model and candidate validation

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// Smallest accepted adjustment
pub const MIN_ADJUSTMENT: i32 = -12;
/// Largest accepted adjustment
pub const MAX_ADJUSTMENT: i32 = 12;

/// What a request targets on the mixing desk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Instrument,
    Singer,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Instrument => "instrument",
            ItemType::Singer => "singer",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ItemType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instrument" => Ok(ItemType::Instrument),
            "singer" => Ok(ItemType::Singer),
            other => Err(ValidationError::UnknownItemType(other.to_string())),
        }
    }
}

/// A stored volume adjustment request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: Uuid,
    pub requester_name: String,
    pub item_type: ItemType,
    pub item_name: String,
    pub adjustment: i32,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
}

/// Candidate request as submitted by a user, before validation.
///
/// Item type and adjustment stay loosely typed here; [`NewRequest::validate`]
/// turns them into a [`ValidationError`] naming the broken constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub requester_name: String,
    pub item_type: String,
    pub item_name: String,
    pub adjustment: i64,
}

impl NewRequest {
    pub fn new(
        requester_name: impl Into<String>,
        item_type: ItemType,
        item_name: impl Into<String>,
        adjustment: i64,
    ) -> Self {
        Self {
            requester_name: requester_name.into(),
            item_type: item_type.as_str().to_string(),
            item_name: item_name.into(),
            adjustment,
        }
    }

    /// Check every submission constraint, returning the first violation.
    pub fn validate(&self) -> Result<(ItemType, i32), ValidationError> {
        if self.requester_name.trim().is_empty() {
            return Err(ValidationError::EmptyRequesterName);
        }
        let item_type = self.item_type.parse::<ItemType>()?;
        if self.adjustment == 0 {
            return Err(ValidationError::ZeroAdjustment);
        }
        let in_range = (MIN_ADJUSTMENT as i64..=MAX_ADJUSTMENT as i64).contains(&self.adjustment);
        if !in_range {
            return Err(ValidationError::AdjustmentOutOfRange {
                value: self.adjustment,
                min: MIN_ADJUSTMENT,
                max: MAX_ADJUSTMENT,
            });
        }
        Ok((item_type, self.adjustment as i32))
    }

    /// Validate and stamp the candidate with a fresh identity and creation time.
    pub fn into_request(self) -> Result<Request, ValidationError> {
        let (item_type, adjustment) = self.validate()?;
        Ok(Request {
            id: Uuid::new_v4(),
            requester_name: self.requester_name,
            item_type,
            item_name: self.item_name,
            adjustment,
            // Millisecond precision so the wire form round-trips exactly
            timestamp: Utc::now().trunc_subsecs(3),
        })
    }
}

/// ISO-8601 text timestamps with millisecond digits and a `Z` suffix.
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
