use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Company label shown when an entitlement denial carries no company name.
pub const DEFAULT_COMPANY_NAME: &str = "Your System";

/// Vendor label shown when the configuration names no developer.
const DEFAULT_POWERED_BY: &str = "SparkPair";

/// Returns true when the subscription has lapsed at `now`.
/// Expiry is strict: a subscription expiring exactly at `now` is still valid.
pub fn subscription_expired(now: DateTime<Utc>, expiry: DateTime<Utc>) -> bool {
    now > expiry
}

/// Full workspace configuration as returned by `GET /config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfiguration {
    pub company_name: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub subscription_expiry: DateTime<Utc>,
    #[serde(flatten)]
    pub branding: BrandingMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandingMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<DeveloperMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeveloperMeta {
    #[serde(default)]
    pub powered_by: Option<String>,
}

impl BrandingMeta {
    pub fn powered_by(&self) -> &str {
        self.developer
            .as_ref()
            .and_then(|d| d.powered_by.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_POWERED_BY)
    }
}

/// The subset of configuration a 403 from `GET /config` carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackConfiguration {
    pub company_name: String,
    pub subscription_expiry: Option<DateTime<Utc>>,
}

impl Default for FallbackConfiguration {
    fn default() -> Self {
        Self {
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            subscription_expiry: None,
        }
    }
}

impl FallbackConfiguration {
    /// Extract fallback fields from a denial body.
    ///
    /// Each field is read from `data` first, then from the top level; the
    /// expiry finally falls back to a top-level `expiredOn`. Bodies that are
    /// not JSON yield the defaults.
    pub fn from_denial_body(body: &str) -> Self {
        let Ok(payload) = serde_json::from_str::<Value>(body) else {
            return Self::default();
        };
        let company_name = denial_field(&payload, "companyName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_COMPANY_NAME)
            .to_string();

        let subscription_expiry = denial_field(&payload, "subscriptionExpiry")
            .and_then(parse_timestamp)
            .or_else(|| payload.get("expiredOn").and_then(parse_timestamp));

        Self {
            company_name,
            subscription_expiry,
        }
    }
}

fn denial_field<'a>(payload: &'a Value, name: &str) -> Option<&'a Value> {
    payload
        .get("data")
        .and_then(|d| d.get(name))
        .filter(|v| !v.is_null())
        .or_else(|| payload.get(name))
}

/// Configuration held by the entitlement authority: complete after a normal
/// fetch, partial after an entitlement denial.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceConfig {
    Full(WorkspaceConfiguration),
    Fallback(FallbackConfiguration),
}

impl WorkspaceConfig {
    pub fn company_name(&self) -> &str {
        match self {
            WorkspaceConfig::Full(c) => &c.company_name,
            WorkspaceConfig::Fallback(c) => &c.company_name,
        }
    }

    pub fn subscription_expiry(&self) -> Option<DateTime<Utc>> {
        match self {
            WorkspaceConfig::Full(c) => Some(c.subscription_expiry),
            WorkspaceConfig::Fallback(c) => c.subscription_expiry,
        }
    }

    pub fn branding(&self) -> Option<&BrandingMeta> {
        match self {
            WorkspaceConfig::Full(c) => Some(&c.branding),
            WorkspaceConfig::Fallback(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, WorkspaceConfig::Fallback(_))
    }
}

/// Parse a backend timestamp: RFC 3339, a bare `YYYY-MM-DD` date (midnight
/// UTC), or epoch milliseconds.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|dt| Utc.from_utc_datetime(&dt))
                })
        }
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_timestamp(&value)
        .ok_or_else(|| de::Error::custom(format!("invalid subscription timestamp: {}", value)))
}
