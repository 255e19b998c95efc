use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Workspace role of a user. Unrecognized roles deserialize to `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Admin,
    Developer,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Admin => "admin",
            Role::Developer => "developer",
            Role::Unknown => "unknown",
        }
    }

    /// Whether this role may open a route that requires `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        *self == required
    }
}

/// The signed-in user as reported by `/auth/me` and `/auth/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "name", alias = "displayName", default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Backend fields this client does not interpret, kept so profile
    /// merges never drop data.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identity {
    pub fn is_developer(&self) -> bool {
        self.role == Role::Developer
    }

    /// Initials for avatar-style display ("Ayesha Khan" -> "AK").
    pub fn initials(&self) -> String {
        let initials: String = self
            .display_name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .collect::<String>()
            .to_uppercase();
        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }

    /// Merge a partial update into this identity. Fields absent from the
    /// update are left untouched.
    pub fn merge(&mut self, update: IdentityUpdate) {
        if let Some(name) = update.display_name {
            self.display_name = name;
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(username) = update.username {
            self.username = Some(username);
        }
        self.extra.extend(update.extra);
    }
}

/// Partial identity, used both as the `PUT /auth/profile` request body and
/// as the partial record it returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityUpdate {
    #[serde(rename = "name", alias = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentityUpdate {
    pub fn display_name(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Backends disagree on whether ids are strings or numbers; accept both.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
