use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// User record held by a [`UserRepository`](crate::auth::repo::UserRepository).
#[derive(Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,                // generated at registration, never changes
    pub name: String,            // display name
    pub username: String,        // login identifier
    #[serde(skip_serializing)]
    pub hashed_password: String, // Argon2 PHC string, not exposed in JSON
}

impl User {
    /// Current value of a queryable field, rendered as a string.
    pub fn field(&self, field: UserField) -> String {
        match field {
            UserField::Id => self.id.to_string(),
            UserField::Name => self.name.clone(),
            UserField::Username => self.username.clone(),
            UserField::HashedPassword => self.hashed_password.clone(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("hashed_password", &"[HASH]")
            .finish()
    }
}

/// Fields a [`UserFilter`] may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserField {
    Id,
    Name,
    Username,
    HashedPassword,
}

impl UserField {
    /// Column name in the `users` table.
    pub fn column(self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Name => "name",
            UserField::Username => "username",
            UserField::HashedPassword => "hashed_password",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown user field `{0}`")]
pub struct UnknownField(pub String);

impl FromStr for UserField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(UserField::Id),
            "name" => Ok(UserField::Name),
            "username" => Ok(UserField::Username),
            "hashed_password" => Ok(UserField::HashedPassword),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

/// Conjunction of `field == value` constraints.
///
/// Field names are kept as given; a name that is not a [`UserField`] makes the
/// filter unsatisfiable instead of raising an error. An empty filter matches
/// every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    conditions: BTreeMap<String, String>,
}

impl UserFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the expected value for `field`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    pub fn by_username(username: impl Into<String>) -> Self {
        Self::new().eq(UserField::Username.column(), username)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Resolve every condition to a known field.
    ///
    /// Returns `Err` with the first field name that does not exist on
    /// [`User`]; stores treat that as "no record can match".
    pub fn resolve(&self) -> Result<Vec<(UserField, &str)>, UnknownField> {
        self.conditions
            .iter()
            .map(|(name, value)| name.parse::<UserField>().map(|field| (field, value.as_str())))
            .collect()
    }

    pub fn matches(&self, user: &User) -> bool {
        match self.resolve() {
            Ok(conditions) => conditions
                .into_iter()
                .all(|(field, value)| user.field(field) == value),
            Err(_) => false,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for UserFilter
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |filter, (k, v)| filter.eq(k, v))
    }
}
