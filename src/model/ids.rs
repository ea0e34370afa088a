use std::{fmt, str::FromStr, sync::Arc};

use graphbus_error::BrokerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Проверяет, что строка похожа на абсолютный URI: `scheme:rest`, где схема
/// начинается с буквы и состоит из `[A-Za-z0-9+.-]`, а остаток не пуст.
pub fn validate_absolute_uri(
    field: &str,
    raw: &str,
) -> Result<(), BrokerError> {
    let Some((scheme, rest)) = raw.split_once(':') else {
        return Err(BrokerError::invalid(field, format!("'{raw}' has no scheme")));
    };
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
    if !valid_scheme {
        return Err(BrokerError::invalid(
            field,
            format!("'{raw}' has an invalid scheme"),
        ));
    }
    if rest.is_empty() || rest.chars().any(char::is_whitespace) {
        return Err(BrokerError::invalid(
            field,
            format!("'{raw}' is not an absolute uri"),
        ));
    }
    Ok(())
}

macro_rules! uri_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Разбирает и проверяет идентификатор.
            pub fn parse(raw: impl AsRef<str>) -> Result<Self, BrokerError> {
                let raw = raw.as_ref();
                validate_absolute_uri($field, raw)?;
                Ok(Self(Arc::from(raw)))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(
                &self,
                f: &mut fmt::Formatter<'_>,
            ) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = BrokerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

uri_id!(
    /// Адрес ресурса (цели публикации).
    ResourceId,
    "resource uri"
);

uri_id!(
    /// Адрес подписки.
    SubscriptionId,
    "subscription uri"
);

impl SubscriptionId {
    /// Генерирует новый идентификатор подписки под ресурсом:
    /// `{resource}/{uuid}`.
    pub fn generate(resource: &ResourceId) -> Self {
        let raw = format!(
            "{}/{}",
            resource.as_str().trim_end_matches('/'),
            uuid::Uuid::new_v4()
        );
        Self(Arc::from(raw.as_str()))
    }
}
