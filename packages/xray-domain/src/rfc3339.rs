//! Serde adapters that keep wire timestamps in RFC 3339 form.

use serde::{Deserialize, Deserializer, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&value.format(&Rfc3339).map_err(serde::ser::Error::custom)?)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	parse(&String::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

fn parse(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
	OffsetDateTime::parse(raw, &Rfc3339)
}

pub mod option {
	use serde::{Deserialize, Deserializer, Serializer};
	use time::OffsetDateTime;

	pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(value) => super::serialize(value, serializer),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Option::<String>::deserialize(deserializer)?
			.map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
			.transpose()
	}
}
