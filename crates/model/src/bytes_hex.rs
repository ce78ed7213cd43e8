//! Serde serialization of byte vectors as "0x" prefixed hex strings.

use {
    serde::{de, Deserializer, Serializer},
    std::{borrow::Cow, fmt},
};

pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor {}
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Vec<u8>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a hex encoded string prefixed with 0x")
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let s: Cow<str> = s
                .strip_prefix("0x")
                .map(Cow::Borrowed)
                .ok_or_else(|| de::Error::custom(format!("{s:?} missing \"0x\" prefix")))?;
            hex::decode(s.as_ref())
                .map_err(|err| de::Error::custom(format!("failed to decode {s:?} as hex: {err}")))
        }
    }

    deserializer.deserialize_str(Visitor {})
}
