use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Milliseconds between the Unix epoch and 2015-01-01T00:00:00Z.
pub const SNOWFLAKE_EPOCH_MS: u64 = 1_420_070_400_000;

/// Low bits holding worker, process and sequence data.
const TIMESTAMP_SHIFT: u32 = 22;

/// A 64-bit remote identifier with its creation instant in the high 42 bits.
///
/// On the wire ids are decimal strings so that JavaScript clients do not lose
/// precision. Bare unsigned integers are accepted on input as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(u64);

impl Snowflake {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Milliseconds since the Unix epoch at which this id was minted.
    pub const fn timestamp_ms(self) -> u64 {
        (self.0 >> TIMESTAMP_SHIFT) + SNOWFLAKE_EPOCH_MS
    }

    /// The creation instant encoded in the id.
    pub fn created_at(self) -> DateTime<Utc> {
        // 42 bits of milliseconds past 2015 always lands inside chrono's range.
        DateTime::from_timestamp_millis(self.timestamp_ms() as i64)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The smallest id that could have been minted at `instant`.
    ///
    /// Instants before the snowflake epoch clamp to zero.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        let ms = instant.timestamp_millis().max(0) as u64;
        Self(ms.saturating_sub(SNOWFLAKE_EPOCH_MS) << TIMESTAMP_SHIFT)
    }
}

impl From<u64> for Snowflake {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<Snowflake> for u64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

impl FromStr for Snowflake {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct SnowflakeVisitor;

impl<'de> Visitor<'de> for SnowflakeVisitor {
    type Value = Snowflake;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a snowflake as a decimal string or unsigned integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse::<Snowflake>()
            .map_err(|e| E::custom(format!("invalid snowflake {v:?}: {e}")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Snowflake(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(Snowflake)
            .map_err(|_| E::custom(format!("snowflake must not be negative, got {v}")))
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_at_decodes_known_id() {
        // 175928847299117063 >> 22 = 41944705796 ms after the epoch.
        let id = Snowflake::new(175_928_847_299_117_063);
        assert_eq!(id.timestamp_ms(), 1_462_015_105_796);
        assert_eq!(
            id.created_at().to_rfc3339(),
            "2016-04-30T11:18:25.796+00:00"
        );
    }

    #[test]
    fn created_at_is_monotonic_in_id() {
        let ids = [
            0_u64,
            1,
            (1 << 22) - 1,
            1 << 22,
            175_928_847_299_117_063,
            912_345_678_901_234_567,
            u64::MAX,
        ];
        for pair in ids.windows(2) {
            let earlier = Snowflake::new(pair[0]).created_at();
            let later = Snowflake::new(pair[1]).created_at();
            assert!(earlier <= later, "{} vs {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn from_instant_is_lower_bound() {
        let id = Snowflake::new(175_928_847_299_117_063);
        let floor = Snowflake::from_instant(id.created_at());
        assert!(floor <= id);
        assert_eq!(floor.created_at(), id.created_at());
    }

    #[test]
    fn deserializes_string_and_integer_ids() {
        let from_str: Snowflake = serde_json::from_value(json!("9007199254740993")).unwrap();
        assert_eq!(from_str.get(), 9_007_199_254_740_993);
        let from_int: Snowflake = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(from_int.get(), 42);
    }

    #[test]
    fn rejects_floats_and_negative_ids() {
        assert!(serde_json::from_value::<Snowflake>(json!(1.5)).is_err());
        assert!(serde_json::from_value::<Snowflake>(json!(-7)).is_err());
        assert!(serde_json::from_value::<Snowflake>(json!("12abc")).is_err());
    }

    #[test]
    fn serializes_as_string() {
        let value = serde_json::to_value(Snowflake::new(80_351_110_224_678_912)).unwrap();
        assert_eq!(value, json!("80351110224678912"));
    }
}
