//! Schema-driven coercion of request payloads. Every function here
//! is pure and total: it either returns a coerced value or a single
//! `QueueyError::InvalidParameter`/`InvalidMessageId`, no partial side
//! effects happen before validation completes.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::QueueyError;
use crate::model::{Order, PartitionedId};
use crate::ports::Since;
use crate::principal::Principal;
use crate::timeuuid::TimeUuid;

pub const MAX_QUEUE_NAME_LEN: usize = 50;
pub const MAX_PARTITIONS: u32 = 200;
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 1000;
pub const MIN_TTL: u32 = 1;
pub const MAX_TTL: u32 = 1 << 25;
pub const DEFAULT_TTL: u32 = 3 * 86_400;

static QUEUE_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+$").unwrap());
static MESSAGE_ID_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(\d{1,3}):)?([a-z0-9]{32})$").unwrap());
static DECIMAL_LITERAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)?$").unwrap());

pub fn validate_queue_name(name: &str) -> Result<(), QueueyError> {
    if name.is_empty() || name.len() > MAX_QUEUE_NAME_LEN || !QUEUE_NAME_RE.is_match(name) {
        return Err(QueueyError::InvalidQueueName(name.to_string()));
    }
    Ok(())
}

pub fn parse_limit(raw: Option<&str>, default: u32) -> Result<u32, QueueyError> {
    let n = match raw {
        None => return Ok(default),
        Some(s) => coerce_u32(s, "limit")?,
    };
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&n) {
        return Err(QueueyError::InvalidParameter(format!(
            "limit must be between {MIN_LIMIT} and {MAX_LIMIT}"
        )));
    }
    Ok(n)
}

pub fn parse_order(raw: Option<&str>, default: Order) -> Result<Order, QueueyError> {
    match raw {
        None => Ok(default),
        Some(s) => Order::parse(s)
            .ok_or_else(|| QueueyError::InvalidParameter(format!("invalid order: {s}"))),
    }
}

pub fn parse_partitions_count(raw: Option<&str>, default: u32) -> Result<u32, QueueyError> {
    let n = match raw {
        None => return Ok(default),
        Some(s) => coerce_u32(s, "partitions")?,
    };
    if n < 1 || n > MAX_PARTITIONS {
        return Err(QueueyError::InvalidParameter(format!(
            "partitions must be between 1 and {MAX_PARTITIONS}"
        )));
    }
    Ok(n)
}

/// CSV of partition indices, e.g. `1,2,3`.
pub fn parse_partitions_csv(raw: &str) -> Result<Vec<u32>, QueueyError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| coerce_u32(s, "partitions"))
        .collect()
}

pub fn parse_ttl(raw: Option<&str>) -> Result<u32, QueueyError> {
    let n = match raw {
        None => return Ok(DEFAULT_TTL),
        Some(s) => coerce_u32(s, "ttl")?,
    };
    if !(MIN_TTL..=MAX_TTL).contains(&n) {
        return Err(QueueyError::InvalidParameter(format!(
            "ttl must be between {MIN_TTL} and {MAX_TTL}"
        )));
    }
    Ok(n)
}

/// CSV of `app:<name>` / `bid:<local>@<domain>` grants.
pub fn parse_principals_csv(raw: &str) -> Result<Vec<String>, QueueyError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Principal::parse_grant(s)
                .map(|_| s.to_string())
                .ok_or_else(|| QueueyError::InvalidParameter(format!("invalid principal: {s}")))
        })
        .collect()
}

/// One `[<partition>:]<32-hex>` token; a bare token routes to partition 1.
pub fn parse_message_id_token(raw: &str) -> Result<PartitionedId, QueueyError> {
    let caps = MESSAGE_ID_TOKEN_RE
        .captures(raw.trim())
        .ok_or_else(|| QueueyError::InvalidMessageId(raw.to_string()))?;
    let partition = match caps.get(1) {
        Some(m) => m
            .as_str()
            .parse::<u32>()
            .map_err(|_| QueueyError::InvalidMessageId(raw.to_string()))?,
        None => 1,
    };
    let message_id = TimeUuid::parse(&caps[2])?;
    Ok(PartitionedId {
        partition,
        message_id,
    })
}

/// A comma-joined list of message-id tokens.
pub fn parse_message_id_batch(raw: &str) -> Result<Vec<PartitionedId>, QueueyError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_message_id_token)
        .collect()
}

/// `since` is either a 32-hex message id or a decimal-seconds literal; the
/// engine disambiguates by regex match on the decimal form.
pub fn parse_since(raw: &str) -> Result<Since, QueueyError> {
    let raw = raw.trim();
    if DECIMAL_LITERAL_RE.is_match(raw) {
        let d = Decimal::from_str(raw)
            .map_err(|_| QueueyError::InvalidParameter(format!("invalid since: {raw}")))?;
        Ok(Since::Seconds(d))
    } else {
        Ok(Since::Id(TimeUuid::parse(raw)?))
    }
}

pub fn validate_body_nonempty(body: &[u8]) -> Result<(), QueueyError> {
    if body.is_empty() {
        return Err(QueueyError::InvalidParameter(
            "body must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Coerce a single integer-valued header/field, e.g. `X-Partition`.
pub fn coerce_u32(raw: &str, field: &str) -> Result<u32, QueueyError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| QueueyError::InvalidParameter(format!("{field} must be an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_name_boundaries() {
        assert!(validate_queue_name(&"a".repeat(50)).is_ok());
        assert!(validate_queue_name(&"a".repeat(51)).is_err());
        assert!(validate_queue_name("Has-Upper").is_err());
    }

    #[test]
    fn partitions_boundaries() {
        assert!(parse_partitions_count(Some("200"), 1).is_ok());
        assert!(parse_partitions_count(Some("201"), 1).is_err());
        assert!(parse_partitions_count(Some("0"), 1).is_err());
    }

    #[test]
    fn ttl_boundaries() {
        assert!(parse_ttl(Some("1")).is_ok());
        assert!(parse_ttl(Some(&(1u32 << 25).to_string())).is_ok());
        assert!(parse_ttl(Some("0")).is_err());
    }

    #[test]
    fn order_rejects_unknown_values() {
        assert!(parse_order(Some("sideways"), Order::Descending).is_err());
        assert!(matches!(
            parse_order(Some("ascending"), Order::Descending),
            Ok(Order::Ascending)
        ));
    }

    #[test]
    fn message_id_token_without_partition_defaults_to_one() {
        let id = parse_message_id_token(&"a".repeat(32)).unwrap();
        assert_eq!(id.partition, 1);
    }

    #[test]
    fn message_id_token_with_partition_prefix() {
        let token = format!("7:{}", "b".repeat(32));
        let id = parse_message_id_token(&token).unwrap();
        assert_eq!(id.partition, 7);
    }

    #[test]
    fn since_disambiguates_decimal_from_hex() {
        assert!(matches!(parse_since("1700000000.5").unwrap(), Since::Seconds(_)));
        assert!(matches!(parse_since(&"a".repeat(32)).unwrap(), Since::Id(_)));
    }

    #[test]
    fn principals_csv_rejects_malformed_entries() {
        assert!(parse_principals_csv("app:acme,bid:fred@example.com").is_ok());
        assert!(parse_principals_csv("not-a-principal").is_err());
    }
}
