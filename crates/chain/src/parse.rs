//! Move object and event parsing.
//!
//! Full node mengirim u64 sebagai string JSON (`"1000"`) pada sebagian besar
//! field, tapi angka biasa juga diterima. Field `Balance<T>` bisa berbentuk
//! `{"fields": {"value": "..."}}` atau skalar. Field yang hilang bernilai
//! default; hanya id campaign yang wajib ada.

use serde_json::Value;
use suigives_common::{normalize_address, Campaign, CoinType, DonationEvent};

use crate::error::ChainError;
use crate::rpc::value_to_u64;

fn field<'a>(fields: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| fields.get(*n)).filter(|v| !v.is_null())
}

fn u64_field(fields: &Value, names: &[&str]) -> u64 {
    field(fields, names).and_then(balance_value).unwrap_or(0)
}

fn str_field(fields: &Value, names: &[&str]) -> String {
    field(fields, names)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bool_field(fields: &Value, names: &[&str], default: bool) -> bool {
    field(fields, names).and_then(Value::as_bool).unwrap_or(default)
}

/// Scalar u64 or `Balance` struct.
fn balance_value(v: &Value) -> Option<u64> {
    value_to_u64(v).or_else(|| {
        v.get("fields")
            .and_then(|f| f.get("value"))
            .and_then(value_to_u64)
            .or_else(|| v.get("value").and_then(value_to_u64))
    })
}

/// `UID` fields arrive as `{"id": "0x..."}`.
fn uid_value(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::to_string)
        .or_else(|| v.get("id").and_then(Value::as_str).map(str::to_string))
}

/// Parse a `sui_getObject` data payload into a [`Campaign`].
pub fn parse_campaign(object: &Value) -> Result<Campaign, ChainError> {
    let fields = object
        .pointer("/content/fields")
        .ok_or_else(|| ChainError::Decode("campaign object has no content.fields".into()))?;

    let raw_id = object
        .get("objectId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| fields.get("id").and_then(uid_value))
        .ok_or_else(|| ChainError::Decode("campaign object has no id".into()))?;
    let id = normalize_address(&raw_id)
        .ok_or_else(|| ChainError::Decode(format!("invalid campaign id: {}", raw_id)))?;

    let creator = str_field(fields, &["creator", "owner"]);
    Ok(Campaign {
        id,
        name: str_field(fields, &["name", "title"]),
        description: str_field(fields, &["description"]),
        image_url: str_field(fields, &["image_url", "image"]),
        goal_amount: u64_field(fields, &["goal_amount", "goal"]),
        raised_sui: u64_field(fields, &["raised_sui", "raised", "balance"]),
        raised_sgusd: u64_field(fields, &["raised_sgusd", "sgusd_balance"]),
        deadline_ms: u64_field(fields, &["deadline", "deadline_ms"]),
        category: str_field(fields, &["category"]).to_ascii_lowercase(),
        creator: normalize_address(&creator).unwrap_or(creator),
        backer_count: u64_field(fields, &["backer_count", "backers"]),
        created_at_ms: u64_field(fields, &["created_at", "created_at_ms"]),
        is_active: bool_field(fields, &["is_active", "active"], true),
        ended: bool_field(fields, &["ended", "is_ended"], false),
    })
}

/// Campaign id from a `CampaignCreated` event.
pub fn parse_campaign_created(event: &Value) -> Result<String, ChainError> {
    let raw = event
        .get("parsedJson")
        .and_then(|j| field(j, &["campaign_id", "id"]))
        .and_then(uid_value)
        .ok_or_else(|| ChainError::Decode("CampaignCreated event without campaign_id".into()))?;
    normalize_address(&raw).ok_or_else(|| ChainError::Decode(format!("invalid campaign id: {}", raw)))
}

/// Parse a `DonationReceived` event.
///
/// The coin comes from `parsedJson.coin_type` when present, otherwise from
/// the event's generic type parameter, otherwise SUI.
pub fn parse_donation_event(event: &Value) -> Result<DonationEvent, ChainError> {
    let tx_digest = event
        .pointer("/id/txDigest")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::Decode("event without id.txDigest".into()))?
        .to_string();
    let event_seq = event.pointer("/id/eventSeq").and_then(value_to_u64).unwrap_or(0);
    let json = event
        .get("parsedJson")
        .ok_or_else(|| ChainError::Decode(format!("event {} without parsedJson", tx_digest)))?;

    let campaign_id = field(json, &["campaign_id"])
        .and_then(uid_value)
        .ok_or_else(|| ChainError::Decode(format!("event {} without campaign_id", tx_digest)))?;

    let coin_type = field(json, &["coin_type"])
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<CoinType>().ok())
        .or_else(|| {
            event
                .get("type")
                .and_then(Value::as_str)
                .and_then(|t| t.split_once('<'))
                .and_then(|(_, generic)| CoinType::from_type_tag(generic))
        })
        .unwrap_or(CoinType::Sui);

    let donor = field(json, &["donor", "sender"])
        .and_then(Value::as_str)
        .or_else(|| event.get("sender").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    Ok(DonationEvent {
        tx_digest,
        event_seq,
        campaign_id,
        donor,
        amount: u64_field(json, &["amount"]),
        coin_type,
        message: str_field(json, &["message"]),
        is_anonymous: bool_field(json, &["is_anonymous", "anonymous"], false),
        timestamp_ms: event
            .get("timestampMs")
            .and_then(value_to_u64)
            .or_else(|| field(json, &["timestamp"]).and_then(value_to_u64))
            .unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn campaign_object() -> Value {
        json!({
            "objectId": "0xABC",
            "content": {
                "dataType": "moveObject",
                "type": "0x1::crowdfunding::Campaign",
                "fields": {
                    "id": { "id": "0xabc" },
                    "name": "Clean Water",
                    "description": "Wells",
                    "image_url": "https://img/1.png",
                    "goal_amount": "10000000000",
                    "raised_sui": { "type": "0x2::balance::Balance<0x2::sui::SUI>", "fields": { "value": "5000000000" } },
                    "raised_sgusd": 2500000,
                    "deadline": "1800000000000",
                    "category": "Health",
                    "creator": "0xC0FFEE",
                    "backer_count": "3"
                }
            }
        })
    }

    #[test]
    fn test_parse_campaign_mixed_encodings() {
        let c = parse_campaign(&campaign_object()).unwrap();
        assert_eq!(c.id, "0xabc");
        assert_eq!(c.goal_amount, 10_000_000_000);
        assert_eq!(c.raised_sui, 5_000_000_000);
        assert_eq!(c.raised_sgusd, 2_500_000);
        assert_eq!(c.category, "health");
        assert_eq!(c.creator, "0xc0ffee");
        assert_eq!(c.backer_count, 3);
        assert!(c.is_active);
        assert!(!c.ended);
        assert_eq!(c.progress().percent, 50.0);
    }

    #[test]
    fn test_parse_campaign_missing_fields_default() {
        let obj = json!({ "objectId": "0x1", "content": { "fields": { "name": "Bare" } } });
        let c = parse_campaign(&obj).unwrap();
        assert_eq!(c.goal_amount, 0);
        assert_eq!(c.raised_sui, 0);
        assert_eq!(c.progress().percent, 0.0);
    }

    #[test]
    fn test_parse_campaign_without_content_fails() {
        let err = parse_campaign(&json!({ "objectId": "0x1" })).unwrap_err();
        assert!(matches!(err, ChainError::Decode(_)));
    }

    #[test]
    fn test_parse_campaign_created() {
        let ev = json!({ "parsedJson": { "campaign_id": "0xDEAD", "creator": "0x1" } });
        assert_eq!(parse_campaign_created(&ev).unwrap(), "0xdead");
        assert!(parse_campaign_created(&json!({ "parsedJson": {} })).is_err());
    }

    #[test]
    fn test_parse_donation_event() {
        let ev = json!({
            "id": { "txDigest": "9xT", "eventSeq": "1" },
            "type": "0x1::crowdfunding::DonationReceived",
            "sender": "0xBEEF",
            "parsedJson": {
                "campaign_id": "0xabc",
                "donor": "0xbeef",
                "amount": "1000000000",
                "coin_type": "SGUSD",
                "message": "good luck",
                "is_anonymous": false
            },
            "timestampMs": "1700000000000"
        });
        let d = parse_donation_event(&ev).unwrap();
        assert_eq!(d.tx_digest, "9xT");
        assert_eq!(d.event_seq, 1);
        assert_eq!(d.amount, 1_000_000_000);
        assert_eq!(d.coin_type, CoinType::SgUsd);
        assert_eq!(d.timestamp_ms, 1_700_000_000_000);
        assert_eq!(d.message, "good luck");
    }

    #[test]
    fn test_donation_coin_from_generic_type() {
        let ev = json!({
            "id": { "txDigest": "D", "eventSeq": 0 },
            "type": "0x1::crowdfunding::DonationReceived<0x1::sg_usd::SG_USD>",
            "sender": "0xaa",
            "parsedJson": { "campaign_id": "0xabc", "amount": 5 }
        });
        let d = parse_donation_event(&ev).unwrap();
        assert_eq!(d.coin_type, CoinType::SgUsd);
        assert_eq!(d.donor, "0xaa");
    }

    #[test]
    fn test_donation_without_digest_fails() {
        assert!(parse_donation_event(&json!({ "parsedJson": {} })).is_err());
    }
}
