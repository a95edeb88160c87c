//! In-memory [`ChainRpc`] for tests without a full node.
//!
//! Objects and events are pre-loaded; queued failures are returned first,
//! one per call, before any data.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use suigives_common::{Campaign, DonationEvent};

use crate::error::ChainError;
use crate::rpc::{ChainRpc, EventCursor, EventPage};

#[derive(Debug, Default)]
pub struct MockChainRpc {
    objects: RwLock<BTreeMap<String, Value>>,
    events: RwLock<HashMap<String, Vec<Value>>>,
    balances: RwLock<HashMap<(String, String), u64>>,
    failures: Mutex<VecDeque<ChainError>>,
    calls: AtomicUsize,
}

impl MockChainRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_object(&self, id: &str, object: Value) {
        self.objects.write().insert(id.to_string(), object);
    }

    /// Insert or replace a campaign object.
    pub fn put_campaign(&self, campaign: &Campaign) {
        self.insert_object(&campaign.id, campaign_object(campaign));
    }

    pub fn push_event(&self, event_type: &str, event: Value) {
        self.events.write().entry(event_type.to_string()).or_default().push(event);
    }

    pub fn set_balance(&self, owner: &str, coin_type: &str, amount: u64) {
        self.balances.write().insert((owner.to_string(), coin_type.to_string()), amount);
    }

    /// Make the next `times` calls fail with `error`.
    pub fn fail_next(&self, error: ChainError, times: usize) {
        let mut failures = self.failures.lock();
        for _ in 0..times {
            failures.push_back(error.clone());
        }
    }

    /// Number of RPC calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<(), ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    async fn get_object(&self, id: &str) -> Result<Option<Value>, ChainError> {
        self.begin()?;
        Ok(self.objects.read().get(id).cloned())
    }

    async fn multi_get_objects(&self, ids: &[String]) -> Result<Vec<Value>, ChainError> {
        self.begin()?;
        let objects = self.objects.read();
        Ok(ids.iter().filter_map(|id| objects.get(id).cloned()).collect())
    }

    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<EventCursor>,
        limit: usize,
    ) -> Result<EventPage<Value>, ChainError> {
        self.begin()?;
        let events = self.events.read();
        let all = events.get(event_type).map(Vec::as_slice).unwrap_or_default();

        let start = match &cursor {
            Some(c) => all
                .iter()
                .position(|e| event_cursor(e).as_ref() == Some(c))
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };
        let end = (start + limit.max(1)).min(all.len());
        let data = all[start.min(end)..end].to_vec();
        let next_cursor = data.last().and_then(event_cursor).or(cursor);

        Ok(EventPage { data, next_cursor, has_next_page: end < all.len() })
    }

    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<u64, ChainError> {
        self.begin()?;
        Ok(self
            .balances
            .read()
            .get(&(owner.to_string(), coin_type.to_string()))
            .copied()
            .unwrap_or(0))
    }
}

fn event_cursor(event: &Value) -> Option<EventCursor> {
    serde_json::from_value(event.get("id")?.clone()).ok()
}

/// Object payload as `sui_getObject` returns it for a campaign.
pub fn campaign_object(c: &Campaign) -> Value {
    json!({
        "objectId": c.id,
        "content": {
            "dataType": "moveObject",
            "fields": {
                "id": { "id": c.id },
                "name": c.name,
                "description": c.description,
                "image_url": c.image_url,
                "goal_amount": c.goal_amount.to_string(),
                "raised_sui": { "fields": { "value": c.raised_sui.to_string() } },
                "raised_sgusd": { "fields": { "value": c.raised_sgusd.to_string() } },
                "deadline": c.deadline_ms.to_string(),
                "category": c.category,
                "creator": c.creator,
                "backer_count": c.backer_count.to_string(),
                "created_at": c.created_at_ms.to_string(),
                "is_active": c.is_active,
                "ended": c.ended
            }
        }
    })
}

/// `CampaignCreated` event payload.
pub fn campaign_created_event(campaign_id: &str, seq: u64) -> Value {
    json!({
        "id": { "txDigest": format!("create-{}", campaign_id), "eventSeq": seq.to_string() },
        "parsedJson": { "campaign_id": campaign_id }
    })
}

/// `DonationReceived` event payload.
pub fn donation_event(d: &DonationEvent) -> Value {
    json!({
        "id": { "txDigest": d.tx_digest, "eventSeq": d.event_seq.to_string() },
        "sender": d.donor,
        "parsedJson": {
            "campaign_id": d.campaign_id,
            "donor": d.donor,
            "amount": d.amount.to_string(),
            "coin_type": d.coin_type.as_str(),
            "message": d.message,
            "is_anonymous": d.is_anonymous
        },
        "timestampMs": d.timestamp_ms.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_campaign, parse_donation_event};
    use suigives_common::CoinType;

    fn sample_campaign() -> Campaign {
        Campaign {
            id: "0xabc".into(),
            name: "Books".into(),
            description: String::new(),
            image_url: String::new(),
            goal_amount: 10,
            raised_sui: 4,
            raised_sgusd: 2,
            deadline_ms: 99,
            category: "education".into(),
            creator: "0x1".into(),
            backer_count: 1,
            created_at_ms: 5,
            is_active: true,
            ended: false,
        }
    }

    #[test]
    fn test_fixtures_parse_back() {
        let c = sample_campaign();
        assert_eq!(parse_campaign(&campaign_object(&c)).unwrap(), c);

        let ev = DonationEvent {
            tx_digest: "T".into(),
            event_seq: 0,
            campaign_id: "0xabc".into(),
            donor: "0xd".into(),
            amount: 3,
            coin_type: CoinType::SgUsd,
            message: String::new(),
            is_anonymous: false,
            timestamp_ms: 7,
        };
        assert_eq!(parse_donation_event(&donation_event(&ev)).unwrap(), ev);
    }

    #[tokio::test]
    async fn test_event_paging_follows_cursor() {
        let rpc = MockChainRpc::new();
        for i in 0..5 {
            rpc.push_event("E", campaign_created_event(&format!("0x{}", i), 0));
        }

        let first = rpc.query_events("E", None, 2).await.unwrap();
        assert_eq!(first.data.len(), 2);
        assert!(first.has_next_page);

        let second = rpc.query_events("E", first.next_cursor, 10).await.unwrap();
        assert_eq!(second.data.len(), 3);
        assert!(!second.has_next_page);

        let empty = rpc.query_events("E", second.next_cursor.clone(), 10).await.unwrap();
        assert!(empty.data.is_empty());
        assert_eq!(empty.next_cursor, second.next_cursor);
    }

    #[tokio::test]
    async fn test_queued_failures_come_first() {
        let rpc = MockChainRpc::new();
        rpc.fail_next(ChainError::Network("down".into()), 1);
        assert!(rpc.get_object("0x1").await.is_err());
        assert_eq!(rpc.get_object("0x1").await.unwrap(), None);
        assert_eq!(rpc.calls(), 2);
    }
}
