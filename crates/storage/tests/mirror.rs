//! File-backed mirror: reconciliation survives a restart without
//! re-counting donations.

use std::sync::Arc;

use suigives_chain::mock::{campaign_created_event, donation_event, MockChainRpc};
use suigives_chain::{CampaignService, ChainMetrics, FreshnessPolicy, ReadPipeline, RequestLimiter, RetryPolicy};
use suigives_common::{Campaign, CoinType, DonationEvent};
use suigives_storage::{Database, DonationQueries, Reconciler, UserQueries};

fn service(rpc: Arc<MockChainRpc>) -> Arc<CampaignService> {
    let pipeline = ReadPipeline::new(
        RetryPolicy::none(),
        RequestLimiter::new(3),
        FreshnessPolicy::default(),
        Arc::new(ChainMetrics::new()),
    );
    Arc::new(CampaignService::new(rpc, pipeline, "0x1", "crowdfunding"))
}

fn seeded_chain() -> Arc<MockChainRpc> {
    let rpc = Arc::new(MockChainRpc::new());
    rpc.put_campaign(&Campaign {
        id: "0xa1".into(),
        name: "Clinic".into(),
        description: String::new(),
        image_url: String::new(),
        goal_amount: 100,
        raised_sui: 12,
        raised_sgusd: 3,
        deadline_ms: 0,
        category: "health".into(),
        creator: "0xc".into(),
        backer_count: 2,
        created_at_ms: 1,
        is_active: true,
        ended: false,
    });
    rpc.push_event("0x1::crowdfunding::CampaignCreated", campaign_created_event("0xa1", 0));
    for (seq, (digest, amount, coin)) in
        [("T1", 12, CoinType::Sui), ("T2", 3, CoinType::SgUsd)].into_iter().enumerate()
    {
        rpc.push_event(
            "0x1::crowdfunding::DonationReceived",
            donation_event(&DonationEvent {
                tx_digest: digest.into(),
                event_seq: seq as u64,
                campaign_id: "0xa1".into(),
                donor: "0xd1".into(),
                amount,
                coin_type: coin,
                message: String::new(),
                is_anonymous: false,
                timestamp_ms: 10 + seq as u64,
            }),
        );
    }
    rpc
}

#[tokio::test]
async fn test_restart_resumes_without_double_counting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirror.db");
    let rpc = seeded_chain();

    {
        let db = Arc::new(Database::open(&path).unwrap());
        let report = Reconciler::new(service(rpc.clone()), db, 50, 10).run().await;
        assert!(report.complete, "{:?}", report.error);
        assert_eq!(report.donations_imported, 2);
    }

    // Fresh process: new caches, same database file.
    let db = Arc::new(Database::open(&path).unwrap());
    let report = Reconciler::new(service(rpc), db.clone(), 50, 10).run().await;
    assert!(report.complete, "{:?}", report.error);
    assert_eq!(report.events_seen, 0);
    assert_eq!(report.donations_imported, 0);

    let user = db.with_connection(|c| c.load_user("0xd1")).unwrap().unwrap();
    assert_eq!(user.aggregates.total_donated_sui, 12);
    assert_eq!(user.aggregates.total_donated_sgusd, 3);
    assert_eq!(user.aggregates.donation_count, 2);
    assert_eq!(db.with_connection(|c| c.donations_by_donor("0xd1")).unwrap().len(), 2);
}
