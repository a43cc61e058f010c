//! # Sync and Fork Scenarios
//!
//! Block ingestion against a scripted upstream, covering:
//!
//! 1. Idempotent re-runs
//! 2. Fork detection at an existing height
//! 3. Branch switch once the competing lineage catches up
//! 4. Lower forks that never switch
//! 5. Forks validated against their own lineage
//! 6. Cancellation, aborted passes and resumption

#[cfg(test)]
mod tests {
    use tokio::sync::watch;

    use crate::fixtures::*;
    use did_01_operation_parser::{ErrorCategory, OperationError, UpdateAction};
    use did_02_chain_sync::{MockBlockSource, SyncConfig, SyncError, SyncErrorCategory};

    // =============================================================================
    // IDEMPOTENCE
    // =============================================================================

    #[tokio::test]
    async fn test_unchanged_upstream_is_noop() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        h.source.extend_by(3, "main");
        h.extend_with("main", vec![alice.payload(create_op(&alice, vec![]))]);
        h.source.extend_by(2, "main");

        let first = h.sync().await.unwrap();
        assert_eq!(first.blocks_added, 6);
        assert_eq!(first.operations_accepted, 1);
        let flags = h.fork_flags();

        let second = h.sync().await.unwrap();
        assert!(second.is_noop());
        assert_eq!(second.operations_accepted, 0);
        assert_eq!(h.fork_flags(), flags);
    }

    #[tokio::test]
    async fn test_rescan_skips_known_blocks() {
        let h = Harness::new();
        h.source.extend_by(5, "main");
        h.sync().await.unwrap();
        let flags = h.fork_flags();

        let mut config = SyncConfig::for_testing();
        config.force_full_rescan = true;
        let request = did_02_chain_sync::SyncRequest::new(LEDGER, &config);
        let report = did_02_chain_sync::SyncApi::run_sync(
            &h.engine,
            &h.source,
            request,
            watch::channel(false).1,
        )
        .await
        .unwrap();

        assert_eq!(report.blocks_added, 0);
        assert_eq!(h.fork_flags(), flags);
    }

    // =============================================================================
    // FORK DETECTION AND BRANCH SWITCH
    // =============================================================================

    /// Local chain holds heights 10..=12; returns the upstream main blocks.
    async fn synced_from_ten() -> (Harness, Vec<did_02_chain_sync::SourceBlock>) {
        let mut config = SyncConfig::for_testing();
        config.start_height = 10;
        let h = Harness::with_config(config);
        let main = h.source.extend_by(13, "main");
        let report = h.sync().await.unwrap();
        assert_eq!(report.blocks_added, 3);
        (h, main)
    }

    #[tokio::test]
    async fn test_competing_block_flagged_as_fork() {
        let (h, main) = synced_from_ten().await;

        // Same previous block as the stored block 11, different hash.
        let rival = h.add_block(&main[10], "rival", Vec::new());
        assert_eq!(rival.previous_hash, main[11].previous_hash);
        assert_ne!(rival.hash, main[11].hash);

        let report = h.sync().await.unwrap();
        assert_eq!(report.forks_recorded, 1);
        assert!(!report.branch_switched);

        let at_eleven = h.blocks_at(11);
        assert_eq!(at_eleven.len(), 2);
        let forks: Vec<_> = at_eleven.iter().filter(|b| b.fork).collect();
        assert_eq!(forks.len(), 1);
        assert_eq!(forks[0].block, rival.block_ref());
        assert_eq!(h.fork_flag(&main[11]), Some(false));
        assert_eq!(h.fork_flag(&main[12]), Some(false));
    }

    #[tokio::test]
    async fn test_longer_lineage_switches_branch() {
        let (h, main) = synced_from_ten().await;
        let rival11 = h.add_block(&main[10], "rival", Vec::new());
        h.sync().await.unwrap();

        // The same competing block 11 comes back under a longer lineage.
        let rival12 = h.add_block(&rival11, "rival", Vec::new());
        let rival13 = h.add_block(&rival12, "rival", Vec::new());
        let report = h.sync().await.unwrap();

        assert!(report.branch_switched);
        assert_eq!(report.local_tip, Some(rival13.block_ref()));
        assert_eq!(h.fork_flag(&main[11]), Some(true));
        assert_eq!(h.fork_flag(&main[12]), Some(true));
        assert_eq!(h.fork_flag(&rival11), Some(false));
        assert_eq!(h.fork_flag(&rival12), Some(false));

        // Exactly one canonical block per height.
        for height in 10..=13 {
            let canonical = h.blocks_at(height).iter().filter(|b| !b.fork).count();
            assert_eq!(canonical, 1, "height {}", height);
        }

        // Further syncing extends only the promoted branch.
        let next = h.source.extend_by(2, "rival");
        let report = h.sync().await.unwrap();
        assert_eq!(report.blocks_added, 2);
        assert_eq!(report.forks_recorded, 0);
        assert!(!report.branch_switched);
        assert_eq!(h.fork_flag(&next[1]), Some(false));
        assert_eq!(h.fork_flag(&main[12]), Some(true));
    }

    #[tokio::test]
    async fn test_lower_fork_leaves_canonical_chain() {
        let h = Harness::new();
        let main = h.source.extend_by(13, "main");
        h.sync().await.unwrap();
        let before = h.fork_flags();

        let low = h.add_block(&main[8], "low", Vec::new());
        let report = h.sync().await.unwrap();
        assert!(!report.branch_switched);
        assert_eq!(report.local_tip, Some(main[12].block_ref()));
        assert_eq!(h.fork_flag(&low), Some(true));

        // Every previously stored block keeps its flag.
        let after: Vec<_> = h
            .fork_flags()
            .into_iter()
            .filter(|(_, hash, _)| *hash != low.hash)
            .collect();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_fork_operations_follow_their_lineage() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        let create = create_op(&alice, vec![]);
        let did = did_of(&create);
        let create_hash = create.hash().unwrap();

        let genesis = h.source.extend("main");
        let b1 = h.add_block(&genesis, "main", vec![vec![alice.payload(create)]]);
        let main_update = update_op(
            did,
            create_hash,
            vec![UpdateAction::AddService(service("main-svc"))],
        );
        let b2 = h.add_block(&b1, "main", vec![vec![alice.payload(main_update)]]);
        h.add_block(&b2, "main", Vec::new());
        h.sync().await.unwrap();
        assert!(h.resolve(&did).await.unwrap().document.has_service("main-svc"));

        // The rival branch extends the same create with a different update.
        let rival_update = update_op(
            did,
            create_hash,
            vec![UpdateAction::AddService(service("rival-svc"))],
        );
        let r2 = h.add_block(&b1, "rival", vec![vec![alice.payload(rival_update)]]);
        let report = h.sync().await.unwrap();
        assert_eq!(report.operations_accepted, 1);
        assert_eq!(h.fork_flag(&r2), Some(true));
        let canonical = h.resolve(&did).await.unwrap();
        assert!(canonical.document.has_service("main-svc"));
        assert!(!canonical.document.has_service("rival-svc"));

        let r3 = h.add_block(&r2, "rival", Vec::new());
        h.add_block(&r3, "rival", Vec::new());
        assert!(h.sync().await.unwrap().branch_switched);

        let switched = h.resolve(&did).await.unwrap();
        assert!(switched.document.has_service("rival-svc"));
        assert!(!switched.document.has_service("main-svc"));
    }

    // =============================================================================
    // FAILURE, CANCELLATION AND RESUMPTION
    // =============================================================================

    #[tokio::test]
    async fn test_cancelled_pass_resumes() {
        let h = Harness::new();
        h.source.extend_by(6, "main");
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        assert!(matches!(
            h.sync_with_cancel(rx).await,
            Err(SyncError::Cancelled)
        ));
        assert!(h.stored().is_empty());

        let report = h.sync().await.unwrap();
        assert_eq!(report.blocks_added, 6);
    }

    #[tokio::test]
    async fn test_rejected_operation_aborts_pass_and_keeps_progress() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        let create = create_op(&alice, vec![]);
        let did = did_of(&create);

        let genesis = h.source.extend("main");
        let b1 = h.add_block(&genesis, "main", vec![vec![alice.payload(create.clone())]]);

        let mut unsigned = alice.sign(update_op(
            did,
            create.hash().unwrap(),
            vec![UpdateAction::AddService(service("svc"))],
        ));
        unsigned.signature.clear();
        h.add_block(&b1, "main", vec![vec![unsigned.encode().unwrap()]]);

        let err = h.sync().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Operation {
                height: 2,
                tx_index: 0,
                op_sequence: 0,
                source: OperationError::MissingSignature,
            }
        ));
        assert_eq!(
            err.category(),
            SyncErrorCategory::Operation(ErrorCategory::Signature)
        );
        assert_eq!(h.stored().len(), 2);

        // Re-running hits the same block without duplicating earlier ones.
        assert!(h.sync().await.is_err());
        assert_eq!(h.stored().len(), 2);

        // Upstream replaces the bad block; sync continues from the kept tip.
        let replacement = h.add_block(&b1, "replacement", Vec::new());
        let report = h.sync().await.unwrap();
        assert_eq!(report.blocks_added, 1);
        assert_eq!(report.local_tip, Some(replacement.block_ref()));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_typed() {
        let h = Harness::new();
        h.source.extend("main");
        h.source.set_unreachable(true);
        assert_eq!(
            h.sync().await.unwrap_err().category(),
            SyncErrorCategory::Upstream
        );

        h.source.set_unreachable(false);
        assert_eq!(h.sync().await.unwrap().blocks_added, 1);
    }

    #[tokio::test]
    async fn test_ledgers_sync_independently() {
        let h = Harness::new();
        h.source.extend_by(3, "main");
        h.sync().await.unwrap();

        let other = MockBlockSource::new();
        other.extend_by(5, "preview");
        let request = did_02_chain_sync::SyncRequest::new(
            shared_types::LedgerId::Preview,
            h.engine.config(),
        );
        let report = did_02_chain_sync::SyncApi::run_sync(
            &h.engine,
            &other,
            request,
            watch::channel(false).1,
        )
        .await
        .unwrap();

        assert_eq!(report.blocks_added, 5);
        assert_eq!(h.stored().len(), 3);
    }
}
