//! # DID Lifecycle Scenarios
//!
//! Operation rules observed through the whole stack: operations ride in
//! upstream blocks, the sync engine validates them through the parser, and
//! the resolver reads the committed result.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use did_01_operation_parser::{
        DidResolution, KeyUsage, Operation, OperationError, OperationHandler, ProtocolVersion,
        ProtocolVersionInfo, ProtocolVersionUpdate, PublicKey, ResolveContext, Service,
        UpdateAction, UpdateStackError,
    };
    use shared_types::ChainPosition;

    /// Create `controller`'s DID in block 1 and sync it.
    async fn with_created_did(h: &Harness, controller: &Controller) -> Operation {
        let create = create_op(controller, vec![]);
        h.source.extend("main");
        h.extend_with("main", vec![controller.payload(create.clone())]);
        h.sync().await.unwrap();
        create
    }

    // =============================================================================
    // IDENTIFIERS
    // =============================================================================

    #[tokio::test]
    async fn test_did_is_hash_of_create_operation() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        let create = with_created_did(&h, &alice).await;

        // Hashing the same operation twice gives the same identifier.
        assert_eq!(create.hash().unwrap(), create.hash().unwrap());
        assert_eq!(did_of(&create), did_of(&create_op(&alice, vec![])));

        let stored = h.stored();
        let accepted = &stored[1].operations[0];
        assert_eq!(accepted.did, did_of(&create));
        assert_eq!(accepted.operation_hash, create.hash().unwrap());
        assert!(accepted.did.to_did_string("did:prism").starts_with("did:prism:"));

        let resolved = h.resolve(&accepted.did).await.unwrap();
        assert_eq!(resolved.last_operation_hash, create.hash().unwrap());
        assert_eq!(resolved.created_at, ChainPosition::new(1, 0, 0));
    }

    // =============================================================================
    // CREATE VALIDATION
    // =============================================================================

    async fn handle_create(h: &Harness, services: Vec<Service>) -> Result<(), OperationError> {
        let alice = Controller::new("master0", 1);
        let signed = alice.sign(create_op(&alice, services));
        h.parser
            .handle(
                &signed,
                LEDGER,
                ChainPosition::new(1, 0, 0),
                &ResolveContext::canonical(),
            )
            .await
            .map(|_| ())
    }

    #[tokio::test]
    async fn test_create_with_too_many_services() {
        let h = Harness::new();
        let services = (0..51).map(|i| service(&format!("svc-{}", i))).collect();
        assert!(matches!(
            handle_create(&h, services).await,
            Err(OperationError::TooManyServices { count: 51, max: 50 })
        ));

        let services = (0..50).map(|i| service(&format!("svc-{}", i))).collect();
        assert!(handle_create(&h, services).await.is_ok());
    }

    #[tokio::test]
    async fn test_service_type_with_surrounding_whitespace() {
        let h = Harness::new();
        let padded = Service::new("svc", " LinkedDomains", "https://example.com/");
        assert!(matches!(
            handle_create(&h, vec![padded]).await,
            Err(OperationError::ServiceTypeInvalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_service_endpoint_over_size_limit() {
        let h = Harness::new();
        let endpoint = format!("https://example.com/{}", "a".repeat(281));
        assert_eq!(endpoint.len(), 301);
        let oversized = Service::new("svc", "LinkedDomains", endpoint);
        assert!(matches!(
            handle_create(&h, vec![oversized]).await,
            Err(OperationError::ServiceEndpointTooLarge { size: 301, max: 300, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_service_type_is_accepted() {
        let h = Harness::new();
        let custom = Service::new("svc", "ExperimentalHub", "https://example.com/");
        assert!(handle_create(&h, vec![custom]).await.is_ok());
    }

    // =============================================================================
    // UPDATE ORDERING
    // =============================================================================

    #[tokio::test]
    async fn test_add_then_remove_master_rotates_key() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        let create = with_created_did(&h, &alice).await;
        let did = did_of(&create);

        let successor = Controller::new("master1", 2);
        let rotate = update_op(
            did,
            create.hash().unwrap(),
            vec![
                UpdateAction::AddKey(successor.master_key()),
                UpdateAction::RemoveKey {
                    key_id: "master0".to_string(),
                },
            ],
        );
        h.extend_with("main", vec![alice.payload(rotate)]);
        h.sync().await.unwrap();

        let resolved = h.resolve(&did).await.unwrap();
        assert!(resolved.document.has_key("master1"));
        assert!(!resolved.document.has_key("master0"));
        assert_eq!(resolved.document.master_key_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_then_add_master_rejected() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        let create = with_created_did(&h, &alice).await;
        let did = did_of(&create);

        let successor = Controller::new("master1", 2);
        let reversed = alice.sign(update_op(
            did,
            create.hash().unwrap(),
            vec![
                UpdateAction::RemoveKey {
                    key_id: "master0".to_string(),
                },
                UpdateAction::AddKey(successor.master_key()),
            ],
        ));
        let result = h
            .parser
            .handle(
                &reversed,
                LEDGER,
                ChainPosition::new(2, 0, 0),
                &ResolveContext::canonical(),
            )
            .await;

        assert!(matches!(
            result,
            Err(OperationError::UpdateStack(UpdateStackError::LastMasterKey { index: 0, .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_and_update_in_same_block() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        let create = create_op(&alice, vec![]);
        let did = did_of(&create);
        let update = update_op(
            did,
            create.hash().unwrap(),
            vec![
                UpdateAction::AddKey(PublicKey::from_key_pair(
                    "auth0",
                    KeyUsage::Authentication,
                    &key_pair(9),
                )),
                UpdateAction::AddService(service("svc")),
            ],
        );

        h.source.extend("main");
        h.extend_with("main", vec![alice.payload(create), alice.payload(update.clone())]);
        let report = h.sync().await.unwrap();
        assert_eq!(report.operations_accepted, 2);

        let resolved = h.resolve(&did).await.unwrap();
        assert!(resolved.document.has_key("auth0"));
        assert!(resolved.document.has_service("svc"));
        assert_eq!(resolved.last_operation_hash, update.hash().unwrap());
        assert_eq!(resolved.updated_at, ChainPosition::new(1, 1, 0));
    }

    #[tokio::test]
    async fn test_resolution_as_of_position() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        let create = with_created_did(&h, &alice).await;
        let did = did_of(&create);

        let first = update_op(
            did,
            create.hash().unwrap(),
            vec![UpdateAction::AddService(service("first"))],
        );
        let second = update_op(
            did,
            first.hash().unwrap(),
            vec![UpdateAction::AddService(service("second"))],
        );
        h.extend_with("main", vec![alice.payload(first)]);
        h.extend_with("main", vec![alice.payload(second)]);
        h.sync().await.unwrap();

        let at_two = h
            .resolver
            .resolve(
                LEDGER,
                &did,
                &ResolveContext::canonical().with_as_of(ChainPosition::end_of_block(2)),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(at_two.document.has_service("first"));
        assert!(!at_two.document.has_service("second"));

        let latest = h.resolve(&did).await.unwrap();
        assert!(latest.document.has_service("second"));

        let before_create = h
            .resolver
            .resolve(
                LEDGER,
                &did,
                &ResolveContext::canonical().with_as_of(ChainPosition::end_of_block(0)),
            )
            .await
            .unwrap();
        assert!(before_create.is_none());
    }

    // =============================================================================
    // DEACTIVATION
    // =============================================================================

    #[tokio::test]
    async fn test_deactivated_did_is_frozen() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        let create = with_created_did(&h, &alice).await;
        let did = did_of(&create);

        let deactivate = deactivate_op(did, create.hash().unwrap());
        h.extend_with("main", vec![alice.payload(deactivate.clone())]);
        h.sync().await.unwrap();

        let resolved = h.resolve(&did).await.unwrap();
        assert!(resolved.deactivated);
        assert!(resolved.document.keys.is_empty());
        assert!(resolved.document.services.is_empty());

        let late = alice.sign(update_op(
            did,
            deactivate.hash().unwrap(),
            vec![UpdateAction::AddService(service("svc"))],
        ));
        let result = h
            .parser
            .handle(
                &late,
                LEDGER,
                ChainPosition::new(3, 0, 0),
                &ResolveContext::canonical(),
            )
            .await;
        assert!(matches!(result, Err(OperationError::DidDeactivated(_))));
    }

    // =============================================================================
    // PROTOCOL VERSION
    // =============================================================================

    #[tokio::test]
    async fn test_protocol_version_update_through_sync() {
        let h = Harness::new();
        let alice = Controller::new("master0", 1);
        let create = with_created_did(&h, &alice).await;
        let did = did_of(&create);

        let initial = h
            .resolver
            .protocol_version(LEDGER, &ResolveContext::canonical())
            .await
            .unwrap();
        assert_eq!(initial, ProtocolVersion::new(1, 0));

        let upgrade = Operation::ProtocolVersionUpdate(ProtocolVersionUpdate {
            proposer: did,
            previous_operation_hash: create.hash().unwrap(),
            version: ProtocolVersionInfo {
                version_name: Some("second".to_string()),
                effective_since: 100,
                protocol_version: ProtocolVersion::new(2, 0),
            },
        });
        h.extend_with("main", vec![alice.payload(upgrade)]);
        h.sync().await.unwrap();

        let current = h
            .resolver
            .protocol_version(LEDGER, &ResolveContext::canonical())
            .await
            .unwrap();
        assert_eq!(current, ProtocolVersion::new(2, 0));

        // The proposer's hash chain does not advance.
        let resolved = h.resolve(&did).await.unwrap();
        assert_eq!(resolved.last_operation_hash, create.hash().unwrap());
    }
}
