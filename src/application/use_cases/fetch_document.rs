use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{debug, info};
use uuid::Uuid;

use super::now_ms;
use crate::application::dto::{CacheValidator, ConfigRequest, DeliveredDocument, FetchOutcome};
use crate::application::errors::FetchError;
use crate::application::policy::{DefaultForwardingPolicy, ForwardDecision, ForwardingPolicy};
use crate::application::ports::{DatabaseClient, DatabaseError, UpstreamMutator, UpstreamRequest};
use crate::domain::capability::CapabilityTable;
use crate::domain::codec;
use crate::domain::entities::{
    Document, RootChange, RootDocument, SubDocument, VersionMap, ROOT_VERSION_KEY,
};
use crate::domain::value_objects::{DeploymentState, DeviceId};

/// Use case: decide what a device receives on a config fetch.
///
/// Handles the root-version fast path, differential delivery, optional
/// upstream reconciliation and the factory-reset flow.
pub struct FetchDocumentUseCase {
    db: Arc<dyn DatabaseClient>,
    upstream: Option<Arc<dyn UpstreamMutator>>,
    policy: Arc<dyn ForwardingPolicy>,
    capabilities: Arc<CapabilityTable>,
    blocked: Arc<HashSet<String>>,
}

impl FetchDocumentUseCase {
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        capabilities: Arc<CapabilityTable>,
        blocked: Arc<HashSet<String>>,
    ) -> Self {
        Self {
            db,
            upstream: None,
            policy: Arc::new(DefaultForwardingPolicy),
            capabilities,
            blocked,
        }
    }

    pub fn with_upstream(mut self, upstream: Arc<dyn UpstreamMutator>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn ForwardingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn has_upstream(&self) -> bool {
        self.upstream.is_some()
    }

    pub async fn execute(&self, request: &ConfigRequest) -> Result<FetchOutcome, FetchError> {
        let bitmap = self
            .capabilities
            .aggregate_bitmap(request.supported_docs.as_deref().unwrap_or_default())?;
        let device_id = &request.device_id;

        if request.is_diagnostic() {
            return self.diagnostic(device_id).await;
        }

        match request.cache_validator() {
            CacheValidator::FactoryReset { reboot } => {
                self.factory_reset(request, bitmap, reboot).await
            }
            CacheValidator::Versions(device_versions) => {
                self.reconcile(request, bitmap, device_versions).await
            }
        }
    }

    /// Read-only view for the diagnostic agent: no state changes, no upstream.
    async fn diagnostic(&self, device_id: &DeviceId) -> Result<FetchOutcome, FetchError> {
        let stored = match self.db.get_document(device_id).await {
            Ok(document) => document,
            Err(e) if e.is_not_found() => return Ok(FetchOutcome::NotFound),
            Err(e) => return Err(e.into()),
        };

        let etag = stored_or_computed_etag(&stored);
        let visible = stored.without_blocked(&self.blocked);
        if visible.is_empty() {
            return Ok(FetchOutcome::NotFound);
        }

        debug!(device_id = %device_id, count = visible.len(), "Diagnostic fetch");
        Ok(FetchOutcome::Content(delivered(etag, &visible)))
    }

    async fn factory_reset(
        &self,
        request: &ConfigRequest,
        bitmap: i64,
        reboot: bool,
    ) -> Result<FetchOutcome, FetchError> {
        let device_id = &request.device_id;
        let new_root = request.root_document(bitmap, None);
        info!(device_id = %device_id, reboot, "Factory reset requested");

        let Some(upstream) = &self.upstream else {
            self.delete_document(device_id).await?;
            self.db.set_root_document(device_id, &new_root).await?;
            return Ok(FetchOutcome::NotFound);
        };

        let stored = self.load(device_id).await?;
        let upstream_request = UpstreamRequest {
            device_id: device_id.clone(),
            transaction_id: transaction_id(request),
            old_root: stored.root().cloned(),
            new_root: new_root.clone(),
            document: stored,
            factory_reset: true,
        };

        let response = upstream.mutate(&upstream_request).await?;
        self.delete_document(device_id).await?;

        let Some(content) = response.filter(|doc| !doc.is_empty()) else {
            self.db.set_root_document(device_id, &new_root).await?;
            info!(device_id = %device_id, "Upstream returned no content after factory reset");
            return Ok(FetchOutcome::NotFound);
        };

        let now = now_ms();
        let root_version = content.compute_root_version();
        self.db
            .set_root_document(device_id, &new_root.with_version(root_version.as_str()))
            .await?;

        let deliverable = content
            .clone()
            .without_blocked(&self.blocked)
            .supported_by(bitmap, &self.capabilities);

        let writes = content.iter().map(|(name, sub)| {
            let state = if deliverable.contains(name) {
                DeploymentState::InDeployment
            } else {
                DeploymentState::PendingDownload
            };
            let update = posted_from(sub, state, now);
            async move {
                self.db
                    .set_sub_document(device_id, name, &update, None)
                    .await
            }
        });
        try_join_all(writes).await?;

        info!(
            device_id = %device_id,
            root_version = %root_version,
            count = content.len(),
            "Replaced document from upstream after factory reset"
        );

        if deliverable.is_empty() {
            return Ok(FetchOutcome::NotFound);
        }
        Ok(FetchOutcome::Content(delivered(root_version, &deliverable)))
    }

    async fn reconcile(
        &self,
        request: &ConfigRequest,
        bitmap: i64,
        device_versions: VersionMap,
    ) -> Result<FetchOutcome, FetchError> {
        let device_id = &request.device_id;
        let root_token = device_versions.get(ROOT_VERSION_KEY).cloned();

        let mut stored = self.load(device_id).await?;

        // Fast path: must run before any write or upstream call.
        if let Some(token) = root_token.as_deref() {
            if !stored.root_version().is_empty() && token == stored.root_version() {
                debug!(device_id = %device_id, root_version = token, "Root version matches");
                return Ok(FetchOutcome::NotModified);
            }
        }

        let incoming_root = request.root_document(bitmap, root_token.as_deref());
        let old_root = stored.root().cloned();
        let change = old_root
            .as_ref()
            .map(|root| root.compare(&incoming_root))
            .unwrap_or(RootChange::Missing);

        // The device's token never overwrites the stored root version.
        let mut merged_root = old_root.clone().unwrap_or_default();
        merged_root.merge(&incoming_root.clone().with_version(""));
        if old_root.as_ref() != Some(&merged_root) {
            self.db.set_root_document(device_id, &merged_root).await?;
        }
        stored.set_root(Some(merged_root.clone()));

        let now = now_ms();
        let differences = self.deliverable(&stored, &device_versions, merged_root.bitmap, now);

        let decision = match self.upstream {
            Some(_) => self.policy.decide(change, !differences.is_empty()),
            None => ForwardDecision::Skip,
        };

        info!(
            device_id = %device_id,
            change = %change,
            decision = ?decision,
            differences = differences.len(),
            "Reconciling device document"
        );

        let upstream = match (&self.upstream, decision) {
            (Some(upstream), ForwardDecision::Differential | ForwardDecision::Full) => upstream,
            _ => return self.deliver_stored(device_id, &stored, differences, now).await,
        };

        let document = match decision {
            ForwardDecision::Full => stored.clone().without_blocked(&self.blocked),
            _ => differences.clone(),
        };
        let upstream_request = UpstreamRequest {
            device_id: device_id.clone(),
            transaction_id: transaction_id(request),
            old_root,
            new_root: merged_root.clone(),
            document,
            factory_reset: false,
        };

        let Some(incoming) = upstream.mutate(&upstream_request).await? else {
            debug!(device_id = %device_id, "Upstream returned no replacement");
            return self.deliver_stored(device_id, &stored, differences, now).await;
        };

        self.apply_upstream(device_id, stored, incoming, &device_versions, &merged_root, now)
            .await
    }

    /// Persist the upstream response, then deliver only what the device lacks.
    async fn apply_upstream(
        &self,
        device_id: &DeviceId,
        mut stored: Document,
        incoming: Document,
        device_versions: &VersionMap,
        root: &RootDocument,
        now: i64,
    ) -> Result<FetchOutcome, FetchError> {
        let changed = stored.replace_sub_documents(&incoming);
        let root_version = stored.compute_root_version();
        let deliverable = self.deliverable(&stored, device_versions, root.bitmap, now);

        // Every name upstream returned is persisted; unchanged content keeps its state.
        let writes = incoming.names().into_iter().filter_map(|name| {
            let sub = stored.get(&name)?;
            let update = if deliverable.contains(&name) {
                posted_from(sub, DeploymentState::InDeployment, now)
            } else if changed.contains(&name) {
                posted_from(sub, DeploymentState::PendingDownload, now)
            } else {
                SubDocument {
                    payload: sub.payload.clone(),
                    version: sub.version.clone(),
                    ..Default::default()
                }
            };
            let prev_state = sub.state;
            Some(async move {
                self.db
                    .set_sub_document(device_id, &name, &update, prev_state)
                    .await
            })
        });
        try_join_all(writes).await?;

        if root_version != root.version {
            self.db
                .set_root_document_version(device_id, &root_version)
                .await?;
        }

        info!(
            device_id = %device_id,
            replaced = changed.len(),
            root_version = %root_version,
            "Merged upstream response"
        );

        let untouched: Document = deliverable
            .iter()
            .filter(|(name, _)| !incoming.contains(name))
            .map(|(name, sub)| (name.clone(), sub.clone()))
            .collect();
        self.mark_in_deployment(device_id, &untouched, now).await?;

        if deliverable.is_empty() {
            return Ok(empty_outcome(&stored));
        }
        Ok(FetchOutcome::Content(delivered(root_version, &deliverable)))
    }

    async fn deliver_stored(
        &self,
        device_id: &DeviceId,
        stored: &Document,
        differences: Document,
        now: i64,
    ) -> Result<FetchOutcome, FetchError> {
        if differences.is_empty() {
            return Ok(empty_outcome(stored));
        }

        self.mark_in_deployment(device_id, &differences, now).await?;
        Ok(FetchOutcome::Content(delivered(
            stored_or_computed_etag(stored),
            &differences,
        )))
    }

    async fn mark_in_deployment(
        &self,
        device_id: &DeviceId,
        delivered: &Document,
        now: i64,
    ) -> Result<(), DatabaseError> {
        let update = SubDocument::state_update(DeploymentState::InDeployment, now);
        let writes = delivered
            .iter()
            .filter(|(_, sub)| sub.state != Some(DeploymentState::InDeployment))
            .map(|(name, sub)| {
                let update = &update;
                async move {
                    self.db
                        .set_sub_document(device_id, name, update, sub.state)
                        .await
                }
            });
        try_join_all(writes).await?;
        Ok(())
    }

    fn deliverable(
        &self,
        document: &Document,
        device_versions: &VersionMap,
        bitmap: i64,
        now: i64,
    ) -> Document {
        document
            .filter_for_get(device_versions)
            .without_blocked(&self.blocked)
            .without_expired(now)
            .supported_by(bitmap, &self.capabilities)
    }

    async fn load(&self, device_id: &DeviceId) -> Result<Document, DatabaseError> {
        match self.db.get_document(device_id).await {
            Ok(document) => Ok(document),
            Err(e) if e.is_not_found() => Ok(Document::new()),
            Err(e) => Err(e),
        }
    }

    async fn delete_document(&self, device_id: &DeviceId) -> Result<(), DatabaseError> {
        match self.db.delete_document(device_id).await {
            Err(e) if !e.is_not_found() => Err(e),
            _ => Ok(()),
        }
    }
}

fn empty_outcome(stored: &Document) -> FetchOutcome {
    if stored.is_empty() {
        FetchOutcome::NotFound
    } else {
        FetchOutcome::NotModified
    }
}

fn stored_or_computed_etag(document: &Document) -> String {
    match document.root_version() {
        "" => document.compute_root_version(),
        version => version.to_string(),
    }
}

fn delivered(etag: String, document: &Document) -> DeliveredDocument {
    DeliveredDocument {
        etag,
        body: codec::encode(&document.to_parts()),
        names: document.names(),
    }
}

fn posted_from(sub: &SubDocument, state: DeploymentState, now: i64) -> SubDocument {
    SubDocument::posted(
        sub.payload.clone().unwrap_or_default(),
        sub.version().unwrap_or_default(),
        now,
    )
    .with_state(state)
    .with_expiry(sub.expiry())
}

fn transaction_id(request: &ConfigRequest) -> String {
    request
        .transaction_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockDatabaseClient, MockUpstreamMutator, UpstreamError};
    use crate::domain::root_version::compute_root_version;

    fn device() -> DeviceId {
        DeviceId::parse("5c7d7d76cd04").unwrap()
    }

    fn stored_document() -> Document {
        let mut doc = Document::new();
        doc.insert(
            "lan",
            SubDocument::posted(&b"lan-v1"[..], "1", 10),
        );
        doc.insert(
            "wan",
            SubDocument::posted(&b"wan-v2"[..], "2", 10).with_state(DeploymentState::Deployed),
        );
        let version = doc.compute_root_version();
        doc.with_root(RootDocument::new(0, "fw-1", "TG4482", "", "").with_version(version))
    }

    fn use_case(db: MockDatabaseClient) -> FetchDocumentUseCase {
        FetchDocumentUseCase::new(
            Arc::new(db),
            Arc::new(CapabilityTable::default()),
            Arc::new(HashSet::new()),
        )
    }

    fn request(if_none_match: &str) -> ConfigRequest {
        ConfigRequest {
            if_none_match: Some(if_none_match.to_string()),
            firmware_version: "fw-1".to_string(),
            model_name: "TG4482".to_string(),
            ..ConfigRequest::new(device())
        }
    }

    fn expect_document(db: &mut MockDatabaseClient, doc: Document) {
        db.expect_get_document()
            .times(1)
            .returning(move |_| Ok(doc.clone()));
    }

    #[tokio::test]
    async fn test_root_short_circuit_performs_no_writes() {
        let doc = stored_document();
        let root = doc.root_version().to_string();
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, doc);

        let mut req = request(&root);
        // metadata changes are ignored on the fast path
        req.firmware_version = "fw-9".to_string();

        let outcome = use_case(db).execute(&req).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotModified);
    }

    #[tokio::test]
    async fn test_differences_are_delivered_and_marked_in_deployment() {
        let doc = stored_document();
        let root = doc.root_version().to_string();
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, doc);
        db.expect_set_sub_document()
            .withf(|_, name, sub, prev| {
                name == "lan"
                    && sub.state == Some(DeploymentState::InDeployment)
                    && sub.payload.is_none()
                    && *prev == Some(DeploymentState::PendingDownload)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let outcome = use_case(db).execute(&request("lan=0,wan=2")).await.unwrap();

        let FetchOutcome::Content(delivered) = outcome else {
            panic!("expected content");
        };
        assert_eq!(delivered.etag, root);
        assert_eq!(delivered.names, vec!["lan"]);
        let parts = codec::decode(&delivered.body).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].version, "1");
        assert_eq!(parts[0].payload.as_ref(), b"lan-v1");
    }

    #[tokio::test]
    async fn test_device_up_to_date_gets_not_modified() {
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, stored_document());

        let outcome = use_case(db).execute(&request("lan=1,wan=2")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotModified);
    }

    #[tokio::test]
    async fn test_unknown_device_stores_metadata_and_returns_not_found() {
        let mut db = MockDatabaseClient::new();
        db.expect_get_document()
            .times(1)
            .returning(|_| Err(DatabaseError::NotFound("device".into())));
        db.expect_set_root_document()
            .withf(|_, root| root.firmware_version == "fw-1" && root.version.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = use_case(db).execute(&request("")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_changed_metadata_is_persisted_without_device_token() {
        let doc = stored_document();
        let stored_root = doc.root_version().to_string();
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, doc);
        db.expect_set_root_document()
            .withf(move |_, root| root.firmware_version == "fw-2" && root.version == stored_root)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut req = request("lan=1,wan=2,root=stale");
        req.firmware_version = "fw-2".to_string();

        let outcome = use_case(db).execute(&req).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotModified);
    }

    #[tokio::test]
    async fn test_blocked_and_expired_sub_documents_are_not_delivered() {
        let mut doc = stored_document();
        doc.insert(
            "mesh",
            SubDocument::posted(&b"mesh"[..], "7", 10).with_expiry(Some(1)),
        );
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, doc);

        let blocked: HashSet<String> = ["lan".to_string()].into_iter().collect();
        let use_case = FetchDocumentUseCase::new(
            Arc::new(db),
            Arc::new(CapabilityTable::default()),
            Arc::new(blocked),
        );

        let outcome = use_case.execute(&request("wan=2")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotModified);
    }

    #[tokio::test]
    async fn test_invalid_capability_token_is_rejected() {
        let db = MockDatabaseClient::new();
        let mut req = request("");
        req.supported_docs = Some("16777231,abc".to_string());

        let err = use_case(db).execute(&req).await.unwrap_err();
        assert!(matches!(err, FetchError::Domain(_)));
    }

    #[tokio::test]
    async fn test_storage_failure_is_surfaced() {
        let mut db = MockDatabaseClient::new();
        db.expect_get_document()
            .returning(|_| Err(DatabaseError::Internal("connection reset".into())));

        let err = use_case(db).execute(&request("")).await.unwrap_err();
        assert!(matches!(err, FetchError::Database(_)));
    }

    #[tokio::test]
    async fn test_factory_reset_without_upstream_deletes_document() {
        let mut db = MockDatabaseClient::new();
        db.expect_delete_document().times(1).returning(|_| Ok(()));
        db.expect_set_root_document()
            .withf(|_, root| {
                root.model_name == "TG4482" && root.firmware_version == "fw-1" && root.version.is_empty()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = use_case(db).execute(&request("NONE")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_factory_reset_tolerates_unknown_device() {
        let mut db = MockDatabaseClient::new();
        db.expect_delete_document()
            .times(1)
            .returning(|_| Err(DatabaseError::NotFound("device".into())));
        db.expect_set_root_document().times(1).returning(|_, _| Ok(()));

        let outcome = use_case(db).execute(&request("NONE-REBOOT")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_diagnostic_agent_reads_without_side_effects() {
        let doc = stored_document();
        let root = doc.root_version().to_string();
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, doc);

        let mut req = request("NONE");
        req.user_agent = Some("mget".to_string());

        let mut upstream = MockUpstreamMutator::new();
        upstream.expect_mutate().never();

        let outcome = use_case(db)
            .with_upstream(Arc::new(upstream))
            .execute(&req)
            .await
            .unwrap();

        let FetchOutcome::Content(delivered) = outcome else {
            panic!("expected content");
        };
        assert_eq!(delivered.etag, root);
        assert_eq!(delivered.names, vec!["lan", "wan"]);
    }

    #[tokio::test]
    async fn test_diagnostic_agent_unknown_device() {
        let mut db = MockDatabaseClient::new();
        db.expect_get_document()
            .returning(|_| Err(DatabaseError::NotFound("device".into())));

        let mut req = request("");
        req.user_agent = Some("mget".to_string());

        let outcome = use_case(db).execute(&req).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_meta_change_forwards_full_document_and_merges_response() {
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, stored_document());
        db.expect_set_root_document().times(1).returning(|_, _| Ok(()));

        let mut response = Document::new();
        response.insert("lan", SubDocument::new(&b"lan-v9"[..], "9"));
        let merged_versions: VersionMap = [("lan", "9"), ("wan", "2")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let expected_root = compute_root_version(&merged_versions);

        let mut upstream = MockUpstreamMutator::new();
        upstream
            .expect_mutate()
            .withf(|req| {
                !req.factory_reset
                    && req.document.names() == vec!["lan", "wan"]
                    && req.new_root.firmware_version == "fw-2"
                    && req.old_root.as_ref().map(|r| r.firmware_version.as_str()) == Some("fw-1")
            })
            .times(1)
            .returning(move |_| Ok(Some(response.clone())));

        db.expect_set_sub_document()
            .withf(|_, name, sub, prev| {
                name == "lan"
                    && sub.version() == Some("9")
                    && sub.state == Some(DeploymentState::InDeployment)
                    && *prev == Some(DeploymentState::PendingDownload)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let root_for_check = expected_root.clone();
        db.expect_set_root_document_version()
            .withf(move |_, version| version == root_for_check)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut req = request("lan=1,wan=2");
        req.firmware_version = "fw-2".to_string();

        let outcome = use_case(db)
            .with_upstream(Arc::new(upstream))
            .execute(&req)
            .await
            .unwrap();

        let FetchOutcome::Content(delivered) = outcome else {
            panic!("expected content");
        };
        assert_eq!(delivered.etag, expected_root);
        assert_eq!(delivered.names, vec!["lan"]);
    }

    #[tokio::test]
    async fn test_upstream_payload_under_same_version_is_persisted() {
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, stored_document());

        let mut response = Document::new();
        response.insert("lan", SubDocument::new(&b"lan-rewritten"[..], "1"));
        response.insert("wan", SubDocument::new(&b"wan-v2"[..], "2"));

        let mut upstream = MockUpstreamMutator::new();
        upstream
            .expect_mutate()
            .times(1)
            .returning(move |_| Ok(Some(response.clone())));

        db.expect_set_sub_document()
            .withf(|_, name, sub, _| {
                name == "lan"
                    && sub.payload().map(|p| p.as_ref()) == Some(&b"lan-rewritten"[..])
                    && sub.state == Some(DeploymentState::InDeployment)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        // Echoed unchanged content is written without touching its state
        db.expect_set_sub_document()
            .withf(|_, name, sub, _| name == "wan" && sub.state.is_none())
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let outcome = use_case(db)
            .with_upstream(Arc::new(upstream))
            .execute(&request("lan=0,wan=2"))
            .await
            .unwrap();

        let FetchOutcome::Content(delivered) = outcome else {
            panic!("expected content");
        };
        assert_eq!(delivered.names, vec!["lan"]);
        let parts = codec::decode(&delivered.body).unwrap();
        assert_eq!(parts[0].payload.as_ref(), b"lan-rewritten");
    }

    #[tokio::test]
    async fn test_upstream_without_replacement_falls_back_to_stored() {
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, stored_document());
        db.expect_set_sub_document()
            .withf(|_, name, _, _| name == "lan")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut upstream = MockUpstreamMutator::new();
        upstream
            .expect_mutate()
            .withf(|req| req.document.names() == vec!["lan"])
            .times(1)
            .returning(|_| Ok(None));

        let outcome = use_case(db)
            .with_upstream(Arc::new(upstream))
            .execute(&request("lan=0,wan=2"))
            .await
            .unwrap();

        assert!(matches!(outcome, FetchOutcome::Content(ref d) if d.names == vec!["lan"]));
    }

    #[tokio::test]
    async fn test_upstream_failure_aborts_before_writes() {
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, stored_document());
        db.expect_set_sub_document().never();

        let mut upstream = MockUpstreamMutator::new();
        upstream
            .expect_mutate()
            .returning(|_| Err(UpstreamError::status(503, "unavailable")));

        let err = use_case(db)
            .with_upstream(Arc::new(upstream))
            .execute(&request("lan=0,wan=2"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_equal_root_without_differences_skips_upstream() {
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, stored_document());

        let mut upstream = MockUpstreamMutator::new();
        upstream.expect_mutate().never();

        let outcome = use_case(db)
            .with_upstream(Arc::new(upstream))
            .execute(&request("lan=1,wan=2"))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::NotModified);
    }

    #[tokio::test]
    async fn test_factory_reset_with_upstream_replaces_document() {
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, stored_document());
        db.expect_delete_document().times(1).returning(|_| Ok(()));

        let mut response = Document::new();
        response.insert("wan", SubDocument::new(&b"wan-v5"[..], "5"));
        let expected_root = response.compute_root_version();

        let mut upstream = MockUpstreamMutator::new();
        upstream
            .expect_mutate()
            .withf(|req| req.factory_reset && req.document.len() == 2)
            .times(1)
            .returning(move |_| Ok(Some(response.clone())));

        let root_for_check = expected_root.clone();
        db.expect_set_root_document()
            .withf(move |_, root| root.version == root_for_check)
            .times(1)
            .returning(|_, _| Ok(()));
        db.expect_set_sub_document()
            .withf(|_, name, sub, _| {
                name == "wan" && sub.state == Some(DeploymentState::InDeployment)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let outcome = use_case(db)
            .with_upstream(Arc::new(upstream))
            .execute(&request("NONE"))
            .await
            .unwrap();

        let FetchOutcome::Content(delivered) = outcome else {
            panic!("expected content");
        };
        assert_eq!(delivered.etag, expected_root);
        assert_eq!(delivered.names, vec!["wan"]);
    }

    #[tokio::test]
    async fn test_factory_reset_with_empty_upstream_response() {
        let mut db = MockDatabaseClient::new();
        expect_document(&mut db, stored_document());
        db.expect_delete_document().times(1).returning(|_| Ok(()));
        db.expect_set_root_document()
            .withf(|_, root| root.version.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut upstream = MockUpstreamMutator::new();
        upstream.expect_mutate().returning(|_| Ok(None));

        let outcome = use_case(db)
            .with_upstream(Arc::new(upstream))
            .execute(&request("NONE"))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }
}
