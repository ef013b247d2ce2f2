//! Unit tests for full reconcile passes against the in-memory store

#[cfg(test)]
mod tests {
    use crate::builders::configmap::PIPELINE_KEY;
    use crate::builders::deployment::ENV_CONFIG_HASH;
    use crate::error::ControllerError;
    use crate::lifecycle::{CleanupHook, FINALIZER};
    use crate::reconciler::Reconciler;
    use crate::retry::RetryPolicy;
    use crate::test_utils::*;
    use cluster_store::mock::AppliedRecord;
    use cluster_store::{ApplyOutcome, ChildResource, ClusterStore, MockClusterStore, StoreError};
    use crds::{Logstash, LogstashPhase};
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::Secret;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    const NS: &str = "default";

    fn setup(logstash: Logstash) -> MockClusterStore {
        let store = MockClusterStore::new();
        store.insert_logstash(logstash);
        store
    }

    fn outcomes(store: &MockClusterStore) -> Vec<(&'static str, ApplyOutcome)> {
        store
            .applied()
            .into_iter()
            .map(|AppliedRecord { kind, outcome, .. }| (kind, outcome))
            .collect()
    }

    fn phase(store: &MockClusterStore, name: &str) -> Option<LogstashPhase> {
        store.logstash(NS, name).and_then(|ls| ls.status).and_then(|s| s.phase)
    }

    fn config_hash_env(deploy: &Deployment) -> Option<String> {
        deploy.spec.as_ref()?.template.spec.as_ref()?.containers[0]
            .env
            .as_ref()?
            .iter()
            .find(|e| e.name == ENV_CONFIG_HASH)
            .and_then(|e| e.value.clone())
    }

    struct CountingCleanup(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl CleanupHook for CountingCleanup {
        async fn cleanup(&self, _instance: &Logstash) -> Result<(), ControllerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn reconciler_over(store: impl ClusterStore + 'static) -> Reconciler {
        Reconciler::new(store)
            .with_credentials(FixedCredentials)
            .with_retry_policy(RetryPolicy {
                attempts: 5,
                delay: Duration::ZERO,
            })
    }

    /// Parent reads succeed `reads` times, then the parent is gone
    struct VanishingParent {
        inner: MockClusterStore,
        reads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ClusterStore for VanishingParent {
        async fn get_logstash(&self, namespace: &str, name: &str) -> Result<Logstash, StoreError> {
            let left = self.reads.load(Ordering::SeqCst);
            if left == 0 {
                return Err(StoreError::NotFound(format!("Logstash {namespace}/{name}")));
            }
            self.reads.store(left - 1, Ordering::SeqCst);
            self.inner.get_logstash(namespace, name).await
        }

        async fn update_logstash(&self, logstash: &Logstash) -> Result<Logstash, StoreError> {
            self.inner.update_logstash(logstash).await
        }

        async fn update_logstash_status(&self, logstash: &Logstash) -> Result<Logstash, StoreError> {
            self.inner.update_logstash_status(logstash).await
        }

        async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
            self.inner.get_secret(namespace, name).await
        }

        async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, StoreError> {
            self.inner.get_deployment(namespace, name).await
        }

        async fn apply(&self, desired: ChildResource) -> Result<ApplyOutcome, StoreError> {
            self.inner.apply(desired).await
        }
    }

    /// First status write conflicts while readiness drops back to zero
    struct ReadinessRace {
        inner: MockClusterStore,
        raced: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ClusterStore for ReadinessRace {
        async fn get_logstash(&self, namespace: &str, name: &str) -> Result<Logstash, StoreError> {
            self.inner.get_logstash(namespace, name).await
        }

        async fn update_logstash(&self, logstash: &Logstash) -> Result<Logstash, StoreError> {
            self.inner.update_logstash(logstash).await
        }

        async fn update_logstash_status(&self, logstash: &Logstash) -> Result<Logstash, StoreError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                self.inner.set_deployment_ready_replicas(NS, "logstash-ls-deployment", 0);
                return Err(StoreError::Conflict("Logstash default/ls status".to_string()));
            }
            self.inner.update_logstash_status(logstash).await
        }

        async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
            self.inner.get_secret(namespace, name).await
        }

        async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, StoreError> {
            self.inner.get_deployment(namespace, name).await
        }

        async fn apply(&self, desired: ChildResource) -> Result<ApplyOutcome, StoreError> {
            self.inner.apply(desired).await
        }
    }

    #[tokio::test]
    async fn test_first_pass_creates_children() {
        let store = setup(create_test_logstash("ls", NS));
        let reconciler = create_test_reconciler(store.clone());

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        assert_eq!(
            outcomes(&store),
            vec![
                ("ConfigMap", ApplyOutcome::Created),
                ("Service", ApplyOutcome::Created),
                ("Deployment", ApplyOutcome::Created),
            ]
        );
        assert!(store.secret(NS, "logstash-ls-user").is_none());
        let parent = store.logstash(NS, "ls").unwrap();
        assert_eq!(parent.metadata.finalizers, Some(vec![FINALIZER.to_string()]));
        assert_eq!(phase(&store, "ls"), Some(LogstashPhase::Pending));
        let status = parent.status.unwrap();
        assert!(status.last_transition_time.is_some());
    }

    #[tokio::test]
    async fn test_children_are_owned_by_parent() {
        let store = setup(create_test_logstash("ls", NS));
        let reconciler = create_test_reconciler(store.clone());

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        let uid = store.logstash(NS, "ls").unwrap().metadata.uid.unwrap();
        let owners = store
            .deployment(NS, "logstash-ls-deployment")
            .unwrap()
            .metadata
            .owner_references
            .unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, uid);
        assert_eq!(owners[0].kind, "Logstash");
        assert_eq!(owners[0].controller, Some(true));
        assert!(store.config_map(NS, "logstash-ls-pipelines").unwrap().metadata.owner_references.is_some());
        assert!(store.service(NS, "logstash-ls-network").unwrap().metadata.owner_references.is_some());
    }

    #[tokio::test]
    async fn test_second_pass_changes_nothing() {
        let store = setup(create_test_logstash("ls", NS));
        let reconciler = create_test_reconciler(store.clone());
        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        let version = store.logstash(NS, "ls").unwrap().metadata.resource_version;
        store.clear_applied();

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        assert!(outcomes(&store).iter().all(|(_, o)| *o == ApplyOutcome::Unchanged));
        assert_eq!(store.logstash(NS, "ls").unwrap().metadata.resource_version, version);
    }

    #[tokio::test]
    async fn test_filter_change_rolls_deployment() {
        let store = setup(create_test_logstash("ls", NS));
        let reconciler = create_test_reconciler(store.clone());
        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        let before = config_hash_env(&store.deployment(NS, "logstash-ls-deployment").unwrap());

        let mut parent = store.logstash(NS, "ls").unwrap();
        parent.spec.config.pipeline.filters = "mutate { add_field => { \"env\" => \"prod\" } }".to_string();
        store.insert_logstash(parent);
        store.clear_applied();

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        assert_eq!(
            outcomes(&store),
            vec![
                ("ConfigMap", ApplyOutcome::Patched),
                ("Service", ApplyOutcome::Unchanged),
                ("Deployment", ApplyOutcome::Patched),
            ]
        );
        let after = config_hash_env(&store.deployment(NS, "logstash-ls-deployment").unwrap());
        assert!(before.is_some());
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_phase_follows_readiness() {
        let mut logstash = create_test_logstash("ls", NS);
        logstash.spec.replicas = 3;
        let store = setup(logstash);
        let reconciler = create_test_reconciler(store.clone());
        let deployment = "logstash-ls-deployment";

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        assert_eq!(phase(&store, "ls"), Some(LogstashPhase::Pending));

        store.set_deployment_ready_replicas(NS, deployment, 3);
        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        assert_eq!(phase(&store, "ls"), Some(LogstashPhase::Running));
        let running_since = store.logstash(NS, "ls").unwrap().status.unwrap().last_transition_time;

        // unchanged phase keeps the transition time
        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        let still = store.logstash(NS, "ls").unwrap().status.unwrap().last_transition_time;
        assert_eq!(running_since, still);

        store.set_deployment_ready_replicas(NS, deployment, 2);
        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        assert_eq!(phase(&store, "ls"), Some(LogstashPhase::Pending));
    }

    #[tokio::test]
    async fn test_no_ports_fails_before_service() {
        let mut logstash = create_test_logstash("ls", NS);
        logstash.spec.config.ports.clear();
        let store = setup(logstash);
        let reconciler = create_test_reconciler(store.clone());

        let err = reconciler.reconcile_logstash(NS, "ls").await.unwrap_err();

        assert!(matches!(err, ControllerError::InvalidSpec(_)));
        assert!(outcomes(&store).iter().all(|(kind, _)| *kind != "Service"));
        assert!(store.service(NS, "logstash-ls-network").is_none());
    }

    #[tokio::test]
    async fn test_cluster_ref_wires_credentials() {
        let store = setup(with_cluster_ref(create_test_logstash("ls", NS)));
        store.insert_secret(create_test_credential_secret(TEST_CREDENTIAL_SECRET, NS, "admin", "admin"));
        let reconciler = create_test_reconciler(store.clone());

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        let own_secret = store.secret(NS, "logstash-ls-user").unwrap();
        let data = own_secret.data.unwrap();
        assert_eq!(data["username"].0, b"logstash");
        assert_eq!(data["password"].0, b"generated");

        let cm = store.config_map(NS, "logstash-ls-pipelines").unwrap();
        let pipeline = &cm.data.unwrap()[PIPELINE_KEY];
        assert!(pipeline.contains("hosts => [\"https://my-cluster.default.svc.cluster.local:9200\"]"));

        let deploy = store.deployment(NS, "logstash-ls-deployment").unwrap();
        let env = deploy.spec.unwrap().template.spec.unwrap().containers[0].env.clone().unwrap();
        let user = env.iter().find(|e| e.name == "LOGSTASHUSER").unwrap();
        let selector = user.value_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap();
        assert_eq!(selector.name, TEST_CREDENTIAL_SECRET);
    }

    #[tokio::test]
    async fn test_rotated_credentials_survive() {
        let store = setup(with_cluster_ref(create_test_logstash("ls", NS)));
        store.insert_secret(create_test_credential_secret(TEST_CREDENTIAL_SECRET, NS, "admin", "admin"));
        store.insert_secret(create_test_credential_secret("logstash-ls-user", NS, "logstash", "rotated"));
        let reconciler = create_test_reconciler(store.clone());

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        let data = store.secret(NS, "logstash-ls-user").unwrap().data.unwrap();
        assert_eq!(data["password"].0, b"rotated");
    }

    #[tokio::test]
    async fn test_cluster_ref_without_credential_secret_is_invalid() {
        let mut logstash = with_cluster_ref(create_test_logstash("ls", NS));
        if let Some(cluster) = logstash.spec.config.opensearch_cluster_ref.as_mut() {
            cluster.credential_secret_name = None;
        }
        let store = setup(logstash);
        let reconciler = create_test_reconciler(store.clone());

        let err = reconciler.reconcile_logstash(NS, "ls").await.unwrap_err();

        assert!(matches!(err, ControllerError::InvalidSpec(_)));
        assert!(store.config_map(NS, "logstash-ls-pipelines").is_none());
    }

    #[tokio::test]
    async fn test_missing_credential_secret_is_reported() {
        let store = setup(with_cluster_ref(create_test_logstash("ls", NS)));
        let reconciler = create_test_reconciler(store.clone());

        let err = reconciler.reconcile_logstash(NS, "ls").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(matches!(err, ControllerError::Store(_)));
    }

    #[tokio::test]
    async fn test_cluster_in_other_namespace() {
        let mut logstash = with_cluster_ref(create_test_logstash("ls", NS));
        if let Some(cluster) = logstash.spec.config.opensearch_cluster_ref.as_mut() {
            cluster.namespace = Some("search".to_string());
        }
        let store = setup(logstash);
        store.insert_secret(create_test_credential_secret(TEST_CREDENTIAL_SECRET, NS, "admin", "admin"));
        let reconciler = create_test_reconciler(store.clone());

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        let cm = store.config_map(NS, "logstash-ls-pipelines").unwrap();
        let pipeline = &cm.data.unwrap()[PIPELINE_KEY];
        assert!(pipeline.contains("hosts => [\"https://my-cluster.search.svc.cluster.local:9200\"]"));
    }

    #[tokio::test]
    async fn test_cluster_ref_without_service_name_is_invalid() {
        for service_name in [None, Some(String::new())] {
            let mut logstash = with_cluster_ref(create_test_logstash("ls", NS));
            if let Some(cluster) = logstash.spec.config.opensearch_cluster_ref.as_mut() {
                cluster.service_name = service_name;
            }
            let store = setup(logstash);
            store.insert_secret(create_test_credential_secret(TEST_CREDENTIAL_SECRET, NS, "admin", "admin"));
            let reconciler = create_test_reconciler(store.clone());

            let err = reconciler.reconcile_logstash(NS, "ls").await.unwrap_err();

            assert!(matches!(err, ControllerError::InvalidSpec(_)));
            assert!(outcomes(&store).iter().all(|(kind, _)| *kind != "ConfigMap"));
            assert!(store.config_map(NS, "logstash-ls-pipelines").is_none());
        }
    }

    #[tokio::test]
    async fn test_user_outputs_kept_beside_cluster_output() {
        let mut logstash = with_cluster_ref(create_test_logstash("ls", NS));
        logstash.spec.config.pipeline.outputs = "file { path => \"/tmp/events\" }".to_string();
        let store = setup(logstash);
        store.insert_secret(create_test_credential_secret(TEST_CREDENTIAL_SECRET, NS, "admin", "admin"));
        let reconciler = create_test_reconciler(store.clone());

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        let cm = store.config_map(NS, "logstash-ls-pipelines").unwrap();
        let pipeline = &cm.data.unwrap()[PIPELINE_KEY];
        let user = pipeline.find("file { path => \"/tmp/events\" }").unwrap();
        let generated = pipeline.find("opensearch {").unwrap();
        assert!(user < generated);
        assert!(!pipeline.contains("stdout"));
    }

    #[tokio::test]
    async fn test_parent_deleted_mid_pass_is_noop() {
        // 1: initial read, 2: finalizer, 3: initial status, then the status step
        for reads in 1..=3 {
            let store = setup(create_test_logstash("ls", NS));
            let reconciler = reconciler_over(VanishingParent {
                inner: store.clone(),
                reads: AtomicUsize::new(reads),
            });

            let action = reconciler.reconcile_logstash(NS, "ls").await;

            assert!(action.is_ok(), "read budget {reads}: {action:?}");
        }
    }

    #[tokio::test]
    async fn test_status_retry_rereads_deployment() {
        let store = setup(create_test_logstash("ls", NS));
        create_test_reconciler(store.clone())
            .reconcile_logstash(NS, "ls")
            .await
            .unwrap();
        store.set_deployment_ready_replicas(NS, "logstash-ls-deployment", 1);
        let reconciler = reconciler_over(ReadinessRace {
            inner: store.clone(),
            raced: AtomicBool::new(false),
        });

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        // readiness regressed before the retry, so RUNNING is never written
        assert_eq!(phase(&store, "ls"), Some(LogstashPhase::Pending));
    }

    #[tokio::test]
    async fn test_missing_parent_is_noop() {
        let store = MockClusterStore::new();
        let reconciler = create_test_reconciler(store.clone());

        reconciler.reconcile_logstash(NS, "gone").await.unwrap();

        assert!(store.applied().is_empty());
    }

    #[tokio::test]
    async fn test_conflicts_are_retried() {
        let store = setup(create_test_logstash("ls", NS));
        let reconciler = create_test_reconciler(store.clone());
        store.inject_conflicts(2);

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        assert!(crate::lifecycle::has_finalizer(&store.logstash(NS, "ls").unwrap().metadata));
    }

    #[tokio::test]
    async fn test_conflict_budget_exhausted() {
        let store = setup(create_test_logstash("ls", NS));
        let reconciler = create_test_reconciler(store.clone());
        store.inject_conflicts(10);

        let err = reconciler.reconcile_logstash(NS, "ls").await.unwrap_err();

        assert!(matches!(
            err,
            ControllerError::ConflictRetriesExhausted { attempts: 5, .. }
        ));
        assert!(store.applied().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_runs_cleanup_once() {
        let store = setup(create_test_logstash("ls", NS));
        let calls = Arc::new(AtomicUsize::new(0));
        let reconciler =
            create_test_reconciler(store.clone()).with_cleanup(CountingCleanup(Arc::clone(&calls)));
        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        store.mark_logstash_deleted(NS, "ls");
        store.clear_applied();
        reconciler.reconcile_logstash(NS, "ls").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.logstash(NS, "ls").is_none());
        assert!(store.applied().is_empty());

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deletion_after_finalizer_removed_is_noop() {
        let mut logstash = create_test_logstash("ls", NS);
        logstash.metadata.finalizers = Some(vec!["other.io/hold".to_string()]);
        let store = setup(logstash);
        let calls = Arc::new(AtomicUsize::new(0));
        let reconciler =
            create_test_reconciler(store.clone()).with_cleanup(CountingCleanup(Arc::clone(&calls)));
        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        store.mark_logstash_deleted(NS, "ls");

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        // another controller's finalizer still holds the object
        let held = store.logstash(NS, "ls").unwrap();
        assert_eq!(held.metadata.finalizers, Some(vec!["other.io/hold".to_string()]));

        reconciler.reconcile_logstash(NS, "ls").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
