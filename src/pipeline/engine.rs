//! The resource ingress pipeline.
//!
//! One implementation serves every resource; the `ResourceDefinition` decides
//! which topics are written and whether the backend is called.

use std::sync::Arc;
use std::time::Instant;

use axum::http::Method;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::audit::{AuditEnvelope, AuditRelay, EnvelopeBuilder, ProcessName};
use crate::backend::{BackendDispatcher, BackendError, BackendRequest, BackendResponse};
use crate::broker::TopicPublisher;
use crate::observability::metrics;
use crate::pipeline::error::{PipelineError, SerializationError};
use crate::pipeline::exchange::{InFlightExchange, Stage};
use crate::routing::ResourceDefinition;

/// An ingress call as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct Ingress {
    pub method: Method,
    pub query: Option<String>,
    pub body: Bytes,
    pub exchange_id: String,
}

/// How a successful exchange ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Published without a backend call.
    Published { exchange_id: String },
    /// Published and forwarded; carries the backend reply.
    Forwarded {
        exchange_id: String,
        response: BackendResponse,
    },
}

pub struct ResourcePipeline {
    publisher: Arc<dyn TopicPublisher>,
    dispatcher: Arc<dyn BackendDispatcher>,
    relay: AuditRelay,
    envelopes: EnvelopeBuilder,
}

impl ResourcePipeline {
    pub fn new(
        publisher: Arc<dyn TopicPublisher>,
        dispatcher: Arc<dyn BackendDispatcher>,
        relay: AuditRelay,
        envelopes: EnvelopeBuilder,
    ) -> Self {
        Self {
            publisher,
            dispatcher,
            relay,
            envelopes,
        }
    }

    pub fn pipeline_run_id(&self) -> &str {
        self.envelopes.pipeline_run_id()
    }

    /// Run one exchange to a terminal stage.
    pub async fn process(
        &self,
        resource: &Arc<ResourceDefinition>,
        ingress: Ingress,
    ) -> Result<PipelineOutcome, PipelineError> {
        metrics::record_ingress(&resource.name);

        let mut exchange = InFlightExchange::new(
            ingress.exchange_id.clone(),
            resource.clone(),
            ingress.body.clone(),
        );
        info!(
            exchange_id = %ingress.exchange_id,
            resource = %resource.name,
            method = %ingress.method,
            size_bytes = ingress.body.len(),
            "Exchange received"
        );

        let result = self.run(&mut exchange, ingress).await;

        match &result {
            Ok(PipelineOutcome::Published { .. }) => {
                metrics::record_exchange(&resource.name, "published")
            }
            Ok(PipelineOutcome::Forwarded { .. }) => {
                metrics::record_exchange(&resource.name, "forwarded")
            }
            Err(e) => {
                warn!(
                    exchange_id = %exchange.exchange_id(),
                    resource = %resource.name,
                    stage = %exchange.stage(),
                    error = %e,
                    "Exchange failed"
                );
                metrics::record_exchange(&resource.name, "failed");
            }
        }
        result
    }

    async fn run(
        &self,
        exchange: &mut InFlightExchange,
        ingress: Ingress,
    ) -> Result<PipelineOutcome, PipelineError> {
        let resource = exchange.resource().clone();

        let not_utf8 = std::str::from_utf8(exchange.body()).err();
        if let Some(source) = not_utf8 {
            exchange.advance(Stage::Failed)?;
            return Err(SerializationError::NotUtf8 {
                resource: resource.name.clone(),
                source,
            }
            .into());
        }

        let input = self.envelopes.build(
            &resource,
            exchange.exchange_id(),
            ProcessName::Input,
            exchange.body(),
        );
        self.audit(exchange, ProcessName::Input, &input)?;

        // Required publish of the raw ingress body.
        if let Err(e) = self
            .publish_required(&resource.resource_topic, exchange.body().clone())
            .await
        {
            exchange.advance(Stage::Failed)?;
            return Err(e);
        }
        exchange.advance(Stage::ResourcePublished)?;

        if !resource.forward_to_backend {
            exchange.advance(Stage::Complete)?;
            return Ok(PipelineOutcome::Published {
                exchange_id: ingress.exchange_id,
            });
        }

        exchange.advance(Stage::Forwarding)?;
        let response = match self.forward(&resource, ingress.clone()).await {
            Ok(response) => response,
            Err(e) => {
                exchange.advance(Stage::Failed)?;
                let body = e.body().cloned().unwrap_or_default();
                let failure = self.envelopes.build_failure(
                    &resource,
                    exchange.exchange_id(),
                    &body,
                    &e.to_string(),
                );
                self.relay_detached(&failure);
                return Err(e.into());
            }
        };
        exchange.advance(Stage::Forwarded)?;
        exchange.replace_body(response.body.clone());

        if resource.audit_response {
            let envelope = self.envelopes.build(
                &resource,
                exchange.exchange_id(),
                ProcessName::Response,
                exchange.body(),
            );
            self.audit(exchange, ProcessName::Response, &envelope)?;
        }

        if let Some(topic) = &resource.response_topic {
            if let Err(e) = self.publish_required(topic, exchange.body().clone()).await {
                exchange.advance(Stage::Failed)?;
                return Err(e);
            }
            exchange.advance(Stage::ResponsePublished)?;
        }

        exchange.advance(Stage::Complete)?;
        debug!(
            exchange_id = %exchange.exchange_id(),
            status = %response.status,
            "Exchange complete"
        );
        Ok(PipelineOutcome::Forwarded {
            exchange_id: ingress.exchange_id,
            response,
        })
    }

    /// ENVELOPED then AUDITED for `process`; the relay never blocks.
    fn audit(
        &self,
        exchange: &mut InFlightExchange,
        process: ProcessName,
        envelope: &AuditEnvelope,
    ) -> Result<(), PipelineError> {
        exchange.advance(Stage::Enveloped(process))?;
        if let Err(e) = self.relay.relay(envelope) {
            exchange.advance(Stage::Failed)?;
            return Err(SerializationError::from(e).into());
        }
        exchange.advance(Stage::Audited(process))
    }

    /// Relay from a failure path, where an encoding error has nowhere to go.
    fn relay_detached(&self, envelope: &AuditEnvelope) {
        if let Err(e) = self.relay.relay(envelope) {
            warn!(exchange_id = %envelope.exchange_id, error = %e, "Failure audit not encoded");
        }
    }

    async fn publish_required(&self, topic: &str, payload: Bytes) -> Result<(), PipelineError> {
        let result = self.publisher.publish(topic, payload).await;
        metrics::record_publish(topic, result.is_ok());
        result.map_err(|source| PipelineError::Publish {
            topic: topic.to_string(),
            source,
        })
    }

    async fn forward(
        &self,
        resource: &ResourceDefinition,
        ingress: Ingress,
    ) -> Result<BackendResponse, BackendError> {
        let mut guard = ForwardGuard {
            relay: &self.relay,
            envelopes: &self.envelopes,
            resource,
            exchange_id: &ingress.exchange_id,
            armed: true,
        };
        let started = Instant::now();

        let request = BackendRequest {
            method: ingress.method,
            query: ingress.query,
            body: ingress.body,
            exchange_id: ingress.exchange_id.clone(),
        };
        let result = self.dispatcher.forward(resource, request).await;
        guard.armed = false;

        metrics::record_backend(&resource.name, started.elapsed(), result.is_ok());
        result
    }
}

/// Armed for the duration of a backend call.
///
/// If the request future is dropped mid-call (client gone, request timeout)
/// the exchange is failed and a cancellation audit goes out from `Drop`.
struct ForwardGuard<'a> {
    relay: &'a AuditRelay,
    envelopes: &'a EnvelopeBuilder,
    resource: &'a ResourceDefinition,
    exchange_id: &'a str,
    armed: bool,
}

impl Drop for ForwardGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(
            exchange_id = %self.exchange_id,
            resource = %self.resource.name,
            stage = %Stage::Failed,
            "Exchange cancelled during backend call"
        );
        metrics::record_exchange(&self.resource.name, "cancelled");

        let envelope = self.envelopes.build_failure(
            self.resource,
            self.exchange_id,
            b"",
            &BackendError::Cancelled.to_string(),
        );
        if let Err(e) = self.relay.relay(&envelope) {
            warn!(exchange_id = %self.exchange_id, error = %e, "Cancellation audit not encoded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use tokio::task::JoinHandle;

    use crate::backend::dispatcher::MockBackendDispatcher;
    use crate::broker::publisher::MockTopicPublisher;
    use crate::broker::{MemoryPublisher, PublishError};
    use crate::config::{AuditConfig, ResourceConfig};

    const OPS: &str = "opsmgmt_platformtransactions";

    struct Harness {
        pipeline: ResourcePipeline,
        broker: Arc<MemoryPublisher>,
        audit_worker: JoinHandle<()>,
    }

    impl Harness {
        fn new(dispatcher: impl BackendDispatcher + 'static) -> Self {
            let broker = Arc::new(MemoryPublisher::new(100));
            Self::with_publisher(dispatcher, broker.clone(), broker)
        }

        fn with_publisher(
            dispatcher: impl BackendDispatcher + 'static,
            publisher: Arc<dyn TopicPublisher>,
            broker: Arc<MemoryPublisher>,
        ) -> Self {
            let (relay, queue) = AuditRelay::new(OPS, 16);
            let audit_worker = queue.spawn(broker.clone(), 4);
            let pipeline = ResourcePipeline::new(
                publisher,
                Arc::new(dispatcher),
                relay,
                EnvelopeBuilder::new(&AuditConfig::default(), "run-1"),
            );
            Self {
                pipeline,
                broker,
                audit_worker,
            }
        }

        /// Drop the pipeline, wait for the audit worker, return audit records.
        async fn audits(self) -> Vec<serde_json::Value> {
            drop(self.pipeline);
            self.audit_worker.await.unwrap();
            self.broker
                .published_to(OPS)
                .iter()
                .map(|b| serde_json::from_slice(b).unwrap())
                .collect()
        }
    }

    fn resource(forward: bool, audit_response: bool) -> Arc<ResourceDefinition> {
        let mut row = ResourceConfig::named("Patient");
        row.forward_to_backend = forward;
        row.audit_response = audit_response;
        Arc::new(ResourceDefinition::from_config(&row))
    }

    fn ingress(body: &'static [u8]) -> Ingress {
        Ingress {
            method: Method::POST,
            query: None,
            body: Bytes::from_static(body),
            exchange_id: "ex-1".into(),
        }
    }

    fn created(body: &'static [u8]) -> BackendResponse {
        BackendResponse {
            status: StatusCode::CREATED,
            content_type: Some("application/fhir+json".into()),
            body: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn test_publish_only() {
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher.expect_forward().never();
        let h = Harness::new(dispatcher);

        let outcome = h
            .pipeline
            .process(&resource(false, false), ingress(b"{\"resourceType\":\"Patient\"}"))
            .await
            .unwrap();
        assert!(matches!(outcome, PipelineOutcome::Published { exchange_id } if exchange_id == "ex-1"));

        assert_eq!(
            h.broker.published_to("fhirsvr_patient"),
            vec![Bytes::from_static(b"{\"resourceType\":\"Patient\"}")]
        );
        let audits = h.audits().await;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0]["processName"], "Input");
        assert_eq!(audits[0]["auditDetails"], "Patient message received");
        assert_eq!(audits[0]["exchangeId"], "ex-1");
    }

    #[tokio::test]
    async fn test_forwarded_with_response_audit() {
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher
            .expect_forward()
            .times(1)
            .withf(|resource, request| {
                resource.name == "Patient"
                    && request.method == Method::POST
                    && request.exchange_id == "ex-1"
                    && request.body == Bytes::from_static(b"{}")
            })
            .returning(|_, _| Ok(created(b"{\"id\":\"123\"}")));
        let h = Harness::new(dispatcher);

        let outcome = h.pipeline.process(&resource(true, true), ingress(b"{}")).await.unwrap();
        match outcome {
            PipelineOutcome::Forwarded { response, .. } => {
                assert_eq!(response.status, StatusCode::CREATED);
                assert_eq!(response.body, Bytes::from_static(b"{\"id\":\"123\"}"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let audits = h.audits().await;
        assert_eq!(audits.len(), 2);
        let response = audits.iter().find(|a| a["processName"] == "Response").unwrap();
        assert_eq!(response["auditDetails"], "Patient response message received");
        assert_eq!(response["bodySnapshot"], "{\"id\":\"123\"}");
    }

    #[tokio::test]
    async fn test_forwarded_without_response_audit() {
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher
            .expect_forward()
            .returning(|_, _| Ok(created(b"{}")));
        let h = Harness::new(dispatcher);

        h.pipeline.process(&resource(true, false), ingress(b"{}")).await.unwrap();

        let audits = h.audits().await;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0]["processName"], "Input");
    }

    #[tokio::test]
    async fn test_response_topic_publish() {
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher
            .expect_forward()
            .returning(|_, _| Ok(created(b"{\"id\":\"9\"}")));
        let h = Harness::new(dispatcher);

        let mut row = ResourceConfig::named("Patient");
        row.response_topic = Some("fhirsvr_patient_response".into());
        let resource = Arc::new(ResourceDefinition::from_config(&row));

        h.pipeline.process(&resource, ingress(b"{}")).await.unwrap();
        assert_eq!(
            h.broker.published_to("fhirsvr_patient_response"),
            vec![Bytes::from_static(b"{\"id\":\"9\"}")]
        );
    }

    #[tokio::test]
    async fn test_backend_failure_emits_failure_audit() {
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher.expect_forward().returning(|_, _| {
            Err(BackendError::Unreachable {
                url: "http://localhost:8080/fhir/Patient".into(),
                reason: "connection refused".into(),
            })
        });
        let h = Harness::new(dispatcher);

        let err = h
            .pipeline
            .process(&resource(true, false), ingress(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Backend(BackendError::Unreachable { .. })));

        // The resource publish happened before the backend call.
        assert_eq!(h.broker.published_to("fhirsvr_patient").len(), 1);

        let audits = h.audits().await;
        assert_eq!(audits.len(), 2);
        let failure = audits.iter().find(|a| a["processName"] == "Response").unwrap();
        assert!(failure["auditDetails"]
            .as_str()
            .unwrap()
            .starts_with("Patient response failed: backend"));
    }

    #[tokio::test]
    async fn test_backend_status_body_in_failure_audit() {
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher.expect_forward().returning(|_, _| {
            Err(BackendError::Status {
                url: "http://h/Patient".into(),
                status: StatusCode::BAD_REQUEST,
                body: Bytes::from_static(b"{\"issue\":[]}"),
            })
        });
        let h = Harness::new(dispatcher);

        h.pipeline
            .process(&resource(true, true), ingress(b"{}"))
            .await
            .unwrap_err();

        let audits = h.audits().await;
        let failure = audits.iter().find(|a| a["processName"] == "Response").unwrap();
        assert_eq!(failure["bodySnapshot"], "{\"issue\":[]}");
    }

    #[tokio::test]
    async fn test_required_publish_failure_skips_backend() {
        let mut publisher = MockTopicPublisher::new();
        publisher.expect_publish().times(1).returning(|topic, _| {
            Err(PublishError::Rejected {
                topic: topic.to_string(),
                reason: "no responders".into(),
            })
        });
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher.expect_forward().never();

        let broker = Arc::new(MemoryPublisher::new(10));
        let h = Harness::with_publisher(dispatcher, Arc::new(publisher), broker);

        let err = h
            .pipeline
            .process(&resource(true, true), ingress(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Publish { ref topic, .. } if topic == "fhirsvr_patient"));

        // The Input audit still went out.
        let audits = h.audits().await;
        assert_eq!(audits.len(), 1);
    }

    #[tokio::test]
    async fn test_input_audit_queued_before_resource_publish() {
        use std::sync::Mutex;

        use crate::audit::RelayOutcome;

        // Capacity 1 and no worker yet: the queue is full once the Input
        // envelope is in, so a relay attempt during publish must drop.
        let (relay, queue) = AuditRelay::new(OPS, 1);
        let envelopes = EnvelopeBuilder::new(&AuditConfig::default(), "run-1");
        let marker = envelopes.build(&resource(false, false), "marker", ProcessName::Input, b"{}");

        let seen = Arc::new(Mutex::new(None));
        let mut publisher = MockTopicPublisher::new();
        {
            let relay = relay.clone();
            let seen = seen.clone();
            publisher
                .expect_publish()
                .times(1)
                .returning(move |_, _| {
                    *seen.lock().unwrap() = Some(relay.relay(&marker).unwrap());
                    Ok(())
                });
        }
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher.expect_forward().never();

        let pipeline = ResourcePipeline::new(
            Arc::new(publisher),
            Arc::new(dispatcher),
            relay,
            envelopes,
        );
        pipeline
            .process(&resource(false, false), ingress(b"{}"))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(RelayOutcome::Dropped));

        drop(pipeline);
        let broker = Arc::new(MemoryPublisher::new(10));
        queue.spawn(broker.clone(), 1).await.unwrap();
        let audits: Vec<serde_json::Value> = broker
            .published_to(OPS)
            .iter()
            .map(|b| serde_json::from_slice(b).unwrap())
            .collect();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0]["processName"], "Input");
        assert_eq!(audits[0]["exchangeId"], "ex-1");
    }

    #[tokio::test]
    async fn test_non_utf8_body_fails_before_publish() {
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher.expect_forward().never();
        let h = Harness::new(dispatcher);

        let err = h
            .pipeline
            .process(&resource(true, true), ingress(&[0xff, 0xfe]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Serialization(SerializationError::NotUtf8 { .. })
        ));
        assert!(h.broker.published().is_empty());
        assert!(h.audits().await.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_bodies_publish_each_time() {
        let mut dispatcher = MockBackendDispatcher::new();
        dispatcher.expect_forward().never();
        let h = Harness::new(dispatcher);
        let resource = resource(false, false);

        h.pipeline.process(&resource, ingress(b"{}")).await.unwrap();
        h.pipeline.process(&resource, ingress(b"{}")).await.unwrap();

        assert_eq!(h.broker.published_to("fhirsvr_patient").len(), 2);
    }

    struct StalledDispatcher;

    #[async_trait]
    impl BackendDispatcher for StalledDispatcher {
        async fn forward(
            &self,
            _resource: &ResourceDefinition,
            _request: BackendRequest,
        ) -> Result<BackendResponse, BackendError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_dropped_exchange_emits_cancellation_audit() {
        let h = Harness::new(StalledDispatcher);

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            h.pipeline.process(&resource(true, true), ingress(b"{}")),
        )
        .await;
        assert!(result.is_err());

        let audits = h.audits().await;
        assert_eq!(audits.len(), 2);
        let cancelled = audits.iter().find(|a| a["processName"] == "Response").unwrap();
        assert_eq!(cancelled["auditDetails"], "Patient response failed: backend call cancelled");
    }
}
