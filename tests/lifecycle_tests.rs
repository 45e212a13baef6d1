//! Lifecycle-manager tests against a scripted registry.
//!
//! The mock records every registry call and replays a scripted status
//! sequence, so install rollback, best-effort steps, and stop-convergence
//! polling can be verified without an OS service manager.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use iomond::errors::RegistryError;
use iomond::lifecycle::{ServiceDescriptor, ServiceLifecycle};
use iomond::registry::{
    RecoveryAction, RecoveryPlan, ServiceDefinition, ServiceRegistry, ServiceState,
    StatusSnapshot,
};

#[derive(Default)]
struct MockRegistry {
    exists: bool,
    fail_event_source: bool,
    fail_recovery: bool,
    refuse_stop: bool,
    statuses: Mutex<VecDeque<ServiceState>>,
    calls: Mutex<Vec<String>>,
    applied_plan: Mutex<Option<RecoveryPlan>>,
    created: Mutex<Option<ServiceDefinition>>,
}

impl MockRegistry {
    fn with_statuses(states: &[ServiceState]) -> Self {
        Self {
            exists: true,
            statuses: Mutex::new(states.iter().copied().collect()),
            ..Self::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next_status(&self) -> Result<StatusSnapshot, RegistryError> {
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .map(StatusSnapshot::new)
            .ok_or_else(|| RegistryError::OperationFailed {
                name: "svc1".to_string(),
                operation: "query".to_string(),
                reason: "status script exhausted".to_string(),
            })
    }
}

impl ServiceRegistry for MockRegistry {
    async fn service_exists(&self, _name: &str) -> Result<bool, RegistryError> {
        self.record("exists");
        Ok(self.exists)
    }

    async fn create_service(&self, definition: &ServiceDefinition) -> Result<(), RegistryError> {
        self.record("create");
        *self.created.lock().unwrap() = Some(definition.clone());
        Ok(())
    }

    async fn delete_service(&self, _name: &str) -> Result<(), RegistryError> {
        self.record("delete");
        Ok(())
    }

    async fn start_service(&self, name: &str) -> Result<(), RegistryError> {
        self.record("start");
        if self.exists {
            Ok(())
        } else {
            Err(RegistryError::ServiceNotFound {
                name: name.to_string(),
            })
        }
    }

    async fn control_stop(&self, name: &str) -> Result<StatusSnapshot, RegistryError> {
        self.record("control_stop");
        if self.refuse_stop {
            return Err(RegistryError::OperationFailed {
                name: name.to_string(),
                operation: "stop".to_string(),
                reason: "access denied".to_string(),
            });
        }
        self.next_status()
    }

    async fn query_status(&self, _name: &str) -> Result<StatusSnapshot, RegistryError> {
        self.record("query");
        self.next_status()
    }

    async fn apply_recovery_plan(
        &self,
        name: &str,
        plan: &RecoveryPlan,
    ) -> Result<(), RegistryError> {
        self.record("recovery");
        if self.fail_recovery {
            return Err(RegistryError::OperationFailed {
                name: name.to_string(),
                operation: "recovery".to_string(),
                reason: "not supported on this OS version".to_string(),
            });
        }
        *self.applied_plan.lock().unwrap() = Some(plan.clone());
        Ok(())
    }

    async fn register_event_source(&self, name: &str) -> Result<(), RegistryError> {
        self.record("register_event_source");
        if self.fail_event_source {
            return Err(RegistryError::OperationFailed {
                name: name.to_string(),
                operation: "register_event_source".to_string(),
                reason: "event log unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_event_source(&self, _name: &str) -> Result<(), RegistryError> {
        self.record("remove_event_source");
        Ok(())
    }
}

fn descriptor(restart_on_failure: bool, restart_delay_secs: u64) -> ServiceDescriptor {
    ServiceDescriptor {
        name: "svc1".to_string(),
        description: "test service".to_string(),
        restart_on_failure,
        restart_delay_secs,
        max_restart_attempts: 3,
    }
}

#[tokio::test]
async fn install_registers_service_with_escalating_recovery_plan() {
    let lifecycle = ServiceLifecycle::new(MockRegistry::default());

    lifecycle.install(&descriptor(true, 5)).await.unwrap();

    let registry = lifecycle.registry();
    let calls = registry.calls();
    assert!(calls.contains(&"create".to_string()));
    assert!(calls.contains(&"recovery".to_string()));
    assert!(calls.contains(&"register_event_source".to_string()));
    assert!(!calls.contains(&"delete".to_string()));

    let plan = registry.applied_plan.lock().unwrap().clone().unwrap();
    let delays: Vec<u64> = plan.steps.iter().map(|s| s.delay.as_secs()).collect();
    assert_eq!(delays, vec![5, 10, 15]);
    assert!(plan
        .steps
        .iter()
        .all(|s| s.action == RecoveryAction::Restart));
    assert_eq!(plan.reset_window, Duration::from_secs(60));

    let definition = registry.created.lock().unwrap().clone().unwrap();
    assert!(definition.auto_start);
    assert_eq!(definition.launch_args, vec!["run-as-service".to_string()]);
}

#[tokio::test]
async fn install_without_restart_policy_installs_no_plan() {
    let lifecycle = ServiceLifecycle::new(MockRegistry::default());

    lifecycle.install(&descriptor(false, 5)).await.unwrap();

    let registry = lifecycle.registry();
    assert!(!registry.calls().contains(&"recovery".to_string()));
    assert!(registry.applied_plan.lock().unwrap().is_none());
}

#[tokio::test]
async fn install_on_existing_name_fails_without_touching_it() {
    let registry = MockRegistry {
        exists: true,
        ..MockRegistry::default()
    };
    let lifecycle = ServiceLifecycle::new(registry);

    let err = lifecycle.install(&descriptor(true, 5)).await.unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));

    // Only the existence probe ran; the registration was never modified.
    assert_eq!(lifecycle.registry().calls(), vec!["exists".to_string()]);
}

#[tokio::test]
async fn install_rolls_back_when_event_source_registration_fails() {
    let registry = MockRegistry {
        fail_event_source: true,
        ..MockRegistry::default()
    };
    let lifecycle = ServiceLifecycle::new(registry);

    let err = lifecycle.install(&descriptor(false, 0)).await.unwrap_err();
    assert!(matches!(err, RegistryError::OperationFailed { .. }));

    let calls = lifecycle.registry().calls();
    assert!(calls.contains(&"create".to_string()));
    assert!(calls.contains(&"delete".to_string()));
}

#[tokio::test]
async fn recovery_plan_failure_does_not_abort_install() {
    let registry = MockRegistry {
        fail_recovery: true,
        ..MockRegistry::default()
    };
    let lifecycle = ServiceLifecycle::new(registry);

    lifecycle.install(&descriptor(true, 5)).await.unwrap();

    let calls = lifecycle.registry().calls();
    assert!(calls.contains(&"register_event_source".to_string()));
    assert!(!calls.contains(&"delete".to_string()));
}

#[tokio::test]
async fn install_rejects_empty_service_name() {
    let lifecycle = ServiceLifecycle::new(MockRegistry::default());
    let mut empty = descriptor(false, 0);
    empty.name.clear();

    let err = lifecycle.install(&empty).await.unwrap_err();
    assert!(matches!(err, RegistryError::OperationFailed { .. }));
    assert!(lifecycle.registry().calls().is_empty());
}

#[tokio::test]
async fn remove_ignores_a_refused_stop_and_still_deletes() {
    let registry = MockRegistry {
        exists: true,
        refuse_stop: true,
        ..MockRegistry::default()
    };
    let lifecycle = ServiceLifecycle::new(registry);

    lifecycle.remove("svc1").await.unwrap();

    let calls = lifecycle.registry().calls();
    assert!(calls.contains(&"control_stop".to_string()));
    assert!(calls.contains(&"delete".to_string()));
    assert!(calls.contains(&"remove_event_source".to_string()));
}

#[tokio::test(start_paused = true)]
async fn remove_waits_for_the_stop_to_converge_before_deleting() {
    let registry =
        MockRegistry::with_statuses(&[ServiceState::StopPending, ServiceState::Stopped]);
    let lifecycle = ServiceLifecycle::new(registry);

    lifecycle.remove("svc1").await.unwrap();

    let calls = lifecycle.registry().calls();
    let delete_at = calls.iter().position(|c| c == "delete").unwrap();
    let query_at = calls.iter().position(|c| c == "query").unwrap();
    assert!(query_at < delete_at);
}

#[tokio::test(start_paused = true)]
async fn stop_polls_every_half_second_until_stopped() {
    let registry = MockRegistry::with_statuses(&[
        ServiceState::StopPending,
        ServiceState::StopPending,
        ServiceState::Stopped,
    ]);
    let lifecycle = ServiceLifecycle::new(registry);

    let started = tokio::time::Instant::now();
    lifecycle.stop("svc1").await.unwrap();

    // Two 500 ms polls after the initial control round-trip.
    assert_eq!(started.elapsed(), Duration::from_millis(1000));
    let calls = lifecycle.registry().calls();
    assert_eq!(calls.iter().filter(|c| *c == "query").count(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_surfaces_a_failed_status_query() {
    // Only the control round-trip is scripted; the first poll errors.
    let registry = MockRegistry::with_statuses(&[ServiceState::StopPending]);
    let lifecycle = ServiceLifecycle::new(registry);

    let err = lifecycle.stop("svc1").await.unwrap_err();
    assert!(matches!(err, RegistryError::OperationFailed { .. }));
}

#[tokio::test]
async fn starting_an_unknown_service_cannot_open_it() {
    let lifecycle = ServiceLifecycle::new(MockRegistry::default());

    let err = lifecycle.start("unknown-svc").await.unwrap_err();
    assert_eq!(err.to_string(), "cannot open service unknown-svc");
}

#[tokio::test]
async fn status_renders_known_and_unknown_states() {
    let registry = MockRegistry::with_statuses(&[
        ServiceState::Running,
        ServiceState::Unknown(42),
    ]);
    let lifecycle = ServiceLifecycle::new(registry);

    assert_eq!(lifecycle.status("svc1").await.unwrap(), "running");
    assert_eq!(lifecycle.status("svc1").await.unwrap(), "unknown (42)");
}
