//! Runner lifecycle and suite orchestration tests.
//!
//! Uses scripted runners, a recording agent controller, and mock backends to
//! check hook ordering, lifecycle failure handling, and suite aggregation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use agent_validation::backend::{Statistic, HIGH_RESOLUTION_STAT_PERIOD};
use agent_validation::dimension::INSTANCE_ID;
use agent_validation::environment::{ComputeType, MetaData};
use agent_validation::logs::SchemaTable;
use agent_validation::manifest::ManifestSuite;
use agent_validation::metrics::ExpectedSchema;
use agent_validation::runner::{
    Ec2Runner, EksRunner, MeasuredMetricsRunner, PerformanceLogCheck, SchemaMetricsRunner,
    TestRunner, EMF_LOGS_RESULT, LIFECYCLE_FAILURE_RESULT,
};
use agent_validation::{
    run_suite, Status, SuiteDefinition, SuiteError, TestGroupResult, TestResult, TestSuite,
};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use validation_test_utils::fixtures::node_record_schema;
use validation_test_utils::{
    dims, performance_record, AgentEvent, MockEnvironment, MockLogsBackend, MockMetricsBackend,
    MockRunner, RecordingAgentController, RecordingExecutor, TestContextBuilder,
};

fn lifecycle_failure(name: &str) -> TestGroupResult {
    TestGroupResult::new(name, vec![TestResult::failed(LIFECYCLE_FAILURE_RESULT)])
}

/// Suite definition built from scripted runners.
struct ScriptedSuite {
    ec2: Vec<MockRunner>,
    eks: Vec<MockRunner>,
    resolutions: Arc<AtomicUsize>,
}

impl ScriptedSuite {
    fn new(ec2: Vec<MockRunner>, eks: Vec<MockRunner>) -> Self {
        Self {
            ec2,
            eks,
            resolutions: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SuiteDefinition for ScriptedSuite {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn ec2_runners(&self, _env: &MetaData) -> Vec<Ec2Runner> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        self.ec2
            .iter()
            .map(|r| Ec2Runner::new(Box::new(r.clone())))
            .collect()
    }

    fn eks_runners(&self, _env: &MetaData) -> Vec<EksRunner> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        self.eks
            .iter()
            .map(|r| EksRunner::new(Box::new(r.clone())))
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Standalone host lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_ec2_lifecycle_order() {
    let runner = MockRunner::new("CPU", &["cpu_usage_idle"]).with_config_file("cpu.json");
    let agent = RecordingAgentController::new();
    let mut ctx = TestContextBuilder::new(MetaData::ec2()).build();

    let group = Ec2Runner::new(Box::new(runner.clone()))
        .run(&mut ctx, &agent, Path::new("/configs"))
        .await;

    assert_eq!(
        group,
        TestGroupResult::new("CPU", vec![TestResult::passed("cpu_usage_idle")])
    );
    assert_eq!(runner.calls(), vec!["setup_before", "setup_after", "validate"]);
    assert_eq!(
        agent.events(),
        vec![
            AgentEvent::Start(Path::new("/configs/cpu.json").to_path_buf()),
            AgentEvent::Stop,
        ]
    );
}

#[tokio::test]
async fn test_ec2_start_failure_reports_starting_agent() {
    let runner = MockRunner::new("CPU", &["cpu_usage_idle"]).with_config_file("cpu.json");
    let agent = RecordingAgentController::new().failing_start();
    let mut ctx = TestContextBuilder::new(MetaData::ec2()).build();

    let group = Ec2Runner::new(Box::new(runner.clone()))
        .run(&mut ctx, &agent, Path::new("/configs"))
        .await;

    assert_eq!(group, lifecycle_failure("CPU"));
    assert_eq!(runner.calls(), vec!["setup_before"]);
}

#[tokio::test]
async fn test_ec2_setup_failure_after_start_stops_agent() {
    let runner = MockRunner::new("CPU", &["cpu_usage_idle"])
        .with_config_file("cpu.json")
        .failing_setup_after();
    let agent = RecordingAgentController::new();
    let mut ctx = TestContextBuilder::new(MetaData::ec2()).build();

    let group = Ec2Runner::new(Box::new(runner.clone()))
        .run(&mut ctx, &agent, Path::new("/configs"))
        .await;

    assert_eq!(group, lifecycle_failure("CPU"));
    assert_eq!(agent.events().last(), Some(&AgentEvent::Stop));
    assert!(!runner.calls().contains(&"validate".to_string()));
}

#[tokio::test]
async fn test_ec2_setup_failure_before_start_skips_agent() {
    let runner = MockRunner::new("CPU", &[])
        .with_config_file("cpu.json")
        .failing_setup_before();
    let agent = RecordingAgentController::new();
    let mut ctx = TestContextBuilder::new(MetaData::ec2()).build();

    let group = Ec2Runner::new(Box::new(runner))
        .run(&mut ctx, &agent, Path::new("/configs"))
        .await;

    assert_eq!(group, lifecycle_failure("CPU"));
    assert!(agent.events().is_empty());
}

#[tokio::test]
async fn test_ec2_stop_failure_reports_starting_agent() {
    let runner = MockRunner::new("CPU", &["cpu_usage_idle"]).with_config_file("cpu.json");
    let agent = RecordingAgentController::new().failing_stop();
    let mut ctx = TestContextBuilder::new(MetaData::ec2()).build();

    let group = Ec2Runner::new(Box::new(runner))
        .run(&mut ctx, &agent, Path::new("/configs"))
        .await;

    assert_eq!(group, lifecycle_failure("CPU"));
}

#[tokio::test]
async fn test_ec2_runner_without_config_file_fails() {
    let runner = MockRunner::new("CPU", &["cpu_usage_idle"]);
    let agent = RecordingAgentController::new();
    let mut ctx = TestContextBuilder::new(MetaData::ec2()).build();

    let group = Ec2Runner::new(Box::new(runner))
        .run(&mut ctx, &agent, Path::new("/configs"))
        .await;

    assert_eq!(group, lifecycle_failure("CPU"));
    assert!(agent.events().is_empty());
}

// ----------------------------------------------------------------------------
// Cluster lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_eks_lifecycle_injects_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("eks.json"),
        r#"{"logs": {"metrics_collected": {"kubernetes": {"cluster_name": "demo"}}}}"#,
    )
    .unwrap();

    let runner =
        MockRunner::new("EKSContainerInstance", &["ClusterName"]).with_config_file("eks.json");
    let mut ctx = TestContextBuilder::new(MetaData::eks("demo")).build();

    let group = EksRunner::new(Box::new(runner.clone()))
        .run(&mut ctx, dir.path())
        .await;

    assert_eq!(group.status(), Status::Passed);
    assert_eq!(
        runner.calls(),
        vec!["set_agent_config:eks.json", "setup_before", "setup_after", "validate"]
    );
    let config = runner.received_config().unwrap();
    assert_eq!(
        config.contents["logs"]["metrics_collected"]["kubernetes"]["cluster_name"],
        json!("demo")
    );
}

#[tokio::test]
async fn test_eks_lifecycle_without_config_file() {
    let runner = MockRunner::new("EKS_AWS_HYPERPOD", &["ClusterName"]);
    let mut ctx = TestContextBuilder::new(MetaData::eks("demo")).build();

    let group = EksRunner::new(Box::new(runner.clone()))
        .run(&mut ctx, Path::new("/nonexistent"))
        .await;

    assert_eq!(group.status(), Status::Passed);
    assert_eq!(runner.calls(), vec!["setup_before", "setup_after", "validate"]);
    assert!(runner.received_config().is_none());
}

#[tokio::test]
async fn test_eks_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let runner =
        MockRunner::new("EKSContainerInstance", &["ClusterName"]).with_config_file("eks.json");
    let mut ctx = TestContextBuilder::new(MetaData::eks("demo")).build();

    let group = EksRunner::new(Box::new(runner.clone()))
        .run(&mut ctx, dir.path())
        .await;

    assert_eq!(group, lifecycle_failure("EKSContainerInstance"));
    assert!(runner.calls().is_empty());
}

// ----------------------------------------------------------------------------
// Runner variants
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_schema_metrics_runner_end_to_end() {
    let group_name = "/aws/containerinsights/demo/performance";
    let metrics = MockMetricsBackend::new()
        .with_listing("cluster_node_count", &[("ClusterName", "demo")])
        .with_listing(
            "node_cpu_utilization",
            &[("ClusterName", "demo"), ("NodeName", "node-1")],
        );
    let logs = MockLogsBackend::new().with_stream(
        group_name,
        "node-1",
        vec![performance_record(
            "Node",
            "demo",
            json!({"NodeName": "node-1", "node_cpu_utilization": 4.2}),
        )],
    );
    let schemas = SchemaTable::new()
        .with_schema("Node", &node_record_schema())
        .unwrap();

    let runner = SchemaMetricsRunner::new(
        "EKSContainerInstance",
        ExpectedSchema::new()
            .with(&["ClusterName"], &["cluster_node_count"])
            .with(&["ClusterName", "NodeName"], &["node_cpu_utilization"]),
    )
    .with_run_duration(Duration::ZERO)
    .with_performance_logs(PerformanceLogCheck::new(Arc::new(schemas)));

    let mut ctx = TestContextBuilder::new(MetaData::eks("demo"))
        .metrics(&metrics)
        .logs(&logs)
        .metadata(MockEnvironment::new().with_node("node-1"))
        .build();

    let group = EksRunner::new(Box::new(runner))
        .run(&mut ctx, Path::new("/nonexistent"))
        .await;

    assert_eq!(
        group.results,
        vec![
            TestResult::passed("ClusterName"),
            TestResult::passed("cluster_node_count"),
            TestResult::passed("ClusterName-NodeName"),
            TestResult::passed("node_cpu_utilization"),
            TestResult::passed(EMF_LOGS_RESULT),
        ]
    );
}

#[tokio::test]
async fn test_measured_metrics_runner_resolves_instance_id() {
    let metrics = MockMetricsBackend::new();
    let commands = RecordingExecutor::new();
    let runner = MeasuredMetricsRunner::new(
        "JMX",
        "MetricValueBenchmarkJMXTest",
        vec![
            "jvm.threads.count".to_string(),
            "jvm.gc.collections.elapsed".to_string(),
            "jvm.gc.collections.elapsed".to_string(),
        ],
    )
    .with_agent_config_file("jmx_config.json")
    .with_run_duration(Duration::ZERO)
    .with_setup_commands(vec!["start-zookeeper".to_string(), "start-kafka".to_string()]);

    let agent = RecordingAgentController::new();
    let mut ctx = TestContextBuilder::new(MetaData::ec2())
        .metrics(&metrics)
        .commands(&commands)
        .metadata(MockEnvironment::new().with_instance_id("i-0abc"))
        .build();

    let group = Ec2Runner::new(Box::new(runner))
        .run(&mut ctx, &agent, Path::new("/configs"))
        .await;

    assert_eq!(
        group,
        TestGroupResult::new(
            "JMX",
            vec![
                TestResult::passed("jvm.threads.count"),
                TestResult::passed("jvm.gc.collections.elapsed"),
                TestResult::passed("jvm.gc.collections.elapsed"),
            ]
        )
    );
    assert_eq!(commands.commands(), vec!["start-zookeeper", "start-kafka"]);

    let queries = metrics.value_queries();
    assert_eq!(queries.len(), 3);
    for query in queries {
        assert_eq!(query.namespace, "MetricValueBenchmarkJMXTest");
        assert_eq!(query.dimensions, dims(&[(INSTANCE_ID, "i-0abc")]));
        assert_eq!(query.statistic, Statistic::Average);
        assert_eq!(query.period, HIGH_RESOLUTION_STAT_PERIOD);
    }
}

#[tokio::test]
async fn test_measured_metrics_fail_without_instance_id() {
    let metrics = MockMetricsBackend::new();
    let runner = MeasuredMetricsRunner::new(
        "JMX",
        "MetricValueBenchmarkJMXTest",
        vec!["jvm.threads.count".to_string()],
    );
    let mut ctx = TestContextBuilder::new(MetaData::ec2())
        .metrics(&metrics)
        .build();

    let group = runner.validate(&mut ctx).await;

    assert_eq!(group.results, vec![TestResult::failed("jvm.threads.count")]);
    assert_eq!(metrics.value_calls(), 0);
}

#[tokio::test]
async fn test_measured_metrics_setup_command_failure() {
    let commands = RecordingExecutor::new().failing_on("kafka");
    let runner = MeasuredMetricsRunner::new(
        "JMX",
        "MetricValueBenchmarkJMXTest",
        vec!["jvm.threads.count".to_string()],
    )
    .with_agent_config_file("jmx_config.json")
    .with_setup_commands(vec![
        "start-zookeeper".to_string(),
        "start-kafka".to_string(),
        "start-tomcat".to_string(),
    ]);
    let agent = RecordingAgentController::new();
    let mut ctx = TestContextBuilder::new(MetaData::ec2())
        .commands(&commands)
        .build();

    let group = Ec2Runner::new(Box::new(runner))
        .run(&mut ctx, &agent, Path::new("/configs"))
        .await;

    assert_eq!(group, lifecycle_failure("JMX"));
    assert_eq!(commands.commands(), vec!["start-zookeeper", "start-kafka"]);
    assert!(agent.events().is_empty());
}

// ----------------------------------------------------------------------------
// Suites
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_suite_aggregates_groups_and_fails_at_teardown() {
    let passing = MockRunner::new("first", &["a"]);
    let failing = MockRunner::new("second", &["b"]).with_result(TestResult::failed("c"));
    let definition = ScriptedSuite::new(vec![], vec![passing.clone(), failing.clone()]);
    let mut ctx = TestContextBuilder::new(MetaData::eks("demo")).build();

    let mut suite = TestSuite::new(
        Box::new(definition),
        Arc::new(RecordingAgentController::new()),
        "/nonexistent",
    );
    suite.setup();
    suite.run(&mut ctx).await;

    assert_eq!(suite.result().groups().len(), 2);
    assert_eq!(suite.result().status(), Status::Failed);

    let SuiteError::Failed { suite, result } = suite.teardown().unwrap_err();
    assert_eq!(suite, "Scripted");
    assert_eq!(result.failed_count(), 1);
    let names: Vec<&str> = result.groups().iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert_eq!(passing.calls().last().map(String::as_str), Some("validate"));
    assert_eq!(failing.calls().last().map(String::as_str), Some("validate"));
}

#[tokio::test]
async fn test_suite_runs_only_runners_for_compute_type() {
    let ec2 = MockRunner::new("ec2-only", &["a"]).with_config_file("a.json");
    let eks = MockRunner::new("eks-only", &["b"]);
    let definition = ScriptedSuite::new(vec![ec2.clone()], vec![eks.clone()]);
    let mut ctx = TestContextBuilder::new(MetaData::ec2()).build();

    let result = run_suite(
        Box::new(definition),
        Arc::new(RecordingAgentController::new()),
        "/configs",
        &mut ctx,
    )
    .await
    .unwrap();

    assert_eq!(result.groups().len(), 1);
    assert!(!ec2.calls().is_empty());
    assert!(eks.calls().is_empty());
}

#[tokio::test]
async fn test_unrecognized_compute_type_yields_zero_results() {
    let runner = MockRunner::new("never", &["a"]);
    let definition = ScriptedSuite::new(vec![runner.clone()], vec![runner.clone()]);
    let env = MetaData {
        compute_type: ComputeType::parse("ECS"),
        cluster_name: String::new(),
    };
    let mut ctx = TestContextBuilder::new(env).build();

    let result = run_suite(
        Box::new(definition),
        Arc::new(RecordingAgentController::new()),
        "/configs",
        &mut ctx,
    )
    .await
    .unwrap();

    assert!(result.groups().is_empty());
    assert_eq!(result.status(), Status::Passed);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_suite_resolves_runners_once() {
    let runner = MockRunner::new("cached", &["a"]);
    let definition = ScriptedSuite::new(vec![], vec![runner.clone()]);
    let resolutions = Arc::clone(&definition.resolutions);
    let mut ctx = TestContextBuilder::new(MetaData::eks("demo")).build();

    let mut suite = TestSuite::new(
        Box::new(definition),
        Arc::new(RecordingAgentController::new()),
        "/nonexistent",
    );
    suite.run(&mut ctx).await;
    suite.run(&mut ctx).await;

    assert_eq!(resolutions.load(Ordering::SeqCst), 1);
    assert_eq!(suite.result().groups().len(), 2);
    assert_eq!(
        runner.calls().iter().filter(|c| *c == "validate").count(),
        2
    );
}

#[tokio::test]
async fn test_manifest_suite_runs_end_to_end() {
    let definition = ManifestSuite::from_json(
        r#"{
            "name": "Manifest",
            "eks": [{
                "kind": "schema_metrics",
                "name": "EKS_AWS_HYPERPOD",
                "run_duration_secs": 0,
                "expected": {
                    "ClusterName": ["hyper_pod_node_health_status_schedulable"]
                }
            }]
        }"#,
    )
    .unwrap();
    let metrics = MockMetricsBackend::new()
        .with_listing("hyper_pod_node_health_status_schedulable", &[("ClusterName", "demo")]);
    let mut ctx = TestContextBuilder::new(MetaData::eks("demo"))
        .metrics(&metrics)
        .build();

    let result = run_suite(
        Box::new(definition),
        Arc::new(RecordingAgentController::new()),
        "/nonexistent",
        &mut ctx,
    )
    .await
    .unwrap();

    let group = result.groups().first().unwrap();
    assert_eq!(group.name, "EKS_AWS_HYPERPOD");
    assert_eq!(
        group.results,
        vec![
            TestResult::passed("ClusterName"),
            TestResult::passed("hyper_pod_node_health_status_schedulable"),
        ]
    );
}
