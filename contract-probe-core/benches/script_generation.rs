use std::collections::BTreeMap;
use std::hint::black_box;

use contract_probe_core::contract::Contract;
use contract_probe_core::hashing::Language;
use contract_probe_core::root_cause::{RootCauseAnalyzer, RootCauseConfig};
use contract_probe_core::script::{ScriptGenerator, TargetSource};
use contract_probe_core::serializer::Value;
use contract_probe_core::store::Artifact;
use contract_probe_core::verifier::{InvariantResult, VerificationResult};
use contract_probe_core::violation;
use criterion::{Criterion, criterion_group, criterion_main};

const CONTRACT: &str = r#"{
    "function_id": "orders.py::dedupe",
    "invariants": [
        {"name": "unique_ids", "logic": "result has no duplicates", "criticality": "HIGH"},
        {"name": "not_longer", "logic": "len(result) <= len(items)", "criticality": "MEDIUM"},
        {"name": "is_list", "logic": "result is a list", "criticality": "LOW"}
    ],
    "precondition": "items is not None"
}"#;

const SOURCE: &str = "def dedupe(items):\n    seen = []\n    for item in items:\n        if item not in seen:\n            seen.append(item)\n    return seen\n";

fn bench_generation(c: &mut Criterion) {
    let contract = Contract::from_json(CONTRACT).unwrap();
    let target = TargetSource {
        function_name: "dedupe".to_string(),
        body: SOURCE.to_string(),
        language: Language::Python,
    };
    let generator = ScriptGenerator::new();

    c.bench_function("generate_script", |b| {
        b.iter(|| generator.generate(black_box(&contract), Some(black_box(&target))).unwrap());
    });

    c.bench_function("generate_script_observed_only", |b| {
        b.iter(|| generator.generate(black_box(&contract), None).unwrap());
    });
}

fn bench_serializer(c: &mut Criterion) {
    let mut fields = BTreeMap::new();
    for i in 0..50 {
        fields.insert(
            format!("key_{}", i),
            Value::List(vec![Value::Int(i), Value::decimal("10.25").unwrap(), Value::Str("x".repeat(16))]),
        );
    }
    let value = Value::Map(fields);

    c.bench_function("serializer_to_wire", |b| {
        b.iter(|| black_box(&value).to_wire());
    });

    c.bench_function("serializer_canonical_bytes", |b| {
        b.iter(|| black_box(&value).to_canonical_bytes());
    });
}

fn bench_root_cause(c: &mut Criterion) {
    let contract = Contract::from_json(CONTRACT).unwrap();
    let artifact = Artifact::new("orders.py::dedupe", "orders.py", "dedupe", Language::Python, SOURCE, 1);
    let result = VerificationResult {
        run_id: uuid::Uuid::nil(),
        function_id: "orders.py::dedupe".to_string(),
        passed: false,
        invariants: vec![InvariantResult {
            name: "unique_ids".to_string(),
            passed: false,
            message: "invariant violated: _no_duplicates(result) (result=[1, 1])".to_string(),
            criticality: contract.criticality_of("unique_ids").unwrap(),
        }],
        error: None,
        duration_ms: 0,
        script_hash: None,
        started_at: chrono::Utc::now(),
    };
    let report = violation::identify(&result, Some(&contract));
    let analyzer = RootCauseAnalyzer::new(RootCauseConfig::default());

    c.bench_function("root_cause_analyze", |b| {
        b.iter(|| analyzer.analyze(black_box(&report.violations), black_box(&artifact)));
    });
}

criterion_group!(benches, bench_generation, bench_serializer, bench_root_cause);
criterion_main!(benches);
