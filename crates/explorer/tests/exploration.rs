use hlsforge_cache::ResultCache;
use hlsforge_directives::{Configuration, DirectiveSpace, KernelMetadata, SpaceLimits};
use hlsforge_explorer::{
    EvaluationAdapter, ExhaustiveSearch, Explorer, ParetoExporter, RandomSearch,
};
use hlsforge_synth::{MetricVector, Synthesize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const SOURCE: &str = "void top(int a[32]) {\n\
                      outer: for (int i = 0; i < 8; i++) { // L1\n\
                      inner: for (int j = 0; j < 4; j++) { // L2\n\
                      a[i] += j;\n\
                      }\n\
                      }\n\
                      }\n";

/// Deterministic stand-in for the synthesis tool. Picking the last
/// candidate of the first loop overflows the BRAM budget; picking the
/// first candidate of both loops fails outright.
struct ModelTool {
    calls: AtomicUsize,
}

impl Synthesize for ModelTool {
    fn synthesize(&self, config: &Configuration) -> MetricVector {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let v = config.values();
        if v == [0, 0] {
            return MetricVector::FAILED;
        }
        let parallelism = (v[0] + 1) * (v[1] + 1);
        let bram = if v[0] == 4 { 140.0 } else { 10.0 * parallelism as f64 / 4.0 };
        MetricVector::from_array([
            10.0 / parallelism as f64,
            bram,
            2.0 * v[1] as f64,
            5.0,
            8.0 + parallelism as f64,
            0.0,
        ])
    }
}

fn space() -> Arc<DirectiveSpace> {
    // L1: pipeline, II=1, unroll, factor=2, factor=4; L2: pipeline, II=1, unroll, factor=2
    let meta = KernelMetadata::parse("top\nL1,loop,8\nL2,loop,4\n").unwrap();
    Arc::new(DirectiveSpace::build(&meta, &SpaceLimits::default()).unwrap())
}

fn explorer(cache_path: &Path, tool: Arc<ModelTool>) -> Explorer {
    let cache = Arc::new(ResultCache::open(cache_path).unwrap());
    let adapter = EvaluationAdapter::new(space(), tool, cache);
    Explorer::new(adapter, 4).unwrap()
}

#[test]
fn exhaustive_run_finds_feasible_front_and_exports_it() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(ModelTool {
        calls: AtomicUsize::new(0),
    });
    let explorer = explorer(&dir.path().join("cache.jsonl"), Arc::clone(&tool));

    let mut search = ExhaustiveSearch::new(6);
    let outcome = explorer.run(&mut search).unwrap();

    assert_eq!(outcome.evaluations, 20);
    assert_eq!(outcome.batches, 4);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 20);
    assert!(!outcome.front.is_empty());
    for eval in &outcome.front {
        assert!(eval.is_feasible());
        assert_ne!(eval.config.values()[0], 4);
        assert_ne!(eval.config.values(), &[0, 0]);
    }
    // Fastest feasible design: L1 factor=2 (3) with L2 factor=2 (3).
    assert!(outcome
        .front
        .iter()
        .any(|e| e.config.values() == [3, 3]));

    let out = dir.path().join("optimized");
    let exporter = ParetoExporter::new(space(), SOURCE.to_string(), ".cpp");
    let summary = exporter.export(&outcome.front, &out).unwrap();
    assert_eq!(summary.sources.len(), outcome.front.len());

    let csv = fs::read_to_string(out.join("info.csv")).unwrap();
    assert_eq!(csv.lines().count(), outcome.front.len() + 1);
    assert!(csv.starts_with("name, latency, bram_util, dsp_util, ff_util, lut_util, uram_util\n"));
    for (i, _) in outcome.front.iter().enumerate() {
        let text = fs::read_to_string(out.join(format!("optimized_{}.cpp", i + 1))).unwrap();
        assert_eq!(text.lines().count(), SOURCE.lines().count() + 2);
    }
}

#[test]
fn second_run_is_served_entirely_from_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache.jsonl");

    let first_tool = Arc::new(ModelTool {
        calls: AtomicUsize::new(0),
    });
    let first = explorer(&cache_path, Arc::clone(&first_tool))
        .run(&mut RandomSearch::new(5, 2, 11))
        .unwrap();
    assert_eq!(first_tool.calls.load(Ordering::SeqCst), 10);

    let second_tool = Arc::new(ModelTool {
        calls: AtomicUsize::new(0),
    });
    let second = explorer(&cache_path, Arc::clone(&second_tool))
        .run(&mut RandomSearch::new(5, 2, 11))
        .unwrap();

    assert_eq!(second_tool.calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.cache_hits, 10);
    let configs = |front: &[hlsforge_explorer::Evaluation]| -> Vec<Configuration> {
        front.iter().map(|e| e.config.clone()).collect()
    };
    assert_eq!(configs(&first.front), configs(&second.front));
    assert!((first.estimated_cost_secs - second.estimated_cost_secs).abs() < 1e-9);
}
