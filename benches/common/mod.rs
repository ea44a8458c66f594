use std::path::Path;

use test_support::load_cases;

/// Benchmark workloads: every program case with `bench.enabled`, labelled by
/// its first tag.
pub fn workloads() -> Vec<(String, String)> {
    let cases = load_cases(Path::new("tests/programs")).expect("load cases");
    cases
        .into_iter()
        .filter(|case| case.spec.bench.enabled)
        .map(|case| {
            let label = case
                .spec
                .bench
                .tags
                .first()
                .cloned()
                .unwrap_or_else(|| case.name.clone());
            let source = case.read_program().expect("read program");
            (label, source)
        })
        .collect()
}
