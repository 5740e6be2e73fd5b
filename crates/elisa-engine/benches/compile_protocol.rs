//! 规划与编译性能基准测试
//!
//! 8 块板、768 个目标孔的完整流程：布局展开、整次运行编译、以及
//! 对 Mock 驱动的完整执行。

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use elisa_driver::RecordingDriver;
use elisa_engine::{DispensePlanner, Orchestrator};
use elisa_tools::ProtocolConfig;

const DEMO: &str = include_str!("../../../demos/primary_antibody_8_plates.toml");

fn demo_config() -> ProtocolConfig {
    ProtocolConfig::from_toml_str(DEMO).unwrap()
}

fn bench_plan(c: &mut Criterion) {
    let config = demo_config();
    c.bench_function("plan_8_plates", |b| {
        b.iter(|| {
            let plan = DispensePlanner::new(black_box(&config)).plan().unwrap();
            black_box(plan.len());
        });
    });
}

fn bench_compile(c: &mut Criterion) {
    let orchestrator = Orchestrator::new(&demo_config()).unwrap();
    c.bench_function("compile_8_plates", |b| {
        b.iter(|| {
            let program = black_box(&orchestrator).compile().unwrap();
            black_box(program.steps().len());
        });
    });
}

fn bench_execute(c: &mut Criterion) {
    let config = demo_config();
    c.bench_function("execute_8_plates_mock", |b| {
        b.iter(|| {
            let mut orchestrator = Orchestrator::new(black_box(&config)).unwrap();
            let mut driver = RecordingDriver::new();
            let report = orchestrator.execute(&mut driver).unwrap();
            black_box(report.dispenses);
        });
    });
}

criterion_group!(benches, bench_plan, bench_compile, bench_execute);
criterion_main!(benches);
