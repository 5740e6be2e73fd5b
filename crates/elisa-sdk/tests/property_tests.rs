//! 几何、速率、守恒与规划的属性测试
//!
//! 使用 proptest 验证对任意输入都成立的不变量。

mod common;

use elisa_driver::RecordingDriver;
use elisa_sdk::engine::{DispensePlanner, geometry};
use elisa_sdk::prelude::*;
use elisa_sdk::labware::RateProfile;
use proptest::prelude::*;

fn tube(dead_volume: f64, immersion: f64) -> Vessel {
    let mut tube = Vessel::eppendorf_tube("T1", Microliters(2000.0));
    tube.dead_volume = Microliters(dead_volume);
    tube.immersion_depth = Millimeters(immersion);
    tube
}

fn reservoir_protocol(targets: usize, per_target: f64, capacity: f64, channels: u32) -> ProtocolConfig {
    let toml = format!(
        r#"
[pipette]
name = "p300"
max_volume = 300.0
channels = {channels}

[batching]
batch_capacity = {capacity:.3}

[[vessels]]
id = "R1"
initial_volume = 200000.0
model = {{ kind = "reservoir", capacity = 200000.0, depth = 40.0 }}

[[pools]]
name = "buffer"
vessels = ["R1"]

[layout]
plates = 1

[[layout.groups]]
name = "buffer"
sources = ["buffer"]
volume = {{ kind = "fixed", volume = {per_target:.3} }}
pattern = {{ kind = "fan_out", wells = [{wells}] }}
"#,
        wells = common::wells(targets)
    );
    ProtocolConfig::from_toml_str(&toml).unwrap()
}

proptest! {
    /// 圆柱段内剩余体积减少时底部间隙单调不增
    #[test]
    fn clearance_monotonic_in_remaining(
        dead in 0.0..300.0f64,
        a in 0.0..1500.0f64,
        b in 0.0..1500.0f64,
    ) {
        let tube = tube(dead, 6.0);
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low = low.max(dead + 1.0);
        let high = high.max(low);
        let initial = Microliters(1500.0);
        let c_low = geometry::clearance(&tube, Microliters(low), initial);
        let c_high = geometry::clearance(&tube, Microliters(high), initial);
        prop_assert!(c_high.depth >= c_low.depth);
    }

    /// 死体积及以下恒为回退间隙
    #[test]
    fn clearance_fallback_below_dead_volume(dead in 0.0..500.0f64, fraction in 0.0..=1.0f64) {
        let tube = tube(dead, 6.0);
        let remaining = Microliters(dead * fraction);
        let c = geometry::clearance(&tube, remaining, Microliters(1500.0));
        prop_assert!(c.fallback);
        prop_assert_eq!(c.depth, tube.fallback_clearance);
        prop_assert_eq!(c.rate, tube.fallback_rate);
    }

    /// 任何剩余体积与浸没深度下都不低于最小底部间隙
    #[test]
    fn clearance_never_below_floor(
        dead in 0.0..300.0f64,
        immersion in 0.0..40.0f64,
        remaining in 0.0..1500.0f64,
    ) {
        let tube = tube(dead, immersion);
        let c = geometry::clearance(&tube, Microliters(remaining), Microliters(1500.0));
        prop_assert!(c.depth >= tube.floor_clearance);
    }

    /// 比例速率限制在 [floor, 1]
    #[test]
    fn rate_stays_within_floor_and_nominal(
        floor in 0.2..=1.0f64,
        initial in 1.0..15000.0f64,
        fraction in 0.0..=1.0f64,
    ) {
        let rate = geometry::aspiration_rate(
            RateProfile::Proportional { floor },
            Microliters(initial * fraction),
            Microliters(initial),
        );
        prop_assert!(rate.0 >= floor - 1e-12);
        prop_assert!(rate.0 <= 1.0 + 1e-12);
    }

    /// 分配总量 = 吸液总量 − 安全体积（吹回）
    #[test]
    fn dispensed_volume_is_conserved(
        targets in 1usize..=96,
        per_target in 5.0..150.0f64,
        capacity in 150.0..250.0f64,
        channels in prop::sample::select(vec![1u32, 8]),
    ) {
        let config = reservoir_protocol(targets, per_target, capacity, channels);
        let mut driver = RecordingDriver::new().with_tip_capacity(Microliters(300.0));
        let report = run_protocol(&config, &mut driver).unwrap();

        prop_assert_eq!(report.dispenses, targets);
        prop_assert!(report.conservation_error() < 1e-6);
        let expected = config.layout.groups[0].volume;
        let elisa_sdk::tools::TargetVolume::Fixed { volume } = expected else {
            unreachable!()
        };
        let dispensed = volume * (targets as f64) * f64::from(channels);
        prop_assert!((report.dispensed - dispensed).0.abs() < 1e-6);

        let remaining = report.final_volumes[&VesselId::new("R1")];
        prop_assert!((remaining.0 - (200000.0 - dispensed.0)).abs() < 1e-6);
    }

    /// 相同布局两次规划得到相同的有序目标
    #[test]
    fn planning_is_idempotent(
        plates in 1usize..=4,
        span in 1u8..=4,
        repeats in 1u8..=3,
        extra_stride in 0u8..=4,
        rows in prop::sample::select(vec!["A", "A-D", "A-H", "B-G"]),
    ) {
        let columns = (1..=span).map(|c| c.to_string()).collect::<Vec<_>>().join(", ");
        let toml = format!(
            r#"
[pipette]
name = "p300"
max_volume = 300.0

[batching]
batch_capacity = 200.0

[[vessels]]
id = "R1"
initial_volume = 200000.0
model = {{ kind = "reservoir", capacity = 200000.0, depth = 40.0 }}

[[pools]]
name = "buffer"
vessels = ["R1"]

[layout]
plates = {plates}

[[layout.groups]]
name = "buffer"
sources = ["buffer"]
volume = {{ kind = "fixed", volume = 10.0 }}
pattern = {{ kind = "block", rows = "{rows}", columns = [{columns}], repeats = {repeats}, column_stride = {stride} }}
"#,
            stride = span + extra_stride
        );
        let config = ProtocolConfig::from_toml_str(&toml).unwrap();
        let first = DispensePlanner::new(&config).plan().unwrap();
        let second = DispensePlanner::new(&config).plan().unwrap();
        prop_assert_eq!(&first, &second);

        let row_count = elisa_sdk::labware::well::parse_rows(rows).unwrap().len();
        prop_assert_eq!(
            first.len(),
            plates * row_count * usize::from(span) * usize::from(repeats)
        );
    }
}
