//! 集成测试共享工具
#![allow(dead_code)]

use elisa_sdk::ProtocolConfig;

/// 8 块板的一抗加样演示协议
pub const DEMO: &str = include_str!("../../../../demos/primary_antibody_8_plates.toml");

pub fn demo() -> ProtocolConfig {
    ProtocolConfig::from_toml_str(DEMO).expect("demo protocol must load")
}

/// 行优先的前 `count` 个 96 孔板孔位，TOML 数组元素形式
pub fn wells(count: usize) -> String {
    (0..count)
        .map(|i| format!("\"{}{}\"", (b'A' + (i / 12) as u8) as char, i % 12 + 1))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 单板、单分组、Eppendorf 管源的协议
///
/// `tubes` 为 `(id, 装载量, 死体积)`，按顺序组成一个轮换池。
pub fn tube_protocol(
    tubes: &[(&str, f64, f64)],
    policy: &str,
    consolidate: bool,
    targets: usize,
    volume: f64,
    safety: &str,
) -> ProtocolConfig {
    let mut toml = format!(
        r#"
[pipette]
name = "p300_single_gen2"
max_volume = 300.0

[batching]
batch_capacity = 200.0
safety_volume = {safety}
"#
    );
    for (id, loaded, dead) in tubes {
        toml.push_str(&format!(
            r#"
[[vessels]]
id = "{id}"
initial_volume = {loaded:.1}
model = {{ kind = "eppendorf", capacity = 2000.0, dead_volume = {dead:.1} }}
"#
        ));
    }
    let ids = tubes
        .iter()
        .map(|(id, _, _)| format!("\"{id}\""))
        .collect::<Vec<_>>()
        .join(", ");
    toml.push_str(&format!(
        r#"
[[pools]]
name = "reagent"
vessels = [{ids}]
consolidate = {consolidate}
policy = {policy}

[layout]
plates = 1

[[layout.groups]]
name = "reagent"
sources = ["reagent"]
volume = {{ kind = "fixed", volume = {volume:.1} }}
pattern = {{ kind = "fan_out", wells = [{wells}] }}
"#,
        wells = wells(targets)
    ));
    ProtocolConfig::from_toml_str(&toml).expect("generated protocol must load")
}

pub const THRESHOLD: &str = r#"{ kind = "threshold" }"#;
pub const AUTO_SAFETY: &str = r#"{ kind = "auto" }"#;
pub const NO_SAFETY: &str = r#"{ kind = "fixed", volume = 0.0 }"#;
