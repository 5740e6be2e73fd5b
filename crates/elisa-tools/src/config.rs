//! # 协议配置
//!
//! 单一配置记录驱动整个引擎：移液器、批处理阈值、容器表、轮换池、布局。
//! 不同板数、不同移液器、不同布局的协议只是配置不同，控制流只有一份。
//!
//! # 示例
//!
//! ```toml
//! [pipette]
//! name = "p300_single_gen2"
//! max_volume = 300.0
//!
//! [batching]
//! batch_capacity = 200.0
//! safety_volume = { kind = "auto" }
//!
//! [[vessels]]
//! id = "A1"
//! initial_volume = 2000.0
//! model = { kind = "eppendorf", capacity = 2000.0 }
//!
//! [[pools]]
//! name = "primary-ab"
//! vessels = ["A1"]
//!
//! [layout]
//! plates = 1
//!
//! [[layout.groups]]
//! name = "samples"
//! sources = ["primary-ab"]
//! volume = { kind = "fixed", volume = 25.0 }
//! pattern = { kind = "fan_out", wells = ["A1", "A2", "A3"] }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::Context;
use elisa_labware::constants::*;
use elisa_labware::{
    FlowRate, LabwareError, Microliters, Millimeters, PipetteSpec, RateProfile, SafetyVolume,
    Vessel, VesselId, VesselShape,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::{GroupConfig, LayoutConfig};

/// 协议配置记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub pipette: PipetteSpec,
    pub batching: BatchingConfig,
    pub vessels: Vec<VesselConfig>,
    pub pools: Vec<PoolConfig>,
    pub layout: LayoutConfig,
}

/// 批处理参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// 每次吸液可分配的最大体积（不含安全体积，单通道）
    pub batch_capacity: Microliters,
    #[serde(default)]
    pub safety_disposition: SafetyDisposition,
    #[serde(default)]
    pub tip_policy: TipPolicy,
    #[serde(default)]
    pub safety_volume: SafetyVolume,
}

/// 运行结束时安全体积的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyDisposition {
    /// 吹回当前源容器并记入账本
    #[default]
    ReturnToSource,
    /// 吹到废液槽
    Discard,
}

/// 吸头使用策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipPolicy {
    /// 每个连续运行换一次吸头
    #[default]
    PerRun,
    /// 整个协议共用一个吸头
    PerProtocol,
}

/// 容器表条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselConfig {
    pub id: VesselId,
    /// 装载体积（物理体积，含不可吸取部分）
    pub initial_volume: Microliters,
    pub model: VesselModel,
}

/// 容器型号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VesselModel {
    /// Eppendorf Safe-Lock 管，几何参数取自命名常量
    Eppendorf {
        capacity: Microliters,
        #[serde(default)]
        dead_volume: Microliters,
        #[serde(default)]
        rate_profile: RateProfile,
    },
    /// 矩形储液槽（等效半径建模）
    Reservoir {
        capacity: Microliters,
        depth: Millimeters,
        #[serde(default)]
        dead_volume: Microliters,
    },
    /// 完整手工描述
    Custom {
        shape: VesselShape,
        radius: Millimeters,
        capacity: Microliters,
        #[serde(default)]
        unusable_offset: Microliters,
        #[serde(default)]
        dead_volume: Microliters,
        #[serde(default = "default_immersion")]
        immersion_depth: Millimeters,
        floor_clearance: Millimeters,
        fallback_clearance: Millimeters,
        #[serde(default = "default_fallback_rate")]
        fallback_rate: FlowRate,
        #[serde(default)]
        rate_profile: RateProfile,
    },
}

fn default_immersion() -> Millimeters {
    Millimeters(DEFAULT_IMMERSION_DEPTH_MM)
}

fn default_fallback_rate() -> FlowRate {
    FlowRate(DEFAULT_FALLBACK_RATE)
}

impl VesselConfig {
    /// 构造几何描述并校验
    pub fn to_vessel(&self) -> Result<Vessel, LabwareError> {
        let vessel = match &self.model {
            VesselModel::Eppendorf {
                capacity,
                dead_volume,
                rate_profile,
            } => {
                let mut tube = Vessel::eppendorf_tube(self.id.as_str(), *capacity);
                tube.dead_volume = *dead_volume;
                tube.rate_profile = *rate_profile;
                tube
            },
            VesselModel::Reservoir {
                capacity,
                depth,
                dead_volume,
            } => Vessel::reservoir(self.id.as_str(), *capacity, *depth, *dead_volume)?,
            VesselModel::Custom {
                shape,
                radius,
                capacity,
                unusable_offset,
                dead_volume,
                immersion_depth,
                floor_clearance,
                fallback_clearance,
                fallback_rate,
                rate_profile,
            } => Vessel {
                id: self.id.clone(),
                shape: *shape,
                radius: *radius,
                capacity: *capacity,
                unusable_offset: *unusable_offset,
                dead_volume: *dead_volume,
                immersion_depth: *immersion_depth,
                floor_clearance: *floor_clearance,
                fallback_clearance: *fallback_clearance,
                fallback_rate: *fallback_rate,
                rate_profile: *rate_profile,
            },
        };
        vessel.validate()?;
        Ok(vessel)
    }
}

/// 轮换池
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    /// 候选容器（按使用顺序）
    pub vessels: Vec<VesselId>,
    /// 切换时把旧容器剩余液体合并到新容器
    #[serde(default)]
    pub consolidate: bool,
    #[serde(default)]
    pub policy: RotationPolicy,
}

/// 轮换策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RotationPolicy {
    /// 每次吸液前按剩余体积判断
    #[default]
    Threshold,
    /// 每完成 N 个运行块切换到下一个容器
    Scheduled { switch_after_blocks: usize },
}

impl ProtocolConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ProtocolConfig =
            toml::from_str(content).context("Failed to parse protocol configuration")?;
        config
            .validate()
            .context("Protocol configuration is invalid")?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read protocol file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load protocol file {}", path.display()))
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string(self).context("Failed to serialize protocol configuration")
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write protocol file {}", path.display()))
    }

    /// 查找容器配置
    pub fn vessel(&self, id: &VesselId) -> Option<&VesselConfig> {
        self.vessels.iter().find(|v| &v.id == id)
    }

    /// 查找轮换池
    pub fn pool(&self, name: &str) -> Option<&PoolConfig> {
        self.pools.iter().find(|p| p.name == name)
    }

    /// 分组生效的批容量
    pub fn batch_capacity_for(&self, group: &GroupConfig) -> Microliters {
        group.batch_capacity.unwrap_or(self.batching.batch_capacity)
    }

    /// 分组生效的安全体积
    pub fn safety_volume_for(&self, group: &GroupConfig) -> Microliters {
        self.batching
            .safety_volume
            .resolve(&self.pipette, self.batch_capacity_for(group))
    }

    /// 校验配置
    ///
    /// 引擎在规划阶段还会做体积层面的检查（欠量、容量、源耗尽），
    /// 这里只检查结构和数值范围。
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipette.validate()?;

        // 容器表
        let mut vessel_ids = HashSet::new();
        for entry in &self.vessels {
            if !vessel_ids.insert(&entry.id) {
                return Err(ConfigError::DuplicateVessel(entry.id.clone()));
            }
            let vessel = entry.to_vessel()?;
            if entry.initial_volume.0 < 0.0 || entry.initial_volume > vessel.capacity {
                return Err(ConfigError::Overfilled {
                    vessel: entry.id.clone(),
                    loaded: entry.initial_volume,
                    capacity: vessel.capacity,
                });
            }
        }

        // 轮换池
        let mut pool_names = HashSet::new();
        for pool in &self.pools {
            if !pool_names.insert(pool.name.as_str()) {
                return Err(ConfigError::DuplicatePool(pool.name.clone()));
            }
            if pool.vessels.is_empty() {
                return Err(ConfigError::EmptyPool(pool.name.clone()));
            }
            if let Some(unknown) = pool.vessels.iter().find(|v| !vessel_ids.contains(v)) {
                return Err(ConfigError::UnknownVessel {
                    pool: pool.name.clone(),
                    vessel: unknown.clone(),
                });
            }
            if let RotationPolicy::Scheduled {
                switch_after_blocks: 0,
            } = pool.policy
            {
                return Err(ConfigError::InvalidPolicy {
                    pool: pool.name.clone(),
                    reason: "switch_after_blocks must be at least 1".to_string(),
                });
            }
        }

        // 布局
        let layout = &self.layout;
        if layout.plates == 0 {
            return Err(ConfigError::NoPlates);
        }
        let mut group_names = HashSet::new();
        for group in &layout.groups {
            if !group_names.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup(group.name.clone()));
            }
            if group.sources.len() != 1 && group.sources.len() != layout.plates {
                return Err(ConfigError::SourceCount {
                    group: group.name.clone(),
                    actual: group.sources.len(),
                    plates: layout.plates,
                });
            }
            if let Some(unknown) = group.sources.iter().find(|s| !pool_names.contains(s.as_str()))
            {
                return Err(ConfigError::UnknownPool {
                    group: group.name.clone(),
                    pool: unknown.clone(),
                });
            }
            group.volume.validate(&group.name)?;
            if let Some(mix) = &group.mix_after {
                mix.validate(&group.name, self.pipette.max_volume)?;
            }
            group.pattern.validate(&group.name)?;

            let capacity = self.batch_capacity_for(group);
            let safety = self.safety_volume_for(group);
            if capacity.0 <= 0.0 || (capacity + safety).0 > self.pipette.max_volume.0 + VOLUME_EPSILON_UL
            {
                return Err(ConfigError::CapacityExceeded {
                    capacity,
                    safety,
                    max_volume: self.pipette.max_volume,
                });
            }
        }

        for carve in &layout.carve_outs {
            for name in [&carve.from_group, &carve.into_group] {
                if !group_names.contains(name.as_str()) {
                    return Err(ConfigError::UnknownGroup(name.clone()));
                }
            }
            if let Some(plate) = carve
                .plates
                .iter()
                .find(|p| **p == 0 || **p > layout.plates)
            {
                return Err(ConfigError::InvalidPattern {
                    group: carve.from_group.clone(),
                    reason: format!(
                        "carve-out plate {} outside 1..={}",
                        plate, layout.plates
                    ),
                });
            }
        }

        Ok(())
    }
}
