//! 辅助骨骼驱动配置

use glam::DVec3;

use crate::physics::{SimulationConfig, SpringParams};

/// 辅助骨骼驱动配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct HelperRigConfig {
    // ========== 质点 / 弹簧 ==========
    /// 自由质点质量，默认 1.0
    pub mass: f64,
    /// 弹簧刚度，默认 300.0
    pub stiffness: f64,
    /// 弹簧阻尼，默认 50.0
    pub damping: f64,
    /// 质点速度缩放，取 [0, 1] 让运动更慢，默认 0.4
    pub mass_dscale: f64,
    /// 弹簧力缩放，增大让抖动更明显，默认 1.0
    pub spring_dscale: f64,

    // ========== 时间 ==========
    /// 每帧时间步长，默认 1/24
    pub dt: f64,

    // ========== 模式 ==========
    /// true: 末端锚点 + 零长度弹簧；false: 起点固定 + 整骨弹簧
    pub point_spring: bool,
    /// 是否把模拟后的骨骼段缩放回静止长度，默认 false
    pub fixed_scale: bool,

    // ========== 拟合权重 ==========
    /// 末端对应点权重（起点权重为 1），默认 4.0
    pub tip_weight: f64,
    /// 扭转参考点权重，默认 0.05
    pub twist_weight: f64,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for HelperRigConfig {
    fn default() -> Self {
        Self {
            mass: 1.0,
            stiffness: 300.0,
            damping: 50.0,
            mass_dscale: 0.4,
            spring_dscale: 1.0,
            dt: 1.0 / 24.0,
            point_spring: true,
            fixed_scale: false,
            tip_weight: 4.0,
            twist_weight: 0.05,
            debug_log: false,
        }
    }
}

impl HelperRigConfig {
    /// 对应的质点弹簧系统配置（无重力）
    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            dt: self.dt,
            mass_dscale: self.mass_dscale,
            gravity: DVec3::ZERO,
            max_velocity: None,
            debug_log: self.debug_log,
        }
    }

    pub fn spring_params(&self) -> SpringParams {
        SpringParams::new(self.stiffness, self.damping, self.spring_dscale)
    }
}
