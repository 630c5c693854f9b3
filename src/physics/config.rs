//! 质点弹簧配置
//!
//! 所有参数扁平化，默认值即调好的参数。配置通过构造函数注入，不使用全局状态。

use glam::DVec3;

/// 默认弹簧刚度
pub const DEFAULT_STIFFNESS: f64 = 0.5;
/// 默认弹簧阻尼
pub const DEFAULT_DAMPING: f64 = 1.0;
/// 默认质量
pub const DEFAULT_MASS: f64 = 2.5;
/// 默认弹簧力缩放
pub const DEFAULT_SPRING_SCALE: f64 = 1.0;
/// 默认质点速度缩放
pub const DEFAULT_MASS_SCALE: f64 = 1.0;
/// 允许的最大质量（不含）
pub const MAX_ALLOWED_MASS: f64 = 99.0;
/// 质量低于此值的质点视为固定
pub const FIXED_MASS_THRESHOLD: f64 = 1e-12;
/// 弹簧长度钳制下限
pub const DISTANCE_EPSILON: f64 = 1e-6;

/// 模拟配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    // ========== 时间 ==========
    /// 默认时间步长（秒），默认 1/24
    pub dt: f64,

    // ========== 质点 ==========
    /// 新质点的速度缩放（位置阻尼），默认 1.0
    /// 取 [0, 1] 让质点运动更慢
    pub mass_dscale: f64,
    /// 重力加速度，仅对启用重力的质点生效
    pub gravity: DVec3,

    // ========== 速度限制 ==========
    /// 最大速度，None 表示不限制
    pub max_velocity: Option<f64>,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 24.0,
            mass_dscale: DEFAULT_MASS_SCALE,
            gravity: DVec3::new(0.0, -9.81, 0.0),
            max_velocity: None,
            debug_log: false,
        }
    }
}

/// 弹簧参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    /// 刚度 k
    pub stiffness: f64,
    /// 阻尼 kd
    pub damping: f64,
    /// 弹簧力缩放（增大让抖动更明显）
    pub dscale: f64,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            stiffness: DEFAULT_STIFFNESS,
            damping: DEFAULT_DAMPING,
            dscale: DEFAULT_SPRING_SCALE,
        }
    }
}

impl SpringParams {
    pub fn new(stiffness: f64, damping: f64, dscale: f64) -> Self {
        Self { stiffness, damping, dscale }
    }
}
