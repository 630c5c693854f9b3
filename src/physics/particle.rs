//! 质点

use glam::DVec3;

use super::config::FIXED_MASS_THRESHOLD;

/// 质点
///
/// 质量为 0 表示固定质点：不受力、不积分，但仍可被直接移动。
#[derive(Clone, Debug)]
pub struct Particle {
    /// 质量
    pub mass: f64,
    /// 位置
    pub center: DVec3,
    /// 速度
    pub velocity: DVec3,
    /// 速度缩放（位置阻尼）
    pub dscale: f64,
    /// 是否受重力
    pub gravity: bool,
    /// 朝向（仅用于展示）
    pub orientation: DVec3,
    /// 关联弹簧索引（非拥有）
    pub(crate) springs: Vec<usize>,
}

impl Particle {
    pub fn new(center: DVec3, mass: f64, dscale: f64, gravity: bool) -> Self {
        Self {
            mass,
            center,
            velocity: DVec3::ZERO,
            dscale,
            gravity,
            orientation: DVec3::Y,
            springs: Vec::new(),
        }
    }

    /// 是否为固定质点
    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.mass < FIXED_MASS_THRESHOLD
    }

    /// 关联弹簧索引
    #[inline]
    pub fn springs(&self) -> &[usize] {
        &self.springs
    }
}
