//! 弹簧
//!
//! 胡克力沿两端点连线方向：f = (L − L₀)·k·dscale，
//! 阻尼项 −kd·(v₁·d̂ + v₂·d̂)。静止长度 L₀ 在构造时确定，之后不再重新计算。

use glam::DVec3;

use super::config::DISTANCE_EPSILON;
use super::particle::Particle;

/// 单根弹簧对某个端点的作用力
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringForce {
    /// 作用力
    pub force: DVec3,
    /// 长度是否被钳制到 DISTANCE_EPSILON
    pub clamped: bool,
}

/// 弹簧
#[derive(Clone, Debug)]
pub struct Spring {
    /// 起始质点索引
    pub(crate) m1: usize,
    /// 末端质点索引
    pub(crate) m2: usize,
    /// 刚度
    pub k: f64,
    /// 阻尼
    pub kd: f64,
    /// 弹簧力缩放
    pub distance_scale: f64,
    /// 静止长度（构造时两质点的距离）
    rest_length: f64,
}

impl Spring {
    pub(crate) fn new(
        m1: usize,
        m2: usize,
        particles: &[Particle],
        k: f64,
        kd: f64,
        distance_scale: f64,
    ) -> Self {
        let rest_length = (particles[m1].center - particles[m2].center).length();
        Self {
            m1,
            m2,
            k,
            kd,
            distance_scale,
            rest_length,
        }
    }

    #[inline]
    pub fn endpoints(&self) -> (usize, usize) {
        (self.m1, self.m2)
    }

    #[inline]
    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    /// 计算弹簧对指定端点的作用力
    ///
    /// 指定质点不是端点时返回 None。
    pub fn force_on(&self, particle: usize, particles: &[Particle]) -> Option<SpringForce> {
        let sign = if particle == self.m1 {
            1.0
        } else if particle == self.m2 {
            -1.0
        } else {
            return None;
        };

        let a = &particles[self.m1];
        let b = &particles[self.m2];

        let raw_distance = (a.center - b.center).length();
        let clamped = raw_distance < DISTANCE_EPSILON;
        let distance = raw_distance.max(DISTANCE_EPSILON);

        let spring_amount = (distance - self.rest_length) * self.k * self.distance_scale;

        // 收缩/伸长速度用于阻尼
        let dir = (b.center - a.center) / distance;
        let s1 = a.velocity.dot(dir);
        let s2 = b.velocity.dot(dir);
        let damping_amount = -self.kd * (s1 + s2);

        Some(SpringForce {
            force: (sign * spring_amount + damping_amount) * dir,
            clamped,
        })
    }
}
