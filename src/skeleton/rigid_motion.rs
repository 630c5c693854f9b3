//! 加权最优刚体运动（Kabsch）
//!
//! 给定两组对应点 P、Q 和非负权重 W，求使 Σ wᵢ‖R·pᵢ + t − qᵢ‖² 最小的
//! 真旋转 R（det = +1）和平移 t。用作轻量级 IK：从骨骼静止线段和模拟线段
//! 反求骨骼的刚体变换，结果可以像 FK 变换一样直接用于蒙皮。
//!
//! 退化输入（共线或重合点，例如只有两个端点的骨骼线段）会使协方差矩阵秩亏，
//! 此时绕退化轴的旋转不唯一。`solve` 仍返回确定性的结果并通过
//! `RigidMotion::is_degenerate` 标记；`solve_strict` 则直接报错。

use glam::{DMat3, DMat4, DQuat, DVec3};
use nalgebra::Matrix3;

use crate::error::{ensure_finite, ensure_len, JiggleError, Result};

/// 判定奇异值为零的相对阈值
const RANK_TOLERANCE: f64 = 1e-9;

/// 刚体运动 x → R·x + t
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidMotion {
    /// 旋转（单位四元数）
    pub rotation: DQuat,
    /// 平移
    pub translation: DVec3,
    /// 加权协方差矩阵的奇异值（降序）
    pub singular_values: [f64; 3],
}

impl RigidMotion {
    /// 3x3 旋转矩阵
    #[inline]
    pub fn rotation_matrix(&self) -> DMat3 {
        DMat3::from_quat(self.rotation)
    }

    /// 4x4 齐次矩阵
    #[inline]
    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rotation, self.translation)
    }

    #[inline]
    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.rotation * p + self.translation
    }

    /// 协方差矩阵的数值秩
    pub fn rank(&self, tolerance: f64) -> usize {
        let scale = self.singular_values[0].max(f64::MIN_POSITIVE);
        self.singular_values
            .iter()
            .filter(|&&s| s > tolerance * scale)
            .count()
    }

    /// 协方差秩小于 2 时旋转不唯一
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.singular_values[0] <= f64::MIN_POSITIVE || self.rank(RANK_TOLERANCE) < 2
    }
}

/// 刚体运动求解器
#[derive(Clone, Copy, Debug, Default)]
pub struct RigidMotionSolver {
    /// 是否输出调试日志
    pub debug_log: bool,
}

impl RigidMotionSolver {
    pub fn new(debug_log: bool) -> Self {
        Self { debug_log }
    }

    /// 求解最优刚体运动（允许退化输入）
    pub fn solve(&self, p: &[DVec3], q: &[DVec3], w: &[f64]) -> Result<RigidMotion> {
        ensure_len("Q", p.len(), q.len())?;
        ensure_len("W", p.len(), w.len())?;
        if p.is_empty() {
            return Err(JiggleError::InvalidArgument("point sets are empty".to_string()));
        }
        ensure_finite("P", p)?;
        ensure_finite("Q", q)?;
        if let Some(i) = w.iter().position(|&wi| !wi.is_finite() || wi < 0.0) {
            return Err(JiggleError::InvalidArgument(format!(
                "weight {} must be finite and non-negative, got {}",
                i, w[i]
            )));
        }
        let total_weight: f64 = w.iter().sum();
        if total_weight <= 0.0 {
            return Err(JiggleError::InvalidArgument(
                "total weight must be positive".to_string(),
            ));
        }

        // 第一步：加权质心
        let p_centroid = weighted_centroid(p, w, total_weight);
        let q_centroid = weighted_centroid(q, w, total_weight);

        // 第二步：加权协方差 S = Xᵀ·diag(W)·Y
        let mut s = Matrix3::<f64>::zeros();
        for ((pi, qi), &wi) in p.iter().zip(q).zip(w) {
            let x = to_na(*pi - p_centroid);
            let y = to_na(*qi - q_centroid);
            s += wi * x * y.transpose();
        }

        // 第三步：SVD，S = U·Σ·Vᵀ
        let svd = s.svd(true, true);
        let u = svd
            .u
            .ok_or_else(|| JiggleError::NumericalInstability("SVD did not produce U".to_string()))?;
        let v_t = svd
            .v_t
            .ok_or_else(|| JiggleError::NumericalInstability("SVD did not produce Vᵀ".to_string()))?;
        let v = v_t.transpose();

        // 第四步：反射修正 R = V·diag(1, 1, det(V·Uᵀ))·Uᵀ
        let det_vu = (v * u.transpose()).determinant();
        let mut correction = Matrix3::<f64>::identity();
        correction[(2, 2)] = det_vu.signum();
        let r = v * correction * u.transpose();

        let rotation_matrix = DMat3::from_cols_slice(r.as_slice());
        let rotation = DQuat::from_mat3(&rotation_matrix).normalize();

        // 第五步：t = Q̄ − R·P̄
        let translation = q_centroid - rotation_matrix * p_centroid;

        let mut singular_values = [
            svd.singular_values[0],
            svd.singular_values[1],
            svd.singular_values[2],
        ];
        singular_values.sort_by(|a, b| b.total_cmp(a));

        let motion = RigidMotion {
            rotation,
            translation,
            singular_values,
        };

        if self.debug_log && motion.is_degenerate() {
            log::debug!(
                "刚体拟合协方差秩亏: 奇异值 {:?}，旋转不唯一",
                motion.singular_values
            );
        }

        Ok(motion)
    }

    /// 求解最优刚体运动，秩亏时报错
    pub fn solve_strict(&self, p: &[DVec3], q: &[DVec3], w: &[f64]) -> Result<RigidMotion> {
        let motion = self.solve(p, q, w)?;
        if motion.is_degenerate() {
            return Err(JiggleError::NumericalInstability(format!(
                "rank-deficient covariance, singular values {:?}",
                motion.singular_values
            )));
        }
        Ok(motion)
    }
}

/// 加权质心
fn weighted_centroid(points: &[DVec3], weights: &[f64], total_weight: f64) -> DVec3 {
    let sum: DVec3 = points
        .iter()
        .zip(weights)
        .map(|(&p, &w)| p * w)
        .sum();
    sum / total_weight
}

#[inline]
fn to_na(v: DVec3) -> nalgebra::Vector3<f64> {
    nalgebra::Vector3::new(v.x, v.y, v.z)
}
