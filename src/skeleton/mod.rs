//! 骨骼系统
//!
//! 核心设计思想：
//! - Bone: 单个骨骼节点，保存静止姿态的两个端点
//! - Skeleton: 扁平存储的骨骼树（父索引 + 子索引列表），负责正向运动学
//! - RigidMotionSolver: 加权 Kabsch 刚体拟合，作为轻量级 IK 使用

mod bone_link;
mod bone_set;
mod kinematics;
mod rigid_motion;

pub use bone_link::{Bone, BoneFlags};
pub use bone_set::Skeleton;
pub use kinematics::PosedBones;
pub use rigid_motion::{RigidMotion, RigidMotionSolver};

use glam::{DMat4, DQuat, DVec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼刚体变换数据（x → R·x + t）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: DVec3,
    pub rotation: DQuat,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        }
    }
}

impl BoneTransform {
    #[inline]
    pub fn new(rotation: DQuat, translation: DVec3) -> Self {
        Self { translation, rotation }
    }

    /// 转换为 4x4 齐次矩阵
    #[inline]
    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// 从矩阵分解（忽略缩放）
    #[inline]
    pub fn from_matrix(m: DMat4) -> Self {
        let (_, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation }
    }

    /// 变换一个点
    #[inline]
    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.rotation * p + self.translation
    }
}

/// 欧拉角 → 四元数
///
/// 角度按外旋 x-y-z 顺序解释，即 R = Rz · Ry · Rx。
#[inline]
pub fn euler_to_quat(angles: DVec3, degrees: bool) -> DQuat {
    let a = if degrees {
        DVec3::new(angles.x.to_radians(), angles.y.to_radians(), angles.z.to_radians())
    } else {
        angles
    };
    DQuat::from_rotation_z(a.z) * DQuat::from_rotation_y(a.y) * DQuat::from_rotation_x(a.x)
}
