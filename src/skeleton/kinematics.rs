//! 正向运动学
//!
//! 每根骨骼的绝对变换只计算一次：先递归计算父骨骼，再组合自身。
//! 变换关系：
//! - 根骨骼：Q = q_rel，T = r - Q·r + t_rel
//! - 子骨骼：Q = Q_parent · q_rel，T = T_parent - Q·r + Q_parent·(r + t_rel)
//!
//! 其中 r 是骨骼静止起点。子骨骼公式保证起点（关节）在父骨骼坐标系和
//! 自身坐标系下变换结果一致。

use glam::{DMat4, DQuat, DVec3};

use crate::error::{ensure_len, JiggleError, Result};

use super::bone_set::Skeleton;
use super::euler_to_quat;

/// 摆姿结果
#[derive(Clone, Debug, Default)]
pub struct PosedBones {
    /// 摆姿后的端点，每根骨骼两个点（起点、终点）
    pub locations: Vec<DVec3>,
    /// 每根骨骼的绝对旋转
    pub rotations: Vec<DQuat>,
    /// 每根骨骼的绝对平移
    pub translations: Vec<DVec3>,
}

impl Skeleton {
    /// 计算所有骨骼的绝对旋转和平移
    ///
    /// `theta` 每根骨骼一个欧拉角（外旋 xyz），`trans` 每根骨骼一个相对平移。
    pub fn get_absolute_transformations(
        &self,
        theta: &[DVec3],
        trans: &[DVec3],
        degrees: bool,
    ) -> Result<(Vec<DQuat>, Vec<DVec3>)> {
        let n_bones = self.bone_count();
        ensure_len("theta", n_bones, theta.len())?;
        ensure_len("trans", n_bones, trans.len())?;

        if let Some(i) = theta.iter().position(|t| !t.is_finite()) {
            return Err(JiggleError::InvalidArgument(format!(
                "theta[{}] is not finite",
                i
            )));
        }
        if let Some(i) = trans.iter().position(|t| !t.is_finite()) {
            return Err(JiggleError::InvalidArgument(format!(
                "trans[{}] is not finite",
                i
            )));
        }

        let relative_rot: Vec<DQuat> = theta.iter().map(|&t| euler_to_quat(t, degrees)).collect();

        let mut state = FkState {
            computed: vec![false; n_bones],
            abs_rot: vec![DQuat::IDENTITY; n_bones],
            abs_trans: vec![DVec3::ZERO; n_bones],
        };

        for b in 0..n_bones {
            self.compute_bone(b, &relative_rot, trans, &mut state);
        }

        Ok((state.abs_rot, state.abs_trans))
    }

    /// 递归计算单根骨骼的绝对变换（已计算则直接返回）
    fn compute_bone(
        &self,
        b: usize,
        relative_rot: &[DQuat],
        relative_trans: &[DVec3],
        state: &mut FkState,
    ) {
        if state.computed[b] {
            return;
        }

        let bone = &self.bones[b];
        let r = bone.start_location;

        match bone.parent {
            None => {
                let q = relative_rot[b];
                state.abs_rot[b] = q;
                state.abs_trans[b] = r - q * r + relative_trans[b];
            }
            Some(p) => {
                self.compute_bone(p, relative_rot, relative_trans, state);

                let parent_rot = state.abs_rot[p];
                let q = (parent_rot * relative_rot[b]).normalize();
                state.abs_rot[b] = q;
                state.abs_trans[b] =
                    state.abs_trans[p] - q * r + parent_rot * (r + relative_trans[b]);
            }
        }

        state.computed[b] = true;
    }

    /// 用给定的绝对变换计算骨骼端点
    pub fn compute_bone_locations(
        &self,
        abs_rotations: &[DQuat],
        abs_translations: &[DVec3],
    ) -> Result<Vec<DVec3>> {
        let n_bones = self.bone_count();
        ensure_len("abs_rotations", n_bones, abs_rotations.len())?;
        ensure_len("abs_translations", n_bones, abs_translations.len())?;

        let mut locations = Vec::with_capacity(n_bones * 2);
        for (i, bone) in self.bones.iter().enumerate() {
            let m = DMat4::from_rotation_translation(abs_rotations[i], abs_translations[i]);
            locations.push(m.transform_point3(bone.start_location));
            locations.push(m.transform_point3(bone.end_location));
        }
        Ok(locations)
    }

    /// 摆姿并返回端点和绝对变换
    ///
    /// `trans` 为 None 时相对平移全为零。`exclude_root` 只去掉输出中根骨骼的两个端点，
    /// 不影响绝对变换的计算。
    pub fn pose_bones_with_transforms(
        &self,
        theta: &[DVec3],
        trans: Option<&[DVec3]>,
        degrees: bool,
        exclude_root: bool,
    ) -> Result<PosedBones> {
        let zeros;
        let trans = match trans {
            Some(t) => t,
            None => {
                zeros = vec![DVec3::ZERO; self.bone_count()];
                &zeros
            }
        };

        let (rotations, translations) = self.get_absolute_transformations(theta, trans, degrees)?;
        let mut locations = self.compute_bone_locations(&rotations, &translations)?;

        if exclude_root {
            locations.drain(..2);
        }

        Ok(PosedBones {
            locations,
            rotations,
            translations,
        })
    }

    /// 摆姿，只返回端点
    pub fn pose_bones(
        &self,
        theta: &[DVec3],
        trans: Option<&[DVec3]>,
        degrees: bool,
        exclude_root: bool,
    ) -> Result<Vec<DVec3>> {
        self.pose_bones_with_transforms(theta, trans, degrees, exclude_root)
            .map(|posed| posed.locations)
    }
}

/// FK 记忆化状态
struct FkState {
    computed: Vec<bool>,
    abs_rot: Vec<DQuat>,
    abs_trans: Vec<DVec3>,
}
