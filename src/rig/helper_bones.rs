//! 辅助骨骼驱动器
//!
//! 每帧流程：FK → 移动锚点质点 → simulate → 逐辅助骨骼加权 Kabsch → 混合变换。
//! 非辅助骨骼保持 FK 结果；辅助骨骼的绝对变换被拟合结果替换。

use glam::{DQuat, DVec3};

use crate::error::{JiggleError, Result};
use crate::physics::{MassSpringSystem, StepReport};
use crate::skeleton::{RigidMotionSolver, Skeleton};

use super::config::HelperRigConfig;

/// 辅助骨骼静止长度下限
const MIN_HELPER_LENGTH: f64 = 1e-6;

/// 单根辅助骨骼的模拟数据
#[derive(Clone, Debug)]
struct HelperBone {
    /// 骨骼索引
    bone: usize,
    /// 固定锚点质点
    anchor: usize,
    /// 自由质点（模拟后的骨骼末端）
    free: usize,
    /// 静止起点
    rest_start: DVec3,
    /// 静止终点（零长度骨骼为钳制后的终点）
    rest_end: DVec3,
    /// 扭转参考点（静止姿态）
    rest_twist: DVec3,
}

impl HelperBone {
    #[inline]
    fn rest_length(&self) -> f64 {
        (self.rest_end - self.rest_start).length()
    }
}

/// 单帧结果
#[derive(Clone, Debug)]
pub struct RigPose {
    /// 骨骼端点，每根骨骼两个点（含根骨骼）
    pub points: Vec<DVec3>,
    /// 混合后的绝对旋转
    pub rotations: Vec<DQuat>,
    /// 混合后的绝对平移
    pub translations: Vec<DVec3>,
    /// 本帧模拟报告
    pub report: StepReport,
}

/// 辅助骨骼驱动器
///
/// 持有骨架、质点弹簧系统和刚体求解器，只通过它们的公开接口交互。
pub struct HelperRig {
    skeleton: Skeleton,
    helpers: Vec<HelperBone>,
    system: MassSpringSystem,
    solver: RigidMotionSolver,
    config: HelperRigConfig,
}

impl HelperRig {
    /// 创建驱动器
    ///
    /// `helper_indices` 必须是互不相同的非根骨骼。零长度骨骼沿父骨骼方向钳制到
    /// MIN_HELPER_LENGTH 参与模拟和拟合。
    pub fn new(
        mut skeleton: Skeleton,
        helper_indices: &[usize],
        config: HelperRigConfig,
    ) -> Result<Self> {
        skeleton.set_debug_log(config.debug_log);
        let mut system = MassSpringSystem::new(config.simulation_config());
        let mut helpers = Vec::with_capacity(helper_indices.len());

        for (i, &b) in helper_indices.iter().enumerate() {
            if helper_indices[..i].contains(&b) {
                return Err(JiggleError::InvalidArgument(format!(
                    "helper bone {} listed twice",
                    b
                )));
            }

            let bone = skeleton.bone(b)?;
            if bone.is_root() {
                return Err(JiggleError::InvalidArgument(
                    "root bone cannot be a helper bone".to_string(),
                ));
            }
            let rest_start = bone.start_location;
            let (rest_end, length) = if bone.length() < MIN_HELPER_LENGTH {
                // 零长度骨骼沿父骨骼方向钳制到最小长度
                let dir = bone
                    .parent_id()
                    .and_then(|p| skeleton.bone(p).ok())
                    .map(|p| p.vector().normalize_or_zero())
                    .filter(|d| *d != DVec3::ZERO)
                    .unwrap_or(DVec3::Y);
                if config.debug_log {
                    log::warn!(
                        "[HelperRig] 辅助骨骼 {} 静止长度为零，沿 {} 钳制到 {}",
                        b,
                        dir,
                        MIN_HELPER_LENGTH
                    );
                }
                (rest_start + dir * MIN_HELPER_LENGTH, MIN_HELPER_LENGTH)
            } else {
                (bone.end_location, bone.length())
            };

            let anchor_location = if config.point_spring { rest_end } else { rest_start };
            let anchor = system.add_mass(anchor_location, config.mass, false)?;
            system.fix_mass(anchor)?;
            let free = system.add_mass(rest_end, config.mass, false)?;
            system.connect_masses(anchor, free, config.spring_params())?;

            let bone_dir = (rest_end - rest_start) / length;
            let rest_twist = rest_start + bone_dir.any_orthonormal_vector() * length;

            skeleton.bone_mut(b)?.set_simulated(true);
            helpers.push(HelperBone {
                bone: b,
                anchor,
                free,
                rest_start,
                rest_end,
                rest_twist,
            });
        }

        if config.debug_log {
            log::info!(
                "[HelperRig] 创建: {} 根辅助骨骼, point_spring={}, fixed_scale={}",
                helpers.len(),
                config.point_spring,
                config.fixed_scale
            );
        }

        Ok(Self {
            skeleton,
            helpers,
            system,
            solver: RigidMotionSolver::new(config.debug_log),
            config,
        })
    }

    #[inline]
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    #[inline]
    pub fn system(&self) -> &MassSpringSystem {
        &self.system
    }

    #[inline]
    pub fn config(&self) -> &HelperRigConfig {
        &self.config
    }

    pub fn helper_indices(&self) -> Vec<usize> {
        self.helpers.iter().map(|h| h.bone).collect()
    }

    /// 推进一帧
    pub fn step(
        &mut self,
        theta: &[DVec3],
        trans: Option<&[DVec3]>,
        degrees: bool,
    ) -> Result<RigPose> {
        // 1. 纯刚性 FK
        let posed = self
            .skeleton
            .pose_bones_with_transforms(theta, trans, degrees, false)?;
        let mut rotations = posed.rotations;
        let mut translations = posed.translations;
        let rigid = posed.locations;

        // 2. 锚点跟随刚性姿态
        let rigid_tips: Vec<DVec3> = self
            .helpers
            .iter()
            .map(|h| rotations[h.bone] * h.rest_end + translations[h.bone])
            .collect();
        for (h, &tip) in self.helpers.iter().zip(&rigid_tips) {
            let anchor_location = if self.config.point_spring {
                tip
            } else {
                rigid[2 * h.bone]
            };
            self.system.update_mass_location(h.anchor, anchor_location)?;
        }

        // 3. 模拟
        let report = self.system.simulate(Some(self.config.dt))?;

        // 4. 拟合辅助骨骼的刚体变换
        let weights = [1.0, self.config.tip_weight, self.config.twist_weight];
        for (h, &rigid_tip) in self.helpers.iter().zip(&rigid_tips) {
            let b = h.bone;
            let rigid_start = rigid[2 * b];
            let mut sim_end = self.system.particle(h.free)?.center;

            if self.config.fixed_scale {
                let dir = (sim_end - rigid_start).normalize_or_zero();
                sim_end = if dir == DVec3::ZERO {
                    rigid_tip
                } else {
                    rigid_start + dir * h.rest_length()
                };
            }

            let twist_target = rotations[b] * h.rest_twist + translations[b];
            let fit = self.solver.solve(
                &[h.rest_start, h.rest_end, h.rest_twist],
                &[rigid_start, sim_end, twist_target],
                &weights,
            )?;
            if fit.is_degenerate() && self.config.debug_log {
                log::warn!(
                    "[HelperRig] 辅助骨骼 {} 拟合退化，奇异值 {:?}",
                    b,
                    fit.singular_values
                );
            }

            rotations[b] = fit.rotation;
            translations[b] = fit.translation;
        }

        // 5. 混合后的端点
        let points = self.skeleton.compute_bone_locations(&rotations, &translations)?;

        if self.config.debug_log {
            log::debug!(
                "[HelperRig] 积分 {} 质点, 钳制 {} 弹簧",
                report.integrated,
                report.clamped_springs
            );
        }

        Ok(RigPose {
            points,
            rotations,
            translations,
            report,
        })
    }

    /// 推进一帧，只返回端点
    pub fn pose_bones(
        &mut self,
        theta: &[DVec3],
        trans: Option<&[DVec3]>,
        degrees: bool,
        exclude_root: bool,
    ) -> Result<Vec<DVec3>> {
        let mut points = self.step(theta, trans, degrees)?.points;
        if exclude_root {
            points.drain(..2);
        }
        Ok(points)
    }

    /// 质点回到静止位置，速度清零
    pub fn reset(&mut self) -> Result<()> {
        for h in &self.helpers {
            let anchor_location = if self.config.point_spring { h.rest_end } else { h.rest_start };
            self.system.update_mass_location(h.anchor, anchor_location)?;
            self.system.update_mass_location(h.free, h.rest_end)?;
            self.system.set_velocity(h.anchor, DVec3::ZERO)?;
            self.system.set_velocity(h.free, DVec3::ZERO)?;
        }
        Ok(())
    }
}
