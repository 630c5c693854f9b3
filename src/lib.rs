//! 抖动骨骼引擎
//!
//! 骨架正向运动学 + 质点弹簧二次运动 + 加权 Kabsch 刚体拟合 + 线性混合蒙皮。
//!
//! 每帧流程：
//! 1. `Skeleton::pose_bones_with_transforms` 得到刚性姿态
//! 2. 把固定质点移动到刚性锚点，`MassSpringSystem::simulate`
//! 3. `RigidMotionSolver::solve` 把模拟后的骨骼段拟合成刚体变换
//! 4. 混合后的变换交给 `Skinner::skin`
//!
//! `rig::HelperRig` 是这一流程的参考实现。

pub mod animation;
pub mod error;
pub mod physics;
pub mod rig;
pub mod skeleton;
pub mod skinning;

pub use error::{JiggleError, Result};
