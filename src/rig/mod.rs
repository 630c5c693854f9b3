//! 辅助骨骼（抖动骨骼）驱动
//!
//! 把骨架 FK、质点弹簧模拟和刚体拟合串成每帧流程，输出可直接送入蒙皮的变换。

mod config;
mod helper_bones;

pub use config::HelperRigConfig;
pub use helper_bones::{HelperRig, RigPose};
