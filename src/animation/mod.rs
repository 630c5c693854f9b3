//! 姿态序列

mod pose_track;

pub use pose_track::{lerp_pose, PoseTrack};
