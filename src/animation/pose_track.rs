//! 姿态轨道
//!
//! 按帧存储每根骨骼的相对欧拉角，帧间线性插值。

use std::collections::BTreeMap;

use glam::DVec3;

use crate::error::{ensure_len, JiggleError, Result};

/// 两个姿态逐骨骼线性插值：(1 − ratio)·a + ratio·b
pub fn lerp_pose(a: &[DVec3], b: &[DVec3], ratio: f64) -> Result<Vec<DVec3>> {
    ensure_len("pose", a.len(), b.len())?;
    Ok(a.iter().zip(b).map(|(&x, &y)| x.lerp(y, ratio)).collect())
}

/// 帧间插值系数
#[inline]
fn coefficient(prev: u32, next: u32, frame_index: u32) -> f64 {
    if next <= prev {
        return 0.0;
    }
    (frame_index.saturating_sub(prev)) as f64 / (next - prev) as f64
}

/// 姿态轨道
#[derive(Debug, Clone)]
pub struct PoseTrack {
    n_bones: usize,
    /// 关键帧映射（帧索引 -> 每骨骼欧拉角）
    keyframes: BTreeMap<u32, Vec<DVec3>>,
}

impl PoseTrack {
    pub fn new(n_bones: usize) -> Self {
        Self {
            n_bones,
            keyframes: BTreeMap::new(),
        }
    }

    /// 每隔 `interval` 帧放置一个姿态
    pub fn from_poses(poses: &[Vec<DVec3>], interval: u32) -> Result<Self> {
        let n_bones = poses.first().map(|p| p.len()).unwrap_or(0);
        if interval == 0 {
            return Err(JiggleError::InvalidArgument(
                "keyframe interval must be positive".to_string(),
            ));
        }
        let mut track = Self::new(n_bones);
        let mut frame = 0u32;
        for pose in poses {
            track.insert_keyframe(frame, pose.clone())?;
            frame = frame.saturating_add(interval);
        }
        Ok(track)
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.n_bones
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// 最大帧索引（空轨道为 0）
    pub fn max_frame_index(&self) -> u32 {
        self.keyframes.keys().next_back().copied().unwrap_or(0)
    }

    /// 插入关键帧，返回被替换的旧姿态
    pub fn insert_keyframe(&mut self, frame_index: u32, pose: Vec<DVec3>) -> Result<Option<Vec<DVec3>>> {
        ensure_len("keyframe pose", self.n_bones, pose.len())?;
        if let Some(i) = pose.iter().position(|a| !a.is_finite()) {
            return Err(JiggleError::InvalidArgument(format!(
                "keyframe {} bone {} is not finite",
                frame_index, i
            )));
        }
        Ok(self.keyframes.insert(frame_index, pose))
    }

    /// 移除关键帧
    pub fn remove_keyframe(&mut self, frame_index: u32) -> Option<Vec<DVec3>> {
        self.keyframes.remove(&frame_index)
    }

    /// 查找精确帧
    pub fn find(&self, frame_index: u32) -> Option<&[DVec3]> {
        self.keyframes.get(&frame_index).map(|p| p.as_slice())
    }

    /// 查找最近的前后关键帧索引
    pub fn search_closest(&self, frame_index: u32) -> (Option<u32>, Option<u32>) {
        let prev = self.keyframes.range(..=frame_index).next_back().map(|(k, _)| *k);
        let next = self
            .keyframes
            .range(frame_index.saturating_add(1)..)
            .next()
            .map(|(k, _)| *k)
            .filter(|&k| k > frame_index);
        (prev, next)
    }

    /// 求值指定帧（首尾之外取端点关键帧，空轨道为零姿态）
    pub fn seek(&self, frame_index: u32) -> Vec<DVec3> {
        if let Some(pose) = self.find(frame_index) {
            return pose.to_vec();
        }

        let (prev, next) = self.search_closest(frame_index);
        match (prev, next) {
            (Some(p), Some(n)) => {
                let coef = coefficient(p, n, frame_index);
                self.keyframes[&p]
                    .iter()
                    .zip(&self.keyframes[&n])
                    .map(|(&a, &b)| a.lerp(b, coef))
                    .collect()
            }
            (Some(p), None) => self.keyframes[&p].clone(),
            (None, Some(n)) => self.keyframes[&n].clone(),
            (None, None) => vec![DVec3::ZERO; self.n_bones],
        }
    }

    /// 精确求值：在 frame_index 和 frame_index + 1 之间按 amount 插值
    pub fn seek_precisely(&self, frame_index: u32, amount: f64) -> Vec<DVec3> {
        let current = self.seek(frame_index);
        if amount <= 0.0 {
            return current;
        }
        let next = self.seek(frame_index.saturating_add(1));
        let amount = amount.min(1.0);
        current
            .iter()
            .zip(&next)
            .map(|(&a, &b)| a.lerp(b, amount))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> PoseTrack {
        let mut t = PoseTrack::new(2);
        t.insert_keyframe(0, vec![DVec3::ZERO, DVec3::ZERO]).unwrap();
        t.insert_keyframe(10, vec![DVec3::new(0.0, 10.0, 40.0), DVec3::X]).unwrap();
        t
    }

    #[test]
    fn test_lerp_pose() {
        let a = [DVec3::ZERO, DVec3::ONE];
        let b = [DVec3::new(2.0, 4.0, 6.0), DVec3::ZERO];
        let mid = lerp_pose(&a, &b, 0.5).unwrap();
        assert!((mid[0] - DVec3::new(1.0, 2.0, 3.0)).length() < 1e-12);
        assert!((mid[1] - DVec3::splat(0.5)).length() < 1e-12);
        assert!(matches!(
            lerp_pose(&a, &b[..1], 0.5),
            Err(JiggleError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_seek_interpolates_between_keyframes() {
        let t = track();
        let pose = t.seek(5);
        assert!((pose[0] - DVec3::new(0.0, 5.0, 20.0)).length() < 1e-12);
        assert!((pose[1] - DVec3::new(0.5, 0.0, 0.0)).length() < 1e-12);
        assert_eq!(t.seek(10), vec![DVec3::new(0.0, 10.0, 40.0), DVec3::X]);
    }

    #[test]
    fn test_seek_clamps_outside_range() {
        let mut t = track();
        assert_eq!(t.seek(100), t.seek(10));
        t.remove_keyframe(0);
        t.insert_keyframe(4, vec![DVec3::Y, DVec3::Y]).unwrap();
        assert_eq!(t.seek(0), vec![DVec3::Y, DVec3::Y]);
        assert_eq!(PoseTrack::new(3).seek(7), vec![DVec3::ZERO; 3]);
    }

    #[test]
    fn test_seek_precisely() {
        let t = track();
        let pose = t.seek_precisely(4, 0.5);
        assert!((pose[0] - DVec3::new(0.0, 4.5, 18.0)).length() < 1e-12);
        assert_eq!(t.seek_precisely(4, 0.0), t.seek(4));
    }

    #[test]
    fn test_search_closest() {
        let t = track();
        assert_eq!(t.search_closest(0), (Some(0), Some(10)));
        assert_eq!(t.search_closest(3), (Some(0), Some(10)));
        assert_eq!(t.search_closest(10), (Some(10), None));
        assert_eq!(t.max_frame_index(), 10);
    }

    #[test]
    fn test_insert_validates_pose() {
        let mut t = PoseTrack::new(2);
        assert!(matches!(
            t.insert_keyframe(0, vec![DVec3::ZERO]),
            Err(JiggleError::ShapeMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            t.insert_keyframe(0, vec![DVec3::ZERO, DVec3::NAN]),
            Err(JiggleError::InvalidArgument(_))
        ));
        assert!(t.is_empty());
        assert_eq!(t.insert_keyframe(0, vec![DVec3::ZERO; 2]).unwrap(), None);
        assert_eq!(
            t.insert_keyframe(0, vec![DVec3::ONE; 2]).unwrap(),
            Some(vec![DVec3::ZERO; 2])
        );
    }

    #[test]
    fn test_from_poses() {
        let poses = vec![vec![DVec3::ZERO], vec![DVec3::X], vec![DVec3::ZERO]];
        let t = PoseTrack::from_poses(&poses, 24).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.max_frame_index(), 48);
        assert!((t.seek(12)[0] - DVec3::new(0.5, 0.0, 0.0)).length() < 1e-12);
        assert!(PoseTrack::from_poses(&poses, 0).is_err());
    }
}
