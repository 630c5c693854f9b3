//! 骨骼集合
//!
//! 骨骼以插入顺序扁平存储，`idx` 始终等于骨骼在存储中的位置。
//! 父索引总是小于子索引：插入只会追加，删除会压缩并重排索引，但保持相对顺序。

use glam::DVec3;

use crate::error::{ensure_finite, JiggleError, Result};

use super::bone_link::Bone;

/// 骨骼树
#[derive(Clone, Debug)]
pub struct Skeleton {
    /// 静止姿态骨骼（扁平存储）
    pub(crate) bones: Vec<Bone>,
    /// 运动学树边 (parent_idx, bone_idx)，每次结构变化后重建
    kintree: Vec<(usize, usize)>,
    /// 是否输出调试日志
    debug_log: bool,
}

impl Skeleton {
    /// 创建骨骼树，隐式根骨骼从世界原点指向 `root_vec`
    pub fn new(root_vec: DVec3) -> Self {
        Self {
            bones: vec![Bone::new_root(root_vec)],
            kintree: Vec::new(),
            debug_log: false,
        }
    }

    /// 开关调试日志（结构编辑时的警告）
    pub fn with_debug_log(mut self, debug_log: bool) -> Self {
        self.debug_log = debug_log;
        self
    }

    #[inline]
    pub fn set_debug_log(&mut self, debug_log: bool) {
        self.debug_log = debug_log;
    }

    #[inline]
    pub fn debug_log(&self) -> bool {
        self.debug_log
    }

    /// 从关节位置和运动学树边构建骨骼树
    ///
    /// 根骨骼终点为 `joint_locations[0]`，每条边 (parent, bone) 插入一个
    /// 终点为 `joint_locations[bone]` 的骨骼。边必须引用已插入的父骨骼。
    pub fn from_joints(joint_locations: &[DVec3], kintree: &[(usize, usize)]) -> Result<Self> {
        let root = joint_locations
            .first()
            .copied()
            .ok_or_else(|| JiggleError::InvalidArgument("joint list is empty".to_string()))?;

        let mut skeleton = Self::new(root);
        for &(parent_idx, joint_idx) in kintree {
            let endpoint = joint_locations
                .get(joint_idx)
                .copied()
                .ok_or_else(|| JiggleError::index("joint", joint_idx, joint_locations.len()))?;
            skeleton.insert_bone(endpoint, parent_idx, 0.0, None)?;
        }

        Ok(skeleton)
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// 获取骨骼
    pub fn bone(&self, idx: usize) -> Result<&Bone> {
        let count = self.bones.len();
        self.bones.get(idx).ok_or(JiggleError::index("bone", idx, count))
    }

    /// 获取可变骨骼
    pub fn bone_mut(&mut self, idx: usize) -> Result<&mut Bone> {
        let count = self.bones.len();
        self.bones.get_mut(idx).ok_or(JiggleError::index("bone", idx, count))
    }

    /// 运动学树边 (parent_idx, bone_idx)
    #[inline]
    pub fn kintree(&self) -> &[(usize, usize)] {
        &self.kintree
    }

    // ========================================
    // 结构编辑
    // ========================================

    /// 插入骨骼，返回新骨骼索引
    ///
    /// 起点选择：
    /// - `startpoint` 给定时直接使用
    /// - 否则起点为父骨骼终点；`offset_ratio` 非零时整条骨骼沿父骨骼向其起点
    ///   平移 `offset_ratio` 倍父骨骼长度（1.0 = 父骨骼起点，0.0 = 父骨骼终点）
    pub fn insert_bone(
        &mut self,
        endpoint: DVec3,
        parent_idx: usize,
        offset_ratio: f64,
        startpoint: Option<DVec3>,
    ) -> Result<usize> {
        if parent_idx >= self.bones.len() {
            return Err(JiggleError::index("bone", parent_idx, self.bones.len()));
        }
        ensure_finite("endpoint", &[endpoint])?;
        if let Some(start) = startpoint {
            ensure_finite("startpoint", &[start])?;
        }
        if !(0.0..=1.0).contains(&offset_ratio) {
            return Err(JiggleError::InvalidArgument(format!(
                "offset_ratio must be in [0, 1], got {}",
                offset_ratio
            )));
        }

        let idx = self.bones.len();
        let mut bone = Bone::new_child(idx, endpoint, &self.bones[parent_idx]);

        match startpoint {
            Some(start) => bone.set_start_location(start),
            None if offset_ratio > 0.0 => {
                let parent = &self.bones[parent_idx];
                let shift = (parent.start_location - parent.end_location) * offset_ratio;
                bone.translate(shift, true, false);
            }
            None => {}
        }

        if bone.length() < 1e-12 && self.debug_log {
            log::warn!("骨骼 {} 静止长度为零", idx);
        }

        self.bones.push(bone);
        self.bones[parent_idx].children.push(idx);
        self.rebuild_kintree();

        debug_assert_eq!(self.bones[idx].idx, idx);
        Ok(idx)
    }

    /// 批量插入骨骼（用于挂载辅助骨骼）
    pub fn insert_bones(
        &mut self,
        endpoints: &[DVec3],
        parents: &[usize],
        offset_ratio: f64,
        startpoints: Option<&[DVec3]>,
    ) -> Result<Vec<usize>> {
        crate::error::ensure_len("parents", endpoints.len(), parents.len())?;
        if let Some(starts) = startpoints {
            crate::error::ensure_len("startpoints", endpoints.len(), starts.len())?;
        }

        let mut indices = Vec::with_capacity(endpoints.len());
        for (i, (&endpoint, &parent)) in endpoints.iter().zip(parents).enumerate() {
            let start = startpoints.map(|s| s[i]);
            indices.push(self.insert_bone(endpoint, parent, offset_ratio, start)?);
        }
        Ok(indices)
    }

    /// 删除骨骼，子骨骼改挂到被删骨骼的父骨骼上
    ///
    /// 删除后存储被压缩，后续骨骼的索引减一。根骨骼不能删除。
    pub fn remove_bone(&mut self, bone_idx: usize) -> Result<()> {
        let count = self.bones.len();
        let removed = self
            .bones
            .get(bone_idx)
            .ok_or(JiggleError::index("bone", bone_idx, count))?;

        let Some(new_parent) = removed.parent else {
            if self.debug_log {
                log::warn!("不能删除根骨骼");
            }
            return Err(JiggleError::InvalidArgument("cannot remove the root bone".to_string()));
        };

        // 子骨骼改挂
        for child in removed.children.clone() {
            self.bones[child].parent = Some(new_parent);
        }
        self.bones.remove(bone_idx);

        // 压缩索引
        let remap = |i: usize| if i > bone_idx { i - 1 } else { i };
        for (pos, bone) in self.bones.iter_mut().enumerate() {
            bone.idx = pos;
            bone.parent = bone.parent.map(remap);
        }
        self.rebuild_children();
        self.rebuild_kintree();
        Ok(())
    }

    fn rebuild_children(&mut self) {
        for bone in &mut self.bones {
            bone.children.clear();
        }
        for i in 0..self.bones.len() {
            if let Some(p) = self.bones[i].parent {
                self.bones[p].children.push(i);
            }
        }
    }

    fn rebuild_kintree(&mut self) {
        self.kintree = self
            .bones
            .iter()
            .filter_map(|b| b.parent.map(|p| (p, b.idx)))
            .collect();
    }

    // ========================================
    // 静止姿态查询
    // ========================================

    /// 静止姿态端点列表，每根骨骼两个点（起点、终点）
    ///
    /// `indices` 为 None 时返回全部骨骼；`exclude_root` 跳过根骨骼。
    pub fn get_rest_bone_locations(
        &self,
        exclude_root: bool,
        indices: Option<&[usize]>,
    ) -> Result<Vec<DVec3>> {
        let all: Vec<usize>;
        let indices = match indices {
            Some(i) => i,
            None => {
                all = (0..self.bones.len()).collect();
                &all
            }
        };

        let mut points = Vec::with_capacity(indices.len() * 2);
        for &i in indices {
            let bone = self.bone(i)?;
            if exclude_root && bone.is_root() {
                continue;
            }
            points.push(bone.start_location);
            points.push(bone.end_location);
        }
        Ok(points)
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new(DVec3::new(0.0, 0.0, 1.0))
    }
}
