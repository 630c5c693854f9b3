//! 骨骼节点
//!
//! Bone 是骨骼系统的核心单元。每个 Bone 是一条有向线段（起点 → 终点），
//! 通过父索引挂在扁平存储的骨骼树上。

use bitflags::bitflags;
use glam::{DQuat, DVec3};

use super::euler_to_quat;

// ============================================================================
// 骨骼标志
// ============================================================================

bitflags! {
    /// 骨骼标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// 可见（根骨骼是不可见的虚拟骨骼）
        const VISIBLE = 1 << 0;
        /// 由质点弹簧模拟驱动的辅助骨骼
        const SIMULATED = 1 << 1;
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
///
/// 设计原则：
/// - 静态数据：静止姿态端点、父子关系、标志
/// - 缓存数据：相对旋转/平移，仅用于编辑和展示，FK 每次都从 θ 重新计算，不读取它们
#[derive(Clone, Debug)]
pub struct Bone {
    // ========================================
    // 静态数据
    // ========================================

    /// 骨骼索引（等于在扁平存储中的位置）
    pub(crate) idx: usize,

    /// 父骨骼索引（根骨骼为 None）
    pub(crate) parent: Option<usize>,

    /// 子骨骼索引（非拥有的反向引用）
    pub(crate) children: Vec<usize>,

    /// 静止姿态起点
    pub start_location: DVec3,

    /// 静止姿态终点
    pub end_location: DVec3,

    /// 骨骼标志
    pub flags: BoneFlags,

    // ========================================
    // 缓存数据（仅供参考）
    // ========================================

    /// 累积的相对旋转
    pub rotation: DQuat,

    /// 累积的相对平移
    pub translation: DVec3,
}

impl Bone {
    /// 创建根骨骼：从世界原点指向 `end_location`，不可见
    pub fn new_root(end_location: DVec3) -> Self {
        Self {
            idx: 0,
            parent: None,
            children: Vec::new(),
            start_location: DVec3::ZERO,
            end_location,
            flags: BoneFlags::empty(),
            rotation: DQuat::IDENTITY,
            translation: DVec3::ZERO,
        }
    }

    /// 创建子骨骼，默认起点为父骨骼终点
    pub fn new_child(idx: usize, end_location: DVec3, parent: &Bone) -> Self {
        Self {
            idx,
            parent: Some(parent.idx),
            children: Vec::new(),
            start_location: parent.end_location,
            end_location,
            flags: BoneFlags::VISIBLE,
            rotation: DQuat::IDENTITY,
            translation: DVec3::ZERO,
        }
    }

    // ========================================
    // 访问器
    // ========================================

    /// 骨骼索引
    #[inline]
    pub fn idx(&self) -> usize {
        self.idx
    }

    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        self.parent
    }

    /// 子骨骼索引
    #[inline]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// 是否为根骨骼
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.flags.contains(BoneFlags::VISIBLE)
    }

    #[inline]
    pub fn is_simulated(&self) -> bool {
        self.flags.contains(BoneFlags::SIMULATED)
    }

    #[inline]
    pub fn set_simulated(&mut self, simulated: bool) {
        self.flags.set(BoneFlags::SIMULATED, simulated);
    }

    /// 骨骼向量（终点 - 起点）
    #[inline]
    pub fn vector(&self) -> DVec3 {
        self.end_location - self.start_location
    }

    /// 静止长度
    #[inline]
    pub fn length(&self) -> f64 {
        self.vector().length()
    }

    // ========================================
    // 静止姿态编辑
    // ========================================

    /// 设置起点（不改变终点）
    #[inline]
    pub fn set_start_location(&mut self, start_location: DVec3) {
        self.start_location = start_location;
    }

    /// 平移骨骼线段
    ///
    /// `override_rest` 为 true 时改写静止端点；否则只累积相对平移（姿态模式）。
    /// `keep_translation` 仅在改写静止端点时生效，决定是否同时累积相对平移。
    /// 返回平移后的 (起点, 终点)。
    pub fn translate(
        &mut self,
        offset: DVec3,
        override_rest: bool,
        keep_translation: bool,
    ) -> (DVec3, DVec3) {
        let start = self.start_location + offset;
        let end = self.end_location + offset;

        if override_rest {
            self.start_location = start;
            self.end_location = end;
            if keep_translation {
                self.translation += offset;
            }
        } else {
            self.translation += offset;
        }

        (start, end)
    }

    /// 绕起点旋转骨骼
    ///
    /// 新旋转左乘到缓存旋转上（先旧后新）。`override_rest` 为 true 时改写终点；
    /// 此时若 `keep_rotation` 为 false，则缓存旋转被重置。返回旋转后的终点。
    pub fn rotate(
        &mut self,
        angles: DVec3,
        degrees: bool,
        override_rest: bool,
        keep_rotation: bool,
    ) -> DVec3 {
        let r = euler_to_quat(angles, degrees);
        self.rotation = (r * self.rotation).normalize();

        let tip = r * self.vector() + self.start_location;

        if override_rest {
            self.end_location = tip;
            if !keep_rotation {
                self.rotation = DQuat::IDENTITY;
            }
        }

        tip
    }
}
