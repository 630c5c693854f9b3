//! 错误类型
//!
//! 结构性错误（形状、索引、参数）立即返回给调用方，不做静默修正。
//! 数值边界情况（近零距离）在局部钳制，通过 `StepReport` 和日志暴露。

use glam::DVec3;
use thiserror::Error;

/// 引擎错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JiggleError {
    /// 数组维度与声明的骨骼/顶点数量不一致
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// 出错的输入
        context: &'static str,
        /// 期望长度
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 骨骼/质点索引越界
    #[error("invalid {kind} index {index} (count {count})")]
    InvalidIndex {
        /// 索引种类（bone / particle / spring）
        kind: &'static str,
        /// 非法索引
        index: usize,
        /// 当前元素数量
        count: usize,
    },

    /// 参数超出定义域
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 零长度几何参与了假定非零长度的计算
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// 刚体拟合中协方差秩亏或 SVD 失败
    #[error("numerical instability: {0}")]
    NumericalInstability(String),
}

/// 引擎结果类型
pub type Result<T> = std::result::Result<T, JiggleError>;

impl JiggleError {
    #[inline]
    pub(crate) fn shape(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { context, expected, actual }
    }

    #[inline]
    pub(crate) fn index(kind: &'static str, index: usize, count: usize) -> Self {
        Self::InvalidIndex { kind, index, count }
    }
}

/// 检查长度是否一致
#[inline]
pub(crate) fn ensure_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(JiggleError::shape(context, expected, actual));
    }
    Ok(())
}

/// 检查点列是否全部有限，出错时给出第一个非法下标
#[inline]
pub(crate) fn ensure_finite(context: &'static str, points: &[DVec3]) -> Result<()> {
    if let Some(i) = points.iter().position(|p| !p.is_finite()) {
        return Err(JiggleError::InvalidArgument(format!(
            "{}[{}] is not finite: {}",
            context, i, points[i]
        )));
    }
    Ok(())
}
