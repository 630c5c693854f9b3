//! 线性混合蒙皮（LBS）
//!
//! 顶点位置 = Σ_b w[v,b] · (M_b · [rest_v; 1])。权重不要求逐行归一化。

mod skinner;

pub use skinner::{Skinner, SkinningConfig};
