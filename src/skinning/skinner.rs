//! 蒙皮器

use glam::{DMat4, DQuat, DVec3};
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::{ensure_finite, ensure_len, JiggleError, Result};

/// 权重行和低于此值时无法归一化
const MIN_WEIGHT_SUM: f64 = 1e-12;

/// 蒙皮配置
#[derive(Debug, Clone)]
pub struct SkinningConfig {
    /// 是否逐顶点归一化权重，默认 false
    pub normalize_weights: bool,
    /// 是否按顶点并行计算，默认 true
    pub parallel: bool,
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SkinningConfig {
    fn default() -> Self {
        Self {
            normalize_weights: false,
            parallel: true,
            debug_log: false,
        }
    }
}

/// 线性混合蒙皮器
#[derive(Debug, Clone, Default)]
pub struct Skinner {
    config: SkinningConfig,
}

impl Skinner {
    pub fn new(config: SkinningConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &SkinningConfig {
        &self.config
    }

    /// 用每根骨骼的绝对旋转和平移蒙皮
    ///
    /// `weights` 形状为 (顶点数 × 骨骼数)。
    pub fn skin(
        &self,
        rest_vertices: &[DVec3],
        weights: &DMatrix<f64>,
        rotations: &[DQuat],
        translations: &[DVec3],
    ) -> Result<Vec<DVec3>> {
        ensure_len("translations", rotations.len(), translations.len())?;
        let matrices: Vec<DMat4> = rotations
            .iter()
            .zip(translations)
            .map(|(&r, &t)| DMat4::from_rotation_translation(r, t))
            .collect();
        self.skin_with_matrices(rest_vertices, weights, &matrices)
    }

    /// 用每根骨骼的 4×4 变换矩阵蒙皮
    pub fn skin_with_matrices(
        &self,
        rest_vertices: &[DVec3],
        weights: &DMatrix<f64>,
        matrices: &[DMat4],
    ) -> Result<Vec<DVec3>> {
        ensure_len("weights rows", rest_vertices.len(), weights.nrows())?;
        ensure_len("weights columns", matrices.len(), weights.ncols())?;
        ensure_finite("rest_vertices", rest_vertices)?;
        if let Some(b) = matrices.iter().position(|m| !m.is_finite()) {
            return Err(JiggleError::InvalidArgument(format!(
                "matrices[{}] is not finite",
                b
            )));
        }

        let scales = if self.config.normalize_weights {
            Some(Self::row_scales(weights)?)
        } else {
            None
        };

        let skin_vertex = |(v, rest): (usize, &DVec3)| -> DVec3 {
            let mut posed = DVec3::ZERO;
            for (b, m) in matrices.iter().enumerate() {
                let w = weights[(v, b)];
                if w == 0.0 {
                    continue;
                }
                posed += w * m.transform_point3(*rest);
            }
            match &scales {
                Some(s) => posed * s[v],
                None => posed,
            }
        };

        let posed: Vec<DVec3> = if self.config.parallel {
            rest_vertices.par_iter().enumerate().map(skin_vertex).collect()
        } else {
            rest_vertices.iter().enumerate().map(skin_vertex).collect()
        };

        if self.config.debug_log {
            log::debug!(
                "[Skinning] {} 顶点 × {} 骨骼, normalize={}, parallel={}",
                rest_vertices.len(),
                matrices.len(),
                self.config.normalize_weights,
                self.config.parallel
            );
        }

        Ok(posed)
    }

    /// 每行权重和的倒数
    fn row_scales(weights: &DMatrix<f64>) -> Result<Vec<f64>> {
        weights
            .row_iter()
            .enumerate()
            .map(|(v, row)| {
                let sum = row.sum();
                if sum.abs() < MIN_WEIGHT_SUM {
                    Err(JiggleError::InvalidArgument(format!(
                        "weights of vertex {} sum to {}, cannot normalize",
                        v, sum
                    )))
                } else {
                    Ok(1.0 / sum)
                }
            })
            .collect()
    }

    /// 让骨骼端点列表自身跟随骨骼变形的权重矩阵
    ///
    /// 形状 (2·n_bones × n_bones)，第 2b、2b+1 行只绑定骨骼 b。
    pub fn bone_endpoint_weights(n_bones: usize) -> DMatrix<f64> {
        DMatrix::from_fn(2 * n_bones, n_bones, |r, c| if r / 2 == c { 1.0 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial() -> Skinner {
        Skinner::new(SkinningConfig {
            parallel: false,
            ..Default::default()
        })
    }

    fn sample_vertices() -> Vec<DVec3> {
        vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.5, -0.2),
            DVec3::new(-0.3, 2.0, 0.7),
            DVec3::new(0.4, -1.1, 0.9),
        ]
    }

    #[test]
    fn test_one_hot_identity_reproduces_rest() {
        let rest = sample_vertices();
        let weights = DMatrix::from_fn(4, 2, |r, c| if r % 2 == c { 1.0 } else { 0.0 });
        let rots = [DQuat::IDENTITY; 2];
        let trans = [DVec3::ZERO; 2];
        let posed = Skinner::default().skin(&rest, &weights, &rots, &trans).unwrap();
        assert_eq!(posed, rest);
    }

    #[test]
    fn test_shared_rigid_transform() {
        let rest = sample_vertices();
        // 每行和为 1，但分布不均
        let weights = DMatrix::from_row_slice(4, 3, &[
            0.2, 0.3, 0.5,
            1.0, 0.0, 0.0,
            0.6, 0.4, 0.0,
            0.1, 0.1, 0.8,
        ]);
        let q = DQuat::from_axis_angle(DVec3::new(1.0, 2.0, -1.0).normalize(), 0.7);
        let t = DVec3::new(0.5, -1.0, 2.0);
        let posed = serial().skin(&rest, &weights, &[q; 3], &[t; 3]).unwrap();
        for (p, r) in posed.iter().zip(&rest) {
            assert!((*p - (q * *r + t)).length() < 1e-12);
        }
    }

    #[test]
    fn test_weights_are_not_normalized_by_default() {
        let rest = vec![DVec3::new(1.0, 2.0, 3.0)];
        let weights = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let posed = serial()
            .skin(&rest, &weights, &[DQuat::IDENTITY; 2], &[DVec3::ZERO; 2])
            .unwrap();
        assert!((posed[0] - DVec3::new(2.0, 4.0, 6.0)).length() < 1e-12);
    }

    #[test]
    fn test_normalized_weights() {
        let skinner = Skinner::new(SkinningConfig {
            normalize_weights: true,
            parallel: false,
            debug_log: false,
        });
        let rest = vec![DVec3::new(1.0, 2.0, 3.0)];
        let weights = DMatrix::from_row_slice(1, 2, &[3.0, 1.0]);
        let trans = [DVec3::ZERO, DVec3::new(4.0, 0.0, 0.0)];
        let posed = skinner
            .skin(&rest, &weights, &[DQuat::IDENTITY; 2], &trans)
            .unwrap();
        // 0.75 * p + 0.25 * (p + 4x)
        assert!((posed[0] - DVec3::new(2.0, 2.0, 3.0)).length() < 1e-12);

        let zero_row = DMatrix::from_row_slice(1, 2, &[0.0, 0.0]);
        assert!(matches!(
            skinner.skin(&rest, &zero_row, &[DQuat::IDENTITY; 2], &trans),
            Err(JiggleError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let rest = sample_vertices();
        let skinner = serial();
        let weights = DMatrix::<f64>::zeros(3, 2);
        assert!(matches!(
            skinner.skin(&rest, &weights, &[DQuat::IDENTITY; 2], &[DVec3::ZERO; 2]),
            Err(JiggleError::ShapeMismatch { expected: 4, actual: 3, .. })
        ));
        let weights = DMatrix::<f64>::zeros(4, 2);
        assert!(matches!(
            skinner.skin(&rest, &weights, &[DQuat::IDENTITY; 3], &[DVec3::ZERO; 3]),
            Err(JiggleError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            skinner.skin(&rest, &weights, &[DQuat::IDENTITY; 2], &[DVec3::ZERO; 1]),
            Err(JiggleError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let rest: Vec<DVec3> = (0..257)
            .map(|i| {
                let f = i as f64;
                DVec3::new(f.sin(), (0.3 * f).cos(), 0.01 * f)
            })
            .collect();
        let weights = DMatrix::from_fn(rest.len(), 3, |r, c| ((r + 2 * c) % 5) as f64 * 0.25);
        let rots = [
            DQuat::from_rotation_x(0.3),
            DQuat::from_rotation_y(-1.2),
            DQuat::from_rotation_z(2.0),
        ];
        let trans = [DVec3::X, DVec3::new(0.0, -2.0, 0.5), DVec3::ZERO];

        let a = serial().skin(&rest, &weights, &rots, &trans).unwrap();
        let b = Skinner::default().skin(&rest, &weights, &rots, &trans).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bone_endpoint_weights() {
        let w = Skinner::bone_endpoint_weights(3);
        assert_eq!((w.nrows(), w.ncols()), (6, 3));
        for r in 0..6 {
            assert!((w.row(r).sum() - 1.0).abs() < 1e-12);
            assert_eq!(w[(r, r / 2)], 1.0);
        }
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let skinner = serial();
        let weights = DMatrix::from_element(2, 1, 1.0);
        let rest = vec![DVec3::ZERO, DVec3::new(f64::NAN, 0.0, 0.0)];
        assert!(matches!(
            skinner.skin(&rest, &weights, &[DQuat::IDENTITY], &[DVec3::ZERO]),
            Err(JiggleError::InvalidArgument(msg)) if msg.starts_with("rest_vertices[1]")
        ));

        let rest = vec![DVec3::ZERO, DVec3::X];
        assert!(matches!(
            skinner.skin(&rest, &weights, &[DQuat::IDENTITY], &[DVec3::splat(f64::INFINITY)]),
            Err(JiggleError::InvalidArgument(msg)) if msg.starts_with("matrices[0]")
        ));
    }
}
