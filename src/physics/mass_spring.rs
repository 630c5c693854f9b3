//! 质点弹簧系统
//!
//! 质点和弹簧都存放在系统自己的扁平数组里，质点只记录关联弹簧的索引。
//! 流程：add_mass / connect_masses → 每帧 [移动固定质点 → simulate]

use glam::DVec3;

use crate::error::{ensure_finite, JiggleError, Result};

use super::config::{SimulationConfig, SpringParams, MAX_ALLOWED_MASS};
use super::particle::Particle;
use super::spring::Spring;

/// 单步模拟报告
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// 本步实际积分的质点数（不含固定质点）
    pub integrated: usize,
    /// 本步长度被钳制的弹簧数
    pub clamped_springs: usize,
}

/// 质点弹簧系统
pub struct MassSpringSystem {
    particles: Vec<Particle>,
    springs: Vec<Spring>,
    /// 连接关系（与 springs 一一对应）
    connections: Vec<(usize, usize)>,
    config: SimulationConfig,
}

impl MassSpringSystem {
    pub fn new(config: SimulationConfig) -> Self {
        if config.debug_log {
            log::info!(
                "[MassSpring] 系统创建: dt={}, mass_dscale={}",
                config.dt,
                config.mass_dscale
            );
        }
        Self {
            particles: Vec::new(),
            springs: Vec::new(),
            connections: Vec::new(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    #[inline]
    pub fn connections(&self) -> &[(usize, usize)] {
        &self.connections
    }

    pub fn particle(&self, idx: usize) -> Result<&Particle> {
        self.particles
            .get(idx)
            .ok_or_else(|| JiggleError::index("particle", idx, self.particles.len()))
    }

    fn particle_mut(&mut self, idx: usize) -> Result<&mut Particle> {
        let count = self.particles.len();
        self.particles
            .get_mut(idx)
            .ok_or_else(|| JiggleError::index("particle", idx, count))
    }

    // ========== 构建 ==========

    /// 添加质点，返回索引
    ///
    /// 质量必须有限、非负且小于 MAX_ALLOWED_MASS。
    pub fn add_mass(&mut self, coordinate: DVec3, mass: f64, gravity: bool) -> Result<usize> {
        if !mass.is_finite() || mass < 0.0 || mass >= MAX_ALLOWED_MASS {
            return Err(JiggleError::InvalidArgument(format!(
                "mass {} must be in [0, {})",
                mass, MAX_ALLOWED_MASS
            )));
        }
        ensure_finite("particle coordinate", &[coordinate])?;

        self.particles
            .push(Particle::new(coordinate, mass, self.config.mass_dscale, gravity));

        if self.config.debug_log {
            log::debug!("[MassSpring] 添加质点 {} @ {}", self.particles.len() - 1, coordinate);
        }
        Ok(self.particles.len() - 1)
    }

    /// 固定质点（质量置 0，速度清零）
    ///
    /// 固定质点的速度仍会进入相邻弹簧的阻尼项，清零后锚点不会把旧速度带给邻居。
    pub fn fix_mass(&mut self, idx: usize) -> Result<()> {
        let debug_log = self.config.debug_log;
        let p = self.particle_mut(idx)?;
        p.mass = 0.0;
        p.velocity = DVec3::ZERO;
        if debug_log {
            log::debug!("[MassSpring] 固定质点 {} @ {}", idx, p.center);
        }
        Ok(())
    }

    /// 用弹簧连接两个质点，返回弹簧索引
    ///
    /// 静止长度取两质点当前距离。
    pub fn connect_masses(&mut self, first: usize, second: usize, params: SpringParams) -> Result<usize> {
        self.particle(first)?;
        self.particle(second)?;
        if first == second {
            return Err(JiggleError::InvalidArgument(format!(
                "cannot connect particle {} to itself",
                first
            )));
        }

        let spring = Spring::new(
            first,
            second,
            &self.particles,
            params.stiffness,
            params.damping,
            params.dscale,
        );
        if spring.rest_length() < super::config::DISTANCE_EPSILON && self.config.debug_log {
            log::warn!(
                "[MassSpring] 弹簧 {}-{} 静止长度接近 0，受力方向将被钳制",
                first,
                second
            );
        }

        let spring_idx = self.springs.len();
        self.springs.push(spring);
        self.connections.push((first, second));
        self.particles[first].springs.push(spring_idx);
        self.particles[second].springs.push(spring_idx);
        Ok(spring_idx)
    }

    // ========== 直接操作 ==========

    /// 平移质点（固定质点同样生效）
    pub fn translate_mass(&mut self, idx: usize, offset: DVec3) -> Result<()> {
        ensure_finite("offset", &[offset])?;
        self.particle_mut(idx)?.center += offset;
        Ok(())
    }

    /// 设置质点位置（固定质点同样生效）
    pub fn update_mass_location(&mut self, idx: usize, location: DVec3) -> Result<()> {
        ensure_finite("location", &[location])?;
        self.particle_mut(idx)?.center = location;
        Ok(())
    }

    pub fn set_velocity(&mut self, idx: usize, velocity: DVec3) -> Result<()> {
        ensure_finite("velocity", &[velocity])?;
        self.particle_mut(idx)?.velocity = velocity;
        Ok(())
    }

    // ========== 查询 ==========

    pub fn get_mass_locations(&self) -> Vec<DVec3> {
        self.particles.iter().map(|p| p.center).collect()
    }

    pub fn get_free_mass_indices(&self) -> Vec<usize> {
        self.particles
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_fixed())
            .map(|(i, _)| i)
            .collect()
    }

    /// 单根弹簧对其某个端点的瞬时作用力
    pub fn spring_force(&self, spring_idx: usize, particle_idx: usize) -> Result<DVec3> {
        let spring = self
            .springs
            .get(spring_idx)
            .ok_or_else(|| JiggleError::index("spring", spring_idx, self.springs.len()))?;
        self.particle(particle_idx)?;
        spring
            .force_on(particle_idx, &self.particles)
            .map(|f| f.force)
            .ok_or_else(|| {
                JiggleError::InvalidArgument(format!(
                    "particle {} is not an endpoint of spring {}",
                    particle_idx, spring_idx
                ))
            })
    }

    // ========== 模拟 ==========

    /// 推进一步
    ///
    /// 按索引顺序逐个更新，后面的质点使用前面质点本步已更新的位置。
    /// `dt` 为 None 时使用配置中的 dt。
    pub fn simulate(&mut self, dt: Option<f64>) -> Result<StepReport> {
        let dt = dt.unwrap_or(self.config.dt);
        if !dt.is_finite() || dt <= 0.0 {
            return Err(JiggleError::InvalidArgument(format!(
                "time step {} must be finite and positive",
                dt
            )));
        }

        let mut report = StepReport::default();
        let mut clamped = vec![false; self.springs.len()];

        for i in 0..self.particles.len() {
            if self.particles[i].is_fixed() {
                continue;
            }

            let mut force = DVec3::ZERO;
            for &s in &self.particles[i].springs {
                if let Some(f) = self.springs[s].force_on(i, &self.particles) {
                    force += f.force;
                    if f.clamped {
                        clamped[s] = true;
                    }
                }
            }

            let p = &mut self.particles[i];
            if p.gravity {
                force += p.mass * self.config.gravity;
            }

            let acc = force / p.mass;
            let velocity = p.velocity + acc * dt;
            let previous = p.center;
            p.center += velocity * dt * p.dscale;
            p.velocity = (p.center - previous) / dt;

            if let Some(max_v) = self.config.max_velocity {
                let speed = p.velocity.length();
                if speed > max_v {
                    p.velocity *= max_v / speed;
                }
            }

            report.integrated += 1;
        }

        report.clamped_springs = clamped.iter().filter(|&&c| c).count();
        if report.clamped_springs > 0 && self.config.debug_log {
            log::warn!(
                "[MassSpring] {} 根弹簧长度接近 0，已钳制到最小距离",
                report.clamped_springs
            );
        }

        Ok(report)
    }
}

impl Default for MassSpringSystem {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_mass_system() -> MassSpringSystem {
        let mut sys = MassSpringSystem::default();
        sys.add_mass(DVec3::ZERO, 1.0, false).unwrap();
        sys.add_mass(DVec3::Y, 1.0, false).unwrap();
        sys.connect_masses(0, 1, SpringParams::new(10.0, 0.5, 1.0)).unwrap();
        sys
    }

    #[test]
    fn test_add_mass_validation() {
        let mut sys = MassSpringSystem::default();
        assert_eq!(sys.add_mass(DVec3::ZERO, 2.5, false).unwrap(), 0);
        assert_eq!(sys.add_mass(DVec3::X, 0.0, false).unwrap(), 1);
        assert!(matches!(
            sys.add_mass(DVec3::ZERO, 99.0, false),
            Err(JiggleError::InvalidArgument(_))
        ));
        assert!(matches!(
            sys.add_mass(DVec3::ZERO, f64::NAN, false),
            Err(JiggleError::InvalidArgument(_))
        ));
        assert!(matches!(
            sys.add_mass(DVec3::ZERO, -1.0, false),
            Err(JiggleError::InvalidArgument(_))
        ));
        assert_eq!(sys.particle_count(), 2);
    }

    #[test]
    fn test_connect_rejects_self_and_bad_index() {
        let mut sys = two_mass_system();
        assert!(matches!(
            sys.connect_masses(1, 1, SpringParams::default()),
            Err(JiggleError::InvalidArgument(_))
        ));
        assert!(matches!(
            sys.connect_masses(0, 7, SpringParams::default()),
            Err(JiggleError::InvalidIndex { index: 7, count: 2, .. })
        ));
        assert_eq!(sys.connections(), &[(0, 1)]);
        assert_eq!(sys.particle(0).unwrap().springs(), &[0]);
        assert_eq!(sys.particle(1).unwrap().springs(), &[0]);
    }

    #[test]
    fn test_spring_force_symmetry() {
        let mut sys = two_mass_system();
        sys.translate_mass(1, DVec3::new(0.3, 0.4, -0.2)).unwrap();

        let f0 = sys.spring_force(0, 0).unwrap();
        let f1 = sys.spring_force(0, 1).unwrap();
        assert!((f0.length() - f1.length()).abs() < 1e-12);
        assert!((f0 + f1).length() < 1e-12);

        let axis = sys.particle(1).unwrap().center - sys.particle(0).unwrap().center;
        assert!(f0.cross(axis).length() < 1e-9);
    }

    #[test]
    fn test_spring_force_non_endpoint() {
        let mut sys = two_mass_system();
        sys.add_mass(DVec3::X, 1.0, false).unwrap();
        assert!(matches!(sys.spring_force(0, 2), Err(JiggleError::InvalidArgument(_))));
        assert!(matches!(sys.spring_force(3, 0), Err(JiggleError::InvalidIndex { .. })));
    }

    #[test]
    fn test_fixed_mass_never_moves_under_simulate() {
        let mut sys = two_mass_system();
        sys.fix_mass(0).unwrap();
        sys.translate_mass(1, DVec3::new(0.0, 2.0, 0.0)).unwrap();

        for _ in 0..50 {
            let report = sys.simulate(None).unwrap();
            assert_eq!(report.integrated, 1);
            assert_eq!(sys.particle(0).unwrap().center, DVec3::ZERO);
        }

        // 外部移动仍然生效
        sys.translate_mass(0, DVec3::X).unwrap();
        assert_eq!(sys.particle(0).unwrap().center, DVec3::X);
        sys.update_mass_location(0, DVec3::new(5.0, 0.0, 0.0)).unwrap();
        assert_eq!(sys.get_mass_locations()[0], DVec3::new(5.0, 0.0, 0.0));
        assert_eq!(sys.get_free_mass_indices(), vec![1]);
    }

    #[test]
    fn test_single_step_integration() {
        let mut sys = MassSpringSystem::new(SimulationConfig {
            dt: 0.1,
            mass_dscale: 0.5,
            ..Default::default()
        });
        sys.add_mass(DVec3::ZERO, 0.0, false).unwrap();
        sys.add_mass(DVec3::Y, 2.0, false).unwrap();
        sys.connect_masses(0, 1, SpringParams::new(4.0, 0.0, 1.0)).unwrap();
        sys.update_mass_location(1, DVec3::new(0.0, 2.0, 0.0)).unwrap();

        sys.simulate(None).unwrap();

        // F = -(2-1)*4 = -4，a = -2，v = -0.2，dx = -0.2*0.1*0.5 = -0.01
        let p = sys.particle(1).unwrap();
        assert!((p.center.y - 1.99).abs() < 1e-12);
        // 速度由实际位移回算：-0.01 / 0.1
        assert!((p.velocity.y + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_gravity_only_when_enabled() {
        let mut sys = MassSpringSystem::new(SimulationConfig {
            dt: 0.5,
            ..Default::default()
        });
        sys.add_mass(DVec3::ZERO, 1.0, true).unwrap();
        sys.add_mass(DVec3::X, 1.0, false).unwrap();
        sys.simulate(None).unwrap();

        let falling = sys.particle(0).unwrap().center;
        assert!((falling.y - (-9.81 * 0.25)).abs() < 1e-12);
        assert_eq!(sys.particle(1).unwrap().center, DVec3::X);
    }

    #[test]
    fn test_sequential_update_order() {
        // 质点 1 先更新，质点 2 计算时看到的是质点 1 的新位置
        let mut sys = MassSpringSystem::new(SimulationConfig {
            dt: 0.1,
            ..Default::default()
        });
        sys.add_mass(DVec3::ZERO, 0.0, false).unwrap();
        sys.add_mass(DVec3::Y, 1.0, false).unwrap();
        sys.add_mass(DVec3::new(0.0, 2.0, 0.0), 1.0, false).unwrap();
        sys.connect_masses(0, 1, SpringParams::new(10.0, 0.0, 1.0)).unwrap();
        sys.connect_masses(1, 2, SpringParams::new(10.0, 0.0, 1.0)).unwrap();
        sys.update_mass_location(0, DVec3::new(0.0, -1.0, 0.0)).unwrap();

        sys.simulate(None).unwrap();

        // 质点 1：F = -10，dx = -10 * 0.01 = -0.1
        let p1 = sys.particle(1).unwrap().center;
        assert!((p1.y - 0.9).abs() < 1e-12);
        // 质点 2：与新位置距离 1.1，F = -1，dx = -0.01
        let p2 = sys.particle(2).unwrap().center;
        assert!((p2.y - 1.99).abs() < 1e-12);
    }

    #[test]
    fn test_zero_length_spring_is_clamped_and_reported() {
        let mut sys = MassSpringSystem::default();
        sys.add_mass(DVec3::ONE, 0.0, false).unwrap();
        sys.add_mass(DVec3::ONE, 1.0, false).unwrap();
        sys.connect_masses(0, 1, SpringParams::default()).unwrap();

        let report = sys.simulate(None).unwrap();
        assert_eq!(report, StepReport { integrated: 1, clamped_springs: 1 });
        assert!(sys.particle(1).unwrap().center.is_finite());
    }

    #[test]
    fn test_max_velocity_clamp() {
        let mut sys = MassSpringSystem::new(SimulationConfig {
            dt: 1.0,
            max_velocity: Some(0.5),
            ..Default::default()
        });
        sys.add_mass(DVec3::ZERO, 1.0, false).unwrap();
        sys.set_velocity(0, DVec3::new(3.0, 0.0, 0.0)).unwrap();
        sys.simulate(None).unwrap();
        let p = sys.particle(0).unwrap();
        assert!((p.center.x - 3.0).abs() < 1e-12);
        assert!((p.velocity.length() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_dt() {
        let mut sys = two_mass_system();
        assert!(matches!(sys.simulate(Some(0.0)), Err(JiggleError::InvalidArgument(_))));
        assert!(matches!(sys.simulate(Some(f64::INFINITY)), Err(JiggleError::InvalidArgument(_))));
    }

    #[test]
    fn test_damped_oscillation_settles() {
        let mut sys = MassSpringSystem::default();
        sys.add_mass(DVec3::ZERO, 0.0, false).unwrap();
        sys.add_mass(DVec3::Y, 1.0, false).unwrap();
        sys.connect_masses(0, 1, SpringParams::new(20.0, 2.0, 1.0)).unwrap();
        sys.translate_mass(1, DVec3::new(0.0, 0.5, 0.0)).unwrap();

        for _ in 0..2000 {
            sys.simulate(Some(0.01)).unwrap();
        }
        let p = sys.particle(1).unwrap();
        assert!((p.center - DVec3::Y).length() < 1e-3);
    }

    #[test]
    fn test_relocation_rejects_non_finite() {
        let mut sys = two_mass_system();
        let bad = DVec3::new(0.0, f64::NAN, 0.0);
        assert!(matches!(sys.translate_mass(1, bad), Err(JiggleError::InvalidArgument(_))));
        assert!(matches!(
            sys.update_mass_location(1, DVec3::splat(f64::INFINITY)),
            Err(JiggleError::InvalidArgument(_))
        ));
        assert!(matches!(sys.set_velocity(0, bad), Err(JiggleError::InvalidArgument(_))));
        assert_eq!(sys.get_mass_locations(), vec![DVec3::ZERO, DVec3::Y]);
        assert_eq!(sys.particle(0).unwrap().velocity, DVec3::ZERO);
    }

    #[test]
    fn test_fix_mass_clears_velocity_for_damping() {
        let mut sys = MassSpringSystem::default();
        sys.add_mass(DVec3::ZERO, 1.0, false).unwrap();
        sys.add_mass(DVec3::Y, 1.0, false).unwrap();
        sys.connect_masses(0, 1, SpringParams::new(0.0, 2.0, 1.0)).unwrap();
        sys.set_velocity(0, DVec3::new(0.0, 3.0, 0.0)).unwrap();
        // 固定前锚点速度进入阻尼项：-2 * 3
        assert!((sys.spring_force(0, 1).unwrap() - DVec3::new(0.0, -6.0, 0.0)).length() < 1e-12);

        sys.fix_mass(0).unwrap();
        assert_eq!(sys.particle(0).unwrap().velocity, DVec3::ZERO);
        assert_eq!(sys.spring_force(0, 1).unwrap(), DVec3::ZERO);
    }
}
