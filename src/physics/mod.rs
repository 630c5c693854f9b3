//! 质点弹簧物理
//!
//! - Particle: 质点，质量为 0 即固定
//! - Spring: 胡克弹簧 + 沿轴阻尼
//! - MassSpringSystem: 扁平存储的质点/弹簧，顺序半隐式积分

pub mod config;
mod mass_spring;
mod particle;
mod spring;

pub use config::{SimulationConfig, SpringParams};
pub use mass_spring::{MassSpringSystem, StepReport};
pub use particle::Particle;
pub use spring::{Spring, SpringForce};
