//! # SMP: Multiprocessamento
//!
//! Registros per-CPU e bringup de Application Processors.

pub mod bringup;
pub mod percpu;
