//! # Sched: Tasks e Agendamento
//!
//! Multitarefa preemptiva por núcleo: cada CPU tem um `TaskManager` com
//! sua task corrente e filas de prontos por prioridade (FIFO dentro da
//! mesma prioridade). Cooperativo em syscalls/esperas, preemptivo no
//! tick do timer quando o nível de aninhamento de interrupções é zero.

pub mod config;
pub mod elf;
pub mod runqueue;
pub mod scheduler;
pub mod switch;
pub mod task;

pub mod test;

pub use scheduler::TaskManager;
pub use task::{Task, TaskState, Tid};
