//! # Synchronization Primitives
//!
//! Primitivas de sincronização do kernel, todas conscientes de
//! interrupções:
//!
//! - `Spinlock`: exclusão mútua por busy-wait. Desabilita interrupções
//!   ao adquirir e restaura o IF original ao soltar, para que dados
//!   compartilhados com handlers de interrupção fiquem consistentes.
//! - `Barrier`: ponto de encontro contado, usado apenas no bringup SMP.
//! - `Semaphore`: semáforo contador *bloqueante*: quem não consegue
//!   quota entra numa fila FIFO e cede a CPU via scheduler.
//! - `ReadWriteLock`: leitores/escritor sobre dois semáforos.
//!
//! Convenção do kernel: adquirir spinlock ⇒ interrupções desligadas
//! durante toda a seção crítica; interrupções só religam depois que
//! todos os spinlocks seguros foram soltos. Reaquisição aninhada do
//! mesmo lock é proibida (deadlock imediato).

pub mod barrier;
pub mod rwlock;
pub mod semaphore;
pub mod spinlock;

pub use barrier::Barrier;
pub use rwlock::ReadWriteLock;
pub use semaphore::Semaphore;
pub use spinlock::{Spinlock, SpinlockGuard};

// Singletons de boot usam as primitivas da crate `spin` (Once/Lazy):
// inicialização preguiçosa segura sem "static initialization order fiasco".
pub use spin::{Lazy, Once};

pub mod test;
