//! Filas de tasks prontas, uma por prioridade.

use alloc::collections::VecDeque;
use alloc::boxed::Box;
use core::pin::Pin;

use crate::sched::config::NUMBER_OF_PRIORITIES;
use crate::sched::task::Task;

/// Fila de execução: FIFO estrito dentro de cada prioridade.
pub struct RunQueue {
    queues: [VecDeque<Pin<Box<Task>>>; NUMBER_OF_PRIORITIES],
}

impl RunQueue {
    pub fn new() -> Self {
        Self {
            // Capacidade pré-reservada: `push` também roda em contexto de
            // interrupção (preempção, resume de alarme) e não pode
            // disputar o lock do heap com a task interrompida.
            queues: core::array::from_fn(|_| VecDeque::with_capacity(32)),
        }
    }

    /// Adiciona ao fim da fila da prioridade da task.
    pub fn push(&mut self, task: Pin<Box<Task>>) {
        let priority = (task.priority as usize).min(NUMBER_OF_PRIORITIES - 1);
        self.queues[priority].push_back(task);
    }

    /// Remove a próxima task elegível: maior prioridade primeiro,
    /// chegada mais antiga como desempate.
    pub fn pop_next(&mut self) -> Option<Pin<Box<Task>>> {
        for queue in self.queues.iter_mut() {
            if let Some(task) = queue.pop_front() {
                return Some(task);
            }
        }
        None
    }

    /// Como `pop_next`, mas só aceita prioridade numericamente <= `limit`
    /// (igual ou mais alta). Usado na preempção: uma task de prioridade
    /// mais baixa nunca desaloja a corrente.
    pub fn pop_higher_or_equal(&mut self, limit: u8) -> Option<Pin<Box<Task>>> {
        let limit = (limit as usize).min(NUMBER_OF_PRIORITIES - 1);
        for queue in self.queues[..=limit].iter_mut() {
            if let Some(task) = queue.pop_front() {
                return Some(task);
            }
        }
        None
    }

    /// Número de tasks na fila
    pub fn len(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Verifica se está vazia
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
