//! Testes do scheduler (lógica de filas e estados).

use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::sched::config::{PRIORITY_DRIVER, PRIORITY_KERNEL, PRIORITY_USER};
use crate::sched::runqueue::RunQueue;
use crate::sched::scheduler::TaskManager;
use crate::sched::task::{create_kernel_task_on, TaskState};
use crate::{kassert, kassert_eq};

const SCHED_TESTS: &[TestCase] = &[
    TestCase::new("fifo_dentro_da_prioridade", test_fifo_same_priority),
    TestCase::new("prioridade_mais_alta_primeiro", test_priority_order),
    TestCase::new("limite_de_prioridade_na_preempcao", test_priority_limit),
    TestCase::new("estados_de_task", test_task_states),
];

pub fn run_sched_tests() {
    run_test_suite("Sched", SCHED_TESTS);
}

fn test_body(_arg: usize) {}

fn test_tm() -> &'static TaskManager {
    TaskManager::init_for_this_cpu("idle-test").expect("sem memoria para TM de teste")
}

/// Dentro da mesma prioridade, sai na ordem de chegada.
fn test_fifo_same_priority() -> TestResult {
    let tm = test_tm();
    let mut queue = RunQueue::new();

    let a = create_kernel_task_on(tm, "a", test_body, 0, PRIORITY_KERNEL).unwrap();
    let b = create_kernel_task_on(tm, "b", test_body, 0, PRIORITY_KERNEL).unwrap();
    let tid_a = a.tid();
    let tid_b = b.tid();

    queue.push(a);
    queue.push(b);
    kassert_eq!(queue.len(), 2usize);
    kassert_eq!(queue.pop_next().unwrap().tid(), tid_a);
    kassert_eq!(queue.pop_next().unwrap().tid(), tid_b);
    kassert!(queue.is_empty());

    TestResult::Pass
}

/// Prioridade numericamente menor (mais alta) vence, FIFO no desempate.
fn test_priority_order() -> TestResult {
    let tm = test_tm();
    let mut queue = RunQueue::new();

    let low = create_kernel_task_on(tm, "low", test_body, 0, PRIORITY_USER).unwrap();
    let high1 = create_kernel_task_on(tm, "h1", test_body, 0, PRIORITY_DRIVER).unwrap();
    let high2 = create_kernel_task_on(tm, "h2", test_body, 0, PRIORITY_DRIVER).unwrap();
    let tid_low = low.tid();
    let tid_h1 = high1.tid();
    let tid_h2 = high2.tid();

    queue.push(low);
    queue.push(high1);
    queue.push(high2);

    kassert_eq!(queue.pop_next().unwrap().tid(), tid_h1);
    kassert_eq!(queue.pop_next().unwrap().tid(), tid_h2);
    kassert_eq!(queue.pop_next().unwrap().tid(), tid_low);

    TestResult::Pass
}

/// `pop_higher_or_equal` nunca devolve prioridade mais baixa que o limite.
fn test_priority_limit() -> TestResult {
    let tm = test_tm();
    let mut queue = RunQueue::new();

    let user = create_kernel_task_on(tm, "user", test_body, 0, PRIORITY_USER).unwrap();
    let tid_user = user.tid();
    queue.push(user);

    kassert!(queue.pop_higher_or_equal(PRIORITY_KERNEL).is_none());
    kassert_eq!(queue.pop_higher_or_equal(PRIORITY_USER).unwrap().tid(), tid_user);

    TestResult::Pass
}

/// Transições de estado: nasce SUSPENDED, runnable só em READY/RUNNING.
fn test_task_states() -> TestResult {
    let tm = test_tm();
    let mut task = create_kernel_task_on(tm, "t", test_body, 0, PRIORITY_KERNEL).unwrap();

    kassert!(matches!(task.state, TaskState::Suspended));
    kassert!(!task.state.is_runnable());

    unsafe {
        core::pin::Pin::get_unchecked_mut(task.as_mut()).set_ready();
    }
    kassert!(task.state.is_runnable());
    unsafe {
        core::pin::Pin::get_unchecked_mut(task.as_mut()).set_terminated();
    }
    kassert!(!task.state.is_runnable());

    TestResult::Pass
}
