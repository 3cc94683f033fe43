//! # Framework de Self-Tests do Kernel
//!
//! Fornece estruturas e macros para testes padronizados, executados
//! durante o boot quando a feature `self_test` está ativa.
//!
//! # Uso
//! ```rust
//! use crate::klib::test_framework::*;
//!
//! pub fn run_my_tests() {
//!     run_test_suite("Meu Módulo", &[
//!         TestCase::new("algo", test_something),
//!     ]);
//! }
//! ```

/// Resultado de um teste individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    /// Teste passou com sucesso.
    Pass,
    /// Teste falhou.
    Fail,
    /// Teste foi pulado (não aplicável no contexto atual).
    Skip,
}

/// Estrutura para um caso de teste.
pub struct TestCase {
    /// Nome do teste (para logging).
    pub name: &'static str,
    /// Função que executa o teste.
    pub func: fn() -> TestResult,
}

impl TestCase {
    /// Cria um novo caso de teste.
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }

    /// Executa o teste e retorna o resultado.
    pub fn run(&self) -> TestResult {
        let result = (self.func)();
        match result {
            TestResult::Pass => crate::kinfo!("[Test] OK"),
            TestResult::Fail => crate::kerror!("[Test] FALHOU"),
            TestResult::Skip => crate::kwarn!("[Test] PULADO"),
        }
        result
    }
}

/// Executa uma suíte de testes.
///
/// Se algum teste falhar, o kernel entra em panic: o sistema só prossegue
/// com todos os invariantes verificados.
pub fn run_test_suite(suite_name: &str, tests: &[TestCase]) {
    crate::kinfo!("==== TEST SUITE ====");
    crate::drivers::serial::emit_str("       suite: ");
    crate::drivers::serial::emit_str(suite_name);
    crate::drivers::serial::emit_nl();

    let mut passed = 0usize;
    let mut skipped = 0usize;

    let mut i = 0;
    while i < tests.len() {
        let test = &tests[i];
        crate::drivers::serial::emit_str("       - ");
        crate::drivers::serial::emit_str(test.name);
        crate::drivers::serial::emit_nl();
        match test.run() {
            TestResult::Pass => passed += 1,
            TestResult::Fail => {
                crate::kerror!("SUITE FALHOU");
                panic!("Test suite failed - kernel halted");
            }
            TestResult::Skip => skipped += 1,
        }
        i += 1;
    }

    crate::kinfo!("==== SUITE OK ====  passed=", passed as u64, " skipped=", skipped as u64);
}

/// Asserção em testes: se a condição for falsa, loga e retorna Fail.
#[macro_export]
macro_rules! kassert {
    ($cond:expr) => {
        if !($cond) {
            $crate::kerror!("ASSERTION FAILED: ", line!() as u64);
            return $crate::klib::test_framework::TestResult::Fail;
        }
    };
}

/// Asserção de igualdade em testes.
#[macro_export]
macro_rules! kassert_eq {
    ($left:expr, $right:expr) => {
        if ($left) != ($right) {
            $crate::kerror!("ASSERTION FAILED (eq) na linha ", line!() as u64);
            $crate::kerror!("  left  = ", ($left) as u64);
            $crate::kerror!("  right = ", ($right) as u64);
            return $crate::klib::test_framework::TestResult::Fail;
        }
    };
}
