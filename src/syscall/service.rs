//! Registro de serviços nomeados (slots [16, 32) da tabela de syscalls).
//!
//! Nomes únicos de até 15 bytes + terminador, comparados com igualdade
//! limitada. Protegido por spinlock.

use alloc::vec::Vec;

use crate::sync::Spinlock;

use super::table::{SystemCallFn, SystemCallTable};

/// Comprimento máximo do nome, incluindo o terminador.
pub const MAX_NAME_LENGTH: usize = 16;

/// Erros de registro/consulta de serviços.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceNameError {
    /// Nome vazio ou com mais de 15 bytes.
    InvalidName,
    /// Já existe serviço com este nome.
    ServiceExisting,
    /// Slots [16, 32) esgotados.
    TooManyService,
}

struct ServiceEntry {
    name: [u8; MAX_NAME_LENGTH],
    slot: u8,
}

/// Mapa nome → slot. O kernel usa a instância global `registry()`;
/// os self-tests criam instâncias privadas.
pub struct ServiceRegistry {
    entries: Spinlock<Vec<ServiceEntry>>,
}

static REGISTRY: ServiceRegistry = ServiceRegistry {
    entries: Spinlock::new(Vec::new()),
};

/// Registro global de serviços.
pub fn registry() -> &'static ServiceRegistry {
    &REGISTRY
}

fn encode_name(name: &str) -> Result<[u8; MAX_NAME_LENGTH], ServiceNameError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() >= MAX_NAME_LENGTH {
        return Err(ServiceNameError::InvalidName);
    }
    let mut buf = [0u8; MAX_NAME_LENGTH];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

impl ServiceRegistry {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Spinlock::new(Vec::new()),
        }
    }

    /// Registra um serviço nomeado: valida o nome, garante unicidade e
    /// ocupa o próximo slot livre da tabela.
    pub fn register(
        &self,
        table: &SystemCallTable,
        name: &str,
        func: SystemCallFn,
        arg: usize,
    ) -> Result<u8, ServiceNameError> {
        let encoded = encode_name(name)?;

        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.name == encoded) {
            return Err(ServiceNameError::ServiceExisting);
        }

        let slot = table
            .bind_service(func, arg)
            .ok_or(ServiceNameError::TooManyService)? as u8;

        entries.push(ServiceEntry {
            name: encoded,
            slot,
        });
        Ok(slot)
    }

    /// Consulta o slot de um serviço registrado.
    pub fn query(&self, name: &str) -> Option<u8> {
        let encoded = encode_name(name).ok()?;
        self.entries
            .lock()
            .iter()
            .find(|e| e.name == encoded)
            .map(|e| e.slot)
    }
}
