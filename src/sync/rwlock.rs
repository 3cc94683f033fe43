//! Lock de leitores/escritor sobre dois semáforos.
//!
//! Construção clássica: `resource` serializa escritores e o "primeiro
//! leitor"; `reader_mutex` protege a contagem de leitores. O modo
//! escritor-primeiro é escolhido na construção: escritores também seguram
//! `reader_mutex`, de modo que leitores recém-chegados enfileiram atrás
//! do escritor em espera (o FIFO estrito do semáforo dá a preferência).

use core::cell::UnsafeCell;

use crate::sync::Semaphore;

pub struct ReadWriteLock {
    writer_first: bool,
    resource: Semaphore,
    reader_mutex: Semaphore,
    /// Protegido por `reader_mutex`.
    reader_count: UnsafeCell<u32>,
}

// SAFETY: `reader_count` só é tocado com `reader_mutex` adquirido.
unsafe impl Sync for ReadWriteLock {}
unsafe impl Send for ReadWriteLock {}

impl ReadWriteLock {
    /// `writer_first`: escolhe entre preferência de escritor ou ordem justa.
    pub const fn new(writer_first: bool) -> Self {
        Self {
            writer_first,
            resource: Semaphore::new(1),
            reader_mutex: Semaphore::new(1),
            reader_count: UnsafeCell::new(0),
        }
    }

    pub fn acquire_read(&self) {
        self.reader_mutex.acquire();
        let count = unsafe { &mut *self.reader_count.get() };
        *count += 1;
        if *count == 1 {
            // Primeiro leitor disputa o recurso com escritores
            self.resource.acquire();
        }
        self.reader_mutex.release();
    }

    pub fn release_read(&self) {
        self.reader_mutex.acquire();
        let count = unsafe { &mut *self.reader_count.get() };
        debug_assert!(*count > 0);
        *count -= 1;
        if *count == 0 {
            self.resource.release();
        }
        self.reader_mutex.release();
    }

    pub fn acquire_write(&self) {
        if self.writer_first {
            // Segurar o mutex de leitores bloqueia novos leitores na
            // fila FIFO atrás deste escritor.
            self.reader_mutex.acquire();
        }
        self.resource.acquire();
    }

    pub fn release_write(&self) {
        self.resource.release();
        if self.writer_first {
            self.reader_mutex.release();
        }
    }
}
