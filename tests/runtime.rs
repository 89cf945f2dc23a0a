//! The process-wide services can be installed exactly once.

use protolab::{
    Services,
    generation::{GenerationError, Generator, Prompt},
    runtime::{self, RuntimeError},
    storage::SqliteStore,
};
use tempfile::TempDir;

struct Offline;

impl Generator for Offline {
    fn generate(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
        Err(GenerationError::Timeout)
    }
}

fn services(tmp: &TempDir) -> Services {
    let store = SqliteStore::open(tmp.path().join("protocolos.db"), "protocolos").unwrap();
    Services::new(store, Offline, "http://localhost:8000/")
}

// One test, since the installed services live for the whole process.
#[test]
fn services_are_installed_once() {
    let tmp = TempDir::new().unwrap();

    assert_eq!(runtime::services().unwrap_err(), RuntimeError::NotInitialized);

    let installed = runtime::install(services(&tmp)).unwrap();
    assert_eq!(
        installed.share_url("7".parse().unwrap()),
        "http://localhost:8000/protocolo/7"
    );

    assert_eq!(
        runtime::install(services(&tmp)).unwrap_err(),
        RuntimeError::AlreadyInitialized
    );
    let current = runtime::services().unwrap();
    assert!(std::ptr::eq(current, installed));
}
