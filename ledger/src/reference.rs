//! Transaction reference generation.

use cambio_common::TransactionRef;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Produces human-readable reference codes of the form `TX-XXXXXXXX`.
///
/// Codes are random, not sequential; the journal enforces uniqueness and
/// the engine regenerates on the rare collision.
#[derive(Debug, Default)]
pub struct ReferenceGenerator;

impl ReferenceGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self
    }

    /// Generate a candidate reference code.
    pub fn generate(&self) -> TransactionRef {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TransactionRef::CODE_LEN)
            .map(|b| (b as char).to_ascii_uppercase())
            .collect();

        TransactionRef::new(format!("{}{}", TransactionRef::PREFIX, code))
    }
}
