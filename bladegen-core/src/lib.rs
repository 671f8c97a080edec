pub mod algebra;
pub mod catalog;
pub mod error;
pub mod generators;
pub mod ir;
pub mod lower;
pub mod registry;
pub mod request;
pub mod session;
pub mod sink;
pub mod specialize;
pub mod symbolic;
pub mod templates;
pub mod testgen;

#[cfg(test)]
mod algebra_tests;

#[cfg(test)]
mod integration_tests;

pub use algebra::{Algebra, AlgebraDescription};
pub use error::{GenError, Result};
pub use request::OperationRequest;
pub use session::{GenerationOutput, GenerationSession, SessionOptions};
pub use sink::{Buffer, Feature, SinkContents};

use log::info;

/// Entry point used by the command line driver.
pub struct Bladegen {
    options: SessionOptions,
}

impl Default for Bladegen {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl Bladegen {
    pub fn new(options: SessionOptions) -> Self {
        Bladegen { options }
    }

    /// Load a description and resolve every requested function without keeping the output.
    pub fn check(&self, source: &str) -> Result<usize> {
        let output = self.generate(source)?;
        Ok(output.functions.len())
    }

    pub fn generate(&self, source: &str) -> Result<GenerationOutput> {
        let (algebra, requests) = Algebra::from_yaml(source)?;
        info!(
            "algebra '{}': {} basis vectors, {} shapes, {} requests",
            algebra.name,
            algebra.dimension(),
            algebra.shapes.len(),
            requests.len()
        );
        GenerationSession::with_options(algebra, self.options.clone()).generate(&requests)
    }
}
