//! Evaluator configuration (AMBIENT).
//!
//! Bundles the collaborators an embedder injects once and the evaluator
//! threads through every call: the module/resource readers, the security
//! manager, resource limits, and a tracer. One struct built once by the
//! embedder rather than a pile of function parameters threaded by hand.

use std::rc::Rc;

use crate::interfaces::{ModuleReader, ResourceReader, SecurityManager};
use crate::resource::ResourceLimits;
use crate::tracer::{NoopTracer, Tracer};

/// Options bundle passed into the evaluator entry point (§6 `EvaluatorOptions`).
pub struct EvaluatorOptions {
    pub module_readers: Vec<Rc<dyn ModuleReader>>,
    pub resource_readers: Vec<Rc<dyn ResourceReader>>,
    pub security_manager: Rc<dyn SecurityManager>,
    pub limits: ResourceLimits,
    pub tracer: Rc<std::cell::RefCell<dyn Tracer>>,
}

impl EvaluatorOptions {
    /// An options bundle with no injected readers, a permissive
    /// security manager, unrestricted limits, and a no-op tracer — the
    /// configuration a one-off in-process `evaluate()` call needs.
    #[must_use]
    pub fn minimal(security_manager: Rc<dyn SecurityManager>) -> Self {
        Self {
            module_readers: Vec::new(),
            resource_readers: Vec::new(),
            security_manager,
            limits: ResourceLimits::new(),
            tracer: Rc::new(std::cell::RefCell::new(NoopTracer)),
        }
    }

    #[must_use]
    pub fn module_reader_for(&self, scheme: &str) -> Option<&Rc<dyn ModuleReader>> {
        self.module_readers.iter().find(|r| r.scheme() == scheme)
    }

    #[must_use]
    pub fn resource_reader_for(&self, scheme: &str) -> Option<&Rc<dyn ResourceReader>> {
        self.resource_readers.iter().find(|r| r.scheme() == scheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllowAll;
    impl SecurityManager for AllowAll {
        fn check_import_module(&self, _from: &str, _to: &str) -> crate::errors::RunResult<()> {
            Ok(())
        }
        fn check_read_resource(&self, _from: &str, _to: &str) -> crate::errors::RunResult<()> {
            Ok(())
        }
    }

    #[test]
    fn minimal_options_has_no_readers() {
        let opts = EvaluatorOptions::minimal(Rc::new(AllowAll));
        assert!(opts.module_reader_for("file").is_none());
    }
}
