//! Engine facade
//!
//! An [`Engine`] owns everything one program needs: the collaborators that
//! fetch and parse sources, the module registry and the runtime (class
//! registry, method-table cache and identifier odometer). Engines share
//! nothing, so several can run side by side.

use crate::compiler::classes::ClassId;
use crate::compiler::module::{Fetch, ImportError, Module, ModuleId, ModuleLoader, ModuleRegistry};
use crate::config::EngineOptions;
use crate::parser::checker::Target;
use crate::parser::{JsonTreeParser, SourceParser};
use crate::vm::snapshot::{self, Snapshot};
use crate::vm::{ObjectRef, Runtime, Value, VmError};
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by the engine facade
#[derive(Debug, Error)]
pub enum EngineError {
    /// Importing a module failed
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Execution failed
    #[error("Runtime error: {0}")]
    Vm(#[from] VmError),

    /// Module has not been imported
    #[error("Module '{url}' is not loaded")]
    UnknownModule {
        /// Module URL
        url: String,
    },

    /// Module declares no main class
    #[error("Module '{url}' has no main class")]
    NoMainClass {
        /// Module URL
        url: String,
    },

    /// Name is not a class of the module
    #[error("Module '{url}' has no class '{name}'")]
    UnknownClass {
        /// Module URL
        url: String,
        /// Class name
        name: String,
    },
}

/// One program's modules and runtime
pub struct Engine {
    options: EngineOptions,
    fetcher: Box<dyn Fetch>,
    parser: Box<dyn SourceParser>,
    modules: ModuleRegistry,
    runtime: Runtime,
}

impl Engine {
    /// Create an engine that reads JSON syntax trees through `fetcher`
    pub fn new(options: EngineOptions, fetcher: Box<dyn Fetch>) -> Self {
        let runtime = Runtime::new(options.runtime.clone());
        Self {
            options,
            fetcher,
            parser: Box::new(JsonTreeParser),
            modules: ModuleRegistry::new(),
            runtime,
        }
    }

    /// Replace the source parser
    pub fn with_parser(mut self, parser: Box<dyn SourceParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Engine options
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Imported modules
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Runtime state
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Mutable runtime state
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    /// Import `url` and its dependencies
    pub fn import(&mut self, url: &str) -> Result<ModuleId, EngineError> {
        let mut loader = ModuleLoader::new(
            self.fetcher.as_ref(),
            self.parser.as_ref(),
            &self.options,
            &mut self.modules,
            &mut self.runtime,
        );
        Ok(loader.import(url)?)
    }

    /// Imported module by URL
    pub fn module(&self, url: &str) -> Result<&Module, EngineError> {
        self.modules
            .get_by_url(url)
            .ok_or_else(|| EngineError::UnknownModule { url: url.to_string() })
    }

    /// Class visible as `name` at the top level of module `url`
    pub fn class(&self, url: &str, name: &str) -> Result<ClassId, EngineError> {
        match self.module(url)?.symbols.lookup(name).map(|b| b.target) {
            Some(Target::Class(class)) => Ok(class),
            _ => Err(EngineError::UnknownClass {
                url: url.to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Create an instance of class `name` of module `url`
    pub fn instantiate(&mut self, url: &str, name: &str) -> Result<ObjectRef, EngineError> {
        let class = self.class(url, name)?;
        self.runtime.advance_tick();
        Ok(self.runtime.instantiate(class)?)
    }

    /// Import `url`, instantiate its main class and call the entry method
    /// with a null caller. A main class without the entry method is only
    /// instantiated.
    pub fn run_main(&mut self, url: &str) -> Result<ObjectRef, EngineError> {
        self.import(url)?;
        let main = self
            .module(url)?
            .main
            .ok_or_else(|| EngineError::NoMainClass { url: url.to_string() })?;

        self.runtime.advance_tick();
        let obj = self.runtime.instantiate(main)?;
        let entry = self.options.entry_method.clone();
        if self.runtime.method_slot(&obj, &entry).is_some() {
            debug!(url, method = %entry, "running main");
            self.runtime.call(&obj, &entry, Value::Null, Vec::new())?;
        }
        Ok(obj)
    }

    /// Call method `name` of `obj` on behalf of the host
    pub fn call(&mut self, obj: &ObjectRef, name: &str, args: Vec<Value>) -> Result<Value, EngineError> {
        self.runtime.advance_tick();
        Ok(self.runtime.call(obj, name, Value::Null, args)?)
    }

    /// Capture everything reachable from `root`
    pub fn snapshot(&self, root: &Value) -> Snapshot {
        snapshot::capture(&self.runtime, root)
    }

    /// Rebuild a captured graph; its classes must already be imported
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<Value, EngineError> {
        Ok(snapshot::restore(&mut self.runtime, snapshot)?)
    }
}
