//! One generation run: the registry, the output buffers and the workers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, trace};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::algebra::{Algebra, FloatPrecision, ValueType};
use crate::catalog::Catalog;
use crate::error::{GenError, Result};
use crate::generators::{OperationGenerator, Plan};
use crate::lower::{Backend, Convention};
use crate::registry::{GeneratedFunctionRecord, OwnerTicket, Registry, Reservation};
use crate::request::{OperationRequest, ResolutionKey};
use crate::sink::{OutputSink, SinkContents};
use crate::symbolic::{CliffordEngine, Metric, SymbolicEngine};
use crate::templates::{BuiltinTemplates, TemplateParams, TemplateRenderer};

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Worker threads for top-level requests; 0 picks the rayon default.
    pub threads: usize,
    /// Overrides the description's test emission flag.
    pub emit_tests: Option<bool>,
}

pub struct GenerationSession {
    algebra: Algebra,
    catalog: Catalog,
    engine: Box<dyn SymbolicEngine>,
    templates: Box<dyn TemplateRenderer>,
    registry: Registry,
    sink: OutputSink,
    tests: Mutex<Vec<String>>,
    /// Output names of renamed top-level requests, found again by helpers.
    output_names: Mutex<HashMap<ResolutionKey, String>>,
    options: SessionOptions,
    aborted: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub algebra_name: String,
    pub convention: Convention,
    pub contents: SinkContents,
    pub test_functions: Vec<String>,
    pub functions: Vec<GeneratedFunctionRecord>,
}

impl GenerationSession {
    pub fn new(algebra: Algebra) -> Self {
        GenerationSession::with_options(algebra, SessionOptions::default())
    }

    pub fn with_options(algebra: Algebra, options: SessionOptions) -> Self {
        GenerationSession {
            algebra,
            catalog: Catalog::standard(),
            engine: Box::new(CliffordEngine::new()),
            templates: Box::new(BuiltinTemplates::new()),
            registry: Registry::new(),
            sink: OutputSink::new(),
            tests: Mutex::new(Vec::new()),
            output_names: Mutex::new(HashMap::new()),
            options,
            aborted: AtomicBool::new(false),
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_engine(mut self, engine: Box<dyn SymbolicEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_templates(mut self, templates: Box<dyn TemplateRenderer>) -> Self {
        self.templates = templates;
        self
    }

    pub fn algebra(&self) -> &Algebra {
        &self.algebra
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn emit_tests(&self) -> bool {
        self.options.emit_tests.unwrap_or(self.algebra.emit_tests)
    }

    pub fn test_functions(&self) -> Vec<String> {
        let mut names = self.tests.lock().clone();
        names.sort();
        names
    }

    /// A resolver for the calling thread.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver {
            session: self,
            stack: RefCell::new(Vec::new()),
            pending_tests: RefCell::new(Vec::new()),
        }
    }

    /// Resolve one function on the calling thread, including its tests.
    pub fn resolve(
        &self,
        name: &str,
        argument_types: &[&str],
        forced_return: Option<&str>,
        float: &str,
        metric: &str,
    ) -> Result<String> {
        let float = match self.algebra.float(float) {
            Some(f) => f.clone(),
            None => return Err(GenError::Config(format!("unknown float type '{}'", float))),
        };
        let args: Vec<String> = argument_types.iter().map(|t| t.to_string()).collect();
        let resolver = self.resolver();
        let name = resolver.resolve(name, &args, forced_return, &float, metric)?;
        resolver.drain_tests()?;
        Ok(name)
    }

    /// Generate every request, one precision at a time, on the worker pool.
    pub fn run(&self, requests: &[OperationRequest]) -> Result<Vec<String>> {
        let work: Vec<OperationRequest> = requests
            .iter()
            .flat_map(|r| r.split_by_float(&self.algebra))
            .collect();
        info!(
            "generating {} functions for algebra '{}' ({} requests)",
            work.len(),
            self.algebra.name,
            requests.len()
        );
        self.register_output_names(&work)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .map_err(|e| GenError::Config(format!("cannot start worker pool: {}", e)))?;

        let results: Vec<Result<String>> = pool.install(|| {
            work.par_iter()
                .map(|request| {
                    if self.aborted.load(Ordering::Relaxed) {
                        return Err(GenError::DependencyFailed(request.to_string()));
                    }
                    let resolver = self.resolver();
                    let result = resolver
                        .generate_top_level(request)
                        .and_then(|name| resolver.drain_tests().map(|_| name));
                    if result.is_err() {
                        self.aborted.store(true, Ordering::Relaxed);
                    }
                    result
                })
                .collect()
        });

        let mut names = Vec::with_capacity(results.len());
        let mut first_error: Option<GenError> = None;
        for result in results {
            match result {
                Ok(name) => names.push(name),
                Err(e) => {
                    let replace = match &first_error {
                        None => true,
                        Some(current) => current.is_secondary() && !e.is_secondary(),
                    };
                    if replace {
                        first_error = Some(e);
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        info!(
            "generated {} functions and {} tests",
            self.registry.len(),
            self.tests.lock().len()
        );
        Ok(names)
    }

    /// Plan the renamed requests up front so that a helper reaching the same
    /// key first still emits the declared name.
    fn register_output_names(&self, work: &[OperationRequest]) -> Result<()> {
        let resolver = self.resolver();
        for request in work.iter().filter(|r| r.output_name != r.name) {
            let (key, ..) = resolver.plan_top_level(request)?;
            let mut names = self.output_names.lock();
            if let Some(existing) = names.get(&key) {
                debug!("{} keeps output name {} over {}", key, existing, request.output_name);
                continue;
            }
            names.insert(key, request.output_name.clone());
        }
        Ok(())
    }

    pub fn finish(self) -> GenerationOutput {
        let test_functions = self.test_functions();
        let functions = self.registry.records();
        GenerationOutput {
            algebra_name: self.algebra.name.clone(),
            convention: self.algebra.convention,
            contents: self.sink.into_contents(),
            test_functions,
            functions,
        }
    }

    /// Run all requests and return the output, or nothing on the first error.
    pub fn generate(self, requests: &[OperationRequest]) -> Result<GenerationOutput> {
        self.run(requests)?;
        Ok(self.finish())
    }
}

struct PendingTest<'s> {
    generator: &'s dyn OperationGenerator,
    request: OperationRequest,
    plan: Plan,
}

/// Per-worker view of the session. Tracks the keys being generated on this
/// call stack and the tests still to be written.
pub struct Resolver<'s> {
    session: &'s GenerationSession,
    stack: RefCell<Vec<ResolutionKey>>,
    pending_tests: RefCell<Vec<PendingTest<'s>>>,
}

impl<'s> Resolver<'s> {
    pub fn algebra(&self) -> &'s Algebra {
        &self.session.algebra
    }

    pub fn engine(&self) -> &'s dyn SymbolicEngine {
        self.session.engine.as_ref()
    }

    pub fn backend(&self) -> Backend<'s> {
        Backend::new(&self.session.algebra)
    }

    pub fn sink(&self) -> &'s OutputSink {
        &self.session.sink
    }

    pub fn emit_tests(&self) -> bool {
        self.session.emit_tests()
    }

    pub fn metric(&self, request: &OperationRequest) -> Result<&'s Metric> {
        match self.algebra().metric(&request.metric) {
            Some(m) => Ok(m),
            None => Err(GenError::Domain(
                format!("unknown metric '{}'", request.metric),
                Some(request.to_string()),
            )),
        }
    }

    pub fn floats(&self, request: &OperationRequest) -> Result<Vec<FloatPrecision>> {
        let algebra = self.algebra();
        if request.floats.is_empty() {
            return Ok(algebra.floats.clone());
        }
        request
            .floats
            .iter()
            .map(|name| {
                algebra.float(name).cloned().ok_or_else(|| {
                    GenError::Domain(format!("unknown float type '{}'", name), Some(request.to_string()))
                })
            })
            .collect()
    }

    /// Render a template of the convention's family into a string.
    pub fn render(&self, template: &str, params: &TemplateParams) -> Result<String> {
        let name = format!("{}.{}", self.algebra().convention.template_family(), template);
        let mut out = String::new();
        self.session.templates.render(&mut out, &name, params)?;
        Ok(out)
    }

    /// Output name of the function for the given key, generating it if needed.
    pub fn resolve(
        &self,
        name: &str,
        argument_types: &[String],
        forced_return: Option<&str>,
        float: &FloatPrecision,
        metric: &str,
    ) -> Result<String> {
        let key = ResolutionKey::new(self.algebra(), name, argument_types, float, metric, forced_return);
        self.check_cycle(&key)?;

        let ticket = match self.session.registry.reserve(&key) {
            Reservation::Done(output) => {
                trace!("{} already generated as {}", key, output);
                return Ok(output);
            }
            Reservation::Pending(slot) => {
                trace!("waiting for {}", key);
                return self.session.registry.wait(&key, &slot);
            }
            Reservation::Owner(ticket) => ticket,
        };

        let mut request = key.to_request();
        let generator = self.session.catalog.dispatch(self.algebra(), &request)?;
        let description = request.to_string();
        let plan = generator
            .complete_request(self, &mut request)
            .map_err(|e| e.in_request(&description))?;
        self.build(ticket, generator, request, plan)
    }

    pub(crate) fn generate_top_level(&self, request: &OperationRequest) -> Result<String> {
        debug!("generating {}", request);
        let (key, generator, request, plan) = self.plan_top_level(request)?;
        self.check_cycle(&key)?;
        match self.session.registry.reserve(&key) {
            Reservation::Done(output) => Ok(output),
            Reservation::Pending(slot) => self.session.registry.wait(&key, &slot),
            Reservation::Owner(ticket) => self.build(ticket, generator, request, plan),
        }
    }

    /// Complete a top-level request and work out its registry key. Passing
    /// flags other than the defaults make a key of their own, which helpers
    /// never resolve.
    fn plan_top_level(
        &self,
        request: &OperationRequest,
    ) -> Result<(ResolutionKey, &'s dyn OperationGenerator, OperationRequest, Plan)> {
        let mut request = request.clone();
        let description = request.to_string();
        let generator = self.session.catalog.dispatch(self.algebra(), &request)?;
        let forced = request.has_return_type().then(|| request.return_type.clone());
        let plan = generator
            .complete_request(self, &mut request)
            .map_err(|e| e.in_request(&description))?;

        let Some(first) = plan.floats.first() else {
            return Err(GenError::Domain("request has no float type".to_string(), Some(description)));
        };
        let by_address = self.algebra().convention.passes_by_address();
        let flags: Vec<bool> = first.args.iter().map(|a| a.by_ref).collect();
        let defaults: Vec<bool> = first
            .args
            .iter()
            .map(|a| a.ty != ValueType::Scalar && by_address)
            .collect();
        let key = ResolutionKey::new(
            self.algebra(),
            &request.name,
            &request.argument_types,
            &first.float,
            &request.metric,
            forced.as_deref(),
        )
        .with_passing(flags, &defaults);
        Ok((key, generator, request, plan))
    }

    /// Base of the emitted name: the declared output name of the key if a
    /// renamed request claimed it, qualified by metric and passing flags.
    fn output_base(&self, key: &ResolutionKey, request: &OperationRequest) -> String {
        let declared = self.session.output_names.lock().get(key).cloned();
        let base = declared.unwrap_or_else(|| request.output_name.clone());
        self.backend().qualified_name(&base, &key.metric, key.passing.as_deref())
    }

    fn build(
        &self,
        ticket: OwnerTicket,
        generator: &'s dyn OperationGenerator,
        request: OperationRequest,
        mut plan: Plan,
    ) -> Result<String> {
        let key = ticket.key().clone();
        let description = request.to_string();
        let backend = self.backend();
        let forced = key.forced_return.as_deref();
        let base = self.output_base(&key, &request);
        for fp in plan.floats.iter_mut() {
            fp.function_name = backend.function_name(&base, &fp.float, &request.argument_types, forced);
            fp.test_name = backend.test_name(&base, &fp.float, &request.argument_types, forced);
        }
        let output = match plan.floats.first() {
            Some(fp) => fp.function_name.clone(),
            None => return Err(GenError::Domain("request has no float type".to_string(), Some(description))),
        };
        debug!("{} -> {} ({})", key, output, generator.name());

        self.stack.borrow_mut().push(key);
        let result = generator
            .check_dependencies(self, &request, &mut plan)
            .and_then(|_| generator.write_function(self, &request, &plan))
            .map_err(|e| e.in_request(&description));
        self.stack.borrow_mut().pop();

        match result {
            Ok(()) => {
                ticket.complete(&output);
                if self.emit_tests() {
                    self.pending_tests.borrow_mut().push(PendingTest {
                        generator,
                        request,
                        plan,
                    });
                }
                Ok(output)
            }
            Err(e) => {
                ticket.fail();
                Err(e)
            }
        }
    }

    /// Write the tests of everything generated on this worker so far.
    pub(crate) fn drain_tests(&self) -> Result<()> {
        loop {
            let next = self.pending_tests.borrow_mut().pop();
            let Some(mut pending) = next else {
                return Ok(());
            };
            let description = pending.request.to_string();
            pending
                .generator
                .check_test_dependencies(self, &pending.request, &mut pending.plan)
                .map_err(|e| e.in_request(&description))?;
            let names = pending
                .generator
                .write_test_function(self, &pending.request, &pending.plan)
                .map_err(|e| e.in_request(&description))?;
            self.session.tests.lock().extend(names);
        }
    }

    fn check_cycle(&self, key: &ResolutionKey) -> Result<()> {
        let stack = self.stack.borrow();
        if let Some(start) = stack.iter().position(|k| k == key) {
            let chain: Vec<String> = stack[start..]
                .iter()
                .chain(std::iter::once(key))
                .map(|k| k.to_string())
                .collect();
            return Err(GenError::Cycle(chain.join(" -> ")));
        }
        Ok(())
    }
}
