use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsArgs, JsError, JsObject, JsResult, JsValue, NativeFunction, Source};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::config::WaitConfig;
use crate::document::{HtmlDocument, SelectorQuery};
use crate::timer::{ManualTimer, Timer, TimerHandle};
use crate::waiter::Waiters;

// ── Types ──────────────────────────────────────────────────────────────

/// What a script's waits look at.
pub enum ScriptTarget {
    /// A snapshot the script can rewrite through `document.load` and
    /// `document.setValue`.
    Html(Rc<HtmlDocument>),
    /// A read-only document such as a live page.
    Live(Rc<dyn SelectorQuery>),
}

impl ScriptTarget {
    pub fn html(source: &str) -> Self {
        Self::Html(Rc::new(HtmlDocument::parse(source)))
    }
}

pub struct ScriptResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    /// Timer time the run covered.
    pub virtual_ms: u128,
    pub elapsed_ms: u128,
    /// Waits and timeouts still scheduled when the run stopped.
    pub pending_timers: usize,
}

impl ScriptResult {
    pub fn format_output(&self) -> String {
        let mut out = String::new();
        if self.success {
            out.push_str(&format!(
                "Script completed in {}ms ({}ms of timer time)\n",
                self.elapsed_ms, self.virtual_ms
            ));
        } else {
            out.push_str(&format!("Script failed in {}ms\n", self.elapsed_ms));
        }
        if !self.output.is_empty() {
            out.push_str("Output:\n");
            for line in self.output.lines() {
                out.push_str(&format!("  {}\n", line));
            }
        }
        if let Some(ref err) = self.error {
            out.push_str(&format!("Error: {}\n", err));
        }
        if self.pending_timers > 0 {
            out.push_str(&format!(
                "Pending: {} wait(s) still polling when the budget ran out\n",
                self.pending_timers
            ));
        }
        out.trim_end().to_string()
    }
}

// ── Shared State ───────────────────────────────────────────────────────

struct HostState {
    waiters: Waiters,
    timer: Rc<ManualTimer>,
    document: Option<Rc<HtmlDocument>>,
    /// JS callbacks whose condition held, in firing order.
    ready: Rc<RefCell<VecDeque<JsObject>>>,
    output_lines: RefCell<Vec<String>>,
}

// ── Entry Point ────────────────────────────────────────────────────────

/// Evaluate `script` and drive its waits until none remain or the configured
/// budget of timer time is spent.
///
/// Pending waits at the budget are reported, not treated as failure.
pub fn run_script(script: &str, target: ScriptTarget, config: &WaitConfig) -> ScriptResult {
    let start = Instant::now();
    let timer = Rc::new(ManualTimer::new());

    let (query, document): (Rc<dyn SelectorQuery>, Option<Rc<HtmlDocument>>) = match target {
        ScriptTarget::Html(doc) => (doc.clone(), Some(doc)),
        ScriptTarget::Live(query) => (query, None),
    };

    let state = Rc::new(HostState {
        waiters: Waiters::new(timer.clone(), query).with_config(config),
        timer: timer.clone(),
        document,
        ready: Rc::new(RefCell::new(VecDeque::new())),
        output_lines: RefCell::new(Vec::new()),
    });

    let result = execute_in_boa(&state, script, config);

    let pending_timers = timer.active_count();
    if pending_timers > 0 {
        tracing::warn!("Script stopped with {} pending wait(s)", pending_timers);
    }
    // Tick closures and the ready queue still hold JS callbacks.
    timer.clear();
    state.ready.borrow_mut().clear();

    let output = state.output_lines.borrow().join("\n");
    ScriptResult {
        success: result.is_ok(),
        output,
        error: result.err(),
        virtual_ms: timer.now().as_millis(),
        elapsed_ms: start.elapsed().as_millis(),
        pending_timers,
    }
}

// ── Boa Execution ──────────────────────────────────────────────────────

fn execute_in_boa(state: &Rc<HostState>, script: &str, config: &WaitConfig) -> Result<(), String> {
    let mut js_ctx = Context::default();
    register_globals(state, &mut js_ctx)?;

    js_ctx
        .eval(Source::from_bytes(script))
        .map_err(|e| format!("{}", e))?;
    run_ready(state, &mut js_ctx).map_err(|e| format!("{}", e))?;

    let budget = config.budget();
    while let Some(deadline) = state.timer.next_deadline() {
        if deadline > budget {
            break;
        }
        let step = deadline.saturating_sub(state.timer.now());
        if config.realtime && !step.is_zero() {
            std::thread::sleep(step);
        }
        state.timer.advance(step);
        run_ready(state, &mut js_ctx).map_err(|e| format!("{}", e))?;
    }
    Ok(())
}

fn register_globals(state: &Rc<HostState>, js_ctx: &mut Context) -> Result<(), String> {
    let globals = [
        ("onElementAvailable", 2, make_on_element_available(state.clone())),
        ("allElementsAvailable", 2, make_all_elements_available(state.clone())),
        ("onInputHasValue", 3, make_on_input_has_value(state.clone())),
        ("setTimeout", 2, make_set_timeout(state.clone())),
    ];
    for (name, length, function) in globals {
        js_ctx
            .register_global_callable(js_string!(name), length, function)
            .map_err(|e| format!("Failed to register {}: {}", name, e))?;
    }

    let console_obj = build_console_object(state, js_ctx);
    js_ctx
        .register_global_property(js_string!("console"), console_obj, Attribute::all())
        .map_err(|e| format!("Failed to register console object: {}", e))?;

    if state.document.is_some() {
        let document_obj = build_document_object(state, js_ctx);
        js_ctx
            .register_global_property(js_string!("document"), document_obj, Attribute::all())
            .map_err(|e| format!("Failed to register document object: {}", e))?;
    }
    Ok(())
}

/// Call every callback a tick made ready. Callbacks queued by ticks while
/// this runs are called too, in order.
fn run_ready(state: &HostState, js_ctx: &mut Context) -> JsResult<()> {
    loop {
        let next = state.ready.borrow_mut().pop_front();
        let Some(callback) = next else {
            return Ok(());
        };
        callback.call(&JsValue::undefined(), &[], js_ctx)?;
    }
}

// ── Object Builders ────────────────────────────────────────────────────

fn build_console_object(state: &Rc<HostState>, js_ctx: &mut Context) -> JsValue {
    let mut builder = ObjectInitializer::new(js_ctx);
    builder.function(make_console_log(state.clone(), ""), js_string!("log"), 1);
    builder.function(make_console_log(state.clone(), ""), js_string!("info"), 1);
    builder.function(make_console_log(state.clone(), "warn: "), js_string!("warn"), 1);
    builder.function(make_console_log(state.clone(), "error: "), js_string!("error"), 1);
    builder.build().into()
}

fn build_document_object(state: &Rc<HostState>, js_ctx: &mut Context) -> JsValue {
    let mut builder = ObjectInitializer::new(js_ctx);
    builder.function(make_document_load(state.clone()), js_string!("load"), 1);
    builder.function(make_document_set_value(state.clone()), js_string!("setValue"), 2);
    builder.build().into()
}

// ── Helpers ────────────────────────────────────────────────────────────

const MAX_SELECTORS: usize = 10_000;

fn js_err(msg: impl std::fmt::Display) -> JsError {
    JsError::from_opaque(JsValue::from(js_string!(msg.to_string())))
}

fn string_arg(args: &[JsValue], index: usize, js_ctx: &mut Context) -> JsResult<String> {
    Ok(args
        .get_or_undefined(index)
        .to_string(js_ctx)?
        .to_std_string_escaped())
}

fn callable_arg(args: &[JsValue], index: usize, name: &str) -> JsResult<JsObject> {
    match args.get_or_undefined(index).as_object() {
        Some(obj) if obj.is_callable() => Ok(obj.clone()),
        _ => Err(js_err(format!("{}: argument {} must be a function", name, index + 1))),
    }
}

fn string_array_arg(args: &[JsValue], index: usize, js_ctx: &mut Context) -> JsResult<Vec<String>> {
    let Some(arr) = args.get_or_undefined(index).as_object() else {
        return Err(js_err("allElementsAvailable: selectors must be an array"));
    };
    let len = arr.get(js_string!("length"), js_ctx)?.to_number(js_ctx)?;
    if !len.is_finite() || len < 0.0 || len > MAX_SELECTORS as f64 {
        return Err(js_err(format!(
            "allElementsAvailable: selectors length must be between 0 and {}",
            MAX_SELECTORS
        )));
    }
    let mut result = Vec::new();
    for i in 0..len as usize {
        let item = arr.get(i, js_ctx)?;
        result.push(item.to_string(js_ctx)?.to_std_string_escaped());
    }
    Ok(result)
}

/// Rust-side callback that queues `callback` for the next `run_ready`.
fn enqueue(state: &HostState, callback: JsObject) -> impl FnOnce() + 'static {
    let ready = state.ready.clone();
    move || ready.borrow_mut().push_back(callback)
}

/// Hand `callback` to `start` as a Rust closure. If it fires before `start`
/// returns, the JS callback runs before the registering call returns;
/// otherwise it waits in the tick-driven ready queue.
fn register_wait(
    state: &HostState,
    callback: JsObject,
    js_ctx: &mut Context,
    start: impl FnOnce(Box<dyn FnOnce()>),
) -> JsResult<()> {
    let registering = Rc::new(Cell::new(true));
    let fired_now: Rc<RefCell<Option<JsObject>>> = Rc::default();

    let flag = registering.clone();
    let slot = fired_now.clone();
    let ready = state.ready.clone();
    start(Box::new(move || {
        if flag.get() {
            *slot.borrow_mut() = Some(callback);
        } else {
            ready.borrow_mut().push_back(callback);
        }
    }));
    registering.set(false);

    let now = fired_now.borrow_mut().take();
    if let Some(callback) = now {
        callback.call(&JsValue::undefined(), &[], js_ctx)?;
    }
    Ok(())
}

// ── Native Function Factories ──────────────────────────────────────────
//
// Safety (all factories): the closures capture `Rc<HostState>`, which holds
// JS callbacks that boa does not trace. They are only called while their
// context is alive, and `run_script` clears them once the run ends.

fn make_on_element_available(state: Rc<HostState>) -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(move |_this, args, js_ctx| {
            let selector = string_arg(args, 0, js_ctx)?;
            let callback = callable_arg(args, 1, "onElementAvailable")?;

            register_wait(&state, callback, js_ctx, |fire| {
                state.waiters.on_element_available(&selector, fire)
            })?;

            Ok(JsValue::undefined())
        })
    }
}

fn make_all_elements_available(state: Rc<HostState>) -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(move |_this, args, js_ctx| {
            let selectors = string_array_arg(args, 0, js_ctx)?;
            let callback = callable_arg(args, 1, "allElementsAvailable")?;

            register_wait(&state, callback, js_ctx, |fire| {
                state.waiters.all_elements_available(selectors.as_slice(), fire)
            })?;

            Ok(JsValue::undefined())
        })
    }
}

fn make_on_input_has_value(state: Rc<HostState>) -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(move |_this, args, js_ctx| {
            let selector = string_arg(args, 0, js_ctx)?;
            let value = string_arg(args, 1, js_ctx)?;
            let callback = callable_arg(args, 2, "onInputHasValue")?;

            register_wait(&state, callback, js_ctx, |fire| {
                state.waiters.on_input_has_value(&selector, &value, fire)
            })?;

            Ok(JsValue::undefined())
        })
    }
}

fn make_set_timeout(state: Rc<HostState>) -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(move |_this, args, js_ctx| {
            let callback = callable_arg(args, 0, "setTimeout")?;
            let ms = args.get_or_undefined(1).to_number(js_ctx)?;
            let delay = Duration::from_millis(if ms.is_finite() && ms > 0.0 { ms as u64 } else { 0 });

            let slot: Rc<Cell<Option<TimerHandle>>> = Rc::default();
            let tick_slot = slot.clone();
            let tick_timer = state.timer.clone();
            let mut fire = Some(enqueue(&state, callback));
            let handle = state.timer.schedule(
                delay,
                Box::new(move || {
                    if let Some(handle) = tick_slot.take() {
                        tick_timer.cancel(handle);
                    }
                    if let Some(fire) = fire.take() {
                        fire();
                    }
                }),
            );
            slot.set(Some(handle));

            Ok(JsValue::undefined())
        })
    }
}

fn make_document_load(state: Rc<HostState>) -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(move |_this, args, js_ctx| {
            let source = string_arg(args, 0, js_ctx)?;
            if let Some(document) = &state.document {
                document.load(&source);
            }
            Ok(JsValue::undefined())
        })
    }
}

fn make_document_set_value(state: Rc<HostState>) -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(move |_this, args, js_ctx| {
            let selector = string_arg(args, 0, js_ctx)?;
            let value = string_arg(args, 1, js_ctx)?;
            let updated = match &state.document {
                Some(document) => document.set_value(&selector, &value).map_err(js_err)?,
                None => 0,
            };
            Ok(JsValue::from(updated as f64))
        })
    }
}

fn make_console_log(state: Rc<HostState>, prefix: &'static str) -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(move |_this, args, js_ctx| {
            let mut parts = Vec::new();
            for i in 0..args.len() {
                parts.push(string_arg(args, i, js_ctx)?);
            }
            let line = format!("{}{}", prefix, parts.join(" "));
            tracing::debug!("console: {}", line);
            state.output_lines.borrow_mut().push(line);
            Ok(JsValue::undefined())
        })
    }
}
