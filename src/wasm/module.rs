//! Producer modules instantiated by the page
//!
//! The host itself runs in its own wasm instance, so the producer's memory is
//! a foreign `ArrayBuffer`. After every producer call the command buffer
//! window is mirrored into host memory; a replaced `ArrayBuffer` (the producer
//! grew its memory) bumps the mirror's generation exactly like an in-process
//! region would.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use js_sys::{Array, Function, Object, Reflect, Uint8Array, WebAssembly};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::error::{HostError, Result};
use crate::memory::{Generation, SharedRegion};
use crate::offsets::OffsetSource;
use crate::producer::{FrameInput, HostImports, Producer, SELF_TEST_EXPORT};

const INIT_EXPORT: &str = "_init";
const FRAME_EXPORT: &str = "_frame";
const MEMORY_EXPORT: &str = "memory";

type MemorySlot = Rc<RefCell<Option<WebAssembly::Memory>>>;

/// Host-side mirror of a producer's exported memory
pub struct JsMemory {
    memory: WebAssembly::Memory,
    buffer: JsValue,
    mirror: Vec<u8>,
    window: Option<Range<usize>>,
    generation: Generation,
}

impl JsMemory {
    pub fn new(memory: WebAssembly::Memory) -> Self {
        let buffer = memory.buffer();
        let mut this = Self {
            memory,
            buffer,
            mirror: Vec::new(),
            window: None,
            generation: Generation::default(),
        };
        this.sync();
        this
    }

    /// Restrict later syncs to `window`. Bytes outside it keep their last
    /// mirrored value.
    pub fn set_window(&mut self, window: Range<usize>) {
        self.window = Some(window);
    }

    /// Refresh the mirror after the producer ran
    pub fn sync(&mut self) {
        let buffer = self.memory.buffer();
        if !Object::is(&buffer, &self.buffer) {
            self.generation = self.generation.next();
            self.buffer = buffer.clone();
        }

        let view = Uint8Array::new(&buffer);
        let len = view.length() as usize;
        self.mirror.resize(len, 0);

        let Range { start, end } = match &self.window {
            Some(window) => window.start.min(len)..window.end.min(len),
            None => 0..len,
        };
        if start < end {
            view.subarray(start as u32, end as u32)
                .copy_to(&mut self.mirror[start..end]);
        }
    }
}

impl SharedRegion for JsMemory {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn bytes(&self) -> &[u8] {
        &self.mirror
    }
}

/// A producer module instantiated by JavaScript
pub struct JsProducer {
    exports: Object,
    memory: JsMemory,
}

impl JsProducer {
    pub fn new(instance: &WebAssembly::Instance, module: &str) -> Result<Self> {
        let exports = instance.exports();
        let memory = Reflect::get(&exports, &JsValue::from_str(MEMORY_EXPORT))
            .ok()
            .and_then(|memory| memory.dyn_into::<WebAssembly::Memory>().ok())
            .ok_or_else(|| HostError::ModuleLoad {
                module: module.to_string(),
                reason: "no exported memory".to_string(),
            })?;

        Ok(Self {
            exports,
            memory: JsMemory::new(memory),
        })
    }

    /// The producer's memory object, for the imports to read messages from
    pub fn raw_memory(&self) -> &WebAssembly::Memory {
        &self.memory.memory
    }

    fn function(&self, name: &str) -> Option<Function> {
        Reflect::get(&self.exports, &JsValue::from_str(name))
            .ok()?
            .dyn_into::<Function>()
            .ok()
    }

    fn call(&mut self, name: &str, args: &Array) -> Result<JsValue> {
        let function = self.function(name).ok_or_else(|| HostError::MissingAccessor {
            name: name.to_string(),
        })?;
        let result = function
            .apply(&JsValue::NULL, args)
            .map_err(|err| HostError::ProducerPanic(describe(&err)));
        self.memory.sync();
        result
    }
}

impl OffsetSource for JsProducer {
    fn export(&self, name: &str) -> Option<u32> {
        let value = self.function(name)?.call0(&JsValue::NULL).ok()?;
        value.as_f64().map(|v| v as u32)
    }
}

impl Producer for JsProducer {
    type Memory = JsMemory;

    fn memory(&self) -> &JsMemory {
        &self.memory
    }

    fn watch(&mut self, window: Range<usize>) {
        self.memory.set_window(window);
        self.memory.sync();
    }

    fn init(&mut self, _imports: &HostImports) -> Result<()> {
        self.call(INIT_EXPORT, &Array::new())?;
        Ok(())
    }

    fn frame(&mut self, input: FrameInput, _imports: &HostImports) -> Result<()> {
        let args = Array::of4(
            &JsValue::from_f64(input.pointer_x as f64),
            &JsValue::from_f64(input.pointer_y as f64),
            &JsValue::from_f64(input.buttons as f64),
            &JsValue::from_f64(input.wheel as f64),
        );
        self.call(FRAME_EXPORT, &args)?;
        Ok(())
    }

    fn self_test(&mut self, _imports: &HostImports) -> Option<Result<u32>> {
        self.function(SELF_TEST_EXPORT)?;
        Some(
            self.call(SELF_TEST_EXPORT, &Array::new())
                .map(|count| count.as_f64().unwrap_or(0.0) as u32),
        )
    }
}

/// The `env` import object a producer module is instantiated with.
///
/// Create it first, instantiate the module with `imports.object()`, then
/// hand both to `WasmHost`, which attaches the module's memory.
#[wasm_bindgen]
pub struct ProducerImports {
    object: Object,
    memory: MemorySlot,
}

#[wasm_bindgen]
impl ProducerImports {
    #[wasm_bindgen(constructor)]
    pub fn new() -> ProducerImports {
        let memory: MemorySlot = Rc::new(RefCell::new(None));
        let env = Object::new();

        let slot = memory.clone();
        set(
            &env,
            "js_console_log",
            Closure::<dyn FnMut(u32, u32)>::new(move |ptr, len| {
                let bytes = message(&slot, ptr, len);
                HostImports::default().log(&bytes[..], 0, bytes.len() as u32);
            })
            .into_js_value(),
        );

        set(
            &env,
            "js_log_num",
            Closure::<dyn FnMut(f64)>::new(|num: f64| HostImports::default().log_num(num as i64))
                .into_js_value(),
        );

        let slot = memory.clone();
        set(
            &env,
            "js_dbg",
            Closure::<dyn FnMut(u32, u32, u32, u32)>::new(move |loc_ptr, loc_len, msg_ptr, msg_len| {
                let loc = message(&slot, loc_ptr, loc_len);
                let msg = message(&slot, msg_ptr, msg_len);
                let mut both = loc.clone();
                both.extend_from_slice(&msg);
                HostImports::default().dbg(
                    &both[..],
                    0,
                    loc.len() as u32,
                    loc.len() as u32,
                    msg.len() as u32,
                );
            })
            .into_js_value(),
        );

        let slot = memory.clone();
        set(
            &env,
            "js_expect_failed",
            Closure::<dyn FnMut(u32, u32)>::new(move |ptr, len| {
                let bytes = message(&slot, ptr, len);
                HostImports::default().expect_failed(&bytes[..], 0, bytes.len() as u32);
            })
            .into_js_value(),
        );

        let slot = memory.clone();
        set(
            &env,
            "js_throw_error",
            Closure::<dyn FnMut(u32, u32) -> std::result::Result<(), JsValue>>::new(
                move |ptr, len| {
                    let bytes = message(&slot, ptr, len);
                    let err = HostImports::default().throw_error(&bytes[..], 0, bytes.len() as u32);
                    let msg = match err {
                        HostError::ProducerPanic(msg) => msg,
                        other => other.to_string(),
                    };
                    Err(js_sys::Error::new(&msg).into())
                },
            )
            .into_js_value(),
        );

        let object = Object::new();
        set(&object, "env", env.into());
        ProducerImports { object, memory }
    }

    /// Import object to pass to `WebAssembly.instantiate`
    pub fn object(&self) -> Object {
        self.object.clone()
    }
}

impl ProducerImports {
    /// Point the message imports at the instantiated module's memory
    pub fn attach(&self, memory: &WebAssembly::Memory) {
        *self.memory.borrow_mut() = Some(memory.clone());
    }
}

impl Default for ProducerImports {
    fn default() -> Self {
        Self::new()
    }
}

fn set(target: &Object, key: &str, value: JsValue) {
    // only fails on frozen objects, and these are fresh
    let _ = Reflect::set(target, &JsValue::from_str(key), &value);
}

/// Copy `(ptr, len)` out of the producer's live memory
fn message(slot: &MemorySlot, ptr: u32, len: u32) -> Vec<u8> {
    let memory = slot.borrow();
    let Some(memory) = memory.as_ref() else {
        return Vec::new();
    };
    let bytes = Uint8Array::new(&memory.buffer());
    let end = ptr.saturating_add(len).min(bytes.length());
    bytes.slice(ptr.min(end), end).to_vec()
}

fn describe(err: &JsValue) -> String {
    if let Some(err) = err.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}
