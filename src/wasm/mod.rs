//! WASM bindings: run a producer module against an HTML canvas

mod canvas;
mod module;

use js_sys::WebAssembly;
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

use crate::config::HostConfig;
use crate::error::HostError;
use crate::Host;

pub use canvas::CanvasSurface;
pub use module::{JsMemory, JsProducer, ProducerImports};

/// Install the panic hook and the console logger
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    static LOGGER: ConsoleLogger = ConsoleLogger;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
}

/// Routes the `log` facade to the browser console
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            log::Level::Info => web_sys::console::info_1(&line),
            log::Level::Debug | log::Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

fn to_js(err: HostError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// WASM-exposed host: one producer instance painting onto one canvas
#[wasm_bindgen]
pub struct WasmHost {
    host: Host<JsProducer>,
    surface: CanvasSurface,
}

#[wasm_bindgen]
impl WasmHost {
    /// Attach to an instance created with `imports.object()`. `config` is
    /// optional JSON.
    #[wasm_bindgen(constructor)]
    pub fn new(
        imports: &ProducerImports,
        instance: &WebAssembly::Instance,
        canvas: HtmlCanvasElement,
        config: Option<String>,
    ) -> Result<WasmHost, JsValue> {
        let config = match config {
            Some(json) => HostConfig::from_json(&json).map_err(to_js)?,
            None => HostConfig::default(),
        };

        let producer = JsProducer::new(instance, &config.module).map_err(to_js)?;
        imports.attach(producer.raw_memory());
        let surface = CanvasSurface::new(canvas, &config).map_err(to_js)?;
        let host = Host::new(producer, &config).map_err(to_js)?;

        Ok(Self { host, surface })
    }

    /// Run one frame; call from `requestAnimationFrame`. Returns the number
    /// of commands painted. Throws once the producer has failed.
    pub fn frame(&mut self) -> Result<u32, JsValue> {
        let report = self.host.frame(&mut self.surface).map_err(to_js)?;
        Ok(report.drawn)
    }

    #[wasm_bindgen(js_name = selfTest)]
    pub fn self_test(&mut self) -> Result<u32, JsValue> {
        self.host.self_test().map_err(to_js)
    }

    #[wasm_bindgen(js_name = pointerMoved)]
    pub fn pointer_moved(&mut self, client_x: f32, client_y: f32) {
        let origin = self.surface.origin();
        self.host.input_mut().pointer_moved(client_x, client_y, origin);
    }

    #[wasm_bindgen(js_name = buttonDown)]
    pub fn button_down(&mut self, button: u32) {
        self.host.input_mut().button_down(button);
    }

    #[wasm_bindgen(js_name = buttonUp)]
    pub fn button_up(&mut self, button: u32) {
        self.host.input_mut().button_up(button);
    }

    #[wasm_bindgen(js_name = pointerLeft)]
    pub fn pointer_left(&mut self) {
        self.host.input_mut().pointer_left();
    }

    pub fn wheel(&mut self, delta_y: f32) {
        self.host.input_mut().wheel(delta_y);
    }

    /// Header scalars as JSON
    pub fn header(&self) -> Result<String, JsValue> {
        let header = self.host.header().map_err(to_js)?;
        serde_json::to_string(&header).map_err(|e| to_js(e.into()))
    }

    /// Field offsets as a JSON object
    pub fn offsets(&self) -> Result<String, JsValue> {
        let offsets: serde_json::Map<String, serde_json::Value> = self
            .host
            .offsets()
            .entries()
            .map(|(name, offset)| (name.to_string(), offset.into()))
            .collect();
        serde_json::to_string(&offsets).map_err(|e| to_js(e.into()))
    }

    /// Producer allocation counters as JSON, if the producer reports them
    pub fn diagnostics(&self) -> Option<String> {
        let diag = self.host.diagnostics()?;
        serde_json::to_string(&diag).ok()
    }

    #[wasm_bindgen(js_name = cmdBufferPtr)]
    pub fn cmd_buffer_ptr(&self) -> u32 {
        self.host.cmd_buffer_ptr()
    }

    #[wasm_bindgen(js_name = isHalted)]
    pub fn is_halted(&self) -> bool {
        self.host.is_halted()
    }
}
